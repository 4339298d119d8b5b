// src/proxy/pool.rs
//! Bounded-concurrency, order-preserving map over async tasks.

use std::future::Future;

use futures::stream::{self, StreamExt};

/// Run `f` over `items` with at most `limit` futures in flight.
/// Output order matches input order regardless of completion order.
pub async fn bounded_map<I, T, F, Fut>(limit: usize, items: I, f: F) -> Vec<T>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = T>,
{
    stream::iter(items)
        .map(f)
        .buffered(limit.max(1))
        .collect()
        .await
}
