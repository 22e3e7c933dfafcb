//! Concurrency-limited parallel iteration utilities.
//!
//! Wraps rayon's `par_iter` to process items in parallel while limiting
//! the number of items in flight at once, so peak memory stays bounded by
//! `max_concurrent` results.

use rayon::prelude::*;

/// Number of items to keep in flight when the caller has no preference.
pub fn default_concurrency() -> usize {
    rayon::current_num_threads().max(1)
}

/// Maps `f` over `items` in parallel, with at most `max_concurrent` items in flight.
///
/// Semantically equivalent to `items.par_iter().map(f).collect()`, but processes
/// items in chunks of `max_concurrent` to limit resource usage.
///
/// # Panics
///
/// Panics if `max_concurrent` is 0.
pub fn par_map_limited<T, R, F>(items: &[T], max_concurrent: usize, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    assert!(max_concurrent > 0, "max_concurrent must be > 0");

    let mut results = Vec::with_capacity(items.len());
    for chunk in items.chunks(max_concurrent) {
        let chunk_results: Vec<R> = chunk.par_iter().map(&f).collect();
        results.extend(chunk_results);
    }
    results
}

/// Maps `f` over `items` in parallel chunks of `max_concurrent` and hands
/// every result to `consume` on the calling thread, in input order.
///
/// `consume` may hold non-`Sync` state (a file writer, for instance). The
/// first error it returns stops processing; later chunks are never mapped.
///
/// # Panics
///
/// Panics if `max_concurrent` is 0.
pub fn par_map_limited_each<T, R, E, F, C>(
    items: &[T],
    max_concurrent: usize,
    f: F,
    mut consume: C,
) -> Result<(), E>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
    C: FnMut(&T, R) -> Result<(), E>,
{
    assert!(max_concurrent > 0, "max_concurrent must be > 0");

    for chunk in items.chunks(max_concurrent) {
        let chunk_results: Vec<R> = chunk.par_iter().map(&f).collect();
        for (item, result) in chunk.iter().zip(chunk_results) {
            consume(item, result)?;
        }
    }
    Ok(())
}
