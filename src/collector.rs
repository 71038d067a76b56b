//! Concurrent fan-out over a set of targets.
//!
//! [`fan_out`] spawns one task per target and waits for every one of
//! them.  Results come back in input order no matter which task
//! finishes first, and one failed task never cancels its siblings.
//! Dropping the returned future (the inbound request went away) aborts
//! whatever is still running.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::join_all;
use log::error;
use tokio::task::AbortHandle;

use crate::discovery::{Discovery, Target};
use crate::error::CollectError;
use crate::prober::{probe_target, Probers};
use crate::types::{Latency, UNREACHABLE};

/// Aborts the tasks it tracks when the collecting future is dropped.
struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

/// Run `f` for every target concurrently; slot `i` holds the result for
/// `targets[i]`.
pub async fn fan_out<T, R, F, Fut>(targets: &[T], f: F) -> Vec<Result<R, CollectError>>
where
    T: Clone,
    F: Fn(T) -> Fut,
    Fut: Future<Output = R> + Send + 'static,
    R: Send + 'static,
{
    let handles: Vec<_> = targets
        .iter()
        .cloned()
        .map(|t| tokio::spawn(f(t)))
        .collect();
    let _guard = AbortOnDrop(handles.iter().map(|h| h.abort_handle()).collect());

    let mut slots = Vec::with_capacity(targets.len());
    for (index, joined) in join_all(handles).await.into_iter().enumerate() {
        slots.push(joined.map_err(|e| {
            if e.is_panic() {
                CollectError::Panicked { index }
            } else {
                CollectError::Cancelled { index }
            }
        }));
    }
    slots
}

/// Probe every target with the full strategy chain.
pub async fn get_latencies(
    targets: &[Target],
    probers: &Probers,
    discovery: &Arc<dyn Discovery>,
) -> Vec<Latency> {
    let results = fan_out(targets, |target: Target| {
        let probers = Arc::clone(probers);
        let discovery = Arc::clone(discovery);
        async move { probe_target(&target, &probers, discovery.as_ref()).await }
    })
    .await;

    results
        .into_iter()
        .zip(targets)
        .map(|(result, target)| {
            result.unwrap_or_else(|e| {
                error!("probing {} did not finish: {}", target, e);
                Latency {
                    destination: target.to_string(),
                    resolved_ip: None,
                    resolved_host: Some(target.host.clone()),
                    duration: UNREACHABLE,
                    ok: false,
                    strategy: None,
                    placeholder: false,
                }
            })
        })
        .collect()
}
