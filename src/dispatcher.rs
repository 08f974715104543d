//! Parallel, host-substituting task fan-out — the heart of the engine (spec §4.3).
//!
//! Each task starts against the candidate host at the same position in the host list.
//! A task whose host fails is retried against the next host the dispatcher has not
//! already handed to some other task, walking the candidate list left-to-right. The
//! dispatcher finishes once every task has either retired or exhausted the candidate
//! list; callers decide for themselves whether a partial outcome is acceptable
//! (`UploadFromReader` and `DownloadRange` are all-or-nothing, `Migrate` commits
//! whatever subset of shard uploads succeeded).
//!
//! Modeled as tokio tasks reporting completions over an `mpsc` channel to a single
//! coordinating loop — the same "workers publish completions to one coordinator"
//! shape the teacher's `network_manager.rs` uses for its background peer-discovery
//! task, generalized from a fixed gossip job to an arbitrary `run(host, task)` closure.

use std::future::Future;
use std::sync::Arc;

use log::{debug, trace, warn};
use tokio::sync::{mpsc, Semaphore};

use crate::error::{HostError, HostErrorSet};
use crate::host::HostSession;
use crate::types::PublicKey;

enum Completion<R> {
    Success(usize, R),
    Failure(usize, PublicKey, anyhow::Error),
}

/// The result of one dispatcher run: every task that retired, tagged with its index,
/// plus the aggregate of every per-host failure observed along the way. A run in which
/// `succeeded.len() == tasks.len()` is a full success; the caller decides what a
/// shorter `succeeded` list means for its own operation.
#[derive(Debug, Default)]
pub struct DispatchOutcome<R> {
    pub succeeded: Vec<(usize, R)>,
    pub errors: HostErrorSet,
}

impl<R> DispatchOutcome<R> {
    /// True if every task in the run retired successfully.
    pub fn is_complete(&self, task_count: usize) -> bool {
        self.succeeded.len() == task_count
    }

    /// Results ordered by task index, consuming the outcome. Panics if any task did not
    /// retire — callers must check [`Self::is_complete`] first.
    pub fn into_ordered(mut self, task_count: usize) -> Vec<R> {
        assert_eq!(self.succeeded.len(), task_count, "dispatch run was not complete");
        self.succeeded.sort_by_key(|(idx, _)| *idx);
        self.succeeded.into_iter().map(|(_, r)| r).collect()
    }
}

/// Runs `tasks` against `hosts`, substituting on failure.
///
/// `max_inflight` bounds how many `run(host, task)` calls are actually in flight against
/// the network at once (an [`EngineConfig::max_inflight_hint`](crate::config::EngineConfig)
/// value, typically) — every task is still spawned as its own worker up front per spec
/// §4.3's "at most `len(tasks)` concurrent workers", but a worker blocks on a semaphore
/// permit before calling `run`, so the host-facing concurrency stays capped regardless of
/// `len(tasks)`. `0` means unbounded (no permit is acquired).
pub async fn dispatch<T, R, F, Fut>(
    tasks: Vec<T>,
    hosts: Vec<Arc<dyn HostSession>>,
    max_inflight: usize,
    run: F,
) -> DispatchOutcome<R>
where
    T: Clone + Send + Sync + 'static,
    R: Send + 'static,
    F: Fn(Arc<dyn HostSession>, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
{
    let n = tasks.len();
    let run = Arc::new(run);
    let (tx, mut rx) = mpsc::channel::<Completion<R>>(n.max(1));
    let limiter = (max_inflight > 0).then(|| Arc::new(Semaphore::new(max_inflight)));

    let spawn_attempt = |task_index: usize,
                          host: Arc<dyn HostSession>,
                          task: T,
                          run: Arc<F>,
                          tx: mpsc::Sender<Completion<R>>,
                          limiter: Option<Arc<Semaphore>>| {
        tokio::spawn(async move {
            let host_key = host.public_key();
            let _permit = match &limiter {
                Some(sem) => Some(sem.acquire().await.expect("semaphore never closed")),
                None => None,
            };
            trace!("dispatcher: task {task_index} attempting host {host_key}");
            let outcome = run(host, task).await;
            let completion = match outcome {
                Ok(r) => Completion::Success(task_index, r),
                Err(e) => Completion::Failure(task_index, host_key, e),
            };
            let _ = tx.send(completion).await;
        });
    };

    let mut outcome: DispatchOutcome<R> = DispatchOutcome::default();
    let mut pending = 0usize;
    let mut next_host = n;

    for (i, task) in tasks.iter().enumerate() {
        if let Some(host) = hosts.get(i).cloned() {
            spawn_attempt(i, host, task.clone(), run.clone(), tx.clone(), limiter.clone());
            pending += 1;
        } else {
            warn!("dispatcher: task {i} has no initial candidate host");
        }
    }

    while outcome.succeeded.len() < n && pending > 0 {
        let completion = match rx.recv().await {
            Some(c) => c,
            None => break,
        };
        pending -= 1;
        match completion {
            Completion::Success(idx, r) => {
                debug!("dispatcher: task {idx} retired");
                outcome.succeeded.push((idx, r));
            }
            Completion::Failure(idx, host, cause) => {
                warn!("dispatcher: task {idx} failed on host {host}: {cause}");
                outcome.errors.push(HostError::new(host, cause));
                if next_host < hosts.len() {
                    let substitute = hosts[next_host].clone();
                    next_host += 1;
                    spawn_attempt(idx, substitute, tasks[idx].clone(), run.clone(), tx.clone(), limiter.clone());
                    pending += 1;
                }
            }
        }
    }
    drop(tx);

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use crate::types::Hash256;
    use async_trait::async_trait;

    struct StubHost {
        key: PublicKey,
        fail: bool,
    }

    #[async_trait]
    impl HostSession for StubHost {
        fn public_key(&self) -> PublicKey {
            self.key
        }
        async fn upload_sector(&self, _: &[u8]) -> anyhow::Result<Hash256> {
            if self.fail {
                anyhow::bail!("stub upload failure on {}", self.key)
            } else {
                Ok(Hash256::default())
            }
        }
        async fn download_sector(
            &self,
            _: &mut Vec<u8>,
            _: Hash256,
            _: u64,
            _: u64,
        ) -> anyhow::Result<()> {
            Ok(())
        }
        async fn delete_sectors(&self, _: &[Hash256]) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn host(b: u8, fail: bool) -> Arc<dyn HostSession> {
        Arc::new(StubHost {
            key: PublicKey::from_bytes([b; 32]),
            fail,
        })
    }

    #[tokio::test]
    async fn substitutes_on_failure_and_preserves_task_order() {
        let hosts = vec![host(1, true), host(2, false), host(3, false)];
        let tasks = vec![10usize, 20usize];

        let outcome = dispatch(tasks, hosts, 0, move |host, task| async move {
            host.upload_sector(&[]).await?;
            Ok(task)
        })
        .await;

        assert!(outcome.is_complete(2));
        assert_eq!(outcome.into_ordered(2), vec![10, 20]);
    }

    #[tokio::test]
    async fn exhaustion_yields_host_error_set_and_partial_success() {
        let hosts = vec![host(1, true), host(2, false)];
        let tasks = vec![0usize, 1usize];

        let outcome = dispatch(tasks, hosts, 0, |host, task: usize| async move {
            host.upload_sector(&[]).await?;
            Ok(task)
        })
        .await;

        assert!(!outcome.is_complete(2));
        assert_eq!(outcome.succeeded.len(), 1);
        assert_eq!(outcome.errors.len(), 1);
    }

    #[tokio::test]
    async fn successful_dispatch_uses_each_host_at_most_once() {
        let call_counts: Arc<Mutex<std::collections::HashMap<PublicKey, usize>>> =
            Arc::new(Mutex::new(std::collections::HashMap::new()));
        let counts = call_counts.clone();
        let total = Arc::new(AtomicUsize::new(0));
        let total_for_run = total.clone();

        let hosts = vec![host(1, false), host(2, false), host(3, false)];
        let tasks = vec![0usize, 1usize, 2usize];

        let outcome = dispatch(tasks, hosts, 0, move |host, task| {
            let counts = counts.clone();
            let total = total_for_run.clone();
            async move {
                *counts.lock().unwrap().entry(host.public_key()).or_insert(0) += 1;
                total.fetch_add(1, Ordering::SeqCst);
                host.upload_sector(&[]).await?;
                Ok(task)
            }
        })
        .await;

        assert!(outcome.is_complete(3));
        assert_eq!(outcome.into_ordered(3), vec![0, 1, 2]);
        assert_eq!(total.load(Ordering::SeqCst), 3);
        assert!(call_counts.lock().unwrap().values().all(|&c| c == 1));
    }

    #[tokio::test]
    async fn max_inflight_bounds_concurrent_host_calls() {
        let hosts: Vec<_> = (1..=6u8).map(|b| host(b, false)).collect();
        let tasks = vec![0usize, 1usize, 2usize, 3usize, 4usize, 5usize];

        let concurrent = Arc::new(AtomicUsize::new(0));
        let observed_max = Arc::new(AtomicUsize::new(0));
        let concurrent_for_run = concurrent.clone();
        let observed_max_for_run = observed_max.clone();

        let outcome = dispatch(tasks, hosts, 2, move |_host, task: usize| {
            let concurrent = concurrent_for_run.clone();
            let observed_max = observed_max_for_run.clone();
            async move {
                let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                observed_max.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                concurrent.fetch_sub(1, Ordering::SeqCst);
                Ok(task)
            }
        })
        .await;

        assert!(outcome.is_complete(6));
        assert!(
            observed_max.load(Ordering::SeqCst) <= 2,
            "observed {} concurrent host calls with max_inflight = 2",
            observed_max.load(Ordering::SeqCst)
        );
    }
}
