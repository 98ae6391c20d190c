use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread;

use crossbeam_channel::unbounded;
use tracing::debug;

use crate::error::{PgzError, Result};
use crate::signal::{self, Awaiter};

/// First failure of a run, plus a flag workers poll to stop picking up blocks.
#[derive(Default)]
struct Failures {
    tripped: AtomicBool,
    first: Mutex<Option<PgzError>>,
}

impl Failures {
    fn record(&self, err: PgzError) {
        self.tripped.store(true, Ordering::SeqCst);
        let mut first = self.first.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // A cancelled block is only the echo of another failure; keep the cause.
        let replace = match first.as_ref() {
            None => true,
            Some(PgzError::Cancelled { .. }) => !matches!(err, PgzError::Cancelled { .. }),
            Some(_) => false,
        };
        if replace {
            *first = Some(err);
        }
    }

    fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }

    fn into_first(self) -> Option<PgzError> {
        self.first.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Run `work` over every block on a pool of at most `workers` threads while
/// `coordinate` consumes the results in sequence order on its own thread.
///
/// Blocks are queued in sequence order, so the block the coordinator waits
/// on next is always already running or done. Every thread is joined before
/// this returns. The first failure stops workers from starting new blocks;
/// blocks they skip resolve the coordinator's wait as
/// [`PgzError::Cancelled`], and the original failure is what is returned.
pub(crate) fn run_pipeline<B, V, W, C, T>(blocks: &[B], workers: usize, work: W, coordinate: C) -> Result<T>
where
    B: Sync,
    V: Send,
    W: Fn(&B) -> Result<V> + Sync,
    C: FnOnce(Vec<Awaiter<V>>) -> Result<T> + Send,
    T: Send,
{
    let (completions, awaiters): (Vec<_>, Vec<_>) = (0..blocks.len() as u64).map(signal::pair).unzip();

    let (queue_tx, queue_rx) = unbounded();
    for job in blocks.iter().zip(completions) {
        if queue_tx.send(job).is_err() {
            break;
        }
    }
    drop(queue_tx);

    let pool_size = workers.min(blocks.len()).max(1);
    debug!(blocks = blocks.len(), pool_size, "dispatching blocks");

    let failures = Failures::default();
    let value = thread::scope(|s| {
        let work = &work;
        let failures = &failures;

        let pool: Vec<_> = (0..pool_size)
            .map(|_| {
                let queue = queue_rx.clone();
                s.spawn(move || {
                    for (block, completion) in queue {
                        if failures.is_tripped() {
                            continue;
                        }
                        match work(block) {
                            Ok(value) => completion.notify(value),
                            Err(err) => failures.record(err),
                        }
                    }
                })
            })
            .collect();
        // Queued blocks are discarded once the last worker is gone, which
        // cancels their signals instead of leaving the coordinator waiting.
        drop(queue_rx);

        let coordinator = s.spawn(move || match coordinate(awaiters) {
            Ok(value) => Some(value),
            Err(err) => {
                failures.record(err);
                None
            }
        });

        for handle in pool {
            if handle.join().is_err() {
                failures.record(PgzError::Panicked("worker"));
            }
        }
        coordinator.join().unwrap_or_else(|_| {
            failures.record(PgzError::Panicked("coordinator"));
            None
        })
    });

    match failures.into_first() {
        Some(err) => Err(err),
        None => value.ok_or(PgzError::Panicked("coordinator")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn coordinator_sees_results_in_sequence_order() {
        let blocks: Vec<u64> = (0..8).collect();
        let order = run_pipeline(
            &blocks,
            4,
            |&b| {
                // Earlier blocks finish last.
                thread::sleep(Duration::from_millis((8 - b) * 5));
                Ok(b * 10)
            },
            |awaiters| awaiters.into_iter().map(Awaiter::wait).collect::<Result<Vec<_>>>(),
        )
        .unwrap();
        assert_eq!(order, vec![0, 10, 20, 30, 40, 50, 60, 70]);
    }

    #[test]
    fn worker_failure_is_reported_over_cancellation() {
        let blocks: Vec<u64> = (0..6).collect();
        let started = AtomicUsize::new(0);
        let err = run_pipeline(
            &blocks,
            1,
            |&b| {
                started.fetch_add(1, Ordering::SeqCst);
                if b == 1 {
                    return Err(PgzError::Io {
                        path: PathBuf::from("block-1"),
                        source: io::Error::new(io::ErrorKind::Other, "disk on fire"),
                    });
                }
                Ok(b)
            },
            |awaiters| {
                for awaiter in awaiters {
                    awaiter.wait()?;
                }
                Ok(())
            },
        )
        .unwrap_err();

        assert!(matches!(err, PgzError::Io { ref path, .. } if path == &PathBuf::from("block-1")));
        // A single worker takes blocks in order and stops after the failure.
        assert_eq!(started.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn coordinator_failure_stops_the_run() {
        let blocks: Vec<u64> = (0..4).collect();
        let err = run_pipeline(
            &blocks,
            2,
            |&b| Ok(b),
            |_awaiters| -> Result<()> { Err(PgzError::Configuration("no destination".into())) },
        )
        .unwrap_err();
        assert!(matches!(err, PgzError::Configuration(_)));
    }

    #[test]
    fn empty_plan_still_runs_coordinator() {
        let blocks: Vec<u64> = Vec::new();
        let n = run_pipeline(&blocks, 4, |&b| Ok(b), |awaiters| Ok(awaiters.len())).unwrap();
        assert_eq!(n, 0);
    }
}
