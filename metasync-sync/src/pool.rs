//! Fixed-size worker pool draining a shared queue.
//!
//! Each worker pops one item at a time under the queue lock and runs one
//! blocking transfer for it. The first failure stops workers from taking
//! new items; in-flight items finish. The call returns once every worker
//! has exited.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;

use crate::error::SyncError;

pub fn run_parallel<T, F>(items: Vec<T>, parallel: usize, work: F) -> Result<(), SyncError>
where
    T: Send,
    F: Fn(T) -> Result<(), SyncError> + Sync,
{
    if items.is_empty() {
        return Ok(());
    }
    let workers = parallel.clamp(1, items.len());

    let queue = Mutex::new(VecDeque::from(items));
    let stop = AtomicBool::new(false);
    let first_error: Mutex<Option<SyncError>> = Mutex::new(None);
    let mut panicked = false;

    thread::scope(|scope| {
        let (queue, stop, first_error, work) = (&queue, &stop, &first_error, &work);
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                scope.spawn(move || loop {
                    if stop.load(Ordering::SeqCst) {
                        break;
                    }
                    let next = queue
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .pop_front();
                    let Some(item) = next else {
                        break;
                    };
                    if let Err(err) = work(item) {
                        stop.store(true, Ordering::SeqCst);
                        first_error
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .get_or_insert(err);
                        break;
                    }
                })
            })
            .collect();

        for handle in handles {
            if handle.join().is_err() {
                panicked = true;
            }
        }
    });

    if panicked {
        return Err(SyncError::WorkerPanicked);
    }
    match first_error.into_inner().unwrap_or_else(PoisonError::into_inner) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn every_item_is_processed_once() {
        let seen = Mutex::new(Vec::new());
        run_parallel((0..100).collect(), 8, |i: u32| {
            seen.lock().unwrap().push(i);
            Ok(())
        })
        .unwrap();

        let mut seen = seen.into_inner().unwrap();
        seen.sort_unstable();
        assert_eq!(seen, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn concurrency_is_bounded_by_parallel() {
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        run_parallel((0..40).collect(), 3, |_: u32| {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(2));
            active.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn first_error_is_returned_and_stops_new_work() {
        let processed = AtomicUsize::new(0);
        let result = run_parallel((0..1000).collect(), 1, |i: u32| {
            processed.fetch_add(1, Ordering::SeqCst);
            if i == 5 {
                Err(SyncError::InvalidArguments(format!("item {i}")))
            } else {
                Ok(())
            }
        });
        assert!(matches!(result, Err(SyncError::InvalidArguments(msg)) if msg == "item 5"));
        assert_eq!(processed.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn empty_input_spawns_nothing() {
        run_parallel(Vec::<u32>::new(), 10, |_| panic!("no work expected")).unwrap();
    }

    #[test]
    fn worker_panic_is_reported() {
        let result = run_parallel(vec![1u32], 2, |_| panic!("boom"));
        assert!(matches!(result, Err(SyncError::WorkerPanicked)));
    }
}
