/*!
 * WorkQueue Integration Tests
 *
 * Run-exactly-once, cancellation before dequeue, FIFO order, idempotent
 * shutdown and producer waits
 */

use ai_os_sync::{
    ConditionVariableMap, QueueState, Runnable, SlotId, SyncError, WorkItem, WorkQueue,
    WorkQueueConfig, WorkStatus,
};
use parking_lot::Mutex as PlMutex;
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Records every run and every worker setup/teardown
#[derive(Default)]
struct Recorder {
    runs: PlMutex<Vec<(char, SlotId)>>,
    starts: AtomicUsize,
    finishes: AtomicUsize,
    delay: Duration,
}

impl Runnable for Recorder {
    type Payload = char;

    fn on_run(&self, item: &WorkItem<char>, slot: SlotId) {
        thread::sleep(self.delay);
        self.runs.lock().push((*item.payload(), slot));
    }

    fn on_start(&self, _slot: SlotId) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_finish(&self, _slot: SlotId) {
        self.finishes.fetch_add(1, Ordering::SeqCst);
    }
}

fn config() -> WorkQueueConfig {
    WorkQueueConfig::named("test").with_idle_wait(Duration::from_millis(10))
}

#[test]
#[serial]
fn test_finish_runs_each_item_once() {
    let queue = WorkQueue::with_config(
        Recorder {
            delay: Duration::from_millis(5),
            ..Recorder::default()
        },
        config(),
    );
    queue.start(2).unwrap();

    let items: Vec<_> = ['A', 'B', 'C']
        .into_iter()
        .map(|c| queue.submit_payload(c).unwrap())
        .collect();
    queue.finish();

    let mut ran: Vec<char> = queue.runner().runs.lock().iter().map(|(c, _)| *c).collect();
    ran.sort_unstable();
    assert_eq!(ran, vec!['A', 'B', 'C']);
    for item in &items {
        assert_eq!(item.status(), WorkStatus::Complete);
        assert!(item.slot_id().is_some_and(|slot| slot < 2));
    }
    assert_eq!(queue.state(), QueueState::Stopped);
}

#[test]
#[serial]
fn test_cancel_before_dequeue_skips_run() {
    let queue = WorkQueue::with_config(Recorder::default(), config());
    let item = queue.submit_payload('A').unwrap();
    queue.cancel();

    assert_eq!(item.status(), WorkStatus::Cancelled);
    assert!(queue.runner().runs.lock().is_empty());
}

#[test]
#[serial]
fn test_cancel_revokes_queued_items() {
    let gate = Arc::new(AtomicBool::new(false));

    struct Gated(Arc<AtomicBool>, AtomicUsize);
    impl Runnable for Gated {
        type Payload = u32;
        fn on_run(&self, _item: &WorkItem<u32>, _slot: SlotId) {
            while !self.0.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(1));
            }
            self.1.fetch_add(1, Ordering::SeqCst);
        }
    }

    let queue = Arc::new(WorkQueue::with_config(
        Gated(gate.clone(), AtomicUsize::new(0)),
        config(),
    ));
    queue.start(1).unwrap();
    let first = queue.submit_payload(0).unwrap();
    while first.status() != WorkStatus::Running {
        thread::sleep(Duration::from_millis(1));
    }
    let rest: Vec<_> = (1..5).map(|i| queue.submit_payload(i).unwrap()).collect();

    let canceller = {
        let queue = queue.clone();
        thread::spawn(move || queue.cancel())
    };
    thread::sleep(Duration::from_millis(20));
    gate.store(true, Ordering::SeqCst);
    canceller.join().unwrap();

    assert_eq!(first.status(), WorkStatus::Complete);
    assert!(rest.iter().all(|item| item.status() == WorkStatus::Cancelled));
    assert_eq!(queue.runner().1.load(Ordering::SeqCst), 1);
}

#[test]
#[serial]
fn test_single_worker_preserves_fifo_order() {
    let queue = WorkQueue::with_config(Recorder::default(), config());
    for c in "abcdefgh".chars() {
        queue.submit_payload(c).unwrap();
    }
    queue.start(1).unwrap();
    queue.finish();

    let ran: String = queue.runner().runs.lock().iter().map(|(c, _)| *c).collect();
    assert_eq!(ran, "abcdefgh");
}

#[test]
#[serial]
fn test_shutdown_is_idempotent() {
    let queue = WorkQueue::with_config(Recorder::default(), config());
    queue.start(3).unwrap();

    queue.finish();
    queue.finish();
    queue.exit();
    queue.exit();
    queue.destroy();
    queue.destroy();

    assert_eq!(queue.runner().starts.load(Ordering::SeqCst), 3);
    assert_eq!(queue.runner().finishes.load(Ordering::SeqCst), 3);
    assert_eq!(queue.worker_count(), 0);
    assert_eq!(queue.submit_payload('z').unwrap_err(), SyncError::QueueClosed);
}

#[test]
#[serial]
fn test_producer_waits_on_item() {
    let queue = WorkQueue::with_config(
        Recorder {
            delay: Duration::from_millis(20),
            ..Recorder::default()
        },
        config(),
    );
    queue.start(1).unwrap();
    let item = queue.submit_payload('w').unwrap();

    assert!(item.wait(Some(Duration::from_secs(5))));
    assert!(item.is_complete());
    queue.exit();
}

#[test]
#[serial]
fn test_panicking_item_is_cancelled_and_worker_survives() {
    struct Flaky;
    impl Runnable for Flaky {
        type Payload = bool;
        fn on_run(&self, item: &WorkItem<bool>, _slot: SlotId) {
            if *item.payload() {
                panic!("requested failure");
            }
        }
    }

    let queue = WorkQueue::with_config(Flaky, config());
    queue.start(1).unwrap();
    let bad = queue.submit_payload(true).unwrap();
    let good = queue.submit_payload(false).unwrap();
    queue.finish();

    assert_eq!(bad.status(), WorkStatus::Cancelled);
    assert_eq!(good.status(), WorkStatus::Complete);
}

#[test]
#[serial]
fn test_items_signal_condition_map() {
    struct Signaller(Arc<ConditionVariableMap>);
    impl Runnable for Signaller {
        type Payload = u64;
        fn on_run(&self, item: &WorkItem<u64>, _slot: SlotId) {
            self.0.broadcast(*item.payload());
        }
    }

    let ready = Arc::new(ConditionVariableMap::new(8).unwrap());
    let queue = WorkQueue::with_config(Signaller(ready.clone()), config());
    queue.start(2).unwrap();

    let waiters: Vec<_> = (0..4u64)
        .map(|key| {
            let ready = ready.clone();
            thread::spawn(move || ready.wait(key, Some(Duration::from_secs(5))))
        })
        .collect();
    while (0..4u64).any(|key| ready.waiter_count(key) == 0) {
        thread::sleep(Duration::from_millis(2));
    }

    for key in 0..4u64 {
        queue.submit_payload(key).unwrap();
    }
    for waiter in waiters {
        assert!(waiter.join().unwrap());
    }
    queue.finish();
}

#[test]
fn test_invalid_worker_count() {
    let queue = WorkQueue::with_config(Recorder::default(), config());
    let err = queue.start(usize::MAX).unwrap_err();
    assert!(matches!(err, SyncError::InvalidWorkerCount { .. }));
    assert_eq!(queue.state(), QueueState::Unstarted);
}

fn slow_queue() -> Arc<WorkQueue<Recorder>> {
    Arc::new(WorkQueue::with_config(
        Recorder {
            delay: Duration::from_millis(50),
            ..Recorder::default()
        },
        config(),
    ))
}

#[test]
#[serial]
fn test_finish_completes_while_another_thread_joins() {
    let queue = slow_queue();
    queue.start(1).unwrap();
    let items: Vec<_> = ['A', 'B', 'C', 'D']
        .into_iter()
        .map(|c| queue.submit_payload(c).unwrap())
        .collect();

    let joiner = {
        let queue = queue.clone();
        thread::spawn(move || queue.wait())
    };
    thread::sleep(Duration::from_millis(10));
    assert_eq!(queue.worker_count(), 1);

    queue.finish();
    joiner.join().unwrap();

    let statuses: Vec<_> = items.iter().map(|item| item.status()).collect();
    assert_eq!(statuses, vec![WorkStatus::Complete; 4]);
    assert_eq!(queue.runner().runs.lock().len(), 4);
    assert_eq!(queue.worker_count(), 0);
}

#[test]
#[serial]
fn test_concurrent_finish_returns_after_shutdown() {
    let queue = slow_queue();
    queue.start(1).unwrap();
    let items: Vec<_> = ['A', 'B', 'C', 'D']
        .into_iter()
        .map(|c| queue.submit_payload(c).unwrap())
        .collect();

    let first = {
        let queue = queue.clone();
        thread::spawn(move || queue.finish())
    };
    thread::sleep(Duration::from_millis(5));
    queue.finish();

    assert_eq!(queue.state(), QueueState::Stopped);
    let statuses: Vec<_> = items.iter().map(|item| item.status()).collect();
    assert_eq!(statuses, vec![WorkStatus::Complete; 4]);
    first.join().unwrap();
    assert_eq!(queue.runner().starts.load(Ordering::SeqCst), 1);
    assert_eq!(queue.runner().finishes.load(Ordering::SeqCst), 1);
}

#[test]
#[serial]
fn test_cancel_during_finish_revokes_the_rest() {
    let queue = slow_queue();
    queue.start(1).unwrap();
    let items: Vec<_> = ['A', 'B', 'C', 'D']
        .into_iter()
        .map(|c| queue.submit_payload(c).unwrap())
        .collect();
    while items[0].status() != WorkStatus::Running {
        thread::sleep(Duration::from_millis(1));
    }

    let finisher = {
        let queue = queue.clone();
        thread::spawn(move || queue.finish())
    };
    thread::sleep(Duration::from_millis(5));
    queue.cancel();

    assert_eq!(queue.state(), QueueState::Stopped);
    assert_eq!(items[0].status(), WorkStatus::Complete);
    assert!(items.iter().all(|item| item.is_terminal()));
    assert_eq!(items[3].status(), WorkStatus::Cancelled);
    finisher.join().unwrap();
}
