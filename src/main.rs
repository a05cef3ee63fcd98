/*!
 * AI-OS Sync - Demo Entry Point
 *
 * Runs a small work queue whose items signal a keyed condition map:
 * - Workers "load" a key, then signal it
 * - The main thread waits on each key before finishing the queue
 */

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use ai_os_sync::{
    init_tracing, ConditionVariableMap, Runnable, SlotId, SyncConfig, WorkItem, WorkQueue,
    WorkQueueConfig, WorkloadProfile,
};

/// Signals its item's key once the simulated load is done
struct Loader {
    ready: Arc<ConditionVariableMap>,
}

impl Runnable for Loader {
    type Payload = u64;

    fn on_run(&self, item: &WorkItem<u64>, slot: SlotId) {
        let key = *item.payload();
        std::thread::sleep(Duration::from_millis(5 * (key % 4)));
        let woken = self.ready.broadcast(key);
        info!(key, slot, woken, "loaded");
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    let sync = SyncConfig::from_env();
    info!(backend = ?sync.select_backend(), "sync-demo starting");

    let ready = Arc::new(ConditionVariableMap::for_profile(WorkloadProfile::LowContention));
    let queue = WorkQueue::with_config(
        Loader {
            ready: Arc::clone(&ready),
        },
        WorkQueueConfig::named("loader").with_sync(sync),
    );
    queue.start(4)?;

    let waiters: Vec<_> = (0..8u64)
        .map(|key| {
            let ready = Arc::clone(&ready);
            std::thread::spawn(move || (key, ready.wait(key, Some(Duration::from_secs(2)))))
        })
        .collect();

    // Let the waiters register before any load can finish
    std::thread::sleep(Duration::from_millis(50));
    let items = (0..8u64)
        .map(|key| queue.submit_payload(key))
        .collect::<Result<Vec<_>, _>>()?;

    for handle in waiters {
        match handle.join() {
            Ok((key, true)) => info!(key, "key ready"),
            Ok((key, false)) => warn!(key, "timed out waiting for key"),
            Err(_) => warn!("waiter thread panicked"),
        }
    }

    queue.finish();
    let complete = items.iter().filter(|item| item.is_complete()).count();
    info!(complete, total = items.len(), "sync-demo finished");
    Ok(())
}
