/*!
 * Slot guard tests
 */

use ai_os_sync::{Guard, ScopedAllSlots, ScopedSlot, SlottedMutex, SlottedSpinLock};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

#[test]
fn test_slot_guard_by_hashed_key() {
    let slots = SlottedSpinLock::new(8).unwrap();
    let idx = slots.index_of("dataset/shard-17");
    let guard = ScopedSlot::new(&slots, idx).unwrap();
    assert_eq!(guard.index(), idx);
    assert!(!slots.try_lock(idx));
    drop(guard);
    assert!(slots.try_lock(idx));
    slots.unlock(idx).unwrap();
}

#[test]
fn test_all_slots_excludes_single_slot_users() {
    let slots = Arc::new(SlottedMutex::new(4).unwrap());
    let counter = Arc::new(AtomicUsize::new(0));

    let all = ScopedAllSlots::new(&*slots).unwrap();
    assert_eq!(all.resource_type(), "scoped_all_slots");

    let worker = {
        let (slots, counter) = (slots.clone(), counter.clone());
        thread::spawn(move || {
            let _slot = ScopedSlot::new(&*slots, 3).unwrap();
            counter.fetch_add(1, Ordering::SeqCst);
        })
    };

    thread::sleep(std::time::Duration::from_millis(30));
    assert_eq!(counter.load(Ordering::SeqCst), 0);
    drop(all);

    worker.join().unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}
