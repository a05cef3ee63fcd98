/*!
 * ConditionVariableMap Integration Tests
 *
 * Keyed wait/signal: per-key wake counts, entry cleanup, timeouts and both
 * wait backends
 */

use ai_os_sync::core::sync::wait::{KeyedWait, WakeResult};
use ai_os_sync::{BackendKind, ConditionVariableMap, SyncConfig};
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn wait_until_queued(map: &ConditionVariableMap, key: u64, n: usize) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while map.waiter_count(key) != n {
        assert!(Instant::now() < deadline, "expected {} waiters on {}", n, key);
        thread::sleep(Duration::from_millis(2));
    }
}

fn maps() -> Vec<ConditionVariableMap> {
    [BackendKind::Futex, BackendKind::Handshake]
        .into_iter()
        .map(|backend| {
            let config = SyncConfig {
                backend,
                ..SyncConfig::default()
            };
            ConditionVariableMap::with_config(4, &config).unwrap()
        })
        .collect()
}

#[test]
fn test_signal_without_waiters_returns_zero() {
    let map = ConditionVariableMap::with_defaults();
    assert_eq!(map.signal(42), 0);
    assert_eq!(map.wake_one(42), WakeResult::NoWaiters);
    assert_eq!(map.tracked_keys(), 0);
}

#[test]
#[serial]
fn test_three_signals_wake_three_distinct_waiters() {
    for map in maps() {
        let map = Arc::new(map);
        let woken = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let (map, woken) = (map.clone(), woken.clone());
                thread::spawn(move || {
                    let ok = map.wait(7, Some(Duration::from_secs(5)));
                    if ok {
                        woken.fetch_add(1, Ordering::SeqCst);
                    }
                    ok
                })
            })
            .collect();

        wait_until_queued(&map, 7, 3);

        for expected in 1..=3 {
            assert_eq!(map.signal(7), 1);
            let deadline = Instant::now() + Duration::from_secs(5);
            while woken.load(Ordering::SeqCst) < expected {
                assert!(Instant::now() < deadline, "signal {} woke nobody", expected);
                thread::sleep(Duration::from_millis(2));
            }
            // Exactly one waiter per signal
            thread::sleep(Duration::from_millis(10));
            assert_eq!(woken.load(Ordering::SeqCst), expected);
        }

        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(map.waiter_count(7), 0);
        assert_eq!(map.tracked_keys(), 0);
    }
}

#[test]
#[serial]
fn test_signal_is_capped_at_queued() {
    let map = Arc::new(ConditionVariableMap::new(2).unwrap());
    let waiter = {
        let map = map.clone();
        thread::spawn(move || map.wait(5, Some(Duration::from_secs(5))))
    };
    wait_until_queued(&map, 5, 1);

    assert_eq!(map.signal(5), 1);
    assert!(waiter.join().unwrap());

    // The credit was consumed with the waiter; nothing is banked for later
    assert!(!map.wait(5, Some(Duration::from_millis(20))));
}

#[test]
#[serial]
fn test_broadcast_wakes_every_waiter_on_key() {
    for map in maps() {
        let map = Arc::new(map);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let map = map.clone();
                thread::spawn(move || map.wait(11, Some(Duration::from_secs(5))))
            })
            .collect();
        wait_until_queued(&map, 11, 4);

        assert_eq!(map.wake_all(11), WakeResult::Woken(4));
        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(map.tracked_keys(), 0);
    }
}

#[test]
#[serial]
fn test_colliding_keys_stay_independent() {
    // Keys 1 and 5 share a shard when there are four
    let map = Arc::new(ConditionVariableMap::new(4).unwrap());
    let short = {
        let map = map.clone();
        thread::spawn(move || map.wait(5, Some(Duration::from_millis(200))))
    };
    let long = {
        let map = map.clone();
        thread::spawn(move || map.wait(1, Some(Duration::from_secs(5))))
    };
    wait_until_queued(&map, 1, 1);
    wait_until_queued(&map, 5, 1);

    map.broadcast(1);
    assert!(long.join().unwrap());
    assert!(!short.join().unwrap());
}

#[test]
fn test_timeout_returns_false() {
    let map = ConditionVariableMap::new(1).unwrap();
    let start = Instant::now();
    assert!(!map.wait(3, Some(Duration::from_millis(40))));
    assert!(start.elapsed() >= Duration::from_millis(40));
    assert_eq!(map.tracked_keys(), 0);
}
