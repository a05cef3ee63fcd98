/*!
 * Scoped lock guard tests
 */

use ai_os_sync::{
    ConditionVariable, Guard, GuardError, GuardResult, Lockable, Mutex, ReadWriteLock,
    RwLockBackend, ScopedLock, ScopedReadLock, ScopedWriteLock, SpinLock, SyncError,
};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn locked_sum(lock: &dyn Lockable, values: &[i64]) -> GuardResult<i64> {
    let _guard = ScopedLock::new(lock)?;
    let mut sum = 0;
    for value in values {
        if *value < 0 {
            return Err(GuardError::Lock(SyncError::InvalidCapacity(0)));
        }
        sum += value;
    }
    Ok(sum)
}

#[test]
fn test_guard_over_trait_object() {
    let spin = SpinLock::new();
    let mutex = Mutex::fast();

    for lock in [&spin as &dyn Lockable, &mutex as &dyn Lockable] {
        assert_eq!(locked_sum(lock, &[1, 2, 3]), Ok(6));
        assert!(locked_sum(lock, &[1, -1]).is_err());
        assert!(lock.try_acquire(), "{} left locked", lock.kind_name());
        lock.release().unwrap();
    }
}

#[test]
fn test_recursive_mutex_nested_guards() {
    let mutex = Mutex::recursive();
    {
        let _outer = ScopedLock::new(&mutex).unwrap();
        {
            let _inner = ScopedLock::new(&mutex).unwrap();
            assert_eq!(mutex.depth(), 2);
        }
        assert_eq!(mutex.depth(), 1);
    }
    assert!(!mutex.is_locked());
}

#[test]
fn test_wait_through_guard() {
    let state = Arc::new((Mutex::fast(), ConditionVariable::new(), AtomicBool::new(false)));

    let waiter = {
        let state = state.clone();
        thread::spawn(move || {
            let (mutex, cv, flag) = &*state;
            let guard = ScopedLock::new(mutex).unwrap();
            while !flag.load(Ordering::SeqCst) {
                cv.wait_for(guard.lock(), Duration::from_millis(50)).unwrap();
            }
            guard.is_active()
        })
    };

    thread::sleep(Duration::from_millis(20));
    {
        let (mutex, cv, flag) = &*state;
        let _guard = ScopedLock::new(mutex).unwrap();
        flag.store(true, Ordering::SeqCst);
        cv.signal();
    }

    assert!(waiter.join().unwrap());
    assert!(!state.0.is_locked());
}

#[test]
fn test_read_write_guards_both_backends() {
    for backend in [RwLockBackend::Native, RwLockBackend::Spin] {
        let lock = ReadWriteLock::with_backend(backend);
        {
            let mut reader = ScopedReadLock::new(&lock).unwrap();
            assert_eq!(reader.resource_type(), "scoped_read_lock");
            reader.release().unwrap();
            assert_eq!(reader.release(), Err(GuardError::AlreadyReleased));
        }
        {
            let _writer = ScopedWriteLock::try_new_for(&lock, Duration::from_millis(10)).unwrap();
            assert!(lock.is_write_locked());
        }
        assert_eq!(lock.readers(), 0);
        assert!(!lock.is_write_locked());
    }
}
