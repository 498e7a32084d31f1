//! The two pending tables: one for synchronous (blocking-wait) lane
//! requests, one for asynchronous ones. Each table is a single
//! `Mutex<HashMap<LaneHandle, Entry>>`; a sync entry additionally owns
//! the `Condvar` its waiter blocks on.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::error::{CoreError, Result};
use crate::types::{LaneConnInfo, LaneHandle, SessionParam};

struct SyncEntry {
    finished: bool,
    success: bool,
    shutdown: bool,
    err_code: i32,
    conn_info: Option<LaneConnInfo>,
}

/// Table of outstanding synchronous requests. A caller blocks in `wait`
/// until the matching callback invokes `update`, or the timeout elapses.
#[derive(Default)]
pub struct SyncPendingTable {
    entries: Mutex<HashMap<LaneHandle, (SyncEntry, Arc<Condvar>)>>,
}

impl SyncPendingTable {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn add(&self, handle: LaneHandle) -> Result<()> {
        let mut guard = self.lock()?;
        guard.insert(
            handle,
            (
                SyncEntry {
                    finished: false,
                    success: false,
                    shutdown: false,
                    err_code: 0,
                    conn_info: None,
                },
                Arc::new(Condvar::new()),
            ),
        );
        Ok(())
    }

    pub fn remove(&self, handle: LaneHandle) -> Result<()> {
        let mut guard = self.lock()?;
        guard.remove(&handle);
        Ok(())
    }

    /// Record the outcome for `handle` and wake whoever is waiting on it.
    /// A handle with no matching entry (e.g. the waiter already timed out
    /// and was removed) is silently ignored: the callback arrived too
    /// late to matter.
    pub fn update(
        &self,
        handle: LaneHandle,
        success: bool,
        err_code: i32,
        conn_info: Option<LaneConnInfo>,
    ) -> Result<()> {
        let mut guard = self.lock()?;
        if let Some((entry, condvar)) = guard.get_mut(&handle) {
            entry.finished = true;
            entry.success = success;
            entry.err_code = err_code;
            entry.conn_info = conn_info;
            condvar.notify_all();
        }
        Ok(())
    }

    /// Block until `handle`'s entry is finished or `timeout_ms` elapses
    /// (`0` waits indefinitely). On success, returns the recorded
    /// `LaneConnInfo`; on upstream failure, returns
    /// `CoreError::UpstreamLane`; on expiry, `CoreError::Timeout`.
    pub fn wait(&self, handle: LaneHandle, timeout_ms: u64) -> Result<LaneConnInfo> {
        let mut guard = self.lock()?;
        let condvar = match guard.get(&handle) {
            Some((_, condvar)) => condvar.clone(),
            None => return Err(CoreError::NotFound(handle)),
        };

        if timeout_ms == 0 {
            loop {
                let (entry, _) = guard
                    .get(&handle)
                    .ok_or(CoreError::NotFound(handle))?;
                if entry.finished {
                    break;
                }
                guard = condvar
                    .wait(guard)
                    .map_err(|_| CoreError::LockError)?;
            }
        } else {
            let deadline = Instant::now() + Duration::from_millis(timeout_ms);
            loop {
                let (entry, _) = guard
                    .get(&handle)
                    .ok_or(CoreError::NotFound(handle))?;
                if entry.finished {
                    break;
                }
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(CoreError::Timeout);
                }
                let (next_guard, timed_out) = condvar
                    .wait_timeout(guard, remaining)
                    .map_err(|_| CoreError::LockError)?;
                guard = next_guard;
                if timed_out.timed_out() {
                    let finished = guard
                        .get(&handle)
                        .map(|(entry, _)| entry.finished)
                        .unwrap_or(false);
                    if !finished {
                        return Err(CoreError::Timeout);
                    }
                }
            }
        }

        let (entry, _) = guard.get(&handle).ok_or(CoreError::NotFound(handle))?;
        if entry.shutdown {
            Err(CoreError::Shutdown)
        } else if entry.success {
            Ok(entry.conn_info.clone().ok_or(CoreError::LockError)?)
        } else {
            Err(CoreError::UpstreamLane(entry.err_code))
        }
    }

    /// Mark every outstanding entry as finished with `CoreError::Shutdown`
    /// and wake all waiters. Entries are left in place for their waiter
    /// to observe and remove via the normal `wait`-then-`remove`
    /// sequence; clearing them here would race a waiter that hasn't
    /// reacquired the lock yet.
    pub fn shutdown(&self) {
        let guard = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut guard = guard;
        for (entry, condvar) in guard.values_mut() {
            entry.finished = true;
            entry.success = false;
            entry.shutdown = true;
            condvar.notify_all();
        }
    }

    /// Recovers a poisoned mutex instead of propagating the panic: a panic
    /// while one caller held the lock must not permanently wedge every
    /// other caller's access to the table.
    fn lock(&self) -> Result<MutexGuard<'_, HashMap<LaneHandle, (SyncEntry, Arc<Condvar>)>>> {
        Ok(self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }
}

/// Table of outstanding asynchronous requests. No waiter blocks on these
/// entries; they exist purely so the success/fail callback (which may
/// fire on any thread, long after the original call returned) can look
/// up the `SessionParam` it needs to drive the channel-open step.
#[derive(Default)]
pub struct AsyncPendingTable {
    entries: Mutex<HashMap<LaneHandle, (SessionParam, u32)>>,
}

impl AsyncPendingTable {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Insert `handle`'s entry, deep-copying `param`. Ordinary Rust value
    /// semantics (an owned `SessionParam::clone()`) already satisfy the
    /// deep-copy requirement; there is no separate buffer-allocation step
    /// to fail independently of the process-wide allocator.
    pub fn add(&self, handle: LaneHandle, param: SessionParam, first_token_id: u32) -> Result<()> {
        let mut guard = self.lock()?;
        guard.insert(handle, (param, first_token_id));
        Ok(())
    }

    pub fn remove(&self, handle: LaneHandle) -> Result<()> {
        let mut guard = self.lock()?;
        guard.remove(&handle);
        Ok(())
    }

    /// Owned clone of the stored `SessionParam`. The original source
    /// hands back a shallow view under the table lock; Rust's ownership
    /// rules make that view's lifetime awkward to express safely, so
    /// this returns an owned clone instead. The caller already holds no
    /// other reference into the table, so the extra allocation is the
    /// only meaningful cost.
    pub fn lookup_param(&self, handle: LaneHandle) -> Result<(SessionParam, u32)> {
        let guard = self.lock()?;
        guard
            .get(&handle)
            .cloned()
            .ok_or(CoreError::NotFound(handle))
    }

    pub fn shutdown(&self) {
        let mut guard = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.clear();
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<LaneHandle, (SessionParam, u32)>>> {
        Ok(self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionAttribute;
    use std::thread;
    use std::time::Duration;

    fn handle(n: u32) -> LaneHandle {
        LaneHandle(n)
    }

    fn sample_param() -> SessionParam {
        SessionParam {
            pkg_name: "pkg".into(),
            session_name: "session".into(),
            session_id: 1,
            peer_session_name: "peer-session".into(),
            peer_device_id: "peer-device".into(),
            peer_network_id: "peer-network".into(),
            group_id: "group".into(),
            attr: SessionAttribute::default(),
            qos: vec![],
            is_qos_lane: false,
        }
    }

    #[test]
    fn wait_returns_conn_info_on_success() {
        let table = SyncPendingTable::new();
        let h = handle(1);
        table.add(h).unwrap();
        table
            .update(
                h,
                true,
                0,
                Some(LaneConnInfo::Wlan {
                    peer_ip: "10.0.0.1".into(),
                    peer_port: 80,
                    protocol: crate::types::ProtocolType::Ip,
                }),
            )
            .unwrap();
        let info = table.wait(h, 1000).unwrap();
        assert!(matches!(info, LaneConnInfo::Wlan { .. }));
    }

    #[test]
    fn wait_returns_upstream_error_on_failure() {
        let table = SyncPendingTable::new();
        let h = handle(2);
        table.add(h).unwrap();
        table.update(h, false, 42, None).unwrap();
        let err = table.wait(h, 1000).unwrap_err();
        assert!(matches!(err, CoreError::UpstreamLane(42)));
    }

    #[test]
    fn wait_times_out_when_never_updated() {
        let table = SyncPendingTable::new();
        let h = handle(3);
        table.add(h).unwrap();
        let start = Instant::now();
        let err = table.wait(h, 100).unwrap_err();
        assert!(matches!(err, CoreError::Timeout));
        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[test]
    fn wait_unblocks_from_another_thread() {
        let table = Arc::new(SyncPendingTable::new());
        let h = handle(4);
        table.add(h).unwrap();

        let updater = table.clone();
        let t = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            updater
                .update(
                    h,
                    true,
                    0,
                    Some(LaneConnInfo::Br {
                        br_mac: "AA:BB".into(),
                    }),
                )
                .unwrap();
        });

        let result = table.wait(h, 2000);
        t.join().unwrap();
        assert!(result.is_ok());
    }

    #[test]
    fn update_after_remove_is_silently_dropped() {
        let table = SyncPendingTable::new();
        let h = handle(5);
        table.add(h).unwrap();
        table.remove(h).unwrap();
        // No entry left; update must not panic or resurrect the handle.
        table.update(h, true, 0, None).unwrap();
        let err = table.wait(h, 10).unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[test]
    fn shutdown_unblocks_waiters_with_shutdown_error() {
        let table = Arc::new(SyncPendingTable::new());
        let h = handle(6);
        table.add(h).unwrap();

        let shutdowner = table.clone();
        let t = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            shutdowner.shutdown();
        });

        let err = table.wait(h, 5000).unwrap_err();
        t.join().unwrap();
        assert!(matches!(err, CoreError::Shutdown));
    }

    #[test]
    fn async_table_round_trips_deep_copy() {
        let table = AsyncPendingTable::new();
        let h = handle(7);
        let mut param = sample_param();
        param.is_qos_lane = true;
        table.add(h, param.clone(), 99).unwrap();

        let (looked_up, token) = table.lookup_param(h).unwrap();
        assert_eq!(looked_up.session_name, param.session_name);
        assert!(looked_up.is_qos_lane);
        assert_eq!(token, 99);
    }

    #[test]
    fn async_lookup_missing_handle_is_not_found() {
        let table = AsyncPendingTable::new();
        let err = table.lookup_param(handle(8)).unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[test]
    fn async_remove_clears_entry() {
        let table = AsyncPendingTable::new();
        let h = handle(9);
        table.add(h, sample_param(), 1).unwrap();
        table.remove(h).unwrap();
        assert!(table.lookup_param(h).is_err());
    }
}
