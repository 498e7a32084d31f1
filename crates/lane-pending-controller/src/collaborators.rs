//! External collaborator traits the controller depends on. A real
//! deployment supplies its own Lane Manager, peer ledger, channel
//! opener, IPC bridge, and lane-resource registry; this crate only
//! specifies the seams and provides in-memory mocks for its own tests.

use crate::error::Result;
use crate::types::{
    AppInfo, ChannelInfo, ChannelType, ConnectOption, DiscoveryType, LaneAllocInfo, LaneConnInfo,
    LaneHandle, LaneRequestOption, LocalEndpointInfo, NodeInfo, RemoteNumKey, RemoteStrKey,
};

/// Listener invoked by `LaneManager::request_lane`'s legacy path.
pub struct LaneRequestListener {
    pub on_success: Box<dyn Fn(LaneHandle, LaneConnInfo) + Send + Sync>,
    pub on_fail: Box<dyn Fn(LaneHandle, i32) + Send + Sync>,
}

/// Listener invoked by `LaneManager::alloc_lane`'s QoS path.
pub struct LaneAllocListener {
    pub on_success: Box<dyn Fn(LaneHandle, LaneConnInfo) + Send + Sync>,
    pub on_fail: Box<dyn Fn(LaneHandle, i32) + Send + Sync>,
}

/// The upstream lane allocation subsystem. Calls may complete
/// synchronously (invoking the listener before returning) or
/// asynchronously from an arbitrary thread; callers must not assume
/// either.
pub trait LaneManager: Send + Sync {
    fn mint_handle(&self) -> LaneHandle;
    fn request_lane(
        &self,
        handle: LaneHandle,
        option: LaneRequestOption,
        listener: LaneRequestListener,
    ) -> Result<()>;
    fn alloc_lane(
        &self,
        handle: LaneHandle,
        info: LaneAllocInfo,
        listener: LaneAllocListener,
    ) -> Result<()>;
    fn free_lane(&self, handle: LaneHandle);
}

/// Read-only view of what's known about remote peers, used by the
/// shaper to derive network-delegate / p2p-only / acceptable-protocol
/// overrides.
pub trait PeerLedger: Send + Sync {
    fn get_remote_node(&self, network_id: &str) -> Option<NodeInfo>;
    fn has_discovery_type(&self, info: &NodeInfo, discovery_type: DiscoveryType) -> bool;
    fn get_remote_str(&self, network_id: &str, key: RemoteStrKey) -> Option<String>;
    fn get_remote_num(&self, network_id: &str, key: RemoteNumKey) -> Option<i32>;
    fn get_auth_capacity(&self, network_id: &str) -> Option<u32>;
}

pub trait UidPidResolver: Send + Sync {
    fn lookup(&self, session_name: &str) -> Result<(u32, i32)>;
}

pub trait ChannelOpener: Send + Sync {
    fn set_module(&self, channel_type: ChannelType, option: &mut ConnectOption);
    fn open(&self, channel_type: ChannelType, app_info: &AppInfo, option: &ConnectOption) -> Result<i32>;
    fn close(&self, channel_id: i32, channel_type: ChannelType);
}

pub trait ClientIpc: Send + Sync {
    fn on_channel_open_failed(
        &self,
        session_id: i32,
        channel_type: ChannelType,
        pkg_name: &str,
        pid: i32,
        err_code: i32,
    );
    fn set_channel_info(
        &self,
        pkg_name: &str,
        session_name: &str,
        session_id: i32,
        info: &ChannelInfo,
        pid: i32,
    ) -> Result<()>;
}

pub trait LaneResourceRegistry: Send + Sync {
    fn add(
        &self,
        channel_id: i32,
        channel_type: ChannelType,
        conn_info: &LaneConnInfo,
        handle: LaneHandle,
        is_qos_lane: bool,
        my_data: &LocalEndpointInfo,
    ) -> Result<()>;
}

/// In-memory collaborator implementations. Used by this crate's own
/// tests and available to integration tests / demo harnesses that need
/// a Lane Manager without a real transport stack behind it.
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// In-memory lane manager. `request_lane`/`alloc_lane` queue the
    /// listener; a test drives completion explicitly via
    /// `complete_success`/`complete_fail`, or `make_synchronous` to have
    /// every request resolve immediately on the calling thread.
    #[derive(Default)]
    pub struct MockLaneManager {
        next_handle: Mutex<u32>,
        synchronous_result: Mutex<Option<Result<LaneConnInfo>>>,
        pending: Mutex<Vec<(LaneHandle, LaneRequestListener)>>,
        pending_alloc: Mutex<Vec<(LaneHandle, LaneAllocListener)>>,
    }

    impl MockLaneManager {
        pub fn new() -> Self {
            Self {
                next_handle: Mutex::new(1),
                synchronous_result: Mutex::new(None),
                pending: Mutex::new(Vec::new()),
                pending_alloc: Mutex::new(Vec::new()),
            }
        }

        /// Every subsequent `request_lane`/`alloc_lane` call completes
        /// synchronously, before returning, with `result`.
        pub fn make_synchronous(&self, result: Result<LaneConnInfo>) {
            *self.synchronous_result.lock().unwrap() = Some(result);
        }

        pub fn complete_success(&self, handle: LaneHandle, conn_info: LaneConnInfo) {
            if let Some((_, listener)) = Self::take(&self.pending, handle) {
                (listener.on_success)(handle, conn_info);
            } else if let Some((_, listener)) = Self::take(&self.pending_alloc, handle) {
                (listener.on_success)(handle, conn_info);
            }
        }

        pub fn complete_fail(&self, handle: LaneHandle, err_code: i32) {
            if let Some((_, listener)) = Self::take(&self.pending, handle) {
                (listener.on_fail)(handle, err_code);
            } else if let Some((_, listener)) = Self::take(&self.pending_alloc, handle) {
                (listener.on_fail)(handle, err_code);
            }
        }

        fn take<L>(
            store: &Mutex<Vec<(LaneHandle, L)>>,
            handle: LaneHandle,
        ) -> Option<(LaneHandle, L)> {
            let mut guard = store.lock().unwrap();
            let idx = guard.iter().position(|(h, _)| *h == handle)?;
            Some(guard.remove(idx))
        }
    }

    impl LaneManager for MockLaneManager {
        fn mint_handle(&self) -> LaneHandle {
            let mut next = self.next_handle.lock().unwrap();
            let handle = LaneHandle(*next);
            *next += 1;
            handle
        }

        fn request_lane(
            &self,
            handle: LaneHandle,
            _option: LaneRequestOption,
            listener: LaneRequestListener,
        ) -> Result<()> {
            if let Some(result) = self.synchronous_result.lock().unwrap().take() {
                match result {
                    Ok(conn_info) => (listener.on_success)(handle, conn_info),
                    Err(err) => (listener.on_fail)(handle, err_code_of(&err)),
                }
                return Ok(());
            }
            self.pending.lock().unwrap().push((handle, listener));
            Ok(())
        }

        fn alloc_lane(
            &self,
            handle: LaneHandle,
            _info: LaneAllocInfo,
            listener: LaneAllocListener,
        ) -> Result<()> {
            if let Some(result) = self.synchronous_result.lock().unwrap().take() {
                match result {
                    Ok(conn_info) => (listener.on_success)(handle, conn_info),
                    Err(err) => (listener.on_fail)(handle, err_code_of(&err)),
                }
                return Ok(());
            }
            self.pending_alloc.lock().unwrap().push((handle, listener));
            Ok(())
        }

        fn free_lane(&self, handle: LaneHandle) {
            Self::take(&self.pending, handle);
            Self::take(&self.pending_alloc, handle);
        }
    }

    fn err_code_of(err: &crate::error::CoreError) -> i32 {
        match err {
            crate::error::CoreError::UpstreamLane(code) => *code,
            _ => -1,
        }
    }

    #[derive(Default)]
    pub struct MockPeerLedger {
        nodes: Mutex<std::collections::HashMap<String, NodeInfo>>,
        auth_capacity: Mutex<std::collections::HashMap<String, u32>>,
        str_values: Mutex<std::collections::HashMap<(String, RemoteStrKey), String>>,
        num_values: Mutex<std::collections::HashMap<(String, RemoteNumKey), i32>>,
    }

    impl MockPeerLedger {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert_node(&self, info: NodeInfo) {
            self.nodes
                .lock()
                .unwrap()
                .insert(info.network_id.clone(), info);
        }

        pub fn set_auth_capacity(&self, network_id: &str, capacity: u32) {
            self.auth_capacity
                .lock()
                .unwrap()
                .insert(network_id.to_string(), capacity);
        }

        pub fn set_str(&self, network_id: &str, key: RemoteStrKey, value: &str) {
            self.str_values
                .lock()
                .unwrap()
                .insert((network_id.to_string(), key), value.to_string());
        }

        pub fn set_num(&self, network_id: &str, key: RemoteNumKey, value: i32) {
            self.num_values
                .lock()
                .unwrap()
                .insert((network_id.to_string(), key), value);
        }
    }

    impl PeerLedger for MockPeerLedger {
        fn get_remote_node(&self, network_id: &str) -> Option<NodeInfo> {
            self.nodes.lock().unwrap().get(network_id).cloned()
        }

        fn has_discovery_type(&self, info: &NodeInfo, discovery_type: DiscoveryType) -> bool {
            info.discovery_types.contains(&discovery_type)
        }

        fn get_remote_str(&self, network_id: &str, key: RemoteStrKey) -> Option<String> {
            self.str_values
                .lock()
                .unwrap()
                .get(&(network_id.to_string(), key))
                .cloned()
        }

        fn get_remote_num(&self, network_id: &str, key: RemoteNumKey) -> Option<i32> {
            self.num_values
                .lock()
                .unwrap()
                .get(&(network_id.to_string(), key))
                .copied()
        }

        fn get_auth_capacity(&self, network_id: &str) -> Option<u32> {
            self.auth_capacity.lock().unwrap().get(network_id).copied()
        }
    }

    pub struct MockUidPidResolver;

    impl UidPidResolver for MockUidPidResolver {
        fn lookup(&self, _session_name: &str) -> Result<(u32, i32)> {
            Ok((1000, 2000))
        }
    }

    #[derive(Default)]
    pub struct MockChannelOpener {
        pub fail_open: Mutex<bool>,
        next_channel_id: Mutex<i32>,
    }

    impl MockChannelOpener {
        pub fn new() -> Self {
            Self {
                fail_open: Mutex::new(false),
                next_channel_id: Mutex::new(1),
            }
        }
    }

    impl ChannelOpener for MockChannelOpener {
        fn set_module(&self, _channel_type: ChannelType, _option: &mut ConnectOption) {}

        fn open(
            &self,
            _channel_type: ChannelType,
            _app_info: &AppInfo,
            _option: &ConnectOption,
        ) -> Result<i32> {
            if *self.fail_open.lock().unwrap() {
                return Err(crate::error::CoreError::ChannelOpen("mock open failed".into()));
            }
            let mut next = self.next_channel_id.lock().unwrap();
            let id = *next;
            *next += 1;
            Ok(id)
        }

        fn close(&self, _channel_id: i32, _channel_type: ChannelType) {}
    }

    #[derive(Default)]
    pub struct MockClientIpc {
        pub fail_set_channel_info: Mutex<bool>,
        /// Every `(session_id, channel_type, err_code)` passed to
        /// `on_channel_open_failed`, in call order.
        pub open_failed_calls: Mutex<Vec<(i32, ChannelType, i32)>>,
    }

    impl MockClientIpc {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl ClientIpc for MockClientIpc {
        fn on_channel_open_failed(
            &self,
            session_id: i32,
            channel_type: ChannelType,
            _pkg_name: &str,
            _pid: i32,
            err_code: i32,
        ) {
            self.open_failed_calls
                .lock()
                .unwrap()
                .push((session_id, channel_type, err_code));
        }

        fn set_channel_info(
            &self,
            _pkg_name: &str,
            _session_name: &str,
            _session_id: i32,
            _info: &ChannelInfo,
            _pid: i32,
        ) -> Result<()> {
            if *self.fail_set_channel_info.lock().unwrap() {
                return Err(crate::error::CoreError::InvalidParam("ipc rejected".into()));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct MockLaneResourceRegistry {
        pub fail_add: Mutex<bool>,
        pub entries: Mutex<Vec<LaneHandle>>,
    }

    impl MockLaneResourceRegistry {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl LaneResourceRegistry for MockLaneResourceRegistry {
        fn add(
            &self,
            _channel_id: i32,
            _channel_type: ChannelType,
            _conn_info: &LaneConnInfo,
            handle: LaneHandle,
            _is_qos_lane: bool,
            _my_data: &LocalEndpointInfo,
        ) -> Result<()> {
            if *self.fail_add.lock().unwrap() {
                return Err(crate::error::CoreError::Registry);
            }
            self.entries.lock().unwrap().push(handle);
            Ok(())
        }
    }
}
