//! Rendezvous Controller: the crate's public entry point. Glues the
//! pending tables to an external `LaneManager`, driving the synchronous
//! blocking-wait protocol and the fire-and-forget async protocol.

use std::sync::Arc;

use tracing::{info, warn};

use crate::channel_driver;
use crate::collaborators::{
    ChannelOpener, ClientIpc, LaneAllocListener, LaneManager, LaneRequestListener,
    LaneResourceRegistry, PeerLedger, UidPidResolver,
};
use crate::config::PendingConfig;
use crate::error::Result;
use crate::pending_table::{AsyncPendingTable, SyncPendingTable};
use crate::shaper::{self, ShapedRequest};
use crate::types::{LaneConnInfo, LaneHandle, LocalEndpointInfo, SessionParam};

/// The crate's façade. Cheap to clone: every field is an `Arc`, matching
/// how a manager whose methods get captured into background-thread
/// closures is structured elsewhere in this codebase.
pub struct LanePendingController {
    config: Arc<PendingConfig>,
    sync_table: Arc<SyncPendingTable>,
    async_table: Arc<AsyncPendingTable>,
    lane_manager: Arc<dyn LaneManager>,
    peer_ledger: Arc<dyn PeerLedger>,
    uid_pid: Arc<dyn UidPidResolver>,
    channel_opener: Arc<dyn ChannelOpener>,
    client_ipc: Arc<dyn ClientIpc>,
    registry: Arc<dyn LaneResourceRegistry>,
    local_endpoint: Arc<LocalEndpointInfo>,
}

impl Clone for LanePendingController {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            sync_table: self.sync_table.clone(),
            async_table: self.async_table.clone(),
            lane_manager: self.lane_manager.clone(),
            peer_ledger: self.peer_ledger.clone(),
            uid_pid: self.uid_pid.clone(),
            channel_opener: self.channel_opener.clone(),
            client_ipc: self.client_ipc.clone(),
            registry: self.registry.clone(),
            local_endpoint: self.local_endpoint.clone(),
        }
    }
}

impl LanePendingController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: PendingConfig,
        lane_manager: Arc<dyn LaneManager>,
        peer_ledger: Arc<dyn PeerLedger>,
        uid_pid: Arc<dyn UidPidResolver>,
        channel_opener: Arc<dyn ChannelOpener>,
        client_ipc: Arc<dyn ClientIpc>,
        registry: Arc<dyn LaneResourceRegistry>,
        local_endpoint: LocalEndpointInfo,
    ) -> Self {
        Self {
            config: Arc::new(config),
            sync_table: Arc::new(SyncPendingTable::new()),
            async_table: Arc::new(AsyncPendingTable::new()),
            lane_manager,
            peer_ledger,
            uid_pid,
            channel_opener,
            client_ipc,
            registry,
            local_endpoint: Arc::new(local_endpoint),
        }
    }

    /// Shape `param`, submit it to the Lane Manager, and block the
    /// calling thread until the lane is granted, denied, or the
    /// configured timeout elapses.
    pub fn request_sync(&self, param: &SessionParam) -> Result<LaneConnInfo> {
        let outcome = shaper::shape(param, self.peer_ledger.as_ref(), self.uid_pid.as_ref(), &self.config)?;
        let handle = self.lane_manager.mint_handle();
        self.sync_table.add(handle)?;

        let sync_table = self.sync_table.clone();
        let on_success = {
            let sync_table = sync_table.clone();
            Box::new(move |h: LaneHandle, conn_info: LaneConnInfo| {
                let _ = sync_table.update(h, true, 0, Some(conn_info));
            })
        };
        let on_fail = Box::new(move |h: LaneHandle, err_code: i32| {
            let _ = sync_table.update(h, false, err_code, None);
        });

        let submit_result = match outcome.request {
            ShapedRequest::Legacy(option) => self.lane_manager.request_lane(
                handle,
                option,
                LaneRequestListener { on_success, on_fail },
            ),
            ShapedRequest::Qos(info) => self.lane_manager.alloc_lane(
                handle,
                info,
                LaneAllocListener { on_success, on_fail },
            ),
        };

        if let Err(err) = submit_result {
            warn!(handle = handle.0, "lane manager rejected submission");
            let _ = self.sync_table.remove(handle);
            return Err(err);
        }

        let result = self.sync_table.wait(handle, self.config.pending_timeout_ms);
        let _ = self.sync_table.remove(handle);
        result
    }

    /// Shape `param`, submit it to the Lane Manager, and return the
    /// minted handle immediately without blocking. The channel-open
    /// lifecycle continues on whatever thread the Lane Manager's
    /// callback fires on.
    pub fn request_async(&self, param: &SessionParam, first_token_id: u32) -> Result<LaneHandle> {
        let outcome = shaper::shape(param, self.peer_ledger.as_ref(), self.uid_pid.as_ref(), &self.config)?;
        let handle = self.lane_manager.mint_handle();
        self.async_table.add(handle, param.clone(), first_token_id)?;

        let on_success = {
            let controller = self.clone();
            Box::new(move |h: LaneHandle, conn_info: LaneConnInfo| {
                controller.handle_async_success(h, conn_info);
            })
        };
        let on_fail = {
            let controller = self.clone();
            Box::new(move |h: LaneHandle, err_code: i32| {
                controller.handle_async_fail(h, err_code);
            })
        };

        let submit_result = match outcome.request {
            ShapedRequest::Legacy(option) => self.lane_manager.request_lane(
                handle,
                option,
                LaneRequestListener { on_success, on_fail },
            ),
            ShapedRequest::Qos(info) => self.lane_manager.alloc_lane(
                handle,
                info,
                LaneAllocListener { on_success, on_fail },
            ),
        };

        if let Err(err) = submit_result {
            warn!(handle = handle.0, "lane manager rejected async submission");
            let _ = self.async_table.remove(handle);
            return Err(err);
        }

        Ok(handle)
    }

    /// Release every outstanding sync waiter with `CoreError::Shutdown`
    /// and drop all pending async state. Intended for orderly process
    /// teardown.
    pub fn shutdown(&self) {
        self.sync_table.shutdown();
        self.async_table.shutdown();
    }

    fn handle_async_success(&self, handle: LaneHandle, conn_info: LaneConnInfo) {
        let (param, _first_token_id) = match self.async_table.lookup_param(handle) {
            Ok(entry) => entry,
            Err(_) => {
                warn!(handle = handle.0, "async success callback arrived after cleanup, dropping");
                return;
            }
        };

        let drive_result = channel_driver::open_channel_for_lane(
            handle,
            &conn_info,
            &param,
            &self.local_endpoint,
            self.lane_manager.as_ref(),
            self.uid_pid.as_ref(),
            self.channel_opener.as_ref(),
            self.client_ipc.as_ref(),
            self.registry.as_ref(),
        );

        match drive_result {
            Ok(opened) => info!(handle = handle.0, channel_id = opened.channel_id, "async lane driven to open channel"),
            Err(err) => warn!(handle = handle.0, error = %err, "async channel-open lifecycle failed"),
        }

        let _ = self.async_table.remove(handle);
    }

    fn handle_async_fail(&self, handle: LaneHandle, err_code: i32) {
        warn!(handle = handle.0, err_code, "async lane request failed upstream");
        if let Ok((param, _first_token_id)) = self.async_table.lookup_param(handle) {
            let pid = self
                .uid_pid
                .lookup(&param.session_name)
                .map(|(_, pid)| pid)
                .unwrap_or(-1);
            self.client_ipc.on_channel_open_failed(
                param.session_id,
                crate::types::ChannelType::Undefined,
                &param.pkg_name,
                pid,
                err_code,
            );
        }
        let _ = self.async_table.remove(handle);
    }
}
