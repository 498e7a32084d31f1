//! Async Channel Driver: turns a granted lane into an opened channel and
//! either frees the lane immediately (TCP-direct fast path) or hands the
//! channel/lane binding to the Lane Resource Registry for later
//! lifecycle management.

use tracing::{info, warn};

use crate::collaborators::{ChannelOpener, ClientIpc, LaneManager, LaneResourceRegistry, UidPidResolver};
use crate::connect_option;
use crate::error::{CoreError, Result};
use crate::types::{
    AppInfo, ChannelInfo, ChannelType, LaneConnInfo, LaneHandle, LocalEndpointInfo, SessionParam,
};

/// Result of successfully driving a lane through to an opened channel.
#[derive(Debug, Clone, Copy)]
pub struct OpenedChannel {
    pub channel_id: i32,
    pub channel_type: ChannelType,
}

/// Drive `conn_info` through connect-option translation, channel open,
/// and either the TCP-direct fast-free path or lane-resource
/// registration. On any failure, any channel that was actually opened is
/// closed and the lane is freed before the error is returned.
#[allow(clippy::too_many_arguments)]
pub fn open_channel_for_lane(
    handle: LaneHandle,
    conn_info: &LaneConnInfo,
    param: &SessionParam,
    local: &LocalEndpointInfo,
    lane_manager: &dyn LaneManager,
    uid_pid: &dyn UidPidResolver,
    channel_opener: &dyn ChannelOpener,
    client_ipc: &dyn ClientIpc,
    registry: &dyn LaneResourceRegistry,
) -> Result<OpenedChannel> {
    let mut option = match connect_option::translate(conn_info) {
        Ok(option) => option,
        Err(err) => {
            warn!(handle = handle.0, error = %err, "connect option translation failed");
            client_ipc.on_channel_open_failed(
                param.session_id,
                ChannelType::Undefined,
                &param.pkg_name,
                -1,
                -1,
            );
            lane_manager.free_lane(handle);
            return Err(err);
        }
    };
    let channel_type = if option.is_p2p() {
        ChannelType::Proxy
    } else {
        ChannelType::TcpDirect
    };

    let (uid, pid) = match uid_pid.lookup(&param.session_name) {
        Ok(ids) => ids,
        Err(err) => {
            warn!(handle = handle.0, "uid/pid resolution failed before channel open");
            client_ipc.on_channel_open_failed(
                param.session_id,
                channel_type,
                &param.pkg_name,
                -1,
                -1,
            );
            lane_manager.free_lane(handle);
            return Err(err);
        }
    };

    let app_info = AppInfo {
        pkg_name: param.pkg_name.clone(),
        session_name: param.session_name.clone(),
        peer_session_name: param.peer_session_name.clone(),
        uid,
        pid,
        my_data: local.clone(),
        connect_option: option.clone(),
        transport_type: param.attr.transport_type.unwrap_or(crate::types::TransportType::Bytes),
    };

    channel_opener.set_module(channel_type, &mut option);

    let channel_id = match channel_opener.open(channel_type, &app_info, &option) {
        Ok(id) => id,
        Err(err) => {
            warn!(handle = handle.0, error = %err, "channel open failed");
            client_ipc.on_channel_open_failed(param.session_id, channel_type, &param.pkg_name, pid, -1);
            lane_manager.free_lane(handle);
            return Err(err);
        }
    };

    let channel_info = ChannelInfo {
        channel_id,
        channel_type,
        peer_device_id: param.peer_device_id.clone(),
        peer_session_name: param.peer_session_name.clone(),
        is_server: false,
    };

    if let Err(err) = client_ipc.set_channel_info(
        &param.pkg_name,
        &param.session_name,
        param.session_id,
        &channel_info,
        pid,
    ) {
        warn!(handle = handle.0, channel_id, "client ipc rejected channel info, rolling back");
        client_ipc.on_channel_open_failed(param.session_id, channel_type, &param.pkg_name, pid, -1);
        channel_opener.close(channel_id, channel_type);
        lane_manager.free_lane(handle);
        return Err(err);
    }

    // TCP-direct fast path: no lane lifecycle binding is needed once the
    // channel is open, since the transport itself owns the connection.
    if channel_type == ChannelType::TcpDirect && !option.is_p2p() {
        lane_manager.free_lane(handle);
        info!(handle = handle.0, channel_id, "tcp-direct fast path, lane freed immediately");
        return Ok(OpenedChannel {
            channel_id,
            channel_type,
        });
    }

    if let Err(err) = registry.add(
        channel_id,
        channel_type,
        conn_info,
        handle,
        param.is_qos_lane,
        local,
    ) {
        warn!(handle = handle.0, channel_id, "lane resource registry rejected binding, rolling back");
        channel_opener.close(channel_id, channel_type);
        lane_manager.free_lane(handle);
        return Err(err);
    }

    info!(handle = handle.0, channel_id, "channel registered against lane resource registry");
    Ok(OpenedChannel {
        channel_id,
        channel_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::mock::{
        MockChannelOpener, MockClientIpc, MockLaneManager, MockLaneResourceRegistry,
        MockUidPidResolver,
    };
    use crate::types::SessionAttribute;

    fn sample_param(is_qos_lane: bool) -> SessionParam {
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
            is_qos_lane,
        }
    }

    #[test]
    fn tcp_conn_info_takes_fast_path_and_frees_lane() {
        let lane_manager = MockLaneManager::new();
        let channel_opener = MockChannelOpener::new();
        let client_ipc = MockClientIpc::new();
        let registry = MockLaneResourceRegistry::new();
        let param = sample_param(true);
        let handle = LaneHandle(1);

        let conn_info = LaneConnInfo::Wlan {
            peer_ip: "10.0.0.1".into(),
            peer_port: 6000,
            protocol: crate::types::ProtocolType::Ip,
        };

        let result = open_channel_for_lane(
            handle,
            &conn_info,
            &param,
            &LocalEndpointInfo::default(),
            &lane_manager,
            &MockUidPidResolver,
            &channel_opener,
            &client_ipc,
            &registry,
        )
        .unwrap();

        assert_eq!(result.channel_type, ChannelType::TcpDirect);
        assert!(registry.entries.lock().unwrap().is_empty());
    }

    #[test]
    fn p2p_conn_info_registers_with_lane_resource_registry() {
        let lane_manager = MockLaneManager::new();
        let channel_opener = MockChannelOpener::new();
        let client_ipc = MockClientIpc::new();
        let registry = MockLaneResourceRegistry::new();
        let param = sample_param(true);
        let handle = LaneHandle(2);

        let conn_info = LaneConnInfo::P2p {
            peer_ip: "192.168.1.1".into(),
        };

        let result = open_channel_for_lane(
            handle,
            &conn_info,
            &param,
            &LocalEndpointInfo::default(),
            &lane_manager,
            &MockUidPidResolver,
            &channel_opener,
            &client_ipc,
            &registry,
        )
        .unwrap();

        assert_eq!(result.channel_type, ChannelType::Proxy);
        assert_eq!(registry.entries.lock().unwrap().as_slice(), [handle]);
    }

    #[test]
    fn channel_open_failure_frees_lane_and_notifies_ipc() {
        let lane_manager = MockLaneManager::new();
        let channel_opener = MockChannelOpener::new();
        *channel_opener.fail_open.lock().unwrap() = true;
        let client_ipc = MockClientIpc::new();
        let registry = MockLaneResourceRegistry::new();
        let param = sample_param(false);
        let handle = LaneHandle(3);

        let conn_info = LaneConnInfo::Br {
            br_mac: "AA:BB:CC".into(),
        };

        let err = open_channel_for_lane(
            handle,
            &conn_info,
            &param,
            &LocalEndpointInfo::default(),
            &lane_manager,
            &MockUidPidResolver,
            &channel_opener,
            &client_ipc,
            &registry,
        )
        .unwrap_err();

        assert!(matches!(err, CoreError::ChannelOpen(_)));
        let calls = client_ipc.open_failed_calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
    }

    #[test]
    fn translate_failure_notifies_ipc_with_undefined_channel_type() {
        let lane_manager = MockLaneManager::new();
        let channel_opener = MockChannelOpener::new();
        let client_ipc = MockClientIpc::new();
        let registry = MockLaneResourceRegistry::new();
        let param = sample_param(false);
        let handle = LaneHandle(7);

        // Empty BR mac is rejected by `connect_option::translate` before
        // any channel is ever opened.
        let conn_info = LaneConnInfo::Br { br_mac: String::new() };

        let err = open_channel_for_lane(
            handle,
            &conn_info,
            &param,
            &LocalEndpointInfo::default(),
            &lane_manager,
            &MockUidPidResolver,
            &channel_opener,
            &client_ipc,
            &registry,
        )
        .unwrap_err();

        assert!(matches!(err, CoreError::InvalidParam(_)));
        let calls = client_ipc.open_failed_calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, ChannelType::Undefined);
    }

    #[test]
    fn registry_rejection_rolls_back_channel_and_lane() {
        let lane_manager = MockLaneManager::new();
        let channel_opener = MockChannelOpener::new();
        let client_ipc = MockClientIpc::new();
        let registry = MockLaneResourceRegistry::new();
        *registry.fail_add.lock().unwrap() = true;
        let param = sample_param(true);
        let handle = LaneHandle(4);

        let conn_info = LaneConnInfo::P2p {
            peer_ip: "192.168.1.1".into(),
        };

        let err = open_channel_for_lane(
            handle,
            &conn_info,
            &param,
            &LocalEndpointInfo::default(),
            &lane_manager,
            &MockUidPidResolver,
            &channel_opener,
            &client_ipc,
            &registry,
        )
        .unwrap_err();

        assert!(matches!(err, CoreError::Registry));
    }
}
