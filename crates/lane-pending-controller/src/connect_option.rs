//! Pure translation from a granted `LaneConnInfo` to a `ConnectOption`
//! the channel layer can dial. No side effects, no locking, no logging:
//! a single `match` away from a lookup table.

use crate::error::{CoreError, Result};
use crate::types::{ConnectOption, LaneConnInfo, ProtocolType};

pub fn translate(conn_info: &LaneConnInfo) -> Result<ConnectOption> {
    let option = match conn_info {
        LaneConnInfo::Wlan {
            peer_ip,
            peer_port,
            protocol,
        } => ConnectOption::Tcp {
            addr: peer_ip.clone(),
            port: *peer_port,
            protocol: *protocol,
        },
        LaneConnInfo::P2p { peer_ip } => ConnectOption::P2p {
            addr: peer_ip.clone(),
            protocol: ProtocolType::Ip,
        },
        LaneConnInfo::Hml { peer_ip } => ConnectOption::Hml {
            addr: peer_ip.clone(),
            protocol: ProtocolType::Ip,
        },
        LaneConnInfo::P2pReuse {
            peer_ip,
            peer_port,
            protocol,
        } => ConnectOption::P2pReuse {
            addr: peer_ip.clone(),
            port: *peer_port,
            protocol: *protocol,
        },
        LaneConnInfo::Br { br_mac } => {
            if br_mac.is_empty() {
                return Err(CoreError::InvalidParam("empty BR mac".into()));
            }
            ConnectOption::Br {
                br_mac: br_mac.clone(),
            }
        }
        LaneConnInfo::Ble {
            ble_mac,
            device_id_hash,
            proto_type,
            psm,
        } => {
            if ble_mac.is_empty() {
                return Err(CoreError::InvalidParam("empty BLE mac".into()));
            }
            ConnectOption::Ble {
                ble_mac: ble_mac.clone(),
                device_id_hash: device_id_hash.clone(),
                proto_type: *proto_type,
                psm: *psm,
                fastest_connect_enable: true,
            }
        }
        LaneConnInfo::BleDirect {
            network_id,
            proto_type,
        } => ConnectOption::BleDirect {
            network_id: network_id.clone(),
            proto_type: *proto_type,
        },
    };
    Ok(option)
}
