//! Data model shared by every module in this crate.

use serde::{Deserialize, Serialize};

/// Opaque identifier minted by the rendezvous controller for one pending
/// lane request. Never reused while a request for it is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LaneHandle(pub u32);

/// Raw link preference as the caller (session layer) expresses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum LinkType {
    WlanWifiP2p = 0,
    WlanWifiP2pReuse = 1,
    Bt = 2,
    BtBle = 3,
    Eth = 4,
    Coc = 5,
    CocDirect = 6,
    BleDirect = 7,
    Hml = 8,
    Wlan2P4G = 9,
    Wlan5G = 10,
    /// Sentinel: not a real link preference. Maps to `LaneLinkType::Butt`
    /// and is dropped by `TransformSessionPreferredToLanePreferred`.
    Unknown = 11,
}

pub const LINK_TYPE_MAX: usize = 11;

/// Internal lane-module link classification. `Butt` is the sentinel cap;
/// a preferred-link list is never allowed to exceed `LANE_LINK_TYPE_BUTT`
/// entries and never contains `Butt` itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum LaneLinkType {
    P2p = 0,
    P2pReuse = 1,
    Br = 2,
    Ble = 3,
    Eth = 4,
    Coc = 5,
    CocDirect = 6,
    BleDirect = 7,
    Hml = 8,
    Wlan2P4G = 9,
    Wlan5G = 10,
    Butt = 11,
}

pub const LANE_LINK_TYPE_BUTT: usize = 11;

/// Fixed `LinkType -> LaneLinkType` translation table, index-matched to
/// `LinkType`'s discriminants. `None` means "no lane equivalent"; entries
/// mapping here are dropped rather than forwarded.
pub(crate) const LINK_TYPE_TABLE: [Option<LaneLinkType>; LINK_TYPE_MAX + 1] = [
    Some(LaneLinkType::P2p),      // WlanWifiP2p
    Some(LaneLinkType::P2pReuse), // WlanWifiP2pReuse
    None,                         // Bt (no standalone lane link)
    Some(LaneLinkType::Ble),      // BtBle
    Some(LaneLinkType::Eth),      // Eth
    Some(LaneLinkType::Coc),      // Coc
    Some(LaneLinkType::CocDirect),// CocDirect
    Some(LaneLinkType::BleDirect),// BleDirect
    Some(LaneLinkType::Hml),      // Hml
    Some(LaneLinkType::Wlan2P4G), // Wlan2P4G
    Some(LaneLinkType::Wlan5G),   // Wlan5G
    None,                         // Unknown / sentinel
];

/// One QoS item as carried in a session's raw attribute list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QosType {
    MinBw,
    MaxLatency,
    MinLatency,
    RttLevel,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QosItem {
    pub qos_type: QosType,
    pub value: i32,
}

/// Extracted, normalized QoS requirement for a lane allocation request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QosRequirement {
    pub min_bw_kbps: i32,
    pub max_latency_ms: i32,
    pub min_latency_ms: i32,
    pub rtt_level: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportType {
    Msg,
    Bytes,
    File,
    Stream,
}

/// Session-level attributes the shaper reads; everything else about a
/// session lives on `SessionParam` directly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionAttribute {
    pub preferred_links: Vec<LinkType>,
    pub transport_type: Option<TransportType>,
}

/// Bitmask of acceptable transport protocols. `ALL` with the NIP bit
/// cleared is the default; NIP is added back in when the peer advertises
/// LSA discovery.
pub const PROTOCOL_ALL: u32 = 0xFFFF_FFFF;
pub const PROTOCOL_NIP: u32 = 1 << 0;

/// Caller-supplied description of the session that needs a lane. Owned
/// end to end: cloning this type *is* the deep copy the async pending
/// table needs, since every field is `String`/`Vec`-backed rather than
/// borrowed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionParam {
    pub pkg_name: String,
    pub session_name: String,
    /// Session identifier the client IPC layer correlates channel-open
    /// success/failure notifications against. Distinct from `LaneHandle`:
    /// this id is minted by the session layer, not the lane manager.
    pub session_id: i32,
    pub peer_session_name: String,
    pub peer_device_id: String,
    pub peer_network_id: String,
    pub group_id: String,
    pub attr: SessionAttribute,
    pub qos: Vec<QosItem>,
    /// Caller's original QoS-lane request. Never mutated by the shaper;
    /// see `shaper::shape` for why this matters.
    pub is_qos_lane: bool,
}

/// Output of the legacy (option-based) shaping path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneRequestOption {
    pub peer_device_id: String,
    pub transport_type: TransportType,
    pub preferred_link_list: Vec<LaneLinkType>,
    pub acceptable_protocols: u32,
    pub p2p_only: bool,
    pub network_delegate: bool,
    pub uid: u32,
    pub pid: i32,
    /// Peer's BLE MAC, resolved only on constrained-platform builds; empty
    /// string everywhere else, and on resolution failure.
    #[cfg(feature = "constrained-platform")]
    pub peer_ble_mac: String,
}

/// Output of the QoS (alloc-based) shaping path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneAllocInfo {
    pub peer_network_id: String,
    pub transport_type: TransportType,
    pub preferred_link_list: Vec<LaneLinkType>,
    pub acceptable_protocols: u32,
    pub qos: QosRequirement,
    pub network_delegate: bool,
    pub uid: u32,
    pub pid: i32,
    /// Peer's BLE MAC, resolved only on constrained-platform builds; empty
    /// string everywhere else, and on resolution failure.
    #[cfg(feature = "constrained-platform")]
    pub peer_ble_mac: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolType {
    Ip,
    Ble,
}

/// Concrete transport description returned by the Lane Manager once a
/// lane has been granted, tagged by link kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LaneConnInfo {
    Wlan {
        peer_ip: String,
        peer_port: u16,
        protocol: ProtocolType,
    },
    P2p {
        peer_ip: String,
    },
    Hml {
        peer_ip: String,
    },
    P2pReuse {
        peer_ip: String,
        peer_port: u16,
        protocol: ProtocolType,
    },
    Br {
        br_mac: String,
    },
    /// Shared shape for both BLE and CoC link kinds; `proto_type` is the
    /// field that distinguishes which one a given entry actually is.
    Ble {
        ble_mac: String,
        device_id_hash: String,
        proto_type: i32,
        psm: i32,
    },
    /// Shared shape for both BLE-direct and CoC-direct link kinds, same
    /// `proto_type` distinction as `Ble`.
    BleDirect {
        network_id: String,
        proto_type: i32,
    },
}

/// What the channel layer actually dials. Produced from `LaneConnInfo`
/// by `connect_option::translate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConnectOption {
    Tcp {
        addr: String,
        port: u16,
        protocol: ProtocolType,
    },
    P2p {
        addr: String,
        protocol: ProtocolType,
    },
    Hml {
        addr: String,
        protocol: ProtocolType,
    },
    P2pReuse {
        addr: String,
        port: u16,
        protocol: ProtocolType,
    },
    Br {
        br_mac: String,
    },
    Ble {
        ble_mac: String,
        device_id_hash: String,
        proto_type: i32,
        psm: i32,
        fastest_connect_enable: bool,
    },
    BleDirect {
        network_id: String,
        proto_type: i32,
    },
}

impl ConnectOption {
    /// True for every P2P-family option; the channel driver uses this to
    /// decide between the TCP-direct fast path and lane-resource
    /// registration.
    pub fn is_p2p(&self) -> bool {
        matches!(self, ConnectOption::P2p { .. } | ConnectOption::Hml { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelType {
    TcpDirect,
    Proxy,
    Udp,
    /// No channel was ever opened; used when reporting a failure that
    /// occurred before a channel type was determined (e.g. upstream lane
    /// allocation failure, or translation failure before open).
    Undefined,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalEndpointInfo {
    pub device_id: String,
    pub pkg_name: String,
    pub addr: String,
}

/// Inputs handed to the channel opener and IPC layer once a concrete
/// connect option is known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppInfo {
    pub pkg_name: String,
    pub session_name: String,
    pub peer_session_name: String,
    pub uid: u32,
    pub pid: i32,
    pub my_data: LocalEndpointInfo,
    pub connect_option: ConnectOption,
    pub transport_type: TransportType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub channel_id: i32,
    pub channel_type: ChannelType,
    pub peer_device_id: String,
    pub peer_session_name: String,
    pub is_server: bool,
}

/// What a `PeerLedger` knows about a remote node, used to derive the
/// network-delegate and acceptable-protocol shaping overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeInfo {
    pub network_id: String,
    pub device_id: String,
    pub discovery_types: Vec<DiscoveryType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscoveryType {
    Wifi,
    Ble,
    Br,
    Lsa,
    Coap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteStrKey {
    BleMac,
    BrMac,
    WlanIp,
    NetworkId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteNumKey {
    WlanPort,
}
