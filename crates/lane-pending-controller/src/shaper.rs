//! Request Shaper: turns a `SessionParam` into the concrete request a
//! `LaneManager` understands, either a legacy `LaneRequestOption` or a
//! QoS `LaneAllocInfo`.
//!
//! The caller's `SessionParam.is_qos_lane` is never mutated here. Only a
//! call-scoped "effective" decision is downgraded by the legacy-OS/mesh
//! override; the original flag survives into the async pending entry
//! unchanged, because the channel driver's free-lane/registry choice
//! depends on what the caller actually asked for, not on how this
//! request happened to get shaped.

use crate::collaborators::{PeerLedger, UidPidResolver};
use crate::config::{
    PendingConfig, SESSION_NAME_BOOSTERD_USER, SESSION_NAME_CASTPLUS, SESSION_NAME_DBD,
    SESSION_NAME_DISTRIBUTE_COMMUNICATION, SESSION_NAME_ISHARE_PREFIX, SESSION_NAME_PHONEPAD,
};
use crate::error::{CoreError, Result};
use crate::types::{
    DiscoveryType, LaneAllocInfo, LaneLinkType, LaneRequestOption, LinkType, QosRequirement,
    QosType, SessionParam, TransportType, LANE_LINK_TYPE_BUTT, LINK_TYPE_TABLE, PROTOCOL_ALL,
    PROTOCOL_NIP,
};
#[cfg(feature = "constrained-platform")]
use crate::types::RemoteStrKey;

/// Outcome of shaping: which path the request takes and whether the
/// effective QoS-lane decision was downgraded from the caller's
/// original request.
pub enum ShapedRequest {
    Legacy(LaneRequestOption),
    Qos(LaneAllocInfo),
}

pub struct ShapeOutcome {
    pub request: ShapedRequest,
    pub effective_is_qos_lane: bool,
}

/// Top-level dispatcher. The legacy-OS/mesh predicate is checked before
/// branching on `param.is_qos_lane`, exactly like the reference
/// implementation consults it unconditionally inside its option-shaping
/// path regardless of which top-level entry point was called.
pub fn shape(
    param: &SessionParam,
    peer_ledger: &dyn PeerLedger,
    uid_pid: &dyn UidPidResolver,
    config: &PendingConfig,
) -> Result<ShapeOutcome> {
    if peer_device_is_legacy_os(param, peer_ledger) || is_mesh_sync(&param.session_name) {
        let option = shape_request_option(param, peer_ledger, uid_pid, config)?;
        return Ok(ShapeOutcome {
            request: ShapedRequest::Legacy(option),
            effective_is_qos_lane: false,
        });
    }

    if param.is_qos_lane {
        let info = shape_alloc_info(param, peer_ledger, uid_pid)?;
        Ok(ShapeOutcome {
            request: ShapedRequest::Qos(info),
            effective_is_qos_lane: true,
        })
    } else {
        let option = shape_request_option(param, peer_ledger, uid_pid, config)?;
        Ok(ShapeOutcome {
            request: ShapedRequest::Legacy(option),
            effective_is_qos_lane: false,
        })
    }
}

/// Legacy (option-based) shaping path. Applies the network-delegate,
/// p2p-only, and legacy-OS/mesh-link overrides.
pub fn shape_request_option(
    param: &SessionParam,
    peer_ledger: &dyn PeerLedger,
    uid_pid: &dyn UidPidResolver,
    config: &PendingConfig,
) -> Result<LaneRequestOption> {
    let (uid, pid) = uid_pid.lookup(&param.session_name)?;
    let transport_type = resolve_transport_type(param)?;
    let mut preferred = transform_preferred_links(&param.attr.preferred_links);

    if peer_device_is_legacy_os(param, peer_ledger) || is_mesh_sync(&param.session_name) {
        preferred = legacy_link_override();
    }

    Ok(LaneRequestOption {
        peer_device_id: param.peer_device_id.clone(),
        transport_type,
        preferred_link_list: preferred,
        acceptable_protocols: acceptable_protocols(param, peer_ledger),
        p2p_only: p2p_only_override(&param.session_name, config.ishare_min_name_len),
        network_delegate: network_delegate_override(&param.session_name),
        uid,
        pid,
        #[cfg(feature = "constrained-platform")]
        peer_ble_mac: resolve_peer_ble_mac(param, peer_ledger),
    })
}

/// QoS (alloc-based) shaping path. Carries the network-delegate
/// override same as the legacy path; no p2p-only override and no
/// legacy-link override, since those only apply to the legacy path in
/// the reference implementation.
pub fn shape_alloc_info(
    param: &SessionParam,
    peer_ledger: &dyn PeerLedger,
    uid_pid: &dyn UidPidResolver,
) -> Result<LaneAllocInfo> {
    let (uid, pid) = uid_pid.lookup(&param.session_name)?;
    let transport_type = resolve_transport_type(param)?;
    let preferred = transform_preferred_links(&param.attr.preferred_links);

    Ok(LaneAllocInfo {
        peer_network_id: param.peer_network_id.clone(),
        transport_type,
        preferred_link_list: preferred,
        acceptable_protocols: acceptable_protocols(param, peer_ledger),
        qos: extract_qos(&param.qos),
        network_delegate: network_delegate_override(&param.session_name),
        uid,
        pid,
        #[cfg(feature = "constrained-platform")]
        peer_ble_mac: resolve_peer_ble_mac(param, peer_ledger),
    })
}

/// Map the session's attributes to a `TransportType`. Rejects with
/// `CoreError::InvalidParam` when the session carries no mappable
/// transport type, matching the reference's `SOFTBUS_TRANS_INVALID_SESSION_TYPE`
/// rejection instead of silently defaulting to a guessed transport.
fn resolve_transport_type(param: &SessionParam) -> Result<TransportType> {
    param
        .attr
        .transport_type
        .ok_or_else(|| CoreError::InvalidParam("unmappable session type".into()))
}

/// Resolve the peer's BLE MAC for constrained-platform builds only; an
/// unknown peer or a ledger miss resolves to the empty string rather
/// than failing the request.
#[cfg(feature = "constrained-platform")]
fn resolve_peer_ble_mac(param: &SessionParam, peer_ledger: &dyn PeerLedger) -> String {
    peer_ledger
        .get_remote_str(&param.peer_network_id, RemoteStrKey::BleMac)
        .unwrap_or_default()
}

/// Translate caller-supplied `LinkType` preferences into `LaneLinkType`s,
/// dropping entries with no lane equivalent. An input longer than
/// `LANE_LINK_TYPE_BUTT` (the sentinel's own ordinal value, also the
/// maximum number of distinct real lane link types) is rejected
/// wholesale rather than truncated, matching the reference
/// `TransformSessionPreferredToLanePreferred`'s zeroed-list behavior for
/// an over-length input.
pub fn transform_preferred_links(preferred: &[LinkType]) -> Vec<LaneLinkType> {
    if preferred.len() > LANE_LINK_TYPE_BUTT {
        return Vec::new();
    }
    preferred
        .iter()
        .filter_map(|link| LINK_TYPE_TABLE[*link as usize])
        .collect()
}

/// The legacy-OS/mesh override forces the preferred-link list to this
/// fixed set regardless of what the caller asked for.
fn legacy_link_override() -> Vec<LaneLinkType> {
    vec![LaneLinkType::Wlan5G, LaneLinkType::Wlan2P4G, LaneLinkType::Br]
}

/// True when the peer has zero auth capacity and the session is one of
/// the two names known to run on legacy-OS peers without QoS lane
/// support.
fn peer_device_is_legacy_os(param: &SessionParam, peer_ledger: &dyn PeerLedger) -> bool {
    let auth_capacity = peer_ledger
        .get_auth_capacity(&param.peer_network_id)
        .unwrap_or(u32::MAX);
    if auth_capacity != 0 {
        return false;
    }
    param.session_name == SESSION_NAME_DISTRIBUTE_COMMUNICATION
        || param.session_name.starts_with(SESSION_NAME_DBD)
}

/// Independent of auth capacity: any session name in the mesh-sync
/// family forces the legacy link set.
fn is_mesh_sync(session_name: &str) -> bool {
    session_name.starts_with(SESSION_NAME_DBD)
}

/// Phonepad/CastPlus sessions always route through the network delegate
/// rather than a direct lane.
fn network_delegate_override(session_name: &str) -> bool {
    session_name == SESSION_NAME_PHONEPAD || session_name == SESSION_NAME_CASTPLUS
}

/// `boosterd.user` sessions, and `IShare`-prefixed sessions whose name is
/// at least `min_len` characters long, are pinned to P2P only. Legacy
/// path only: the QoS path has no p2p-only concept.
fn p2p_only_override(session_name: &str, min_len: usize) -> bool {
    session_name == SESSION_NAME_BOOSTERD_USER || is_share_session(session_name, min_len)
}

fn is_share_session(session_name: &str, min_len: usize) -> bool {
    session_name.starts_with(SESSION_NAME_ISHARE_PREFIX) && session_name.len() >= min_len
}

/// `ALL` with the NIP bit cleared by default; NIP is added back when the
/// peer advertises LSA discovery.
fn acceptable_protocols(param: &SessionParam, peer_ledger: &dyn PeerLedger) -> u32 {
    let base = PROTOCOL_ALL & !PROTOCOL_NIP;
    let has_lsa = peer_ledger
        .get_remote_node(&param.peer_network_id)
        .map(|node| peer_ledger.has_discovery_type(&node, DiscoveryType::Lsa))
        .unwrap_or(false);
    if has_lsa {
        base | PROTOCOL_NIP
    } else {
        base
    }
}

/// Extract and normalize QoS fields from the session's raw QoS list.
/// `RttLevel` is clamped to be non-negative; every other field defaults
/// to `0` when absent.
fn extract_qos(qos: &[crate::types::QosItem]) -> QosRequirement {
    let mut requirement = QosRequirement::default();
    for item in qos {
        match item.qos_type {
            QosType::MinBw => requirement.min_bw_kbps = item.value,
            QosType::MaxLatency => requirement.max_latency_ms = item.value,
            QosType::MinLatency => requirement.min_latency_ms = item.value,
            QosType::RttLevel => requirement.rtt_level = item.value.max(0),
        }
    }
    requirement
}
