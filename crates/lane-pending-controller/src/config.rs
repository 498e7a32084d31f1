//! Tunables for the pending-request rendezvous protocol.

use serde::{Deserialize, Serialize};

/// Session-name prefixes/constants the shaper matches against. These are
/// protocol constants, not deployment knobs, so they live as `const`s
/// rather than fields on `PendingConfig`.
pub const SESSION_NAME_PHONEPAD: &str = "com.huawei.pcassistant.phonepad-connect-channel";
pub const SESSION_NAME_CASTPLUS: &str = "CastPlusSessionName";
pub const SESSION_NAME_DISTRIBUTE_COMMUNICATION: &str = "distributeddata-default";
pub const SESSION_NAME_DBD: &str = "device.security.level";
pub const SESSION_NAME_ISHARE_PREFIX: &str = "IShare";
pub const SESSION_NAME_BOOSTERD_USER: &str = "com.huawei.boosterd.user";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingConfig {
    /// Overall budget a synchronous caller will block in `wait` for,
    /// in milliseconds. `0` means wait indefinitely.
    pub pending_timeout_ms: u64,
    /// Minimum length an `IShare`-prefixed session name must have before
    /// the p2p-only override applies.
    pub ishare_min_name_len: usize,
}

impl Default for PendingConfig {
    fn default() -> Self {
        Self {
            pending_timeout_ms: 5000,
            ishare_min_name_len: 6,
        }
    }
}
