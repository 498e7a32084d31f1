//! Lane pending controller: turns a session-open request into a
//! concrete transport channel across whichever physical link the peer
//! and local device actually share.
//!
//! This crate owns request shaping, the pending-table rendezvous
//! protocol (both the blocking synchronous path and the fire-and-forget
//! asynchronous path), lane-to-connect-option translation, and the
//! channel-open/lifecycle-registration driver that runs once a lane is
//! granted. Link discovery, the transport itself, and IPC/session
//! framing are out of scope; this crate consumes them through the
//! traits in [`collaborators`].

pub mod channel_driver;
pub mod collaborators;
pub mod config;
pub mod connect_option;
pub mod error;
pub mod pending_table;
pub mod rendezvous;
pub mod shaper;
pub mod types;

pub use config::PendingConfig;
pub use error::{CoreError, Result};
pub use rendezvous::LanePendingController;
pub use types::{
    AppInfo, ChannelInfo, ChannelType, ConnectOption, LaneAllocInfo, LaneConnInfo, LaneHandle,
    LaneLinkType, LaneRequestOption, LinkType, LocalEndpointInfo, QosRequirement, SessionParam,
};
