//! Infrastructure layer - printer links, permission brokering and configuration

pub mod config;
pub mod permission;
pub mod transports;

pub use config::{PrintlinkConfig, TransportTimeouts};
pub use permission::{
    AllowAllBroker, ChannelPermissionBroker, PermissionBroker, PermissionPrompt, PermissionRequest,
    PermissionResponder,
};
pub use transports::{AnyTransport, MockControl, MockTransport, TransportFactory};
