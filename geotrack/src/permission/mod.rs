//! Sensor-access permission handling.
//!
//! Permission transitions are driven by the platform and only observed here.
//! Listener registrations are [`Subscription`] handles that tear the platform
//! listener down when dropped.

mod adapter;
mod monitor;
mod subscription;

pub use adapter::{
    PermissionAdapter, PermissionError, PermissionSink, PermissionState, ScriptedPermissions,
    UnsupportedPermissions,
};
pub use monitor::{guidance, PermissionAction, PermissionMonitor, DENIED_GUIDANCE, PROMPT_GUIDANCE};
pub use subscription::Subscription;
