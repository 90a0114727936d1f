/*!
 * DUT Prep Library
 * Test-user lifecycle management for a remote device under test
 *
 * Creates or reuses an ephemeral test user, brings it into play
 * (foreground switch, background-visible start, or profile creation with
 * device-owner preemption), and deterministically restores the device to
 * its pre-test state afterward, even under partial failure.
 */

pub mod core;
pub mod device;
pub mod prep;

// Re-exports
pub use crate::core::errors::{DeviceError, DeviceResult, PrepError, PrepResult};
pub use crate::core::types::{
    ApiLevel, DisplayId, UserId, DEFAULT_DISPLAY, INVALID_USER_ID, TOOL_USER_NAME,
    USER_SETUP_COMPLETE,
};
pub use device::owner::DeviceOwner;
pub use device::properties::{PropertyBag, RUN_TESTS_AS_USER_KEY, SKIP_TESTS_REASON_KEY};
pub use device::traits::DeviceControl;
pub use device::types::{ProfileKind, UserKind, UserRecord};
pub use prep::orchestrator::{
    LifecycleOrchestrator, LifecycleState, Phase, PrepConfig, PrepMode, SetupFailure,
};
