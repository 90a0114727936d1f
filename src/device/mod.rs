/*!
 * Device Module
 * Capability seams between lifecycle logic and the device under test
 */

pub mod owner;
pub mod properties;
pub mod traits;
pub mod types;

// Re-export for convenience
pub use owner::{query_device_owner, remove_device_owner, DeviceOwner};
pub use properties::{PropertyBag, RUN_TESTS_AS_USER_KEY, SKIP_TESTS_REASON_KEY};
pub use traits::DeviceControl;
pub use types::{ProfileKind, UserKind, UserRecord};

#[cfg(test)]
pub(crate) use traits::MockDeviceControl;
