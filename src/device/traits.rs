/*!
 * Device Capability Trait
 * The blocking seam between lifecycle logic and the device transport
 */

use crate::core::errors::DeviceResult;
use crate::core::types::{ApiLevel, DisplayId, UserId};
use crate::device::types::UserRecord;
use std::collections::{BTreeMap, BTreeSet};

/// Capabilities the lifecycle machinery needs from a device under test.
///
/// Every operation is a blocking call that returns or fails before the
/// next step begins. Boolean returns report device-side acceptance; a
/// transport failure is an `Err` instead.
#[cfg_attr(test, mockall::automock)]
pub trait DeviceControl: Send + Sync {
    /// Stable identity echoed into error messages (serial, descriptor)
    fn descriptor(&self) -> String;

    /// Current foreground user, or [`crate::core::types::INVALID_USER_ID`]
    fn current_user(&self) -> DeviceResult<UserId>;

    /// Create a user; rejections surface as `DeviceError::StateConflict`
    fn create_user(&self, name: &str) -> DeviceResult<UserId>;

    fn start_user(&self, user: UserId, wait: bool) -> DeviceResult<bool>;

    fn switch_user(&self, user: UserId) -> DeviceResult<bool>;

    fn stop_user(&self, user: UserId, wait: bool, force: bool) -> DeviceResult<bool>;

    fn remove_user(&self, user: UserId) -> DeviceResult<bool>;

    /// All users currently on the device
    fn list_users(&self) -> DeviceResult<Vec<UserRecord>>;

    /// All users keyed by id
    fn user_infos(&self) -> DeviceResult<BTreeMap<UserId, UserRecord>>;

    fn max_number_of_users_supported(&self) -> DeviceResult<usize>;

    fn is_visible_background_users_supported(&self) -> DeviceResult<bool>;

    /// Whether the default display itself hosts visible background users
    /// (e.g. passenger displays on an automotive head unit)
    fn is_visible_background_users_on_default_display_supported(&self) -> DeviceResult<bool>;

    fn list_display_ids_for_starting_visible_background_users(
        &self,
    ) -> DeviceResult<BTreeSet<DisplayId>>;

    fn is_user_visible_on_display(&self, user: UserId, display: DisplayId) -> DeviceResult<bool>;

    fn start_visible_background_user(
        &self,
        user: UserId,
        display: DisplayId,
        wait: bool,
    ) -> DeviceResult<bool>;

    /// Run a shell command and return its raw textual output
    fn execute_shell_command(&self, command: &str) -> DeviceResult<String>;

    fn has_feature(&self, feature: &str) -> DeviceResult<bool>;

    fn api_level(&self) -> DeviceResult<ApiLevel>;

    fn set_setting(
        &self,
        user: UserId,
        namespace: &str,
        key: &str,
        value: &str,
    ) -> DeviceResult<()>;

    /// Install a policy-manager binding; used to restore a preempted owner
    fn set_device_owner(&self, component: &str, user: UserId) -> DeviceResult<bool>;
}
