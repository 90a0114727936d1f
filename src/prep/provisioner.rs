/*!
 * User Provisioning
 * Creates a fresh tool-tagged user or reuses an existing one
 */

use crate::core::errors::{PrepError, PrepResult};
use crate::core::types::{
    UserId, SETTINGS_NAMESPACE_SECURE, TOOL_USER_NAME, USER_SETUP_COMPLETE,
};
use crate::device::traits::DeviceControl;
use crate::prep::directory::UserDirectory;
use crate::prep::orchestrator::LifecycleState;
use crate::prep::quota;
use log::info;

/// Provisions the test user for one lifecycle run.
///
/// Writes into the run's [`LifecycleState`] the moment a user exists on
/// the device, so a failure in any later marking step still leaves enough
/// state behind for teardown to reclaim the user.
pub struct UserProvisioner<'a, D: DeviceControl + ?Sized> {
    device: &'a D,
}

impl<'a, D: DeviceControl + ?Sized> UserProvisioner<'a, D> {
    pub fn new(device: &'a D) -> Self {
        Self { device }
    }

    /// Create or reuse the tool-tagged test user.
    ///
    /// Reuse short-circuits everything: no quota reclamation, no creation,
    /// no re-marking. Otherwise stale tool users are swept if the quota is
    /// reached, a new user named [`TOOL_USER_NAME`] is created, and its
    /// setup-complete flag is written before anyone starts it.
    pub fn provision(&self, reuse: bool, state: &mut LifecycleState) -> PrepResult<UserId> {
        let descriptor = self.device.descriptor();
        let directory = UserDirectory::new(self.device);

        if reuse {
            let existing = directory
                .find_tool_user()
                .map_err(|e| PrepError::from_device(&descriptor, "Failed to list users", e))?;
            if let Some(user) = existing {
                info!("Reusing existing test user {}", user);
                state.created_user = Some(user);
                return Ok(user);
            }
        }

        quota::reclaim_if_needed(&directory)
            .map_err(|e| PrepError::from_device(&descriptor, "Failed to reclaim user quota", e))?;

        let user = self
            .device
            .create_user(TOOL_USER_NAME)
            .map_err(|e| PrepError::from_device(&descriptor, "Failed to create user", e))?;
        state.created_user = Some(user);
        info!("Created test user {}", user);

        self.device
            .set_setting(user, SETTINGS_NAMESPACE_SECURE, USER_SETUP_COMPLETE, "1")
            .map_err(|e| {
                PrepError::from_device(&descriptor, "Failed to mark user setup complete", e)
            })?;

        Ok(user)
    }
}
