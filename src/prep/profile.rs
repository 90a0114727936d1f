/*!
 * Profile Provisioning
 * Finds or creates a profile user, preempting a device owner when needed
 */

use crate::core::errors::{PrepError, PrepResult};
use crate::core::types::{ApiLevel, UserId};
use crate::device::owner;
use crate::device::properties::{
    escape_reason, PropertyBag, RUN_TESTS_AS_USER_KEY, SKIP_TESTS_REASON_KEY,
};
use crate::device::traits::DeviceControl;
use crate::device::types::ProfileKind;
use crate::prep::directory::UserDirectory;
use crate::prep::orchestrator::LifecycleState;
use log::{debug, info};

/// API level from which `start_user` supports waiting for completion
const WAIT_FLAG_MIN_API: ApiLevel = 29;

/// API level from which profile creation accepts `--for-testing`
const FOR_TESTING_MIN_API: ApiLevel = 34;

/// How profile provisioning concluded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileStatus {
    /// Profile exists, is started, and is published as the test user
    Ready(UserId),
    /// A capability or capacity precondition failed; setup stops here
    /// without error and the reason is published for downstream tests
    Skipped(String),
}

/// Locates or creates a profile of one kind under the current user.
///
/// Mutates the run's [`LifecycleState`] the moment device state changes
/// (owner removed, profile created) so a failure between steps still
/// leaves teardown enough to undo.
pub struct ProfileProvisioner<'a, D: DeviceControl + ?Sized> {
    device: &'a D,
    kind: ProfileKind,
    test_packages: &'a [String],
}

impl<'a, D: DeviceControl + ?Sized> ProfileProvisioner<'a, D> {
    pub fn new(device: &'a D, kind: ProfileKind, test_packages: &'a [String]) -> Self {
        Self {
            device,
            kind,
            test_packages,
        }
    }

    pub fn ensure_profile(
        &self,
        properties: &mut PropertyBag,
        state: &mut LifecycleState,
    ) -> PrepResult<ProfileStatus> {
        let descriptor = self.device.descriptor();

        if let Some(reason) = self.unsupported_reason()? {
            return Ok(self.skip(properties, state, reason));
        }

        let directory = UserDirectory::new(self.device);
        let existing = directory
            .find_profile(self.kind)
            .map_err(|e| PrepError::from_device(&descriptor, "Failed to list users", e))?;

        let profile = match existing {
            Some(profile) => {
                debug!("Reusing existing {:?} profile {}", self.kind, profile);
                state.created_user = Some(profile);
                profile
            }
            None => {
                let has_room = directory.can_create_additional_users(1).map_err(|e| {
                    PrepError::from_device(&descriptor, "Failed to check user capacity", e)
                })?;
                if !has_room {
                    return Ok(self.skip(
                        properties,
                        state,
                        "Device cannot support additional users".to_string(),
                    ));
                }

                if self.kind.preempts_device_owner() {
                    self.remove_device_owner_if_present(state)?;
                }

                let profile = self.create_profile()?;
                state.created_user = Some(profile);
                state.profile_to_delete = Some(profile);
                profile
            }
        };

        self.start_profile(profile)?;
        self.install_test_packages(profile)?;

        info!("Setting test property {}={}", RUN_TESTS_AS_USER_KEY, profile);
        properties.put(RUN_TESTS_AS_USER_KEY, profile.to_string());
        Ok(ProfileStatus::Ready(profile))
    }

    /// Capability/version gate for this profile kind.
    ///
    /// Returns the human-readable skip reason when unmet.
    fn unsupported_reason(&self) -> PrepResult<Option<String>> {
        let descriptor = self.device.descriptor();

        if let Some(feature) = self.kind.required_feature() {
            let present = self
                .device
                .has_feature(feature)
                .map_err(|e| PrepError::from_device(&descriptor, "Failed to query feature", e))?;
            if !present {
                return Ok(Some(format!("Device does not have feature {}", feature)));
            }
        }

        if let Some(min_api) = self.kind.min_api_level() {
            let api = self.api_level()?;
            if api < min_api {
                return Ok(Some(format!(
                    "Device does not support feature as api level {} requirement does not match",
                    min_api
                )));
            }
        }

        Ok(None)
    }

    fn skip(
        &self,
        properties: &mut PropertyBag,
        state: &mut LifecycleState,
        reason: String,
    ) -> ProfileStatus {
        info!("Skipping profile setup: {}", reason);
        properties.put(SKIP_TESTS_REASON_KEY, escape_reason(&reason));
        state.skip_reason = Some(reason.clone());
        ProfileStatus::Skipped(reason)
    }

    fn remove_device_owner_if_present(&self, state: &mut LifecycleState) -> PrepResult<()> {
        let Some(device_owner) = owner::query_device_owner(self.device)? else {
            return Ok(());
        };
        debug!(
            "{:?} profile cannot be created while a device owner is set; removing {}",
            self.kind, device_owner.component_name
        );
        owner::remove_device_owner(self.device, &device_owner)?;
        // Snapshot only after the removal actually happened: teardown
        // restores exactly what this run took away.
        state.device_owner = Some(device_owner);
        Ok(())
    }

    /// Issue the parent-scoped creation command and parse the new id
    fn create_profile(&self) -> PrepResult<UserId> {
        let descriptor = self.device.descriptor();
        let parent = self
            .device
            .current_user()
            .map_err(|e| PrepError::from_device(&descriptor, "Failed to get the current user", e))?;

        let mut command = format!(
            "pm create-user --profileOf {} --user-type {}",
            parent,
            self.kind.user_type()
        );
        if self.api_level()? >= FOR_TESTING_MIN_API {
            command.push_str(" --for-testing");
        }
        command.push_str(" user");

        let output = self
            .device
            .execute_shell_command(&command)
            .map_err(|e| PrepError::from_device(&descriptor, "Failed to create profile", e))?;

        parse_created_user_id(&output).ok_or_else(|| {
            PrepError::shell_command(descriptor, "Error creating profile", command, output)
        })
    }

    fn start_profile(&self, profile: UserId) -> PrepResult<()> {
        // Older platforms cannot wait for the start to complete
        let wait = self.api_level()? >= WAIT_FLAG_MIN_API;
        self.device.start_user(profile, wait).map_err(|e| {
            PrepError::from_device(&self.device.descriptor(), "Failed to start profile", e)
        })?;
        Ok(())
    }

    fn install_test_packages(&self, profile: UserId) -> PrepResult<()> {
        for package in self.test_packages {
            let command = format!("pm install-existing --user {} {}", profile, package);
            self.device.execute_shell_command(&command).map_err(|e| {
                PrepError::from_device(
                    &self.device.descriptor(),
                    "Failed to install test package",
                    e,
                )
            })?;
        }
        Ok(())
    }

    fn api_level(&self) -> PrepResult<ApiLevel> {
        self.device.api_level().map_err(|e| {
            PrepError::from_device(&self.device.descriptor(), "Failed to query api level", e)
        })
    }
}

/// Pull the created user id out of the creation command's textual result
/// (`Success: created user id 13`)
fn parse_created_user_id(output: &str) -> Option<UserId> {
    let (_, tail) = output.split_once(" id ")?;
    tail.trim().parse::<UserId>().ok()
}
