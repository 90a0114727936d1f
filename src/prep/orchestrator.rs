/*!
 * Lifecycle Orchestration
 * The setup/teardown state machine over provisioning and activation
 */

use crate::core::errors::{PrepError, PrepResult};
use crate::core::types::{UserId, INVALID_USER_ID};
use crate::device::owner::DeviceOwner;
use crate::device::properties::{PropertyBag, RUN_TESTS_AS_USER_KEY, SKIP_TESTS_REASON_KEY};
use crate::device::traits::DeviceControl;
use crate::device::types::ProfileKind;
use crate::prep::activation::ActivationStrategy;
use crate::prep::profile::{ProfileProvisioner, ProfileStatus};
use crate::prep::provisioner::UserProvisioner;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle phases; `Idle` is both initial and terminal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Provisioning,
    Activating,
    Ready,
    Deactivating,
    Reclaiming,
}

/// How the test user is prepared for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrepMode {
    /// Create/reuse a user and switch the device foreground to it
    ForegroundSwitch,
    /// Create/reuse a user and start it visible on a secondary display
    BackgroundVisible,
    /// Find or create a profile of this kind under the current user
    Profile(ProfileKind),
}

/// Configuration for one lifecycle run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PrepConfig {
    pub mode: PrepMode,
    /// Keep the tool-tagged user across runs instead of re-creating it
    pub reuse_test_user: bool,
    /// Packages installed into a provisioned profile (must already be on
    /// the device)
    pub test_packages: Vec<String>,
}

impl PrepConfig {
    pub fn new(mode: PrepMode) -> Self {
        Self {
            mode,
            reuse_test_user: false,
            test_packages: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_reuse_test_user(mut self, reuse: bool) -> Self {
        self.reuse_test_user = reuse;
        self
    }

    #[must_use]
    pub fn with_test_package(mut self, package: impl Into<String>) -> Self {
        self.test_packages.push(package.into());
        self
    }
}

/// Everything one setup run recorded, and the only thing teardown reads.
///
/// Populated incrementally as each setup step succeeds; teardown replays
/// it verbatim and never re-derives decisions from the device, so its
/// correctness is independent of device-side drift during the test.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LifecycleState {
    pub phase: Phase,
    /// Foreground user before setup; `None` in background/profile modes
    pub original_user: Option<UserId>,
    /// User or profile this run provisioned or reused; `None` means
    /// nothing to tear down
    pub created_user: Option<UserId>,
    pub reuse_enabled: bool,
    /// Background-visible mode: the user was already visible before this
    /// run touched it, so teardown must not stop it
    pub already_visible_on_start: bool,
    /// Device-owner binding removed to allow profile creation; restored
    /// verbatim at teardown
    pub device_owner: Option<DeviceOwner>,
    /// Set only when the profile was newly created rather than reused
    pub profile_to_delete: Option<UserId>,
    /// Set when a precondition soft-skipped the run
    pub skip_reason: Option<String>,
}

impl LifecycleState {
    fn new(reuse_enabled: bool) -> Self {
        Self {
            reuse_enabled,
            ..Self::default()
        }
    }

    /// The user downstream tests should target, once setup reached Ready
    pub fn active_user(&self) -> Option<UserId> {
        self.created_user
    }

    pub fn is_skipped(&self) -> bool {
        self.skip_reason.is_some()
    }
}

/// Setup failure carrying the partially-populated lifecycle state.
///
/// Whatever setup managed to mutate before failing is recorded in
/// `state`; passing it to [`LifecycleOrchestrator::tear_down`] undoes
/// exactly those steps.
#[derive(Debug)]
pub struct SetupFailure {
    pub error: PrepError,
    pub state: LifecycleState,
}

impl fmt::Display for SetupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

impl std::error::Error for SetupFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Sequences provisioning and activation for setup and replays the mirror
/// image for teardown.
///
/// One instance serves exactly one setup/teardown pair at a time; it is
/// not reentrant and not safe for concurrent setup calls.
pub struct LifecycleOrchestrator {
    config: PrepConfig,
}

impl LifecycleOrchestrator {
    pub fn new(config: PrepConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PrepConfig {
        &self.config
    }

    /// Run setup and return the state that drives the later teardown.
    ///
    /// On failure the returned [`SetupFailure`] carries the state
    /// populated up to the last successful step; callers hand it to
    /// [`Self::tear_down`] unchanged.
    pub fn set_up<D: DeviceControl + ?Sized>(
        &self,
        device: &D,
        properties: &mut PropertyBag,
    ) -> Result<LifecycleState, SetupFailure> {
        let mut state = LifecycleState::new(self.config.reuse_test_user);
        match self.run_setup(device, properties, &mut state) {
            Ok(()) => Ok(state),
            Err(error) => {
                error!("Setup failed in phase {:?}: {}", state.phase, error);
                Err(SetupFailure { error, state })
            }
        }
    }

    fn run_setup<D: DeviceControl + ?Sized>(
        &self,
        device: &D,
        properties: &mut PropertyBag,
        state: &mut LifecycleState,
    ) -> PrepResult<()> {
        match self.config.mode {
            PrepMode::Profile(kind) => self.run_profile_setup(device, properties, state, kind),
            PrepMode::ForegroundSwitch | PrepMode::BackgroundVisible => {
                self.run_user_setup(device, properties, state)
            }
        }
    }

    fn run_user_setup<D: DeviceControl + ?Sized>(
        &self,
        device: &D,
        properties: &mut PropertyBag,
        state: &mut LifecycleState,
    ) -> PrepResult<()> {
        let strategy = match self.config.mode {
            PrepMode::ForegroundSwitch => ActivationStrategy::ForegroundSwitch,
            _ => ActivationStrategy::BackgroundVisible,
        };

        // Capability and foreground-user prechecks happen before any
        // device mutation.
        strategy.precheck(device)?;
        if strategy == ActivationStrategy::ForegroundSwitch {
            let current = device.current_user().map_err(|e| {
                PrepError::from_device(&device.descriptor(), "Failed to get the current user", e)
            })?;
            if current == INVALID_USER_ID {
                return Err(PrepError::setup(
                    device.descriptor(),
                    "Failed to get the current user",
                ));
            }
            state.original_user = Some(current);
        }
        info!(
            "set_up(): original_user={:?}, reuse={}, mode={:?}",
            state.original_user, self.config.reuse_test_user, self.config.mode
        );

        state.phase = Phase::Provisioning;
        let user =
            UserProvisioner::new(device).provision(self.config.reuse_test_user, state)?;

        state.phase = Phase::Activating;
        let record = strategy.activate(device, properties, user)?;
        state.already_visible_on_start = record.already_visible_on_start;

        state.phase = Phase::Ready;
        Ok(())
    }

    fn run_profile_setup<D: DeviceControl + ?Sized>(
        &self,
        device: &D,
        properties: &mut PropertyBag,
        state: &mut LifecycleState,
        kind: ProfileKind,
    ) -> PrepResult<()> {
        state.phase = Phase::Provisioning;
        let provisioner = ProfileProvisioner::new(device, kind, &self.config.test_packages);
        match provisioner.ensure_profile(properties, state)? {
            ProfileStatus::Skipped(reason) => {
                // Deliberate soft-skip: the run still reports success.
                debug!("Profile setup skipped: {}", reason);
                state.phase = Phase::Idle;
            }
            ProfileStatus::Ready(profile) => {
                debug!("Profile {} ready", profile);
                state.phase = Phase::Ready;
            }
        }
        Ok(())
    }

    /// Undo whatever `state` recorded, in reverse order.
    ///
    /// `cause` is the setup or run failure this teardown follows, if any.
    /// A device that became unavailable is not touched at all. Every
    /// individual reversal step is isolated: a failure is logged and the
    /// remaining steps still run.
    pub fn tear_down<D: DeviceControl + ?Sized>(
        &self,
        device: &D,
        properties: &mut PropertyBag,
        state: LifecycleState,
        cause: Option<&PrepError>,
    ) {
        let mut state = state;

        if let Some(reason) = &state.skip_reason {
            debug!("Teardown reduced to property cleanup after skip: {}", reason);
            properties.remove(SKIP_TESTS_REASON_KEY);
            properties.remove(RUN_TESTS_AS_USER_KEY);
            return;
        }

        if state.created_user.is_none() && state.device_owner.is_none() {
            debug!("Skipping teardown because no user was created");
            return;
        }
        if let Some(cause) = cause {
            if cause.is_device_unavailable() {
                debug!("Skipping teardown because the device is unavailable: {}", cause);
                return;
            }
        }

        properties.remove(RUN_TESTS_AS_USER_KEY);

        state.phase = Phase::Deactivating;
        if let Some(created) = state.created_user {
            match self.config.mode {
                PrepMode::ForegroundSwitch => {
                    self.switch_back_to_original_user(device, &state, created);
                }
                PrepMode::BackgroundVisible => {
                    self.stop_test_user(device, &state, created);
                }
                PrepMode::Profile(_) => {
                    // Profiles never took the foreground or a display.
                }
            }
        }

        state.phase = Phase::Reclaiming;
        let user_to_remove = match self.config.mode {
            PrepMode::Profile(_) => state.profile_to_delete,
            _ => state.created_user,
        };
        if state.reuse_enabled {
            debug!("Keeping user {:?} for reuse by the next run", state.created_user);
        } else if let Some(user) = user_to_remove {
            match device.remove_user(user) {
                Ok(true) => debug!("Removed test user {}", user),
                Ok(false) => warn!("Failed to remove user '{}'", user),
                Err(e) => warn!("Failed to remove user '{}': {}", user, e),
            }
        }

        if let Some(device_owner) = &state.device_owner {
            match device.set_device_owner(&device_owner.component_name, device_owner.user_id) {
                Ok(true) => debug!(
                    "Restored device owner {} (user {})",
                    device_owner.component_name, device_owner.user_id
                ),
                Ok(false) => warn!(
                    "Failed to restore device owner '{}'",
                    device_owner.component_name
                ),
                Err(e) => warn!(
                    "Failed to restore device owner '{}': {}",
                    device_owner.component_name, e
                ),
            }
        }

        state.phase = Phase::Idle;
    }

    fn switch_back_to_original_user<D: DeviceControl + ?Sized>(
        &self,
        device: &D,
        state: &LifecycleState,
        created: UserId,
    ) {
        let Some(original) = state.original_user else {
            debug!("Skipping foreground restore because the original user is unknown");
            return;
        };
        debug!(
            "switch_back_to_original_user(): switching current user from {} to user {}",
            created, original
        );
        match device.switch_user(original) {
            Ok(true) => {}
            Ok(false) => error!("Failed to switch back to original user '{}'", original),
            Err(e) => error!("Failed to switch back to original user '{}': {}", original, e),
        }
    }

    fn stop_test_user<D: DeviceControl + ?Sized>(
        &self,
        device: &D,
        state: &LifecycleState,
        created: UserId,
    ) {
        if state.already_visible_on_start {
            debug!("stop_test_user(): user {} was already visible on start", created);
            return;
        }
        debug!("stop_test_user(): stopping user {}", created);
        match device.stop_user(created, true, true) {
            Ok(true) => {}
            Ok(false) => error!("Failed to stop user '{}'", created),
            Err(e) => error!("Failed to stop user '{}': {}", created, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_phase_starts_idle() {
        assert_eq!(Phase::default(), Phase::Idle);
        assert_eq!(LifecycleState::default().phase, Phase::Idle);
    }

    #[test]
    fn test_state_serialization_round_trip() {
        let state = LifecycleState {
            phase: Phase::Ready,
            original_user: Some(0),
            created_user: Some(11),
            reuse_enabled: true,
            already_visible_on_start: false,
            device_owner: Some(DeviceOwner {
                component_name: "com.example/.Admin".to_string(),
                user_id: 0,
            }),
            profile_to_delete: None,
            skip_reason: None,
        };
        let json = serde_json::to_string(&state).unwrap();
        let back: LifecycleState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, back);
    }

    #[test]
    fn test_config_builder() {
        let config = PrepConfig::new(PrepMode::Profile(ProfileKind::Managed))
            .with_reuse_test_user(true)
            .with_test_package("com.example.tests");
        assert!(config.reuse_test_user);
        assert_eq!(config.test_packages, vec!["com.example.tests".to_string()]);
    }

    #[test]
    fn test_empty_state_has_nothing_to_tear_down() {
        let state = LifecycleState::default();
        assert_eq!(state.active_user(), None);
        assert!(!state.is_skipped());
    }
}
