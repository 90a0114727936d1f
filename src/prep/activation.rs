/*!
 * Activation Strategies
 * Brings the provisioned user into play: foreground switch or
 * background-visible start on a secondary display
 */

use crate::core::errors::{PrepError, PrepResult};
use crate::core::types::{DisplayId, UserId, DEFAULT_DISPLAY};
use crate::device::properties::{PropertyBag, RUN_TESTS_AS_USER_KEY};
use crate::device::traits::DeviceControl;
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// How the test user becomes active, chosen once per run and never mixed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationStrategy {
    /// Start the user, then make it the device's foreground user
    ForegroundSwitch,
    /// Start the user visible on a secondary display, leaving the
    /// foreground user untouched
    BackgroundVisible,
}

/// What activation observed; teardown replays this, never the device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivationRecord {
    /// The target user was already visible before this run touched it
    pub already_visible_on_start: bool,
}

impl ActivationStrategy {
    /// Capability gate run before any device mutation
    pub fn precheck<D: DeviceControl + ?Sized>(&self, device: &D) -> PrepResult<()> {
        match self {
            ActivationStrategy::ForegroundSwitch => Ok(()),
            ActivationStrategy::BackgroundVisible => {
                let supported = device.is_visible_background_users_supported().map_err(|e| {
                    PrepError::from_device(
                        &device.descriptor(),
                        "Failed to query visible background user support",
                        e,
                    )
                })?;
                if !supported {
                    return Err(PrepError::setup(
                        device.descriptor(),
                        "Visible background users feature not supported",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Activate the target user according to this strategy
    pub fn activate<D: DeviceControl + ?Sized>(
        &self,
        device: &D,
        properties: &mut PropertyBag,
        user: UserId,
    ) -> PrepResult<ActivationRecord> {
        match self {
            ActivationStrategy::ForegroundSwitch => {
                switch_current_user(device, user)?;
                Ok(ActivationRecord::default())
            }
            ActivationStrategy::BackgroundVisible => {
                let already_visible = start_visible_on_background(device, user)?;
                info!("Setting test property {}={}", RUN_TESTS_AS_USER_KEY, user);
                properties.put(RUN_TESTS_AS_USER_KEY, user.to_string());
                Ok(ActivationRecord {
                    already_visible_on_start: already_visible,
                })
            }
        }
    }
}

/// Start the user (blocking) and switch the foreground to it.
///
/// Both steps are required; either failure is fatal and names the step.
fn switch_current_user<D: DeviceControl + ?Sized>(device: &D, user: UserId) -> PrepResult<()> {
    let descriptor = device.descriptor();
    let started = device
        .start_user(user, true)
        .map_err(|e| PrepError::from_device(&descriptor, "Failed to start user", e))?;
    if !started {
        return Err(PrepError::setup(
            descriptor,
            format!("Failed to start user '{}'", user),
        ));
    }
    let switched = device
        .switch_user(user)
        .map_err(|e| PrepError::from_device(&descriptor, "Failed to switch user", e))?;
    if !switched {
        return Err(PrepError::setup(
            descriptor,
            format!("Failed to switch to user '{}'", user),
        ));
    }
    Ok(())
}

/// Start the user visible on a secondary display, blocking until confirmed.
///
/// Returns whether the user was already visible on the chosen display, in
/// which case nothing was started and teardown must not stop it.
fn start_visible_on_background<D: DeviceControl + ?Sized>(
    device: &D,
    user: UserId,
) -> PrepResult<bool> {
    let descriptor = device.descriptor();
    let display = pick_display(device, user)?;

    let already_visible = device
        .is_user_visible_on_display(user, display)
        .map_err(|e| PrepError::from_device(&descriptor, "Failed to query user visibility", e))?;
    if already_visible {
        debug!("User {} already visible on display {}", user, display);
        return Ok(true);
    }

    debug!("Starting user {} visible on display {}", user, display);
    let started = device
        .start_visible_background_user(user, display, true)
        .map_err(|e| {
            PrepError::from_device(&descriptor, "Failed to start visible background user", e)
        })?;
    if !started {
        return Err(PrepError::setup(
            descriptor,
            format!("Failed to start user '{}' on display {}", user, display),
        ));
    }
    Ok(false)
}

/// Deterministically pick the display to host the test user.
///
/// First display in enumeration order wins. When the device also hosts
/// visible background users on its default display, that display belongs
/// to the real foreground user and is excluded from the candidates.
fn pick_display<D: DeviceControl + ?Sized>(device: &D, user: UserId) -> PrepResult<DisplayId> {
    let descriptor = device.descriptor();
    let displays = device
        .list_display_ids_for_starting_visible_background_users()
        .map_err(|e| PrepError::from_device(&descriptor, "Failed to list displays", e))?;
    debug!("Candidate displays: {:?}", displays);

    let exclude_default = device
        .is_visible_background_users_on_default_display_supported()
        .map_err(|e| {
            PrepError::from_device(&descriptor, "Failed to query default display support", e)
        })?;

    displays
        .into_iter()
        .find(|display| !(exclude_default && *display == DEFAULT_DISPLAY))
        .ok_or_else(|| {
            PrepError::setup(
                descriptor,
                format!("No display available to start user '{}'", user),
            )
        })
}
