/*!
 * Device Owner Queries
 * Scrapes the policy-manager dump behind a single capability seam
 */

use crate::core::errors::{PrepError, PrepResult};
use crate::core::types::UserId;
use crate::device::traits::DeviceControl;
use log::debug;
use serde::{Deserialize, Serialize};

/// Shell command whose output carries the device-owner binding
const DUMP_DEVICE_POLICY_COMMAND: &str = "dumpsys device_policy";

/// A privileged policy-management binding that can block profile creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DeviceOwner {
    pub component_name: String,
    pub user_id: UserId,
}

/// Query the active device-owner binding, if any.
///
/// The policy manager only exposes the owner through its diagnostic dump,
/// so this is string scraping by necessity; the parsing lives behind this
/// one seam so other platforms can swap the extraction strategy.
pub fn query_device_owner<D: DeviceControl + ?Sized>(
    device: &D,
) -> PrepResult<Option<DeviceOwner>> {
    let output = device
        .execute_shell_command(DUMP_DEVICE_POLICY_COMMAND)
        .map_err(|e| {
            PrepError::from_device(&device.descriptor(), "Failed to dump device policy", e)
        })?;

    parse_device_owner(&output).map_err(|reason| {
        PrepError::shell_command(
            device.descriptor(),
            format!("Error reading device owner information: {}", reason),
            DUMP_DEVICE_POLICY_COMMAND,
            output.clone(),
        )
    })
}

/// Remove an active device-owner binding.
///
/// The removal command reports success textually; anything else is fatal
/// and carries the command and output verbatim.
pub fn remove_device_owner<D: DeviceControl + ?Sized>(
    device: &D,
    owner: &DeviceOwner,
) -> PrepResult<()> {
    let command = format!(
        "dpm remove-active-admin --user {} {}",
        owner.user_id, owner.component_name
    );
    let output = device
        .execute_shell_command(&command)
        .map_err(|e| PrepError::from_device(&device.descriptor(), "Failed to remove device owner", e))?;

    if !output.starts_with("Success") {
        return Err(PrepError::shell_command(
            device.descriptor(),
            "Error removing device owner",
            command,
            output,
        ));
    }
    debug!("Removed device owner {} (user {})", owner.component_name, owner.user_id);
    Ok(())
}

/// Extract the owner binding from a policy-manager dump.
///
/// No "Device Owner:" marker means no owner. A marker followed by text the
/// scraper cannot make sense of is an error, never a silent None.
fn parse_device_owner(dump: &str) -> Result<Option<DeviceOwner>, String> {
    let Some((_, owner_onwards)) = dump.split_once("Device Owner:") else {
        return Ok(None);
    };

    let component_name = owner_onwards
        .split_once("ComponentInfo{")
        .ok_or("missing ComponentInfo")?
        .1
        .split_once('}')
        .ok_or("unterminated ComponentInfo")?
        .0
        .to_string();

    let user_field = owner_onwards
        .split_once("User ID: ")
        .ok_or("missing User ID")?
        .1;
    let user_id = user_field
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .parse::<UserId>()
        .map_err(|e| format!("unparseable User ID ({})", e))?;

    Ok(Some(DeviceOwner {
        component_name,
        user_id,
    }))
}
