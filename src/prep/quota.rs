/*!
 * Quota Reclamation
 * Frees user slots by sweeping stale tool-tagged users
 */

use crate::core::errors::DeviceResult;
use crate::device::traits::DeviceControl;
use crate::prep::directory::UserDirectory;
use log::{debug, warn};

/// Remove stale tool-tagged users when the device is at its user quota.
///
/// Counts every non-guest user against `max_number_of_users_supported`;
/// at or over the limit, every user bearing the reserved tag is removed.
/// Tagged users are disposable by definition, so clearing them is always
/// safe and maximizes the chance the next creation succeeds. Best-effort:
/// a removal the device refuses is logged and skipped, and the subsequent
/// create call is the one that decides success.
pub fn reclaim_if_needed<D: DeviceControl + ?Sized>(
    directory: &UserDirectory<'_, D>,
) -> DeviceResult<()> {
    let mut tool_users = Vec::new();
    let mut existing_count = 0usize;

    for record in directory.user_infos()?.values() {
        if !record.is_guest() {
            // Guest users don't fall under the quota
            existing_count += 1;
        }
        if record.is_tool_user() {
            tool_users.push(record.id);
        }
    }

    if existing_count < directory.max_users()? {
        return Ok(());
    }

    debug!(
        "User quota reached ({} existing); removing {} tool-tagged user(s)",
        existing_count,
        tool_users.len()
    );
    for user in tool_users {
        match directory.device().remove_user(user) {
            Ok(true) => debug!("Removed stale tool user {}", user),
            Ok(false) => warn!("Device refused to remove stale tool user {}", user),
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
