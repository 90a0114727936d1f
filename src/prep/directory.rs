/*!
 * User Directory
 * Read-only view of the device's current user set
 */

use crate::core::errors::DeviceResult;
use crate::core::types::{UserId, INVALID_USER_ID};
use crate::device::traits::DeviceControl;
use crate::device::types::{ProfileKind, UserRecord};
use std::collections::BTreeMap;

/// Thin adapter over the device's user table.
///
/// Holds a borrow for one query batch and never caches: every call reads
/// the device again, so results reflect whatever the last mutation did.
pub struct UserDirectory<'a, D: DeviceControl + ?Sized> {
    device: &'a D,
}

impl<'a, D: DeviceControl + ?Sized> UserDirectory<'a, D> {
    pub fn new(device: &'a D) -> Self {
        Self { device }
    }

    pub fn user_infos(&self) -> DeviceResult<BTreeMap<UserId, UserRecord>> {
        self.device.user_infos()
    }

    /// Current foreground user, with the invalid sentinel mapped to `None`
    pub fn current_user(&self) -> DeviceResult<Option<UserId>> {
        let id = self.device.current_user()?;
        Ok(if id == INVALID_USER_ID { None } else { Some(id) })
    }

    /// First user bearing the reserved tooling tag, if any
    pub fn find_tool_user(&self) -> DeviceResult<Option<UserId>> {
        let infos = self.user_infos()?;
        Ok(infos
            .values()
            .find(|record| record.is_tool_user())
            .map(|record| record.id))
    }

    /// First profile of the given kind under any parent, if any
    pub fn find_profile(&self, kind: ProfileKind) -> DeviceResult<Option<UserId>> {
        let infos = self.user_infos()?;
        Ok(infos
            .values()
            .find(|record| record.matches_profile(kind))
            .map(|record| record.id))
    }

    /// Users counted against the device quota (guests are exempt)
    pub fn non_guest_count(&self) -> DeviceResult<usize> {
        let infos = self.user_infos()?;
        Ok(infos.values().filter(|record| !record.is_guest()).count())
    }

    pub fn max_users(&self) -> DeviceResult<usize> {
        self.device.max_number_of_users_supported()
    }

    /// Whether the device has room for `count` more users
    pub fn can_create_additional_users(&self, count: usize) -> DeviceResult<bool> {
        let existing = self.device.list_users()?.len();
        Ok(existing + count <= self.max_users()?)
    }

    pub fn device(&self) -> &D {
        self.device
    }
}
