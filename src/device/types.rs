/*!
 * Device User Types
 * User records, kinds, and platform flag decoding
 */

use crate::core::types::{ApiLevel, UserId, TOOL_USER_NAME};
use serde::{Deserialize, Serialize};

// Platform user flags, as reported by the device
pub const FLAG_PRIMARY: u32 = 0x0000_0001;
pub const FLAG_GUEST: u32 = 0x0000_0004;
pub const FLAG_MANAGED_PROFILE: u32 = 0x0000_0020;
pub const FLAG_EPHEMERAL: u32 = 0x0000_0100;
pub const FLAG_PROFILE: u32 = 0x0000_1000;
pub const FLAG_MAIN: u32 = 0x0000_4000;
pub const FLAG_FOR_TESTING: u32 = 0x0000_8000;

/// Platform user-type strings for profile users
pub const MANAGED_PROFILE_TYPE: &str = "android.os.usertype.profile.MANAGED";
pub const CLONE_PROFILE_TYPE: &str = "android.os.usertype.profile.CLONE";
pub const PRIVATE_PROFILE_TYPE: &str = "android.os.usertype.profile.PRIVATE";

/// Device feature gating managed-profile support
pub const MANAGED_USERS_FEATURE: &str = "android.software.managed_users";

/// Profile flavor subordinate to a parent user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    /// Work profile managed by a policy controller
    Managed,
    /// Clone of the parent user's apps
    Clone,
    /// Private space profile
    Private,
}

impl ProfileKind {
    /// Platform user-type string passed to the profile-creation command
    pub fn user_type(&self) -> &'static str {
        match self {
            ProfileKind::Managed => MANAGED_PROFILE_TYPE,
            ProfileKind::Clone => CLONE_PROFILE_TYPE,
            ProfileKind::Private => PRIVATE_PROFILE_TYPE,
        }
    }

    /// Device feature this kind requires, if any
    pub fn required_feature(&self) -> Option<&'static str> {
        match self {
            ProfileKind::Managed => Some(MANAGED_USERS_FEATURE),
            _ => None,
        }
    }

    /// Minimum API level this kind requires, if any.
    ///
    /// Clone profiles exist earlier, but the shell only reports the user
    /// type from 33 on, so lookup cannot work below that.
    pub fn min_api_level(&self) -> Option<ApiLevel> {
        match self {
            ProfileKind::Managed => None,
            ProfileKind::Clone => Some(33),
            ProfileKind::Private => Some(34),
        }
    }

    /// Whether creating this kind is blocked by an active device owner
    pub fn preempts_device_owner(&self) -> bool {
        matches!(self, ProfileKind::Managed | ProfileKind::Clone)
    }
}

/// Coarse classification of a device user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserKind {
    Normal,
    Guest,
    Profile(ProfileKind),
}

/// One device user, sourced fresh from the device on every query.
///
/// Never cached across the setup/teardown boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct UserRecord {
    pub id: UserId,
    pub name: Option<String>,
    pub flags: u32,
    pub running: bool,
    /// Platform user-type string; only reported on new enough devices
    pub user_type: Option<String>,
}

impl UserRecord {
    pub fn new(id: UserId, name: Option<String>, flags: u32, running: bool) -> Self {
        Self {
            id,
            name,
            flags,
            running,
            user_type: None,
        }
    }

    #[must_use]
    pub fn with_user_type(mut self, user_type: impl Into<String>) -> Self {
        self.user_type = Some(user_type.into());
        self
    }

    pub fn is_guest(&self) -> bool {
        self.flags & FLAG_GUEST == FLAG_GUEST
    }

    pub fn is_managed_profile(&self) -> bool {
        self.flags & FLAG_MANAGED_PROFILE == FLAG_MANAGED_PROFILE
    }

    pub fn is_clone_profile(&self) -> bool {
        self.user_type.as_deref() == Some(CLONE_PROFILE_TYPE)
    }

    pub fn is_private_profile(&self) -> bool {
        self.user_type.as_deref() == Some(PRIVATE_PROFILE_TYPE)
    }

    pub fn is_for_testing(&self) -> bool {
        self.flags & FLAG_FOR_TESTING == FLAG_FOR_TESTING
    }

    /// Whether this user bears the reserved tooling tag
    pub fn is_tool_user(&self) -> bool {
        self.name.as_deref() == Some(TOOL_USER_NAME)
    }

    /// Whether this user is a profile of the given kind (any parent)
    pub fn matches_profile(&self, kind: ProfileKind) -> bool {
        match kind {
            ProfileKind::Managed => self.is_managed_profile(),
            ProfileKind::Clone => self.is_clone_profile(),
            ProfileKind::Private => self.is_private_profile(),
        }
    }

    pub fn kind(&self) -> UserKind {
        if self.is_guest() {
            UserKind::Guest
        } else if self.is_managed_profile() {
            UserKind::Profile(ProfileKind::Managed)
        } else if self.is_clone_profile() {
            UserKind::Profile(ProfileKind::Clone)
        } else if self.is_private_profile() {
            UserKind::Profile(ProfileKind::Private)
        } else {
            UserKind::Normal
        }
    }
}
