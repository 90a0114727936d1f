/*!
 * Shared Test Fixtures
 * Scripted in-memory device double for lifecycle tests
 */
#![allow(dead_code)] // not every test binary touches every fixture knob

use dut_prep::{
    ApiLevel, DeviceControl, DeviceError, DeviceResult, DisplayId, UserId, UserRecord,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

/// One in-memory device under test.
///
/// Behaves like a tiny user manager: creation allocates ids, removal
/// deletes rows, and the interesting shell commands (policy dump, profile
/// creation, package install) are answered from scripted state. Every
/// mutation is also recorded so tests can assert exactly what the
/// lifecycle touched.
pub struct FakeDevice {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    users: BTreeMap<UserId, UserRecord>,
    current_user: UserId,
    next_user_id: UserId,
    max_users: usize,
    api_level: ApiLevel,
    features: BTreeSet<String>,
    visible_bg_supported: bool,
    visible_bg_on_default_supported: bool,
    displays: BTreeSet<DisplayId>,
    visible: BTreeSet<(UserId, DisplayId)>,
    device_owner: Option<(String, UserId)>,
    profile_user_type: Option<String>,
    create_user_error: Option<String>,
    create_profile_output: Option<String>,
    fail_switch_user: bool,
    unavailable: bool,

    // Recorders
    removed_users: Vec<UserId>,
    started_users: Vec<(UserId, bool)>,
    switched_users: Vec<UserId>,
    stopped_users: Vec<UserId>,
    shell_commands: Vec<String>,
    settings: Vec<(UserId, String, String, String)>,
    restored_owners: Vec<(String, UserId)>,
}

impl FakeDevice {
    pub fn new() -> Self {
        let inner = Inner {
            current_user: 0,
            next_user_id: 10,
            max_users: 8,
            api_level: 34,
            ..Inner::default()
        };
        let device = Self {
            inner: Mutex::new(inner),
        };
        device.add_user(UserRecord::new(0, None, 0x13, true));
        device
    }

    pub fn add_user(&self, record: UserRecord) -> &Self {
        let mut inner = self.inner.lock().unwrap();
        inner.next_user_id = inner.next_user_id.max(record.id + 1);
        inner.users.insert(record.id, record);
        drop(inner);
        self
    }

    pub fn set_current_user(&self, user: UserId) -> &Self {
        self.inner.lock().unwrap().current_user = user;
        self
    }

    pub fn set_max_users(&self, max: usize) -> &Self {
        self.inner.lock().unwrap().max_users = max;
        self
    }

    pub fn set_api_level(&self, api: ApiLevel) -> &Self {
        self.inner.lock().unwrap().api_level = api;
        self
    }

    pub fn add_feature(&self, feature: &str) -> &Self {
        self.inner.lock().unwrap().features.insert(feature.to_string());
        self
    }

    pub fn set_visible_background_supported(&self, supported: bool) -> &Self {
        self.inner.lock().unwrap().visible_bg_supported = supported;
        self
    }

    pub fn set_visible_background_on_default_supported(&self, supported: bool) -> &Self {
        self.inner.lock().unwrap().visible_bg_on_default_supported = supported;
        self
    }

    pub fn add_display(&self, display: DisplayId) -> &Self {
        self.inner.lock().unwrap().displays.insert(display);
        self
    }

    pub fn set_user_visible(&self, user: UserId, display: DisplayId) -> &Self {
        self.inner.lock().unwrap().visible.insert((user, display));
        self
    }

    pub fn set_device_owner_binding(&self, component: &str, user: UserId) -> &Self {
        self.inner.lock().unwrap().device_owner = Some((component.to_string(), user));
        self
    }

    /// User type attached to users created via `pm create-user`
    pub fn set_profile_user_type(&self, user_type: &str) -> &Self {
        self.inner.lock().unwrap().profile_user_type = Some(user_type.to_string());
        self
    }

    /// Make `create_user` fail with a state conflict
    pub fn fail_create_user(&self, message: &str) -> &Self {
        self.inner.lock().unwrap().create_user_error = Some(message.to_string());
        self
    }

    /// Override the textual output of the profile-creation command
    pub fn set_create_profile_output(&self, output: &str) -> &Self {
        self.inner.lock().unwrap().create_profile_output = Some(output.to_string());
        self
    }

    pub fn fail_switch_user(&self) -> &Self {
        self.inner.lock().unwrap().fail_switch_user = true;
        self
    }

    /// Simulate the device dropping off the transport
    pub fn make_unavailable(&self) -> &Self {
        self.inner.lock().unwrap().unavailable = true;
        self
    }

    pub fn user_ids(&self) -> Vec<UserId> {
        self.inner.lock().unwrap().users.keys().copied().collect()
    }

    pub fn has_user(&self, user: UserId) -> bool {
        self.inner.lock().unwrap().users.contains_key(&user)
    }

    pub fn device_owner_binding(&self) -> Option<(String, UserId)> {
        self.inner.lock().unwrap().device_owner.clone()
    }

    pub fn removed_users(&self) -> Vec<UserId> {
        self.inner.lock().unwrap().removed_users.clone()
    }

    pub fn started_users(&self) -> Vec<(UserId, bool)> {
        self.inner.lock().unwrap().started_users.clone()
    }

    pub fn switched_users(&self) -> Vec<UserId> {
        self.inner.lock().unwrap().switched_users.clone()
    }

    pub fn stopped_users(&self) -> Vec<UserId> {
        self.inner.lock().unwrap().stopped_users.clone()
    }

    pub fn shell_commands(&self) -> Vec<String> {
        self.inner.lock().unwrap().shell_commands.clone()
    }

    pub fn settings(&self) -> Vec<(UserId, String, String, String)> {
        self.inner.lock().unwrap().settings.clone()
    }

    pub fn restored_owners(&self) -> Vec<(String, UserId)> {
        self.inner.lock().unwrap().restored_owners.clone()
    }
}

impl Default for FakeDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceControl for FakeDevice {
    fn descriptor(&self) -> String {
        "fake-device-0001".to_string()
    }

    fn current_user(&self) -> DeviceResult<UserId> {
        let inner = self.inner.lock().unwrap();
        if inner.unavailable {
            return Err(DeviceError::Unavailable("gone".to_string()));
        }
        Ok(inner.current_user)
    }

    fn create_user(&self, name: &str) -> DeviceResult<UserId> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(message) = &inner.create_user_error {
            return Err(DeviceError::StateConflict(message.clone()));
        }
        let id = inner.next_user_id;
        inner.next_user_id += 1;
        inner
            .users
            .insert(id, UserRecord::new(id, Some(name.to_string()), 0, false));
        Ok(id)
    }

    fn start_user(&self, user: UserId, wait: bool) -> DeviceResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        inner.started_users.push((user, wait));
        Ok(inner.users.contains_key(&user))
    }

    fn switch_user(&self, user: UserId) -> DeviceResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        inner.switched_users.push(user);
        if inner.fail_switch_user {
            return Ok(false);
        }
        if inner.users.contains_key(&user) {
            inner.current_user = user;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn stop_user(&self, user: UserId, _wait: bool, _force: bool) -> DeviceResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        inner.stopped_users.push(user);
        Ok(inner.users.contains_key(&user))
    }

    fn remove_user(&self, user: UserId) -> DeviceResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        inner.removed_users.push(user);
        Ok(inner.users.remove(&user).is_some())
    }

    fn list_users(&self) -> DeviceResult<Vec<UserRecord>> {
        Ok(self.inner.lock().unwrap().users.values().cloned().collect())
    }

    fn user_infos(&self) -> DeviceResult<BTreeMap<UserId, UserRecord>> {
        Ok(self.inner.lock().unwrap().users.clone())
    }

    fn max_number_of_users_supported(&self) -> DeviceResult<usize> {
        Ok(self.inner.lock().unwrap().max_users)
    }

    fn is_visible_background_users_supported(&self) -> DeviceResult<bool> {
        Ok(self.inner.lock().unwrap().visible_bg_supported)
    }

    fn is_visible_background_users_on_default_display_supported(&self) -> DeviceResult<bool> {
        Ok(self.inner.lock().unwrap().visible_bg_on_default_supported)
    }

    fn list_display_ids_for_starting_visible_background_users(
        &self,
    ) -> DeviceResult<BTreeSet<DisplayId>> {
        Ok(self.inner.lock().unwrap().displays.clone())
    }

    fn is_user_visible_on_display(&self, user: UserId, display: DisplayId) -> DeviceResult<bool> {
        Ok(self.inner.lock().unwrap().visible.contains(&(user, display)))
    }

    fn start_visible_background_user(
        &self,
        user: UserId,
        display: DisplayId,
        _wait: bool,
    ) -> DeviceResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        inner.started_users.push((user, true));
        if inner.users.contains_key(&user) && inner.displays.contains(&display) {
            inner.visible.insert((user, display));
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn execute_shell_command(&self, command: &str) -> DeviceResult<String> {
        let mut inner = self.inner.lock().unwrap();
        inner.shell_commands.push(command.to_string());

        if command == "dumpsys device_policy" {
            return Ok(match &inner.device_owner {
                Some((component, user)) => format!(
                    "Device Owner:\n  admin=ComponentInfo{{{}}}\n  User ID: {}\n",
                    component, user
                ),
                None => "Current Device Policy Manager state:\n".to_string(),
            });
        }
        if command.starts_with("dpm remove-active-admin") {
            inner.device_owner = None;
            return Ok("Success: removed active admin".to_string());
        }
        if command.starts_with("pm create-user") {
            if let Some(output) = &inner.create_profile_output {
                return Ok(output.clone());
            }
            let id = inner.next_user_id;
            inner.next_user_id += 1;
            let mut record = UserRecord::new(id, Some("user".to_string()), 0x1000, false);
            if let Some(user_type) = inner.profile_user_type.clone() {
                record = record.with_user_type(user_type);
            }
            inner.users.insert(id, record);
            return Ok(format!("Success: created user id {}", id));
        }
        if command.starts_with("pm install-existing") {
            return Ok(String::new());
        }
        Ok(String::new())
    }

    fn has_feature(&self, feature: &str) -> DeviceResult<bool> {
        Ok(self.inner.lock().unwrap().features.contains(feature))
    }

    fn api_level(&self) -> DeviceResult<ApiLevel> {
        Ok(self.inner.lock().unwrap().api_level)
    }

    fn set_setting(
        &self,
        user: UserId,
        namespace: &str,
        key: &str,
        value: &str,
    ) -> DeviceResult<()> {
        self.inner.lock().unwrap().settings.push((
            user,
            namespace.to_string(),
            key.to_string(),
            value.to_string(),
        ));
        Ok(())
    }

    fn set_device_owner(&self, component: &str, user: UserId) -> DeviceResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        inner.restored_owners.push((component.to_string(), user));
        inner.device_owner = Some((component.to_string(), user));
        Ok(true)
    }
}

/// Initialize test logging once; `RUST_LOG=debug` shows lifecycle steps
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
