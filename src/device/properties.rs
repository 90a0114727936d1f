/*!
 * Test-Run Properties
 * Shared property bag carrying signals to downstream test execution
 */

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key under which the active test user id is published
pub const RUN_TESTS_AS_USER_KEY: &str = "RUN_TESTS_AS_USER";

/// Key under which a soft-skip reason is published
pub const SKIP_TESTS_REASON_KEY: &str = "skip-tests-reason";

/// Mutable key/value bag shared across one test run.
///
/// The lifecycle machinery publishes its signals here; downstream test
/// execution reads them to pick the user to target or to skip tests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyBag {
    entries: BTreeMap<String, String>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Escape a skip reason for transport as an instrumentation argument
pub(crate) fn escape_reason(reason: &str) -> String {
    reason.replace(' ', "\\ ")
}
