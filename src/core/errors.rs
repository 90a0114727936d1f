/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for device capability calls
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Result type for preparation steps
pub type PrepResult<T> = Result<T, PrepError>;

/// Transport-level errors surfaced by the device capability seam
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum DeviceError {
    #[error("device became unavailable: {0}")]
    #[diagnostic(
        code(device::unavailable),
        help("The device dropped off the transport. Check the connection and whether it rebooted.")
    )]
    Unavailable(String),

    #[error("command failed: {0}")]
    #[diagnostic(
        code(device::command_failed),
        help("The device rejected or failed to run the operation. View device logs for details.")
    )]
    CommandFailed(String),

    #[error("rejected by device state: {0}")]
    #[diagnostic(
        code(device::state_conflict),
        help("The device is in a state that forbids this operation (e.g. user table conflict).")
    )]
    StateConflict(String),
}

/// Preparation errors with serialization support.
///
/// `DeviceUnavailable` is deliberately distinct from `Setup`: a setup
/// failure still gets a full teardown, an unavailable device gets none.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum PrepError {
    #[error("[{device}] {message}")]
    #[diagnostic(
        code(prep::setup_failed),
        help("Setup aborted; the lifecycle state recorded so far still drives teardown.")
    )]
    Setup { device: String, message: String },

    #[error("[{device}] {message}. Command was '{command}', output was '{output}'")]
    #[diagnostic(
        code(prep::shell_command),
        help("The raw command and output are included verbatim for diagnosis.")
    )]
    ShellCommand {
        device: String,
        message: String,
        command: String,
        output: String,
    },

    #[error("[{device}] device became unavailable: {reason}")]
    #[diagnostic(
        code(prep::device_unavailable),
        help("Teardown is skipped entirely; the device cannot safely be manipulated.")
    )]
    DeviceUnavailable { device: String, reason: String },
}

impl PrepError {
    /// Fatal setup error naming the device it happened on
    pub fn setup(device: impl Into<String>, message: impl Into<String>) -> Self {
        PrepError::Setup {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Setup error carrying a failing shell command and its raw output
    pub fn shell_command(
        device: impl Into<String>,
        message: impl Into<String>,
        command: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        PrepError::ShellCommand {
            device: device.into(),
            message: message.into(),
            command: command.into(),
            output: output.into(),
        }
    }

    /// Whether this failure means the device cannot be manipulated further
    pub fn is_device_unavailable(&self) -> bool {
        matches!(self, PrepError::DeviceUnavailable { .. })
    }

    /// Promote a transport error from a named device operation.
    ///
    /// `Unavailable` keeps its identity (it suppresses teardown); everything
    /// else becomes a fatal setup error with the operation named.
    pub(crate) fn from_device(device: &str, context: &str, err: DeviceError) -> Self {
        match err {
            DeviceError::Unavailable(reason) => PrepError::DeviceUnavailable {
                device: device.to_string(),
                reason,
            },
            other => PrepError::Setup {
                device: device.to_string(),
                message: format!("{}: {}", context, other),
            },
        }
    }
}
