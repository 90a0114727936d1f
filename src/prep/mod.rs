/*!
 * Prep Module
 * Test-user lifecycle: provisioning, activation, and teardown
 */

pub mod activation;
pub mod directory;
pub mod orchestrator;
pub mod profile;
pub mod provisioner;
pub mod quota;

// Re-export for convenience
pub use activation::{ActivationRecord, ActivationStrategy};
pub use directory::UserDirectory;
pub use orchestrator::{
    LifecycleOrchestrator, LifecycleState, Phase, PrepConfig, PrepMode, SetupFailure,
};
pub use profile::{ProfileProvisioner, ProfileStatus};
pub use provisioner::UserProvisioner;
