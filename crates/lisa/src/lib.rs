//! LISA test trigger adapter.
//!
//! Implements the [`dispatch::TestTrigger`] trait by running the `lisa` command
//! line tool as a child process and judging the run by its exit status.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Process spawning, output forwarding, log directory
//! preparation, and SSH key provisioning all live here. The [`dispatch`] crate
//! sees only [`dispatch::TestTrigger`].
//!
//! LISA writes its own HTML report under the log directory; nothing in this
//! crate reads it.

pub mod invocation;
pub mod keys;
pub mod runner;

pub use invocation::{
    LisaInvocation, LisaSettings, DEFAULT_LOG_ROOT, DEFAULT_RUNBOOK, DEFAULT_TEST_CASE,
};
pub use keys::SshKeyGenerator;
pub use runner::LisaRunner;
