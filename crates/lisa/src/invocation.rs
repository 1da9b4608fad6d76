//! Command-line construction for one LISA run.

use std::path::{Path, PathBuf};

use dispatch::{RunConfiguration, TriggerError};
use serde::{Deserialize, Serialize};

/// Runbook shipped with LISA for Fedora on Azure.
pub const DEFAULT_RUNBOOK: &str = "microsoft/runbook/azure_fedora.yml";

/// Test case selected when no override is configured.
pub const DEFAULT_TEST_CASE: &str = "verify_boot_error_fail_warnings";

/// Parent of the per-image log directories when no override is configured.
/// A leading `~` is expanded by the configuration loader.
pub const DEFAULT_LOG_ROOT: &str = "~/lisa_results";

/// How to invoke LISA. Loaded once from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LisaSettings {
    /// Executable to run.
    pub program: PathBuf,
    /// Arguments placed before the LISA arguments, e.g. `["-m", "lisa"]`
    /// when `program` is a Python interpreter.
    pub program_args: Vec<String>,
    /// Runbook passed with `-r`.
    pub runbook: String,
    /// Test tier passed as `-v tier:<n>`.
    pub tier: u8,
    /// Restricts the run to one test case. `None` runs the whole tier.
    pub test_case_name: Option<String>,
    /// Parent of the per-image log directories passed with `-l`.
    /// `None` leaves log placement to LISA. Set `log_root = ""` in the
    /// configuration file to get `None`.
    pub log_root: Option<PathBuf>,
}

impl Default for LisaSettings {
    fn default() -> Self {
        Self {
            program: PathBuf::from("lisa"),
            program_args: Vec::new(),
            runbook: DEFAULT_RUNBOOK.to_string(),
            tier: 1,
            test_case_name: Some(DEFAULT_TEST_CASE.to_string()),
            log_root: Some(PathBuf::from(DEFAULT_LOG_ROOT)),
        }
    }
}

/// A fully resolved LISA command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LisaInvocation {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl LisaInvocation {
    /// Builds the command line for `run`.
    ///
    /// `private_key` is the resolved key file (configured or generated) and
    /// `log_path` the prepared per-image log directory, if any.
    ///
    /// # Errors
    ///
    /// Returns [`TriggerError::InvalidRunConfiguration`] if the program,
    /// runbook, or key path is empty.
    pub fn build(
        settings: &LisaSettings,
        run: &RunConfiguration,
        private_key: &Path,
        log_path: Option<&Path>,
    ) -> Result<Self, TriggerError> {
        if settings.program.as_os_str().is_empty() {
            return Err(invalid("program must not be empty"));
        }
        if settings.runbook.is_empty() {
            return Err(invalid("runbook must not be empty"));
        }
        if private_key.as_os_str().is_empty() {
            return Err(invalid("private_key must not be empty"));
        }

        let mut args = settings.program_args.clone();
        args.extend(["-r".to_string(), settings.runbook.clone()]);

        let mut variables = vec![format!("tier:{}", settings.tier)];
        if let Some(name) = settings.test_case_name.as_deref().filter(|n| !n.is_empty()) {
            variables.push(format!("test_case_name:{name}"));
        }
        variables.extend([
            format!("region:{}", run.region),
            format!("community_gallery_image:{}", run.image),
            format!("subscription_id:{}", run.subscription_id),
            format!("admin_private_key_file:{}", private_key.display()),
        ]);
        for var in variables {
            args.push("-v".to_string());
            args.push(var);
        }

        if let Some(path) = log_path {
            args.push("-l".to_string());
            args.push(path.display().to_string());
        }
        if let Some(name) = &run.run_name {
            args.push("-i".to_string());
            args.push(name.to_string());
        }

        Ok(Self { program: settings.program.clone(), args })
    }

    /// The command line as one string, for logging.
    pub fn display(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn invalid(reason: &str) -> TriggerError {
    TriggerError::InvalidRunConfiguration { reason: reason.to_string() }
}
