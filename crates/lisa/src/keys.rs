//! Throwaway SSH key pairs for runs without a configured key.

use std::path::{Path, PathBuf};

use dispatch::TriggerError;
use tokio::process::Command;
use tracing::{debug, info};

/// File name of the generated private key inside the target directory.
pub const PRIVATE_KEY_FILE: &str = "id_rsa";

/// Runs `ssh-keygen` to create RSA key pairs.
#[derive(Debug, Clone)]
pub struct SshKeyGenerator {
    program: PathBuf,
    leading_args: Vec<String>,
}

impl Default for SshKeyGenerator {
    fn default() -> Self {
        Self { program: PathBuf::from("ssh-keygen"), leading_args: Vec::new() }
    }
}

impl SshKeyGenerator {
    /// Uses `program` (followed by `leading_args`) instead of `ssh-keygen`.
    pub fn with_program(program: impl Into<PathBuf>, leading_args: Vec<String>) -> Self {
        Self { program: program.into(), leading_args }
    }

    /// Generates an unencrypted 4096-bit RSA key pair in `dir` and returns the
    /// private key path. The private key is left with mode `0600`.
    ///
    /// # Errors
    ///
    /// Returns [`TriggerError::KeyGeneration`] if the generator cannot be run,
    /// exits unsuccessfully, or does not produce the key file.
    pub async fn generate(&self, dir: &Path) -> Result<PathBuf, TriggerError> {
        let key_path = dir.join(PRIVATE_KEY_FILE);
        debug!(path = %key_path.display(), "generating SSH key pair");

        let output = Command::new(&self.program)
            .args(&self.leading_args)
            .args(["-t", "rsa", "-b", "4096", "-N", "", "-q", "-f"])
            .arg(&key_path)
            .output()
            .await
            .map_err(|e| key_error(format!("failed to run {}: {e}", self.program.display())))?;

        if !output.status.success() {
            return Err(key_error(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        if !tokio::fs::try_exists(&key_path).await.unwrap_or(false) {
            return Err(key_error(format!(
                "private key was not created at {}",
                key_path.display()
            )));
        }

        restrict_permissions(&key_path).await?;
        info!(path = %key_path.display(), "SSH key pair generated");
        Ok(key_path)
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> Result<(), TriggerError> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .await
        .map_err(|e| key_error(format!("failed to restrict permissions: {e}")))
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> Result<(), TriggerError> {
    Ok(())
}

fn key_error(reason: String) -> TriggerError {
    TriggerError::KeyGeneration { reason }
}
