//! [`TestTrigger`] implementation that runs the `lisa` CLI as a child process.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use dispatch::{ImageDefinitionName, RunConfiguration, TestTrigger, TriggerError, TriggerOutcome};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, error, info, instrument};

use crate::{LisaInvocation, LisaSettings, SshKeyGenerator};

/// Starts LISA for each accepted image and waits for it to exit.
#[derive(Debug, Clone, Default)]
pub struct LisaRunner {
    settings: LisaSettings,
    keygen: SshKeyGenerator,
}

impl LisaRunner {
    pub fn new(settings: LisaSettings) -> Self {
        Self { settings, keygen: SshKeyGenerator::default() }
    }

    /// Replaces the key generator used for runs without a configured key.
    #[must_use]
    pub fn with_key_generator(mut self, keygen: SshKeyGenerator) -> Self {
        self.keygen = keygen;
        self
    }

    pub fn settings(&self) -> &LisaSettings {
        &self.settings
    }

    /// Runs one prepared invocation, streaming its output into the log.
    ///
    /// # Errors
    ///
    /// Returns [`TriggerError::Launch`] if the process cannot be spawned and
    /// [`TriggerError::Io`] if its output cannot be read or it cannot be awaited.
    pub async fn execute(&self, invocation: &LisaInvocation) -> Result<TriggerOutcome, TriggerError> {
        info!(command = %invocation.display(), "starting LISA");

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TriggerError::Launch {
                program: invocation.program.display().to_string(),
                source,
            })?;

        let (stdout, stderr) = tokio::join!(
            forward_output(child.stdout.take(), "stdout"),
            forward_output(child.stderr.take(), "stderr"),
        );
        stdout?;
        stderr?;

        let status = child.wait().await?;
        if status.success() {
            info!("LISA exited successfully");
            Ok(TriggerOutcome::Passed)
        } else {
            error!(code = status.code(), "LISA exited unsuccessfully");
            Ok(TriggerOutcome::Failed { code: status.code() })
        }
    }

    /// Creates `<log_root>/<image definition>`; logs and returns `None` on failure.
    async fn prepare_log_dir(&self, definition: &ImageDefinitionName) -> Option<PathBuf> {
        let root = self.settings.log_root.as_ref()?;
        let path = root.join(definition.as_str());
        match tokio::fs::create_dir_all(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "log path ready");
                Some(path)
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to create log path, using LISA default");
                None
            }
        }
    }
}

#[async_trait]
impl TestTrigger for LisaRunner {
    #[instrument(name = "lisa", skip_all, fields(run_id = %run.run_id, image = %run.image))]
    async fn trigger(&self, run: RunConfiguration) -> Result<TriggerOutcome, TriggerError> {
        // A generated key lives in `_key_dir` until LISA has exited.
        let (private_key, _key_dir) = match &run.private_key {
            Some(path) => (path.clone(), None),
            None => {
                let dir = tempfile::Builder::new().prefix("fedora-cloud-tests-").tempdir()?;
                let key = self.keygen.generate(dir.path()).await?;
                (key, Some(dir))
            }
        };

        let log_path = self.prepare_log_dir(&run.image_definition).await;
        let invocation =
            LisaInvocation::build(&self.settings, &run, &private_key, log_path.as_deref())?;
        self.execute(&invocation).await
    }
}

/// Logs each non-blank line of a child stream.
async fn forward_output<R>(stream: Option<R>, name: &'static str) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let Some(stream) = stream else {
        return Ok(());
    };
    for_each_line(stream, |line| info!(stream = name, "LISA OUTPUT: {line}")).await
}

/// Calls `sink` with every non-blank line of `stream`, trimmed. Invalid UTF-8
/// is replaced rather than treated as an error.
async fn for_each_line<R, F>(stream: R, mut sink: F) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    F: FnMut(&str),
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(());
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim();
        if !line.is_empty() {
            sink(line);
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use dispatch::{
        AzureRegion, CommunityGalleryImage, ImageVersionName, RunId, RunName, SubscriptionId,
    };
    use std::path::Path;

    /// Settings that run `script` through `sh` in place of LISA. The script
    /// records its arguments in `args.txt` next to itself.
    fn fake_lisa(dir: &Path, body: &str) -> LisaSettings {
        let script = dir.join("lisa.sh");
        let args_file = dir.join("args.txt");
        std::fs::write(
            &script,
            format!("printf '%s\\n' \"$@\" > '{}'\n{body}\n", args_file.display()),
        )
        .unwrap();
        LisaSettings {
            program: PathBuf::from("sh"),
            program_args: vec![script.display().to_string()],
            log_root: None,
            ..LisaSettings::default()
        }
    }

    fn recorded_args(dir: &Path) -> Vec<String> {
        std::fs::read_to_string(dir.join("args.txt"))
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn run(private_key: Option<PathBuf>) -> RunConfiguration {
        let region = AzureRegion::new("westus3").unwrap();
        let definition = ImageDefinitionName::new("Fedora-Cloud-42-x64").unwrap();
        let version = ImageVersionName::new("20250101.0").unwrap();
        RunConfiguration {
            run_id: RunId::new_random(),
            image: CommunityGalleryImage::from_parts(&region, "gallery", &definition, &version),
            region,
            subscription_id: SubscriptionId::new("sub-id").unwrap(),
            private_key,
            image_definition: definition,
            run_name: RunName::new("January01-2025-1200"),
        }
    }

    #[tokio::test]
    async fn zero_exit_is_passed() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = LisaRunner::new(fake_lisa(tmp.path(), "echo running tests\necho\nexit 0"));

        let outcome = runner.trigger(run(Some("/keys/id_rsa".into()))).await.unwrap();

        assert_eq!(outcome, TriggerOutcome::Passed);
        let args = recorded_args(tmp.path());
        assert!(args.contains(&"community_gallery_image:westus3/gallery/Fedora-Cloud-42-x64/20250101.0".to_string()));
        assert!(args.contains(&"admin_private_key_file:/keys/id_rsa".to_string()));
        assert!(args.ends_with(&["-i".to_string(), "January01-2025-1200".to_string()]));
    }

    #[tokio::test]
    async fn non_zero_exit_is_failed_with_code() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = LisaRunner::new(fake_lisa(tmp.path(), "echo oops >&2\nexit 3"));

        let outcome = runner.trigger(run(Some("/keys/id_rsa".into()))).await.unwrap();

        assert_eq!(outcome, TriggerOutcome::Failed { code: Some(3) });
    }

    #[tokio::test]
    async fn signal_terminated_child_is_failed_without_code() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = LisaRunner::new(fake_lisa(tmp.path(), "kill -9 $$"));

        let outcome = runner.trigger(run(Some("/keys/id_rsa".into()))).await.unwrap();

        assert_eq!(outcome, TriggerOutcome::Failed { code: None });
    }

    #[tokio::test]
    async fn output_lines_are_trimmed_and_blank_lines_skipped() {
        let mut lines = Vec::new();
        let input: &[u8] = b"first line\n\n   \n  indented  \r\nlast without newline";

        for_each_line(input, |line| lines.push(line.to_string())).await.unwrap();

        assert_eq!(lines, ["first line", "indented", "last without newline"]);
    }

    #[tokio::test]
    async fn invalid_utf8_output_is_replaced() {
        let mut lines = Vec::new();
        let input: &[u8] = b"ok \xff byte\n";

        for_each_line(input, |line| lines.push(line.to_string())).await.unwrap();

        assert_eq!(lines, ["ok \u{fffd} byte"]);
    }

    #[tokio::test]
    async fn stdout_and_stderr_of_child_are_both_read() {
        let mut child = Command::new("sh")
            .args(["-c", "echo to-stdout; echo; echo to-stderr >&2"])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        let mut out = Vec::new();
        let mut err = Vec::new();

        let (a, b) = tokio::join!(
            for_each_line(child.stdout.take().unwrap(), |l| out.push(l.to_string())),
            for_each_line(child.stderr.take().unwrap(), |l| err.push(l.to_string())),
        );
        a.unwrap();
        b.unwrap();
        child.wait().await.unwrap();

        assert_eq!(out, ["to-stdout"]);
        assert_eq!(err, ["to-stderr"]);
    }

    #[tokio::test]
    async fn missing_program_is_launch_error() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = LisaSettings {
            program: tmp.path().join("not-installed"),
            log_root: None,
            ..LisaSettings::default()
        };

        let err = LisaRunner::new(settings)
            .trigger(run(Some("/keys/id_rsa".into())))
            .await
            .unwrap_err();

        assert!(matches!(err, TriggerError::Launch { .. }));
    }

    #[tokio::test]
    async fn log_directory_is_created_per_image() {
        let tmp = tempfile::tempdir().unwrap();
        let log_root = tmp.path().join("lisa_results");
        let settings = LisaSettings {
            log_root: Some(log_root.clone()),
            ..fake_lisa(tmp.path(), "exit 0")
        };

        LisaRunner::new(settings).trigger(run(Some("/keys/id_rsa".into()))).await.unwrap();

        let expected = log_root.join("Fedora-Cloud-42-x64");
        assert!(expected.is_dir());
        let args = recorded_args(tmp.path());
        let l = args.iter().position(|a| a == "-l").unwrap();
        assert_eq!(args[l + 1], expected.display().to_string());
    }

    #[tokio::test]
    async fn uncreatable_log_directory_falls_back_to_default() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let settings = LisaSettings { log_root: Some(blocker), ..fake_lisa(tmp.path(), "exit 0") };

        let outcome =
            LisaRunner::new(settings).trigger(run(Some("/keys/id_rsa".into()))).await.unwrap();

        assert_eq!(outcome, TriggerOutcome::Passed);
        assert!(!recorded_args(tmp.path()).iter().any(|a| a == "-l"));
    }

    #[tokio::test]
    async fn generates_key_when_none_configured() {
        let tmp = tempfile::tempdir().unwrap();
        let keygen_script = tmp.path().join("keygen.sh");
        std::fs::write(
            &keygen_script,
            "while [ $# -gt 0 ]; do if [ \"$1\" = \"-f\" ]; then shift; touch \"$1\"; fi; shift; done\n",
        )
        .unwrap();
        let runner = LisaRunner::new(fake_lisa(tmp.path(), "exit 0")).with_key_generator(
            SshKeyGenerator::with_program("sh", vec![keygen_script.display().to_string()]),
        );

        let outcome = runner.trigger(run(None)).await.unwrap();

        assert_eq!(outcome, TriggerOutcome::Passed);
        let key_arg = recorded_args(tmp.path())
            .into_iter()
            .find(|a| a.starts_with("admin_private_key_file:"))
            .unwrap();
        assert!(key_arg.ends_with("/id_rsa"));
    }
}
