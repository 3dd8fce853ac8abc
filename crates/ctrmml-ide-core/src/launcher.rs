//! Launching the provisioned server for a protocol client
//!
//! The language-server protocol itself lives in the client that spawned
//! us, so launching means wiring the server's stdio straight through and
//! reporting how it exited.

use std::path::Path;
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;
use tracing::info;

use crate::config::ServerSettings;

/// Build the server command: configured arguments appended, configured
/// environment layered over the inherited one, stdio inherited from this
/// process.
pub fn server_command(binary: &Path, settings: &ServerSettings) -> Command {
    let mut command = Command::new(binary);
    command.args(&settings.args);
    command.envs(&settings.env);
    command
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    command
}

/// Run the server until it exits and hand back its exit status.
pub async fn run_server(binary: &Path, settings: &ServerSettings) -> std::io::Result<ExitStatus> {
    info!("launching {}", binary.display());
    let mut child = server_command(binary, settings).spawn()?;
    child.wait().await
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::ffi::OsStr;

    #[test]
    fn test_command_carries_args() {
        let mut settings = ServerSettings::default();
        settings.args = vec!["--stdio".into(), "--verbose".into()];

        let command = server_command(Path::new("/usr/bin/ctrmml-lsp"), &settings);
        let std_command = command.as_std();
        assert_eq!(std_command.get_program(), OsStr::new("/usr/bin/ctrmml-lsp"));
        let args: Vec<_> = std_command.get_args().collect();
        assert_eq!(args, [OsStr::new("--stdio"), OsStr::new("--verbose")]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_server_reports_exit_status() {
        let mut settings = ServerSettings::default();
        settings.args = vec!["-c".into(), "exit 3".into()];

        let status = run_server(Path::new("/bin/sh"), &settings).await.unwrap();
        assert_eq!(status.code(), Some(3));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_server_passes_environment() {
        let mut settings = ServerSettings::default();
        settings
            .env
            .insert("CTRMML_TEST_FLAG".into(), "enabled".into());
        settings.args = vec!["-c".into(), "test \"$CTRMML_TEST_FLAG\" = enabled".into()];

        let status = run_server(Path::new("/bin/sh"), &settings).await.unwrap();
        assert!(status.success());
    }
}
