use std::path::Path;

use crate::docker::{CommandRunner, RunOptions};
use crate::error::{Error, Result};

/// Run `gerrit version` over ssh as `username` with `key`, returning the
/// reported version line. Host keys are not checked: the server is a
/// throwaway container with a fresh key every time.
pub fn gerrit_version<R: CommandRunner>(
    runner: &R,
    address: &str,
    port: u16,
    username: &str,
    key: &Path,
) -> Result<String> {
    let args = ssh_args(address, port, username, key, "gerrit version");
    let output = runner.run("ssh", &args, RunOptions::default())?;
    let output = String::from_utf8_lossy(&output).trim().to_string();

    if !output.starts_with("gerrit version") {
        return Err(Error::SshCheck(format!(
            "unexpected output from `gerrit version`: {output:?}"
        )));
    }
    Ok(output)
}

fn ssh_args(address: &str, port: u16, username: &str, key: &Path, command: &str) -> Vec<String> {
    vec![
        "-p".into(),
        port.to_string(),
        "-i".into(),
        key.display().to_string(),
        "-o".into(),
        "StrictHostKeyChecking=no".into(),
        "-o".into(),
        "UserKnownHostsFile=/dev/null".into(),
        "-o".into(),
        "IdentitiesOnly=yes".into(),
        "-o".into(),
        "BatchMode=yes".into(),
        "-o".into(),
        "LogLevel=ERROR".into(),
        format!("{username}@{address}"),
        command.into(),
    ]
}
