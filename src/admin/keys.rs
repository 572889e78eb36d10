use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::docker::{CommandRunner, RunOptions};
use crate::error::{Error, Result};

/// A private key on disk plus its `.pub` sibling.
///
/// Generated keys live in a temporary directory that is removed when the
/// value is dropped, unless [`SshKey::keep`] is called.
#[derive(Debug)]
pub struct SshKey {
    path: PathBuf,
    dir: Option<TempDir>,
}

impl SshKey {
    /// Use an existing private key. `path.pub` must exist.
    pub fn existing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            dir: None,
        }
    }

    /// Generate a 2048 bit RSA key with `ssh-keygen` in a fresh temp dir.
    pub fn generate<R: CommandRunner>(runner: &R) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("gerrittest-")
            .tempdir()
            .map_err(|source| Error::Io {
                path: std::env::temp_dir(),
                source,
            })?;
        let path = dir.path().join("id_rsa");

        runner.run(
            "ssh-keygen",
            &[
                "-b".into(),
                "2048".into(),
                "-t".into(),
                "rsa".into(),
                "-f".into(),
                path.display().to_string(),
                "-q".into(),
                "-N".into(),
                String::new(),
            ],
            RunOptions::default(),
        )?;

        Ok(Self {
            path,
            dir: Some(dir),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_generated(&self) -> bool {
        self.dir.is_some()
    }

    pub fn public_key_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".pub");
        PathBuf::from(name)
    }

    /// Contents of the `.pub` file, trimmed.
    pub fn public_key(&self) -> Result<String> {
        let path = self.public_key_path();
        let key = std::fs::read_to_string(&path).map_err(|source| Error::Io { path, source })?;
        Ok(key.trim().to_string())
    }

    /// Stop managing the key's lifetime and return its path.
    pub fn keep(mut self) -> PathBuf {
        if let Some(dir) = self.dir.take() {
            let _ = dir.keep();
        }
        self.path
    }
}
