use std::path::Path;

use crate::error::{Error, Result};

use super::types::Config;

/// Name of the per-directory config file.
pub const CONFIG_FILE: &str = ".gerrittest.yml";

/// Load `.gerrittest.yml` from `dir`, falling back to defaults when absent.
pub fn load(dir: &Path) -> Result<Config> {
    let path = dir.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(Config::default());
    }
    load_file(&path)
}

/// Load an explicit config file. A missing file is an error here.
pub fn load_file(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| Error::Config {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docker::PortRequest;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load(dir.path()).unwrap(), Config::default());
    }

    #[test]
    fn reads_file_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "image: example/gerrit:3.9\nssh: 29419\nwait_timeout_secs: 120\n",
        )
        .unwrap();

        let cfg = load(dir.path()).unwrap();
        assert_eq!(cfg.image, "example/gerrit:3.9");
        assert_eq!(cfg.ssh, PortRequest::Fixed(29419));
        assert_eq!(cfg.wait_timeout_secs, Some(120));
    }

    #[test]
    fn empty_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.yml");
        std::fs::write(&path, "\n").unwrap();
        assert_eq!(load_file(&path).unwrap(), Config::default());
    }

    #[test]
    fn invalid_port_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yml");
        std::fs::write(&path, "http: banana\n").unwrap();
        assert!(matches!(load_file(&path), Err(Error::Config { .. })));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_file(&dir.path().join("nope.yml")),
            Err(Error::Io { .. })
        ));
    }
}
