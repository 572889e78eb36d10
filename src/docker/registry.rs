use std::vec;

use crate::error::{Error, Result};

use super::client::Docker;
use super::engine::CommandRunner;
use super::types::KillTarget;

/// Labeled container ids from one `ps` snapshot, inspected lazily.
///
/// Single pass: the snapshot is taken when the iterator is created.
pub struct ContainerIds<'a, R> {
    docker: &'a Docker<R>,
    candidates: vec::IntoIter<String>,
}

impl<R: CommandRunner> Iterator for ContainerIds<'_, R> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        for id in self.candidates.by_ref() {
            match self.docker.inspect(&id, None).map(|status| status.record()) {
                Ok(record) if record.labeled => return Some(Ok(record.id)),
                Ok(_) => continue,
                Err(ref e) if vanished(e) => {
                    tracing::debug!(id = %id, "container vanished during listing");
                    continue;
                }
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }
}

/// Removed between `ps` and `inspect`.
fn vanished(err: &Error) -> bool {
    match err {
        Error::ProcessFailed { stderr, .. } => stderr.contains("No such"),
        Error::AmbiguousContainer { count, .. } => *count == 0,
        _ => false,
    }
}

impl<R: CommandRunner> Docker<R> {
    /// Ids of containers started by this tool. Stopped containers are only
    /// included when `include_all` is set.
    pub fn list(&self, include_all: bool) -> Result<ContainerIds<'_, R>> {
        let mut args = vec!["ps".to_string(), "--quiet".into(), "--no-trunc".into()];
        if include_all {
            args.push("--all".into());
        }
        let output = self.exec(args)?;
        let candidates: Vec<String> = String::from_utf8_lossy(&output)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        Ok(ContainerIds {
            docker: self,
            candidates: candidates.into_iter(),
        })
    }

    /// Force-remove a container. Equivalent to `docker rm --force <id>`.
    pub fn remove(&self, id: &str) -> Result<String> {
        let output = self.exec(vec!["rm".into(), "--force".into(), id.to_string()])?;
        Ok(String::from_utf8_lossy(&output).trim().to_string())
    }

    /// Remove every discovered container selected by `target`, stopped ones
    /// included. Returns the removed ids.
    pub fn kill(&self, target: &KillTarget) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        for id in self.list(true)? {
            let id = id?;
            if !target.matches(&id) {
                tracing::debug!(id = %id, "not removing (filtered)");
                continue;
            }
            let output = self.remove(&id)?;
            tracing::debug!(id = %id, output = %output, "rm finished");
            tracing::info!(id = %id, "container removed");
            removed.push(id);
        }
        Ok(removed)
    }
}
