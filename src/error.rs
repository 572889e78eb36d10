//! Error type shared by the docker, wait, admin and config modules.

use std::path::PathBuf;

use crate::wait::WaitPhase;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("`{command}` exited with {}: {stderr}", code.map_or_else(|| "a signal".to_string(), |c| format!("code {c}")))]
    ProcessFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("failed to invoke `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("found {count} containers for {id:?}, expected exactly one")]
    AmbiguousContainer { id: String, count: usize },

    #[error("container {id:?} is {observed:?}, expected {expected:?}")]
    UnexpectedState {
        id: String,
        observed: String,
        expected: String,
    },

    #[error("internal port {port} has {count} host mappings, expected one")]
    AmbiguousPortMapping { port: u16, count: usize },

    #[error("invalid port request {0:?}: expected \"random\" or a port in 1-65535")]
    InvalidPortKind(String),

    #[error("image name must not be empty")]
    EmptyImage,

    #[error("no containers specified; pass container ids or --all")]
    NoTargetSpecified,

    #[error("internal port {port} is not published by container {id:?}")]
    PortNotPublished { id: String, port: u16 },

    #[error("container {0:?} has no network gateway")]
    MissingGateway(String),

    #[error("gave up waiting for {phase} after {attempts} attempts")]
    WaitTimeout { phase: WaitPhase, attempts: u64 },

    #[error("malformed inspection payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{method} {url} returned {status}: {body}")]
    HttpStatus {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("digest authentication failed: {0}")]
    Digest(String),

    #[error("ssh check failed: {0}")]
    SshCheck(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}
