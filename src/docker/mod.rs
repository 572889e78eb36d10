// Container runtime plumbing: launch, inspect, list and remove Gerrit containers.

pub mod client;
pub mod commands;
pub mod engine;
pub mod inspect;
pub mod registry;
pub mod types;

pub use client::Docker;
pub use commands::{PublishClause, build, parse_publish};
pub use engine::{CommandRunner, ProcessRunner, RunOptions, command_line, ensure_available};
pub use registry::ContainerIds;
pub use types::{
    ContainerRecord, ContainerSpec, ContainerStatus, DEFAULT_IMAGE, INTERNAL_HTTP_PORT,
    INTERNAL_SSH_PORT, KillTarget, LaunchCommand, PortRequest, Service,
};
