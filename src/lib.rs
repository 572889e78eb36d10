//! Run disposable Gerrit servers in docker for local testing and CI.
//!
//! The [`docker`] module builds launch commands and inspects containers
//! through the runtime CLI, [`wait`] blocks until a container's services
//! accept connections, and [`admin`] bootstraps an administrator with an
//! ssh key.

pub mod admin;
pub mod config;
pub mod docker;
pub mod error;
pub mod wait;

pub use error::{Error, Result};
