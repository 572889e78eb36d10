use crate::error::{Error, Result};

use super::commands;
use super::engine::{CommandRunner, ProcessRunner, RunOptions};
use super::inspect::parse_status;
use super::types::{ContainerSpec, ContainerStatus, Service};

/// Handle on the container runtime CLI.
///
/// Every call goes through the wrapped [`CommandRunner`] and is logged under
/// this handle's span, so callers decide where diagnostics are attributed.
pub struct Docker<R = ProcessRunner> {
    runner: R,
    program: String,
    span: tracing::Span,
}

impl Docker<ProcessRunner> {
    /// A handle that spawns `program` (usually `docker`) for real.
    pub fn system(program: impl Into<String>) -> Self {
        Self::new(ProcessRunner, program)
    }
}

impl<R: CommandRunner> Docker<R> {
    pub fn new(runner: R, program: impl Into<String>) -> Self {
        let program = program.into();
        let span = tracing::debug_span!("docker", program = %program);
        Self {
            runner,
            program,
            span,
        }
    }

    /// Replace the span diagnostics are recorded under.
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn span(&self) -> &tracing::Span {
        &self.span
    }

    pub(crate) fn exec(&self, args: Vec<String>) -> Result<Vec<u8>> {
        let _entered = self.span.enter();
        self.runner.run(&self.program, &args, RunOptions::default())
    }

    /// Launch a detached container and return its id.
    pub fn launch(&self, spec: &ContainerSpec) -> Result<String> {
        let command = commands::build(spec)?;
        let output = self.exec(command.args)?;
        let id = String::from_utf8_lossy(&output).trim().to_string();
        tracing::info!(parent: &self.span, id = %id, image = %spec.image, "container started");
        Ok(id)
    }

    /// Inspect `id`, optionally insisting on a particular `State.Status`.
    pub fn inspect(&self, id: &str, required_status: Option<&str>) -> Result<ContainerStatus> {
        let output = self.exec(vec![
            "inspect".into(),
            "--type".into(),
            "container".into(),
            id.to_string(),
        ])?;
        let status = parse_status(id, &output)?;

        if let Some(expected) = required_status
            && status.status != expected
        {
            return Err(Error::UnexpectedState {
                id: id.to_string(),
                observed: status.status,
                expected: expected.to_string(),
            });
        }
        Ok(status)
    }

    /// Host port `internal_port` is published on, if any.
    pub fn get_port(&self, internal_port: u16, id: &str) -> Result<Option<u16>> {
        self.inspect(id, None)?.host_port(internal_port)
    }

    pub fn service_port(&self, service: Service, id: &str) -> Result<Option<u16>> {
        self.get_port(service.internal_port(), id)
    }

    /// Like [`Docker::service_port`] but an unpublished port is an error.
    pub fn require_service_port(&self, service: Service, id: &str) -> Result<u16> {
        self.service_port(service, id)?
            .ok_or_else(|| Error::PortNotPublished {
                id: id.to_string(),
                port: service.internal_port(),
            })
    }

    /// Gateway of the container's network. Probes and API calls target this
    /// address since the tool runs outside the container's namespace.
    pub fn get_gateway(&self, id: &str) -> Result<String> {
        let status = self.inspect(id, None)?;
        if status.gateway.is_empty() {
            return Err(Error::MissingGateway(id.to_string()));
        }
        Ok(status.gateway)
    }
}
