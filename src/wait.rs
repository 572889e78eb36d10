//! Blocking readiness polling: run state first, then the http and ssh
//! sockets, one after the other.

use std::collections::HashMap;
use std::fmt;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use crate::docker::{CommandRunner, Docker, Service};
use crate::error::{Error, Result};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Upper bound on a single TCP connect attempt.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Where a wait currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPhase {
    RunState,
    HttpSocket,
    SshSocket,
}

impl WaitPhase {
    fn socket(service: Service) -> Self {
        match service {
            Service::Http => WaitPhase::HttpSocket,
            Service::Ssh => WaitPhase::SshSocket,
        }
    }
}

impl fmt::Display for WaitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WaitPhase::RunState => "run state",
            WaitPhase::HttpSocket => "http socket",
            WaitPhase::SshSocket => "ssh socket",
        })
    }
}

/// Time source for the poll loop.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// What the waiter polls.
pub trait Probe {
    /// Whether the container has reached the running state.
    fn running(&mut self) -> Result<bool>;

    /// One TCP connect attempt against `service`. `Ok(false)` means "not yet".
    fn connect(&mut self, service: Service) -> Result<bool>;
}

/// Polling bounds. Both `None` means wait forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub interval: Duration,
    pub timeout: Option<Duration>,
    /// Total attempts across all phases.
    pub max_attempts: Option<u64>,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
            max_attempts: None,
        }
    }
}

pub struct Waiter<C = SystemClock> {
    policy: WaitPolicy,
    clock: C,
}

impl Waiter<SystemClock> {
    pub fn new(policy: WaitPolicy) -> Self {
        Self::with_clock(policy, SystemClock)
    }
}

impl<C: Clock> Waiter<C> {
    pub fn with_clock(policy: WaitPolicy, clock: C) -> Self {
        Self { policy, clock }
    }

    /// Block until `probe` reports running, then http, then ssh.
    pub fn await_ready<P: Probe>(&self, probe: &mut P) -> Result<()> {
        let started = self.clock.now();
        let mut attempts = 0;

        self.poll(WaitPhase::RunState, started, &mut attempts, || {
            probe.running()
        })?;
        for service in [Service::Http, Service::Ssh] {
            self.poll(WaitPhase::socket(service), started, &mut attempts, || {
                probe.connect(service)
            })?;
        }

        tracing::info!(
            elapsed = ?self.clock.now().duration_since(started),
            attempts,
            "container ready"
        );
        Ok(())
    }

    fn poll(
        &self,
        phase: WaitPhase,
        started: Instant,
        attempts: &mut u64,
        mut check: impl FnMut() -> Result<bool>,
    ) -> Result<()> {
        let phase_started = self.clock.now();
        tracing::debug!(%phase, "waiting");
        loop {
            *attempts += 1;
            if check()? {
                tracing::debug!(
                    %phase,
                    elapsed = ?self.clock.now().duration_since(phase_started),
                    "done"
                );
                return Ok(());
            }

            let exhausted = self.policy.max_attempts.is_some_and(|max| *attempts >= max)
                || self
                    .policy
                    .timeout
                    .is_some_and(|t| self.clock.now().duration_since(started) >= t);
            if exhausted {
                return Err(Error::WaitTimeout {
                    phase,
                    attempts: *attempts,
                });
            }
            self.clock.sleep(self.policy.interval);
        }
    }
}

/// Probes a live container through the runtime CLI and plain TCP.
pub struct DockerProbe<'a, R> {
    docker: &'a Docker<R>,
    id: String,
    endpoints: HashMap<Service, (String, u16)>,
}

impl<'a, R: CommandRunner> DockerProbe<'a, R> {
    pub fn new(docker: &'a Docker<R>, id: impl Into<String>) -> Self {
        Self {
            docker,
            id: id.into(),
            endpoints: HashMap::new(),
        }
    }

    /// Gateway and host port for `service`, looked up once per wait.
    fn endpoint(&mut self, service: Service) -> Result<(String, u16)> {
        if let Some(endpoint) = self.endpoints.get(&service) {
            return Ok(endpoint.clone());
        }
        let status = self.docker.inspect(&self.id, None)?;
        if status.gateway.is_empty() {
            return Err(Error::MissingGateway(self.id.clone()));
        }
        let port = status
            .host_port(service.internal_port())?
            .ok_or_else(|| Error::PortNotPublished {
                id: self.id.clone(),
                port: service.internal_port(),
            })?;
        let endpoint = (status.gateway, port);
        self.endpoints.insert(service, endpoint.clone());
        Ok(endpoint)
    }
}

impl<R: CommandRunner> Probe for DockerProbe<'_, R> {
    fn running(&mut self) -> Result<bool> {
        let status = self.docker.inspect(&self.id, None)?;
        tracing::trace!(id = %self.id, status = %status.status, "run state");
        Ok(status.running)
    }

    fn connect(&mut self, service: Service) -> Result<bool> {
        let (host, port) = self.endpoint(service)?;
        Ok(tcp_connect(&host, port, CONNECT_TIMEOUT))
    }
}

/// A single connect attempt; any failure just means "not yet".
pub fn tcp_connect(host: &str, port: u16, timeout: Duration) -> bool {
    let Ok(addrs) = (host, port).to_socket_addrs() else {
        return false;
    };
    addrs
        .into_iter()
        .any(|addr| TcpStream::connect_timeout(&addr, timeout).is_ok())
}

impl<R: CommandRunner> Docker<R> {
    /// Block until container `id` is running and both services accept TCP
    /// connections on its gateway.
    pub fn await_ready<C: Clock>(&self, id: &str, waiter: &Waiter<C>) -> Result<()> {
        let _entered = self.span().enter();
        waiter.await_ready(&mut DockerProbe::new(self, id))
    }
}
