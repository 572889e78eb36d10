use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use gerrittest::admin;
use gerrittest::config::{self, Config};
use gerrittest::docker::{self, Docker, KillTarget, PortRequest, ProcessRunner, Service};
use gerrittest::wait::Waiter;

/// Wraps the `docker` command to run Gerrit for tests.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Logging verbosity. Does not affect command output on stdout.
    #[arg(
        long,
        global = true,
        default_value = "info",
        value_parser = ["trace", "debug", "info", "warn", "error"]
    )]
    log_level: String,

    /// Shorthand for `--log-level debug`.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of `./.gerrittest.yml`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run Gerrit in a docker container and print its id.
    Run(RunArgs),
    /// Print the host port a container publishes http or ssh on.
    GetPort {
        port: Service,
        container: String,
    },
    /// List gerrittest containers.
    Ps {
        /// Include stopped containers.
        #[arg(short, long)]
        all: bool,
    },
    /// Remove gerrittest containers.
    Kill {
        /// Remove every gerrittest container.
        #[arg(short, long)]
        all: bool,
        /// Container ids or id prefixes.
        containers: Vec<String>,
    },
    /// Wait for a container's http and ssh ports to accept connections.
    Wait {
        container: String,
        /// Give up after this many seconds.
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Create the admin account and register an ssh key.
    CreateAdmin {
        /// Private key to register; `<path>.pub` must exist. Generated when omitted.
        #[arg(short = 'f', long)]
        key_file: Option<PathBuf>,
        container: String,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Docker image to run.
    #[arg(long, env = "GERRITTEST_DOCKER_IMAGE")]
    image: Option<String>,
    /// Address to publish ports on.
    #[arg(long)]
    ip: Option<String>,
    /// Host port for http: a port number or `random`.
    #[arg(long)]
    http: Option<PortRequest>,
    /// Host port for ssh: a port number or `random`.
    #[arg(long)]
    ssh: Option<PortRequest>,
    /// Block until both services accept connections.
    #[arg(long)]
    wait: bool,
    /// With --wait, give up after this many seconds.
    #[arg(long, requires = "wait")]
    timeout: Option<u64>,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.verbose);

    let cfg = load_config(cli.config.as_deref())?;
    run(cli.command, cfg)
}

fn init_logging(level: &str, verbose: bool) {
    let level = if verbose { "debug" } else { level };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("gerrittest={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => config::load_file(path).context("failed to load config"),
        None => {
            let cwd = std::env::current_dir().context("failed to read working directory")?;
            config::load(&cwd).context("failed to load config")
        }
    }
}

fn connect(cfg: &Config, command: &'static str) -> Result<Docker<ProcessRunner>> {
    let docker = Docker::system(cfg.docker.clone())
        .with_span(tracing::info_span!("gerrittest", command));
    docker::ensure_available(docker.runner(), &cfg.docker)?;
    Ok(docker)
}

fn run(command: Commands, mut cfg: Config) -> Result<ExitCode> {
    match command {
        Commands::Run(args) => {
            if let Some(image) = args.image {
                cfg.image = image;
            }
            cfg.ip = args.ip.or(cfg.ip);
            cfg.http = args.http.unwrap_or(cfg.http);
            cfg.ssh = args.ssh.unwrap_or(cfg.ssh);
            if args.timeout.is_some() {
                cfg.wait_timeout_secs = args.timeout;
            }

            let docker = connect(&cfg, "run")?;
            let id = docker
                .launch(&cfg.container_spec())
                .context("failed to start container")?;
            println!("{id}");

            if args.wait {
                docker
                    .await_ready(&id, &Waiter::new(cfg.wait_policy()))
                    .with_context(|| format!("container {id} did not become ready"))?;
            }
        }

        Commands::GetPort { port, container } => {
            let docker = connect(&cfg, "get-port")?;
            match docker.service_port(port, &container)? {
                Some(host) => println!("{host}"),
                None => {
                    tracing::error!(%port, container = %container, "port is not published");
                    return Ok(ExitCode::FAILURE);
                }
            }
        }

        Commands::Ps { all } => {
            let docker = connect(&cfg, "ps")?;
            for id in docker.list(all)? {
                println!("{}", id?);
            }
        }

        Commands::Kill { all, containers } => {
            let target = KillTarget::from_args(all, &containers)?;
            let docker = connect(&cfg, "kill")?;
            for removed in docker.kill(&target)? {
                println!("{removed}");
            }
        }

        Commands::Wait { container, timeout } => {
            if timeout.is_some() {
                cfg.wait_timeout_secs = timeout;
            }
            let docker = connect(&cfg, "wait")?;
            docker
                .await_ready(&container, &Waiter::new(cfg.wait_policy()))
                .with_context(|| format!("container {container} did not become ready"))?;
        }

        Commands::CreateAdmin {
            key_file,
            container,
        } => {
            let docker = connect(&cfg, "create-admin")?;
            let account = admin::create_admin(
                &docker,
                &container,
                key_file.as_deref(),
                cfg.credentials(),
            )
            .context("failed to create admin account")?;
            println!("{}", account.key_path.display());
        }
    }

    Ok(ExitCode::SUCCESS)
}
