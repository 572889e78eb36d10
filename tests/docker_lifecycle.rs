//! Integration tests against a real Docker daemon.
//!
//! These pull and start the Gerrit image, so they are marked `#[ignore]`.
//! Run with: `cargo test -- --ignored`

use std::time::Duration;

use gerrittest::admin::{self, Credentials};
use gerrittest::docker::{ContainerSpec, Docker, KillTarget, ProcessRunner, Service};
use gerrittest::wait::{WaitPolicy, Waiter};

/// Removes the container even when an assertion fails.
struct Cleanup<'a> {
    docker: &'a Docker<ProcessRunner>,
    id: String,
}

impl Drop for Cleanup<'_> {
    fn drop(&mut self) {
        let _ = self.docker.remove(&self.id);
    }
}

fn image() -> String {
    std::env::var("GERRITTEST_DOCKER_IMAGE").unwrap_or_else(|_| ContainerSpec::default().image)
}

fn bounded_wait() -> Waiter {
    Waiter::new(WaitPolicy {
        timeout: Some(Duration::from_secs(300)),
        ..WaitPolicy::default()
    })
}

#[test]
#[ignore]
fn run_wait_and_inspect() {
    let docker = Docker::system("docker");
    let spec = ContainerSpec {
        image: image(),
        ..ContainerSpec::default()
    };

    let id = docker.launch(&spec).expect("failed to launch container");
    let _cleanup = Cleanup {
        docker: &docker,
        id: id.clone(),
    };

    docker.await_ready(&id, &bounded_wait()).expect("container never became ready");

    let status = docker.inspect(&id, Some("running")).unwrap();
    assert!(status.running);
    assert!(status.is_labeled());
    assert!(docker.service_port(Service::Http, &id).unwrap().is_some());
    assert!(docker.service_port(Service::Ssh, &id).unwrap().is_some());
    assert!(!docker.get_gateway(&id).unwrap().is_empty());

    let listed: Vec<String> = docker.list(false).unwrap().map(Result::unwrap).collect();
    assert!(listed.contains(&status.id));
}

#[test]
#[ignore]
fn kill_by_prefix_removes_container() {
    let docker = Docker::system("docker");
    let spec = ContainerSpec {
        image: image(),
        ..ContainerSpec::default()
    };
    let id = docker.launch(&spec).expect("failed to launch container");
    let _cleanup = Cleanup {
        docker: &docker,
        id: id.clone(),
    };

    let target = KillTarget::from_args(false, &[id[..12].to_string()]).unwrap();
    let removed = docker.kill(&target).unwrap();
    assert_eq!(removed, vec![id.clone()]);

    let remaining: Vec<String> = docker.list(true).unwrap().map(Result::unwrap).collect();
    assert!(!remaining.contains(&id));
}

#[test]
#[ignore]
fn create_admin_end_to_end() {
    let docker = Docker::system("docker");
    let spec = ContainerSpec {
        image: image(),
        ..ContainerSpec::default()
    };
    let id = docker.launch(&spec).expect("failed to launch container");
    let _cleanup = Cleanup {
        docker: &docker,
        id: id.clone(),
    };
    docker.await_ready(&id, &bounded_wait()).expect("container never became ready");

    let account = admin::create_admin(&docker, &id, None, Credentials::default())
        .expect("admin bootstrap failed");
    assert_eq!(account.username, "admin");
    assert!(account.version.starts_with("gerrit version"));
    assert!(account.key_path.exists());

    if let Some(dir) = account.key_path.parent() {
        let _ = std::fs::remove_dir_all(dir);
    }
}
