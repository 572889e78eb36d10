// Admin bootstrap: first account over HTTP, ssh key upload, ssh round trip.

pub mod http;
pub mod keys;
pub mod ssh;

use std::path::{Path, PathBuf};

use crate::docker::{CommandRunner, Docker, Service};
use crate::error::Result;

pub use http::{AccountInfo, Credentials, GerritHttp};
pub use keys::SshKey;

/// An admin that has been created and verified over ssh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminAccount {
    pub username: String,
    pub password: String,
    pub key_path: PathBuf,
    pub version: String,
}

/// Create the admin account in container `id` and register an ssh key.
///
/// With `key_file` unset a key pair is generated; it is kept only if every
/// step succeeds.
pub fn create_admin<R: CommandRunner>(
    docker: &Docker<R>,
    id: &str,
    key_file: Option<&Path>,
    credentials: Credentials,
) -> Result<AdminAccount> {
    let address = docker.get_gateway(id)?;
    let http_port = docker.require_service_port(Service::Http, id)?;

    let http = GerritHttp::new(&address, http_port, credentials.clone())?;
    http.create_first_account()?;
    let account = http.account_self()?;
    tracing::info!(
        account_id = account.account_id,
        username = ?account.username,
        url = %http.base_url(),
        "admin account ready"
    );

    let key = match key_file {
        Some(path) => SshKey::existing(path),
        None => SshKey::generate(docker.runner())?,
    };
    http.add_ssh_key(&key.public_key()?)?;

    let ssh_port = docker.require_service_port(Service::Ssh, id)?;
    let version = ssh::gerrit_version(
        docker.runner(),
        &address,
        ssh_port,
        &credentials.username,
        key.path(),
    )?;
    tracing::info!(%version, generated = key.is_generated(), "ssh key verified");

    Ok(AdminAccount {
        username: credentials.username,
        password: credentials.password,
        key_path: key.keep(),
        version,
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::sync::{Arc, Mutex};
    use std::thread::JoinHandle;

    use super::*;
    use crate::docker::RunOptions;
    use crate::docker::inspect::tests::payload;
    use crate::error::Error;

    #[derive(Debug, Clone)]
    struct Seen {
        method: String,
        path: String,
        authorized: bool,
        body: String,
    }

    /// Serves `count` requests, one connection each, answering like Gerrit.
    fn fake_gerrit(
        count: usize,
        key_status: u16,
    ) -> (u16, Arc<Mutex<Vec<Seen>>>, JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();

        let handle = std::thread::spawn(move || {
            for stream in listener.incoming().take(count) {
                let mut stream = stream.unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());

                let mut request_line = String::new();
                reader.read_line(&mut request_line).unwrap();
                let mut parts = request_line.split_whitespace();
                let method = parts.next().unwrap_or_default().to_string();
                let path = parts.next().unwrap_or_default().to_string();

                let mut length = 0;
                let mut authorized = false;
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).unwrap();
                    let line = line.trim_end();
                    if line.is_empty() {
                        break;
                    }
                    let lower = line.to_ascii_lowercase();
                    if let Some(v) = lower.strip_prefix("content-length:") {
                        length = v.trim().parse().unwrap();
                    }
                    if lower.starts_with("authorization: digest") {
                        authorized = true;
                    }
                }
                let mut body = vec![0; length];
                reader.read_exact(&mut body).unwrap();

                let (status, extra, reply) = match (path.as_str(), authorized) {
                    (p, _) if p.starts_with("/login/") => (200, "", String::new()),
                    (_, false) => (
                        401,
                        "WWW-Authenticate: Digest realm=\"Gerrit Code Review\", qop=\"auth\", nonce=\"abc123\"\r\n",
                        String::new(),
                    ),
                    ("/a/accounts/self", true) => (
                        200,
                        "",
                        ")]}'\n{\"_account_id\":1000000,\"username\":\"admin\"}".to_string(),
                    ),
                    (_, true) => (key_status, "", String::new()),
                };

                log.lock().unwrap().push(Seen {
                    method,
                    path,
                    authorized,
                    body: String::from_utf8_lossy(&body).into_owned(),
                });
                let response = format!(
                    "HTTP/1.1 {status} X\r\n{extra}Content-Length: {}\r\nConnection: close\r\n\r\n{reply}",
                    reply.len()
                );
                stream.write_all(response.as_bytes()).unwrap();
            }
        });
        (port, seen, handle)
    }

    /// Answers docker, ssh-keygen and ssh the way a healthy setup would.
    struct FakeTools {
        inspect: String,
        key_path: RefCell<Option<String>>,
        ssh_calls: RefCell<u32>,
    }

    impl CommandRunner for FakeTools {
        fn run(&self, program: &str, args: &[String], _opts: RunOptions) -> Result<Vec<u8>> {
            match program {
                "docker" => Ok(self.inspect.clone().into_bytes()),
                "ssh-keygen" => {
                    let path = &args[args.iter().position(|a| a == "-f").unwrap() + 1];
                    std::fs::write(path, "PRIVATE").unwrap();
                    std::fs::write(format!("{path}.pub"), "ssh-rsa AAAAB3Nza gerrittest\n").unwrap();
                    *self.key_path.borrow_mut() = Some(path.clone());
                    Ok(Vec::new())
                }
                "ssh" => {
                    *self.ssh_calls.borrow_mut() += 1;
                    Ok(b"gerrit version 2.14.3\n".to_vec())
                }
                other => panic!("unexpected program {other}"),
            }
        }
    }

    fn tools(http_port: u16) -> FakeTools {
        let http = http_port.to_string();
        let inspect = payload("c1", "running", &[http.as_str()], &["29418"])
            .replace("172.17.0.1", "127.0.0.1");
        FakeTools {
            inspect,
            key_path: RefCell::new(None),
            ssh_calls: RefCell::new(0),
        }
    }

    #[test]
    fn creates_admin_and_registers_generated_key() {
        let (port, seen, server) = fake_gerrit(5, 201);
        let docker = Docker::new(tools(port), "docker");

        let admin = create_admin(&docker, "c1", None, Credentials::default()).unwrap();
        server.join().unwrap();

        assert_eq!(admin.username, "admin");
        assert_eq!(admin.version, "gerrit version 2.14.3");
        assert!(admin.key_path.exists());
        assert_eq!(*docker.runner().ssh_calls.borrow(), 1);

        let seen = seen.lock().unwrap();
        let paths: Vec<_> = seen
            .iter()
            .map(|s| (s.method.as_str(), s.path.as_str(), s.authorized))
            .collect();
        assert_eq!(
            paths,
            vec![
                ("GET", "/login/%23%2F?account_id=1000000", false),
                ("GET", "/a/accounts/self", false),
                ("GET", "/a/accounts/self", true),
                ("POST", "/a/accounts/self/sshkeys", false),
                ("POST", "/a/accounts/self/sshkeys", true),
            ]
        );
        assert_eq!(seen[4].body, "ssh-rsa AAAAB3Nza gerrittest");

        std::fs::remove_dir_all(admin.key_path.parent().unwrap()).unwrap();
    }

    #[test]
    fn generated_key_is_discarded_when_upload_fails() {
        let (port, _seen, server) = fake_gerrit(5, 400);
        let docker = Docker::new(tools(port), "docker");

        let err = create_admin(&docker, "c1", None, Credentials::default()).unwrap_err();
        server.join().unwrap();

        assert!(matches!(err, Error::HttpStatus { status: 400, .. }));
        let key_path = docker.runner().key_path.borrow().clone().unwrap();
        assert!(!Path::new(&key_path).exists());
        assert_eq!(*docker.runner().ssh_calls.borrow(), 0);
    }
}
