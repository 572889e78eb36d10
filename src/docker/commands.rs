use crate::error::{Error, Result};

use super::types::{
    ContainerSpec, INTERNAL_HTTP_PORT, INTERNAL_SSH_PORT, LABEL_KEY, LABEL_VALUE, LaunchCommand,
    PortRequest,
};

/// Build the `run` arguments that launch Gerrit from `spec`.
///
/// The result is `run --detach --label gerrittest=1 --publish <http>
/// --publish <ssh> <image>`. The image must stay last since everything
/// after it would be passed to the container's entrypoint.
pub fn build(spec: &ContainerSpec) -> Result<LaunchCommand> {
    if spec.image.trim().is_empty() {
        return Err(Error::EmptyImage);
    }

    let bind = spec.bind_address.as_deref();
    let http = publish_clause(bind, spec.http, INTERNAL_HTTP_PORT)?;
    let ssh = publish_clause(bind, spec.ssh, INTERNAL_SSH_PORT)?;

    let args = vec![
        "run".into(),
        "--detach".into(),
        "--label".into(),
        format!("{LABEL_KEY}={LABEL_VALUE}"),
        "--publish".into(),
        http,
        "--publish".into(),
        ssh,
        spec.image.clone(),
    ];

    Ok(LaunchCommand { args })
}

/// Format one `--publish` value.
///
/// | request  | no address      | with address        |
/// |----------|-----------------|---------------------|
/// | Random   | `8080`          | `10.0.0.1::8080`    |
/// | Fixed(p) | `p:8080`        | `10.0.0.1:p:8080`   |
///
/// IPv6 addresses are bracketed: `[::1]:p:8080`.
fn publish_clause(bind: Option<&str>, request: PortRequest, internal: u16) -> Result<String> {
    let host = request.host_port()?;
    let bind = bind.map(bracket_ipv6);
    let clause = match (bind.as_deref(), host) {
        (None, None) => internal.to_string(),
        (None, Some(port)) => format!("{port}:{internal}"),
        (Some(addr), None) => format!("{addr}::{internal}"),
        (Some(addr), Some(port)) => format!("{addr}:{port}:{internal}"),
    };
    Ok(clause)
}

fn bracket_ipv6(addr: &str) -> String {
    if addr.contains(':') && !addr.starts_with('[') {
        format!("[{addr}]")
    } else {
        addr.to_string()
    }
}

/// A `--publish` value split back into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishClause {
    pub bind_address: Option<String>,
    pub request: PortRequest,
    pub internal: u16,
}

/// Inverse of the clause formatting done by [`build`].
///
/// Only the forms [`build`] produces are accepted; a trailing `/tcp` is
/// tolerated. A bracketed IPv6 address is returned without its brackets.
pub fn parse_publish(clause: &str) -> Result<PublishClause> {
    let invalid = || Error::InvalidPortKind(clause.to_string());
    let clause_body = clause.strip_suffix("/tcp").unwrap_or(clause);

    let (bind_address, host, internal) = if let Some(rest) = clause_body.strip_prefix('[') {
        let (addr, ports) = rest.split_once("]:").ok_or_else(invalid)?;
        match ports.split(':').collect::<Vec<_>>().as_slice() {
            [host, internal] if !addr.is_empty() => {
                (Some(addr.to_string()), Some(*host), *internal)
            }
            _ => return Err(invalid()),
        }
    } else {
        match clause_body.split(':').collect::<Vec<_>>().as_slice() {
            [internal] => (None, None, *internal),
            [host, internal] => (None, Some(*host), *internal),
            [addr, host, internal] => (Some(addr.to_string()), Some(*host), *internal),
            _ => return Err(invalid()),
        }
    };

    let internal: u16 = internal.parse().map_err(|_| invalid())?;
    let request = match host {
        None | Some("") => PortRequest::Random,
        Some(port) => match port.parse::<u16>() {
            Ok(p) if p > 0 => PortRequest::Fixed(p),
            _ => return Err(invalid()),
        },
    };

    Ok(PublishClause {
        bind_address,
        request,
        internal,
    })
}
