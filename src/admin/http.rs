use std::time::Duration;

use digest_auth::{AuthContext, HttpMethod};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE};
use reqwest::{Method, StatusCode};
use serde::Deserialize;

use crate::error::{Error, Result};

/// Prefix Gerrit puts in front of every JSON body to defeat XSSI.
const MAGIC_PREFIX: &str = ")]}'";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Username and password for Digest authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            username: "admin".into(),
            password: "secret".into(),
        }
    }
}

/// The parts of Gerrit's `AccountInfo` we log.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AccountInfo {
    #[serde(rename = "_account_id")]
    pub account_id: u64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Minimal client for the handful of REST calls needed to bootstrap an
/// admin. Not a general Gerrit client.
pub struct GerritHttp {
    client: Client,
    base_url: String,
    credentials: Credentials,
}

impl GerritHttp {
    pub fn new(address: &str, port: u16, credentials: Credentials) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: format!("http://{address}:{port}"),
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Hitting the development login page as account 1000000 creates the
    /// first account, which Gerrit makes an administrator.
    pub fn create_first_account(&self) -> Result<()> {
        let path = "/login/%23%2F?account_id=1000000";
        let response = self.client.get(self.url(path)).send()?;
        self.expect_success(Method::GET, path, response)?;
        Ok(())
    }

    /// `GET /a/accounts/self`, proving the credentials work.
    pub fn account_self(&self) -> Result<AccountInfo> {
        let body = self.send_authenticated(Method::GET, "/a/accounts/self", None)?;
        Ok(serde_json::from_str(strip_magic_prefix(&body))?)
    }

    /// Register an OpenSSH public key for the authenticated account.
    pub fn add_ssh_key(&self, public_key: &str) -> Result<()> {
        self.send_authenticated(
            Method::POST,
            "/a/accounts/self/sshkeys",
            Some(public_key.trim().to_string()),
        )?;
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: &Method, path: &str, body: Option<&str>) -> RequestBuilder {
        let mut request = self.client.request(method.clone(), self.url(path));
        if let Some(body) = body {
            request = request
                .header(CONTENT_TYPE, "text/plain")
                .body(body.to_string());
        }
        request
    }

    /// Send once unauthenticated, answer the Digest challenge, send again.
    fn send_authenticated(&self, method: Method, path: &str, body: Option<String>) -> Result<String> {
        let response = self.request(&method, path, body.as_deref()).send()?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return self.expect_success(method, path, response);
        }

        let challenge = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| Error::Digest("401 without a WWW-Authenticate header".into()))?
            .to_string();
        let authorization = digest_authorization(
            &challenge,
            &self.credentials,
            &method,
            path,
            body.as_deref(),
        )?;

        let response = self
            .request(&method, path, body.as_deref())
            .header(AUTHORIZATION, authorization)
            .send()?;
        self.expect_success(method, path, response)
    }

    fn expect_success(&self, method: Method, path: &str, response: Response) -> Result<String> {
        let status = response.status();
        let body = response.text()?;
        tracing::debug!(%method, url = %self.url(path), status = status.as_u16(), "response");
        if !status.is_success() {
            return Err(Error::HttpStatus {
                method: method.to_string(),
                url: self.url(path),
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }
        Ok(body)
    }
}

/// Build the `Authorization` header answering a Digest `challenge`.
pub fn digest_authorization(
    challenge: &str,
    credentials: &Credentials,
    method: &Method,
    uri: &str,
    body: Option<&str>,
) -> Result<String> {
    let mut prompt = digest_auth::parse(challenge).map_err(|e| Error::Digest(e.to_string()))?;
    let context = AuthContext::new_with_method(
        credentials.username.as_str(),
        credentials.password.as_str(),
        uri,
        body.map(str::as_bytes),
        HttpMethod::from(method.as_str()),
    );
    let answer = prompt
        .respond(&context)
        .map_err(|e| Error::Digest(e.to_string()))?;
    Ok(answer.to_header_string())
}

fn strip_magic_prefix(body: &str) -> &str {
    body.strip_prefix(MAGIC_PREFIX).unwrap_or(body).trim_start()
}
