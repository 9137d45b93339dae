//! Registry credentials and authentication challenges
//!
//! Credentials are looked up per registry host in this order:
//! 1. `TAGSYNC_REGISTRY_USERNAME` / `TAGSYNC_REGISTRY_PASSWORD`, only for the
//!    hosts listed in `TAGSYNC_REGISTRY_HOST` (comma separated)
//! 2. Docker `credHelpers` entry for the host, then `credsStore`
//!    (runs `docker-credential-<helper> get`)
//! 3. Docker `auths` entry for the host
//!
//! Nothing is cached on disk; the core never sees the secrets.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use tracing::{debug, trace, warn};

const USERNAME_ENV: &str = "TAGSYNC_REGISTRY_USERNAME";
const PASSWORD_ENV: &str = "TAGSYNC_REGISTRY_PASSWORD";
const HOST_ENV: &str = "TAGSYNC_REGISTRY_HOST";

/// Username/secret pair for a registry
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub secret: String,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Source of credentials for registry hosts
pub trait CredentialProvider: Send + Sync {
    /// Credential for `registry`, or `None` for anonymous access
    fn credential_for(&self, registry: &str) -> Option<Credential>;
}

/// Anonymous access everywhere
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl CredentialProvider for Anonymous {
    fn credential_for(&self, _registry: &str) -> Option<Credential> {
        None
    }
}

/// Credentials from the environment and the Docker client configuration
#[derive(Debug, Clone)]
pub struct DockerCredentials {
    config_path: Option<PathBuf>,
    env_credential: Option<ScopedCredential>,
}

/// A credential usable only on the listed hosts
#[derive(Debug, Clone)]
struct ScopedCredential {
    hosts: HashSet<String>,
    credential: Credential,
}

impl DockerCredentials {
    /// Read `TAGSYNC_REGISTRY_*` variables and locate the Docker config
    /// (`$DOCKER_CONFIG/config.json`, else `~/.docker/config.json`)
    pub fn from_env() -> Self {
        let env_credential = match (std::env::var(USERNAME_ENV), std::env::var(PASSWORD_ENV)) {
            (Ok(username), Ok(secret)) if !username.is_empty() => {
                let hosts: HashSet<String> = std::env::var(HOST_ENV)
                    .unwrap_or_default()
                    .split(',')
                    .map(|host| host.trim().to_ascii_lowercase())
                    .filter(|host| !host.is_empty())
                    .collect();
                if hosts.is_empty() {
                    warn!(
                        "{} is set but {} is not; ignoring the environment credentials",
                        USERNAME_ENV, HOST_ENV
                    );
                    None
                } else {
                    Some(ScopedCredential {
                        hosts,
                        credential: Credential { username, secret },
                    })
                }
            }
            _ => None,
        };

        let config_path = std::env::var_os("DOCKER_CONFIG")
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|home| home.join(".docker")))
            .map(|dir| dir.join("config.json"));

        Self {
            config_path,
            env_credential,
        }
    }

    /// Use an explicit Docker config file and ignore the environment
    pub fn with_config_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: Some(path.into()),
            env_credential: None,
        }
    }

    fn load_config(&self) -> Option<DockerConfig> {
        let path = self.config_path.as_ref()?;
        let content = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str(&content) {
            Ok(config) => Some(config),
            Err(e) => {
                debug!("Ignoring unreadable Docker config {}: {}", path.display(), e);
                None
            }
        }
    }
}

impl CredentialProvider for DockerCredentials {
    fn credential_for(&self, registry: &str) -> Option<Credential> {
        if let Some(scoped) = &self.env_credential {
            if scoped.hosts.contains(&registry.to_ascii_lowercase()) {
                trace!("Using credentials from environment for {}", registry);
                return Some(scoped.credential.clone());
            }
        }

        let config = self.load_config()?;

        let helper = config
            .cred_helpers
            .get(registry)
            .or(config.creds_store.as_ref());
        if let Some(helper) = helper {
            if let Some(credential) = run_credential_helper(helper, registry) {
                return Some(credential);
            }
        }

        config
            .auths
            .iter()
            .find(|(key, _)| auth_key_matches(key, registry))
            .and_then(|(_, entry)| entry.credential())
    }
}

/// `auths` keys may be bare hosts or URLs such as `https://gcr.io/v1/`
fn auth_key_matches(key: &str, registry: &str) -> bool {
    let host = key
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .split('/')
        .next()
        .unwrap_or_default();
    host.eq_ignore_ascii_case(registry)
}

fn run_credential_helper(helper: &str, registry: &str) -> Option<Credential> {
    let program = format!("docker-credential-{}", helper);
    debug!("Asking {} for {} credentials", program, registry);

    let output = duct::cmd(&program, ["get"])
        .stdin_bytes(registry.as_bytes())
        .stderr_null()
        .unchecked()
        .stdout_capture()
        .run()
        .ok()?;

    if !output.status.success() {
        debug!("{} has no credentials for {}", program, registry);
        return None;
    }

    let response: HelperResponse = serde_json::from_slice(&output.stdout).ok()?;
    Some(Credential {
        username: response.username,
        secret: response.secret,
    })
}

#[derive(Debug, Default, Deserialize)]
struct DockerConfig {
    #[serde(default)]
    auths: HashMap<String, AuthEntry>,
    #[serde(default, rename = "credHelpers")]
    cred_helpers: HashMap<String, String>,
    #[serde(default, rename = "credsStore")]
    creds_store: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthEntry {
    #[serde(default)]
    auth: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

impl AuthEntry {
    fn credential(&self) -> Option<Credential> {
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            return Some(Credential {
                username: username.clone(),
                secret: password.clone(),
            });
        }

        let decoded = STANDARD.decode(self.auth.as_deref()?).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (username, secret) = decoded.split_once(':')?;
        Some(Credential {
            username: username.to_string(),
            secret: secret.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct HelperResponse {
    #[serde(rename = "Username")]
    username: String,
    #[serde(rename = "Secret")]
    secret: String,
}

/// Parsed `WWW-Authenticate` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Challenge {
    Bearer {
        realm: String,
        service: Option<String>,
        scope: Option<String>,
    },
    Basic,
}

impl Challenge {
    pub(crate) fn parse(header: &str) -> Option<Self> {
        let header = header.trim();
        let (scheme, params) = header.split_once(' ').unwrap_or((header, ""));

        if scheme.eq_ignore_ascii_case("basic") {
            return Some(Challenge::Basic);
        }
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }

        let params = parse_params(params);
        Some(Challenge::Bearer {
            realm: params.get("realm")?.clone(),
            service: params.get("service").cloned(),
            scope: params.get("scope").cloned(),
        })
    }
}

/// Split `key="value",key2="v,with,commas"` into a map
fn parse_params(input: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut rest = input.trim();

    while !rest.is_empty() {
        let Some((key, after_key)) = rest.split_once('=') else {
            break;
        };
        let key = key.trim().trim_start_matches(',').trim().to_ascii_lowercase();

        let (value, remainder) = if let Some(quoted) = after_key.strip_prefix('"') {
            match quoted.find('"') {
                Some(end) => (&quoted[..end], &quoted[end + 1..]),
                None => (quoted, ""),
            }
        } else {
            match after_key.find(',') {
                Some(end) => (&after_key[..end], &after_key[end..]),
                None => (after_key, ""),
            }
        };

        params.insert(key, value.trim().to_string());
        rest = remainder.trim_start().trim_start_matches(',').trim_start();
    }

    params
}

/// Token endpoint response; registries use either field name
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

impl TokenResponse {
    pub(crate) fn into_token(self) -> Option<String> {
        self.token.or(self.access_token).filter(|t| !t.is_empty())
    }
}
