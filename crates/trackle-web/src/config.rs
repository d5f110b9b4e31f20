use std::net::SocketAddr;
use std::path::PathBuf;

use serde::Deserialize;
use trackle_core::AccessConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// `"production"` turns on HSTS and secure cookies.
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub tls: TlsConfig,
    /// `[password]`, `[hashing]`, `[token]` and `[rate_limit]` sections.
    #[serde(flatten)]
    pub access: AccessConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub jwt_secret: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CorsConfig {
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TlsConfig {
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

impl TlsConfig {
    pub fn enabled(&self) -> bool {
        self.cert_path.is_some() && self.key_path.is_some()
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_environment() -> String {
    "development".to_string()
}

const WEAK_SECRETS: &[&str] = &[
    "change-me-to-a-random-secret",
    "secret",
    "password",
    "jwt-secret",
];

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            environment: default_environment(),
            auth: AuthConfig::default(),
            cors: CorsConfig::default(),
            tls: TlsConfig::default(),
            access: AccessConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Cookies carry `Secure` whenever the browser can only reach us over TLS.
    pub fn secure_cookies(&self) -> bool {
        self.is_production() || self.tls.enabled()
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn load() -> anyhow::Result<Self> {
        let config_path = std::env::var("TRACKLE_WEB_CONFIG")
            .map(PathBuf::from)
            .ok();

        let mut config = if let Some(path) = config_path {
            let contents = std::fs::read_to_string(&path)?;
            Self::from_toml(&contents)?
        } else {
            ServerConfig::default()
        };

        if let Ok(secret) = std::env::var("TRACKLE_JWT_SECRET") {
            config.auth.jwt_secret = secret;
        }
        if let Ok(addr) = std::env::var("TRACKLE_BIND_ADDR") {
            config.bind_addr = addr.parse()?;
        }
        if let Ok(env) = std::env::var("TRACKLE_ENVIRONMENT") {
            config.environment = env;
        }
        if let Ok(origins) = std::env::var("TRACKLE_CORS_ALLOWED_ORIGINS") {
            config.cors.allowed_origins = split_origins(&origins);
        }
        if let Ok(cert) = std::env::var("TRACKLE_TLS_CERT") {
            config.tls.cert_path = Some(cert);
        }
        if let Ok(key) = std::env::var("TRACKLE_TLS_KEY") {
            config.tls.key_path = Some(key);
        }

        config.finalize()
    }

    /// Fills in a signing secret if none was given and rejects settings the
    /// server must not start with.
    pub fn finalize(mut self) -> anyhow::Result<Self> {
        if self.auth.jwt_secret.is_empty() {
            self.auth.jwt_secret = format!("{}{}", uuid::Uuid::new_v4(), uuid::Uuid::new_v4());
            tracing::warn!(
                "No JWT secret configured. Generated random secret (will change on restart)."
            );
        }

        if WEAK_SECRETS.iter().any(|&w| self.auth.jwt_secret == w) {
            anyhow::bail!(
                "JWT secret matches a known weak/placeholder value. \
                 Set a strong random secret via TRACKLE_JWT_SECRET environment variable."
            );
        }
        if self.auth.jwt_secret.len() < 32 {
            tracing::warn!(
                "JWT secret is shorter than 32 characters. \
                 Consider using a stronger secret via TRACKLE_JWT_SECRET."
            );
        }

        if self.cors.allowed_origins.is_empty() {
            tracing::warn!("No CORS origins configured. Cross-origin requests will be refused.");
        }

        self.access.validate()?;
        Ok(self)
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(String::from)
        .collect()
}
