use std::path::PathBuf;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "LIBRIS_ENV";
const CONFIG_DIR_ENV: &str = "LIBRIS_CONFIG_DIR";

/// Deployment environment the application is running in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "local" => Ok(Environment::Local),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(anyhow!(
                "unsupported environment '{}'; expected local/staging/production",
                other
            )),
        }
    }
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub catalog: CatalogSettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, environment overlay
    /// and `LIBRIS__*` variables.
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = std::env::var(ENV_VAR_NAME).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let config_dir = match std::env::var(CONFIG_DIR_ENV) {
            Ok(dir) => PathBuf::from(dir),
            // Default to repo root `config` directory.
            Err(_) => std::env::current_dir()
                .with_context(|| "unable to resolve current directory")?
                .join("config"),
        };

        Self::load_from(&config_dir, &environment)
    }

    /// Load configuration from an explicit directory and environment name.
    pub fn load_from(config_dir: &std::path::Path, environment: &str) -> anyhow::Result<Self> {
        let parsed_environment: Environment = environment.parse()?;

        let base_path = config_dir.join("base.toml");
        let environment_path = config_dir.join(format!("{}.toml", environment));

        let builder = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(
                config::Environment::with_prefix("LIBRIS")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        let cfg = builder
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        settings.environment = parsed_environment;

        Ok(settings)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "ServerSettings::default_host")]
    pub host: String,
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
    #[serde(default = "ServerSettings::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Sessions unused for this long are forgotten.
    #[serde(default = "ServerSettings::default_session_idle_secs")]
    pub session_idle_secs: u64,
    /// Upper bound on stored sessions; the least recently seen one is evicted.
    #[serde(default = "ServerSettings::default_max_sessions")]
    pub max_sessions: usize,
}

impl ServerSettings {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8080
    }

    fn default_request_timeout_ms() -> u64 {
        15000
    }

    fn default_session_idle_secs() -> u64 {
        14 * 24 * 60 * 60
    }

    fn default_max_sessions() -> usize {
        10_000
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            request_timeout_ms: Self::default_request_timeout_ms(),
            session_idle_secs: Self::default_session_idle_secs(),
            max_sessions: Self::default_max_sessions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "TelemetrySettings::default_filter")]
    pub filter: String,
}

impl TelemetrySettings {
    fn default_filter() -> String {
        "info,tower_http=info".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            filter: Self::default_filter(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    /// Where anonymous callers are sent when an operation needs a login.
    #[serde(default = "AuthSettings::default_login_url")]
    pub login_url: String,
    #[serde(default)]
    pub users: Vec<UserSeed>,
}

impl AuthSettings {
    fn default_login_url() -> String {
        "/api/accounts/login".to_string()
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            login_url: Self::default_login_url(),
            users: Vec::new(),
        }
    }
}

/// A configured account: bearer token plus granted permission codenames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSeed {
    pub username: String,
    #[serde(skip_serializing)]
    pub token: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSettings {
    #[serde(default)]
    pub seed_demo_data: bool,
    /// Default substring for the home page genre counter.
    #[serde(default = "CatalogSettings::default_genre_keyword")]
    pub genre_keyword: String,
    /// Default substring for the home page title counter.
    #[serde(default = "CatalogSettings::default_title_keyword")]
    pub title_keyword: String,
}

impl CatalogSettings {
    fn default_genre_keyword() -> String {
        "p".to_string()
    }

    fn default_title_keyword() -> String {
        "o".to_string()
    }
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            seed_demo_data: false,
            genre_keyword: Self::default_genre_keyword(),
            title_keyword: Self::default_title_keyword(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_environment_is_local() {
        let settings = Settings::default();
        assert_eq!(settings.environment, Environment::Local);
    }

    #[test]
    fn default_catalog_keywords_match_home_page() {
        let settings = Settings::default();
        assert_eq!(settings.catalog.genre_keyword, "p");
        assert_eq!(settings.catalog.title_keyword, "o");
        assert!(!settings.catalog.seed_demo_data);
    }

    #[test]
    fn default_login_url_points_at_accounts_module() {
        let settings = Settings::default();
        assert_eq!(settings.auth.login_url, "/api/accounts/login");
        assert!(settings.auth.users.is_empty());
    }

    #[test]
    fn unknown_environment_is_rejected() {
        let err = "qa".parse::<Environment>().unwrap_err();
        assert!(err.to_string().contains("unsupported environment 'qa'"));
    }

    #[test]
    fn missing_config_dir_falls_back_to_defaults() {
        let dir = std::env::temp_dir().join("libris-settings-missing");
        let settings = Settings::load_from(&dir, "staging").unwrap();
        assert_eq!(settings.environment, Environment::Staging);
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.session_idle_secs, 1_209_600);
        assert_eq!(settings.server.max_sessions, 10_000);
    }

    #[test]
    fn user_tokens_are_not_serialized() {
        let seed = UserSeed {
            username: "librarian".to_string(),
            token: "secret".to_string(),
            permissions: vec!["catalog.can_mark_returned".to_string()],
        };
        let value = serde_json::to_value(&seed).unwrap();
        assert!(value.get("token").is_none());
        assert_eq!(value["username"], "librarian");
    }
}
