use crate::error::ConfigError;
use std::{env, net::IpAddr, net::SocketAddr, str::FromStr};

/// Limits and lifetimes used by the signup flow.
#[derive(Debug, Clone)]
pub struct SignupSettings {
    pub max_attempts: u32,
    pub attempt_window: chrono::Duration,
    pub token_lifetime: chrono::Duration,
}

impl Default for SignupSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_window: chrono::Duration::hours(1),
            token_lifetime: chrono::Duration::hours(24),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: IpAddr,
    pub port: u16,
    /// Absolute origin used to build verification links.
    pub base_url: String,
    pub signup: SignupSettings,
    /// `None` disables the in-process cleanup schedule.
    pub cleanup_interval: Option<std::time::Duration>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;
        let host = parse_env("HOST", IpAddr::from([127, 0, 0, 1]))?;
        let port = parse_env("PORT", 8080u16)?;
        let base_url = env::var("BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}", port))
            .trim_end_matches('/')
            .to_string();

        let defaults = SignupSettings::default();
        let signup = SignupSettings {
            max_attempts: parse_env("SIGNUP_MAX_ATTEMPTS", defaults.max_attempts)?,
            attempt_window: chrono::Duration::seconds(parse_env(
                "SIGNUP_ATTEMPT_WINDOW_SECS",
                defaults.attempt_window.num_seconds(),
            )?),
            token_lifetime: chrono::Duration::hours(parse_env(
                "VERIFICATION_TOKEN_TTL_HOURS",
                defaults.token_lifetime.num_hours(),
            )?),
        };

        let cleanup_interval = match env::var("TOKEN_CLEANUP_INTERVAL_SECS") {
            Ok(raw) if !raw.trim().is_empty() => {
                let secs = raw.trim().parse::<u64>().map_err(|_| ConfigError::Invalid {
                    key: "TOKEN_CLEANUP_INTERVAL_SECS",
                    value: raw.clone(),
                })?;
                (secs > 0).then(|| std::time::Duration::from_secs(secs))
            }
            _ => None,
        };

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            signup,
            cleanup_interval,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }
}

fn parse_env<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        _ => Ok(default),
    }
}
