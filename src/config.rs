use crate::error::{Error, Result};
use crate::services::credential_service::HashScheme;
use dotenvy::dotenv;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const DATA_DIR_ENV: &str = "IDEAL_DATA_DIR";
pub const ADMIN_EMAIL_ENV: &str = "IDEAL_ADMIN_EMAIL";
pub const ADMIN_PASSWORD_ENV: &str = "IDEAL_ADMIN_PASSWORD";
pub const HASH_SCHEME_ENV: &str = "IDEAL_HASH_SCHEME";
pub const MAX_CONNECTIONS_ENV: &str = "IDEAL_DB_MAX_CONNECTIONS";
pub const BUSY_TIMEOUT_ENV: &str = "IDEAL_DB_BUSY_TIMEOUT_SECS";

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_ADMIN_EMAIL: &str = "admin@idealempregos.test";
const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub admin_email: String,
    pub admin_password: String,
    pub hash_scheme: HashScheme,
    pub max_connections: u32,
    pub busy_timeout_secs: u64,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let data_dir = match env::var(DATA_DIR_ENV) {
            Ok(raw) if !raw.trim().is_empty() => expand_home(raw.trim()),
            _ => PathBuf::from(DEFAULT_DATA_DIR),
        };

        Ok(Self {
            data_dir,
            admin_email: get_env_or(ADMIN_EMAIL_ENV, DEFAULT_ADMIN_EMAIL),
            admin_password: get_env_or(ADMIN_PASSWORD_ENV, DEFAULT_ADMIN_PASSWORD),
            hash_scheme: get_env_parse_or(HASH_SCHEME_ENV, HashScheme::Argon2)?,
            max_connections: get_env_parse_or(MAX_CONNECTIONS_ENV, 8)?,
            busy_timeout_secs: get_env_parse_or(BUSY_TIMEOUT_ENV, 5)?,
        })
    }

    /// Defaults rooted at `data_dir`, ignoring the environment.
    pub fn for_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            admin_email: DEFAULT_ADMIN_EMAIL.to_string(),
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
            hash_scheme: HashScheme::Argon2,
            max_connections: 8,
            busy_timeout_secs: 5,
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("site.db")
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    /// The administrator identity to provision, if both halves are configured.
    pub fn admin_credentials(&self) -> Option<(&str, &str)> {
        let email = self.admin_email.trim();
        let password = self.admin_password.trim();
        if email.is_empty() || password.is_empty() {
            None
        } else {
            Some((email, password))
        }
    }
}

fn get_env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        _ => Ok(default),
    }
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Ok(home) = env::var("HOME") {
            return Path::new(&home).join(rest);
        }
    }
    PathBuf::from(raw)
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_admin_half_disables_provisioning() {
        let mut config = Config::for_data_dir("/tmp/x");
        assert_eq!(
            config.admin_credentials(),
            Some(("admin@idealempregos.test", "admin123"))
        );

        config.admin_password = "   ".to_string();
        assert_eq!(config.admin_credentials(), None);

        config.admin_password = "secret".to_string();
        config.admin_email = String::new();
        assert_eq!(config.admin_credentials(), None);
    }

    #[test]
    fn layout_is_rooted_at_data_dir() {
        let config = Config::for_data_dir("/srv/ideal");
        assert_eq!(config.database_path(), PathBuf::from("/srv/ideal/site.db"));
        assert_eq!(config.uploads_dir(), PathBuf::from("/srv/ideal/uploads"));
    }
}
