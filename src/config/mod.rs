mod auth;

use std::{
    env,
    fs::read_to_string,
    io,
    path::{Path, PathBuf},
};

use derive_getters::Getters;
use log::debug;
use serde::Deserialize;
use thiserror::Error;

pub use auth::{AuthConfig, PlainAuthConfig};

use crate::imap::SessionOptions;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("password_cmd {command:?} failed: {reason}")]
    PasswordCommand { command: String, reason: String },
    #[error("neither XDG_CONFIG_HOME nor HOME is set")]
    NoConfigHome,
}

fn default_tls() -> bool {
    true
}

#[derive(Deserialize, Getters, Debug)]
pub struct Config {
    host: String,
    #[getter(skip)]
    port: Option<u16>,
    #[serde(default = "default_tls")]
    #[getter(skip)]
    tls: bool,
    #[serde(default)]
    #[getter(skip)]
    gmail: bool,
    #[serde(default)]
    #[getter(skip)]
    zimbra: bool,
    auth: AuthConfig,
}

impl Config {
    /// Reads `file`, or `config.toml` in the default config directory.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or parsed.
    pub fn load_from_file(file: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match file {
            Some(file) => file.to_path_buf(),
            None => default_location()?,
        };
        debug!("loading config from {}", path.display());
        let contents = read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;

        toml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn tls(&self) -> bool {
        self.tls
    }

    pub fn gmail(&self) -> bool {
        self.gmail
    }

    pub fn zimbra(&self) -> bool {
        self.zimbra
    }

    /// Runs the password command and combines everything into session options.
    ///
    /// # Errors
    ///
    /// Fails if the password command cannot be run or prints nothing.
    pub fn session_options(&self) -> Result<SessionOptions, ConfigError> {
        let AuthConfig::Plain(plain) = &self.auth;
        Ok(SessionOptions::new(&self.host, plain.user(), plain.password()?)
            .port(self.port)
            .tls(self.tls)
            .gmail(self.gmail)
            .zimbra(self.zimbra))
    }
}

fn default_location() -> Result<PathBuf, ConfigError> {
    let mut config_dir = if let Some(config_home) = env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(config_home)
    } else {
        let mut config_home = PathBuf::from(env::var_os("HOME").ok_or(ConfigError::NoConfigHome)?);
        config_home.push(".config");
        config_home
    };
    config_dir.push(env!("CARGO_PKG_NAME"));
    config_dir.push("config.toml");

    Ok(config_dir)
}
