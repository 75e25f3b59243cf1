#[macro_use]
extern crate tracing;

mod app_config;
mod args;
mod target;

use app_config::AppConfig;
pub use app_config::get_config_dir;
pub use args::Args;
use eyre::{
    ensure,
    Result,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    collections::HashMap,
    path::{
        Path,
        PathBuf,
    },
    time::Duration,
};
pub use target::{
    ClientDefaults,
    ConnectionTarget,
    Credentials,
    Password,
    DEFAULT_HOST,
};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(flatten, skip_serializing)]
    app_config: AppConfig,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing)]
    pub pass: Option<Password>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub my_cnf: Option<PathBuf>,
    pub update_every: u64,
    pub priority: u32,
}

const DEFAULT_CONFIG: &str = include_str!("default-config.yaml");

impl Default for Config {
    fn default() -> Self {
        serde_yml::from_str(DEFAULT_CONFIG).expect("Failed to parse default config")
    }
}

impl config::Source for Config {
    fn clone_into_box(&self) -> Box<dyn config::Source + Send + Sync> {
        Box::new((*self).clone())
    }

    fn collect(&self) -> Result<config::Map<String, config::Value>, config::ConfigError> {
        let mut cache = HashMap::<String, config::Value>::new();
        cache.insert("name".to_string(), self.name.clone().into());
        if let Some(socket) = &self.socket {
            cache.insert("socket".to_string(), socket.display().to_string().into());
        }
        if let Some(host) = &self.host {
            cache.insert("host".to_string(), host.clone().into());
        }
        cache.insert("port".to_string(), (self.port as u64).into());
        if let Some(user) = &self.user {
            cache.insert("user".to_string(), user.clone().into());
        }
        if let Some(pass) = &self.pass {
            cache.insert("pass".to_string(), pass.expose().to_string().into());
        }
        if let Some(my_cnf) = &self.my_cnf {
            cache.insert("my_cnf".to_string(), my_cnf.display().to_string().into());
        }
        cache.insert("update_every".to_string(), self.update_every.into());
        cache.insert("priority".to_string(), (self.priority as u64).into());
        Ok(cache)
    }
}

impl Config {
    /// Layers, lowest precedence first: embedded defaults, config file,
    /// `MANTICORE_COLLECTOR_*` environment, command-line arguments.
    pub fn new(args: &Args) -> Result<Self, config::ConfigError> {
        let config_dir = get_config_dir();
        let mut builder = config::Config::builder()
            .set_default("config_dir", config_dir.display().to_string())?
            .add_source(Config::default());

        builder = match &args.config {
            Some(path) => builder.add_source(config::File::from(path.clone()).required(true)),
            None => builder.add_source(
                config::File::from(config_dir.join("config.yaml"))
                    .format(config::FileFormat::Yaml)
                    .required(false),
            ),
        };

        builder = builder
            .add_source(config::Environment::with_prefix(app_config::ENV_PREFIX).try_parsing(true))
            .add_source(args.clone());

        let cfg: Self = builder.build()?.try_deserialize()?;

        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.update_every > 0, "update_every must be at least one second");
        ensure!(self.port > 0, "port must not be zero");
        ensure!(!self.name.trim().is_empty(), "name must not be empty");
        Ok(())
    }

    /// Socket, then host and port, then the option file. Without any of
    /// them the client library default of `localhost:<port>` applies.
    pub fn target(&self) -> ConnectionTarget {
        if let Some(socket) = &self.socket {
            ConnectionTarget::Socket(socket.clone())
        } else if let Some(host) = &self.host {
            ConnectionTarget::Tcp {
                host: host.clone(),
                port: self.port,
            }
        } else if let Some(my_cnf) = &self.my_cnf {
            ConnectionTarget::DefaultsFile(my_cnf.clone())
        } else {
            ConnectionTarget::Tcp {
                host: DEFAULT_HOST.to_string(),
                port: self.port,
            }
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            user: self.user.clone(),
            password: self.pass.clone(),
        }
    }

    pub fn update_every(&self) -> Duration {
        Duration::from_secs(self.update_every)
    }

    pub fn config_dir(&self) -> &Path {
        &self.app_config.config_dir
    }
}
