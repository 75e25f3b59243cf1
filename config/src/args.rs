use clap::Parser;
use std::path::PathBuf;

/// Manticore Search status collector
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version = version(), about, long_about = None)]
pub struct Args {
    /// Configuration file to load instead of `config.yaml` in the config directory.
    #[clap(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Job name, appended to the chart type.
    #[clap(long)]
    pub name: Option<String>,

    /// Unix socket of the daemon's MySQL listener.
    #[clap(long, value_name = "PATH")]
    pub socket: Option<PathBuf>,

    /// Host of the daemon's MySQL listener.
    #[clap(long)]
    pub host: Option<String>,

    /// Port of the daemon's MySQL listener.
    #[clap(long)]
    pub port: Option<u16>,

    #[clap(long)]
    pub user: Option<String>,

    #[clap(long)]
    pub pass: Option<String>,

    /// MySQL option file whose `[client]` section holds the connection settings.
    #[clap(long = "my-cnf", value_name = "FILE")]
    pub my_cnf: Option<PathBuf>,

    /// Poll interval in seconds. Also bounds the connect attempt.
    #[clap(long = "update-every", value_name = "SECONDS")]
    pub update_every: Option<u64>,

    /// Priority of the first chart; later charts follow in order.
    #[clap(long)]
    pub priority: Option<u32>,

    /// Collect once and print a JSON summary instead of the plugin protocol.
    #[clap(long, action)]
    pub once: bool,

    /// Log at debug level.
    #[clap(long, short, action)]
    pub verbose: bool,
}

mod config_ext {
    use super::*;
    use config::{
        Map,
        Source,
        Value,
    };
    use std::collections::HashMap;

    impl Source for Args {
        fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
            Box::new((*self).clone())
        }

        fn collect(&self) -> Result<Map<String, Value>, config::ConfigError> {
            let mut cache = HashMap::<String, Value>::new();
            if let Some(name) = &self.name {
                cache.insert("name".to_string(), name.clone().into());
            }
            if let Some(socket) = &self.socket {
                cache.insert("socket".to_string(), socket.display().to_string().into());
            }
            if let Some(host) = &self.host {
                cache.insert("host".to_string(), host.clone().into());
            }
            if let Some(port) = self.port {
                cache.insert("port".to_string(), (port as u64).into());
            }
            if let Some(user) = &self.user {
                cache.insert("user".to_string(), user.clone().into());
            }
            if let Some(pass) = &self.pass {
                cache.insert("pass".to_string(), pass.clone().into());
            }
            if let Some(my_cnf) = &self.my_cnf {
                cache.insert("my_cnf".to_string(), my_cnf.display().to_string().into());
            }
            if let Some(update_every) = self.update_every {
                cache.insert("update_every".to_string(), update_every.into());
            }
            if let Some(priority) = self.priority {
                cache.insert("priority".to_string(), (priority as u64).into());
            }
            Ok(cache)
        }
    }
}

pub fn version() -> String {
    let version = clap::crate_version!();
    let config_dir_path = crate::get_config_dir().display().to_string();

    format!(
        "\
{version}

Config directory: {config_dir_path}"
    )
}
