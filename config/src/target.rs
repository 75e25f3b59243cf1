use eyre::{
    Context as _,
    Result,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    path::{
        Path,
        PathBuf,
    },
};

pub const DEFAULT_HOST: &str = "localhost";

/// Where the daemon's MySQL listener is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionTarget {
    Socket(PathBuf),
    Tcp { host: String, port: u16 },
    /// Connection settings come from the `[client]` section of a MySQL option file.
    DefaultsFile(PathBuf),
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionTarget::Socket(path) => write!(f, "unix:{}", path.display()),
            ConnectionTarget::Tcp { host, port } => write!(f, "{host}:{port}"),
            ConnectionTarget::DefaultsFile(path) => write!(f, "defaults-file:{}", path.display()),
        }
    }
}

/// A password that never shows up in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Password(String);

impl Password {
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub user: Option<String>,
    pub password: Option<Password>,
}

impl Credentials {
    /// Fills unset fields from `fallback`.
    pub fn or(self, fallback: Credentials) -> Credentials {
        Credentials {
            user: self.user.or(fallback.user),
            password: self.password.or(fallback.password),
        }
    }
}

/// The `[client]` section of a MySQL option file (`my.cnf`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClientDefaults {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub socket: Option<PathBuf>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<Password>,
}

impl ClientDefaults {
    #[instrument(level = "debug")]
    pub fn load(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.to_path_buf()).format(config::FileFormat::Ini))
            .build()
            .wrap_err_with(|| format!("Failed to read option file {}", path.display()))?;

        match settings.get::<ClientDefaults>("client") {
            Ok(defaults) => Ok(defaults),
            Err(config::ConfigError::NotFound(_)) => {
                debug!(path = %path.display(), "option file has no [client] section");
                Ok(ClientDefaults::default())
            }
            Err(err) => {
                Err(err).wrap_err_with(|| format!("Invalid [client] section in {}", path.display()))
            }
        }
    }

    /// Socket wins over host/port, mirroring the client library.
    pub fn target(&self, default_port: u16) -> ConnectionTarget {
        match (&self.socket, &self.host) {
            (Some(socket), _) => ConnectionTarget::Socket(socket.clone()),
            (None, host) => ConnectionTarget::Tcp {
                host: host.clone().unwrap_or_else(|| DEFAULT_HOST.to_string()),
                port: self.port.unwrap_or(default_port),
            },
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            user: self.user.clone(),
            password: self.password.clone(),
        }
    }
}
