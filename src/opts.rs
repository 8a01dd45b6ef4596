use smart_default::SmartDefault;

use crate::constant::{DEFAULT_MAX_INFLIGHT, DEFAULT_PORT};
use crate::error::Error;
use crate::value::{Map, Value};

/// Which recovery message the client sends after observing a FAILURE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnFailure {
    #[default]
    Reset,
    AckFailure,
}

/// A configuration for a client connection
///
/// ```rs
/// let mut opts1 = Opts::default();
/// opts1.port = 7777;
///
/// let mut opts2 = Opts::try_from("bolt://bolt-user@localhost:8888")?;
/// opts2.max_inflight = 64;
/// ```
#[derive(Debug, Clone, SmartDefault)]
pub struct Opts {
    /// Enable TCP_NODELAY socket option to disable Nagle's algorithm
    #[default = true]
    pub tcp_nodelay: bool,

    /// Hostname or IP address
    pub host: Option<String>,

    /// Port number for the Bolt server
    #[default(DEFAULT_PORT)]
    pub port: u16,

    /// Client name reported in the INIT message
    #[default(concat!("ZeroBolt/", env!("CARGO_PKG_VERSION")).to_string())]
    pub client_name: String,

    /// Opaque credentials map carried by the INIT message
    #[default(vec![("scheme".to_string(), Value::String("none".to_string()))])]
    pub auth_token: Map,

    /// Recovery message sent after a server FAILURE
    pub on_failure: OnFailure,

    /// Cap on un-drained pipelined response slots
    #[default(DEFAULT_MAX_INFLIGHT)]
    pub max_inflight: usize,

    /// Upgrade the connection to TLS after connect
    pub tls: bool,
}

impl TryFrom<&str> for Opts {
    type Error = Error;

    fn try_from(url: &str) -> Result<Self, Self::Error> {
        let parsed = url::Url::parse(url)
            .map_err(|e| Error::BadConfig(format!("Failed to parse Bolt URL: {}", e)))?;

        // `bolt+s` requests a TLS-wrapped transport.
        let tls = match parsed.scheme() {
            "bolt" => false,
            "bolt+s" => true,
            other => {
                return Err(Error::BadConfig(format!(
                    "Invalid URL scheme '{}', expected 'bolt' or 'bolt+s'",
                    other
                )));
            }
        };

        let host = parsed.host_str().map(ToString::to_string);
        let port = parsed.port().unwrap_or(DEFAULT_PORT);

        // Credentials in the URL become a basic-auth token.
        let auth_token = if parsed.username().is_empty() {
            Opts::default().auth_token
        } else {
            vec![
                ("scheme".to_string(), Value::String("basic".to_string())),
                (
                    "principal".to_string(),
                    Value::String(parsed.username().to_string()),
                ),
                (
                    "credentials".to_string(),
                    Value::String(parsed.password().unwrap_or("").to_string()),
                ),
            ]
        };

        Ok(Self {
            host,
            port,
            auth_token,
            tls,
            ..Self::default()
        })
    }
}
