//! Client configuration.

use retrowars_protocol::PROTOCOL_VERSION;
use retrowars_transport::{Endpoint, TransportConfig};

/// Everything needed to join a match server.
///
/// ```
/// use retrowars_session::ClientConfig;
///
/// let config = ClientConfig::new("retrowars.example.com", 443).with_breakpoint_unit(25_000);
/// assert_eq!(config.endpoint().url(), "wss://retrowars.example.com:443/ws");
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,

    /// Request path of the WebSocket upgrade.
    ///
    /// Default: [`Endpoint::DEFAULT_PATH`] (`/ws`).
    pub path: String,

    /// Sent in the registration message so the server can refuse clients
    /// it does not understand.
    ///
    /// Default: [`PROTOCOL_VERSION`].
    pub client_version: u32,

    /// Score distance between two breakpoints. Every time a player's score
    /// passes a multiple of this, the listener hears about it.
    ///
    /// Default: 40 000.
    pub breakpoint_unit: i64,

    /// Queue size, keepalive and timeouts of the underlying link.
    pub transport: TransportConfig,
}

impl ClientConfig {
    /// Default score distance between breakpoints.
    pub const DEFAULT_BREAKPOINT_UNIT: i64 = 40_000;

    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            path: Endpoint::DEFAULT_PATH.to_string(),
            client_version: PROTOCOL_VERSION,
            breakpoint_unit: Self::DEFAULT_BREAKPOINT_UNIT,
            transport: TransportConfig::default(),
        }
    }

    /// Sets the request path. A missing leading `/` is added.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn with_client_version(mut self, version: u32) -> Self {
        self.client_version = version;
        self
    }

    #[must_use]
    pub fn with_breakpoint_unit(mut self, unit: i64) -> Self {
        self.breakpoint_unit = unit;
        self
    }

    #[must_use]
    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    /// The WebSocket endpoint this config points at.
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port).with_path(self.path.clone())
    }

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// A breakpoint unit below 1 would never let the next breakpoint move
    /// past the score, so it is raised to 1.
    pub fn validated(mut self) -> Self {
        if self.breakpoint_unit < 1 {
            tracing::warn!(
                breakpoint_unit = self.breakpoint_unit,
                "breakpoint_unit must be positive, using 1"
            );
            self.breakpoint_unit = 1;
        }
        self.transport = self.transport.validated();
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("127.0.0.1", 8080)
    }
}
