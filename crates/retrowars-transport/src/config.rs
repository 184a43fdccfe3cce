//! Connection target and transport tuning.

use std::fmt;
use std::time::Duration;

/// The conventional HTTPS port. Endpoints on it are reached over `wss://`.
const SECURE_PORT: u16 = 443;

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// Where the match server lives.
///
/// The scheme is derived from the port: 443 means `wss`, everything else
/// `ws`. Nothing above the transport needs to know which one was used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    /// Request path of the WebSocket upgrade, e.g. `/ws`.
    pub path: String,
}

impl Endpoint {
    /// Default request path of the match server.
    pub const DEFAULT_PATH: &'static str = "/ws";

    /// Creates an endpoint on the default `/ws` path.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            path: Self::DEFAULT_PATH.to_string(),
        }
    }

    /// Replaces the request path. A missing leading `/` is added.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.path = if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };
        self
    }

    /// Returns `true` if this endpoint is reached over TLS.
    pub fn is_secure(&self) -> bool {
        self.port == SECURE_PORT
    }

    /// `"wss"` or `"ws"`.
    pub fn scheme(&self) -> &'static str {
        if self.is_secure() { "wss" } else { "ws" }
    }

    /// The full URL passed to the WebSocket handshake.
    pub fn url(&self) -> String {
        format!("{}://{}:{}{}", self.scheme(), self.host, self.port, self.path)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

// ---------------------------------------------------------------------------
// TransportConfig
// ---------------------------------------------------------------------------

/// Tuning for a [`Link`](crate::Link).
///
/// Create one with `TransportConfig::default()` and override the fields
/// you care about.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// How many outbound messages may wait for the send loop. When the
    /// queue is full, [`Link::send`](crate::Link::send) fails with
    /// [`TransportError::QueueFull`](crate::TransportError::QueueFull).
    ///
    /// Default: 10.
    pub send_queue_capacity: usize,

    /// How often a keepalive message is queued. Proxies in front of the
    /// server drop connections idle for about a minute.
    ///
    /// Default: 30 seconds.
    pub keepalive_interval: Duration,

    /// Upper bound on TCP connect plus WebSocket handshake.
    ///
    /// Default: 10 seconds.
    pub connect_timeout: Duration,

    /// After a local disconnect, how long to wait for the server to
    /// acknowledge the close before the receive loop is aborted.
    ///
    /// Default: 1 second.
    pub close_grace: Duration,
}

impl TransportConfig {
    /// Smallest interval accepted for the timer fields.
    const MIN_INTERVAL: Duration = Duration::from_millis(1);

    /// Sets the outbound queue capacity.
    #[must_use]
    pub fn with_send_queue_capacity(mut self, capacity: usize) -> Self {
        self.send_queue_capacity = capacity;
        self
    }

    /// Sets the keepalive interval.
    #[must_use]
    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the close grace period.
    #[must_use]
    pub fn with_close_grace(mut self, grace: Duration) -> Self {
        self.close_grace = grace;
        self
    }

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Called by [`Link::connect`](crate::Link::connect). Tokio panics on a
    /// zero-capacity channel and a zero-period interval, so:
    /// - `send_queue_capacity` is at least 1;
    /// - `keepalive_interval` and `connect_timeout` are at least 1 ms.
    pub fn validated(mut self) -> Self {
        if self.send_queue_capacity == 0 {
            tracing::warn!("send_queue_capacity of 0 is not allowed, using 1");
            self.send_queue_capacity = 1;
        }
        self.keepalive_interval = self.keepalive_interval.max(Self::MIN_INTERVAL);
        self.connect_timeout = self.connect_timeout.max(Self::MIN_INTERVAL);
        self
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            send_queue_capacity: 10,
            keepalive_interval: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            close_grace: Duration::from_secs(1),
        }
    }
}
