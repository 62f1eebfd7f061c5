//! Reusable client configuration: transport, timeout, proxy, user agent.
//!
//! # Design
//! `Client` is a thin setter group around a shared `Transport`. It carries
//! no per-request state; `Request::new` clones it (cheap, the transport is
//! behind an `Arc`) and `Request::send` snapshots a `TransportConfig` from
//! that clone. Reconfiguring a client therefore never disturbs a request
//! that has already been dispatched.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::request::Request;
use crate::transport::{Transport, TransportConfig, UreqTransport};

/// Timeout applied when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// `User-Agent` sent unless a request overrides it.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/79.0.3945.88 Safari/537.36";

/// A configuration step applied by `Client::with_options`, in order.
#[derive(Debug, Clone)]
pub enum ClientOption {
    Timeout(Duration),
    Proxy(String),
    UserAgent(String),
}

/// Serializable client settings, e.g. loaded from a config file.
///
/// Every field is optional; missing fields keep the client defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub timeout_secs: Option<u64>,
    pub proxy: Option<String>,
    pub user_agent: Option<String>,
}

/// Shared transport plus the settings every request inherits.
#[derive(Debug, Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    timeout: Duration,
    proxy: Option<Url>,
    user_agent: String,
}

impl Default for Client {
    fn default() -> Self {
        Self {
            transport: Arc::new(UreqTransport::new()),
            timeout: DEFAULT_TIMEOUT,
            proxy: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Client {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: impl IntoIterator<Item = ClientOption>) -> Self {
        let mut client = Self::new();
        for option in options {
            client.apply(option);
        }
        client
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        let mut client = Self::new();
        if let Some(secs) = config.timeout_secs {
            client.set_timeout(Duration::from_secs(secs));
        }
        if let Some(proxy) = &config.proxy {
            client.set_proxy(proxy);
        }
        if let Some(user_agent) = &config.user_agent {
            client.set_user_agent(user_agent);
        }
        client
    }

    pub fn apply(&mut self, option: ClientOption) -> &mut Self {
        match option {
            ClientOption::Timeout(timeout) => self.set_timeout(timeout),
            ClientOption::Proxy(proxy) => self.set_proxy(&proxy),
            ClientOption::UserAgent(user_agent) => self.set_user_agent(&user_agent),
        }
    }

    /// Replace the transport. Requests created afterwards use it.
    pub fn set_transport(&mut self, transport: impl Transport + 'static) -> &mut Self {
        self.transport = Arc::new(transport);
        self
    }

    pub fn set_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = timeout;
        self
    }

    /// Route requests through `proxy`.
    ///
    /// A string that does not parse as a URL leaves the client without a
    /// proxy; the failure is logged rather than returned.
    pub fn set_proxy(&mut self, proxy: &str) -> &mut Self {
        self.proxy = match Url::parse(proxy) {
            Ok(url) => Some(url),
            Err(err) => {
                tracing::warn!(proxy, error = %err, "ignoring malformed proxy url");
                None
            }
        };
        self
    }

    pub fn set_user_agent(&mut self, user_agent: &str) -> &mut Self {
        self.user_agent = user_agent.to_string();
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn proxy(&self) -> Option<&Url> {
        self.proxy.as_ref()
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Start building a request bound to this client.
    pub fn request(&self) -> Request {
        Request::new(self)
    }

    pub(crate) fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    pub(crate) fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            timeout: self.timeout,
            proxy: self.proxy.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let client = Client::new();
        assert_eq!(client.timeout(), Duration::from_secs(30));
        assert!(client.proxy().is_none());
        assert_eq!(client.user_agent(), DEFAULT_USER_AGENT);
    }

    #[test]
    fn options_apply_in_order() {
        let client = Client::with_options([
            ClientOption::Timeout(Duration::from_secs(5)),
            ClientOption::Proxy("http://proxy.test:3128".to_string()),
            ClientOption::Timeout(Duration::from_secs(9)),
        ]);
        assert_eq!(client.timeout(), Duration::from_secs(9));
        assert_eq!(client.proxy().map(Url::as_str), Some("http://proxy.test:3128/"));
    }

    #[test]
    fn malformed_proxy_is_treated_as_unset() {
        let mut client = Client::new();
        client.set_proxy("http://proxy.test:3128");
        client.set_proxy("not a url");
        assert!(client.proxy().is_none());
    }

    #[test]
    fn setters_chain() {
        let mut client = Client::new();
        client
            .set_timeout(Duration::from_millis(250))
            .set_user_agent("httpc-test/1.0");
        assert_eq!(client.timeout(), Duration::from_millis(250));
        assert_eq!(client.user_agent(), "httpc-test/1.0");
    }

    #[test]
    fn config_from_json() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"timeout_secs":3,"user_agent":"cfg/1"}"#).unwrap();
        let client = Client::from_config(&config);
        assert_eq!(client.timeout(), Duration::from_secs(3));
        assert_eq!(client.user_agent(), "cfg/1");
        assert!(client.proxy().is_none());
    }

    #[test]
    fn empty_config_keeps_defaults() {
        let config: ClientConfig = serde_json::from_str("{}").unwrap();
        let client = Client::from_config(&config);
        assert_eq!(client.timeout(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn transport_config_is_a_snapshot() {
        let mut client = Client::new();
        let before = client.transport_config();
        client.set_timeout(Duration::from_secs(1));
        assert_eq!(before.timeout, DEFAULT_TIMEOUT);
        assert_eq!(client.transport_config().timeout, Duration::from_secs(1));
    }
}
