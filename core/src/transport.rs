//! The network boundary: one blocking `execute` call per request.
//!
//! # Design
//! `Transport` is the only piece of I/O the request builder depends on.
//! Asynchrony is layered on top by `Request::send`, so implementations
//! simply block until the exchange is done. The default `UreqTransport`
//! wraps a `ureq::Agent`, whose connection pool is shared by every request
//! issued through the same `Client`.

use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use ureq::{Agent, Proxy};
use url::Url;

use crate::error::Error;
use crate::http::{BodyReader, RequestBody};

/// Timeout and proxy in effect for one dispatched request.
///
/// Snapshotted from the `Client` at `Send` time, so later changes to the
/// client never reach a request that is already in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Whole-exchange timeout. Zero disables it.
    pub timeout: Duration,
    pub proxy: Option<Url>,
}

/// Performs one HTTP exchange.
pub trait Transport: Send + Sync + fmt::Debug {
    fn execute(
        &self,
        request: http::Request<RequestBody>,
        config: &TransportConfig,
    ) -> Result<http::Response<BodyReader>, Error>;
}

/// `Transport` backed by a pooled `ureq::Agent`.
///
/// The timeout is applied per request. ureq fixes the proxy per agent, so
/// the agent (and its pool) is rebuilt only when a request arrives with a
/// different proxy than the cached one.
#[derive(Default)]
pub struct UreqTransport {
    cached: Mutex<Option<(Option<Url>, Agent)>>,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn agent(&self, proxy: Option<&Url>) -> Agent {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((current, agent)) = cached.as_ref() {
            if current.as_ref() == proxy {
                return agent.clone();
            }
        }
        let agent = build_agent(proxy);
        *cached = Some((proxy.cloned(), agent.clone()));
        agent
    }
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport").finish_non_exhaustive()
    }
}

fn build_agent(proxy_url: Option<&Url>) -> Agent {
    let proxy = proxy_url.and_then(|url| match Proxy::new(url.as_str()) {
        Ok(proxy) => Some(proxy),
        Err(err) => {
            tracing::warn!(proxy = %url, error = %err, "unsupported proxy, sending directly");
            None
        }
    });

    tracing::debug!(proxy = ?proxy_url.map(Url::as_str), "building agent");

    Agent::config_builder()
        .http_status_as_error(false)
        .proxy(proxy)
        .build()
        .new_agent()
}

fn run<B: ureq::AsSendBody>(
    agent: &Agent,
    request: http::Request<B>,
    timeout: Option<Duration>,
) -> Result<http::Response<BodyReader>, Error> {
    let request = agent
        .configure_request(request)
        .http_status_as_error(false)
        .timeout_global(timeout)
        .build();
    let response = agent.run(request).map_err(Error::transport)?;
    let (parts, body) = response.into_parts();
    let reader: BodyReader = Box::new(body.into_reader());
    Ok(http::Response::from_parts(parts, reader))
}

impl Transport for UreqTransport {
    fn execute(
        &self,
        request: http::Request<RequestBody>,
        config: &TransportConfig,
    ) -> Result<http::Response<BodyReader>, Error> {
        let agent = self.agent(config.proxy.as_ref());
        let timeout = (!config.timeout.is_zero()).then_some(config.timeout);
        let (parts, body) = request.into_parts();
        match body {
            RequestBody::Empty => run(&agent, http::Request::from_parts(parts, ()), timeout),
            RequestBody::Bytes(bytes) => {
                run(&agent, http::Request::from_parts(parts, bytes), timeout)
            }
            RequestBody::Reader(reader) => run(
                &agent,
                http::Request::from_parts(parts, ureq::SendBody::from_owned_reader(reader)),
                timeout,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn cached_proxy(transport: &UreqTransport) -> Option<Option<Url>> {
        let cached = transport.cached.lock().unwrap();
        cached.as_ref().map(|(proxy, _)| proxy.clone())
    }

    #[test]
    fn agent_is_cached_without_proxy() {
        let transport = UreqTransport::new();
        transport.agent(None);
        assert_eq!(cached_proxy(&transport), Some(None));
    }

    #[test]
    fn agent_is_rebuilt_when_proxy_changes() {
        let transport = UreqTransport::new();
        transport.agent(None);
        let proxy = url("http://127.0.0.1:8080");
        transport.agent(Some(&proxy));
        assert_eq!(cached_proxy(&transport), Some(Some(proxy)));
    }

    #[test]
    fn unsupported_proxy_scheme_does_not_panic() {
        let transport = UreqTransport::new();
        transport.agent(Some(&url("ftp://proxy.test:21")));
    }
}
