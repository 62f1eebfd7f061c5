//! Fluent, single-use HTTP request with deferred execution.
//!
//! # Design
//! A `Request` accumulates configuration through consuming setters, then
//! runs a two-phase protocol:
//!
//! 1. `send` freezes the configuration into an `http::Request`, snapshots
//!    the client's transport settings and hands the exchange to one
//!    background thread. It never blocks and never fails; problems found
//!    while building the wire request are parked in the request.
//! 2. `end` waits on a one-shot completion signal, then decodes the body
//!    (gunzipping when asked to) and returns the response head with the
//!    bytes, or the first error recorded anywhere along the way.
//!
//! The completion signal is a `tokio::sync::oneshot` channel: capacity one,
//! consumed exactly once by `end` or `end_async`. The outcome travels
//! through the channel itself, so the background write happens-before the
//! read in `end`.
//!
//! Body precedence is raw (`set_body` / `set_data`) over JSON over form.
//! The `Content-Type` inferred for JSON and form bodies is applied before
//! the caller's headers, so an explicit `Content-Type` always wins.

use std::collections::BTreeMap;
use std::io::Read;
use std::thread;

use http::header::{HeaderName, HeaderValue, CONTENT_TYPE, COOKIE, USER_AGENT};
use http::{HeaderMap, Method, Uri};
use serde::Serialize;
use tokio::sync::oneshot;
use url::{form_urlencoded, Url};

use crate::client::Client;
use crate::error::Error;
use crate::http::{decode_body, BodyReader, RequestBody, Response};
use crate::types::{join_cookies, Cookie};

const JSON_CONTENT_TYPE: &str = "application/json";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

type Outcome = Result<http::Response<BodyReader>, Error>;

enum State {
    Idle,
    /// Building the wire request failed; nothing was dispatched.
    Failed(Error),
    InFlight(oneshot::Receiver<Outcome>),
}

/// The body alternative chosen at `send` time.
enum Payload {
    Raw(RequestBody),
    Json(Vec<u8>),
    Form(String),
    None,
}

impl Payload {
    fn into_body(self) -> (RequestBody, Option<&'static str>) {
        match self {
            Payload::Raw(body) => (body, None),
            Payload::Json(bytes) => (RequestBody::Bytes(bytes), Some(JSON_CONTENT_TYPE)),
            Payload::Form(encoded) => (RequestBody::Bytes(encoded.into_bytes()), Some(FORM_CONTENT_TYPE)),
            Payload::None => (RequestBody::Empty, None),
        }
    }
}

/// One HTTP request, configured by chaining and executed once.
///
/// ```no_run
/// use httpc::Client;
///
/// let client = Client::new();
/// let (response, body) = client
///     .request()
///     .set_method("get")
///     .set_url("http://example.test/x")
///     .set_query("a", "1")
///     .send()
///     .end()?;
/// assert!(response.status.is_success());
/// # let _ = body;
/// # Ok::<(), httpc::Error>(())
/// ```
pub struct Request {
    client: Client,
    method: String,
    url: String,
    headers: Vec<(String, String)>,
    cookies: Vec<Cookie>,
    query: BTreeMap<String, String>,
    raw: Option<RequestBody>,
    /// A failed `set_json_value` is kept here, so any later JSON setter or
    /// `reset` replaces it like any other value.
    json: Option<Result<Vec<u8>, serde_json::Error>>,
    form: BTreeMap<String, String>,
    debug: bool,
    state: State,
}

impl Request {
    /// A `GET` request carrying the client's `User-Agent`.
    pub fn new(client: &Client) -> Self {
        Self {
            client: client.clone(),
            method: Method::GET.to_string(),
            url: String::new(),
            headers: vec![(USER_AGENT.to_string(), client.user_agent().to_string())],
            cookies: Vec::new(),
            query: BTreeMap::new(),
            raw: None,
            json: None,
            form: BTreeMap::new(),
            debug: false,
            state: State::Idle,
        }
    }

    /// Set the method; it is upper-cased.
    pub fn set_method(mut self, method: &str) -> Self {
        self.method = method.to_ascii_uppercase();
        self
    }

    pub fn set_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set one header, replacing any value stored under the same name
    /// (compared case-insensitively).
    pub fn set_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&key)) {
            Some(entry) => *entry = (key, value),
            None => self.headers.push((key, value)),
        }
        self
    }

    /// Replace the whole header mapping, including the default `User-Agent`.
    pub fn set_headers<K, V>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.headers.clear();
        headers
            .into_iter()
            .fold(self, |req, (key, value)| req.set_header(key, value))
    }

    pub fn set_cookies(mut self, cookies: Vec<Cookie>) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn add_cookie(mut self, cookie: Cookie) -> Self {
        self.cookies.push(cookie);
        self
    }

    /// Set a query parameter. The final query string is built from these
    /// values alone; any query already in the URL is dropped.
    pub fn set_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Log the exchange at `info` instead of `debug`.
    pub fn set_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Stream `body` as-is. No `Content-Type` is inferred.
    pub fn set_body(mut self, body: impl Read + Send + 'static) -> Self {
        self.raw = Some(RequestBody::Reader(Box::new(body)));
        self
    }

    /// Send `data` as-is. No `Content-Type` is inferred.
    pub fn set_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.raw = Some(RequestBody::Bytes(data.into()));
        self
    }

    /// Send pre-encoded JSON, with `Content-Type: application/json`.
    pub fn set_json(mut self, json: impl Into<Vec<u8>>) -> Self {
        self.json = Some(Ok(json.into()));
        self
    }

    /// Serialize `value` as the JSON body. A serialization failure is
    /// reported by `end` when no raw body takes precedence over the JSON.
    pub fn set_json_value<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        self.json = Some(serde_json::to_vec(value));
        self
    }

    /// Add a form field, with `Content-Type: application/x-www-form-urlencoded`.
    pub fn set_form(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.insert(key.into(), value.into());
        self
    }

    /// Drop every body alternative, keeping method, URL, headers, cookies
    /// and query.
    pub fn reset(mut self) -> Self {
        self.raw = None;
        self.json = None;
        self.form.clear();
        self
    }

    /// Build the wire request and start the exchange in the background.
    ///
    /// Returns immediately. Errors are reported by `end`. Sending a request
    /// a second time has no effect.
    pub fn send(mut self) -> Self {
        if !matches!(self.state, State::Idle) {
            tracing::warn!(url = %self.url, "request already sent, ignoring");
            return self;
        }
        self.state = match self.build() {
            Ok(request) => self.dispatch(request),
            Err(err) => {
                tracing::debug!(url = %self.url, error = %err, "request not dispatched");
                State::Failed(err)
            }
        };
        self
    }

    /// Block until the exchange finishes and return the response head with
    /// the decoded body.
    ///
    /// # Panics
    /// Panics if called from within an async runtime; use `end_async` there.
    pub fn end(self) -> Result<(Response, Vec<u8>), Error> {
        let outcome = match self.state {
            State::Idle => return Err(Error::NotSent),
            State::Failed(err) => return Err(err),
            State::InFlight(rx) => rx.blocking_recv().map_err(|_| Error::Canceled)?,
        };
        materialize(outcome)
    }

    /// Async counterpart of `end`. Body decoding runs on the blocking pool.
    pub async fn end_async(self) -> Result<(Response, Vec<u8>), Error> {
        let outcome = match self.state {
            State::Idle => return Err(Error::NotSent),
            State::Failed(err) => return Err(err),
            State::InFlight(rx) => rx.await.map_err(|_| Error::Canceled)?,
        };
        tokio::task::spawn_blocking(move || materialize(outcome))
            .await
            .map_err(|_| Error::Canceled)?
    }

    fn payload(&mut self) -> Result<Payload, Error> {
        if let Some(raw) = self.raw.take() {
            return Ok(Payload::Raw(raw));
        }
        if let Some(json) = self.json.take().transpose()?.filter(|json| !json.is_empty()) {
            return Ok(Payload::Json(json));
        }
        if !self.form.is_empty() {
            return Ok(Payload::Form(encode_pairs(&std::mem::take(&mut self.form))));
        }
        Ok(Payload::None)
    }

    fn build(&mut self) -> Result<http::Request<RequestBody>, Error> {
        let mut url = Url::parse(&self.url).map_err(|source| Error::InvalidUrl {
            url: self.url.clone(),
            source,
        })?;
        if self.query.is_empty() {
            url.set_query(None);
        } else {
            url.set_query(Some(&encode_pairs(&self.query)));
        }
        let uri: Uri = url.as_str().parse().map_err(|source| Error::InvalidUri {
            url: url.to_string(),
            source,
        })?;

        let method = Method::from_bytes(self.method.as_bytes())
            .map_err(|_| Error::InvalidMethod(self.method.clone()))?;

        let (body, content_type) = self.payload()?.into_body();

        let mut headers = HeaderMap::new();
        if let Some(content_type) = content_type {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
        for (name, value) in &self.headers {
            let invalid = || Error::InvalidHeader { name: name.clone() };
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
            let value = HeaderValue::from_str(value).map_err(|_| invalid())?;
            headers.insert(name, value);
        }
        if !self.cookies.is_empty() {
            let existing = headers.get(COOKIE).and_then(|v| v.to_str().ok());
            let joined = join_cookies(existing, &self.cookies);
            let value = HeaderValue::from_str(&joined).map_err(|_| Error::InvalidHeader {
                name: COOKIE.to_string(),
            })?;
            headers.insert(COOKIE, value);
        }

        let mut request = http::Request::new(body);
        *request.method_mut() = method;
        *request.uri_mut() = uri;
        *request.headers_mut() = headers;
        Ok(request)
    }

    fn dispatch(&self, request: http::Request<RequestBody>) -> State {
        let transport = self.client.transport();
        let config = self.client.transport_config();
        let debug = self.debug;

        if debug {
            tracing::info!(
                method = %request.method(),
                uri = %request.uri(),
                headers = ?request.headers(),
                body = ?request.body(),
                "sending request"
            );
        } else {
            tracing::debug!(method = %request.method(), uri = %request.uri(), "sending request");
        }

        let (tx, rx) = oneshot::channel();
        let spawned = thread::Builder::new()
            .name("httpc-send".to_string())
            .spawn(move || {
                let uri = request.uri().clone();
                let outcome = transport.execute(request, &config);
                match &outcome {
                    Ok(response) if debug => {
                        tracing::info!(%uri, status = %response.status(), headers = ?response.headers(), "response received");
                    }
                    Ok(response) => tracing::trace!(%uri, status = %response.status(), "response received"),
                    Err(err) => tracing::debug!(%uri, error = %err, "request failed"),
                }
                // The receiver is gone if the request was dropped without `end`.
                let _ = tx.send(outcome);
            });

        match spawned {
            Ok(_) => State::InFlight(rx),
            Err(err) => State::Failed(Error::Spawn(err)),
        }
    }
}

fn materialize(outcome: Outcome) -> Result<(Response, Vec<u8>), Error> {
    let (parts, body) = outcome?.into_parts();
    let bytes = decode_body(&parts.headers, body);
    Ok((Response::from_parts(parts), bytes))
}

/// `application/x-www-form-urlencoded`, keys in sorted order.
///
/// The escape set matches the classic query encoding: `~` stays literal and
/// `*` is percent-encoded. A literal `%` is always emitted as `%25`, so the
/// two substitutions cannot touch any other escape.
fn encode_pairs(pairs: &BTreeMap<String, String>) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
        .replace('*', "%2A")
        .replace("%7E", "~")
}
