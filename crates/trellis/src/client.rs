//! The HTTP client that generated `<Service>HttpClient`s are built on.
//!
//! [`Client`] is a thin wrapper over [`reqwest`] holding the base URL and
//! connection defaults; generated clients call [`Client::invoke`] with the
//! verb, the substituted path, and the operation name of the RPC. Error
//! replies carrying the canonical `{"code", "message"}` body are decoded
//! into [`Error::Status`].

use std::time::Duration;

use http::{HeaderMap, Method, StatusCode};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

use crate::status::ErrorBody;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_USER_AGENT: &str = concat!("trellis/", env!("CARGO_PKG_VERSION"));

/// Characters escaped in values substituted into a path template.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Errors produced by generated client calls.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request could not be sent or its reply body could not be read.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server replied with a non-success status.
    #[error("{operation} failed with HTTP {status}: {message}")]
    Status {
        /// The operation name of the failed call.
        operation: &'static str,
        /// The HTTP status of the reply.
        status: StatusCode,
        /// The error code decoded from the reply body, when it carried one.
        code: Option<String>,
        /// The error message.
        message: String,
    },

    /// The reply body could not be decoded into the expected message.
    #[error("failed to decode reply: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Builds a [`Client`] with non-default connection settings.
#[derive(Debug)]
pub struct Builder {
    base_url: String,
    timeout: Duration,
    user_agent: String,
    headers: HeaderMap,
}

impl Builder {
    fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: HeaderMap::new(),
        }
    }

    /// Total per-request timeout. Defaults to 30 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The `User-Agent` header sent with every request.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Headers attached to every request.
    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<Client, Error> {
        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent)
            .default_headers(self.headers)
            .build()?;

        Ok(Client {
            http,
            base_url: self.base_url.trim_end_matches('/').to_owned(),
        })
    }
}

/// The transport shared by every generated client for one endpoint.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
}

impl Client {
    /// A client for `base_url` with default settings.
    pub fn new(base_url: impl Into<String>) -> Result<Self, Error> {
        Self::builder(base_url).build()
    }

    /// A [`Builder`] for `base_url`.
    pub fn builder(base_url: impl Into<String>) -> Builder {
        Builder::new(base_url)
    }

    #[doc(hidden)]
    pub async fn invoke<B, R>(
        &self,
        method: Method,
        path: &str,
        operation: &'static str,
        body: Option<&B>,
        query: &[(String, String)],
    ) -> Result<R, Error>
    where
        B: serde::Serialize + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(method, url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let (code, message) = match serde_json::from_slice::<ErrorBody>(&bytes) {
                Ok(body) => (Some(body.code), body.message),
                Err(_) => (None, String::from_utf8_lossy(&bytes).into_owned()),
            };
            return Err(Error::Status {
                operation,
                status,
                code,
                message,
            });
        }

        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Render a request field for substitution into a path template.
#[doc(hidden)]
pub fn path_value(value: impl std::fmt::Display) -> String {
    utf8_percent_encode(&value.to_string(), PATH_SEGMENT).to_string()
}
