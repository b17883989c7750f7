use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use http::{HeaderMap, Method, Uri};

/// Request metadata handed to every generated server-trait method.
///
/// This carries the pieces of the HTTP request that are not part of the
/// request message: the verb and URI that were matched, the full header map,
/// the operation name of the RPC, and the peer address when the server was
/// started with [`axum::extract::connect_info::IntoMakeServiceWithConnectInfo`].
#[derive(Debug, Clone)]
pub struct Context {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    operation: &'static str,
    remote_addr: Option<SocketAddr>,
}

impl Context {
    #[doc(hidden)]
    pub fn from_parts(parts: &http::request::Parts, operation: &'static str) -> Self {
        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            operation,
            remote_addr: parts.extensions.get::<ConnectInfo<SocketAddr>>().map(|info| info.0),
        }
    }

    /// The HTTP method the request was made with.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request URI, including the query string.
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// All request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// A single header value, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// The operation name of the RPC being served, e.g.
    /// `/helloworld.Greeter/SayHello`.
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// The peer address, when connect info was configured on the server.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }
}

/// Response extension identifying which RPC a response came from.
///
/// Generated handlers insert this into every response they produce, so
/// middleware layered over the router can key metrics or policies by
/// operation name without parsing paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Operation(pub &'static str);

impl Operation {
    /// The operation name, e.g. `/helloworld.Greeter/SayHello`.
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}
