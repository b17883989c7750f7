#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(unreachable_pub)]

//! Trellis exposes protobuf services as plain HTTP/JSON endpoints. The
//! [`protoc-gen-trellis`](https://crates.io/crates/protoc-gen-trellis) plugin
//! reads `google.api.http` annotations and emits axum routing, a server
//! trait, and a typed HTTP client for every service; this crate is the
//! runtime those generated files link against.
//!
//! ```protobuf
//! service Messaging {
//!     rpc GetMessage(GetMessageRequest) returns (Message) {
//!         option (google.api.http) = {
//!             get: "/v1/messages/{message_id}"
//!         };
//!     }
//! }
//!
//! message GetMessageRequest {
//!     string message_id = 1;
//!     int32 revision = 2;
//! }
//! ```
//!
//! For the service above the plugin generates a `messaging_http` module
//! containing:
//!
//! - `MessagingHttpServer`, a trait with one async method per RPC, taking a
//!   [`Context`] and the request message and returning
//!   `Result<Reply, Status>`,
//! - `MessagingHttpRouter<T>`, which turns an implementation into an
//!   [`axum::Router`] (`GET /v1/messages/{message_id}` here, with
//!   `message_id` bound from the path and `revision` from the query string),
//! - `MessagingHttpClient`, a typed client over [`client::Client`] that
//!   rebuilds the same URL from a request message,
//! - `OPERATION_MESSAGING_GET_MESSAGE`, the operation name
//!   (`/pkg.Messaging/GetMessage`) used to key per-route middleware.
//!
//! Generated code deserializes request messages with serde, so the companion
//! prost invocation must add the derives and field defaults:
//!
//! ```text
//! --prost_opt=type_attribute=.=#[derive(serde::Serialize\,serde::Deserialize)]
//! --prost_opt=type_attribute=.=#[serde(default)]
//! ```
//!
//! Field-level binding overrides (query renames, header binding) live in
//! [`ANNOTATIONS_PROTO`]; write it next to your protos and import
//! `trellis/annotations.proto`.

#[doc(hidden)]
pub mod reexports {
    pub use {axum, bytes, http, serde, serde_derive, serde_json, serde_qs};
}

#[doc(hidden)]
#[path = "private/mod.rs"]
pub mod __private;

pub mod client;

mod context;
mod status;

pub use context::{Context, Operation};
pub use status::{Code, Status};

/// The `trellis/annotations.proto` source shipped with this crate.
///
/// Build tooling can write this into an include directory so user protos can
/// `import "trellis/annotations.proto";`.
pub const ANNOTATIONS_PROTO: &str = include_str!("../annotations.proto");

/// Implemented by the router wrappers emitted by `protoc-gen-trellis`.
pub trait HttpService {
    /// Convert the service into an axum router.
    fn into_router(self) -> axum::Router;
}
