//! Support functions for generated code. Nothing in here is part of the
//! public API and everything may change between minor versions.

mod http;

pub use http::{body_bytes, deserialize_body, deserialize_path, deserialize_query, header_value};
