use axum::extract::FromRequestParts;
use axum::response::{IntoResponse, Response};
use http::header::CONTENT_TYPE;
use http_body_util::BodyExt;

use crate::Status;

/// Deserialize the matched path parameters into a generated path struct.
pub async fn deserialize_path<T>(parts: &mut http::request::Parts) -> Result<T, Response>
where
    T: serde::de::DeserializeOwned + Send,
{
    match axum::extract::Path::<T>::from_request_parts(parts, &()).await {
        Ok(axum::extract::Path(value)) => Ok(value),
        Err(err) => Err(Status::invalid_argument(format!("invalid path: {err}")).into_response()),
    }
}

/// Deserialize the query string into a generated query struct.
pub fn deserialize_query<T>(parts: &http::request::Parts) -> Result<T, Response>
where
    T: serde::de::DeserializeOwned,
{
    serde_qs::from_str(parts.uri.query().unwrap_or(""))
        .map_err(|err| Status::invalid_argument(format!("invalid query string: {err}")).into_response())
}

/// Deserialize the request body, dispatching on the `Content-Type` header.
///
/// `application/x-www-form-urlencoded` bodies are parsed as forms; anything
/// else, including a missing content type, is treated as JSON.
pub async fn deserialize_body<T>(parts: &http::request::Parts, body: axum::body::Body) -> Result<T, Response>
where
    T: serde::de::DeserializeOwned,
{
    let bytes = body_bytes(body).await?;
    let content_type = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    if content_type.contains("application/x-www-form-urlencoded") {
        serde_qs::from_bytes(&bytes)
            .map_err(|err| Status::invalid_argument(format!("invalid form body: {err}")).into_response())
    } else {
        serde_json::from_slice(&bytes)
            .map_err(|err| Status::invalid_argument(format!("invalid request body: {err}")).into_response())
    }
}

/// Collect the request body into a single buffer.
pub async fn body_bytes(body: axum::body::Body) -> Result<bytes::Bytes, Response> {
    match body.collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) => Err(Status::invalid_argument(format!("failed to read body: {err}")).into_response()),
    }
}

/// Read a header-bound field as a string, if the header is present.
pub fn header_value(parts: &http::request::Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}
