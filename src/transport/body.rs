//! Body buffering with size limits
//!
//! Fingerprinting and snapshotting both need the whole body, so streaming
//! bodies are collected once before a request enters a recorder.

use std::fmt::Display;

use bytes::Bytes;
use http::header::CONTENT_LENGTH;
use http::{HeaderMap, Request, Response};
use http_body_util::BodyExt;

use crate::{Error, Result};

/// Read a body into memory, failing if it exceeds `max_size`
///
/// # Errors
///
/// Returns error if the body cannot be read or is too large
pub async fn read_body<B>(body: B, max_size: usize) -> Result<Bytes>
where
    B: hyper::body::Body,
    B::Error: Display,
{
    let collected = body
        .collect()
        .await
        .map_err(|e| Error::Transport(format!("Failed to read body: {e}")))?;

    let bytes = collected.to_bytes();

    if bytes.len() > max_size {
        return Err(Error::DataTooLarge {
            size: bytes.len(),
            limit: max_size,
        });
    }

    Ok(bytes)
}

/// Buffer a streaming request so it can be fingerprinted and replayed
///
/// # Errors
///
/// Returns error if the declared or actual body size exceeds `max_size`, or
/// the body cannot be read
pub async fn buffer_request<B>(request: Request<B>, max_size: usize) -> Result<Request<Bytes>>
where
    B: hyper::body::Body,
    B::Error: Display,
{
    check_declared_length(request.headers(), max_size)?;
    let (parts, body) = request.into_parts();
    let body = read_body(body, max_size).await?;
    Ok(Request::from_parts(parts, body))
}

/// Buffer a streaming response
///
/// # Errors
///
/// Returns error if the declared or actual body size exceeds `max_size`, or
/// the body cannot be read
pub async fn buffer_response<B>(response: Response<B>, max_size: usize) -> Result<Response<Bytes>>
where
    B: hyper::body::Body,
    B::Error: Display,
{
    check_declared_length(response.headers(), max_size)?;
    let (parts, body) = response.into_parts();
    let body = read_body(body, max_size).await?;
    Ok(Response::from_parts(parts, body))
}

/// Reject early when `Content-Length` already announces too much
fn check_declared_length(headers: &HeaderMap, max_size: usize) -> Result<()> {
    if let Some(length) = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
    {
        if length > max_size {
            return Err(Error::DataTooLarge {
                size: length,
                limit: max_size,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::{Empty, Full};

    #[tokio::test]
    async fn test_read_body() {
        let data = Bytes::from("test data");
        let body = Full::new(data.clone());

        let result = read_body(body, 1024).await;
        assert_eq!(result.unwrap(), data);
    }

    #[tokio::test]
    async fn test_read_body_too_large() {
        let body = Full::new(Bytes::from("test data that is too long"));

        let result = read_body(body, 5).await;
        assert!(matches!(result, Err(Error::DataTooLarge { limit: 5, .. })));
    }

    #[tokio::test]
    async fn test_buffer_request_keeps_head() {
        let request = Request::builder()
            .method("POST")
            .uri("http://example.com/upload")
            .header("Content-Type", "text/plain")
            .body(Full::new(Bytes::from("hello")))
            .unwrap();

        let buffered = buffer_request(request, 1024).await.unwrap();
        assert_eq!(buffered.method(), "POST");
        assert_eq!(buffered.uri(), "http://example.com/upload");
        assert_eq!(buffered.headers()["content-type"], "text/plain");
        assert_eq!(buffered.body().as_ref(), b"hello");
    }

    #[tokio::test]
    async fn test_buffer_request_declared_too_large() {
        let request = Request::builder()
            .method("POST")
            .uri("/test")
            .header(CONTENT_LENGTH, "10000")
            .body(Empty::<Bytes>::new())
            .unwrap();

        let result = buffer_request(request, 1024).await;
        assert!(matches!(result, Err(Error::DataTooLarge { size: 10000, .. })));
    }

    #[tokio::test]
    async fn test_buffer_response() {
        let response = Response::builder()
            .status(201)
            .body(Full::new(Bytes::from("created")))
            .unwrap();

        let buffered = buffer_response(response, 1024).await.unwrap();
        assert_eq!(buffered.status(), 201);
        assert_eq!(buffered.body().as_ref(), b"created");
    }
}
