//! The single-operation transport capability
//!
//! Everything that can answer an HTTP request implements [`Transport`]: the
//! real network client, the recorder modes wrapping it, and small helpers for
//! tests. Any of them can stand in wherever another is expected.

mod body;
mod client;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};

use crate::wire::{decode_response, DEFAULT_MAX_HEADERS};
use crate::Result;

pub use body::{buffer_request, buffer_response, read_body};
pub use client::HyperTransport;

/// Send a request, get a response or an error
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one exchange
    ///
    /// # Errors
    ///
    /// Returns error if no response could be produced
    async fn round_trip(&self, request: Request<Bytes>) -> Result<Response<Bytes>>;
}

#[async_trait]
impl<T> Transport for Arc<T>
where
    T: Transport + ?Sized,
{
    async fn round_trip(&self, request: Request<Bytes>) -> Result<Response<Bytes>> {
        (**self).round_trip(request).await
    }
}

/// Adapts an async closure into a [`Transport`]
pub struct TransportFn<F>(F);

impl<F> TransportFn<F> {
    /// Wrap a closure
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> fmt::Debug for TransportFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TransportFn")
    }
}

#[async_trait]
impl<F, Fut> Transport for TransportFn<F>
where
    F: Fn(Request<Bytes>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response<Bytes>>> + Send,
{
    async fn round_trip(&self, request: Request<Bytes>) -> Result<Response<Bytes>> {
        (self.0)(request).await
    }
}

/// Always answers with the same raw HTTP response
///
/// Useful for one-off tests, or as the delegate of a recorder when the real
/// service is not reachable.
#[derive(Debug, Clone)]
pub struct StaticTransport {
    raw: Bytes,
}

impl StaticTransport {
    /// Answer every request with `raw`, an HTTP/1.1 response message
    pub fn new(raw: impl Into<Bytes>) -> Self {
        Self { raw: raw.into() }
    }
}

#[async_trait]
impl Transport for StaticTransport {
    async fn round_trip(&self, request: Request<Bytes>) -> Result<Response<Bytes>> {
        decode_response(&self.raw, &request, DEFAULT_MAX_HEADERS)
    }
}
