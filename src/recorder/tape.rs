//! Fixture operations shared by every mode

use std::sync::Arc;

use bytes::Bytes;
use http::{Request, Response};
use tracing::{debug, info, warn};

use crate::fingerprint::{fingerprint_bytes, Fingerprint, MAX_LENGTH, MIN_LENGTH};
use crate::store::{FixtureKind, FixtureStore, PutOutcome};
use crate::transport::Transport;
use crate::wire::{decode_response, encode_request, encode_response};
use crate::{Error, Result};

use super::{RecorderOptions, RecorderStats, StatsSnapshot};

/// A request together with its canonical bytes and fingerprint
pub(crate) struct Prepared {
    pub request: Request<Bytes>,
    pub canonical: Vec<u8>,
    pub fingerprint: Fingerprint,
}

impl Prepared {
    /// Copy of the request head, for binding a decoded response after the
    /// request itself went to the delegate
    pub fn head(&self) -> Request<()> {
        let mut head = Request::new(());
        *head.method_mut() = self.request.method().clone();
        *head.uri_mut() = self.request.uri().clone();
        *head.version_mut() = self.request.version();
        *head.headers_mut() = self.request.headers().clone();
        head
    }
}

/// A delegate response and the snapshot stored for it
pub(crate) struct Recorded {
    pub response: Response<Bytes>,
    pub snapshot: Vec<u8>,
}

/// Store, options and counters behind one recorder
#[derive(Debug)]
pub(crate) struct Tape {
    store: Arc<dyn FixtureStore>,
    options: RecorderOptions,
    stats: RecorderStats,
}

impl Tape {
    /// # Panics
    ///
    /// Panics if the fingerprint length is outside `MIN_LENGTH..=MAX_LENGTH`
    pub fn new(store: Arc<dyn FixtureStore>, options: RecorderOptions) -> Self {
        let length = options.fingerprint.length;
        assert!(
            (MIN_LENGTH..=MAX_LENGTH).contains(&length),
            "fingerprint length must be in {MIN_LENGTH}..={MAX_LENGTH}, got {length}"
        );

        Self {
            store,
            options,
            stats: RecorderStats::default(),
        }
    }

    pub fn stats(&self) -> &RecorderStats {
        &self.stats
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Serialize once; the same bytes feed the fingerprint and the snapshot
    pub fn prepare(&self, request: Request<Bytes>) -> Prepared {
        let canonical = encode_request(&request);
        let fingerprint = fingerprint_bytes(&canonical, self.options.fingerprint.length);
        debug!(
            "{} {} -> {}",
            request.method(),
            request.uri(),
            fingerprint
        );

        Prepared {
            request,
            canonical,
            fingerprint,
        }
    }

    /// Answer from the stored response snapshot
    pub fn replay(&self, prepared: &Prepared) -> Result<Response<Bytes>> {
        let data = self
            .store
            .get(&prepared.fingerprint, FixtureKind::Response)?;

        self.decode(&data, &prepared.request, &prepared.fingerprint)
    }

    /// Parse a response snapshot, naming it in parse errors
    pub fn decode<B>(
        &self,
        data: &[u8],
        request: &Request<B>,
        fingerprint: &Fingerprint,
    ) -> Result<Response<Bytes>> {
        decode_response(data, request, self.options.limits.max_headers).map_err(|e| match e {
            Error::MalformedFixture(reason) => Error::MalformedFixture(format!(
                "{} snapshot {} in {}: {reason}",
                FixtureKind::Response,
                fingerprint,
                self.store.location()
            )),
            other => other,
        })
    }

    /// Store the request, call the delegate, store the response
    ///
    /// A delegate failure leaves the request snapshot without a response.
    pub async fn record(
        &self,
        delegate: &dyn Transport,
        prepared: Prepared,
    ) -> Result<Recorded> {
        let Prepared {
            request,
            canonical,
            fingerprint,
        } = prepared;

        let limit = self.options.limits.max_request_size;
        if request.body().len() > limit {
            return Err(Error::DataTooLarge {
                size: request.body().len(),
                limit,
            });
        }

        let label = self.options.label.label_for(&request);
        let method = request.method().clone();
        let uri = request.uri().clone();

        let outcome = self.store.put(
            &fingerprint,
            FixtureKind::Request,
            label.as_deref(),
            &canonical,
        )?;
        if outcome == PutOutcome::Replaced {
            warn!(
                "Request snapshot {} in {} had different content; two requests may share this fingerprint",
                fingerprint,
                self.store.location()
            );
        }

        let response = delegate.round_trip(request).await?;

        let limit = self.options.limits.max_response_size;
        if response.body().len() > limit {
            return Err(Error::DataTooLarge {
                size: response.body().len(),
                limit,
            });
        }

        let snapshot = encode_response(&response);
        self.store.put(
            &fingerprint,
            FixtureKind::Response,
            label.as_deref(),
            &snapshot,
        )?;
        self.stats.recorded();

        info!(
            "Recorded {} {} as {} ({})",
            method,
            uri,
            fingerprint,
            response.status()
        );

        Ok(Recorded { response, snapshot })
    }
}
