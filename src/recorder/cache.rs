//! Cache mode

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use tracing::debug;

use crate::store::FixtureStore;
use crate::transport::Transport;
use crate::Result;

use super::in_flight::InFlight;
use super::tape::{Prepared, Tape};
use super::{Mode, RecorderOptions, StatsSnapshot};

/// Replays stored responses and records the missing ones
///
/// Only a missing fixture triggers a network call. A stored response that
/// cannot be parsed is reported as an error rather than fetched again. A
/// freshly recorded response is returned as read back from its snapshot, so
/// it matches what later hits return.
///
/// Identical requests that miss concurrently share one delegate call.
pub struct Cache {
    delegate: Arc<dyn Transport>,
    tape: Tape,
    in_flight: InFlight,
}

impl Cache {
    /// Create a cache in front of `delegate`
    ///
    /// # Panics
    ///
    /// Panics if `options.fingerprint.length` is outside 4..=64
    #[must_use]
    pub fn new(
        delegate: Arc<dyn Transport>,
        store: Arc<dyn FixtureStore>,
        options: RecorderOptions,
    ) -> Self {
        Self {
            delegate,
            tape: Tape::new(store, options),
            in_flight: InFlight::new(),
        }
    }

    /// Counters for this cache
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.tape.snapshot()
    }

    async fn fetch(&self, prepared: Prepared) -> Result<Response<Bytes>> {
        match self.tape.replay(&prepared) {
            Ok(response) => {
                self.tape.stats().hit();
                return Ok(response);
            }
            Err(e) if !e.is_not_found() => return Err(e),
            Err(_) => {}
        }

        let _guard = self.in_flight.acquire(&prepared.fingerprint).await;

        // Another caller may have recorded it while we waited
        match self.tape.replay(&prepared) {
            Ok(response) => {
                self.tape.stats().hit();
                debug!("Fixture {} recorded by a concurrent request", prepared.fingerprint);
                return Ok(response);
            }
            Err(e) if !e.is_not_found() => return Err(e),
            Err(_) => {}
        }

        self.tape.stats().miss();
        debug!("Cache miss for {}", prepared.fingerprint);

        // Answer from the stored snapshot so a miss looks exactly like the
        // hits that follow it
        let head = prepared.head();
        let fingerprint = prepared.fingerprint.clone();
        let recorded = self.tape.record(self.delegate.as_ref(), prepared).await?;
        self.tape.decode(&recorded.snapshot, &head, &fingerprint)
    }
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("tape", &self.tape)
            .field("in_flight", &self.in_flight)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for Cache {
    async fn round_trip(&self, request: Request<Bytes>) -> Result<Response<Bytes>> {
        let prepared = self.tape.prepare(request);
        let fingerprint = prepared.fingerprint.clone();

        self.fetch(prepared).await.map_err(|e| {
            self.tape.stats().error();
            e.in_mode(Mode::Cache, fingerprint.as_str())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DirStore, MemoryStore};
    use crate::transport::TransportFn;
    use crate::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    fn get(uri: &str) -> Request<Bytes> {
        Request::builder().uri(uri).body(Bytes::new()).unwrap()
    }

    fn counting_delegate(calls: Arc<AtomicUsize>, delay: Duration) -> Arc<dyn Transport> {
        Arc::new(TransportFn::new(move |_: Request<Bytes>| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(delay).await;
                Ok::<_, Error>(
                    Response::builder()
                        .status(200)
                        .body(Bytes::from_static(b"cached body"))
                        .unwrap(),
                )
            }
        }))
    }

    #[tokio::test]
    async fn test_second_call_is_replayed() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(DirStore::new(temp_dir.path()));
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = Cache::new(
            counting_delegate(Arc::clone(&calls), Duration::ZERO),
            store.clone(),
            RecorderOptions::default(),
        );

        let first = cache.round_trip(get("http://example.com/")).await.unwrap();
        let second = cache.round_trip(get("http://example.com/")).await.unwrap();

        assert_eq!(first.status(), second.status());
        assert_eq!(first.headers(), second.headers());
        assert_eq!(first.body(), second.body());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.names().unwrap().len(), 2);

        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.recorded, 1);
    }

    #[tokio::test]
    async fn test_chunked_delegate_response_matches_replay() {
        let temp_dir = TempDir::new().unwrap();
        let delegate = Arc::new(TransportFn::new(|_: Request<Bytes>| async {
            Ok::<_, Error>(
                Response::builder()
                    .status(200)
                    .header("Transfer-Encoding", "chunked")
                    .body(Bytes::from_static(b"hi"))
                    .unwrap(),
            )
        }));
        let cache = Cache::new(
            delegate,
            Arc::new(DirStore::new(temp_dir.path())),
            RecorderOptions::default(),
        );

        let first = cache.round_trip(get("http://example.com/")).await.unwrap();
        let second = cache.round_trip(get("http://example.com/")).await.unwrap();

        assert_eq!(first.status(), second.status());
        assert_eq!(first.headers(), second.headers());
        assert_eq!(first.body(), second.body());
        assert_eq!(first.body().as_ref(), b"hi");
        assert!(first.headers().get("transfer-encoding").is_none());
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_call() {
        let temp_dir = TempDir::new().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(Cache::new(
            counting_delegate(Arc::clone(&calls), Duration::from_millis(20)),
            Arc::new(DirStore::new(temp_dir.path())),
            RecorderOptions::default(),
        ));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            tasks.push(tokio::spawn(async move {
                cache.round_trip(get("http://example.com/slow")).await
            }));
        }
        for task in tasks {
            let response = task.await.unwrap().unwrap();
            assert_eq!(response.body().as_ref(), b"cached body");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits, 7);
    }

    #[tokio::test]
    async fn test_malformed_fixture_is_not_refetched() {
        let request = get("http://example.com/");
        let fingerprint =
            crate::fingerprint::fingerprint_request(&request, crate::fingerprint::DEFAULT_LENGTH);
        let store = MemoryStore::new().with(format!("{fingerprint}.res.txt"), "HTTP/1.1 abc\r\n\r\n");
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = Cache::new(
            counting_delegate(Arc::clone(&calls), Duration::ZERO),
            Arc::new(store),
            RecorderOptions::default(),
        );

        let err = cache.round_trip(request).await.unwrap_err();
        assert!(err.is_malformed());
        assert!(matches!(err, Error::Recorder { mode: Mode::Cache, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_delegate_error_is_wrapped() {
        let temp_dir = TempDir::new().unwrap();
        let delegate = Arc::new(TransportFn::new(|_: Request<Bytes>| async {
            Err::<Response<Bytes>, _>(Error::Transport("connection reset".to_string()))
        }));
        let cache = Cache::new(
            delegate,
            Arc::new(DirStore::new(temp_dir.path())),
            RecorderOptions::default(),
        );

        let err = cache.round_trip(get("http://example.com/")).await.unwrap_err();
        assert!(err.to_string().starts_with("problem while caching transport"));
        assert!(matches!(err.root(), Error::Transport(_)));
        assert_eq!(cache.stats().errors, 1);
        assert!(cache.in_flight.is_empty());
    }
}
