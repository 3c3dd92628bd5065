//! Record mode

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};

use crate::store::FixtureStore;
use crate::transport::Transport;
use crate::Result;

use super::tape::Tape;
use super::{Mode, RecorderOptions, StatsSnapshot};

/// Forwards every request to the delegate and stores the exchange
///
/// The delegate's response is returned unchanged. Existing fixtures are
/// overwritten with the fresh exchange.
pub struct Record {
    delegate: Arc<dyn Transport>,
    tape: Tape,
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record").field("tape", &self.tape).finish_non_exhaustive()
    }
}

impl Record {
    /// Create a recorder writing to `store`
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
        }
    }

    /// Counters for this recorder
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.tape.snapshot()
    }
}

#[async_trait]
impl Transport for Record {
    async fn round_trip(&self, request: Request<Bytes>) -> Result<Response<Bytes>> {
        let prepared = self.tape.prepare(request);
        let fingerprint = prepared.fingerprint.clone();

        self.tape
            .record(self.delegate.as_ref(), prepared)
            .await
            .map(|recorded| recorded.response)
            .map_err(|e| {
                self.tape.stats().error();
                e.in_mode(Mode::Record, fingerprint.as_str())
            })
    }
}
