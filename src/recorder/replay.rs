//! Replay mode

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use tracing::debug;

use crate::store::FixtureStore;
use crate::transport::Transport;
use crate::Result;

use super::tape::Tape;
use super::{Mode, RecorderOptions, StatsSnapshot};

/// Serves stored responses and never touches the network
///
/// A request without a stored response fails with
/// [`Error::FixtureNotFound`](crate::Error::FixtureNotFound).
#[derive(Debug)]
pub struct Replay {
    tape: Tape,
}

impl Replay {
    /// Create a replayer reading from `store`
    ///
    /// # Panics
    ///
    /// Panics if `options.fingerprint.length` is outside 4..=64
    #[must_use]
    pub fn new(store: Arc<dyn FixtureStore>, options: RecorderOptions) -> Self {
        Self {
            tape: Tape::new(store, options),
        }
    }

    /// Counters for this replayer
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.tape.snapshot()
    }
}

#[async_trait]
impl Transport for Replay {
    async fn round_trip(&self, request: Request<Bytes>) -> Result<Response<Bytes>> {
        let prepared = self.tape.prepare(request);

        match self.tape.replay(&prepared) {
            Ok(response) => {
                self.tape.stats().hit();
                debug!("Replayed {}", prepared.fingerprint);
                Ok(response)
            }
            Err(e) => {
                if e.is_not_found() {
                    self.tape.stats().miss();
                }
                self.tape.stats().error();
                Err(e.in_mode(Mode::Replay, prepared.fingerprint.as_str()))
            }
        }
    }
}
