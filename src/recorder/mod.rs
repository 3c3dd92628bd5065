//! Record, replay and cache transports
//!
//! Every mode fingerprints the request from its canonical wire bytes and
//! talks to a [`FixtureStore`]:
//!
//! - [`Record`] always calls the delegate and stores the exchange.
//! - [`Replay`] only reads stored responses and never touches the network.
//! - [`Cache`] replays when a fixture exists and records otherwise.
//!
//! [`recorder`] picks one of them from a [`Mode`].

mod cache;
mod in_flight;
mod record;
mod replay;
mod stats;
mod tape;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::HOST;
use http::{Request, Response};
use serde::{Deserialize, Serialize};

use crate::config::{Config, LimitsConfig};
use crate::fingerprint::FingerprintConfig;
use crate::store::{DirStore, FixtureStore};
use crate::transport::{HyperTransport, Transport};
use crate::{Error, Result};

pub use cache::Cache;
pub use in_flight::{InFlight, InFlightGuard};
pub use record::Record;
pub use replay::Replay;
pub use stats::{RecorderStats, StatsSnapshot};

/// Operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Call the delegate and store every exchange
    Record,
    /// Serve stored responses only
    Replay,
    /// Serve stored responses, recording the ones that are missing
    Cache,
}

impl Mode {
    /// Lower-case name, as used in configuration
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Record => "record",
            Self::Replay => "replay",
            Self::Cache => "cache",
        }
    }

    pub(crate) fn verb(self) -> &'static str {
        match self {
            Self::Record => "recording",
            Self::Replay => "replaying",
            Self::Cache => "caching",
        }
    }

    /// True if the mode may call a delegate transport
    #[must_use]
    pub fn uses_network(self) -> bool {
        !matches!(self, Self::Replay)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "record" => Ok(Self::Record),
            "replay" => Ok(Self::Replay),
            "cache" => Ok(Self::Cache),
            other => Err(Error::ConfigError(format!(
                "Unknown mode '{other}', expected record, replay or cache"
            ))),
        }
    }
}

/// How new fixtures are labelled
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelStrategy {
    /// Bare `<fingerprint>.<kind>.txt` names
    #[default]
    None,
    /// Prefix names with the request host
    Host,
    /// Prefix names with a fixed string
    Fixed(String),
}

impl LabelStrategy {
    /// Label for a request, if any
    #[must_use]
    pub fn label_for<B>(&self, request: &Request<B>) -> Option<String> {
        match self {
            Self::None => None,
            Self::Host => request
                .uri()
                .host()
                .map(str::to_string)
                .or_else(|| {
                    request
                        .headers()
                        .get(HOST)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string)
                }),
            Self::Fixed(label) => Some(label.clone()),
        }
    }
}

/// Settings shared by all modes
#[derive(Debug, Clone, Default)]
pub struct RecorderOptions {
    /// Fingerprint settings
    pub fingerprint: FingerprintConfig,
    /// Label strategy for new fixtures
    pub label: LabelStrategy,
    /// Size and header limits
    pub limits: LimitsConfig,
}

impl From<&Config> for RecorderOptions {
    fn from(config: &Config) -> Self {
        Self {
            fingerprint: config.fingerprint,
            label: config.label.clone(),
            limits: config.limits,
        }
    }
}

/// One of the three transport modes
#[derive(Debug)]
pub enum Recorder {
    /// Record mode
    Record(Record),
    /// Replay mode
    Replay(Replay),
    /// Cache mode
    Cache(Cache),
}

impl Recorder {
    /// Build a recorder from configuration
    ///
    /// Record and Cache modes use `delegate`, or a [`HyperTransport`] built
    /// from `config.network` when none is given.
    ///
    /// # Panics
    ///
    /// Panics if the fingerprint length is out of range; call
    /// [`Config::validate`] first on hand-built configurations
    #[must_use]
    pub fn from_config(config: &Config, delegate: Option<Arc<dyn Transport>>) -> Self {
        let store: Arc<dyn FixtureStore> = Arc::new(DirStore::new(config.fixture_dir.clone()));
        let delegate = delegate.or_else(|| {
            config.mode.uses_network().then(|| {
                Arc::new(HyperTransport::with_config(&config.network, &config.limits))
                    as Arc<dyn Transport>
            })
        });
        recorder(config.mode, delegate, store, RecorderOptions::from(config))
    }

    /// Mode of this recorder
    #[must_use]
    pub fn mode(&self) -> Mode {
        match self {
            Self::Record(_) => Mode::Record,
            Self::Replay(_) => Mode::Replay,
            Self::Cache(_) => Mode::Cache,
        }
    }

    /// Counters for this recorder
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        match self {
            Self::Record(record) => record.stats(),
            Self::Replay(replay) => replay.stats(),
            Self::Cache(cache) => cache.stats(),
        }
    }
}

#[async_trait]
impl Transport for Recorder {
    async fn round_trip(&self, request: Request<Bytes>) -> Result<Response<Bytes>> {
        match self {
            Self::Record(record) => record.round_trip(request).await,
            Self::Replay(replay) => replay.round_trip(request).await,
            Self::Cache(cache) => cache.round_trip(request).await,
        }
    }
}

/// Build the transport for `mode`
///
/// `delegate` is ignored in Replay mode. Record and Cache modes without a
/// delegate get a new [`HyperTransport`] with default settings.
///
/// # Panics
///
/// Panics if `options.fingerprint.length` is outside 4..=64. Lengths read
/// through [`Config::from_file`] are already checked.
#[must_use]
pub fn recorder(
    mode: Mode,
    delegate: Option<Arc<dyn Transport>>,
    store: Arc<dyn FixtureStore>,
    options: RecorderOptions,
) -> Recorder {
    let network = || {
        delegate
            .clone()
            .unwrap_or_else(|| Arc::new(HyperTransport::new()) as Arc<dyn Transport>)
    };

    match mode {
        Mode::Record => Recorder::Record(Record::new(network(), store, options)),
        Mode::Replay => Recorder::Replay(Replay::new(store, options)),
        Mode::Cache => Recorder::Cache(Cache::new(network(), store, options)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::transport::StaticTransport;

    #[test]
    fn test_mode_from_str() {
        assert_eq!("record".parse::<Mode>().unwrap(), Mode::Record);
        assert_eq!("replay".parse::<Mode>().unwrap(), Mode::Replay);
        assert_eq!("cache".parse::<Mode>().unwrap(), Mode::Cache);
        assert!(matches!("Cache".parse::<Mode>(), Err(Error::ConfigError(_))));
        assert!("".parse::<Mode>().is_err());
    }

    #[test]
    fn test_mode_display_roundtrip() {
        for mode in [Mode::Record, Mode::Replay, Mode::Cache] {
            assert_eq!(mode.to_string().parse::<Mode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_label_for() {
        let request = Request::builder()
            .uri("http://api.example.com/v1/users")
            .body(())
            .unwrap();

        assert_eq!(LabelStrategy::None.label_for(&request), None);
        assert_eq!(
            LabelStrategy::Host.label_for(&request).as_deref(),
            Some("api.example.com")
        );
        assert_eq!(
            LabelStrategy::Fixed("users".to_string())
                .label_for(&request)
                .as_deref(),
            Some("users")
        );
    }

    #[test]
    fn test_host_label_from_header() {
        let request = Request::builder()
            .uri("/v1/users")
            .header("Host", "internal.example")
            .body(())
            .unwrap();

        assert_eq!(
            LabelStrategy::Host.label_for(&request).as_deref(),
            Some("internal.example")
        );
    }

    #[test]
    fn test_dispatcher_selects_mode() {
        let store: Arc<dyn FixtureStore> = Arc::new(MemoryStore::new());
        let delegate: Arc<dyn Transport> = Arc::new(StaticTransport::new("HTTP/1.1 200 OK\r\n\r\n"));

        for mode in [Mode::Record, Mode::Replay, Mode::Cache] {
            let recorder = recorder(
                mode,
                Some(Arc::clone(&delegate)),
                Arc::clone(&store),
                RecorderOptions::default(),
            );
            assert_eq!(recorder.mode(), mode);
            assert_eq!(recorder.stats(), StatsSnapshot::default());
        }
    }

    #[test]
    #[should_panic(expected = "fingerprint length must be in 4..=64, got 3")]
    fn test_short_fingerprint_rejected_at_construction() {
        let mut options = RecorderOptions::default();
        options.fingerprint.length = 3;

        let _ = recorder(Mode::Replay, None, Arc::new(MemoryStore::new()), options);
    }

    #[test]
    #[should_panic(expected = "fingerprint length must be in 4..=64, got 65")]
    fn test_long_fingerprint_rejected_at_construction() {
        let mut options = RecorderOptions::default();
        options.fingerprint.length = 65;
        let delegate: Arc<dyn Transport> = Arc::new(StaticTransport::new("HTTP/1.1 200 OK\r\n\r\n"));

        let _ = recorder(Mode::Cache, Some(delegate), Arc::new(MemoryStore::new()), options);
    }

    #[tokio::test]
    async fn test_from_config() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = Config::new(Mode::Replay, dir.path());

        let recorder = Recorder::from_config(&config, None);
        assert_eq!(recorder.mode(), Mode::Replay);

        let request = Request::builder()
            .uri("http://example.com/")
            .body(Bytes::new())
            .unwrap();
        let err = recorder.round_trip(request).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
