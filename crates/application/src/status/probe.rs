//! Speculative status querying.
//!
//! Printers share no status handshake, so the probe walks a list of vendor
//! queries and takes the first reply it gets. Silence from every candidate
//! means the printer is write-only, which is reported as ready.

use std::time::Duration;

use domain::status::{STATUS_QUERIES, StatusQuery, hex_preview};
use domain::{PrinterStatus, PrinterTransport};
use infrastructure::config::ProbeConfig;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTimings {
    /// Read window used to discard stale bytes before each query
    pub drain: Duration,
    /// One read attempt per entry, in order
    pub reads: Vec<Duration>,
    pub between_candidates: Duration,
}

impl Default for ProbeTimings {
    fn default() -> Self {
        Self::from(&ProbeConfig::default())
    }
}

impl From<&ProbeConfig> for ProbeTimings {
    fn from(config: &ProbeConfig) -> Self {
        Self {
            drain: Duration::from_millis(config.drain_timeout_ms),
            reads: config.read_timeouts_ms.iter().copied().map(Duration::from_millis).collect(),
            between_candidates: Duration::from_millis(config.inter_candidate_delay_ms),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatusProbe {
    queries: Vec<StatusQuery>,
    timings: ProbeTimings,
}

impl Default for StatusProbe {
    fn default() -> Self {
        Self::new(ProbeTimings::default())
    }
}

impl StatusProbe {
    pub fn new(timings: ProbeTimings) -> Self {
        Self {
            queries: STATUS_QUERIES.to_vec(),
            timings,
        }
    }

    /// Probe with a custom candidate list
    pub fn with_queries(queries: Vec<StatusQuery>, timings: ProbeTimings) -> Self {
        Self { queries, timings }
    }

    pub fn queries(&self) -> &[StatusQuery] {
        &self.queries
    }

    /// Run the probe against a shared transport.
    ///
    /// The lock is held for one candidate at a time (drain, write, reads), so
    /// a print may slip in between candidates and a background reader may
    /// pick up a reply that arrives after the read window closed.
    pub async fn run(&self, transport: &Mutex<Box<dyn PrinterTransport>>) -> PrinterStatus {
        if !transport.lock().await.can_read() {
            debug!("Transport has no read path, skipping status probe");
            return PrinterStatus::unsupported();
        }

        for (index, query) in self.queries.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.timings.between_candidates).await;
            }

            let reply = {
                let mut guard = transport.lock().await;
                self.exchange(&mut **guard, query).await
            };

            if let Some(bytes) = reply {
                info!(query = query.name, response = %hex_preview(&bytes, 32), "✅ Printer answered status query");
                return PrinterStatus::parse(&bytes);
            }
            debug!(query = query.name, "No response");
        }

        warn!("No response from any status query");
        PrinterStatus::unsupported()
    }

    /// Drain, send one query and wait for its reply
    async fn exchange(&self, transport: &mut dyn PrinterTransport, query: &StatusQuery) -> Option<Vec<u8>> {
        if let Ok(Some(stale)) = transport.read(self.timings.drain).await {
            if !stale.is_empty() {
                debug!(bytes = stale.len(), "Discarded stale bytes before status query");
            }
        }

        debug!(query = query.name, bytes = %hex_preview(query.bytes, 16), "Sending status query");
        if let Err(e) = transport.write(query.bytes).await {
            warn!(query = query.name, error = %e, "Status query not sent");
            return None;
        }

        for (attempt, timeout) in self.timings.reads.iter().enumerate() {
            match transport.read(*timeout).await {
                Ok(Some(bytes)) if !bytes.is_empty() => return Some(bytes),
                Ok(_) => debug!(query = query.name, attempt = attempt + 1, "Read attempt empty"),
                Err(e) => {
                    debug!(query = query.name, error = %e, "Read failed during status query");
                    return None;
                }
            }
        }
        None
    }
}
