// ── Poll Fetcher ──
//
// Pull side of the hybrid sync: one fetch hits the two read endpoints
// concurrently and returns whatever arrived. A single endpoint failing
// degrades to a partial result; the fetch fails only when the device
// answered neither request.

use tracing::warn;
use tsuryphone_api::DeviceClient;
use tsuryphone_api::device::{StatsPayload, StatusPayload};

use crate::error::CoreError;

/// Result of one poll: best-effort merge of `/status` and `/stats`.
#[derive(Debug, Clone, Default)]
pub struct PollSnapshot {
    pub status: Option<StatusPayload>,
    pub stats: Option<StatsPayload>,
    /// `true` when one of the two endpoints failed.
    pub partial: bool,
}

/// Periodic read-side fetcher over the request/response channel.
#[derive(Debug, Clone)]
pub struct PollFetcher {
    client: DeviceClient,
}

impl PollFetcher {
    pub fn new(client: DeviceClient) -> Self {
        Self { client }
    }

    /// Fetch both read endpoints concurrently.
    ///
    /// Poll results are complete per-section snapshots: the caller
    /// replaces the matching sections wholesale rather than overlaying.
    pub async fn fetch(&self) -> Result<PollSnapshot, CoreError> {
        let (status_res, stats_res) = tokio::join!(self.client.status(), self.client.stats());

        match (status_res, stats_res) {
            (Ok(status), Ok(stats)) => Ok(PollSnapshot {
                status: Some(status),
                stats: Some(stats),
                partial: false,
            }),
            (Ok(status), Err(e)) => {
                warn!(error = %e, "stats endpoint failed, keeping status");
                Ok(PollSnapshot {
                    status: Some(status),
                    stats: None,
                    partial: true,
                })
            }
            (Err(e), Ok(stats)) => {
                warn!(error = %e, "status endpoint failed, keeping stats");
                Ok(PollSnapshot {
                    status: None,
                    stats: Some(stats),
                    partial: true,
                })
            }
            (Err(status_err), Err(stats_err)) => {
                warn!(error = %stats_err, "stats endpoint failed");
                Err(status_err.into())
            }
        }
    }
}
