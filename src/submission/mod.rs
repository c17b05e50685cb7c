//! Chunked delivery of entity documents to the remote store.
//!
//! Each chunk moves through `Pending -> Sent -> Ok`, or on a transport failure
//! `Sent -> TransportFail -> Reauth -> RetrySent -> Ok | Fatal`. A chunk is
//! resent at most once; a fatal chunk aborts the job and later chunks are
//! never attempted. Items the store refuses inside a delivered chunk go to the
//! [`FailureLedger`] and do not stop the job.

pub mod credentials;
pub mod ledger;

use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config;
use crate::error::{SubmissionError, TransportError};
use crate::telemetry::{Progress, ProgressSink};

pub use credentials::{BearerToken, ClientCredentialsProvider, CredentialProvider};
pub use ledger::{FailureLedger, ItemOutcome, PartialPushFailure, MISSING_OUTCOME, NO_GIVEN_REASON};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionSettings {
    pub chunk_size: usize,
    pub timeout: Duration,
    pub retry_timeout: Duration,
    pub reauth_pause: Duration,
    pub pacing: Duration,
    pub partial_override: bool,
}

impl Default for SubmissionSettings {
    fn default() -> Self {
        Self {
            chunk_size: 30,
            timeout: Duration::from_secs(120),
            retry_timeout: Duration::from_secs(200),
            reauth_pause: Duration::from_secs(10),
            pacing: Duration::from_secs(4),
            partial_override: false,
        }
    }
}

impl SubmissionSettings {
    pub fn from_config() -> Self {
        Self {
            chunk_size: *config::SUBMISSION_CHUNK_SIZE,
            timeout: Duration::from_secs(*config::SUBMISSION_TIMEOUT_SECS),
            retry_timeout: Duration::from_secs(*config::SUBMISSION_RETRY_TIMEOUT_SECS),
            reauth_pause: Duration::from_secs(*config::SUBMISSION_REAUTH_PAUSE_SECS),
            pacing: Duration::from_secs(*config::SUBMISSION_PACING_SECS),
            partial_override: *config::SUBMISSION_PARTIAL_OVERRIDE,
        }
    }
}

/// Splits `0..len` into consecutive ranges of at most `size` items.
pub fn chunk_ranges(len: usize, size: usize) -> Vec<Range<usize>> {
    let size = size.max(1);
    (0..len)
        .step_by(size)
        .map(|start| start..(start + size).min(len))
        .collect()
}

/// `<base>/entities?returnUriOnly=true`, plus `options=partialOverride` when set.
pub fn entities_endpoint(base: &url::Url, partial_override: bool) -> url::Url {
    let mut endpoint = base.clone();
    let path = format!("{}/entities", base.path().trim_end_matches('/'));
    endpoint.set_path(&path);
    endpoint.set_query(None);
    {
        let mut query = endpoint.query_pairs_mut();
        query.append_pair("returnUriOnly", "true");
        if partial_override {
            query.append_pair("options", "partialOverride");
        }
    }
    endpoint
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    Pending,
    Sent,
    Ok,
    TransportFail,
    Reauth,
    RetrySent,
    Fatal,
}

impl ChunkState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkState::Pending => "pending",
            ChunkState::Sent => "sent",
            ChunkState::Ok => "ok",
            ChunkState::TransportFail => "transport_fail",
            ChunkState::Reauth => "reauth",
            ChunkState::RetrySent => "retry_sent",
            ChunkState::Fatal => "fatal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStatus {
    /// Every item accepted.
    Delivered,
    /// Delivered, with at least one item refused.
    Partial,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkOutcome {
    pub index: usize,
    pub range: Range<usize>,
    pub status: ChunkStatus,
    pub retried: bool,
    pub failed_items: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionReport {
    pub total: usize,
    pub failed: usize,
    pub ledger: FailureLedger,
    pub reauth_events: usize,
    pub chunks: Vec<ChunkOutcome>,
}

impl SubmissionReport {
    pub fn succeeded(&self) -> usize {
        self.total.saturating_sub(self.failed)
    }

    pub fn ledger_text(&self) -> String {
        self.ledger.text()
    }

    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Successfully pushed {} out of {} entities",
            self.succeeded(),
            self.total
        );
        if self.reauth_events > 0 {
            summary.push_str(&format!(" ({} chunk(s) resent after reauthentication)", self.reauth_events));
        }
        if !self.ledger.is_empty() {
            summary.push_str(".\n");
            summary.push_str(&self.ledger_text());
        }
        summary
    }
}

pub struct SubmissionEngine {
    client: reqwest::Client,
    endpoint: url::Url,
    provider: Arc<dyn CredentialProvider>,
    settings: SubmissionSettings,
}

impl SubmissionEngine {
    /// `store_url` is the tenant API base; the entity endpoint is derived from it.
    pub fn new(store_url: &url::Url, provider: Arc<dyn CredentialProvider>, settings: SubmissionSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: entities_endpoint(store_url, settings.partial_override),
            provider,
            settings,
        }
    }

    pub fn endpoint(&self) -> &url::Url {
        &self.endpoint
    }

    pub async fn submit(
        &self,
        documents: &[Value],
        progress: &dyn ProgressSink,
    ) -> Result<SubmissionReport, SubmissionError> {
        let ranges = chunk_ranges(documents.len(), self.settings.chunk_size);
        let total_chunks = ranges.len();
        let mut report = SubmissionReport {
            total: documents.len(),
            ..Default::default()
        };

        let mut token = self.provider.authenticate().await?;
        info!(
            target: "submission",
            endpoint = %self.endpoint,
            documents = documents.len(),
            chunks = total_chunks,
            "starting submission"
        );

        for (index, range) in ranges.into_iter().enumerate() {
            self.trace_state(index, ChunkState::Pending);
            let body = serde_json::to_string(&documents[range.clone()])
                .map_err(|source| SubmissionError::Serialize { chunk: index, source })?;

            self.trace_state(index, ChunkState::Sent);
            let first_attempt = self.post(&token, &body, self.settings.timeout).await;
            let (response, retried) = match first_attempt {
                Ok(response) => (response, false),
                Err(err) => {
                    self.trace_state(index, ChunkState::TransportFail);
                    warn!(
                        target: "submission",
                        chunk = index,
                        start = range.start,
                        end = range.end,
                        error = %err,
                        pause_secs = self.settings.reauth_pause.as_secs_f64(),
                        "chunk failed, reauthenticating before resend"
                    );
                    report.reauth_events += 1;
                    sleep(self.settings.reauth_pause).await;

                    self.trace_state(index, ChunkState::Reauth);
                    token = match self.provider.authenticate().await {
                        Ok(token) => token,
                        Err(source) => {
                            self.trace_state(index, ChunkState::Fatal);
                            error!(target: "submission", chunk = index, error = %source, "reauthentication failed");
                            return Err(SubmissionError::Reauthentication {
                                chunk: index,
                                completed_chunks: index,
                                source,
                            });
                        }
                    };

                    self.trace_state(index, ChunkState::RetrySent);
                    match self.post(&token, &body, self.settings.retry_timeout).await {
                        Ok(response) => (response, true),
                        Err(source) => {
                            self.trace_state(index, ChunkState::Fatal);
                            error!(target: "submission", chunk = index, error = %source, "resend failed, aborting");
                            return Err(SubmissionError::Transport {
                                chunk: index,
                                start: range.start,
                                end: range.end,
                                completed_chunks: index,
                                source,
                            });
                        }
                    }
                }
            };

            let outcomes: Vec<ItemOutcome> = serde_json::from_str(&response)
                .map_err(|source| SubmissionError::MalformedResponse { chunk: index, source })?;
            if outcomes.len() != range.len() {
                warn!(
                    target: "submission",
                    chunk = index,
                    submitted = range.len(),
                    outcomes = outcomes.len(),
                    "outcome count does not match chunk size"
                );
            }
            let mut failed_items = 0;
            // one outcome per submitted item; extras are ignored, missing ones count as refused
            for offset in 0..range.len() {
                let reason = match outcomes.get(offset) {
                    Some(outcome) if outcome.succeeded() => continue,
                    Some(outcome) => outcome.reason(),
                    None => MISSING_OUTCOME.to_string(),
                };
                failed_items += 1;
                report.ledger.record(PartialPushFailure {
                    chunk: index,
                    start: range.start,
                    end: range.end,
                    item: range.start + offset,
                    reason,
                });
            }
            report.failed += failed_items;
            self.trace_state(index, ChunkState::Ok);
            report.chunks.push(ChunkOutcome {
                index,
                range,
                status: if failed_items == 0 {
                    ChunkStatus::Delivered
                } else {
                    ChunkStatus::Partial
                },
                retried,
                failed_items,
            });

            progress.report(Progress::new(index + 1, total_chunks));
            if index + 1 < total_chunks && !self.settings.pacing.is_zero() {
                sleep(self.settings.pacing).await;
            }
        }

        if total_chunks == 0 {
            progress.report(Progress::new(0, 0));
        }
        info!(
            target: "submission",
            total = report.total,
            failed = report.failed,
            reauth_events = report.reauth_events,
            "submission finished"
        );
        Ok(report)
    }

    async fn post(&self, token: &BearerToken, body: &str, timeout: Duration) -> Result<String, TransportError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(token.secret())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .timeout(timeout)
            .body(body.to_string())
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }

    fn trace_state(&self, chunk: usize, state: ChunkState) {
        debug!(target: "submission", chunk, state = state.as_str(), "chunk state");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_cover_the_input_in_order() {
        let ranges = chunk_ranges(65, 30);
        assert_eq!(ranges, vec![0..30, 30..60, 60..65]);
        assert!(chunk_ranges(0, 30).is_empty());
        assert_eq!(chunk_ranges(3, 0), vec![0..1, 1..2, 2..3]);
    }

    #[test]
    fn chunk_count_is_ceiling_of_len_over_size() {
        for len in 0..100 {
            for size in 1..12 {
                let ranges = chunk_ranges(len, size);
                assert_eq!(ranges.len(), (len + size - 1) / size);
                let rebuilt: Vec<usize> = ranges.iter().cloned().flatten().collect();
                assert_eq!(rebuilt, (0..len).collect::<Vec<_>>());
                if let Some((last, full)) = ranges.split_last() {
                    assert!(full.iter().all(|r| r.len() == size));
                    assert!(last.len() <= size);
                }
            }
        }
    }

    #[test]
    fn endpoint_carries_return_uri_and_partial_override() {
        let base = url::Url::parse("https://store.example/reltio/api/T1/").unwrap();
        assert_eq!(
            entities_endpoint(&base, false).as_str(),
            "https://store.example/reltio/api/T1/entities?returnUriOnly=true"
        );
        assert_eq!(
            entities_endpoint(&base, true).as_str(),
            "https://store.example/reltio/api/T1/entities?returnUriOnly=true&options=partialOverride"
        );
    }

    #[test]
    fn succeeded_never_underflows() {
        let report = SubmissionReport {
            total: 1,
            failed: 2,
            ..Default::default()
        };
        assert_eq!(report.succeeded(), 0);
        assert!(report.summary().starts_with("Successfully pushed 0 out of 1 entities"));
    }

    #[test]
    fn summary_lists_ledger_lines() {
        let mut report = SubmissionReport {
            total: 3,
            failed: 1,
            ..Default::default()
        };
        report.ledger.record(PartialPushFailure {
            chunk: 0,
            start: 0,
            end: 3,
            item: 2,
            reason: NO_GIVEN_REASON.to_string(),
        });
        let summary = report.summary();
        assert!(summary.starts_with("Successfully pushed 2 out of 3 entities"));
        assert!(summary.contains("Bad push batch between 0:3 - Reason: No given reason"));
    }
}
