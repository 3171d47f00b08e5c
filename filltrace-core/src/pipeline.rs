//! Backward walk over an account's signature history.
//!
//! Pages of signatures are requested newest first. Each signature is resolved
//! on its own, one call at a time, and its logs are run through the extractor
//! and the decoder. Only the first page is allowed to fail the run.

use crate::{
    error::Result,
    event::DecodeStrategy,
    metrics::RunReport,
    retry::{RetryConfig, RetryScheduler},
    rpc::{LedgerClient, SignatureInfo, TransactionDetail},
    sink::ResultSink,
    types::RawLogPayload,
    utils::extract_payloads,
};
use solana_sdk::pubkey::Pubkey;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Largest page `getSignaturesForAddress` serves
pub const MAX_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Account whose history is walked
    pub account: Pubkey,
    /// Only decode data emitted by this program, when set
    pub program_id: Option<String>,
    pub page_size: usize,
    /// Minimum pause between two transaction resolutions
    pub request_delay: Duration,
    /// Minimum pause between two page requests
    pub page_delay: Duration,
    /// Stop after this many signatures
    pub max_signatures: Option<u64>,
    pub retry: RetryConfig,
}

impl PipelineConfig {
    pub fn new(account: Pubkey) -> Self {
        Self {
            account,
            program_id: None,
            page_size: 100,
            request_delay: Duration::from_millis(200),
            page_delay: Duration::from_millis(1000),
            max_signatures: None,
            retry: RetryConfig::default(),
        }
    }
}

/// Exclusive upper bound for the next page request.
///
/// A signature is accepted as cursor at most once, so a node that keeps
/// returning the same page cannot make the walk loop forever.
#[derive(Debug, Default)]
pub struct PaginationCursor {
    before: Option<String>,
    used: HashSet<String>,
}

impl PaginationCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&str> {
        self.before.as_deref()
    }

    /// Move the cursor to `oldest`. Returns `false`, leaving the cursor
    /// unchanged, if `oldest` has already been used.
    pub fn advance(&mut self, oldest: &str) -> bool {
        if !self.used.insert(oldest.to_string()) {
            return false;
        }
        self.before = Some(oldest.to_string());
        true
    }
}

/// Everything a run produced
#[derive(Debug)]
pub struct RunOutput {
    pub sink: ResultSink,
    pub report: RunReport,
}

pub struct FetchPipeline<C, D> {
    client: C,
    decoder: D,
    retry: RetryScheduler,
    config: PipelineConfig,
}

impl<C: LedgerClient, D: DecodeStrategy> FetchPipeline<C, D> {
    pub fn new(client: C, decoder: D, config: PipelineConfig) -> Self {
        Self {
            client,
            decoder,
            retry: RetryScheduler::new(config.retry),
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Walk the full history of the configured account.
    ///
    /// Fails only when the very first page cannot be fetched; every other
    /// failure is counted in the returned report.
    pub async fn run(&self) -> Result<RunOutput> {
        let started = Instant::now();
        let retries_before = self.retry.total_retries();
        let page_size = self.config.page_size.clamp(1, MAX_PAGE_SIZE);

        let mut sink = ResultSink::new();
        let mut report = RunReport::new();
        let mut cursor = PaginationCursor::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut resolved_any = false;

        info!("Walking history of {} ({} signatures per page)", self.config.account, page_size);

        'pages: loop {
            if self.cap_reached(&report) {
                break;
            }
            if report.pages_fetched > 0 {
                sleep(self.config.page_delay).await;
            }

            let page = self
                .retry
                .run("getSignaturesForAddress", || {
                    self.client
                        .signatures_before(&self.config.account, cursor.current(), page_size)
                })
                .await;

            let page = match page {
                Ok(page) => page,
                Err(e) if report.pages_fetched == 0 => {
                    error!("Failed to fetch first signature page: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        "Failed to fetch page before {:?}: {}. Stopping walk",
                        cursor.current(),
                        e
                    );
                    report.page_failures += 1;
                    break;
                }
            };
            report.pages_fetched += 1;

            let Some(oldest) = page.last().map(|info| info.signature.clone()) else {
                info!("Reached end of history after {} pages", report.pages_fetched);
                report.complete = true;
                break;
            };
            info!(
                "Page {}: {} signatures (before {:?})",
                report.pages_fetched,
                page.len(),
                cursor.current()
            );

            for info in &page {
                if self.cap_reached(&report) {
                    break 'pages;
                }
                report.signatures_seen += 1;

                if !seen.insert(info.signature.clone()) {
                    debug!("Signature {} already processed, skipping", info.signature);
                    report.duplicate_signatures += 1;
                    continue;
                }
                if info.failed {
                    debug!("Skipping failed transaction {}", info.signature);
                    report.failed_on_chain += 1;
                    continue;
                }

                if resolved_any {
                    sleep(self.config.request_delay).await;
                }
                resolved_any = true;

                let transaction = self
                    .retry
                    .run("getTransaction", || self.client.transaction(&info.signature))
                    .await;

                match transaction {
                    Ok(transaction) => {
                        self.process_transaction(transaction, info, &mut sink, &mut report)
                    }
                    Err(e) => {
                        warn!("Failed to fetch transaction {}: {}", info.signature, e);
                        report.record_transaction_failure(&info.signature, &e);
                    }
                }
            }

            if !cursor.advance(&oldest) {
                warn!("Cursor {} was already used, stopping walk", oldest);
                break;
            }
        }

        report.retries = self.retry.total_retries() - retries_before;
        report.elapsed_ms = started.elapsed().as_millis() as u64;
        report.log_summary();

        Ok(RunOutput { sink, report })
    }

    fn cap_reached(&self, report: &RunReport) -> bool {
        match self.config.max_signatures {
            Some(max) if report.signatures_seen >= max => {
                info!("Reached signature cap of {}", max);
                true
            }
            _ => false,
        }
    }

    /// Extract and decode every payload of one resolved transaction
    fn process_transaction(
        &self,
        transaction: TransactionDetail,
        info: &SignatureInfo,
        sink: &mut ResultSink,
        report: &mut RunReport,
    ) {
        report.transactions_resolved += 1;

        if transaction.failed {
            debug!("Skipping failed transaction: {}", transaction.signature);
            report.failed_on_chain += 1;
            return;
        }

        let block_time = match transaction.block_time.or(info.block_time) {
            Some(block_time) => block_time,
            None => {
                warn!("Transaction {} has no block time", transaction.signature);
                report.missing_block_time += 1;
                0
            }
        };

        let extraction = extract_payloads(&transaction.log_messages, self.config.program_id.as_deref());
        for reason in extraction.dropped {
            report.record_drop(reason);
        }

        for (log_index, data) in extraction.payloads.into_iter().enumerate() {
            report.payloads_extracted += 1;
            let payload = RawLogPayload {
                signature: transaction.signature.clone(),
                slot: transaction.slot,
                block_time,
                log_index,
                data,
            };

            match self.decoder.decode(&payload) {
                Ok(event) => {
                    debug!("Decoded {} from {}", event.detail.type_name(), event.signature);
                    report.record_event(&event);
                    sink.append(event);
                }
                Err(reason) => {
                    debug!(
                        "Skipped payload {} of {}: {}",
                        log_index, transaction.signature, reason
                    );
                    report.record_skip(reason);
                }
            }
        }
    }
}
