use crate::{error::FilltraceError, types::DecodedEvent, types::SkipReason, utils::DropReason};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Counters collected over one backfill run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Number of signature pages returned by the node (including the final empty one)
    pub pages_fetched: u64,
    /// Pages that could not be fetched after retries
    pub page_failures: u64,
    pub signatures_seen: u64,
    /// Signatures returned again by a later page
    pub duplicate_signatures: u64,
    pub transactions_resolved: u64,
    /// Transactions that failed on-chain; their logs are not decoded
    pub failed_on_chain: u64,
    /// Resolved transactions without a block time
    pub missing_block_time: u64,
    /// Terminal per-signature failures by error kind
    pub transaction_failures: BTreeMap<String, u64>,
    pub failed_signatures: Vec<String>,
    pub payloads_extracted: u64,
    pub extraction_drops: BTreeMap<String, u64>,
    pub decode_skips: BTreeMap<String, u64>,
    pub events_total: u64,
    pub events_by_type: BTreeMap<String, u64>,
    pub retries: u64,
    pub elapsed_ms: u64,
    /// The walk reached the end of the account's history
    pub complete: bool,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a decoded event
    pub fn record_event(&mut self, event: &DecodedEvent) {
        self.events_total += 1;
        *self
            .events_by_type
            .entry(event.detail.type_name().to_string())
            .or_insert(0) += 1;
    }

    pub fn record_skip(&mut self, reason: SkipReason) {
        *self.decode_skips.entry(reason.to_string()).or_insert(0) += 1;
    }

    pub fn record_drop(&mut self, reason: DropReason) {
        *self.extraction_drops.entry(reason.to_string()).or_insert(0) += 1;
    }

    /// Record a signature that could not be resolved
    pub fn record_transaction_failure(&mut self, signature: &str, err: &FilltraceError) {
        *self
            .transaction_failures
            .entry(err.kind().to_string())
            .or_insert(0) += 1;
        self.failed_signatures.push(signature.to_string());
    }

    pub fn skip_count(&self, reason: SkipReason) -> u64 {
        self.decode_skips.get(reason.as_str()).copied().unwrap_or(0)
    }

    pub fn drop_count(&self, reason: DropReason) -> u64 {
        self.extraction_drops.get(reason.as_str()).copied().unwrap_or(0)
    }

    pub fn total_transaction_failures(&self) -> u64 {
        self.transaction_failures.values().sum()
    }

    /// Export as JSON
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    /// Log current run summary
    pub fn log_summary(&self) {
        info!(
            "Run summary: {} events from {} signatures ({} pages, {} transactions resolved, {} retries, {} ms)",
            self.events_total,
            self.signatures_seen,
            self.pages_fetched,
            self.transactions_resolved,
            self.retries,
            self.elapsed_ms
        );
        info!("Events by type: {:?}", self.events_by_type);
        if !self.decode_skips.is_empty() {
            info!("Decode skips: {:?}", self.decode_skips);
        }
        if !self.extraction_drops.is_empty() {
            info!("Extraction drops: {:?}", self.extraction_drops);
        }
        if self.total_transaction_failures() > 0 {
            warn!(
                "{} signatures could not be resolved: {:?}",
                self.total_transaction_failures(),
                self.transaction_failures
            );
            debug!("Failed signatures: {:?}", self.failed_signatures);
        }
        if !self.complete {
            warn!("History walk did not reach the end of the account's history");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventDetail, FeeDetail, TimestampSource};
    use rust_decimal::Decimal;

    fn fee_event() -> DecodedEvent {
        DecodedEvent {
            id: "id".to_string(),
            instrument: "SOL-PERP".to_string(),
            signature: "sig".to_string(),
            slot: 1,
            log_index: 0,
            timestamp: 1_700_000_000,
            timestamp_source: TimestampSource::BlockTime,
            detail: EventDetail::Fee(FeeDetail {
                fee_raw: 1,
                fee: Decimal::new(1, 6),
            }),
            raw: vec![0x17],
        }
    }

    #[test]
    fn test_report_new() {
        let report = RunReport::new();
        assert_eq!(report.events_total, 0);
        assert!(!report.complete);
    }

    #[test]
    fn test_record_counters() {
        let mut report = RunReport::new();
        report.record_event(&fee_event());
        report.record_event(&fee_event());
        report.record_skip(SkipReason::Unrecognized);
        report.record_skip(SkipReason::ImplausiblePrice);
        report.record_skip(SkipReason::Unrecognized);
        report.record_drop(DropReason::InvalidBase64);
        report.record_transaction_failure("sig-a", &FilltraceError::Rpc("boom".to_string()));

        assert_eq!(report.events_total, 2);
        assert_eq!(report.events_by_type.get("Fee"), Some(&2));
        assert_eq!(report.skip_count(SkipReason::Unrecognized), 2);
        assert_eq!(report.skip_count(SkipReason::ImplausiblePrice), 1);
        assert_eq!(report.skip_count(SkipReason::ZeroBase), 0);
        assert_eq!(report.drop_count(DropReason::InvalidBase64), 1);
        assert_eq!(report.total_transaction_failures(), 1);
        assert_eq!(report.failed_signatures, vec!["sig-a".to_string()]);
    }

    #[test]
    fn test_to_json() {
        let mut report = RunReport::new();
        report.record_skip(SkipReason::TooShort);
        report.complete = true;
        let json = report.to_json();
        assert_eq!(json["decode_skips"]["too_short"], 1);
        assert_eq!(json["complete"], true);
    }
}
