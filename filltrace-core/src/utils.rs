use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// Marker the runtime puts in front of data emitted with `sol_log_data`
pub const PROGRAM_DATA_PREFIX: &str = "Program data: ";

/// Why a `Program data:` line produced no payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    InvalidBase64,
    EmptyPayload,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::InvalidBase64 => "invalid_base64",
            DropReason::EmptyPayload => "empty_payload",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payloads pulled from one transaction's logs, in log order
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub payloads: Vec<Vec<u8>>,
    pub dropped: Vec<DropReason>,
}

/// Extract event data from a log line.
///
/// Returns `None` for lines without the `Program data: ` marker.
pub fn extract_event_from_log(log: &str) -> Option<Result<Vec<u8>, DropReason>> {
    let data_str = log.strip_prefix(PROGRAM_DATA_PREFIX)?;
    // sol_log_data writes one space-separated base64 chunk per slice
    let mut decoded = Vec::new();
    for chunk in data_str.split_whitespace() {
        if let Err(e) = STANDARD.decode_vec(chunk, &mut decoded) {
            debug!("Dropping undecodable data line: {}", e);
            return Some(Err(DropReason::InvalidBase64));
        }
    }
    if decoded.is_empty() {
        return Some(Err(DropReason::EmptyPayload));
    }
    Some(Ok(decoded))
}

/// Extract every payload from a transaction's log lines.
///
/// With `program_id` set, only data lines emitted while that program is the
/// innermost invocation are kept. The runtime brackets every invocation with
/// `Program <id> invoke [n]` and `Program <id> success|failed`, so a stack of
/// ids is enough to attribute each line.
pub fn extract_payloads(logs: &[String], program_id: Option<&str>) -> Extraction {
    let mut extraction = Extraction::default();
    let mut invocations: Vec<&str> = Vec::new();

    for log in logs {
        if log.starts_with(PROGRAM_DATA_PREFIX) {
            let attributed = match program_id {
                Some(id) => invocations.last() == Some(&id),
                None => true,
            };
            if !attributed {
                continue;
            }
            match extract_event_from_log(log) {
                Some(Ok(data)) => extraction.payloads.push(data),
                Some(Err(reason)) => extraction.dropped.push(reason),
                None => {}
            }
            continue;
        }

        let Some(rest) = log.strip_prefix("Program ") else {
            continue;
        };
        let mut parts = rest.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some(id), Some("invoke")) => invocations.push(id),
            (Some(id), Some(status)) if status == "success" || status.starts_with("failed") => {
                if invocations.last() == Some(&id) {
                    invocations.pop();
                }
            }
            _ => {}
        }
    }

    extraction
}
