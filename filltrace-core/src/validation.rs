use crate::{
    error::{FilltraceError, Result},
    event::{DecoderConfig, PriceBand},
    pipeline::{PipelineConfig, MAX_PAGE_SIZE},
    retry::RetryConfig,
};
use rust_decimal::Decimal;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Validate a base58 account or program address
pub fn validate_pubkey(value: &str) -> Result<Pubkey> {
    value.parse::<Pubkey>().map_err(|e| {
        FilltraceError::InvalidConfig(format!("Invalid address '{}': {}", value, e))
    })
}

/// Validate an RPC URL
pub fn validate_rpc_url(rpc_url: &str) -> Result<()> {
    if rpc_url.is_empty() {
        return Err(FilltraceError::InvalidConfig(
            "RPC URL cannot be empty".to_string(),
        ));
    }

    let url = Url::parse(rpc_url).map_err(|e| {
        FilltraceError::InvalidConfig(format!("Invalid RPC URL '{}': {}", rpc_url, e))
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(FilltraceError::InvalidConfig(format!(
            "Invalid RPC URL '{}': must start with http:// or https://",
            rpc_url
        )));
    }

    Ok(())
}

/// Parse a commitment level string
pub fn parse_commitment(commitment: &str) -> Result<CommitmentConfig> {
    match commitment.to_lowercase().as_str() {
        "processed" => Ok(CommitmentConfig::processed()),
        "confirmed" => Ok(CommitmentConfig::confirmed()),
        "finalized" => Ok(CommitmentConfig::finalized()),
        _ => Err(FilltraceError::InvalidConfig(format!(
            "Invalid commitment level '{}': must be one of [\"processed\", \"confirmed\", \"finalized\"]",
            commitment
        ))),
    }
}

/// Validate that a file exists
pub fn validate_file(path: &str) -> Result<()> {
    let path = Path::new(path);

    if !path.is_file() {
        return Err(FilltraceError::InvalidConfig(format!(
            "File does not exist: {}",
            path.display()
        )));
    }

    Ok(())
}

/// Everything a backfill run is configured with
#[derive(Debug, Clone)]
pub struct BackfillConfig {
    pub rpc_url: String,
    pub account: String,
    pub program_id: Option<String>,
    pub instrument: String,
    pub price_lower: Decimal,
    pub price_upper: Decimal,
    pub page_size: usize,
    pub request_delay_ms: u64,
    pub page_delay_ms: u64,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub commitment: String,
    pub max_signatures: Option<u64>,
    pub layout_file: Option<String>,
}

impl BackfillConfig {
    /// Validate all configuration fields
    pub fn validate(&self) -> Result<()> {
        validate_rpc_url(&self.rpc_url)?;
        validate_pubkey(&self.account)?;

        if let Some(program_id) = &self.program_id {
            validate_pubkey(program_id)?;
        }

        if self.instrument.trim().is_empty() {
            return Err(FilltraceError::InvalidConfig(
                "Instrument cannot be empty".to_string(),
            ));
        }

        if self.price_lower >= self.price_upper {
            return Err(FilltraceError::InvalidConfig(format!(
                "Price band lower bound {} must be below upper bound {}",
                self.price_lower, self.price_upper
            )));
        }

        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(FilltraceError::InvalidConfig(format!(
                "Page size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        if self.base_delay_ms > self.max_delay_ms {
            return Err(FilltraceError::InvalidConfig(
                "Base retry delay cannot exceed the maximum retry delay".to_string(),
            ));
        }

        if self.max_signatures == Some(0) {
            return Err(FilltraceError::InvalidConfig(
                "Signature cap must be greater than 0".to_string(),
            ));
        }

        parse_commitment(&self.commitment)?;

        if let Some(layout_file) = &self.layout_file {
            validate_file(layout_file)?;
        }

        Ok(())
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }

    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = PipelineConfig::new(validate_pubkey(&self.account)?);
        config.program_id = self.program_id.clone();
        config.page_size = self.page_size;
        config.request_delay = Duration::from_millis(self.request_delay_ms);
        config.page_delay = Duration::from_millis(self.page_delay_ms);
        config.max_signatures = self.max_signatures;
        config.retry = self.retry_config();
        Ok(config)
    }

    pub fn decoder_config(&self) -> DecoderConfig {
        DecoderConfig::new(self.instrument.clone())
            .with_price_band(PriceBand::new(self.price_lower, self.price_upper))
    }
}
