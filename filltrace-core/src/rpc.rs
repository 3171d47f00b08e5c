use crate::{
    error::{FilltraceError, Result},
    types::Slot,
};
use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_client::GetConfirmedSignaturesForAddress2Config;
use solana_client::rpc_config::RpcTransactionConfig;
use solana_client::rpc_response::RpcConfirmedTransactionStatusWithSignature;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use solana_transaction_status::{EncodedConfirmedTransactionWithStatusMeta, UiTransactionEncoding};

/// One entry of a `getSignaturesForAddress` page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureInfo {
    pub signature: String,
    pub slot: Slot,
    pub block_time: Option<i64>,
    /// The transaction failed on-chain
    pub failed: bool,
}

impl From<RpcConfirmedTransactionStatusWithSignature> for SignatureInfo {
    fn from(status: RpcConfirmedTransactionStatusWithSignature) -> Self {
        Self {
            signature: status.signature,
            slot: status.slot,
            block_time: status.block_time,
            failed: status.err.is_some(),
        }
    }
}

/// The parts of a resolved transaction the pipeline needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDetail {
    pub signature: String,
    pub slot: Slot,
    pub block_time: Option<i64>,
    pub failed: bool,
    pub log_messages: Vec<String>,
}

impl TransactionDetail {
    pub fn from_encoded(
        signature: &str,
        transaction: EncodedConfirmedTransactionWithStatusMeta,
    ) -> Result<Self> {
        let meta = transaction
            .transaction
            .meta
            .ok_or_else(|| FilltraceError::MissingMetadata(signature.to_string()))?;

        let logs: Option<Vec<String>> = meta.log_messages.into();

        Ok(Self {
            signature: signature.to_string(),
            slot: transaction.slot,
            block_time: transaction.block_time,
            failed: meta.err.is_some(),
            log_messages: logs.unwrap_or_default(),
        })
    }
}

/// Read-only view of the remote ledger.
///
/// Implementations perform exactly one remote call per method and leave
/// retrying to [`crate::RetryScheduler`].
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Up to `limit` signatures involving `address`, newest first, strictly
    /// older than `before` when given.
    async fn signatures_before(
        &self,
        address: &Pubkey,
        before: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>>;

    /// Resolve one signature to its transaction detail
    async fn transaction(&self, signature: &str) -> Result<TransactionDetail>;
}

/// [`LedgerClient`] backed by a Solana JSON-RPC node
pub struct RpcLedgerClient {
    client: RpcClient,
    commitment: CommitmentConfig,
}

impl RpcLedgerClient {
    pub fn new(rpc_url: &str, commitment: CommitmentConfig) -> Self {
        Self {
            client: RpcClient::new_with_commitment(rpc_url.to_string(), commitment),
            commitment,
        }
    }
}

fn parse_signature(signature: &str) -> Result<Signature> {
    signature
        .parse::<Signature>()
        .map_err(|_| FilltraceError::InvalidSignature(signature.to_string()))
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
    async fn signatures_before(
        &self,
        address: &Pubkey,
        before: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>> {
        let config = GetConfirmedSignaturesForAddress2Config {
            before: before.map(parse_signature).transpose()?,
            until: None,
            limit: Some(limit),
            commitment: Some(self.commitment),
        };

        let statuses = self
            .client
            .get_signatures_for_address_with_config(address, config)
            .await
            .map_err(|e| FilltraceError::from_rpc_message(e.to_string()))?;

        Ok(statuses.into_iter().map(SignatureInfo::from).collect())
    }

    async fn transaction(&self, signature: &str) -> Result<TransactionDetail> {
        let sig = parse_signature(signature)?;

        let transaction = self
            .client
            .get_transaction_with_config(
                &sig,
                RpcTransactionConfig {
                    encoding: Some(UiTransactionEncoding::Json),
                    commitment: Some(self.commitment),
                    max_supported_transaction_version: Some(0),
                },
            )
            .await
            .map_err(|e| FilltraceError::from_rpc_message(e.to_string()))?;

        TransactionDetail::from_encoded(signature, transaction)
    }
}
