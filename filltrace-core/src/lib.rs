pub mod error;
pub mod event;
pub mod layout;
pub mod metrics;
pub mod pipeline;
pub mod retry;
pub mod rpc;
pub mod sink;
pub mod types;
pub mod utils;
pub mod validation;

pub use error::{FilltraceError, Result};
pub use event::{DecodeResult, DecodeStrategy, DecoderConfig, EventCategory, EventDecoder, PriceBand};
pub use layout::{DiscriminatorTable, Layout, PriceSource};
pub use metrics::RunReport;
pub use pipeline::{FetchPipeline, PaginationCursor, PipelineConfig, RunOutput};
pub use retry::{RetryConfig, RetryScheduler};
pub use rpc::{LedgerClient, RpcLedgerClient, SignatureInfo, TransactionDetail};
pub use sink::ResultSink;
pub use types::{DecodedEvent, EventDetail, RawLogPayload, SkipReason};
pub use utils::{extract_event_from_log, extract_payloads, DropReason, Extraction};
pub use validation::BackfillConfig;
