use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

pub type Slot = u64;
pub type Discriminator = u8;

/// Base-asset amounts are emitted with 9 implied decimals.
pub const BASE_DECIMALS: u32 = 9;
/// Quote-asset amounts (and fees) are emitted with 6 implied decimals.
pub const QUOTE_DECIMALS: u32 = 6;
/// Nothing shorter than a discriminator word plus one u64 is decodable.
pub const MIN_PAYLOAD_LEN: usize = 16;

/// Bytes taken from one `Program data:` log line, together with the
/// transaction context they were found in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLogPayload {
    pub signature: String,
    pub slot: Slot,
    pub block_time: i64,
    /// Position of the payload among the payloads extracted from its transaction
    pub log_index: usize,
    pub data: Vec<u8>,
}

impl RawLogPayload {
    pub fn discriminator(&self) -> Option<Discriminator> {
        self.data.first().copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn action(self) -> TradeAction {
        match self {
            Side::Long => TradeAction::Buy,
            Side::Short => TradeAction::Sell,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Taker,
    Maker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeAction {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderAction {
    Placed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampSource {
    Embedded,
    BlockTime,
}

/// An executed trade leg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FillDetail {
    pub side: Side,
    pub role: Role,
    pub action: TradeAction,
    #[serde(serialize_with = "display_string")]
    pub order_id: u64,
    #[serde(serialize_with = "display_string")]
    pub base_amount_raw: u64,
    #[serde(serialize_with = "display_string")]
    pub base_amount: Decimal,
    #[serde(serialize_with = "display_string")]
    pub quote_amount_raw: u64,
    #[serde(serialize_with = "display_string")]
    pub quote_amount: Decimal,
    #[serde(serialize_with = "display_string")]
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeeDetail {
    #[serde(serialize_with = "display_string")]
    pub fee_raw: u64,
    #[serde(serialize_with = "display_string")]
    pub fee: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderDetail {
    pub action: OrderAction,
    #[serde(serialize_with = "display_string")]
    pub order_id: u64,
}

/// Variant-specific part of a decoded event. Serialized flat next to the
/// common fields with a `type` tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum EventDetail {
    Fill(FillDetail),
    Fee(FeeDetail),
    OrderManagement(OrderDetail),
}

impl EventDetail {
    pub fn type_name(&self) -> &'static str {
        match self {
            EventDetail::Fill(_) => "Fill",
            EventDetail::Fee(_) => "Fee",
            EventDetail::OrderManagement(_) => "OrderManagement",
        }
    }
}

/// Normalized record produced from one payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedEvent {
    pub id: String,
    pub instrument: String,
    pub signature: String,
    #[serde(serialize_with = "display_string")]
    pub slot: Slot,
    pub log_index: usize,
    pub timestamp: i64,
    pub timestamp_source: TimestampSource,
    #[serde(flatten)]
    pub detail: EventDetail,
    #[serde(rename = "raw_hex", serialize_with = "hex_string")]
    pub raw: Vec<u8>,
}

impl DecodedEvent {
    pub fn fill(&self) -> Option<&FillDetail> {
        match &self.detail {
            EventDetail::Fill(fill) => Some(fill),
            _ => None,
        }
    }

    pub fn fee(&self) -> Option<&FeeDetail> {
        match &self.detail {
            EventDetail::Fee(fee) => Some(fee),
            _ => None,
        }
    }
}

/// Why a payload did not become an event. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    TooShort,
    Unrecognized,
    ZeroBase,
    ImplausiblePrice,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::TooShort => "too_short",
            SkipReason::Unrecognized => "unrecognized",
            SkipReason::ZeroBase => "zero_base",
            SkipReason::ImplausiblePrice => "implausible_price",
        }
    }

    /// Semantic rejections decoded cleanly but failed a plausibility check.
    pub fn is_semantic(&self) -> bool {
        matches!(self, SkipReason::ZeroBase | SkipReason::ImplausiblePrice)
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deterministic event id: same transaction, payload position and type always
/// hash to the same id.
pub fn generate_event_id(signature: &str, log_index: usize, event_type: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}_{}_{}", signature, log_index, event_type));
    hex::encode(hasher.finalize())
}

fn display_string<T: fmt::Display, S: Serializer>(
    value: &T,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

fn hex_string<S: Serializer>(bytes: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(bytes))
}
