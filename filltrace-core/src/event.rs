use crate::{
    layout::{DiscriminatorTable, FeeLayout, FillLayout, Layout, OrderLayout, PriceSource},
    types::{
        generate_event_id, DecodedEvent, EventDetail, FeeDetail, FillDetail, OrderDetail,
        RawLogPayload, SkipReason, TimestampSource, BASE_DECIMALS, MIN_PAYLOAD_LEN,
        QUOTE_DECIMALS,
    },
};
use chrono::{DateTime, Datelike};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub type DecodeResult = std::result::Result<DecodedEvent, SkipReason>;

/// Payloads at least this long carry a 64-bit timestamp in their last 8
/// bytes; shorter ones carry a 32-bit timestamp in their last 4.
const WIDE_TIMESTAMP_LEN: usize = 48;
/// Payloads up to this length are reported as transfers by [`EventDecoder::classify`].
const TRANSFER_MAX_LEN: usize = 24;
const PLAUSIBLE_YEARS: std::ops::RangeInclusive<i32> = 2020..=2030;

/// Turns one raw payload into an event or a skip reason.
///
/// Implementations must be pure: the result depends only on the payload
/// bytes and its block time. The pipeline is generic over this trait so a
/// schema-backed decoder can replace [`EventDecoder`] at construction time.
pub trait DecodeStrategy: Send + Sync {
    fn decode(&self, payload: &RawLogPayload) -> DecodeResult;
}

impl<T: DecodeStrategy + ?Sized> DecodeStrategy for Arc<T> {
    fn decode(&self, payload: &RawLogPayload) -> DecodeResult {
        (**self).decode(payload)
    }
}

impl<T: DecodeStrategy + ?Sized> DecodeStrategy for Box<T> {
    fn decode(&self, payload: &RawLogPayload) -> DecodeResult {
        (**self).decode(payload)
    }
}

/// Exclusive bounds a fill's unit price must fall between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBand {
    pub lower: Decimal,
    pub upper: Decimal,
}

impl PriceBand {
    pub fn new(lower: Decimal, upper: Decimal) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, price: Decimal) -> bool {
        price > self.lower && price < self.upper
    }
}

impl Default for PriceBand {
    fn default() -> Self {
        Self {
            lower: Decimal::ONE,
            upper: Decimal::from(5000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Instrument label stamped on every event (e.g. `SOL-PERP`)
    pub instrument: String,
    pub price_band: PriceBand,
}

impl DecoderConfig {
    pub fn new(instrument: impl Into<String>) -> Self {
        Self {
            instrument: instrument.into(),
            price_band: PriceBand::default(),
        }
    }

    pub fn with_price_band(mut self, price_band: PriceBand) -> Self {
        self.price_band = price_band;
        self
    }
}

/// Coarse category used when a full structural decode is not needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Fill,
    Fee,
    OrderManagement,
    Transfer,
    Unrecognized,
}

/// Table-driven decoder for the program's `Program data:` payloads.
///
/// Payload format:
/// - byte 0: discriminator, resolved through a [`DiscriminatorTable`]
/// - remaining bytes: little-endian fields at the offsets the table names
#[derive(Debug, Clone)]
pub struct EventDecoder {
    table: DiscriminatorTable,
    config: DecoderConfig,
}

impl EventDecoder {
    pub fn new(table: DiscriminatorTable, config: DecoderConfig) -> Self {
        Self { table, config }
    }

    pub fn table(&self) -> &DiscriminatorTable {
        &self.table
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decode a payload from its bytes and the block time of its transaction
    pub fn decode_event(&self, payload: &RawLogPayload) -> DecodeResult {
        let data = payload.data.as_slice();
        if data.len() < MIN_PAYLOAD_LEN {
            return Err(SkipReason::TooShort);
        }

        let layout = self.table.get(data[0]).ok_or(SkipReason::Unrecognized)?;
        if data.len() < layout.min_len() {
            return Err(SkipReason::Unrecognized);
        }

        let (detail, timestamp, timestamp_source) = match layout {
            Layout::Fill(layout) => {
                let fill = self.decode_fill(layout, data)?;
                let (timestamp, source) = resolve_timestamp(data, payload.block_time);
                (EventDetail::Fill(fill), timestamp, source)
            }
            Layout::Fee(layout) => (
                EventDetail::Fee(decode_fee(layout, data)?),
                payload.block_time,
                TimestampSource::BlockTime,
            ),
            Layout::OrderManagement(layout) => (
                EventDetail::OrderManagement(decode_order(layout, data)?),
                payload.block_time,
                TimestampSource::BlockTime,
            ),
        };

        Ok(DecodedEvent {
            id: generate_event_id(&payload.signature, payload.log_index, detail.type_name()),
            instrument: self.config.instrument.clone(),
            signature: payload.signature.clone(),
            slot: payload.slot,
            log_index: payload.log_index,
            timestamp,
            timestamp_source,
            detail,
            raw: payload.data.clone(),
        })
    }

    fn decode_fill(&self, layout: &FillLayout, data: &[u8]) -> Result<FillDetail, SkipReason> {
        let order_id = read_u64(data, layout.order_id_offset)?;
        let base_amount_raw = read_u64(data, layout.base_offset)?;
        let quote_amount_raw = read_u64(data, layout.quote_offset)?;

        if base_amount_raw == 0 {
            return Err(SkipReason::ZeroBase);
        }

        let base_amount = Decimal::from_i128_with_scale(base_amount_raw as i128, BASE_DECIMALS);
        let quote_field = Decimal::from_i128_with_scale(quote_amount_raw as i128, QUOTE_DECIMALS);

        let (mut quote_amount, mut price) = match layout.price_source {
            PriceSource::QuoteOverBase => {
                let price = quote_field
                    .checked_div(base_amount)
                    .ok_or(SkipReason::ImplausiblePrice)?;
                (quote_field, price)
            }
            PriceSource::QuoteField => {
                let quote = quote_field
                    .checked_mul(base_amount)
                    .ok_or(SkipReason::ImplausiblePrice)?;
                (quote, quote_field)
            }
        };
        // Band check runs on the exact quotient, before rounding for output.
        if !self.config.price_band.contains(price) {
            return Err(SkipReason::ImplausiblePrice);
        }

        quote_amount.rescale(QUOTE_DECIMALS);
        price.rescale(QUOTE_DECIMALS);

        Ok(FillDetail {
            side: layout.side,
            role: layout.role,
            action: layout.side.action(),
            order_id,
            base_amount_raw,
            base_amount,
            quote_amount_raw,
            quote_amount,
            price,
        })
    }

    /// Categorize a payload by discriminator and length only.
    pub fn classify(&self, data: &[u8]) -> EventCategory {
        let layout = data.first().and_then(|d| self.table.get(*d));
        match layout {
            Some(layout) if data.len() >= layout.min_len() => match layout {
                Layout::Fill(_) => EventCategory::Fill,
                Layout::Fee(_) => EventCategory::Fee,
                Layout::OrderManagement(_) => EventCategory::OrderManagement,
            },
            _ if !data.is_empty() && data.len() <= TRANSFER_MAX_LEN => EventCategory::Transfer,
            _ => EventCategory::Unrecognized,
        }
    }
}

impl DecodeStrategy for EventDecoder {
    fn decode(&self, payload: &RawLogPayload) -> DecodeResult {
        self.decode_event(payload)
    }
}

fn decode_fee(layout: &FeeLayout, data: &[u8]) -> Result<FeeDetail, SkipReason> {
    let fee_raw = read_u64(data, layout.amount_offset)?;
    Ok(FeeDetail {
        fee_raw,
        fee: Decimal::from_i128_with_scale(fee_raw as i128, QUOTE_DECIMALS),
    })
}

fn decode_order(layout: &OrderLayout, data: &[u8]) -> Result<OrderDetail, SkipReason> {
    Ok(OrderDetail {
        action: layout.action,
        order_id: read_u64(data, layout.order_id_offset)?,
    })
}

fn read_u64(data: &[u8], offset: usize) -> Result<u64, SkipReason> {
    let end = offset.checked_add(8).ok_or(SkipReason::Unrecognized)?;
    data.get(offset..end)
        .and_then(|bytes| <[u8; 8]>::try_from(bytes).ok())
        .map(u64::from_le_bytes)
        .ok_or(SkipReason::Unrecognized)
}

/// Prefer the timestamp embedded at the tail of the payload, falling back to
/// the block time when it is not a plausible calendar date.
fn resolve_timestamp(data: &[u8], block_time: i64) -> (i64, TimestampSource) {
    let len = data.len();
    let embedded = if len >= WIDE_TIMESTAMP_LEN {
        <[u8; 8]>::try_from(&data[len - 8..])
            .ok()
            .map(i64::from_le_bytes)
    } else {
        <[u8; 4]>::try_from(&data[len - 4..])
            .ok()
            .map(|bytes| u32::from_le_bytes(bytes) as i64)
    };

    match embedded {
        Some(ts) if is_plausible_timestamp(ts) => (ts, TimestampSource::Embedded),
        _ => (block_time, TimestampSource::BlockTime),
    }
}

fn is_plausible_timestamp(ts: i64) -> bool {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| PLAUSIBLE_YEARS.contains(&dt.year()))
        .unwrap_or(false)
}
