//! Discriminator lookup table.
//!
//! The byte layout of every payload shape lives here as data rather than in
//! the decoder. Offsets were reconstructed from observed payloads, so the
//! built-in table can be overridden entry by entry from a JSON file without
//! touching decode logic.

use crate::{
    error::{FilltraceError, Result},
    types::{Discriminator, OrderAction, Role, Side, MIN_PAYLOAD_LEN},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where a fill's unit price comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    /// price = quote amount / base amount
    #[default]
    QuoteOverBase,
    /// The quote field already holds the unit price; the quote amount is
    /// derived as price * base.
    QuoteField,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillLayout {
    pub side: Side,
    pub role: Role,
    #[serde(default = "default_order_id_offset")]
    pub order_id_offset: usize,
    #[serde(default = "default_base_offset")]
    pub base_offset: usize,
    #[serde(default = "default_quote_offset")]
    pub quote_offset: usize,
    #[serde(default = "default_fill_min_len")]
    pub min_len: usize,
    #[serde(default)]
    pub price_source: PriceSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeLayout {
    #[serde(default = "default_amount_offset")]
    pub amount_offset: usize,
    #[serde(default = "default_short_min_len")]
    pub min_len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLayout {
    pub action: OrderAction,
    #[serde(default = "default_order_id_offset")]
    pub order_id_offset: usize,
    #[serde(default = "default_short_min_len")]
    pub min_len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Layout {
    Fill(FillLayout),
    Fee(FeeLayout),
    OrderManagement(OrderLayout),
}

impl Layout {
    pub fn min_len(&self) -> usize {
        match self {
            Layout::Fill(l) => l.min_len,
            Layout::Fee(l) => l.min_len,
            Layout::OrderManagement(l) => l.min_len,
        }
    }

    fn u64_offsets(&self) -> Vec<usize> {
        match self {
            Layout::Fill(l) => vec![l.order_id_offset, l.base_offset, l.quote_offset],
            Layout::Fee(l) => vec![l.amount_offset],
            Layout::OrderManagement(l) => vec![l.order_id_offset],
        }
    }

    /// Every u64 field must fit inside the minimum length and must not
    /// overlap the discriminator byte.
    fn validate(&self, discriminator: Discriminator) -> Result<()> {
        if self.min_len() < MIN_PAYLOAD_LEN {
            return Err(FilltraceError::Layout(format!(
                "discriminator 0x{:02x}: min_len {} is below {}",
                discriminator,
                self.min_len(),
                MIN_PAYLOAD_LEN
            )));
        }
        for offset in self.u64_offsets() {
            let fits = offset
                .checked_add(8)
                .is_some_and(|end| end <= self.min_len());
            if offset == 0 || !fits {
                return Err(FilltraceError::Layout(format!(
                    "discriminator 0x{:02x}: field at offset {} does not fit in {} bytes",
                    discriminator,
                    offset,
                    self.min_len()
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct LayoutEntry {
    discriminator: Discriminator,
    #[serde(flatten)]
    layout: Layout,
}

#[derive(Debug, Clone, Deserialize)]
struct LayoutFile {
    entries: Vec<LayoutEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscriminatorTable {
    layouts: BTreeMap<Discriminator, Layout>,
}

impl DiscriminatorTable {
    pub fn new() -> Self {
        Self {
            layouts: BTreeMap::new(),
        }
    }

    /// The layout observed on mainnet payloads.
    pub fn builtin() -> Self {
        let mut table = Self::new();
        for (discriminator, side, role) in [
            (0x12, Side::Long, Role::Taker),
            (0x13, Side::Short, Role::Taker),
            (0x14, Side::Long, Role::Maker),
            (0x15, Side::Short, Role::Maker),
        ] {
            table.layouts.insert(
                discriminator,
                Layout::Fill(FillLayout {
                    side,
                    role,
                    order_id_offset: default_order_id_offset(),
                    base_offset: default_base_offset(),
                    quote_offset: default_quote_offset(),
                    min_len: default_fill_min_len(),
                    price_source: PriceSource::QuoteOverBase,
                }),
            );
        }
        for (discriminator, action) in [(0x10, OrderAction::Placed), (0x11, OrderAction::Cancelled)] {
            table.layouts.insert(
                discriminator,
                Layout::OrderManagement(OrderLayout {
                    action,
                    order_id_offset: default_order_id_offset(),
                    min_len: default_short_min_len(),
                }),
            );
        }
        table.layouts.insert(
            0x17,
            Layout::Fee(FeeLayout {
                amount_offset: default_amount_offset(),
                min_len: default_short_min_len(),
            }),
        );
        table
    }

    /// Load layout overrides from a JSON file
    pub fn load_from_file(&mut self, path: &str) -> Result<usize> {
        let content = std::fs::read_to_string(path)?;
        self.load_from_str(&content)
    }

    /// Overlay entries from a JSON document of the form
    /// `{"entries": [{"discriminator": 18, "kind": "fill", "side": "long", "role": "taker"}]}`.
    ///
    /// Returns the number of entries applied. Nothing is applied if any entry
    /// is invalid.
    pub fn load_from_str(&mut self, json: &str) -> Result<usize> {
        let file: LayoutFile = serde_json::from_str(json)
            .map_err(|e| FilltraceError::Layout(format!("Failed to parse layout JSON: {}", e)))?;

        for entry in &file.entries {
            entry.layout.validate(entry.discriminator)?;
        }

        let count = file.entries.len();
        for entry in file.entries {
            self.layouts.insert(entry.discriminator, entry.layout);
        }
        Ok(count)
    }

    /// Add or replace one entry. The layout is validated like a file entry.
    pub fn insert(&mut self, discriminator: Discriminator, layout: Layout) -> Result<Option<Layout>> {
        layout.validate(discriminator)?;
        Ok(self.layouts.insert(discriminator, layout))
    }

    pub fn remove(&mut self, discriminator: Discriminator) -> Option<Layout> {
        self.layouts.remove(&discriminator)
    }

    pub fn get(&self, discriminator: Discriminator) -> Option<&Layout> {
        self.layouts.get(&discriminator)
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Discriminator, &Layout)> {
        self.layouts.iter()
    }
}

impl Default for DiscriminatorTable {
    fn default() -> Self {
        Self::builtin()
    }
}

fn default_order_id_offset() -> usize {
    8
}

fn default_amount_offset() -> usize {
    8
}

fn default_base_offset() -> usize {
    16
}

fn default_quote_offset() -> usize {
    24
}

fn default_fill_min_len() -> usize {
    40
}

fn default_short_min_len() -> usize {
    MIN_PAYLOAD_LEN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table() {
        let table = DiscriminatorTable::builtin();
        assert_eq!(table.len(), 7);

        match table.get(0x12) {
            Some(Layout::Fill(fill)) => {
                assert_eq!(fill.side, Side::Long);
                assert_eq!(fill.role, Role::Taker);
                assert_eq!(fill.min_len, 40);
            }
            other => panic!("unexpected layout for 0x12: {:?}", other),
        }
        match table.get(0x15) {
            Some(Layout::Fill(fill)) => {
                assert_eq!(fill.side, Side::Short);
                assert_eq!(fill.role, Role::Maker);
            }
            other => panic!("unexpected layout for 0x15: {:?}", other),
        }
        assert!(matches!(table.get(0x17), Some(Layout::Fee(_))));
        assert!(matches!(table.get(0x11), Some(Layout::OrderManagement(_))));
        assert!(table.get(0x99).is_none());
    }

    #[test]
    fn test_load_overrides_from_json() {
        let json = r#"{
            "entries": [
                {"discriminator": 18, "kind": "fill", "side": "short", "role": "maker", "price_source": "quote_field"},
                {"discriminator": 32, "kind": "fee", "amount_offset": 16, "min_len": 24}
            ]
        }"#;

        let mut table = DiscriminatorTable::builtin();
        let applied = table.load_from_str(json).unwrap();
        assert_eq!(applied, 2);
        assert_eq!(table.len(), 8);

        match table.get(0x12) {
            Some(Layout::Fill(fill)) => {
                assert_eq!(fill.side, Side::Short);
                assert_eq!(fill.role, Role::Maker);
                assert_eq!(fill.base_offset, 16);
                assert_eq!(fill.price_source, PriceSource::QuoteField);
            }
            other => panic!("unexpected layout for 0x12: {:?}", other),
        }
        match table.get(0x20) {
            Some(Layout::Fee(fee)) => {
                assert_eq!(fee.amount_offset, 16);
                assert_eq!(fee.min_len, 24);
            }
            other => panic!("unexpected layout for 0x20: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_entry_rejects_whole_file() {
        let json = r#"{
            "entries": [
                {"discriminator": 48, "kind": "order_management", "action": "placed"},
                {"discriminator": 49, "kind": "fee", "amount_offset": 12, "min_len": 16}
            ]
        }"#;

        let mut table = DiscriminatorTable::new();
        let err = table.load_from_str(json).unwrap_err();
        assert!(matches!(err, FilltraceError::Layout(_)));
        assert!(table.is_empty());
    }

    #[test]
    fn test_oversized_offset_is_a_layout_error() {
        let json = format!(
            r#"{{"entries": [{{"discriminator": 32, "kind": "fee", "amount_offset": {}}}]}}"#,
            usize::MAX
        );
        let mut table = DiscriminatorTable::new();
        let err = table.load_from_str(&json).unwrap_err();
        assert!(matches!(err, FilltraceError::Layout(_)));
        assert!(table.is_empty());
    }

    #[test]
    fn test_insert_validates_layout() {
        let mut table = DiscriminatorTable::builtin();
        let bad = Layout::Fee(FeeLayout {
            amount_offset: usize::MAX,
            min_len: MIN_PAYLOAD_LEN,
        });
        assert!(matches!(table.insert(0x20, bad), Err(FilltraceError::Layout(_))));
        assert!(table.get(0x20).is_none());

        let good = Layout::Fee(FeeLayout {
            amount_offset: 16,
            min_len: 24,
        });
        assert!(table.insert(0x20, good).unwrap().is_none());
        assert_eq!(table.len(), 8);
    }

    #[test]
    fn test_malformed_json() {
        let mut table = DiscriminatorTable::new();
        assert!(table.load_from_str("{\"entries\": [{\"kind\": \"fill\"}]}").is_err());
        assert!(table.load_from_str("not json").is_err());
    }
}
