//! Inventory items, FIFO cost layers and stock movements

pub mod cost;

pub use cost::*;

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::SourceRef;

/// A stocked item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    /// Never negative
    pub quantity_on_hand: BigDecimal,
    pub active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl InventoryItem {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id: Uuid::new_v4(),
            code: code.into(),
            name: name.into(),
            quantity_on_hand: BigDecimal::from(0),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A batch received at one unit cost.
///
/// Layers are consumed strictly in `sequence` order and kept after they are
/// depleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryLayer {
    pub id: Uuid,
    pub item_id: Uuid,
    pub sequence: u64,
    /// Quantity originally received
    pub quantity: BigDecimal,
    pub remaining_quantity: BigDecimal,
    pub unit_cost: BigDecimal,
    pub source: SourceRef,
    pub received_on: NaiveDate,
    pub created_at: NaiveDateTime,
}

impl InventoryLayer {
    pub fn is_untouched(&self) -> bool {
        self.remaining_quantity == self.quantity
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryTxKind {
    Receipt,
    Consumption,
    TransferIn,
    TransferOut,
}

impl InventoryTxKind {
    pub fn is_inbound(&self) -> bool {
        matches!(self, InventoryTxKind::Receipt | InventoryTxKind::TransferIn)
    }
}

/// Quantity drawn from one layer by a consumption
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDraw {
    pub layer_id: Uuid,
    pub quantity: BigDecimal,
    pub unit_cost: BigDecimal,
}

/// A stock movement and, for outbound movements, the exact layers it drew
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryTransaction {
    pub id: Uuid,
    pub item_id: Uuid,
    pub kind: InventoryTxKind,
    /// Positive for inbound movements, negative for outbound ones
    pub quantity: BigDecimal,
    /// Cost at money precision; for outbound movements this is the COGS amount
    pub total_cost: BigDecimal,
    pub source: SourceRef,
    /// Layer created by an inbound movement
    pub layer_id: Option<Uuid>,
    pub draws: Vec<LayerDraw>,
    pub date: NaiveDate,
    pub created_at: NaiveDateTime,
}

/// Result of moving stock between two items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockTransfer {
    pub id: Uuid,
    pub outbound: InventoryTransaction,
    pub inbound: InventoryTransaction,
    /// Weighted average of the drawn layers, unrounded where the money
    /// value of the move depends on it
    pub unit_cost: BigDecimal,
}
