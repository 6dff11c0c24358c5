//! FIFO inventory costing

use bigdecimal::{BigDecimal, RoundingMode};
use chrono::NaiveDate;
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

use super::*;
use crate::config::Precision;
use crate::traits::*;
use crate::types::*;

const LAYER_SEQUENCE: &str = "inventory_layer";

/// Per-item FIFO lot tracking.
///
/// Stateless apart from its precision; every method works inside the
/// caller's unit of work.
#[derive(Debug, Clone, Copy)]
pub struct InventoryCostEngine {
    precision: Precision,
}

impl InventoryCostEngine {
    pub fn new(precision: Precision) -> Self {
        Self { precision }
    }

    pub async fn create_item<T: LedgerTx + ?Sized>(
        &self,
        tx: &mut T,
        code: &str,
        name: &str,
    ) -> LedgerResult<InventoryItem> {
        if code.trim().is_empty() {
            return Err(LedgerError::validation("Item code cannot be empty"));
        }
        if name.trim().is_empty() {
            return Err(LedgerError::validation("Item name cannot be empty"));
        }
        if tx.find_item_by_code(code).await?.is_some() {
            return Err(LedgerError::Validation(format!(
                "Item with code '{}' already exists",
                code
            )));
        }

        let item = InventoryItem::new(code, name);
        tx.insert_item(&item).await?;
        Ok(item)
    }

    pub async fn item<T: LedgerTx + ?Sized>(
        &self,
        tx: &T,
        item_id: Uuid,
    ) -> LedgerResult<InventoryItem> {
        tx.get_item(item_id)
            .await?
            .ok_or_else(|| LedgerError::ItemNotFound(item_id.to_string()))
    }

    /// Stop an item from receiving or issuing stock. Reversals of earlier
    /// movements still apply.
    pub async fn deactivate_item<T: LedgerTx + ?Sized>(
        &self,
        tx: &mut T,
        item_id: Uuid,
    ) -> LedgerResult<InventoryItem> {
        let mut item = self.item(tx, item_id).await?;
        if !item.active {
            return Err(LedgerError::Validation(format!(
                "Item {} is already inactive",
                item.code
            )));
        }
        item.active = false;
        item.updated_at = chrono::Utc::now().naive_utc();
        tx.update_item(&item).await?;
        Ok(item)
    }

    /// Add a new layer after all existing ones and increase on-hand quantity
    pub async fn receive_stock<T: LedgerTx + ?Sized>(
        &self,
        tx: &mut T,
        item_id: Uuid,
        quantity: &BigDecimal,
        unit_cost: &BigDecimal,
        source: SourceRef,
        date: NaiveDate,
    ) -> LedgerResult<InventoryTransaction> {
        if *unit_cost < BigDecimal::from(0) {
            return Err(LedgerError::validation("Unit cost cannot be negative"));
        }
        let unit_cost = self.precision.unit_cost(unit_cost);
        self.receive(tx, item_id, quantity, &unit_cost, source, date, InventoryTxKind::Receipt)
            .await
    }

    /// Draw `quantity` oldest-first and return the consumption record.
    ///
    /// The record's `total_cost` is the COGS amount to post.
    pub async fn consume_stock<T: LedgerTx + ?Sized>(
        &self,
        tx: &mut T,
        item_id: Uuid,
        quantity: &BigDecimal,
        source: SourceRef,
        date: NaiveDate,
    ) -> LedgerResult<InventoryTransaction> {
        self.consume(tx, item_id, quantity, source, date, InventoryTxKind::Consumption)
            .await
    }

    /// Put back exactly the recorded draws. FIFO selection is not re-run.
    pub async fn reverse_consumption<T: LedgerTx + ?Sized>(
        &self,
        tx: &mut T,
        record: &InventoryTransaction,
    ) -> LedgerResult<()> {
        if record.kind.is_inbound() {
            return Err(LedgerError::Validation(format!(
                "Inventory transaction {} is not a consumption",
                record.id
            )));
        }

        for draw in &record.draws {
            let mut layer = tx.get_layer(draw.layer_id).await?.ok_or_else(|| {
                LedgerError::Storage(format!(
                    "Layer {} drawn by {} no longer exists",
                    draw.layer_id, record.id
                ))
            })?;
            layer.remaining_quantity += &draw.quantity;
            if layer.remaining_quantity > layer.quantity {
                return Err(LedgerError::Storage(format!(
                    "Restoring {} would overfill layer {}",
                    record.id, layer.id
                )));
            }
            tx.update_layer(&layer).await?;
        }

        let mut item = self.item(tx, record.item_id).await?;
        item.quantity_on_hand -= &record.quantity;
        item.updated_at = chrono::Utc::now().naive_utc();
        tx.update_item(&item).await?;
        tx.delete_inventory_transaction(record.id).await?;

        debug!(item = %item.code, record = %record.id, "consumption reversed");
        Ok(())
    }

    /// Remove the layer an inbound movement created.
    ///
    /// Fails with `DependencyExists` once anything has drawn from the layer.
    pub async fn reverse_receipt<T: LedgerTx + ?Sized>(
        &self,
        tx: &mut T,
        record: &InventoryTransaction,
    ) -> LedgerResult<()> {
        let layer_id = match (record.kind.is_inbound(), record.layer_id) {
            (true, Some(layer_id)) => layer_id,
            _ => {
                return Err(LedgerError::Validation(format!(
                    "Inventory transaction {} is not a receipt",
                    record.id
                )))
            }
        };

        let layer = tx.get_layer(layer_id).await?.ok_or_else(|| {
            LedgerError::Storage(format!("Layer {} of {} is missing", layer_id, record.id))
        })?;
        if !layer.is_untouched() {
            let consumers = self.consumers_of(tx, record.item_id, &[layer_id]).await?;
            return Err(LedgerError::DependencyExists(describe_consumers(
                &record.source,
                &consumers,
            )));
        }

        let mut item = self.item(tx, record.item_id).await?;
        if item.quantity_on_hand < layer.quantity {
            return Err(LedgerError::Storage(format!(
                "Item {} holds less than layer {}",
                item.code, layer.id
            )));
        }
        item.quantity_on_hand -= &layer.quantity;
        item.updated_at = chrono::Utc::now().naive_utc();
        tx.update_item(&item).await?;
        tx.delete_layer(layer_id).await?;
        tx.delete_inventory_transaction(record.id).await?;

        debug!(item = %item.code, layer = %layer_id, "receipt reversed");
        Ok(())
    }

    /// Sources of outbound movements that drew from any of `layer_ids`
    pub async fn consumers_of<T: LedgerTx + ?Sized>(
        &self,
        tx: &T,
        item_id: Uuid,
        layer_ids: &[Uuid],
    ) -> LedgerResult<Vec<SourceRef>> {
        let wanted: HashSet<&Uuid> = layer_ids.iter().collect();
        let mut consumers = Vec::new();
        for record in tx.inventory_transactions_for_item(item_id).await? {
            let drew = record.draws.iter().any(|d| wanted.contains(&d.layer_id));
            if drew && !consumers.contains(&record.source) {
                consumers.push(record.source);
            }
        }
        Ok(consumers)
    }

    /// Move stock from one item to another at the weighted-average cost of
    /// the layers actually drawn.
    ///
    /// The target layer's unit cost keeps as many places as it takes for the
    /// moved value to round to the same money amount as the drawn value, so
    /// a transfer never changes total stock value.
    pub async fn transfer_stock<T: LedgerTx + ?Sized>(
        &self,
        tx: &mut T,
        source_item: Uuid,
        target_item: Uuid,
        quantity: &BigDecimal,
        date: NaiveDate,
    ) -> LedgerResult<StockTransfer> {
        if source_item == target_item {
            return Err(LedgerError::validation(
                "Cannot transfer stock onto the same item",
            ));
        }
        // fail before drawing anything
        self.active_item(tx, target_item).await?;

        let id = Uuid::new_v4();
        let source = SourceRef::transfer(id);
        let outbound = self
            .consume(tx, source_item, quantity, source, date, InventoryTxKind::TransferOut)
            .await?;

        let moved = -outbound.quantity.clone();
        let drawn_cost: BigDecimal = outbound
            .draws
            .iter()
            .map(|d| &d.quantity * &d.unit_cost)
            .sum();
        let unit_cost = self.transfer_unit_cost(&drawn_cost, &moved);

        let inbound = self
            .receive(tx, target_item, &moved, &unit_cost, source, date, InventoryTxKind::TransferIn)
            .await?;

        Ok(StockTransfer {
            id,
            outbound,
            inbound,
            unit_cost,
        })
    }

    /// Undo a transfer: remove the target layer, then put the drawn
    /// quantities back on the source layers.
    ///
    /// Fails with `DependencyExists` once anything has drawn from the
    /// target layer.
    pub async fn reverse_transfer<T: LedgerTx + ?Sized>(
        &self,
        tx: &mut T,
        transfer_id: Uuid,
    ) -> LedgerResult<()> {
        let source = SourceRef::transfer(transfer_id);
        let records = tx.inventory_transactions_for_source(&source).await?;
        let inbound = records
            .iter()
            .find(|r| r.kind == InventoryTxKind::TransferIn);
        let outbound = records
            .iter()
            .find(|r| r.kind == InventoryTxKind::TransferOut);
        let (Some(inbound), Some(outbound)) = (inbound, outbound) else {
            return Err(LedgerError::Validation(format!(
                "Stock transfer {} does not exist",
                transfer_id
            )));
        };

        self.reverse_receipt(tx, inbound).await?;
        self.reverse_consumption(tx, outbound).await?;

        debug!(transfer = %transfer_id, "stock transfer reversed");
        Ok(())
    }

    /// Value of the remaining layers at money precision
    pub async fn valuation<T: LedgerTx + ?Sized>(
        &self,
        tx: &T,
        item_id: Uuid,
    ) -> LedgerResult<BigDecimal> {
        self.item(tx, item_id).await?;
        let value: BigDecimal = tx
            .layers_for_item(item_id)
            .await?
            .iter()
            .map(|l| &l.remaining_quantity * &l.unit_cost)
            .sum();
        Ok(self.precision.money(&value))
    }

    #[allow(clippy::too_many_arguments)]
    async fn receive<T: LedgerTx + ?Sized>(
        &self,
        tx: &mut T,
        item_id: Uuid,
        quantity: &BigDecimal,
        unit_cost: &BigDecimal,
        source: SourceRef,
        date: NaiveDate,
        kind: InventoryTxKind,
    ) -> LedgerResult<InventoryTransaction> {
        let quantity = self.positive_quantity(quantity)?;
        let mut item = self.active_item(tx, item_id).await?;

        let now = chrono::Utc::now().naive_utc();
        let layer = InventoryLayer {
            id: Uuid::new_v4(),
            item_id,
            sequence: tx.next_sequence(LAYER_SEQUENCE).await?,
            quantity: quantity.clone(),
            remaining_quantity: quantity.clone(),
            unit_cost: unit_cost.clone(),
            source,
            received_on: date,
            created_at: now,
        };
        tx.insert_layer(&layer).await?;

        item.quantity_on_hand += &quantity;
        item.updated_at = now;
        tx.update_item(&item).await?;

        let record = InventoryTransaction {
            id: Uuid::new_v4(),
            item_id,
            kind,
            total_cost: self.precision.money(&(&quantity * unit_cost)),
            quantity,
            source,
            layer_id: Some(layer.id),
            draws: Vec::new(),
            date,
            created_at: now,
        };
        tx.insert_inventory_transaction(&record).await?;

        debug!(
            item = %item.code,
            layer = %layer.id,
            sequence = layer.sequence,
            quantity = %record.quantity,
            unit_cost = %layer.unit_cost,
            "layer received"
        );
        Ok(record)
    }

    async fn consume<T: LedgerTx + ?Sized>(
        &self,
        tx: &mut T,
        item_id: Uuid,
        quantity: &BigDecimal,
        source: SourceRef,
        date: NaiveDate,
        kind: InventoryTxKind,
    ) -> LedgerResult<InventoryTransaction> {
        let quantity = self.positive_quantity(quantity)?;
        let mut item = self.active_item(tx, item_id).await?;
        if item.quantity_on_hand < quantity {
            return Err(LedgerError::InsufficientStock {
                item: item.code.clone(),
                requested: quantity,
                available: item.quantity_on_hand.clone(),
            });
        }

        let zero = BigDecimal::from(0);
        let mut still_needed = quantity.clone();
        let mut draws = Vec::new();
        let mut raw_cost = BigDecimal::from(0);

        for mut layer in tx.layers_for_item(item_id).await? {
            if still_needed <= zero {
                break;
            }
            if layer.remaining_quantity <= zero {
                continue;
            }

            let drawn = std::cmp::min(layer.remaining_quantity.clone(), still_needed.clone());
            layer.remaining_quantity -= &drawn;
            still_needed -= &drawn;
            raw_cost += &drawn * &layer.unit_cost;
            tx.update_layer(&layer).await?;

            debug!(
                item = %item.code,
                layer = %layer.id,
                drawn = %drawn,
                unit_cost = %layer.unit_cost,
                "layer drawn"
            );
            draws.push(LayerDraw {
                layer_id: layer.id,
                quantity: drawn,
                unit_cost: layer.unit_cost.clone(),
            });
        }

        if still_needed > zero {
            // on-hand said yes but the layers disagree
            return Err(LedgerError::InsufficientStock {
                item: item.code.clone(),
                requested: quantity.clone(),
                available: &quantity - &still_needed,
            });
        }

        let now = chrono::Utc::now().naive_utc();
        item.quantity_on_hand -= &quantity;
        item.updated_at = now;
        tx.update_item(&item).await?;

        let record = InventoryTransaction {
            id: Uuid::new_v4(),
            item_id,
            kind,
            quantity: -quantity,
            total_cost: self.precision.money(&raw_cost),
            source,
            layer_id: None,
            draws,
            date,
            created_at: now,
        };
        tx.insert_inventory_transaction(&record).await?;
        Ok(record)
    }

    async fn active_item<T: LedgerTx + ?Sized>(
        &self,
        tx: &T,
        item_id: Uuid,
    ) -> LedgerResult<InventoryItem> {
        let item = self.item(tx, item_id).await?;
        if !item.active {
            return Err(LedgerError::Validation(format!(
                "Item {} is inactive",
                item.code
            )));
        }
        Ok(item)
    }

    /// Weighted average rounded up at a scale fine enough that
    /// `money(moved * average) == money(drawn_cost)`.
    ///
    /// Rounding up keeps the product at or above the drawn cost, and the
    /// chosen scale keeps it below the next step of the drawn cost's own
    /// grid, so no half-cent boundary can fall in between.
    fn transfer_unit_cost(&self, drawn_cost: &BigDecimal, moved: &BigDecimal) -> BigDecimal {
        let (_, cost_scale) = drawn_cost.as_bigint_and_exponent();
        let grid = cost_scale.max(self.precision.money_scale + 1);
        let scale = grid + moved.digits() as i64 + 1;
        (drawn_cost / moved)
            .with_scale_round(scale, RoundingMode::Up)
            .normalized()
    }

    fn positive_quantity(&self, quantity: &BigDecimal) -> LedgerResult<BigDecimal> {
        let quantity = self.precision.quantity(quantity);
        if quantity <= BigDecimal::from(0) {
            return Err(LedgerError::validation("Quantity must be positive"));
        }
        Ok(quantity)
    }
}

pub(crate) fn describe_consumers(owner: &SourceRef, consumers: &[SourceRef]) -> String {
    let names: Vec<String> = consumers.iter().map(|c| c.to_string()).collect();
    format!(
        "stock received by {} was consumed by [{}]",
        owner,
        names.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_storage::MemoryStore;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    fn purchase(n: u8) -> SourceRef {
        SourceRef::document(DocumentKind::PurchaseInvoice, Uuid::from_u128(n as u128))
    }

    fn sale(n: u8) -> SourceRef {
        SourceRef::document(DocumentKind::SalesInvoice, Uuid::from_u128(1000 + n as u128))
    }

    #[tokio::test]
    async fn test_fifo_draws_oldest_layer_first() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let engine = InventoryCostEngine::new(Precision::default());
        let item = engine.create_item(&mut tx, "X", "Widget").await.unwrap();

        engine
            .receive_stock(&mut tx, item.id, &dec("10"), &dec("100"), purchase(1), day())
            .await
            .unwrap();
        engine
            .receive_stock(&mut tx, item.id, &dec("5"), &dec("120"), purchase(2), day())
            .await
            .unwrap();

        let record = engine
            .consume_stock(&mut tx, item.id, &dec("12"), sale(1), day())
            .await
            .unwrap();

        assert_eq!(record.total_cost, dec("1240"));
        assert_eq!(record.draws.len(), 2);
        assert_eq!(record.draws[0].quantity, dec("10"));
        assert_eq!(record.draws[1].quantity, dec("2"));

        let layers = tx.layers_for_item(item.id).await.unwrap();
        assert_eq!(layers[0].remaining_quantity, dec("0"));
        assert_eq!(layers[1].remaining_quantity, dec("3"));
        assert_eq!(layers[1].unit_cost, dec("120"));

        let item = engine.item(&tx, item.id).await.unwrap();
        assert_eq!(item.quantity_on_hand, dec("3"));
        assert_eq!(engine.valuation(&tx, item.id).await.unwrap(), dec("360"));
    }

    #[tokio::test]
    async fn test_receive_consume_reverse_restores_state() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let engine = InventoryCostEngine::new(Precision::default());
        let item = engine.create_item(&mut tx, "X", "Widget").await.unwrap();

        engine
            .receive_stock(&mut tx, item.id, &dec("10"), &dec("100"), purchase(1), day())
            .await
            .unwrap();
        let before = tx.layers_for_item(item.id).await.unwrap();

        let record = engine
            .consume_stock(&mut tx, item.id, &dec("10"), sale(1), day())
            .await
            .unwrap();
        assert_eq!(
            engine.item(&tx, item.id).await.unwrap().quantity_on_hand,
            dec("0")
        );

        engine.reverse_consumption(&mut tx, &record).await.unwrap();

        assert_eq!(tx.layers_for_item(item.id).await.unwrap(), before);
        assert_eq!(
            engine.item(&tx, item.id).await.unwrap().quantity_on_hand,
            dec("10")
        );
        assert!(tx
            .inventory_transactions_for_source(&sale(1))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_reversal_restores_recorded_layers_not_current_fifo() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let engine = InventoryCostEngine::new(Precision::default());
        let item = engine.create_item(&mut tx, "X", "Widget").await.unwrap();

        engine
            .receive_stock(&mut tx, item.id, &dec("4"), &dec("10"), purchase(1), day())
            .await
            .unwrap();
        engine
            .receive_stock(&mut tx, item.id, &dec("4"), &dec("20"), purchase(2), day())
            .await
            .unwrap();

        let first = engine
            .consume_stock(&mut tx, item.id, &dec("3"), sale(1), day())
            .await
            .unwrap();
        let second = engine
            .consume_stock(&mut tx, item.id, &dec("3"), sale(2), day())
            .await
            .unwrap();
        assert_eq!(second.total_cost, dec("50"));

        // undoing the first sale must refill the first layer only
        engine.reverse_consumption(&mut tx, &first).await.unwrap();

        let layers = tx.layers_for_item(item.id).await.unwrap();
        assert_eq!(layers[0].remaining_quantity, dec("3"));
        assert_eq!(layers[1].remaining_quantity, dec("2"));
    }

    #[tokio::test]
    async fn test_insufficient_stock_is_rejected() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let engine = InventoryCostEngine::new(Precision::default());
        let item = engine.create_item(&mut tx, "X", "Widget").await.unwrap();

        engine
            .receive_stock(&mut tx, item.id, &dec("2"), &dec("5"), purchase(1), day())
            .await
            .unwrap();

        let err = engine
            .consume_stock(&mut tx, item.id, &dec("2.5"), sale(1), day())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientStock { .. }));

        let layers = tx.layers_for_item(item.id).await.unwrap();
        assert_eq!(layers[0].remaining_quantity, dec("2"));
    }

    #[tokio::test]
    async fn test_fractional_quantities_round_cost_once() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let engine = InventoryCostEngine::new(Precision::default());
        let item = engine.create_item(&mut tx, "FLOUR", "Flour (kg)").await.unwrap();

        engine
            .receive_stock(&mut tx, item.id, &dec("1.5"), &dec("3.333"), purchase(1), day())
            .await
            .unwrap();
        engine
            .receive_stock(&mut tx, item.id, &dec("1"), &dec("3.337"), purchase(2), day())
            .await
            .unwrap();

        let record = engine
            .consume_stock(&mut tx, item.id, &dec("2.125"), sale(1), day())
            .await
            .unwrap();

        // 1.5 * 3.333 + 0.625 * 3.337 = 4.9995 + 2.085625 = 7.085125
        assert_eq!(record.total_cost, dec("7.09"));
    }

    #[tokio::test]
    async fn test_transfer_uses_weighted_average_of_draws() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let engine = InventoryCostEngine::new(Precision::default());
        let main = engine.create_item(&mut tx, "X-MAIN", "Widget @ main").await.unwrap();
        let shop = engine.create_item(&mut tx, "X-SHOP", "Widget @ shop").await.unwrap();

        engine
            .receive_stock(&mut tx, main.id, &dec("10"), &dec("100"), purchase(1), day())
            .await
            .unwrap();
        engine
            .receive_stock(&mut tx, main.id, &dec("5"), &dec("120"), purchase(2), day())
            .await
            .unwrap();

        let transfer = engine
            .transfer_stock(&mut tx, main.id, shop.id, &dec("12"), day())
            .await
            .unwrap();

        assert_eq!(transfer.outbound.total_cost, dec("1240"));
        assert_eq!(transfer.inbound.total_cost, dec("1240"));
        assert_eq!(
            Precision::default().unit_cost(&transfer.unit_cost),
            dec("103.3333")
        );
        assert_eq!(engine.valuation(&tx, shop.id).await.unwrap(), dec("1240"));

        let shop_layers = tx.layers_for_item(shop.id).await.unwrap();
        assert_eq!(shop_layers.len(), 1);
        assert_eq!(shop_layers[0].quantity, dec("12"));
        assert_eq!(
            engine.item(&tx, shop.id).await.unwrap().quantity_on_hand,
            dec("12")
        );
        assert_eq!(
            engine.item(&tx, main.id).await.unwrap().quantity_on_hand,
            dec("3")
        );
    }

    #[tokio::test]
    async fn test_transfer_keeps_value_when_average_needs_more_places() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let engine = InventoryCostEngine::new(Precision::default());
        let main = engine.create_item(&mut tx, "X-MAIN", "Widget @ main").await.unwrap();
        let shop = engine.create_item(&mut tx, "X-SHOP", "Widget @ shop").await.unwrap();

        engine
            .receive_stock(&mut tx, main.id, &dec("999"), &dec("1"), purchase(1), day())
            .await
            .unwrap();
        engine
            .receive_stock(&mut tx, main.id, &dec("1"), &dec("1.01"), purchase(2), day())
            .await
            .unwrap();

        let transfer = engine
            .transfer_stock(&mut tx, main.id, shop.id, &dec("1000"), day())
            .await
            .unwrap();

        assert_eq!(transfer.unit_cost, dec("1.00001"));
        assert_eq!(transfer.outbound.total_cost, dec("1000.01"));
        assert_eq!(transfer.inbound.total_cost, dec("1000.01"));
        assert_eq!(engine.valuation(&tx, main.id).await.unwrap(), dec("0"));
        assert_eq!(engine.valuation(&tx, shop.id).await.unwrap(), dec("1000.01"));
    }

    #[tokio::test]
    async fn test_transfer_with_repeating_average_keeps_value() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let engine = InventoryCostEngine::new(Precision::default());
        let main = engine.create_item(&mut tx, "X-MAIN", "Widget @ main").await.unwrap();
        let shop = engine.create_item(&mut tx, "X-SHOP", "Widget @ shop").await.unwrap();

        // 6 x 0.1 + 1 x 0.405 = 1.005, a half-cent, spread over 7 units
        engine
            .receive_stock(&mut tx, main.id, &dec("6"), &dec("0.1"), purchase(1), day())
            .await
            .unwrap();
        engine
            .receive_stock(&mut tx, main.id, &dec("1"), &dec("0.405"), purchase(2), day())
            .await
            .unwrap();

        let transfer = engine
            .transfer_stock(&mut tx, main.id, shop.id, &dec("7"), day())
            .await
            .unwrap();

        assert_eq!(transfer.outbound.total_cost, dec("1.01"));
        assert_eq!(transfer.inbound.total_cost, dec("1.01"));
        assert_eq!(engine.valuation(&tx, shop.id).await.unwrap(), dec("1.01"));
    }

    #[tokio::test]
    async fn test_reverse_transfer_restores_both_items() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let engine = InventoryCostEngine::new(Precision::default());
        let main = engine.create_item(&mut tx, "X-MAIN", "Widget @ main").await.unwrap();
        let shop = engine.create_item(&mut tx, "X-SHOP", "Widget @ shop").await.unwrap();

        let receipt = engine
            .receive_stock(&mut tx, main.id, &dec("10"), &dec("100"), purchase(1), day())
            .await
            .unwrap();
        let main_layers = tx.layers_for_item(main.id).await.unwrap();

        let transfer = engine
            .transfer_stock(&mut tx, main.id, shop.id, &dec("4"), day())
            .await
            .unwrap();
        engine.reverse_transfer(&mut tx, transfer.id).await.unwrap();

        assert_eq!(tx.layers_for_item(main.id).await.unwrap(), main_layers);
        assert!(tx.layers_for_item(shop.id).await.unwrap().is_empty());
        assert_eq!(
            engine.item(&tx, shop.id).await.unwrap().quantity_on_hand,
            dec("0")
        );
        assert!(tx
            .inventory_transactions_for_source(&SourceRef::transfer(transfer.id))
            .await
            .unwrap()
            .is_empty());

        // the source receipt is free again
        engine.reverse_receipt(&mut tx, &receipt).await.unwrap();

        let err = engine.reverse_transfer(&mut tx, transfer.id).await.unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[tokio::test]
    async fn test_reverse_transfer_blocked_once_target_is_drawn() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let engine = InventoryCostEngine::new(Precision::default());
        let main = engine.create_item(&mut tx, "X-MAIN", "Widget @ main").await.unwrap();
        let shop = engine.create_item(&mut tx, "X-SHOP", "Widget @ shop").await.unwrap();

        engine
            .receive_stock(&mut tx, main.id, &dec("10"), &dec("100"), purchase(1), day())
            .await
            .unwrap();
        let transfer = engine
            .transfer_stock(&mut tx, main.id, shop.id, &dec("4"), day())
            .await
            .unwrap();
        engine
            .consume_stock(&mut tx, shop.id, &dec("1"), sale(3), day())
            .await
            .unwrap();

        let err = engine.reverse_transfer(&mut tx, transfer.id).await.unwrap_err();
        match err {
            LedgerError::DependencyExists(msg) => assert!(msg.contains(&sale(3).to_string())),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(
            engine.item(&tx, main.id).await.unwrap().quantity_on_hand,
            dec("6")
        );
    }

    #[tokio::test]
    async fn test_inactive_item_rejects_movements_but_allows_reversal() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let engine = InventoryCostEngine::new(Precision::default());
        let item = engine.create_item(&mut tx, "X", "Widget").await.unwrap();

        engine
            .receive_stock(&mut tx, item.id, &dec("5"), &dec("10"), purchase(1), day())
            .await
            .unwrap();
        let record = engine
            .consume_stock(&mut tx, item.id, &dec("2"), sale(1), day())
            .await
            .unwrap();

        let item = engine.deactivate_item(&mut tx, item.id).await.unwrap();
        assert!(!item.active);

        let err = engine
            .receive_stock(&mut tx, item.id, &dec("1"), &dec("10"), purchase(2), day())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        let err = engine
            .consume_stock(&mut tx, item.id, &dec("1"), sale(2), day())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        engine.reverse_consumption(&mut tx, &record).await.unwrap();
        assert_eq!(
            engine.item(&tx, item.id).await.unwrap().quantity_on_hand,
            dec("5")
        );

        let err = engine.deactivate_item(&mut tx, item.id).await.unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[tokio::test]
    async fn test_reverse_receipt_blocked_after_consumption() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let engine = InventoryCostEngine::new(Precision::default());
        let item = engine.create_item(&mut tx, "X", "Widget").await.unwrap();

        let receipt = engine
            .receive_stock(&mut tx, item.id, &dec("10"), &dec("100"), purchase(1), day())
            .await
            .unwrap();
        engine
            .consume_stock(&mut tx, item.id, &dec("1"), sale(7), day())
            .await
            .unwrap();

        let err = engine.reverse_receipt(&mut tx, &receipt).await.unwrap_err();
        match err {
            LedgerError::DependencyExists(msg) => assert!(msg.contains(&sale(7).to_string())),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_rejects_non_positive_quantity() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let engine = InventoryCostEngine::new(Precision::default());
        let item = engine.create_item(&mut tx, "X", "Widget").await.unwrap();

        let err = engine
            .receive_stock(&mut tx, item.id, &dec("0.0001"), &dec("1"), purchase(1), day())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }
}
