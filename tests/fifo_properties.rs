//! Property-based tests for FIFO costing invariants
//!
//! - Cost conservation: everything received is either drawn or still on a layer
//! - Consumption cost is the rounded sum of its exact draws
//! - Reversing a consumption restores the layers it drew from
//! - Through documents, the inventory account tracks the stock valuation

use accounting_engine::{
    DocumentBody, DocumentInput, DocumentKind, InventoryCostEngine, Ledger, LedgerError,
    LedgerStore, LedgerTx, MemoryStore, Precision, PurchaseInvoice, PurchaseLine, SalesInvoice,
    SalesLine, SourceRef,
};
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use proptest::prelude::*;
use uuid::Uuid;

/// Quantities in thousandths, 0.001 to 50
fn quantity_strategy() -> impl Strategy<Value = BigDecimal> {
    (1i64..50_000i64).prop_map(|milli| BigDecimal::new(milli.into(), 3))
}

/// Unit costs in ten-thousandths, 0 to 100
fn unit_cost_strategy() -> impl Strategy<Value = BigDecimal> {
    (0i64..1_000_000i64).prop_map(|units| BigDecimal::new(units.into(), 4))
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 7, 1).unwrap()
}

fn source(kind: DocumentKind, n: usize) -> SourceRef {
    SourceRef::document(kind, Uuid::from_u128(n as u128 + 1))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: received cost == drawn cost + remaining layer cost
    #[test]
    fn prop_fifo_conserves_cost(
        receipts in prop::collection::vec((quantity_strategy(), unit_cost_strategy()), 1..8),
        requests in prop::collection::vec(quantity_strategy(), 0..12),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let precision = Precision::default();
            let engine = InventoryCostEngine::new(precision);
            let store = MemoryStore::new();
            let mut tx = store.begin().await.unwrap();
            let item = engine.create_item(&mut tx, "P", "Property item").await.unwrap();

            let mut received = BigDecimal::from(0);
            for (n, (quantity, unit_cost)) in receipts.iter().enumerate() {
                let origin = source(DocumentKind::PurchaseInvoice, n);
                engine
                    .receive_stock(&mut tx, item.id, quantity, unit_cost, origin, day())
                    .await
                    .unwrap();
                received += quantity * unit_cost;
            }

            let mut drawn = BigDecimal::from(0);
            for (n, quantity) in requests.iter().enumerate() {
                let on_hand = engine.item(&tx, item.id).await.unwrap().quantity_on_hand;
                let origin = source(DocumentKind::SalesInvoice, n);
                match engine
                    .consume_stock(&mut tx, item.id, quantity, origin, day())
                    .await
                {
                    Ok(record) => {
                        let exact: BigDecimal = record
                            .draws
                            .iter()
                            .map(|d| &d.quantity * &d.unit_cost)
                            .sum();
                        let moved: BigDecimal = record.draws.iter().map(|d| &d.quantity).sum();
                        assert_eq!(moved, quantity.clone());
                        assert_eq!(record.total_cost, precision.money(&exact));
                        drawn += exact;
                    }
                    Err(LedgerError::InsufficientStock { .. }) => {
                        assert!(on_hand < *quantity);
                    }
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }

            let layers = tx.layers_for_item(item.id).await.unwrap();
            let remaining: BigDecimal = layers
                .iter()
                .map(|l| &l.remaining_quantity * &l.unit_cost)
                .sum();
            assert_eq!(received, &drawn + &remaining);

            let on_hand = engine.item(&tx, item.id).await.unwrap().quantity_on_hand;
            let layer_total: BigDecimal = layers.iter().map(|l| &l.remaining_quantity).sum();
            assert_eq!(on_hand, layer_total);
            assert!(on_hand >= BigDecimal::from(0));
        });
    }

    /// Property: consume then reverse leaves layers and on-hand untouched
    #[test]
    fn prop_reverse_consumption_restores_layers(
        receipts in prop::collection::vec((quantity_strategy(), unit_cost_strategy()), 1..6),
        fraction in 1u32..=100u32,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let engine = InventoryCostEngine::new(Precision::default());
            let store = MemoryStore::new();
            let mut tx = store.begin().await.unwrap();
            let item = engine.create_item(&mut tx, "P", "Property item").await.unwrap();

            for (n, (quantity, unit_cost)) in receipts.iter().enumerate() {
                let origin = source(DocumentKind::PurchaseInvoice, n);
                engine
                    .receive_stock(&mut tx, item.id, quantity, unit_cost, origin, day())
                    .await
                    .unwrap();
            }

            let before_layers = tx.layers_for_item(item.id).await.unwrap();
            let before_item = engine.item(&tx, item.id).await.unwrap();

            let share = &before_item.quantity_on_hand * BigDecimal::from(fraction);
            let wanted = Precision::default().quantity(&(share / BigDecimal::from(100)));
            if wanted <= BigDecimal::from(0) {
                return;
            }

            let origin = source(DocumentKind::SalesInvoice, 0);
            let record = engine
                .consume_stock(&mut tx, item.id, &wanted, origin, day())
                .await
                .unwrap();
            engine.reverse_consumption(&mut tx, &record).await.unwrap();

            assert_eq!(tx.layers_for_item(item.id).await.unwrap(), before_layers);
            assert_eq!(
                engine.item(&tx, item.id).await.unwrap().quantity_on_hand,
                before_item.quantity_on_hand
            );
        });
    }

    /// Property: with whole quantities and cent costs, the inventory
    /// account always equals the value of the remaining layers
    #[test]
    fn prop_inventory_account_tracks_valuation(
        purchases in prop::collection::vec((1i64..20i64, 1i64..50_000i64), 1..5),
        sales in prop::collection::vec(1i64..30i64, 0..5),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let ledger = Ledger::new(MemoryStore::new());
            ledger.setup_standard_chart_of_accounts().await.unwrap();
            let item = ledger.create_item("P", "Property item").await.unwrap();

            for (quantity, cents) in &purchases {
                ledger
                    .create_document(DocumentInput::new(
                        day(),
                        "Restock",
                        DocumentBody::PurchaseInvoice(PurchaseInvoice {
                            supplier_account: "2100".into(),
                            inventory_account: "1300".into(),
                            lines: vec![PurchaseLine {
                                item_id: item.id,
                                quantity: BigDecimal::from(*quantity),
                                unit_cost: BigDecimal::new((*cents).into(), 2),
                            }],
                        }),
                    ))
                    .await
                    .unwrap();
            }

            for quantity in &sales {
                let result = ledger
                    .create_document(DocumentInput::new(
                        day(),
                        "Sale",
                        DocumentBody::SalesInvoice(SalesInvoice {
                            customer_account: "1200".into(),
                            revenue_account: "4100".into(),
                            cogs_account: Some("5100".into()),
                            inventory_account: Some("1300".into()),
                            lines: vec![SalesLine {
                                description: "Property item".to_string(),
                                item_id: Some(item.id),
                                quantity: BigDecimal::from(*quantity),
                                unit_price: BigDecimal::from(999),
                            }],
                        }),
                    ))
                    .await;
                match result {
                    Ok(_) | Err(LedgerError::InsufficientStock { .. }) => {}
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }

            assert_eq!(
                ledger.account_balance("1300", false).await.unwrap(),
                ledger.item_valuation(item.id).await.unwrap()
            );
            let report = ledger.validate_integrity().await.unwrap();
            assert!(report.is_valid, "{:?}", report.issues);
        });
    }
}
