//! A day of trading: stock in, stock out, cash in, cash out
//!
//! Run with `RUST_LOG=accounting_engine=debug` to see every posting.

use accounting_engine::{
    DocumentBody, DocumentInput, JournalBuilder, Ledger, MemoryStore, Payment, PayrollDeduction,
    PayrollSlip, PurchaseInvoice, PurchaseLine, Receipt, RegisterKind, SalesInvoice, SalesLine,
};
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("🧾 Accounting Engine - Trading Day\n");

    let ledger = Ledger::new(MemoryStore::new());
    let today = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();

    // 1. Chart of accounts and a bank register
    println!("📊 Setting up Chart of Accounts...");
    let accounts = ledger.setup_standard_chart_of_accounts().await?;
    let mut codes: Vec<_> = accounts.values().collect();
    codes.sort_by(|a, b| a.code.cmp(&b.code));
    for account in codes {
        println!("  ✓ {} {} ({:?})", account.code, account.name, account.category);
    }

    let bank = ledger
        .open_register("Main bank", RegisterKind::Bank, "1150".into())
        .await?;

    let investment = JournalBuilder::new(today, "Owner investment")
        .debit("1150", BigDecimal::from(20_000), None)
        .credit("3100", BigDecimal::from(20_000), None)
        .build()?;
    ledger.record_journal_entry(investment).await?;
    println!("\n💰 Owner invested 20000 into the bank account");

    // 2. Buy two lots of the same item at different costs
    println!("\n📦 Receiving stock...");
    let widget = ledger.create_item("WID-1", "Widget").await?;
    for (quantity, unit_cost) in [(10, "100"), (10, "120")] {
        let document = ledger
            .create_document(DocumentInput::new(
                today,
                "Widget restock",
                DocumentBody::PurchaseInvoice(PurchaseInvoice {
                    supplier_account: "2100".into(),
                    inventory_account: "1300".into(),
                    lines: vec![PurchaseLine {
                        item_id: widget.id,
                        quantity: BigDecimal::from(quantity),
                        unit_cost: unit_cost.parse()?,
                    }],
                }),
            ))
            .await?;
        println!("  ✓ {}: {} widgets at {}", document.number, quantity, unit_cost);
    }

    // 3. Sell across both layers
    println!("\n🛒 Selling 14 widgets...");
    let sale = ledger
        .create_document(DocumentInput::new(
            today,
            "Counter sale",
            DocumentBody::SalesInvoice(SalesInvoice {
                customer_account: "1200".into(),
                revenue_account: "4100".into(),
                cogs_account: Some("5100".into()),
                inventory_account: Some("1300".into()),
                lines: vec![SalesLine {
                    description: "Widget".to_string(),
                    item_id: Some(widget.id),
                    quantity: BigDecimal::from(14),
                    unit_price: BigDecimal::from(200),
                }],
            }),
        ))
        .await?;
    println!("  ✓ {} posted", sale.number);
    println!(
        "  Cost of goods sold: {}",
        ledger.account_balance("5100", false).await?
    );
    for layer in ledger.item_layers(widget.id).await? {
        println!(
            "  Layer {}: {} of {} left at {}",
            layer.sequence, layer.remaining_quantity, layer.quantity, layer.unit_cost
        );
    }

    // 4. Cash moves through the register
    println!("\n🏦 Settling accounts...");
    let receipt = ledger
        .create_document(DocumentInput::new(
            today,
            "Customer settles invoice",
            DocumentBody::Receipt(Receipt {
                register_id: bank.id,
                customer_account: "1200".into(),
                amount: BigDecimal::from(2_800),
            }),
        ))
        .await?;
    println!("  ✓ {}: received 2800", receipt.number);

    let payment = ledger
        .create_document(DocumentInput::new(
            today,
            "Supplier paid",
            DocumentBody::Payment(Payment {
                register_id: bank.id,
                payee_account: "2100".into(),
                amount: BigDecimal::from(2_200),
            }),
        ))
        .await?;
    println!("  ✓ {}: paid 2200", payment.number);

    let slip = ledger
        .create_document(DocumentInput::new(
            today,
            "March salary",
            DocumentBody::PayrollSlip(PayrollSlip {
                employee: "Shop assistant".to_string(),
                expense_account: "5200".into(),
                payable_account: "2200".into(),
                gross: BigDecimal::from(1_500),
                deductions: vec![PayrollDeduction {
                    label: "Withholding".to_string(),
                    account: "2300".into(),
                    amount: BigDecimal::from(150),
                }],
            }),
        ))
        .await?;
    println!("  ✓ {}: payroll accrued", slip.number);

    // 5. Integrity
    println!("\n🔍 Integrity report");
    let report = ledger.validate_integrity().await?;
    println!("  Debit balances:  {}", report.total_debit_balances);
    println!("  Credit balances: {}", report.total_credit_balances);
    for register in &report.registers {
        println!(
            "  {}: stored {} recomputed {} {}",
            register.register_name,
            register.stored_balance,
            register.recomputed_balance,
            if register.is_reconciled { "✅" } else { "❌" }
        );
    }
    println!(
        "  Valid: {}",
        if report.is_valid { "✅ Yes" } else { "❌ No" }
    );
    for issue in &report.issues {
        println!("    - {}", issue);
    }

    Ok(())
}
