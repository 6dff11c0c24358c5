//! Fixed journal line recipes per document type.
//!
//! Recipes are pure: inventory costs and register accounts are looked up by
//! the binder and passed in. Zero-amount lines are omitted.

use bigdecimal::BigDecimal;
use uuid::Uuid;

use super::*;
use crate::config::Precision;
use crate::types::*;

fn positive(precision: &Precision, amount: &BigDecimal, what: &str) -> LedgerResult<BigDecimal> {
    let amount = precision.money(amount);
    if amount <= BigDecimal::from(0) {
        return Err(LedgerError::Validation(format!("{} must be positive", what)));
    }
    Ok(amount)
}

fn non_negative(
    precision: &Precision,
    amount: &BigDecimal,
    what: &str,
) -> LedgerResult<BigDecimal> {
    let amount = precision.money(amount);
    if amount < BigDecimal::from(0) {
        return Err(LedgerError::Validation(format!("{} cannot be negative", what)));
    }
    Ok(amount)
}

fn memo(text: &str) -> Option<String> {
    Some(text.to_string())
}

/// Basic checks on a sales invoice before any stock moves
pub fn validate_sales_invoice(invoice: &SalesInvoice) -> LedgerResult<()> {
    if invoice.lines.is_empty() {
        return Err(LedgerError::validation("Sales invoice needs at least one line"));
    }
    let zero = BigDecimal::from(0);
    for line in &invoice.lines {
        if line.quantity <= zero {
            return Err(LedgerError::validation("Sales line quantity must be positive"));
        }
        if line.unit_price < zero {
            return Err(LedgerError::validation("Sales line price cannot be negative"));
        }
    }
    let stocked = invoice.lines.iter().any(|l| l.item_id.is_some());
    if stocked && (invoice.cogs_account.is_none() || invoice.inventory_account.is_none()) {
        return Err(LedgerError::validation(
            "Sales invoice with stocked lines needs COGS and inventory accounts",
        ));
    }
    Ok(())
}

/// Sales invoice total at money precision
pub fn sales_total(invoice: &SalesInvoice, precision: &Precision) -> BigDecimal {
    invoice
        .lines
        .iter()
        .map(|l| precision.money(&(precision.quantity(&l.quantity) * &l.unit_price)))
        .sum()
}

/// Dr customer / Cr revenue, plus Dr COGS / Cr inventory when stock was drawn
pub fn sales_invoice(
    invoice: &SalesInvoice,
    cost_of_goods: &BigDecimal,
    precision: &Precision,
) -> LedgerResult<Vec<LineDraft>> {
    validate_sales_invoice(invoice)?;
    let total = positive(precision, &sales_total(invoice, precision), "Invoice total")?;
    let cost = non_negative(precision, cost_of_goods, "Cost of goods sold")?;

    let mut lines = vec![
        LineDraft::debit(invoice.customer_account.clone(), total.clone(), memo("Invoice total")),
        LineDraft::credit(invoice.revenue_account.clone(), total, memo("Sales revenue")),
    ];

    if cost > BigDecimal::from(0) {
        if let (Some(cogs), Some(inventory)) = (&invoice.cogs_account, &invoice.inventory_account) {
            lines.push(LineDraft::debit(cogs.clone(), cost.clone(), memo("Cost of goods sold")));
            lines.push(LineDraft::credit(inventory.clone(), cost, memo("Inventory relieved")));
        }
    }
    Ok(lines)
}

pub fn validate_purchase_invoice(invoice: &PurchaseInvoice) -> LedgerResult<()> {
    if invoice.lines.is_empty() {
        return Err(LedgerError::validation(
            "Purchase invoice needs at least one line",
        ));
    }
    Ok(())
}

/// Dr inventory / Cr supplier for the cost of the received layers.
///
/// Free stock (a zero total) yields no lines.
pub fn purchase_invoice(
    invoice: &PurchaseInvoice,
    received_cost: &BigDecimal,
    precision: &Precision,
) -> LedgerResult<Vec<LineDraft>> {
    validate_purchase_invoice(invoice)?;
    let total = non_negative(precision, received_cost, "Purchase total")?;
    if total == BigDecimal::from(0) {
        return Ok(Vec::new());
    }
    Ok(vec![
        LineDraft::debit(
            invoice.inventory_account.clone(),
            total.clone(),
            memo("Stock received"),
        ),
        LineDraft::credit(invoice.supplier_account.clone(), total, memo("Supplier payable")),
    ])
}

/// Dr register account / Cr customer
pub fn receipt(
    receipt: &Receipt,
    register_account: Uuid,
    precision: &Precision,
) -> LedgerResult<Vec<LineDraft>> {
    let amount = positive(precision, &receipt.amount, "Receipt amount")?;
    Ok(vec![
        LineDraft::debit(register_account, amount.clone(), memo("Money received")),
        LineDraft::credit(receipt.customer_account.clone(), amount, None),
    ])
}

/// Dr payee / Cr register account
pub fn payment(
    payment: &Payment,
    register_account: Uuid,
    precision: &Precision,
) -> LedgerResult<Vec<LineDraft>> {
    let amount = positive(precision, &payment.amount, "Payment amount")?;
    Ok(vec![
        LineDraft::debit(payment.payee_account.clone(), amount.clone(), None),
        LineDraft::credit(register_account, amount, memo("Money paid")),
    ])
}

/// Dr expense (gross) / Cr each deduction / Cr payable (net)
pub fn payroll_slip(slip: &PayrollSlip, precision: &Precision) -> LedgerResult<Vec<LineDraft>> {
    if slip.employee.trim().is_empty() {
        return Err(LedgerError::validation("Payroll slip needs an employee"));
    }
    let gross = positive(precision, &slip.gross, "Gross pay")?;

    let mut lines = vec![LineDraft::debit(
        slip.expense_account.clone(),
        gross.clone(),
        Some(format!("Gross pay: {}", slip.employee)),
    )];
    let mut withheld = BigDecimal::from(0);
    for deduction in &slip.deductions {
        let amount = positive(precision, &deduction.amount, "Deduction")?;
        withheld += &amount;
        lines.push(LineDraft::credit(
            deduction.account.clone(),
            amount,
            Some(deduction.label.clone()),
        ));
    }

    let net = &gross - &withheld;
    if net < BigDecimal::from(0) {
        return Err(LedgerError::Validation(format!(
            "Deductions {} exceed gross pay {}",
            withheld, gross
        )));
    }
    if net > BigDecimal::from(0) {
        lines.push(LineDraft::credit(slip.payable_account.clone(), net, memo("Net pay")));
    }
    Ok(lines)
}

/// Dr depreciation expense / Cr accumulated depreciation
pub fn depreciation(entry: &Depreciation, precision: &Precision) -> LedgerResult<Vec<LineDraft>> {
    let amount = positive(precision, &entry.amount, "Depreciation amount")?;
    Ok(vec![
        LineDraft::debit(
            entry.expense_account.clone(),
            amount.clone(),
            Some(format!("Depreciation: {}", entry.asset)),
        ),
        LineDraft::credit(entry.accumulated_account.clone(), amount, None),
    ])
}

/// Remove the asset at cost and its accumulated depreciation, book the
/// proceeds and close the difference to gain (credit) or loss (debit)
pub fn disposal(entry: &Disposal, precision: &Precision) -> LedgerResult<Vec<LineDraft>> {
    let cost = positive(precision, &entry.cost, "Asset cost")?;
    let accumulated = non_negative(
        precision,
        &entry.accumulated_depreciation,
        "Accumulated depreciation",
    )?;
    let proceeds = non_negative(precision, &entry.proceeds, "Disposal proceeds")?;
    if accumulated > cost {
        return Err(LedgerError::validation(
            "Accumulated depreciation cannot exceed asset cost",
        ));
    }

    let zero = BigDecimal::from(0);
    let book_value = &cost - &accumulated;
    let gain = &proceeds - &book_value;

    let mut lines = Vec::new();
    if accumulated > zero {
        lines.push(LineDraft::debit(
            entry.accumulated_account.clone(),
            accumulated,
            memo("Accumulated depreciation removed"),
        ));
    }
    if proceeds > zero {
        lines.push(LineDraft::debit(
            entry.proceeds_account.clone(),
            proceeds,
            memo("Disposal proceeds"),
        ));
    }
    lines.push(LineDraft::credit(
        entry.asset_account.clone(),
        cost,
        Some(format!("Disposal: {}", entry.asset)),
    ));
    if gain > zero {
        lines.push(LineDraft::credit(
            entry.gain_loss_account.clone(),
            gain,
            memo("Gain on disposal"),
        ));
    } else if gain < zero {
        lines.push(LineDraft::debit(
            entry.gain_loss_account.clone(),
            -gain,
            memo("Loss on disposal"),
        ));
    }
    Ok(lines)
}
