//! Engine configuration: numeric precision, document numbering and
//! reconciliation tolerance

use bigdecimal::{BigDecimal, RoundingMode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::types::*;

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub precision: Precision,
    pub numbering: NumberingConfig,
    pub reconciliation: ReconciliationConfig,
}

/// Fixed decimal scales used for every stored amount.
///
/// All rounding is HALF-UP. The same `money` function rounds a consumed
/// inventory cost and the journal amount that posts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Precision {
    pub money_scale: i64,
    pub quantity_scale: i64,
    pub unit_cost_scale: i64,
}

impl Default for Precision {
    fn default() -> Self {
        Self {
            money_scale: 2,
            quantity_scale: 3,
            unit_cost_scale: 4,
        }
    }
}

impl Precision {
    pub fn money(&self, value: &BigDecimal) -> BigDecimal {
        value.with_scale_round(self.money_scale, RoundingMode::HalfUp)
    }

    pub fn quantity(&self, value: &BigDecimal) -> BigDecimal {
        value.with_scale_round(self.quantity_scale, RoundingMode::HalfUp)
    }

    pub fn unit_cost(&self, value: &BigDecimal) -> BigDecimal {
        value.with_scale_round(self.unit_cost_scale, RoundingMode::HalfUp)
    }
}

/// Document number prefixes, rendered as `PREFIX-YEAR-SEQUENCE`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumberingConfig {
    pub sales_invoice: String,
    pub purchase_invoice: String,
    pub receipt: String,
    pub payment: String,
    pub payroll_slip: String,
    pub depreciation: String,
    pub disposal: String,
    /// Zero padding of the sequence part
    pub width: usize,
}

impl Default for NumberingConfig {
    fn default() -> Self {
        Self {
            sales_invoice: "INV".to_string(),
            purchase_invoice: "PINV".to_string(),
            receipt: "RCT".to_string(),
            payment: "PAY".to_string(),
            payroll_slip: "PSL".to_string(),
            depreciation: "DEP".to_string(),
            disposal: "DSP".to_string(),
            width: 5,
        }
    }
}

impl NumberingConfig {
    pub fn prefix(&self, kind: DocumentKind) -> &str {
        match kind {
            DocumentKind::SalesInvoice => &self.sales_invoice,
            DocumentKind::PurchaseInvoice => &self.purchase_invoice,
            DocumentKind::Receipt => &self.receipt,
            DocumentKind::Payment => &self.payment,
            DocumentKind::PayrollSlip => &self.payroll_slip,
            DocumentKind::Depreciation => &self.depreciation,
            DocumentKind::Disposal => &self.disposal,
        }
    }

    /// Render a document number, e.g. `INV-2026-00123`
    pub fn format(&self, kind: DocumentKind, year: i32, sequence: u64) -> String {
        format!(
            "{}-{}-{:0width$}",
            self.prefix(kind),
            year,
            sequence,
            width = self.width
        )
    }
}

/// Tolerance for treasury reconciliation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    /// Differences strictly above this are reported
    pub epsilon: BigDecimal,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            epsilon: BigDecimal::new(1.into(), 2),
        }
    }
}

impl EngineConfig {
    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            LedgerError::Config(format!(
                "Failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> LedgerResult<Self> {
        let config: EngineConfig = toml::from_str(content)
            .map_err(|e| LedgerError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `ACCOUNTING_*` environment variables
    pub fn from_env() -> LedgerResult<Self> {
        let mut config = EngineConfig::default();

        if let Ok(scale) = std::env::var("ACCOUNTING_MONEY_SCALE") {
            config.precision.money_scale = parse_env("ACCOUNTING_MONEY_SCALE", &scale)?;
        }

        if let Ok(scale) = std::env::var("ACCOUNTING_QUANTITY_SCALE") {
            config.precision.quantity_scale = parse_env("ACCOUNTING_QUANTITY_SCALE", &scale)?;
        }

        if let Ok(scale) = std::env::var("ACCOUNTING_UNIT_COST_SCALE") {
            config.precision.unit_cost_scale = parse_env("ACCOUNTING_UNIT_COST_SCALE", &scale)?;
        }

        if let Ok(epsilon) = std::env::var("ACCOUNTING_RECONCILIATION_EPSILON") {
            config.reconciliation.epsilon = BigDecimal::from_str(&epsilon).map_err(|e| {
                LedgerError::Config(format!("ACCOUNTING_RECONCILIATION_EPSILON: {}", e))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> LedgerResult<()> {
        let p = &self.precision;
        if p.money_scale < 0 || p.quantity_scale < 0 || p.unit_cost_scale < 0 {
            return Err(LedgerError::Config("Scales must not be negative".to_string()));
        }
        if self.reconciliation.epsilon < BigDecimal::from(0) {
            return Err(LedgerError::Config(
                "Reconciliation epsilon must not be negative".to_string(),
            ));
        }
        if self.numbering.width == 0 {
            return Err(LedgerError::Config(
                "Document number width must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env(name: &str, value: &str) -> LedgerResult<i64> {
    value
        .parse()
        .map_err(|e| LedgerError::Config(format!("{}: {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.precision.money_scale, 2);
        assert_eq!(config.precision.quantity_scale, 3);
        assert_eq!(config.reconciliation.epsilon, BigDecimal::from_str("0.01").unwrap());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_money_rounding_is_half_up() {
        let p = Precision::default();
        assert_eq!(
            p.money(&BigDecimal::from_str("10.005").unwrap()),
            BigDecimal::from_str("10.01").unwrap()
        );
        assert_eq!(
            p.money(&BigDecimal::from_str("10.004").unwrap()),
            BigDecimal::from_str("10.00").unwrap()
        );
    }

    #[test]
    fn test_document_number_format() {
        let numbering = NumberingConfig::default();
        assert_eq!(
            numbering.format(DocumentKind::SalesInvoice, 2026, 123),
            "INV-2026-00123"
        );
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [precision]
            quantity_scale = 2

            [numbering]
            sales_invoice = "SI"
            "#,
        )
        .unwrap();

        assert_eq!(config.precision.quantity_scale, 2);
        assert_eq!(config.precision.money_scale, 2);
        assert_eq!(config.numbering.prefix(DocumentKind::SalesInvoice), "SI");
        assert_eq!(config.numbering.prefix(DocumentKind::Receipt), "RCT");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = EngineConfig::from_toml_str("precision = 3").unwrap_err();
        assert!(matches!(err, LedgerError::Config(_)));
    }
}
