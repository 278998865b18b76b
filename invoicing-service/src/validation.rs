//! Payload checks applied before any write.
//!
//! Item fields are validated through `validator` derives on
//! [`CreateInvoiceItem`]; invoice-level rules (item presence, computed and
//! supplied totals, customer name) are checked here. Every violation in a
//! payload is reported, each with a field path and a machine-readable kind.

use std::borrow::Cow;

use rust_decimal::Decimal;
use serde::Serialize;
use validator::{Validate, ValidationError};

use crate::models::{line_total, CreateInvoice, CreateInvoiceItem, UpdateInvoice};

const MAX_CUSTOMER_NAME_LEN: usize = 200;
const MAX_PRICE_SCALE: u32 = 2;

/// Upper bound (exclusive) for a money amount with ten significant digits.
fn max_amount() -> Decimal {
    Decimal::new(100_000_000, 0)
}

/// Validation failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationKind {
    InvalidQuantity,
    InvalidPrice,
    NoItems,
    InvalidTotal,
    InvalidCustomerName,
    InvalidDescription,
}

impl ValidationKind {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationKind::InvalidQuantity => "invalid_quantity",
            ValidationKind::InvalidPrice => "invalid_price",
            ValidationKind::NoItems => "no_items",
            ValidationKind::InvalidTotal => "invalid_total",
            ValidationKind::InvalidCustomerName => "invalid_customer_name",
            ValidationKind::InvalidDescription => "invalid_description",
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        match code {
            "invalid_quantity" => Some(ValidationKind::InvalidQuantity),
            "invalid_price" => Some(ValidationKind::InvalidPrice),
            "no_items" => Some(ValidationKind::NoItems),
            "invalid_total" => Some(ValidationKind::InvalidTotal),
            "invalid_customer_name" => Some(ValidationKind::InvalidCustomerName),
            "invalid_description" => Some(ValidationKind::InvalidDescription),
            _ => None,
        }
    }
}

/// A single rejected field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub field: String,
    pub kind: ValidationKind,
    pub message: String,
}

impl Violation {
    fn new(field: impl Into<String>, kind: ValidationKind, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind,
            message: message.into(),
        }
    }
}

/// All violations found in one payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{} validation error(s)", .violations.len())]
pub struct ValidationFailure {
    pub violations: Vec<Violation>,
}

impl ValidationFailure {
    pub fn kinds(&self) -> Vec<ValidationKind> {
        self.violations.iter().map(|v| v.kind).collect()
    }

    pub fn has(&self, kind: ValidationKind) -> bool {
        self.violations.iter().any(|v| v.kind == kind)
    }
}

/// `validator` hook for `CreateInvoiceItem::unit_price`.
pub fn validate_unit_price(value: &Decimal) -> Result<(), ValidationError> {
    let message = if value.is_sign_negative() && !value.is_zero() {
        "Unit price cannot be negative."
    } else if value.normalize().scale() > MAX_PRICE_SCALE {
        "Unit price must have at most 2 decimal places."
    } else if *value >= max_amount() {
        "Unit price must be less than 100000000."
    } else {
        return Ok(());
    };

    let mut error = ValidationError::new(ValidationKind::InvalidPrice.code());
    error.message = Some(Cow::Borrowed(message));
    Err(error)
}

/// Validate a create payload.
pub fn validate_create(input: &CreateInvoice) -> Result<(), ValidationFailure> {
    let mut violations = Vec::new();
    check_customer_name(&input.customer_name, &mut violations);
    check_items(&input.items, &mut violations);
    check_supplied_total(input.total_amount, &mut violations);
    finish(violations)
}

/// Validate an update payload. Absent fields are not checked.
pub fn validate_update(input: &UpdateInvoice) -> Result<(), ValidationFailure> {
    let mut violations = Vec::new();
    if let Some(name) = &input.customer_name {
        check_customer_name(name, &mut violations);
    }
    if let Some(items) = &input.items {
        check_items(items, &mut violations);
    }
    check_supplied_total(input.total_amount, &mut violations);
    finish(violations)
}

fn finish(mut violations: Vec<Violation>) -> Result<(), ValidationFailure> {
    if violations.is_empty() {
        return Ok(());
    }
    violations.sort_by(|a, b| a.field.cmp(&b.field));
    Err(ValidationFailure { violations })
}

fn check_customer_name(name: &str, violations: &mut Vec<Violation>) {
    let len = name.trim().chars().count();
    if len == 0 || len > MAX_CUSTOMER_NAME_LEN {
        violations.push(Violation::new(
            "customer_name",
            ValidationKind::InvalidCustomerName,
            "Customer name must be between 1 and 200 characters.",
        ));
    }
}

fn check_items(items: &[CreateInvoiceItem], violations: &mut Vec<Violation>) {
    if items.is_empty() {
        violations.push(Violation::new(
            "items",
            ValidationKind::NoItems,
            "An invoice must have at least one item.",
        ));
        return;
    }

    let mut items_valid = true;
    for (index, item) in items.iter().enumerate() {
        let Err(errors) = item.validate() else {
            continue;
        };
        items_valid = false;
        for (field, field_errors) in errors.field_errors() {
            for error in field_errors {
                let kind = ValidationKind::from_code(&error.code).unwrap_or(match &*field {
                    "quantity" => ValidationKind::InvalidQuantity,
                    "unit_price" => ValidationKind::InvalidPrice,
                    _ => ValidationKind::InvalidDescription,
                });
                let message = error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for {}.", field));
                violations.push(Violation::new(
                    format!("items[{}].{}", index, field),
                    kind,
                    message,
                ));
            }
        }
    }

    if items_valid && !total_fits(items) {
        violations.push(Violation::new(
            "total_amount",
            ValidationKind::InvalidTotal,
            "Invoice total must be less than 100000000.",
        ));
    }
}

/// Whether the computed total of `items` fits the stored money precision.
fn total_fits(items: &[CreateInvoiceItem]) -> bool {
    items
        .iter()
        .try_fold(Decimal::ZERO, |sum, item| {
            sum.checked_add(line_total(item.quantity, item.unit_price))
        })
        .is_some_and(|total| total < max_amount())
}

fn check_supplied_total(total: Option<Decimal>, violations: &mut Vec<Violation>) {
    if let Some(total) = total {
        if total.is_sign_negative() && !total.is_zero() {
            violations.push(Violation::new(
                "total_amount",
                ValidationKind::InvalidTotal,
                "Total amount cannot be negative.",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn item(description: &str, quantity: i32, unit_price: &str) -> CreateInvoiceItem {
        CreateInvoiceItem {
            description: description.to_string(),
            quantity,
            unit_price: Decimal::from_str(unit_price).unwrap(),
        }
    }

    fn create(items: Vec<CreateInvoiceItem>) -> CreateInvoice {
        CreateInvoice {
            customer_name: "Test Customer".to_string(),
            items,
            total_amount: None,
        }
    }

    #[test]
    fn valid_payload_passes() {
        let input = create(vec![item("A", 2, "10.00"), item("B", 1, "20.00")]);
        assert!(validate_create(&input).is_ok());
    }

    #[test]
    fn zero_price_is_allowed() {
        let input = create(vec![item("Free sample", 1, "0.00")]);
        assert!(validate_create(&input).is_ok());
    }

    #[test]
    fn empty_items_fail_with_no_items() {
        let err = validate_create(&create(Vec::new())).unwrap_err();
        assert_eq!(err.kinds(), vec![ValidationKind::NoItems]);
        assert_eq!(err.violations[0].field, "items");
    }

    #[test]
    fn zero_and_negative_quantity_fail() {
        let err = validate_create(&create(vec![item("A", 0, "1.00"), item("B", -3, "1.00")]))
            .unwrap_err();
        assert_eq!(
            err.kinds(),
            vec![ValidationKind::InvalidQuantity, ValidationKind::InvalidQuantity]
        );
        assert_eq!(err.violations[0].field, "items[0].quantity");
        assert_eq!(err.violations[1].field, "items[1].quantity");
        assert_eq!(err.violations[0].message, "Quantity must be positive.");
    }

    #[test]
    fn negative_price_fails() {
        let err = validate_create(&create(vec![item("A", 1, "-0.01")])).unwrap_err();
        assert_eq!(err.kinds(), vec![ValidationKind::InvalidPrice]);
        assert_eq!(err.violations[0].message, "Unit price cannot be negative.");
    }

    #[test]
    fn price_with_three_decimals_fails() {
        let err = validate_create(&create(vec![item("A", 1, "1.005")])).unwrap_err();
        assert!(err.has(ValidationKind::InvalidPrice));
    }

    #[test]
    fn trailing_zeros_do_not_count_as_precision() {
        assert!(validate_unit_price(&Decimal::from_str("1.500").unwrap()).is_ok());
    }

    #[test]
    fn price_beyond_storage_precision_fails() {
        assert!(validate_unit_price(&Decimal::from_str("100000000.00").unwrap()).is_err());
        assert!(validate_unit_price(&Decimal::from_str("99999999.99").unwrap()).is_ok());
    }

    #[test]
    fn computed_total_beyond_storage_precision_fails() {
        let err = validate_create(&create(vec![item("A", 2, "99999999.99")])).unwrap_err();
        assert_eq!(err.kinds(), vec![ValidationKind::InvalidTotal]);
        assert_eq!(err.violations[0].field, "total_amount");

        let split = create(vec![item("A", 1, "60000000.00"), item("B", 1, "40000000.00")]);
        assert!(validate_create(&split).unwrap_err().has(ValidationKind::InvalidTotal));

        let at_limit = create(vec![item("A", 1, "99999999.98"), item("B", 1, "0.01")]);
        assert!(validate_create(&at_limit).is_ok());
    }

    #[test]
    fn update_with_oversized_items_fails_on_total() {
        let input = UpdateInvoice {
            items: Some(vec![item("A", 3, "50000000.00")]),
            ..Default::default()
        };
        let err = validate_update(&input).unwrap_err();
        assert_eq!(err.kinds(), vec![ValidationKind::InvalidTotal]);
    }

    #[test]
    fn negative_supplied_total_fails() {
        let mut input = create(vec![item("A", 1, "5.00")]);
        input.total_amount = Some(Decimal::from_str("-1.00").unwrap());
        let err = validate_create(&input).unwrap_err();
        assert_eq!(err.kinds(), vec![ValidationKind::InvalidTotal]);
    }

    #[test]
    fn non_negative_supplied_total_is_ignored() {
        let mut input = create(vec![item("A", 1, "5.00")]);
        input.total_amount = Some(Decimal::from_str("999.00").unwrap());
        assert!(validate_create(&input).is_ok());
    }

    #[test]
    fn blank_customer_name_fails() {
        let mut input = create(vec![item("A", 1, "5.00")]);
        input.customer_name = "   ".to_string();
        let err = validate_create(&input).unwrap_err();
        assert_eq!(err.kinds(), vec![ValidationKind::InvalidCustomerName]);
    }

    #[test]
    fn empty_description_fails() {
        let err = validate_create(&create(vec![item("", 1, "5.00")])).unwrap_err();
        assert_eq!(err.kinds(), vec![ValidationKind::InvalidDescription]);
        assert_eq!(err.violations[0].field, "items[0].description");
    }

    #[test]
    fn all_violations_are_reported_together() {
        let mut input = create(vec![item("A", 0, "-2.00")]);
        input.customer_name = String::new();
        let err = validate_create(&input).unwrap_err();
        assert_eq!(err.violations.len(), 3);
        assert!(err.has(ValidationKind::InvalidCustomerName));
        assert!(err.has(ValidationKind::InvalidQuantity));
        assert!(err.has(ValidationKind::InvalidPrice));
    }

    #[test]
    fn update_without_items_skips_item_checks() {
        let input = UpdateInvoice {
            customer_name: Some("Renamed".to_string()),
            ..Default::default()
        };
        assert!(validate_update(&input).is_ok());
    }

    #[test]
    fn update_with_empty_items_fails_with_no_items() {
        let input = UpdateInvoice {
            items: Some(Vec::new()),
            ..Default::default()
        };
        let err = validate_update(&input).unwrap_err();
        assert_eq!(err.kinds(), vec![ValidationKind::NoItems]);
    }
}
