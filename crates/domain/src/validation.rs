//! Input validation for orders, customers and products.

use std::sync::LazyLock;

use chrono::NaiveDate;
use common::ProductId;
use regex::Regex;
use thiserror::Error;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
});

/// Reasons a request is rejected before anything is read or written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Email is required")]
    MissingEmail,

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Order has no items")]
    NoItems,

    #[error("Invalid quantity {quantity} for product {product_id} (must be greater than 0)")]
    InvalidQuantity { product_id: ProductId, quantity: u32 },

    #[error("Delivery date {date} is not in the future")]
    DeliveryDateNotInFuture { date: NaiveDate },

    #[error("Order total overflows")]
    TotalOverflow,

    #[error("Product name is required")]
    EmptyProductName,

    #[error("Invalid price: {0} cents (must not be negative)")]
    NegativePrice(i64),
}

/// Trims and lower-cases an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Checks that `email` is present and syntactically valid, returning the
/// normalized form.
pub fn validate_email(email: &str) -> Result<String, ValidationError> {
    let normalized = normalize_email(email);
    if normalized.is_empty() {
        return Err(ValidationError::MissingEmail);
    }
    if normalized.len() > 255 || !EMAIL_PATTERN.is_match(&normalized) {
        return Err(ValidationError::InvalidEmail(email.trim().to_string()));
    }
    Ok(normalized)
}

/// Checks that the delivery date lies strictly after `today`.
pub fn validate_delivery_date(date: NaiveDate, today: NaiveDate) -> Result<(), ValidationError> {
    if date <= today {
        return Err(ValidationError::DeliveryDateNotInFuture { date });
    }
    Ok(())
}
