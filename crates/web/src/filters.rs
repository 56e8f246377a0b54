//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Stamp count with its noun: `1 stamp`, `3 stamps`.
///
/// Usage in templates: `{{ customer.stamps|stamps }}`
#[askama::filter_fn]
pub fn stamps(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    let count = value.to_string();
    Ok(if count == "1" {
        "1 stamp".to_owned()
    } else {
        format!("{count} stamps")
    })
}
