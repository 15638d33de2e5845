use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rust_decimal::Decimal;

use super::RepositoryError;

pub(crate) fn parse_u32(column: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!(
            "invalid value for `{column}` (expected non-negative u32): {value}"
        ))
    })
}

pub(crate) fn parse_optional_u32(
    column: &str,
    value: Option<i64>,
) -> Result<Option<u32>, RepositoryError> {
    value.map(|raw| parse_u32(column, raw)).transpose()
}

pub(crate) fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

pub(crate) fn parse_decimal(column: &str, value: String) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(value.trim()).map_err(|error| {
        RepositoryError::Decode(format!("invalid decimal in `{column}`: `{value}` ({error})"))
    })
}

pub(crate) fn parse_optional_decimal(
    column: &str,
    value: Option<String>,
) -> Result<Option<Decimal>, RepositoryError> {
    value.map(|raw| parse_decimal(column, raw)).transpose()
}

pub(crate) fn parse_optional_date(
    column: &str,
    value: Option<String>,
) -> Result<Option<NaiveDate>, RepositoryError> {
    value
        .map(|raw| {
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|error| {
                RepositoryError::Decode(format!("invalid date in `{column}`: `{raw}` ({error})"))
            })
        })
        .transpose()
}

pub(crate) fn parse_enum<T>(
    column: &str,
    value: String,
    parse: impl FnOnce(&str) -> Option<T>,
) -> Result<T, RepositoryError> {
    parse(&value)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown value in `{column}`: `{value}`")))
}

pub(crate) fn format_date(value: NaiveDate) -> String {
    value.format("%Y-%m-%d").to_string()
}

/// Fixed-width RFC 3339 so stored timestamps sort lexically.
pub(crate) fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}
