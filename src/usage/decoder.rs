//! Decoder for the portal's usage CSV export.

use super::types::UsageRecord;
use crate::error::{Error, Result};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use std::borrow::Cow;
use std::str::FromStr;

/// Layout of the timestamp column, e.g. `Jan-30-2018 06:08 PM`.
const RECORD_TIME_LAYOUT: &str = "%b-%d-%Y %I:%M %p";

/// Number of positional columns a data row must carry.
const RECORD_FIELDS: usize = 11;

/// Decodes a usage export into records, in source row order.
///
/// The first row is always treated as a header and discarded. Decoding is
/// strict: the first malformed row fails the whole call.
pub fn decode(raw: &[u8]) -> Result<Vec<UsageRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(raw);

    let mut records = Vec::new();
    for (index, row) in reader.byte_records().enumerate() {
        // +2: one for the header row, one for 1-based numbering
        let line = index + 2;
        let at_row = |message: String| Error::format(format!("row {}: {}", line, message));

        let row = row.map_err(|e| at_row(e.to_string()))?;
        // Exports are not always UTF-8; stray bytes are replaced, not rejected.
        let owned: Vec<Cow<'_, str>> = row.iter().map(String::from_utf8_lossy).collect();
        let fields: Vec<&str> = owned.iter().map(|field| field.as_ref()).collect();
        records.push(parse_row(&fields).map_err(|e| match e {
            Error::Format { message } => at_row(message),
            other => other,
        })?);
    }
    Ok(records)
}

fn parse_row(fields: &[&str]) -> Result<UsageRecord> {
    if fields.len() < RECORD_FIELDS {
        return Err(Error::format(format!(
            "expected at least {} fields, found {}",
            RECORD_FIELDS,
            fields.len()
        )));
    }

    let date_time = NaiveDateTime::parse_from_str(fields[0], RECORD_TIME_LAYOUT)
        .map_err(|e| Error::format(format!("invalid timestamp {:?}: {}", fields[0], e)))?
        .and_utc();
    let amount = parse_amount(fields[4])?;

    Ok(UsageRecord {
        date_time,
        transaction: fields[1].to_string(),
        product: fields[2].to_string(),
        line_item: fields[3].to_string(),
        amount,
        balance_details: fields[5].to_string(),
        order_date: fields[6].to_string(),
        payment: fields[7].to_string(),
        order_number: fields[8].to_string(),
        auth_code: fields[9].to_string(),
        total: fields[10].to_string(),
    })
}

/// Parses a money column: `$` signs are dropped and an empty value means zero.
pub(crate) fn parse_amount(amount: &str) -> Result<Decimal> {
    let cleaned = amount.replace('$', "");
    if cleaned.is_empty() {
        return Ok(Decimal::ZERO);
    }
    Decimal::from_str(&cleaned)
        .map_err(|e| Error::format(format!("invalid amount {:?}: {}", amount, e)))
}

#[cfg(test)]
#[path = "tests/decoder_tests.rs"]
mod tests;
