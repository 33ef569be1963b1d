use super::*;
use chrono::{NaiveDate, Timelike};
use proptest::prelude::*;
use rust_decimal_macros::dec;

const HEADER: &str = "DateTime,Transaction,Product,Line Item,Amount,BalanceDetails,OrderDate,Payment,OrderNumber,AuthCode,Total";

fn csv_with(rows: &[&str]) -> Vec<u8> {
    let mut out = String::from(HEADER);
    for row in rows {
        out.push('\n');
        out.push_str(row);
    }
    out.push('\n');
    out.into_bytes()
}

#[test]
fn test_header_only_decodes_to_empty() {
    let records = decode(HEADER.as_bytes()).unwrap();
    assert!(records.is_empty());
}

#[test]
fn test_empty_payload_decodes_to_empty() {
    assert!(decode(b"").unwrap().is_empty());
}

#[test]
fn test_header_is_not_validated() {
    let raw = b"this,is,not,a,header\nJan-05-2024 09:00 AM,Purchase,Monthly Pass,Adult,$91.00,$0.00,,,,,\n";
    let records = decode(raw).unwrap();
    assert_eq!(records.len(), 1);
}

#[test]
fn test_decodes_purchase_row() {
    let raw = csv_with(&["Jan-05-2024 09:00 AM,Purchase,Monthly Pass,Adult,$91.00,$0.00,,,,,"]);
    let records = decode(&raw).unwrap();

    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(
        record.date_time,
        NaiveDate::from_ymd_opt(2024, 1, 5)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
            .and_utc()
    );
    assert_eq!(record.transaction, "Purchase");
    assert_eq!(record.product, "Monthly Pass");
    assert_eq!(record.line_item, "Adult");
    assert_eq!(record.amount, dec!(91.00));
    assert_eq!(record.balance_details, "$0.00");
    assert_eq!(record.order_date, "");
    assert_eq!(record.total, "");
}

#[test]
fn test_passthrough_fields_map_positionally() {
    let raw = csv_with(&[
        "Feb-01-2024 10:15 AM,Load,Stored Value,Web,$20.00,$35.50,Feb-01-2024,Visa,ORD-77,AUTH9,$20.00",
    ]);
    let record = &decode(&raw).unwrap()[0];
    assert_eq!(record.order_date, "Feb-01-2024");
    assert_eq!(record.payment, "Visa");
    assert_eq!(record.order_number, "ORD-77");
    assert_eq!(record.auth_code, "AUTH9");
    assert_eq!(record.total, "$20.00");
}

#[test]
fn test_pm_timestamp_uses_afternoon_hour() {
    let raw = csv_with(&["Jan-30-2018 06:08 PM,Tap in,Stored Value,Bus,$2.40,$10.00,,,,,"]);
    let record = &decode(&raw).unwrap()[0];
    assert_eq!(record.date_time.date_naive(), NaiveDate::from_ymd_opt(2018, 1, 30).unwrap());
    assert_eq!(record.date_time.hour(), 18);
    assert_eq!(record.date_time.minute(), 8);
}

#[test]
fn test_midnight_hour_is_am() {
    let raw = csv_with(&["Mar-02-2020 12:30 AM,Tap out,Stored Value,SkyTrain,,,,,,,"]);
    let record = &decode(&raw).unwrap()[0];
    assert_eq!(record.date_time.hour(), 0);
    assert_eq!(record.date_time.minute(), 30);
}

#[test]
fn test_parse_amount_variants() {
    assert_eq!(parse_amount("$12.50").unwrap(), dec!(12.50));
    assert_eq!(parse_amount("").unwrap(), dec!(0.0));
    assert_eq!(parse_amount("$").unwrap(), dec!(0));
    assert_eq!(parse_amount("12.50").unwrap(), dec!(12.50));
    assert_eq!(parse_amount("-$3.05").unwrap(), dec!(-3.05));
    assert!(matches!(parse_amount("abc"), Err(Error::Format { .. })));
}

#[test]
fn test_bad_amount_fails_row() {
    let raw = csv_with(&["Jan-05-2024 09:00 AM,Purchase,Monthly Pass,Adult,abc,$0.00,,,,,"]);
    let err = decode(&raw).unwrap_err();
    assert!(matches!(err, Error::Format { .. }));
    assert!(err.to_string().contains("row 2"));
}

#[test]
fn test_bad_timestamp_returns_no_partial_results() {
    let raw = csv_with(&[
        "Jan-05-2024 09:00 AM,Purchase,Monthly Pass,Adult,$91.00,$0.00,,,,,",
        "2024-01-06 09:00,Purchase,Monthly Pass,Adult,$91.00,$0.00,,,,,",
        "Jan-07-2024 09:00 AM,Purchase,Monthly Pass,Adult,$91.00,$0.00,,,,,",
    ]);
    let err = decode(&raw).unwrap_err();
    assert!(matches!(err, Error::Format { .. }));
    assert!(err.to_string().contains("row 3"));
}

#[test]
fn test_short_row_is_rejected() {
    let raw = csv_with(&["Jan-05-2024 09:00 AM,Purchase,Monthly Pass,Adult,$91.00"]);
    let err = decode(&raw).unwrap_err();
    assert!(matches!(err, Error::Format { .. }));
    assert!(err.to_string().contains("at least 11 fields"));
}

#[test]
fn test_latin1_passthrough_field_is_decoded_lossily() {
    let mut raw = csv_with(&[]);
    raw.extend_from_slice(b"Jan-05-2024 09:00 AM,Purchase,Caf\xe9 Pass,Adult,$91.00,$0.00,,,,,\n");

    let records = decode(&raw).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].product, "Caf\u{FFFD} Pass");
    assert_eq!(records[0].amount, dec!(91.00));
}

#[test]
fn test_undecodable_bytes_report_the_row() {
    let mut raw = csv_with(&["Jan-05-2024 09:00 AM,Purchase,Monthly Pass,Adult,$91.00,$0.00,,,,,"]);
    raw.extend_from_slice(b"\xff\xfe,Purchase,Monthly Pass,Adult,$91.00,$0.00,,,,,\n");

    let err = decode(&raw).unwrap_err();
    assert!(matches!(err, Error::Format { .. }));
    assert!(err.to_string().contains("row 3: invalid timestamp"), "{}", err);
}

#[test]
fn test_extra_fields_are_ignored() {
    let raw = csv_with(&["Jan-05-2024 09:00 AM,Purchase,Monthly Pass,Adult,$91.00,$0.00,,,,,,extra"]);
    assert_eq!(decode(&raw).unwrap().len(), 1);
}

#[test]
fn test_quoted_fields_keep_commas() {
    let raw = csv_with(&[
        "Jan-05-2024 09:00 AM,Purchase,\"Pass, Zone 1\",Adult,\"$1,000\",$0.00,,,,,",
    ]);
    // The amount column keeps its thousands separator, which is not a decimal.
    assert!(decode(&raw).is_err());

    let raw = csv_with(&["Jan-05-2024 09:00 AM,Purchase,\"Pass, Zone 1\",Adult,$5,$0.00,,,,,"]);
    assert_eq!(decode(&raw).unwrap()[0].product, "Pass, Zone 1");
}

#[test]
fn test_row_order_is_preserved() {
    let raw = csv_with(&[
        "Jan-09-2024 09:00 AM,Tap in,Stored Value,Bus,$2.40,,,,,,",
        "Jan-02-2024 09:00 AM,Tap in,Stored Value,Bus,$3.15,,,,,,",
        "Jan-05-2024 09:00 AM,Tap in,Stored Value,Bus,$4.20,,,,,,",
    ]);
    let amounts: Vec<_> = decode(&raw).unwrap().iter().map(|r| r.amount).collect();
    assert_eq!(amounts, vec![dec!(2.40), dec!(3.15), dec!(4.20)]);
}

#[test]
fn test_balance_amount_parses_on_demand() {
    let raw = csv_with(&[
        "Jan-05-2024 09:00 AM,Purchase,Monthly Pass,Adult,$91.00,$12.25,,,,,",
        "Jan-06-2024 09:00 AM,Purchase,Monthly Pass,Adult,$91.00,Pass active,,,,,",
    ]);
    let records = decode(&raw).unwrap();
    assert_eq!(records[0].balance_amount().unwrap(), dec!(12.25));
    assert!(records[1].balance_amount().is_err());
}

#[test]
fn test_decode_is_idempotent() {
    let raw = csv_with(&[
        "Jan-05-2024 09:00 AM,Purchase,Monthly Pass,Adult,$91.00,$0.00,,,,,",
        "Jan-30-2018 06:08 PM,Tap in,Stored Value,Bus,$2.40,$10.00,,,,,",
    ]);
    assert_eq!(decode(&raw).unwrap(), decode(&raw).unwrap());
}

proptest! {
    #[test]
    fn prop_decode_is_deterministic(input in "[A-Za-z0-9$,.: \\-\"\n]{0,200}") {
        prop_assert_eq!(decode(input.as_bytes()), decode(input.as_bytes()));
    }
}
