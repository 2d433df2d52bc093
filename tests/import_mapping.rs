use fulfillment_engine::{
    error::AppError,
    import::{
        decode::{decode_upload, read_table},
        mapping::{
            Field, HeaderMap, UNKNOWN_ADDRESS, UNKNOWN_CUSTOMER, UNKNOWN_PHONE, map_headers,
            parse_money, parse_row,
        },
    },
};
use rust_decimal::Decimal;
use std::str::FromStr;

const STANDARD_HEADERS: [&str; 9] = [
    "Order Code",
    "Customer Name",
    "Mobile Number",
    "Shipping Address",
    "Product ID/Code",
    "Quantity",
    "Price Per Unit (AED)",
    "Product Variant",
    "Notes",
];

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn standard_map() -> HeaderMap {
    map_headers(&strings(&STANDARD_HEADERS)).expect("standard headers map")
}

fn dec(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap()
}

#[test]
fn standard_headers_map_to_their_fields() {
    let map = standard_map();
    assert_eq!(map.column(Field::OrderCode), Some(0));
    assert_eq!(map.column(Field::Customer), Some(1));
    assert_eq!(map.column(Field::Phone), Some(2));
    assert_eq!(map.column(Field::Address), Some(3));
    assert_eq!(map.column(Field::Product), Some(4));
    assert_eq!(map.column(Field::Quantity), Some(5));
    assert_eq!(map.column(Field::Price), Some(6));
    assert_eq!(map.column(Field::Variant), Some(7));
    assert_eq!(map.column(Field::Notes), Some(8));
    assert!(map.unclaimed.is_empty());
}

#[test]
fn loose_header_names_still_match() {
    let map = map_headers(&strings(&[
        "\u{feff}CUSTOMER",
        "Phone",
        "Delivery Address",
        "SKU",
        "Total Price",
        "Unit Price",
        "Reference",
    ]))
    .unwrap();
    assert_eq!(map.column(Field::Customer), Some(0));
    assert_eq!(map.column(Field::Phone), Some(1));
    assert_eq!(map.column(Field::Address), Some(2));
    assert_eq!(map.column(Field::Product), Some(3));
    assert_eq!(map.column(Field::Price), Some(5));
    assert_eq!(map.unclaimed, vec![4, 6]);
}

#[test]
fn missing_essential_columns_are_named() {
    let err = map_headers(&strings(&["Customer Name", "Quantity"])).unwrap_err();
    let AppError::Validation { field, reason } = err else {
        panic!("expected a validation error");
    };
    assert_eq!(field, "file");
    for label in ["Mobile Number", "Shipping Address", "Product ID/Code"] {
        assert!(reason.contains(label), "{reason}");
    }
    assert!(!reason.contains("Customer Name"));
}

#[test]
fn parses_a_complete_row() {
    let cells = strings(&[
        "",
        "Jane Doe",
        "050 123 4567",
        "Villa 1, Jumeirah",
        "SKU-1",
        "2",
        "AED 1,250.50",
        "Red, Blue",
        "leave at door",
    ]);
    let outcome = parse_row(&cells, &standard_map());
    assert!(outcome.warnings.is_empty(), "{:?}", outcome.warnings);
    let row = outcome.row.expect("row");

    assert_eq!(row.order_code, None);
    assert_eq!(row.customer, "Jane Doe");
    assert_eq!(row.phone, "+971501234567");
    assert_eq!(row.product_ref.as_deref(), Some("SKU-1"));
    assert_eq!(row.quantity, 2);
    assert_eq!(row.price, Some(dec("1250.50")));
    assert_eq!(row.variants, vec!["Red".to_string(), "Blue".to_string()]);
    assert!(row.fans_out());
    assert_eq!(row.notes_for(Some("Blue")), "leave at door\nProduct Variant: Blue");
}

#[test]
fn empty_cells_fall_back_to_placeholders() {
    let cells = strings(&["", "", "", "", "", "", "", "", ""]);
    let outcome = parse_row(&cells, &standard_map());
    let row = outcome.row.expect("row");

    assert_eq!(row.customer, UNKNOWN_CUSTOMER);
    assert_eq!(row.phone, UNKNOWN_PHONE);
    assert_eq!(row.address, UNKNOWN_ADDRESS);
    assert_eq!(row.product_ref, None);
    assert_eq!(row.quantity, 1);
    assert_eq!(row.price, None);
    assert_eq!(outcome.warnings.len(), 4);
}

#[test]
fn swapped_name_and_phone_are_put_back() {
    let cells = strings(&["", "0501234567", "Jane Doe", "Dubai", "SKU-1", "1", "10", "", ""]);
    let outcome = parse_row(&cells, &standard_map());
    let row = outcome.row.expect("row");

    assert_eq!(row.customer, "Jane Doe");
    assert_eq!(row.phone, "+971501234567");
    assert!(outcome.warnings.iter().any(|w| w.contains("swapped")));
}

#[test]
fn order_code_in_the_customer_column_is_moved() {
    let cells = strings(&["", "#250122007", "0501234567", "Dubai", "SKU-1", "1", "10", "", ""]);
    let row = parse_row(&cells, &standard_map()).row.expect("row");

    assert_eq!(row.order_code.as_deref(), Some("#250122007"));
    assert_eq!(row.customer, UNKNOWN_CUSTOMER);
}

#[test]
fn decimal_quantity_and_integer_price_are_swapped() {
    let cells = strings(&["", "Jane", "0501234567", "Dubai", "SKU-1", "12.5", "3", "", ""]);
    let row = parse_row(&cells, &standard_map()).row.expect("row");

    assert_eq!(row.quantity, 3);
    assert_eq!(row.price, Some(dec("12.5")));
}

#[test]
fn bad_quantity_warns_and_bad_price_rejects() {
    let map = standard_map();

    let cells = strings(&["", "Jane", "0501234567", "Dubai", "SKU-1", "lots", "10", "", ""]);
    let outcome = parse_row(&cells, &map);
    assert_eq!(outcome.row.expect("row").quantity, 1);
    assert!(outcome.warnings.iter().any(|w| w.contains("invalid quantity")));

    let cells = strings(&["", "Jane", "0501234567", "Dubai", "SKU-1", "1", "-5", "", ""]);
    let outcome = parse_row(&cells, &map);
    assert!(outcome.row.is_none());
    assert_eq!(outcome.errors, vec!["price cannot be negative".to_string()]);

    let cells = strings(&["", "Jane", "0501234567", "Dubai", "SKU-1", "1", "ten", "", ""]);
    assert!(parse_row(&cells, &map).row.is_none());
}

#[test]
fn unclaimed_columns_are_sniffed_for_codes() {
    let map = map_headers(&strings(&[
        "Customer Name",
        "Mobile Number",
        "Shipping Address",
        "Product",
        "Reference",
    ]))
    .unwrap();
    let cells = strings(&["Jane", "0501234567", "Dubai", "SKU-1", "ORD-7781"]);
    let row = parse_row(&cells, &map).row.expect("row");
    assert_eq!(row.order_code.as_deref(), Some("ORD-7781"));
}

#[test]
fn order_dates_accept_iso_dates_only() {
    let map = map_headers(&strings(&[
        "Customer Name",
        "Mobile Number",
        "Shipping Address",
        "Product",
        "Order Date",
    ]))
    .unwrap();

    let cells = strings(&["Jane", "0501234567", "Dubai", "SKU-1", "2025-01-22 14:05"]);
    let row = parse_row(&cells, &map).row.expect("row");
    assert_eq!(row.order_date, chrono::NaiveDate::from_ymd_opt(2025, 1, 22));

    let cells = strings(&["Jane", "0501234567", "Dubai", "SKU-1", "22/01/2025"]);
    let outcome = parse_row(&cells, &map);
    assert_eq!(outcome.row.expect("row").order_date, None);
    assert!(outcome.warnings.iter().any(|w| w.contains("invalid order date")));
}

#[test]
fn money_accepts_currency_tags_and_separators() {
    assert_eq!(parse_money("1,299.00 AED"), Some(dec("1299.00")));
    assert_eq!(parse_money(" 45 "), Some(dec("45")));
    assert_eq!(parse_money("free"), None);
}

#[test]
fn latin1_uploads_are_decoded() {
    let text = decode_upload(b"Customer Name\nCaf\xe9 Owner\n", 1024).unwrap();
    assert_eq!(text, "Customer Name\nCafé Owner\n");

    let text = decode_upload("\u{feff}Name\nZoë\n".as_bytes(), 1024).unwrap();
    assert_eq!(text, "Name\nZoë\n");
}

#[test]
fn oversized_uploads_are_refused() {
    let err = decode_upload(&[b'a'; 32], 16).unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "file"));
}

#[test]
fn blank_records_are_skipped_and_lines_kept() {
    let table =
        read_table("Customer Name,Mobile Number\nJane,0501234567\n,\nOmar,0559876543\n".as_bytes()).unwrap();
    assert_eq!(table.headers, strings(&["Customer Name", "Mobile Number"]));
    let lines: Vec<usize> = table.rows.iter().map(|(line, _)| *line).collect();
    assert_eq!(lines, vec![2, 4]);
    assert_eq!(table.rows[1].1, strings(&["Omar", "0559876543"]));
}

#[test]
fn unreadable_records_are_set_aside_and_reading_continues() {
    let upload: &[u8] = b"Customer Name,Mobile Number\nJane,0501234567\n\xff\xfe,0501112222\nOmar,0559876543\n";
    let table = read_table(upload).unwrap();

    let lines: Vec<usize> = table.rows.iter().map(|(line, _)| *line).collect();
    assert_eq!(lines, vec![2, 4]);
    assert_eq!(table.malformed.len(), 1);
    assert_eq!(table.malformed[0].0, 3);
    assert!(table.malformed[0].1.starts_with("malformed CSV record"));
}

#[test]
fn export_headers_read_back_as_import_columns() {
    let map = map_headers(&strings(&fulfillment_engine::services::order_service::EXPORT_HEADERS)).unwrap();
    assert_eq!(map.column(Field::OrderCode), Some(0));
    assert_eq!(map.column(Field::Customer), Some(1));
    assert_eq!(map.column(Field::Phone), Some(2));
    assert_eq!(map.column(Field::Product), Some(3));
    assert_eq!(map.column(Field::Quantity), Some(4));
    assert_eq!(map.column(Field::OrderDate), Some(7));
    assert_eq!(map.column(Field::Notes), Some(9));
    assert_eq!(map.column(Field::Address), Some(10));
    assert_eq!(map.column(Field::Price), Some(11));
}
