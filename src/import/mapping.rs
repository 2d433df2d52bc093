//! Header recognition and per-row field extraction for order imports.
//!
//! Headers are matched case-insensitively, exact names first and then by
//! substring. Values are then sniffed so that files with swapped columns still
//! land in the right fields.

use std::{collections::HashMap, str::FromStr};

use chrono::NaiveDate;
use rust_decimal::{Decimal, prelude::ToPrimitive};

use crate::{
    error::{AppError, AppResult},
    order_code, phone,
};

pub const UNKNOWN_CUSTOMER: &str = "Unknown Customer";
pub const UNKNOWN_PHONE: &str = "0000000000";
pub const UNKNOWN_ADDRESS: &str = "Address not provided";
pub const UNKNOWN_PRODUCT: &str = "Unknown Product";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    OrderCode,
    Customer,
    Phone,
    Address,
    Product,
    Quantity,
    Price,
    Variant,
    Notes,
    ProductLink,
    OrderDate,
    City,
    Emirate,
    Area,
}

impl Field {
    pub fn label(&self) -> &'static str {
        match self {
            Field::OrderCode => "Order Code",
            Field::Customer => "Customer Name",
            Field::Phone => "Mobile Number",
            Field::Address => "Shipping Address",
            Field::Product => "Product ID/Code",
            Field::Quantity => "Quantity",
            Field::Price => "Price Per Unit",
            Field::Variant => "Product Variant",
            Field::Notes => "Notes",
            Field::ProductLink => "Product Link",
            Field::OrderDate => "Order Date",
            Field::City => "City",
            Field::Emirate => "Emirate",
            Field::Area => "Area",
        }
    }
}

pub const ESSENTIAL: [Field; 4] = [Field::Customer, Field::Phone, Field::Address, Field::Product];

struct Matcher {
    field: Field,
    exact: &'static [&'static str],
    contains: &'static [&'static str],
    exclude: &'static [&'static str],
}

// Claim order matters: narrower product-prefixed headers go before the
// generic product column, and totals never count as unit prices.
const MATCHERS: &[Matcher] = &[
    Matcher {
        field: Field::ProductLink,
        exact: &["product link", "link", "url"],
        contains: &["link", "url"],
        exclude: &[],
    },
    Matcher {
        field: Field::Variant,
        exact: &["product variant", "variant"],
        contains: &["variant"],
        exclude: &[],
    },
    Matcher {
        field: Field::OrderCode,
        exact: &["order code", "order id", "order number", "order #"],
        contains: &["order code", "order id", "order number"],
        exclude: &[],
    },
    Matcher {
        field: Field::OrderDate,
        exact: &["order date", "date"],
        contains: &["date"],
        exclude: &[],
    },
    Matcher {
        field: Field::Phone,
        exact: &["mobile number", "customer phone", "phone", "mobile"],
        contains: &["mobile", "phone", "contact number", "tel"],
        exclude: &[],
    },
    Matcher {
        field: Field::Customer,
        exact: &["customer name", "customer", "name", "client"],
        contains: &["customer name", "customer", "client"],
        exclude: &["phone", "email", "address"],
    },
    Matcher {
        field: Field::Address,
        exact: &["shipping address", "address", "street"],
        contains: &["address", "street"],
        exclude: &["email"],
    },
    Matcher {
        field: Field::Product,
        exact: &["product id/code", "product code", "product id", "product", "sku"],
        contains: &["product", "sku"],
        exclude: &["price"],
    },
    Matcher {
        field: Field::Quantity,
        exact: &["quantity", "qty"],
        contains: &["quantity", "qty"],
        exclude: &[],
    },
    Matcher {
        field: Field::Price,
        exact: &["price per unit", "unit price", "price"],
        contains: &["price per unit", "unit price", "price"],
        exclude: &["total"],
    },
    Matcher {
        field: Field::Notes,
        exact: &["notes", "note", "comments", "remarks"],
        contains: &["note", "comment", "remark"],
        exclude: &[],
    },
    Matcher {
        field: Field::City,
        exact: &["city"],
        contains: &["city"],
        exclude: &[],
    },
    Matcher {
        field: Field::Emirate,
        exact: &["emirate", "state"],
        contains: &["emirate"],
        exclude: &[],
    },
    Matcher {
        field: Field::Area,
        exact: &["area"],
        contains: &["area"],
        exclude: &["delivery"],
    },
];

/// Which column carries which field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    columns: HashMap<Field, usize>,
    /// Columns no matcher claimed; their values are sniffed.
    pub unclaimed: Vec<usize>,
}

impl HeaderMap {
    pub fn column(&self, field: Field) -> Option<usize> {
        self.columns.get(&field).copied()
    }
}

fn normalize_header(header: &str) -> String {
    header.trim_start_matches('\u{feff}').trim().to_lowercase()
}

/// Map header names to fields. Fails when an essential column is absent.
pub fn map_headers(headers: &[String]) -> AppResult<HeaderMap> {
    let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
    let mut claimed = vec![false; normalized.len()];
    let mut columns = HashMap::new();

    for matcher in MATCHERS {
        let exact = matcher.exact.iter().find_map(|needle| {
            normalized
                .iter()
                .enumerate()
                .find(|(i, h)| !claimed[*i] && h.as_str() == *needle)
                .map(|(i, _)| i)
        });
        let found = exact.or_else(|| {
            matcher.contains.iter().find_map(|needle| {
                normalized
                    .iter()
                    .enumerate()
                    .find(|(i, h)| {
                        !claimed[*i]
                            && h.contains(needle)
                            && !matcher.exclude.iter().any(|ex| h.contains(ex))
                    })
                    .map(|(i, _)| i)
            })
        });
        if let Some(idx) = found {
            claimed[idx] = true;
            columns.insert(matcher.field, idx);
        }
    }

    let missing: Vec<&str> = ESSENTIAL
        .iter()
        .filter(|f| !columns.contains_key(*f))
        .map(Field::label)
        .collect();
    if !missing.is_empty() {
        return Err(AppError::validation(
            "file",
            format!("missing essential columns: {}", missing.join(", ")),
        ));
    }

    let unclaimed = claimed
        .iter()
        .enumerate()
        .filter(|(i, taken)| !**taken && !normalized[*i].is_empty())
        .map(|(i, _)| i)
        .collect();
    Ok(HeaderMap { columns, unclaimed })
}

/// One row after mapping, defaults and sniffing.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow {
    pub order_code: Option<String>,
    pub customer: String,
    pub phone: String,
    pub address: String,
    /// Raw product reference; `None` when the row named no product.
    pub product_ref: Option<String>,
    pub quantity: i32,
    /// `None` when the row carried no price; the product price applies then.
    pub price: Option<Decimal>,
    pub variants: Vec<String>,
    pub notes: String,
    pub product_link: String,
    pub order_date: Option<NaiveDate>,
    pub city: String,
    pub emirate: String,
    pub area: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowOutcome {
    pub row: Option<ParsedRow>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ParsedRow {
    /// Notes for one fanned-out order, or for the row itself when `variant` is None.
    pub fn notes_for(&self, variant: Option<&str>) -> String {
        let line = match variant {
            Some(v) => Some(format!("Product Variant: {v}")),
            None => self.variants.first().map(|v| format!("Product Variant: {v}")),
        };
        match (self.notes.is_empty(), line) {
            (_, None) => self.notes.clone(),
            (true, Some(line)) => line,
            (false, Some(line)) => format!("{}\n{line}", self.notes),
        }
    }

    pub fn fans_out(&self) -> bool {
        self.variants.len() > 1
    }
}

/// Turn one record into a [`ParsedRow`] plus warnings. Problems that make the
/// row unusable come back in `errors` with `row = None`.
pub fn parse_row(cells: &[String], map: &HeaderMap) -> RowOutcome {
    let mut warnings = Vec::new();
    let mut errors = Vec::new();

    let cell = |field: Field| -> String {
        map.column(field)
            .and_then(|i| cells.get(i))
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    };

    let mut order_code = cell(Field::OrderCode);
    let mut customer = cell(Field::Customer);
    let mut phone_raw = cell(Field::Phone);
    let mut address = cell(Field::Address);
    let mut product = cell(Field::Product);
    let mut quantity_raw = cell(Field::Quantity);
    let mut price_raw = cell(Field::Price);

    // Order identifiers in a person or contact column.
    for slot in [&mut customer, &mut phone_raw, &mut address] {
        if order_code.is_empty() && order_code::looks_like_order_code(slot) {
            order_code = std::mem::take(slot);
        }
    }

    // A phone number where the name should be, and text where the phone should be.
    if phone::looks_like_phone(&customer) && !phone::looks_like_phone(&phone_raw) {
        std::mem::swap(&mut customer, &mut phone_raw);
        warnings.push("customer name and mobile number looked swapped; swapped them".into());
    }
    if is_numeric_name(&customer) {
        warnings.push(format!(
            "customer name '{customer}' is numeric; kept it as the customer name"
        ));
    }

    // Quantity holding a decimal and price holding an integer.
    if quantity_raw.contains('.') && !price_raw.is_empty() && !price_raw.contains('.') {
        std::mem::swap(&mut quantity_raw, &mut price_raw);
    }

    for &idx in &map.unclaimed {
        let Some(value) = cells.get(idx).map(|v| v.trim()) else {
            continue;
        };
        if value.is_empty() {
            continue;
        }
        if order_code.is_empty() && order_code::looks_like_order_code(value) {
            order_code = value.to_string();
        } else if phone_raw.is_empty() && phone::looks_like_phone(value) {
            phone_raw = value.to_string();
        }
    }

    if customer.is_empty() {
        warnings.push(format!("customer name missing, using '{UNKNOWN_CUSTOMER}'"));
        customer = UNKNOWN_CUSTOMER.to_string();
    }
    let phone = if phone_raw.is_empty() {
        warnings.push(format!("mobile number missing, using '{UNKNOWN_PHONE}'"));
        UNKNOWN_PHONE.to_string()
    } else {
        phone::normalize_or_keep(&phone_raw)
    };
    if address.is_empty() {
        warnings.push(format!("shipping address missing, using '{UNKNOWN_ADDRESS}'"));
        address = UNKNOWN_ADDRESS.to_string();
    }
    let product_ref = if product.is_empty() || product == UNKNOWN_PRODUCT {
        warnings.push("product ID/Code missing; order will have no product".into());
        None
    } else {
        Some(std::mem::take(&mut product))
    };

    let quantity = match parse_quantity(&quantity_raw) {
        Some(q) if q > 0 => q,
        _ if quantity_raw.is_empty() => 1,
        _ => {
            warnings.push(format!("invalid quantity '{quantity_raw}', using 1"));
            1
        }
    };

    let price = if price_raw.is_empty() {
        None
    } else {
        match parse_money(&price_raw) {
            Some(p) if p.is_sign_negative() => {
                errors.push("price cannot be negative".to_string());
                None
            }
            Some(p) => Some(p),
            None => {
                errors.push(format!("invalid price '{price_raw}'"));
                None
            }
        }
    };

    let date_raw = cell(Field::OrderDate);
    let order_date = if date_raw.is_empty() {
        None
    } else {
        match parse_date(&date_raw) {
            Some(d) => Some(d),
            None => {
                warnings.push(format!(
                    "invalid order date '{date_raw}' (expected YYYY-MM-DD), using today"
                ));
                None
            }
        }
    };

    let variants: Vec<String> = cell(Field::Variant)
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();

    if !errors.is_empty() {
        return RowOutcome {
            row: None,
            warnings,
            errors,
        };
    }

    RowOutcome {
        row: Some(ParsedRow {
            order_code: (!order_code.is_empty()).then_some(order_code),
            customer,
            phone,
            address,
            product_ref,
            quantity,
            price,
            variants,
            notes: cell(Field::Notes),
            product_link: cell(Field::ProductLink),
            order_date,
            city: cell(Field::City),
            emirate: cell(Field::Emirate),
            area: cell(Field::Area),
        }),
        warnings,
        errors,
    }
}

fn is_numeric_name(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}

fn parse_quantity(raw: &str) -> Option<i32> {
    let raw = raw.trim();
    raw.parse::<i32>().ok().or_else(|| {
        Decimal::from_str(raw)
            .ok()
            .and_then(|d| d.trunc().to_i32())
    })
}

/// Prices may carry a currency tag or thousands separators.
pub fn parse_money(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches("AED")
        .trim_end_matches("AED")
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    Decimal::from_str(&cleaned).ok()
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let date_part = raw.split_whitespace().next().unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}
