use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Provenance tag stamped on every imported document.
pub const TAG: &str = "ftc_dnc";

/// Subject used when the source row has none.
pub const DEFAULT_SUBJECT: &str = "Other";

/// A CSV row as written to the collection.
#[derive(Debug, Clone, PartialEq)]
pub struct RowRecord {
    pub company_phone_number: String,
    pub created_date: Option<String>,
    pub violation_date: Option<String>,
    pub consumer_city: Option<String>,
    pub consumer_state: Option<String>,
    pub consumer_area_code: Option<String>,
    pub subject: String,
    pub tag: String,
    pub ingested_at: DateTime<Utc>,
}

/// Prefix the North American country code unless it is already there.
///
/// Not validated beyond that: `"5551234567"` becomes `"15551234567"`, an
/// empty value stays empty.
pub fn normalize_phone(raw: &str) -> String {
    let phone = raw.trim();
    if phone.is_empty() || phone.starts_with('1') {
        phone.to_string()
    } else {
        format!("1{}", phone)
    }
}

/// Map a header-keyed CSV row to the stored document shape.
pub fn normalize_row(row: &HashMap<String, String>) -> RowRecord {
    normalize_row_at(row, Utc::now())
}

pub fn normalize_row_at(row: &HashMap<String, String>, now: DateTime<Utc>) -> RowRecord {
    let field = |name: &str| row.get(name).cloned();

    let subject = match row.get("subject") {
        Some(s) if !s.is_empty() => s.clone(),
        _ => DEFAULT_SUBJECT.to_string(),
    };

    RowRecord {
        company_phone_number: normalize_phone(
            row.get("company-phone-number").map(String::as_str).unwrap_or(""),
        ),
        created_date: field("created-date"),
        violation_date: field("violation-date"),
        consumer_city: field("consumer-city"),
        consumer_state: field("consumer-state"),
        consumer_area_code: field("consumer-area-code"),
        subject,
        tag: TAG.to_string(),
        ingested_at: now,
    }
}
