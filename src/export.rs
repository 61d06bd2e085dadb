use chrono::NaiveDate;

use crate::types::Lead;

/// Column order is part of the export contract: changing it is a breaking
/// change for downstream spreadsheets.
const HEADERS: [&str; 9] = [
    "Name", "City", "Phone", "Normalized", "Type", "Website", "Instagram", "Facebook", "Status",
];

pub const CSV_MIME_TYPE: &str = "text/csv";

/// Render leads as CSV, one row per lead in input order, header first.
/// Every field is quoted; embedded quotes are doubled per RFC 4180, since
/// business names routinely contain them. Missing optionals become empty
/// fields. Total: never fails.
pub fn to_csv(leads: &[Lead]) -> String {
    let mut rows = Vec::with_capacity(leads.len() + 1);
    rows.push(csv_row(HEADERS.iter().map(|h| h.to_string())));
    for lead in leads {
        rows.push(csv_row(
            [
                lead.name.clone(),
                lead.city.clone(),
                lead.phone.clone(),
                lead.normalized_phone.clone(),
                lead.phone_type.to_string(),
                lead.website.clone().unwrap_or_default(),
                lead.instagram.clone().unwrap_or_default(),
                lead.facebook.clone().unwrap_or_default(),
                lead.status.to_string(),
            ]
            .into_iter(),
        ));
    }
    rows.join("\n")
}

fn csv_row(fields: impl Iterator<Item = String>) -> String {
    fields
        .map(|f| format!("\"{}\"", f.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(",")
}

/// `leadminer_<city>_<ISO-date>.csv`; the date carries no time component.
pub fn file_name(city: &str, date: NaiveDate) -> String {
    format!("leadminer_{}_{}.csv", city, date.format("%Y-%m-%d"))
}
