use crate::types::{Lead, PhoneType, RawLead};

/// Ukrainian mobile operator codes (Vodafone, Kyivstar, Lifecell, 3Mob).
const MOBILE_CODES: &[&str] = &[
    "050", "066", "095", "099", // Vodafone
    "067", "068", "096", "097", "098", // Kyivstar
    "063", "073", "093", // Lifecell
    "091", "092", // 3Mob
];

/// Normalize a raw scraped phone string and classify it.
///
/// The normalized form keeps digits only, plus a single leading `+` when the
/// input had one. Classification runs on the Ukrainian 10-digit canonical
/// form; numbers that don't reduce to one are `Unknown`.
///
/// Total: every input yields a result, including empty and garbage strings.
/// Pure and deterministic; the cache and export layers rely on that.
pub fn normalize(raw: &str) -> (String, PhoneType) {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    let normalized = if raw.trim_start().starts_with('+') && !digits.is_empty() {
        format!("+{digits}")
    } else {
        digits.clone()
    };
    (normalized, classify(&digits))
}

/// Classify a digits-only string against the locale tables.
fn classify(digits: &str) -> PhoneType {
    let local = match canonical_ua(digits) {
        Some(local) => local,
        None => return PhoneType::Unknown,
    };
    let code = &local[0..3];
    if MOBILE_CODES.contains(&code) {
        return PhoneType::Mobile;
    }
    // Geographic area codes sit in the 03x–06x zones (044 Kyiv, 032 Lviv,
    // 048 Odesa, 056 Dnipro, ...). Mobile codes were already ruled out above.
    match local.as_bytes()[1] {
        b'3'..=b'6' => PhoneType::Landline,
        _ => PhoneType::Unknown,
    }
}

/// Reduce a digits-only string to the Ukrainian local form `0XXYYYYYYY`
/// (operator/area code + subscriber number). Returns None for shapes that
/// aren't Ukrainian numbers.
fn canonical_ua(digits: &str) -> Option<String> {
    let local = if digits.starts_with("38") && digits.len() > 10 {
        digits[2..].to_string()
    } else if digits.starts_with('8') && digits.len() > 10 {
        digits[1..].to_string()
    } else if digits.len() == 9 {
        // Subscriber wrote the operator code without its leading zero.
        format!("0{digits}")
    } else {
        digits.to_string()
    };

    if local.len() != 10 || !local.starts_with('0') || &local[0..3] == "000" {
        return None;
    }
    Some(local)
}

/// True when the number classifies as mobile; gates the messenger
/// deep-link actions.
pub fn is_mobile(raw: &str) -> bool {
    normalize(raw).1 == PhoneType::Mobile
}

/// Human-readable rendering: `(067) 123-45-67` for local numbers,
/// `+38 (067) 123-45-67` for international ones. Inputs that fit neither
/// shape are returned untouched.
pub fn format_for_display(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.len() {
        10 => format!(
            "({}) {}-{}-{}",
            &digits[0..3],
            &digits[3..6],
            &digits[6..8],
            &digits[8..10]
        ),
        12 => format!(
            "+{} ({}) {}-{}-{}",
            &digits[0..2],
            &digits[2..5],
            &digits[5..8],
            &digits[8..10],
            &digits[10..12]
        ),
        _ => raw.to_string(),
    }
}

/// Run one boundary lead through the normalization pipeline.
pub fn enrich(raw: RawLead) -> Lead {
    let (normalized_phone, phone_type) = normalize(&raw.phone);
    Lead {
        name: raw.name,
        address: raw.address,
        phone: raw.phone,
        normalized_phone,
        phone_type,
        website: raw.website,
        instagram: raw.instagram,
        facebook: raw.facebook,
        city: raw.city,
        status: raw.status,
    }
}
