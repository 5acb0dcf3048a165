use std::cmp::Ordering;

use deunicode::deunicode;

use crate::model::Contact;

/// Normalize a string for matching and collation.
/// Transliterates to ASCII and lowercases (e.g., "Élodie" -> "elodie").
pub fn normalize(s: &str) -> String {
    deunicode(s).to_lowercase()
}

pub fn normalize_query(query: &str) -> Option<String> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Substring match used by the offline backend: case-insensitive over name
/// and email, verbatim over phone.
pub fn matches_term(contact: &Contact, term: &str) -> bool {
    let lowered = term.to_lowercase();
    contact.name.to_lowercase().contains(&lowered)
        || contact.email.to_lowercase().contains(&lowered)
        || contact.phone.contains(term)
}

/// Locale-aware name ordering: base letters first, then accents, then case.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    normalize(a)
        .cmp(&normalize(b))
        .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
        .then_with(|| compare_case(a, b))
        .then_with(|| a.cmp(b))
}

// Lowercase sorts before uppercase at the first differing position.
fn compare_case(a: &str, b: &str) -> Ordering {
    for (x, y) in a.chars().zip(b.chars()) {
        if x == y {
            continue;
        }
        match (x.is_lowercase(), y.is_lowercase()) {
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => {}
        }
    }
    Ordering::Equal
}
