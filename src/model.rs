//! Contact records as served by the repository, plus the create/update payload.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

/// Opaque contact identifier, always compared in its stringified form.
///
/// The REST backend hands out numeric ids while the metadata record stores
/// strings, so both shapes deserialize into the same value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContactId(String);

impl ContactId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for ContactId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ContactId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<i64> for ContactId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl Serialize for ContactId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ContactId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Helper {
            Signed(i64),
            Unsigned(u64),
            Text(String),
        }

        let id = match Helper::deserialize(deserializer)? {
            Helper::Signed(value) => value.to_string(),
            Helper::Unsigned(value) => value.to_string(),
            Helper::Text(value) => value,
        };
        Ok(ContactId(id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: ContactId,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Contact {
    pub fn created_instant(&self) -> Option<OffsetDateTime> {
        non_empty(self.created_at.as_deref()).and_then(parse_timestamp)
    }

    /// Raw `updatedAt ?? createdAt`, skipping empty strings.
    pub fn activity_raw(&self) -> Option<&str> {
        non_empty(self.updated_at.as_deref()).or_else(|| non_empty(self.created_at.as_deref()))
    }

    pub fn activity_instant(&self) -> Option<OffsetDateTime> {
        self.activity_raw().and_then(parse_timestamp)
    }

    pub fn has_address(&self) -> bool {
        self.address
            .as_deref()
            .map(|address| !address.trim().is_empty())
            .unwrap_or(false)
    }

    /// Segment after the first `@`, if present and non-empty.
    pub fn email_domain(&self) -> Option<&str> {
        self.email.split('@').nth(1).filter(|domain| !domain.is_empty())
    }

    pub fn initials(&self) -> String {
        self.name
            .split(' ')
            .filter_map(|part| part.chars().next())
            .take(2)
            .collect::<String>()
            .to_uppercase()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}

/// Parse the timestamp shapes the backends emit. Offset-less values are UTC.
pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(ts) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(ts);
    }

    let with_fraction =
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]");
    let with_seconds = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    let with_minutes = format_description!("[year]-[month]-[day]T[hour]:[minute]");
    for format in [with_fraction, with_seconds, with_minutes] {
        if let Ok(ts) = PrimitiveDateTime::parse(raw, format) {
            return Some(ts.assume_utc());
        }
    }

    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .ok()
        .map(|date| date.midnight().assume_utc())
}

pub fn format_iso(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339).unwrap_or_else(|_| ts.to_string())
}

/// `Jan 2, 2024`
pub fn format_short_date(ts: OffsetDateTime) -> String {
    let format = format_description!("[month repr:short] [day padding:none], [year]");
    ts.format(format).unwrap_or_else(|_| ts.date().to_string())
}

/// Short date for a record timestamp; unparseable text is shown as-is.
pub fn format_record_date(raw: Option<&str>) -> String {
    match non_empty(raw) {
        None => String::new(),
        Some(raw) => parse_timestamp(raw)
            .map(format_short_date)
            .unwrap_or_else(|| raw.to_string()),
    }
}

pub fn format_touched(raw: Option<&str>) -> String {
    non_empty(raw)
        .and_then(parse_timestamp)
        .map(format_short_date)
        .unwrap_or_else(|| "Not touched yet".to_string())
}

pub fn format_last_activity(ts: Option<OffsetDateTime>) -> String {
    ts.map(format_short_date).unwrap_or_else(|| "—".to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    Name,
    Email,
    Phone,
    Address,
}

impl DraftField {
    pub const ALL: [DraftField; 4] = [
        DraftField::Name,
        DraftField::Email,
        DraftField::Phone,
        DraftField::Address,
    ];

    pub fn label(self) -> &'static str {
        match self {
            DraftField::Name => "Name",
            DraftField::Email => "Email",
            DraftField::Phone => "Phone",
            DraftField::Address => "Address",
        }
    }

    pub fn required(self) -> bool {
        !matches!(self, DraftField::Address)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: DraftField,
    pub message: &'static str,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message)
    }
}

/// Payload for create and update requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDraft {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: Option<String>,
}

impl ContactDraft {
    pub fn from_contact(contact: &Contact) -> Self {
        Self {
            name: contact.name.clone(),
            email: contact.email.clone(),
            phone: contact.phone.clone(),
            address: contact.address.clone(),
        }
    }

    pub fn value(&self, field: DraftField) -> &str {
        match field {
            DraftField::Name => &self.name,
            DraftField::Email => &self.email,
            DraftField::Phone => &self.phone,
            DraftField::Address => self.address.as_deref().unwrap_or(""),
        }
    }

    /// Trimmed copy; a blank address becomes absent.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.trim().to_string(),
            address: self
                .address
                .map(|address| address.trim().to_string())
                .filter(|address| !address.is_empty()),
        }
    }

    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push(FieldError {
                field: DraftField::Name,
                message: "Name is required",
            });
        }

        if self.email.trim().is_empty() {
            errors.push(FieldError {
                field: DraftField::Email,
                message: "Email is required",
            });
        } else if !email_pattern().is_match(&self.email) {
            errors.push(FieldError {
                field: DraftField::Email,
                message: "Invalid email format",
            });
        }

        if self.phone.trim().is_empty() {
            errors.push(FieldError {
                field: DraftField::Phone,
                message: "Phone is required",
            });
        } else {
            let compact: String = self
                .phone
                .chars()
                .filter(|c| !c.is_whitespace() && *c != '-')
                .collect();
            if !phone_pattern().is_match(&compact) {
                errors.push(FieldError {
                    field: DraftField::Phone,
                    message: "Phone must be at least 10 digits",
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern"))
}

fn phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[+]?[0-9]{10,}$").expect("phone pattern"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(name: &str, email: &str, phone: &str) -> ContactDraft {
        ContactDraft {
            name: name.into(),
            email: email.into(),
            phone: phone.into(),
            address: None,
        }
    }

    #[test]
    fn test_contact_id_accepts_numbers_and_strings() {
        let numeric: ContactId = serde_json::from_str("42").unwrap();
        let text: ContactId = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(numeric, text);
        assert_eq!(serde_json::to_string(&numeric).unwrap(), "\"42\"");
    }

    #[test]
    fn test_contact_deserializes_server_shape() {
        let raw = r#"{
            "id": 7,
            "name": "Ann Lee",
            "email": "ann@example.com",
            "phone": "+15551234567",
            "address": null,
            "createdAt": "2024-01-01T09:30:00.123456",
            "updatedAt": null
        }"#;
        let contact: Contact = serde_json::from_str(raw).unwrap();
        assert_eq!(contact.id.as_str(), "7");
        assert_eq!(contact.address, None);
        assert_eq!(contact.activity_raw(), Some("2024-01-01T09:30:00.123456"));
        assert!(contact.activity_instant().is_some());
    }

    #[test]
    fn test_parse_timestamp_shapes() {
        let date_only = parse_timestamp("2024-01-02").unwrap();
        assert_eq!(date_only.date().to_string(), "2024-01-02");
        assert_eq!(date_only.hour(), 0);

        assert!(parse_timestamp("2024-01-02T10:20:30Z").is_some());
        assert!(parse_timestamp("2024-01-02T10:20:30+02:00").is_some());
        assert!(parse_timestamp("2024-01-02T10:20:30").is_some());
        assert!(parse_timestamp("2024-01-02T10:20").is_some());
        assert!(parse_timestamp("2024-01-02T10:20:30.5").is_some());

        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("1/2/2024").is_none());
    }

    #[test]
    fn test_activity_prefers_updated_at() {
        let contact = Contact {
            id: "1".into(),
            name: "Bob".into(),
            email: String::new(),
            phone: String::new(),
            address: None,
            created_at: Some("2024-01-01".into()),
            updated_at: Some(String::new()),
        };
        // An empty updatedAt falls back to createdAt
        assert_eq!(contact.activity_raw(), Some("2024-01-01"));

        let updated = Contact {
            updated_at: Some("2024-03-01".into()),
            ..contact
        };
        assert_eq!(updated.activity_raw(), Some("2024-03-01"));
    }

    #[test]
    fn test_email_domain() {
        let mut contact = Contact {
            id: "1".into(),
            name: "Bob".into(),
            email: "bob@Example.com".into(),
            phone: String::new(),
            address: None,
            created_at: None,
            updated_at: None,
        };
        assert_eq!(contact.email_domain(), Some("Example.com"));

        contact.email = "bob@".into();
        assert_eq!(contact.email_domain(), None);

        contact.email = "no-at-sign".into();
        assert_eq!(contact.email_domain(), None);
    }

    #[test]
    fn test_has_address_trims() {
        let mut contact = Contact {
            id: "1".into(),
            name: "Bob".into(),
            email: String::new(),
            phone: String::new(),
            address: Some("   ".into()),
            created_at: None,
            updated_at: None,
        };
        assert!(!contact.has_address());
        contact.address = Some(" 1 Main St ".into());
        assert!(contact.has_address());
        contact.address = None;
        assert!(!contact.has_address());
    }

    #[test]
    fn test_validate_accepts_good_draft() {
        assert!(draft("Ann", "ann@example.com", "555-123-4567").validate().is_ok());
        assert!(draft("Ann", "ann@example.com", "+44 20 7946 0958").validate().is_ok());
    }

    #[test]
    fn test_validate_reports_each_field() {
        let errors = draft(" ", "", "").validate().unwrap_err();
        let messages: Vec<_> = errors.iter().map(|e| e.message).collect();
        assert_eq!(
            messages,
            vec!["Name is required", "Email is required", "Phone is required"]
        );

        let errors = draft("Ann", "ann@example", "12345").validate().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, DraftField::Email);
        assert_eq!(errors[0].message, "Invalid email format");
        assert_eq!(errors[1].field, DraftField::Phone);
        assert_eq!(errors[1].message, "Phone must be at least 10 digits");
    }

    #[test]
    fn test_normalized_drops_blank_address() {
        let mut d = draft(" Ann ", " ann@example.com", "5551234567 ");
        d.address = Some("  ".into());
        let n = d.normalized();
        assert_eq!(n.name, "Ann");
        assert_eq!(n.email, "ann@example.com");
        assert_eq!(n.phone, "5551234567");
        assert_eq!(n.address, None);
    }

    #[test]
    fn test_display_formats() {
        let ts = parse_timestamp("2024-01-02T10:00:00Z");
        assert_eq!(format_last_activity(ts), "Jan 2, 2024");
        assert_eq!(format_last_activity(None), "—");
        assert_eq!(format_touched(None), "Not touched yet");
        assert_eq!(format_touched(Some("garbage")), "Not touched yet");
        assert_eq!(format_record_date(Some("garbage")), "garbage");
        assert_eq!(format_record_date(None), "");
    }

    #[test]
    fn test_initials() {
        let contact = Contact {
            id: "1".into(),
            name: "ann marie lee".into(),
            email: String::new(),
            phone: String::new(),
            address: None,
            created_at: None,
            updated_at: None,
        };
        assert_eq!(contact.initials(), "AM");
    }
}
