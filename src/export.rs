use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

use crate::model::Contact;

pub const HEADERS: [&str; 6] = ["Name", "Email", "Phone", "Address", "CreatedAt", "UpdatedAt"];

/// Header unquoted, every data field quoted, `\n` line endings.
pub fn render_csv<'a>(contacts: impl IntoIterator<Item = &'a Contact>) -> Result<String> {
    let mut header = WriterBuilder::new()
        .quote_style(QuoteStyle::Never)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    header.write_record(HEADERS)?;
    let mut out = header
        .into_inner()
        .map_err(|err| anyhow::anyhow!("failed to flush CSV header: {}", err.error()))?;

    let mut rows = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    for contact in contacts {
        rows.write_record([
            contact.name.as_str(),
            contact.email.as_str(),
            contact.phone.as_str(),
            contact.address.as_deref().unwrap_or(""),
            contact.created_at.as_deref().unwrap_or(""),
            contact.updated_at.as_deref().unwrap_or(""),
        ])?;
    }
    let body = rows
        .into_inner()
        .map_err(|err| anyhow::anyhow!("failed to flush CSV rows: {}", err.error()))?;
    out.extend(body);

    String::from_utf8(out).context("CSV output is not valid UTF-8")
}

/// `contacts-YYYY-MM-DD.csv` for the UTC date of `now`.
pub fn file_name(now: OffsetDateTime) -> String {
    let date = now.to_offset(UtcOffset::UTC).date();
    let stamp = date
        .format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| date.to_string());
    format!("contacts-{}.csv", stamp)
}

pub fn write_csv<'a>(
    dir: &Path,
    contacts: impl IntoIterator<Item = &'a Contact>,
    now: OffsetDateTime,
) -> Result<PathBuf> {
    let rendered = render_csv(contacts)?;
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(file_name(now));
    fs::write(&path, rendered).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}
