use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::model::{Contact, ContactDraft, ContactId};

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database {}", path.display()))?;

        let mut db = Self { conn };
        db.conn.pragma_update(None, "journal_mode", "WAL")?;
        db.setup()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let mut db = Self { conn };
        db.setup()?;
        Ok(db)
    }

    fn setup(&mut self) -> Result<()> {
        self.conn.pragma_update(None, "synchronous", "FULL")?;
        self.conn.pragma_update(None, "foreign_keys", "ON")?;

        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
              key   TEXT PRIMARY KEY,
              value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS contacts (
              id         INTEGER PRIMARY KEY AUTOINCREMENT,
              name       TEXT NOT NULL,
              email      TEXT NOT NULL UNIQUE,
              phone      TEXT NOT NULL,
              address    TEXT,
              created_at TEXT NOT NULL,
              updated_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_contacts_name ON contacts(name);
        "#,
        )?;
        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    pub fn put_value(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn list_contacts(&self) -> Result<Vec<Contact>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, email, phone, address, created_at, updated_at
             FROM contacts ORDER BY id",
        )?;
        let rows = stmt.query_map([], row_to_contact)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn get_contact(&self, id: i64) -> Result<Option<Contact>> {
        let contact = self
            .conn
            .query_row(
                "SELECT id, name, email, phone, address, created_at, updated_at
                 FROM contacts WHERE id = ?1",
                [id],
                row_to_contact,
            )
            .optional()?;
        Ok(contact)
    }

    /// Id of the contact owning `email`, if any.
    pub fn find_by_email(&self, email: &str) -> Result<Option<i64>> {
        let id = self
            .conn
            .query_row("SELECT id FROM contacts WHERE email = ?1", [email], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(id)
    }

    pub fn insert_contact(&self, draft: &ContactDraft, created_at: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO contacts (name, email, phone, address, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                draft.name,
                draft.email,
                draft.phone,
                draft.address,
                created_at
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Returns false when no row has `id`.
    pub fn update_contact(&self, id: i64, draft: &ContactDraft, updated_at: &str) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE contacts
             SET name = ?1, email = ?2, phone = ?3, address = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                draft.name,
                draft.email,
                draft.phone,
                draft.address,
                updated_at,
                id
            ],
        )?;
        Ok(changed > 0)
    }

    /// Returns false when no row has `id`.
    pub fn delete_contact(&self, id: i64) -> Result<bool> {
        let changed = self.conn.execute("DELETE FROM contacts WHERE id = ?1", [id])?;
        Ok(changed > 0)
    }
}

fn row_to_contact(row: &Row<'_>) -> rusqlite::Result<Contact> {
    let id: i64 = row.get(0)?;
    Ok(Contact {
        id: ContactId::from(id),
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        address: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}
