//! Database repository layer
//!
//! Inserts reconciled records and contacts, plus the counts used for
//! reporting.

use crate::contacts::ContactRow;
use crate::error::Result;
use crate::format::format_timestamp;
use crate::types::{AudioRecord, CallRecord, CallType, Record, TextRecord};
use rusqlite::{params, Connection, ErrorCode, Transaction};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

/// Rows written by [`Database::insert_records`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertSummary {
    pub texts: usize,
    pub audio: usize,
    pub calls: usize,
    /// Rows written without a phone number
    pub missing_numbers: usize,
}

impl InsertSummary {
    pub fn total(&self) -> usize {
        self.texts + self.audio + self.calls
    }
}

/// Database handle with connection pooling (single connection for now)
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        tracing::debug!(path = %path.display(), "Opened database");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        super::schema::run_migrations(&conn)
    }

    /// Get the underlying connection (for advanced use)
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    // ============================================
    // Record operations
    // ============================================

    /// Delete every text, audio and call row. Contacts are kept.
    pub fn clear_records(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            DELETE FROM texts;
            DELETE FROM audio;
            DELETE FROM calls;
            ",
        )?;
        tracing::info!("Cleared existing records");
        Ok(())
    }

    /// Insert records in a single transaction
    pub fn insert_records(&self, records: &[Record]) -> Result<InsertSummary> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let mut summary = InsertSummary::default();

        for record in records {
            let has_number = match record {
                Record::Text(text) => {
                    summary.texts += 1;
                    insert_text(&tx, text)?
                }
                Record::Audio(audio) => {
                    summary.audio += 1;
                    insert_audio(&tx, audio)?
                }
                Record::Call(call) => {
                    summary.calls += 1;
                    insert_call(&tx, call)?
                }
            };
            if !has_number {
                summary.missing_numbers += 1;
            }
        }

        tx.commit()?;
        tracing::info!(
            texts = summary.texts,
            audio = summary.audio,
            calls = summary.calls,
            missing_numbers = summary.missing_numbers,
            "Inserted records"
        );
        Ok(summary)
    }

    // ============================================
    // Contact operations
    // ============================================

    /// Insert contacts, skipping numbers already present.
    ///
    /// Rows are de-duplicated and inserted sorted by (name, number). Returns
    /// the number of rows written.
    pub fn insert_contacts(&self, rows: &[ContactRow]) -> Result<usize> {
        let unique: BTreeMap<(&str, &str), &str> = rows
            .iter()
            .map(|r| ((r.name.as_str(), r.number.as_str()), r.notes.as_str()))
            .collect();

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let mut inserted = 0;

        for ((name, number), notes) in unique {
            let result = tx.execute(
                "INSERT INTO contacts (name, number, notes) VALUES (?1, ?2, ?3)",
                params![name, number, notes],
            );
            match result {
                Ok(_) => inserted += 1,
                Err(rusqlite::Error::SqliteFailure(e, msg))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    tracing::warn!(
                        name,
                        number,
                        error = msg.as_deref().unwrap_or("constraint violation"),
                        "Skipping contact"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        tx.commit()?;
        tracing::info!(inserted, offered = rows.len(), "Contacts loaded");
        Ok(inserted)
    }

    // ============================================
    // Statistics
    // ============================================

    pub fn count_texts(&self) -> Result<i64> {
        self.count_rows("texts")
    }

    pub fn count_audio(&self) -> Result<i64> {
        self.count_rows("audio")
    }

    pub fn count_calls(&self) -> Result<i64> {
        self.count_rows("calls")
    }

    pub fn count_contacts(&self) -> Result<i64> {
        self.count_rows("contacts")
    }

    fn count_rows(&self, table: &'static str) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))?;
        Ok(count)
    }
}

/// Outgoing texts are filed under the receiver's number, incoming under the
/// sender's. Returns whether a number was available.
fn insert_text(tx: &Transaction<'_>, text: &TextRecord) -> Result<bool> {
    let sender = &text.base.contact;
    let (party, texttype) = if sender.is_me() {
        (&text.receiver, "out")
    } else {
        (sender, "in")
    };
    if party.phonenumber.is_none() {
        tracing::warn!(contact = %party.dump(), texttype, "No number for text");
    }

    tx.execute(
        "INSERT INTO texts (time, number, message, texttype) VALUES (?1, ?2, ?3, ?4)",
        params![
            text.base.date.map(format_timestamp),
            party.phonenumber,
            text.text,
            texttype,
        ],
    )?;
    Ok(party.phonenumber.is_some())
}

fn insert_audio(tx: &Transaction<'_>, audio: &AudioRecord) -> Result<bool> {
    tx.execute(
        r#"
        INSERT INTO audio (time, number, duration, type, text, confidence, filename)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        params![
            audio.base.date.map(format_timestamp),
            audio.base.contact.phonenumber,
            audio.duration.map(|d| d.num_seconds()),
            audio.audiotype.map(|a| a.as_str()),
            audio.text,
            audio.confidence,
            audio.filename,
        ],
    )?;
    Ok(audio.base.contact.phonenumber.is_some())
}

/// Missed calls have no meaningful duration and are stored with NULL.
fn insert_call(tx: &Transaction<'_>, call: &CallRecord) -> Result<bool> {
    let duration = match call.calltype {
        Some(CallType::Missed) => None,
        _ => call.duration.map(|d| d.num_seconds()),
    };
    tx.execute(
        "INSERT INTO calls (time, number, duration, calltype) VALUES (?1, ?2, ?3, ?4)",
        params![
            call.base.date.map(format_timestamp),
            call.base.contact.phonenumber,
            duration,
            call.calltype.map(|c| c.as_str()),
        ],
    )?;
    Ok(call.base.contact.phonenumber.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AudioType, Contact, RecordBase};
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    fn at(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2012, 3, 4)
            .unwrap()
            .and_hms_opt(5, minute, 6)
            .unwrap()
    }

    fn contact(name: &str, number: &str) -> Contact {
        Contact::new(Some(name.to_string()), Some(number.to_string()))
    }

    fn text(sender: Contact, receiver: Contact, body: &str) -> Record {
        Record::Text(TextRecord {
            base: RecordBase::new(sender, at(0)),
            text: body.to_string(),
            receiver,
        })
    }

    fn call(calltype: CallType, seconds: i64) -> Record {
        Record::Call(CallRecord {
            base: RecordBase::new(contact("Bob", "222"), at(1)),
            duration: Some(Duration::seconds(seconds)),
            calltype: Some(calltype),
        })
    }

    #[test]
    fn test_insert_texts_in_and_out() {
        let db = test_db();
        let me = Contact::me("999");
        let bob = contact("Bob", "222");
        let records = vec![
            text(me.clone(), bob.clone(), "hi bob"),
            text(bob, me, "hi me"),
        ];

        let summary = db.insert_records(&records).unwrap();
        assert_eq!(summary.texts, 2);
        assert_eq!(summary.missing_numbers, 0);

        let conn = db.connection();
        let rows: Vec<(String, String, String, String)> = conn
            .prepare("SELECT time, number, message, texttype FROM texts ORDER BY message")
            .unwrap()
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(
            rows[0],
            (
                "2012-03-04 05:00:06".to_string(),
                "222".to_string(),
                "hi bob".to_string(),
                "out".to_string()
            )
        );
        assert_eq!(rows[1].1, "222");
        assert_eq!(rows[1].3, "in");
    }

    #[test]
    fn test_missed_call_has_null_duration() {
        let db = test_db();
        db.insert_records(&[call(CallType::Missed, 30), call(CallType::Placed, 75)])
            .unwrap();

        let conn = db.connection();
        let missed: Option<i64> = conn
            .query_row(
                "SELECT duration FROM calls WHERE calltype = 'missed'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        let placed: Option<i64> = conn
            .query_row(
                "SELECT duration FROM calls WHERE calltype = 'placed'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(missed, None);
        assert_eq!(placed, Some(75));
    }

    #[test]
    fn test_insert_audio() {
        let db = test_db();
        let record = Record::Audio(AudioRecord {
            base: RecordBase::new(contact("Cat", "333"), at(2)),
            duration: Some(Duration::seconds(12)),
            audiotype: Some(AudioType::Voicemail),
            text: Some("call me back".to_string()),
            confidence: Some(0.75),
            filename: "Cat - Voicemail.mp3".to_string(),
        });
        db.insert_records(&[record]).unwrap();

        assert_eq!(db.count_audio().unwrap(), 1);
        let conn = db.connection();
        let (kind, confidence, filename): (String, f64, String) = conn
            .query_row("SELECT type, confidence, filename FROM audio", [], |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?))
            })
            .unwrap();
        assert_eq!(kind, "voicemail");
        assert!((confidence - 0.75).abs() < 1e-9);
        assert_eq!(filename, "Cat - Voicemail.mp3");
    }

    #[test]
    fn test_missing_number_counted() {
        let db = test_db();
        let records = vec![text(
            Contact::me("999"),
            Contact::new(Some("Nobody".into()), None),
            "?",
        )];
        let summary = db.insert_records(&records).unwrap();
        assert_eq!(summary.missing_numbers, 1);
        assert_eq!(db.count_texts().unwrap(), 1);
    }

    #[test]
    fn test_clear_records_keeps_contacts() {
        let db = test_db();
        db.insert_records(&[call(CallType::Received, 5)]).unwrap();
        db.insert_contacts(&[ContactRow {
            name: "Bob".into(),
            number: "222".into(),
            notes: String::new(),
        }])
        .unwrap();

        db.clear_records().unwrap();
        assert_eq!(db.count_calls().unwrap(), 0);
        assert_eq!(db.count_contacts().unwrap(), 1);
    }

    #[test]
    fn test_insert_contacts_skips_duplicates() {
        let db = test_db();
        let row = |name: &str, number: &str| ContactRow {
            name: name.into(),
            number: number.into(),
            notes: String::new(),
        };
        let rows = vec![row("Bob", "222"), row("Bob", "222"), row("Al", "111")];
        assert_eq!(db.insert_contacts(&rows).unwrap(), 2);

        // same number again violates the unique constraint
        assert_eq!(db.insert_contacts(&[row("Robert", "222")]).unwrap(), 0);
        assert_eq!(db.count_contacts().unwrap(), 2);
    }
}
