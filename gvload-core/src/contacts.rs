//! Contact directory CSV
//!
//! An optional user-maintained list of `Name,Number,Notes` rows merged into
//! reconciliation, and the export of resolved contacts in the same layout.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::OpenOptions;
use std::path::Path;

/// One row of a contacts CSV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRow {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Number")]
    pub number: String,
    #[serde(rename = "Notes", default)]
    pub notes: String,
}

/// External contacts keyed by name, with per-number notes.
#[derive(Debug, Clone, Default)]
pub struct ContactDirectory {
    /// Name to its numbers, in file order
    pub names: BTreeMap<String, Vec<String>>,
    /// Number to its notes
    pub notes: HashMap<String, String>,
}

impl ContactDirectory {
    /// Read a directory from a CSV file with a `Name,Number,Notes` header.
    ///
    /// A number listed more than once is rejected.
    pub fn read(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;

        let rows = reader
            .deserialize::<ContactRow>()
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let directory = Self::from_rows(rows)?;
        tracing::info!(
            path = %path.display(),
            names = directory.names.len(),
            numbers = directory.notes.len(),
            "Loaded contact directory"
        );
        Ok(directory)
    }

    /// Build a directory from parsed rows.
    pub fn from_rows(rows: Vec<ContactRow>) -> Result<Self> {
        let mut seen: HashMap<&str, usize> = HashMap::new();
        for row in &rows {
            *seen.entry(row.number.as_str()).or_default() += 1;
        }
        let mut duplicates: Vec<&str> = seen
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(number, _)| number)
            .collect();
        if !duplicates.is_empty() {
            duplicates.sort_unstable();
            return Err(Error::Contacts(format!(
                "non-unique numbers in contacts file: {}",
                duplicates.join(", ")
            )));
        }

        let mut directory = Self::default();
        for row in rows {
            directory
                .names
                .entry(row.name)
                .or_default()
                .push(row.number.clone());
            directory.notes.insert(row.number, row.notes);
        }
        Ok(directory)
    }
}

/// Fail if `path` already exists.
pub fn ensure_absent(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(Error::Contacts(format!(
            "file '{}' already exists, will not overwrite",
            path.display()
        )));
    }
    Ok(())
}

/// Write resolved contacts to a new CSV file, sorted by (name, number).
pub fn write_contacts_csv(path: &Path, rows: &[ContactRow]) -> Result<()> {
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => Error::Contacts(format!(
                "file '{}' already exists, will not overwrite",
                path.display()
            )),
            _ => Error::Io(e),
        })?;

    let mut sorted: Vec<&ContactRow> = rows.iter().collect();
    sorted.sort_by(|a, b| (&a.name, &a.number).cmp(&(&b.name, &b.number)));

    let mut writer = csv::Writer::from_writer(file);
    for row in sorted {
        writer.serialize(row)?;
    }
    writer.flush()?;

    tracing::info!(path = %path.display(), contacts = rows.len(), "Wrote contacts CSV");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_read_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("contacts.csv");
        fs::write(
            &path,
            "Name,Number,Notes\nAlice,111,friend\nAlice,112,\nBob, 222 ,work\n",
        )
        .unwrap();

        let directory = ContactDirectory::read(&path).unwrap();
        assert_eq!(directory.names["Alice"], vec!["111", "112"]);
        assert_eq!(directory.names["Bob"], vec!["222"]);
        assert_eq!(directory.notes["111"], "friend");
        assert_eq!(directory.notes["112"], "");
        assert_eq!(directory.notes["222"], "work");
    }

    #[test]
    fn test_read_without_notes_column() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("contacts.csv");
        fs::write(&path, "Name,Number\nCat,333\n").unwrap();

        let directory = ContactDirectory::read(&path).unwrap();
        assert_eq!(directory.notes["333"], "");
    }

    #[test]
    fn test_duplicate_numbers_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("contacts.csv");
        fs::write(&path, "Name,Number,Notes\nAlice,111,\nAl,111,\n").unwrap();

        let err = ContactDirectory::read(&path).unwrap_err();
        match err {
            Error::Contacts(msg) => assert!(msg.contains("111")),
            other => panic!("expected contacts error, got {:?}", other),
        }
    }

    #[test]
    fn test_write_sorted_csv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let rows = vec![
            ContactRow {
                name: "Bob".into(),
                number: "222".into(),
                notes: String::new(),
            },
            ContactRow {
                name: "Alice".into(),
                number: "111".into(),
                notes: "friend".into(),
            },
        ];

        write_contacts_csv(&path, &rows).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "Name,Number,Notes\nAlice,111,friend\nBob,222,\n");
    }

    #[test]
    fn test_write_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        fs::write(&path, "keep me").unwrap();

        assert!(ensure_absent(&path).is_err());
        let err = write_contacts_csv(&path, &[]).unwrap_err();
        assert!(matches!(err, Error::Contacts(_)));
        assert_eq!(fs::read_to_string(&path).unwrap(), "keep me");
    }
}
