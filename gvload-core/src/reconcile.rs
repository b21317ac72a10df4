//! Contact reconciliation
//!
//! Records in an export are only partially labeled: some carry a name and a
//! number, some only one of the two, and the same name or number may show up
//! with conflicting partners. Reconciliation runs once over the whole batch:
//!
//! 1. Count how often each number, name and (name, number) pair occurs
//!    among the records' primary contacts.
//! 2. Build `name → number` and `number → name` from complete contacts. When
//!    a key already maps to a different value, the candidate seen more often
//!    together with that key wins; ties keep the incumbent. Each direction is
//!    resolved on its own, so the two maps need not be inverses.
//! 3. Map the self identity to the primary account number.
//! 4. Fill remaining gaps from the external contact directory, if any.
//! 5. Back-fill the missing half of every incomplete contact (and of every
//!    text receiver). Complete contacts are never touched.

use crate::contacts::{ContactDirectory, ContactRow};
use crate::types::{Contact, Record, SELF_NAME};
use std::collections::{BTreeMap, HashMap};

/// Occurrence counts over the records' primary contacts.
#[derive(Debug, Clone, Default)]
pub struct Frequencies {
    numbers: HashMap<String, usize>,
    names: HashMap<String, usize>,
    pairs: HashMap<(String, String), usize>,
}

impl Frequencies {
    pub fn count(records: &[Record]) -> Self {
        let mut freq = Self::default();
        for record in records {
            let contact = record.contact();
            if let Some(number) = &contact.phonenumber {
                *freq.numbers.entry(number.clone()).or_default() += 1;
            }
            if let Some(name) = &contact.name {
                *freq.names.entry(name.clone()).or_default() += 1;
            }
            if let (Some(name), Some(number)) = (&contact.name, &contact.phonenumber) {
                *freq
                    .pairs
                    .entry((name.clone(), number.clone()))
                    .or_default() += 1;
            }
        }
        freq
    }

    pub fn number(&self, number: &str) -> usize {
        self.numbers.get(number).copied().unwrap_or(0)
    }

    pub fn name(&self, name: &str) -> usize {
        self.names.get(name).copied().unwrap_or(0)
    }

    /// How many records name `name` with number `number`
    pub fn pair(&self, name: &str, number: &str) -> usize {
        self.pairs
            .get(&(name.to_string(), number.to_string()))
            .copied()
            .unwrap_or(0)
    }
}

/// Which map a conflict was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    NameToNumber,
    NumberToName,
}

/// A conflicting mapping and how it was settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ambiguity {
    pub direction: Direction,
    /// The name (or number) that maps to two values
    pub key: String,
    pub incumbent: String,
    pub challenger: String,
    /// Either `incumbent` or `challenger`
    pub chosen: String,
}

/// Resolved identity maps for a batch.
#[derive(Debug, Clone, Default)]
pub struct ContactIndex {
    pub frequencies: Frequencies,
    pub names_to_numbers: BTreeMap<String, String>,
    pub numbers_to_names: BTreeMap<String, String>,
}

/// Outcome of [`reconcile`].
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    pub index: ContactIndex,
    pub ambiguities: Vec<Ambiguity>,
    /// Number of contacts (primary or receiver) that gained a field
    pub contacts_filled: usize,
}

/// Reconcile contact identities across `records`, filling them in place.
pub fn reconcile(
    records: &mut [Record],
    directory: Option<&ContactDirectory>,
    my_numbers: &[String],
) -> Reconciliation {
    let (index, ambiguities) = ContactIndex::build(records, directory, my_numbers);
    let contacts_filled = index.backfill(records);

    tracing::info!(
        records = records.len(),
        names = index.names_to_numbers.len(),
        numbers = index.numbers_to_names.len(),
        ambiguities = ambiguities.len(),
        contacts_filled,
        "Contact reconciliation complete"
    );

    Reconciliation {
        index,
        ambiguities,
        contacts_filled,
    }
}

impl ContactIndex {
    /// Build both maps from the corpus and the optional directory.
    pub fn build(
        records: &[Record],
        directory: Option<&ContactDirectory>,
        my_numbers: &[String],
    ) -> (Self, Vec<Ambiguity>) {
        let frequencies = Frequencies::count(records);
        let mut names_to_numbers: BTreeMap<String, String> = BTreeMap::new();
        let mut numbers_to_names: BTreeMap<String, String> = BTreeMap::new();
        let mut ambiguities = Vec::new();

        for record in records {
            let contact = record.contact();
            let (Some(name), Some(number)) = (&contact.name, &contact.phonenumber) else {
                continue;
            };

            if let Some(a) = vote(
                &mut names_to_numbers,
                Direction::NameToNumber,
                name,
                number,
                |key, candidate| frequencies.pair(key, candidate),
            ) {
                ambiguities.push(a);
            }
            if let Some(a) = vote(
                &mut numbers_to_names,
                Direction::NumberToName,
                number,
                name,
                |key, candidate| frequencies.pair(candidate, key),
            ) {
                ambiguities.push(a);
            }
        }

        if let Some(primary) = my_numbers.first() {
            names_to_numbers.insert(SELF_NAME.to_string(), primary.clone());
        }

        if let Some(directory) = directory {
            merge_directory(
                directory,
                &frequencies,
                &mut names_to_numbers,
                &mut numbers_to_names,
            );
        }

        let index = Self {
            frequencies,
            names_to_numbers,
            numbers_to_names,
        };
        (index, ambiguities)
    }

    /// Fill the missing half of one contact. Returns whether it changed.
    pub fn fill_contact(&self, contact: &mut Contact) -> bool {
        if contact.name.is_none() {
            let name = contact
                .phonenumber
                .as_ref()
                .and_then(|number| self.numbers_to_names.get(number));
            if let Some(name) = name {
                contact.name = Some(name.clone());
                return true;
            }
        } else if contact.phonenumber.is_none() {
            let number = contact
                .name
                .as_ref()
                .and_then(|name| self.names_to_numbers.get(name));
            if let Some(number) = number {
                contact.phonenumber = Some(number.clone());
                return true;
            }
        }
        false
    }

    /// Back-fill every record's contact, and the receiver of text records.
    pub fn backfill(&self, records: &mut [Record]) -> usize {
        let mut filled = 0;
        for record in records.iter_mut() {
            if self.fill_contact(&mut record.base_mut().contact) {
                filled += 1;
            }
            if let Record::Text(text) = record {
                if self.fill_contact(&mut text.receiver) {
                    filled += 1;
                }
            }
        }
        filled
    }

    /// Rows for the contacts table / CSV export, sorted by (name, number).
    pub fn contact_rows(&self, notes: Option<&HashMap<String, String>>) -> Vec<ContactRow> {
        let mut rows: Vec<ContactRow> = self
            .numbers_to_names
            .iter()
            .map(|(number, name)| ContactRow {
                name: name.clone(),
                number: number.clone(),
                notes: notes
                    .and_then(|n| n.get(number))
                    .cloned()
                    .unwrap_or_default(),
            })
            .collect();
        rows.sort_by(|a, b| (&a.name, &a.number).cmp(&(&b.name, &b.number)));
        rows
    }
}

/// Insert `key → candidate`, settling conflicts by co-occurrence frequency.
fn vote<F>(
    map: &mut BTreeMap<String, String>,
    direction: Direction,
    key: &str,
    candidate: &str,
    frequency: F,
) -> Option<Ambiguity>
where
    F: Fn(&str, &str) -> usize,
{
    let incumbent = match map.get(key) {
        Some(existing) if existing != candidate => existing.clone(),
        Some(_) => return None,
        None => {
            map.insert(key.to_string(), candidate.to_string());
            return None;
        }
    };

    let challenger_wins = frequency(key, candidate) > frequency(key, &incumbent);
    let chosen = if challenger_wins {
        candidate.to_string()
    } else {
        incumbent.clone()
    };

    tracing::info!(
        direction = ?direction,
        key,
        incumbent = %incumbent,
        challenger = candidate,
        chosen = %chosen,
        "Ambiguous contact mapping"
    );

    if challenger_wins {
        map.insert(key.to_string(), candidate.to_string());
    }

    Some(Ambiguity {
        direction,
        key: key.to_string(),
        incumbent,
        challenger: candidate.to_string(),
        chosen,
    })
}

/// Fill gaps in both maps from the external directory.
///
/// Every directory number gets its name where the corpus has not resolved
/// that number. Each name gets a canonical number (the one seen most often
/// in the corpus) where the corpus has not resolved that name.
fn merge_directory(
    directory: &ContactDirectory,
    frequencies: &Frequencies,
    names_to_numbers: &mut BTreeMap<String, String>,
    numbers_to_names: &mut BTreeMap<String, String>,
) {
    for (name, numbers) in &directory.names {
        for number in numbers {
            numbers_to_names
                .entry(number.clone())
                .or_insert_with(|| name.clone());
        }

        if let Some(canonical) = canonical_number(numbers, frequencies) {
            names_to_numbers
                .entry(name.clone())
                .or_insert_with(|| canonical.to_string());
        }
    }
}

/// Most frequent of `numbers` in the corpus; the first listed wins ties.
fn canonical_number<'a>(numbers: &'a [String], frequencies: &Frequencies) -> Option<&'a str> {
    let mut best: Option<(&str, usize)> = None;
    for number in numbers {
        let count = frequencies.number(number);
        match best {
            Some((_, best_count)) if best_count >= count => {}
            _ => best = Some((number, count)),
        }
    }
    best.map(|(number, _)| number)
}
