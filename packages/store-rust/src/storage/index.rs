//! Secondary indexes from field values to record locations.
//!
//! Each backend keeps one [`SecondaryIndex`] keyed by whatever identifies a
//! record's position in its storage: a sequence number for the in-memory
//! backend, a byte offset for the file backend. A location is present under a
//! key exactly when the record at that location is live and its field equals
//! the key. Name keys are compared after [`normalize_name`].

use std::collections::HashMap;
use std::hash::Hash;

use cabinet_core::Record;
use chrono::NaiveDate;

/// Normalises a name for index lookups.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.to_uppercase()
}

/// Field-value indexes over first name, last name and date of birth.
///
/// Locations within a bucket are kept in ascending order, so lookups yield
/// records in storage order.
#[derive(Debug, Clone)]
pub struct SecondaryIndex<L> {
    first_name: HashMap<String, Vec<L>>,
    last_name: HashMap<String, Vec<L>>,
    date_of_birth: HashMap<NaiveDate, Vec<L>>,
}

impl<L> Default for SecondaryIndex<L> {
    fn default() -> Self {
        Self {
            first_name: HashMap::new(),
            last_name: HashMap::new(),
            date_of_birth: HashMap::new(),
        }
    }
}

fn insert_sorted<K: Hash + Eq, L: Ord>(map: &mut HashMap<K, Vec<L>>, key: K, location: L) {
    let bucket = map.entry(key).or_default();
    if let Err(pos) = bucket.binary_search(&location) {
        bucket.insert(pos, location);
    }
}

fn remove_from<K: Hash + Eq, L: Ord>(map: &mut HashMap<K, Vec<L>>, key: &K, location: &L) {
    if let Some(bucket) = map.get_mut(key) {
        if let Ok(pos) = bucket.binary_search(location) {
            bucket.remove(pos);
        }
        if bucket.is_empty() {
            map.remove(key);
        }
    }
}

impl<L: Copy + Ord> SecondaryIndex<L> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes `record` at `location`.
    pub fn add(&mut self, location: L, record: &Record) {
        insert_sorted(&mut self.first_name, normalize_name(&record.first_name), location);
        insert_sorted(&mut self.last_name, normalize_name(&record.last_name), location);
        insert_sorted(&mut self.date_of_birth, record.date_of_birth, location);
    }

    /// Removes `location` from every bucket `record` is filed under.
    pub fn remove(&mut self, location: L, record: &Record) {
        remove_from(&mut self.first_name, &normalize_name(&record.first_name), &location);
        remove_from(&mut self.last_name, &normalize_name(&record.last_name), &location);
        remove_from(&mut self.date_of_birth, &record.date_of_birth, &location);
    }

    /// Moves `location` from `old`'s buckets to `new`'s, touching only the
    /// fields whose key changed.
    pub fn reindex(&mut self, location: L, old: &Record, new: &Record) {
        let (old_first, new_first) = (normalize_name(&old.first_name), normalize_name(&new.first_name));
        if old_first != new_first {
            remove_from(&mut self.first_name, &old_first, &location);
            insert_sorted(&mut self.first_name, new_first, location);
        }
        let (old_last, new_last) = (normalize_name(&old.last_name), normalize_name(&new.last_name));
        if old_last != new_last {
            remove_from(&mut self.last_name, &old_last, &location);
            insert_sorted(&mut self.last_name, new_last, location);
        }
        if old.date_of_birth != new.date_of_birth {
            remove_from(&mut self.date_of_birth, &old.date_of_birth, &location);
            insert_sorted(&mut self.date_of_birth, new.date_of_birth, location);
        }
    }

    /// Locations of live records with the given first name.
    #[must_use]
    pub fn first_name(&self, name: &str) -> &[L] {
        self.first_name
            .get(&normalize_name(name))
            .map_or(&[], Vec::as_slice)
    }

    /// Locations of live records with the given last name.
    #[must_use]
    pub fn last_name(&self, name: &str) -> &[L] {
        self.last_name
            .get(&normalize_name(name))
            .map_or(&[], Vec::as_slice)
    }

    /// Locations of live records born on `date`.
    #[must_use]
    pub fn date_of_birth(&self, date: NaiveDate) -> &[L] {
        self.date_of_birth.get(&date).map_or(&[], Vec::as_slice)
    }

    /// Number of indexed locations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.date_of_birth.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.date_of_birth.is_empty()
    }

    pub fn clear(&mut self) {
        self.first_name.clear();
        self.last_name.clear();
        self.date_of_birth.clear();
    }
}

#[cfg(test)]
mod tests {
    use cabinet_core::{Gender, Income};

    use super::*;

    fn make_record(id: u32, first: &str, last: &str, dob: (i32, u32, u32)) -> Record {
        Record {
            id,
            first_name: first.to_string(),
            last_name: last.to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(dob.0, dob.1, dob.2).unwrap(),
            dependents: 0,
            income: Income::ZERO,
            gender: Gender::new('M'),
        }
    }

    #[test]
    fn lookups_are_case_insensitive() {
        let mut index = SecondaryIndex::new();
        index.add(0u64, &make_record(1, "Smith", "Jones", (1980, 1, 1)));
        assert_eq!(index.first_name("SMITH"), &[0]);
        assert_eq!(index.first_name("smith"), &[0]);
        assert_eq!(index.last_name("jOnEs"), &[0]);
        assert!(index.first_name("Smyth").is_empty());
    }

    #[test]
    fn buckets_stay_in_location_order() {
        let mut index = SecondaryIndex::new();
        index.add(30u64, &make_record(3, "Ann", "B", (1990, 5, 5)));
        index.add(10u64, &make_record(1, "ann", "C", (1990, 5, 5)));
        index.add(20u64, &make_record(2, "ANN", "D", (1991, 5, 5)));
        assert_eq!(index.first_name("Ann"), &[10, 20, 30]);
        assert_eq!(
            index.date_of_birth(NaiveDate::from_ymd_opt(1990, 5, 5).unwrap()),
            &[10, 30]
        );
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn remove_drops_empty_buckets() {
        let mut index = SecondaryIndex::new();
        let record = make_record(1, "Ann", "Lee", (1990, 5, 5));
        index.add(7u64, &record);
        index.remove(7, &record);
        assert!(index.is_empty());
        assert!(index.first_name("Ann").is_empty());
        assert!(index.last_name("Lee").is_empty());
    }

    #[test]
    fn reindex_moves_only_changed_fields() {
        let mut index = SecondaryIndex::new();
        let old = make_record(1, "Ann", "Smith", (1990, 5, 5));
        let new = make_record(1, "Ann", "Jones", (1990, 5, 5));
        index.add(0u64, &old);
        index.reindex(0, &old, &new);
        assert_eq!(index.first_name("Ann"), &[0]);
        assert!(index.last_name("Smith").is_empty());
        assert_eq!(index.last_name("Jones"), &[0]);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn reindex_ignores_case_only_changes() {
        let mut index = SecondaryIndex::new();
        let old = make_record(1, "ann", "smith", (1990, 5, 5));
        let new = make_record(1, "ANN", "Smith", (1990, 5, 5));
        index.add(4u64, &old);
        index.reindex(4, &old, &new);
        assert_eq!(index.first_name("Ann"), &[4]);
        assert_eq!(index.last_name("SMITH"), &[4]);
    }

    #[test]
    fn clear_empties_all_maps() {
        let mut index = SecondaryIndex::new();
        index.add(0u64, &make_record(1, "A", "B", (2000, 1, 1)));
        index.clear();
        assert!(index.is_empty());
        assert_eq!(index.len(), 0);
    }
}
