//! In-memory property database.
//!
//! Entries live in a `Vec` in insertion order. Lookups are linear: the
//! expected population is tens to low hundreds of properties, and every
//! insert goes through the same upsert path, so a name can never appear
//! twice no matter how often it is written.

use crate::error::PropError;
use crate::types::{PropName, PropValue, Property};

#[derive(Debug, Default)]
pub struct PropertyDb {
    entries: Vec<Property>,
}

impl PropertyDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact, case-sensitive lookup.
    pub fn get(&self, name: &str) -> Result<&PropValue, PropError> {
        let name = PropName::new(name);
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| &entry.value)
            .ok_or_else(|| PropError::NotFound(name.to_string()))
    }

    /// Update-or-insert. Inputs are clamped before they are compared or
    /// stored. Returns the value that was replaced, if any.
    pub fn set(&mut self, name: &str, value: &str) -> Option<PropValue> {
        self.insert(Property::new(name, value))
    }

    /// Update-or-insert an already bounded property.
    pub fn insert(&mut self, property: Property) -> Option<PropValue> {
        match self.entries.iter_mut().find(|entry| entry.name == property.name) {
            Some(entry) => Some(std::mem::replace(&mut entry.value, property.value)),
            None => {
                self.entries.push(property);
                None
            }
        }
    }

    /// Snapshot-ordered walk over every entry. Each call starts over.
    pub fn iter(&self) -> impl Iterator<Item = &Property> + '_ {
        self.entries.iter()
    }

    /// Only the `persist.`-prefixed entries.
    pub fn persistent(&self) -> impl Iterator<Item = &Property> + '_ {
        self.iter().filter(|entry| entry.name.is_persistent())
    }

    /// Owned copy of the whole database, for diagnostics.
    pub fn dump(&self) -> Vec<Property> {
        self.entries.clone()
    }

    /// Drop every entry. Only for controlled re-initialisation.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a PropertyDb {
    type Item = &'a Property;
    type IntoIter = std::slice::Iter<'a, Property>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PROP_NAME_MAX;

    #[test]
    fn get_on_empty_db_is_not_found() {
        let db = PropertyDb::new();
        assert_eq!(
            db.get("never.set"),
            Err(PropError::NotFound("never.set".to_string()))
        );
    }

    #[test]
    fn set_then_get_returns_value() {
        let mut db = PropertyDb::new();
        assert_eq!(db.set("ro.foo", "bar"), None);
        assert_eq!(db.get("ro.foo").unwrap().as_str(), "bar");
    }

    #[test]
    fn update_replaces_in_place_and_reports_previous() {
        let mut db = PropertyDb::new();
        db.set("ro.a", "1");
        db.set("ro.b", "2");
        let previous = db.set("ro.a", "3");

        assert_eq!(previous, Some(PropValue::from("1")));
        assert_eq!(db.len(), 2);
        let names: Vec<_> = db.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["ro.a", "ro.b"], "insertion order is kept");
        assert_eq!(db.get("ro.a").unwrap().as_str(), "3");
    }

    #[test]
    fn repeated_identical_set_is_idempotent() {
        let mut db = PropertyDb::new();
        db.set("ro.same", "v");
        let once = db.dump();
        db.set("ro.same", "v");
        assert_eq!(db.dump(), once);
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let mut db = PropertyDb::new();
        db.set("ro.Case", "x");
        assert!(db.get("ro.case").is_err());
    }

    #[test]
    fn overlong_names_collapse_to_one_truncated_entry() {
        let mut db = PropertyDb::new();
        let base = "p".repeat(PROP_NAME_MAX);
        db.set(&format!("{base}A"), "1");
        db.set(&format!("{base}B"), "2");

        assert_eq!(db.len(), 1);
        assert_eq!(db.get(&base).unwrap().as_str(), "2");
    }

    #[test]
    fn persistent_filters_by_prefix() {
        let mut db = PropertyDb::new();
        db.set("persist.a", "1");
        db.set("ro.b", "2");
        db.set("persist.c", "3");
        let names: Vec<_> = db.persistent().map(|p| p.name.to_string()).collect();
        assert_eq!(names, ["persist.a", "persist.c"]);
    }

    #[test]
    fn clear_empties_the_db() {
        let mut db = PropertyDb::new();
        db.set("ro.a", "1");
        db.clear();
        assert!(db.is_empty());
        assert!(db.get("ro.a").is_err());
    }
}
