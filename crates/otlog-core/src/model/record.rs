//! Records, record collections and the diffs replayed onto them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::operation::Operation;

/// One identified domain value, possibly tombstoned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: Uuid,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub deleted: bool,
}

impl Record {
    #[must_use]
    pub const fn new(id: Uuid, value: Value) -> Self {
        Self {
            id,
            value,
            deleted: false,
        }
    }

    /// The tombstone left behind when `self` is deleted.
    #[must_use]
    pub const fn tombstone(&self) -> Self {
        Self {
            id: self.id,
            value: Value::Null,
            deleted: true,
        }
    }
}

/// The decrypted payload of an `UpSert` or `Delete` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryDiff {
    pub op: Operation,
    #[serde(rename = "rec")]
    pub record: Record,
}

impl EntryDiff {
    #[must_use]
    pub const fn upsert(record: Record) -> Self {
        Self {
            op: Operation::UpSert,
            record,
        }
    }

    #[must_use]
    pub const fn delete(id: Uuid) -> Self {
        Self {
            op: Operation::Delete,
            record: Record {
                id,
                value: Value::Null,
                deleted: true,
            },
        }
    }
}

/// What [`Records::apply`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Replaced,
    Appended,
    Removed,
    /// Delete of an unknown identifier, or a non-diff operation.
    Ignored,
}

/// Identifier-unique, ordered collection of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Records {
    pub records: Vec<Record>,
}

impl Records {
    #[must_use]
    pub const fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    #[must_use]
    pub fn position(&self, id: &Uuid) -> Option<usize> {
        self.records.iter().position(|r| &r.id == id)
    }

    #[must_use]
    pub fn get(&self, id: &Uuid) -> Option<&Record> {
        self.records.iter().find(|r| &r.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Record> {
        self.records
    }

    /// Apply one diff by identifier lookup.
    ///
    /// Upsert replaces a found record in place (wherever it sits, index 0
    /// included) and appends otherwise. Delete removes the found record;
    /// deleting an unknown identifier changes nothing.
    pub fn apply(&mut self, diff: &EntryDiff) -> Applied {
        let index = self.position(&diff.record.id);

        match (diff.op, index) {
            (Operation::UpSert, Some(i)) => {
                self.records[i] = diff.record.clone();
                Applied::Replaced
            }
            (Operation::UpSert, None) => {
                self.records.push(diff.record.clone());
                Applied::Appended
            }
            (Operation::Delete, Some(i)) => {
                let removed = self.records.remove(i).tombstone();
                debug!(id = %removed.id, "record tombstoned");
                Applied::Removed
            }
            (Operation::Delete, None) => {
                debug!(id = %diff.record.id, "delete of unknown record ignored");
                Applied::Ignored
            }
            (Operation::Merge | Operation::Base, _) => Applied::Ignored,
        }
    }
}

impl FromIterator<Record> for Records {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(n: u128, value: Value) -> Record {
        Record::new(Uuid::from_u128(n), value)
    }

    #[test]
    fn upsert_appends_unknown_id() {
        let mut records = Records::default();
        assert_eq!(records.apply(&EntryDiff::upsert(rec(1, json!("a")))), Applied::Appended);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn upsert_replaces_first_record() {
        let mut records = Records::new(vec![rec(1, json!("a")), rec(2, json!("b"))]);
        let applied = records.apply(&EntryDiff::upsert(rec(1, json!("a2"))));

        assert_eq!(applied, Applied::Replaced);
        assert_eq!(records.len(), 2);
        assert_eq!(records.records[0].value, json!("a2"));
    }

    #[test]
    fn upsert_replaces_in_place() {
        let mut records = Records::new(vec![rec(1, json!(1)), rec(2, json!(2)), rec(3, json!(3))]);
        records.apply(&EntryDiff::upsert(rec(2, json!(20))));

        let values: Vec<_> = records.iter().map(|r| r.value.clone()).collect();
        assert_eq!(values, vec![json!(1), json!(20), json!(3)]);
    }

    #[test]
    fn delete_removes_matching_record_only() {
        let mut records = Records::new(vec![rec(1, json!(1)), rec(2, json!(2)), rec(3, json!(3))]);
        assert_eq!(records.apply(&EntryDiff::delete(Uuid::from_u128(1))), Applied::Removed);

        let ids: Vec<_> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![Uuid::from_u128(2), Uuid::from_u128(3)]);
    }

    #[test]
    fn delete_unknown_is_noop() {
        let mut records = Records::new(vec![rec(1, json!(1))]);
        assert_eq!(records.apply(&EntryDiff::delete(Uuid::from_u128(9))), Applied::Ignored);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn merge_and_base_diffs_are_ignored() {
        let mut records = Records::default();
        let diff = EntryDiff {
            op: Operation::Merge,
            record: rec(1, json!(1)),
        };
        assert_eq!(records.apply(&diff), Applied::Ignored);
        assert!(records.is_empty());
    }

    #[test]
    fn diff_wire_shape() {
        let diff = EntryDiff::upsert(rec(1, json!({"name": "Test"})));
        let value: Value = serde_json::to_value(&diff).unwrap();
        assert_eq!(value["op"], json!("ups"));
        assert_eq!(value["rec"]["value"]["name"], json!("Test"));
        assert_eq!(value["rec"]["deleted"], json!(false));
    }
}
