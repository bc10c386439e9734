use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use serde_json::Value;

type Tables = HashMap<String, Vec<Value>>;

/// Flat-file record store: named tables of JSON records, held in memory and
/// rewritten to the backing file in full after every mutation. The server
/// runs a single worker, so the mutex never actually contends; it only makes
/// the shared handle `Sync`.
pub struct FileDb {
    path: PathBuf,
    tables: Mutex<Tables>,
}

fn record_id(record: &Value) -> Option<&str> {
    record.get("id").and_then(Value::as_str)
}

impl FileDb {
    /// Opens the store, loading existing state from `path` when the file is
    /// present. A missing file starts an empty store; an unparseable one is
    /// an error.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let tables = match std::fs::read(&path) {
            Ok(raw) => serde_json::from_slice(&raw)
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => Tables::new(),
            Err(err) => return Err(err),
        };
        Ok(FileDb {
            path,
            tables: Mutex::new(tables),
        })
    }

    /// Appends `record` to `table`. The record must already carry its id.
    pub fn insert(&self, table: &str, record: Value) -> io::Result<()> {
        let mut tables = self.tables.lock().unwrap();
        tables.entry(table.to_string()).or_default().push(record);
        self.persist(&tables)
    }

    /// With no filter, returns every record of `table` in insertion order.
    /// With a filter, returns the records where any supplied field's string
    /// value contains the filter value as a case-sensitive substring.
    pub fn select(&self, table: &str, filter: Option<&HashMap<String, String>>) -> Vec<Value> {
        let tables = self.tables.lock().unwrap();
        let records = match tables.get(table) {
            Some(records) => records,
            None => return Vec::new(),
        };

        match filter {
            None => records.clone(),
            Some(filter) => records
                .iter()
                .filter(|record| {
                    filter.iter().any(|(field, needle)| {
                        record
                            .get(field)
                            .and_then(Value::as_str)
                            .is_some_and(|text| text.contains(needle.as_str()))
                    })
                })
                .cloned()
                .collect(),
        }
    }

    /// Merges the keys of `fields` into the record with the given id.
    /// Explicit nulls overwrite; keys not present in `fields` are left
    /// untouched. A missing id is a silent no-op.
    pub fn update(&self, table: &str, id: &str, fields: Value) -> io::Result<()> {
        let mut tables = self.tables.lock().unwrap();
        let record = tables
            .get_mut(table)
            .and_then(|records| records.iter_mut().find(|record| record_id(record) == Some(id)));
        if let Some(record) = record {
            if let (Some(target), Value::Object(fields)) = (record.as_object_mut(), fields) {
                for (key, value) in fields {
                    target.insert(key, value);
                }
            }
        }
        self.persist(&tables)
    }

    /// Removes the record with the given id, if present.
    pub fn delete(&self, table: &str, id: &str) -> io::Result<()> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(records) = tables.get_mut(table) {
            records.retain(|record| record_id(record) != Some(id));
        }
        self.persist(&tables)
    }

    /// One final full write, for shutdown.
    pub fn flush(&self) -> io::Result<()> {
        let tables = self.tables.lock().unwrap();
        self.persist(&tables)
    }

    fn persist(&self, tables: &Tables) -> io::Result<()> {
        let content = serde_json::to_vec_pretty(tables)?;
        std::fs::write(&self.path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::FileDb;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_path(file_name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("taskbox-{nanos}-{file_name}"))
    }

    fn record(id: &str, title: &str, description: &str) -> Value {
        json!({
            "id": id,
            "title": title,
            "description": description,
            "completedAt": null,
            "createdAt": "2026-01-01T00:00:00Z",
            "updatedAt": null,
        })
    }

    fn filter(fields: &[(&str, &str)]) -> HashMap<String, String> {
        fields
            .iter()
            .map(|(field, value)| (field.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn select_without_filter_returns_all_records_in_insertion_order() {
        let path = temp_path("order.json");
        let db = FileDb::open(&path).unwrap();
        db.insert("tasks", record("a", "first", "one")).unwrap();
        db.insert("tasks", record("b", "second", "two")).unwrap();
        db.insert("tasks", record("c", "third", "three")).unwrap();

        let all = db.select("tasks", None);
        fs::remove_file(&path).ok();

        assert_eq!(all.len(), 3);
        let ids: Vec<_> = all.iter().map(|r| r["id"].as_str().unwrap()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn missing_table_selects_empty() {
        let path = temp_path("empty.json");
        let db = FileDb::open(&path).unwrap();
        assert!(db.select("tasks", None).is_empty());
        fs::remove_file(&path).ok();
    }

    #[test]
    fn substring_filter_matches_any_supplied_field() {
        let path = temp_path("filter.json");
        let db = FileDb::open(&path).unwrap();
        db.insert("tasks", record("a", "buy groceries", "errands"))
            .unwrap();
        db.insert("tasks", record("b", "gym", "after groceries"))
            .unwrap();
        db.insert("tasks", record("c", "read", "a novel")).unwrap();

        let hits = db.select(
            "tasks",
            Some(&filter(&[("title", "groceries"), ("description", "groceries")])),
        );
        fs::remove_file(&path).ok();

        let ids: Vec<_> = hits.iter().map(|r| r["id"].as_str().unwrap()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn substring_filter_is_case_sensitive() {
        let path = temp_path("case.json");
        let db = FileDb::open(&path).unwrap();
        db.insert("tasks", record("a", "Buy Groceries", "errands"))
            .unwrap();

        let hits = db.select("tasks", Some(&filter(&[("title", "groceries")])));
        fs::remove_file(&path).ok();

        assert!(hits.is_empty());
    }

    #[test]
    fn id_filter_finds_the_one_record() {
        let path = temp_path("by-id.json");
        let db = FileDb::open(&path).unwrap();
        db.insert("tasks", record("a", "one", "one")).unwrap();
        db.insert("tasks", record("b", "two", "two")).unwrap();

        let hits = db.select("tasks", Some(&filter(&[("id", "b")])));
        fs::remove_file(&path).ok();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["title"], "two");
    }

    #[test]
    fn update_merges_given_fields_and_leaves_the_rest_untouched() {
        let path = temp_path("merge.json");
        let db = FileDb::open(&path).unwrap();
        db.insert("tasks", record("a", "old title", "keep me")).unwrap();

        db.update(
            "tasks",
            "a",
            json!({ "title": "new title", "updatedAt": "2026-02-01T00:00:00Z" }),
        )
        .unwrap();

        let hits = db.select("tasks", Some(&filter(&[("id", "a")])));
        fs::remove_file(&path).ok();

        assert_eq!(hits[0]["title"], "new title");
        assert_eq!(hits[0]["description"], "keep me");
        assert_eq!(hits[0]["createdAt"], "2026-01-01T00:00:00Z");
        assert_eq!(hits[0]["updatedAt"], "2026-02-01T00:00:00Z");
    }

    #[test]
    fn update_with_explicit_null_overwrites_the_field() {
        let path = temp_path("null.json");
        let db = FileDb::open(&path).unwrap();
        db.insert("tasks", record("a", "t", "d")).unwrap();

        db.update("tasks", "a", json!({ "completedAt": "2026-02-01T00:00:00Z" }))
            .unwrap();
        db.update("tasks", "a", json!({ "completedAt": null })).unwrap();

        let hits = db.select("tasks", Some(&filter(&[("id", "a")])));
        fs::remove_file(&path).ok();

        assert!(hits[0]["completedAt"].is_null());
    }

    #[test]
    fn update_of_unknown_id_is_a_silent_noop() {
        let path = temp_path("noop.json");
        let db = FileDb::open(&path).unwrap();
        db.insert("tasks", record("a", "t", "d")).unwrap();

        db.update("tasks", "missing", json!({ "title": "x" })).unwrap();

        let all = db.select("tasks", None);
        fs::remove_file(&path).ok();

        assert_eq!(all.len(), 1);
        assert_eq!(all[0]["title"], "t");
    }

    #[test]
    fn delete_removes_exactly_the_matching_record() {
        let path = temp_path("delete.json");
        let db = FileDb::open(&path).unwrap();
        db.insert("tasks", record("a", "one", "one")).unwrap();
        db.insert("tasks", record("b", "two", "two")).unwrap();

        db.delete("tasks", "a").unwrap();

        let by_id = db.select("tasks", Some(&filter(&[("id", "a")])));
        let all = db.select("tasks", None);
        fs::remove_file(&path).ok();

        assert!(by_id.is_empty());
        assert_eq!(all.len(), 1);
        assert_eq!(all[0]["id"], "b");
    }

    #[test]
    fn delete_of_unknown_id_is_a_noop() {
        let path = temp_path("delete-noop.json");
        let db = FileDb::open(&path).unwrap();
        db.insert("tasks", record("a", "one", "one")).unwrap();

        db.delete("tasks", "missing").unwrap();

        let all = db.select("tasks", None);
        fs::remove_file(&path).ok();

        assert_eq!(all.len(), 1);
    }

    #[test]
    fn state_survives_a_reload_from_the_backing_file() {
        let path = temp_path("reload.json");
        {
            let db = FileDb::open(&path).unwrap();
            db.insert("tasks", record("a", "persisted", "yes")).unwrap();
        }

        let reopened = FileDb::open(&path).unwrap();
        let all = reopened.select("tasks", None);
        fs::remove_file(&path).ok();

        assert_eq!(all.len(), 1);
        assert_eq!(all[0]["title"], "persisted");
    }

    #[test]
    fn selected_records_are_copies() {
        let path = temp_path("copies.json");
        let db = FileDb::open(&path).unwrap();
        db.insert("tasks", record("a", "t", "d")).unwrap();

        let mut first = db.select("tasks", None);
        first[0]["title"] = json!("mutated locally");

        let second = db.select("tasks", None);
        fs::remove_file(&path).ok();

        assert_eq!(second[0]["title"], "t");
    }
}
