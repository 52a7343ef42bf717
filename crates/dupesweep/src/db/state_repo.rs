//! State repository — key-value rows for the `sweep_state` table.
//!
//! Each sweep actor owns one `instance` scope; within it the job record
//! and the scan buffer live under their own keys as JSON strings.

use chrono::Utc;
use rusqlite::params;

use super::{Database, DatabaseError};

/// Inserts or overwrites the value stored under (instance, key).
pub fn put(db: &Database, instance: &str, key: &str, value: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO sweep_state (instance, key, value, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (instance, key)
             DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![instance, key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    })
}

/// Inserts or overwrites several values under one instance in a single
/// transaction. Either every entry is committed or none is.
pub fn put_many(
    db: &Database,
    instance: &str,
    entries: &[(&str, &str)],
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;
        let now = Utc::now().to_rfc3339();
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO sweep_state (instance, key, value, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (instance, key)
                 DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            )?;
            for (key, value) in entries {
                stmt.execute(params![instance, key, value, now])?;
            }
        }
        tx.commit()?;
        Ok(())
    })
}

/// Fetches the value stored under (instance, key), if any.
pub fn get(db: &Database, instance: &str, key: &str) -> Result<Option<String>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT value FROM sweep_state WHERE instance = ?1 AND key = ?2")?;
        let mut rows = stmt.query_map(params![instance, key], |row| row.get::<_, String>(0))?;
        match rows.next() {
            Some(Ok(value)) => Ok(Some(value)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Deletes the value stored under (instance, key). Returns whether a row
/// was actually removed.
pub fn delete(db: &Database, instance: &str, key: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let affected = conn.execute(
            "DELETE FROM sweep_state WHERE instance = ?1 AND key = ?2",
            params![instance, key],
        )?;
        Ok(affected > 0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    #[test]
    fn test_put_and_get() {
        let db = test_db();
        put(&db, "inst-1", "job", r#"{"id":"j1"}"#).unwrap();

        let value = get(&db, "inst-1", "job").unwrap();
        assert_eq!(value.as_deref(), Some(r#"{"id":"j1"}"#));
    }

    #[test]
    fn test_get_missing() {
        let db = test_db();
        assert!(get(&db, "inst-1", "job").unwrap().is_none());
    }

    #[test]
    fn test_put_overwrites() {
        let db = test_db();
        put(&db, "inst-1", "job", "old").unwrap();
        put(&db, "inst-1", "job", "new").unwrap();

        assert_eq!(get(&db, "inst-1", "job").unwrap().as_deref(), Some("new"));
    }

    #[test]
    fn test_instances_are_scoped() {
        let db = test_db();
        put(&db, "inst-1", "job", "one").unwrap();
        put(&db, "inst-2", "job", "two").unwrap();

        assert_eq!(get(&db, "inst-1", "job").unwrap().as_deref(), Some("one"));
        assert_eq!(get(&db, "inst-2", "job").unwrap().as_deref(), Some("two"));
    }

    #[test]
    fn test_put_many_writes_every_entry() {
        let db = test_db();
        put(&db, "inst-1", "job", "stale-job").unwrap();

        put_many(&db, "inst-1", &[("job", "fresh-job"), ("buffer", "[]")]).unwrap();

        assert_eq!(
            get(&db, "inst-1", "job").unwrap().as_deref(),
            Some("fresh-job")
        );
        assert_eq!(
            get(&db, "inst-1", "buffer").unwrap().as_deref(),
            Some("[]")
        );
    }

    #[test]
    fn test_delete() {
        let db = test_db();
        put(&db, "inst-1", "buffer", "[]").unwrap();

        assert!(delete(&db, "inst-1", "buffer").unwrap());
        assert!(get(&db, "inst-1", "buffer").unwrap().is_none());
        // Deleting again reports no row removed.
        assert!(!delete(&db, "inst-1", "buffer").unwrap());
    }

    #[test]
    fn test_put_sets_updated_at() {
        let db = test_db();
        put(&db, "inst-1", "job", "{}").unwrap();

        let updated_at: Option<String> = db
            .with_conn(|conn| {
                let v = conn.query_row(
                    "SELECT updated_at FROM sweep_state WHERE instance = 'inst-1' AND key = 'job'",
                    [],
                    |r| r.get(0),
                )?;
                Ok(v)
            })
            .unwrap();
        assert!(updated_at.is_some());
    }
}
