//! Duplicate detection over the frozen scan buffer.
//!
//! Pure functions: grouping by normalized title and survivor selection
//! happen entirely in memory, after the scan phase has finished. The
//! actor feeds the resulting remove lists to the archiver.

use std::collections::HashMap;

use crate::job::{DuplicateGroup, KeepPolicy, ScannedRecord};

/// Normalizes a display title into the grouping key: trimmed and
/// lowercased. Two records are duplicates when their keys match.
pub fn normalize_title(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Groups buffered records by normalized title and picks a survivor per
/// group according to `keep_policy`.
///
/// Groups appear in the order their key was first seen in the buffer.
/// Members are sorted by `created_at` ascending with a stable sort, so
/// records sharing a timestamp keep their buffer order. Groups with a
/// single member are not duplicates and are dropped.
pub fn find_duplicates(buffer: &[ScannedRecord], keep_policy: KeepPolicy) -> Vec<DuplicateGroup> {
    let mut members_by_key: HashMap<&str, Vec<&ScannedRecord>> = HashMap::new();
    let mut key_order: Vec<&str> = Vec::new();

    for record in buffer {
        let key = record.normalized_title.as_str();
        let members = members_by_key.entry(key).or_default();
        if members.is_empty() {
            key_order.push(key);
        }
        members.push(record);
    }

    let mut groups = Vec::new();
    for key in key_order {
        let mut members = match members_by_key.remove(key) {
            Some(members) if members.len() > 1 => members,
            _ => continue,
        };
        members.sort_by_key(|record| record.created_at);

        let survivor = match keep_policy {
            KeepPolicy::Oldest => 0,
            KeepPolicy::Newest => members.len() - 1,
        };
        let keep_id = members[survivor].id.clone();
        let remove_ids = members
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != survivor)
            .map(|(_, record)| record.id.clone())
            .collect();

        groups.push(DuplicateGroup {
            key: key.to_string(),
            keep_id,
            remove_ids,
        });
    }
    groups
}
