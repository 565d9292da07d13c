//! Duplicate detection between records of the same kind.
//!
//! Media records are identical when their ordered `(path, size, hash)` lists
//! are equal; fonts and reusable nodes when they resolve to the same file.
//! The first record of each identity becomes the canonical one and every
//! later record points straight at it.

use std::collections::HashMap;

use crate::record::{ConcreteFile, RecordId, ResourceKind, ResourceRecord};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum IdentityKey {
    Files(Vec<ConcreteFile>),
    Path(String),
}

fn identity_key(record: &ResourceRecord) -> Option<IdentityKey> {
    match record.kind {
        ResourceKind::Media => Some(IdentityKey::Files(record.files.clone())),
        ResourceKind::Font | ResourceKind::ReusableNode => {
            record.first_file().map(|p| IdentityKey::Path(p.to_string()))
        }
        ResourceKind::ColorConfig => None,
    }
}

/// Whether a record can be a canonical or a duplicate.
///
/// Missing records keep their own report row. Uncategorized records are not
/// copied, so they cannot serve as a canonical for another record.
fn participates(record: &ResourceRecord) -> bool {
    !record.is_missing() && record.is_categorized()
}

/// Link every duplicate record to the first record with the same identity.
///
/// # Returns
/// Number of records marked as duplicates.
pub fn mark_duplicates(records: &mut [ResourceRecord]) -> usize {
    let mut canonical: HashMap<(ResourceKind, IdentityKey), RecordId> = HashMap::new();
    let mut marked: usize = 0;

    for record in records.iter_mut() {
        if record.duplicate_of.is_some() || !participates(record) {
            continue;
        }
        let Some(key) = identity_key(record) else {
            continue;
        };
        match canonical.get(&(record.kind, key.clone())) {
            Some(&first) => {
                log::debug!("{} duplicates record {}", record.node_name, first);
                record.duplicate_of = Some(first);
                marked += 1;
            }
            None => {
                canonical.insert((record.kind, key), record.id);
            }
        }
    }
    marked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::OwnerRef;
    use crate::record::NodeFlags;
    use rusty_pack_filesystem::ResolvedPath;

    fn record(id: RecordId, kind: ResourceKind, files: &[(&str, u64, &str)]) -> ResourceRecord {
        let files: Vec<ConcreteFile> = files
            .iter()
            .map(|(path, size, hash)| ConcreteFile {
                path: path.to_string(),
                size: *size,
                hash: hash.to_string(),
            })
            .collect();
        let mut record: ResourceRecord = ResourceRecord::new(
            id,
            kind,
            OwnerRef::new(format!("Node{}", id), "file"),
            "Read",
            NodeFlags::default(),
        )
        .with_source("", ResolvedPath::default(), files);
        record.categories.push("plates".to_string());
        record
    }

    #[test]
    fn test_three_identical_records_one_canonical() {
        let files = [("/a/p.1001.exr", 10, "h1"), ("/a/p.1002.exr", 10, "h2")];
        let mut records: Vec<ResourceRecord> = vec![
            record(0, ResourceKind::Media, &files),
            record(1, ResourceKind::Media, &files),
            record(2, ResourceKind::Media, &files),
        ];

        assert_eq!(mark_duplicates(&mut records), 2);
        assert_eq!(records[0].duplicate_of, None);
        assert_eq!(records[1].duplicate_of, Some(0));
        assert_eq!(records[2].duplicate_of, Some(0));
    }

    #[test]
    fn test_order_and_content_matter_for_media() {
        let mut records: Vec<ResourceRecord> = vec![
            record(0, ResourceKind::Media, &[("/a", 1, "x"), ("/b", 1, "y")]),
            record(1, ResourceKind::Media, &[("/b", 1, "y"), ("/a", 1, "x")]),
            record(2, ResourceKind::Media, &[("/a", 1, "x"), ("/b", 1, "z")]),
        ];

        assert_eq!(mark_duplicates(&mut records), 0);
    }

    #[test]
    fn test_kinds_are_independent() {
        let mut records: Vec<ResourceRecord> = vec![
            record(0, ResourceKind::Media, &[("/f/a.ttf", 1, "x")]),
            record(1, ResourceKind::Font, &[("/f/a.ttf", 1, "x")]),
            record(2, ResourceKind::Font, &[("/f/a.ttf", 1, "other")]),
        ];

        assert_eq!(mark_duplicates(&mut records), 1);
        assert_eq!(records[1].duplicate_of, None);
        assert_eq!(records[2].duplicate_of, Some(1));
    }

    #[test]
    fn test_missing_and_uncategorized_never_participate() {
        let mut records: Vec<ResourceRecord> = vec![
            record(0, ResourceKind::Media, &[]),
            record(1, ResourceKind::Media, &[]),
            record(2, ResourceKind::Media, &[("/a", 1, "x")]),
            record(3, ResourceKind::Media, &[("/a", 1, "x")]),
        ];
        records[2].categories.clear();

        assert_eq!(mark_duplicates(&mut records), 0);
        assert!(records.iter().all(|r| r.duplicate_of.is_none()));
    }

    #[test]
    fn test_existing_links_are_kept() {
        let files = [("/a", 1, "x")];
        let mut records: Vec<ResourceRecord> = vec![
            record(0, ResourceKind::Media, &files),
            record(1, ResourceKind::Media, &files),
        ];
        mark_duplicates(&mut records);

        assert_eq!(mark_duplicates(&mut records), 0);
        assert_eq!(records[1].duplicate_of, Some(0));
    }
}
