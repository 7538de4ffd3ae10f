use indexmap::IndexMap;

use crate::types::{Record, RecordId};

/// Builds an `id -> name` mapping from a list of records.
///
/// A repeated id overwrites the earlier name but keeps the position of its
/// first occurrence.
pub fn id_name_map<I, R>(records: I) -> IndexMap<RecordId, String>
where
    I: IntoIterator<Item = R>,
    R: Into<Record>,
{
    let mut map = IndexMap::new();
    for record in records {
        let record = record.into();
        map.insert(record.id, record.name);
    }
    map
}

/// Returns the id of the first entry, in map order, whose name equals `name`.
pub fn id_for_name(map: &IndexMap<RecordId, String>, name: &str) -> Option<RecordId> {
    map.iter()
        .find(|(_, candidate)| candidate.as_str() == name)
        .map(|(id, _)| *id)
}

/// Whether any entry carries `name`.
pub fn contains_name(map: &IndexMap<RecordId, String>, name: &str) -> bool {
    map.values().any(|candidate| candidate == name)
}
