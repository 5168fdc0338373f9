use serde::{Deserialize, Serialize};

/// Searchable attributes of a stored schema, copied from the document at
/// write time so backends can filter without parsing it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexFields {
    pub schema_type: Option<String>,
    pub category: Option<String>,
    pub module: Option<String>,
    pub tags: Vec<String>,
    pub tenant_id: Option<String>,
}

/// What must be true of the stored document for a write to go ahead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Precondition {
    /// Write unconditionally.
    #[default]
    None,
    /// Nothing may be stored under the id yet.
    Absent,
    /// The stored document's checksum must equal this one.
    Checksum(String),
}

/// One document to write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEntry {
    pub id: String,
    /// Version label of the document (the schema's own `version`).
    pub version: String,
    pub data: Vec<u8>,
    pub index: IndexFields,
    /// Content hash recorded in metadata.
    pub checksum: Option<String>,
    /// Also keep this document in the id's version history.
    pub versioned: bool,
    pub precondition: Precondition,
}

impl StorageEntry {
    pub fn new(id: impl Into<String>, version: impl Into<String>, data: Vec<u8>) -> Self {
        StorageEntry {
            id: id.into(),
            version: version.into(),
            data,
            index: IndexFields::default(),
            checksum: None,
            versioned: true,
            precondition: Precondition::None,
        }
    }

    pub fn with_index(mut self, index: IndexFields) -> Self {
        self.index = index;
        self
    }

    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }

    pub fn unversioned(mut self) -> Self {
        self.versioned = false;
        self
    }

    pub fn with_precondition(mut self, precondition: Precondition) -> Self {
        self.precondition = precondition;
        self
    }
}

/// Bookkeeping a backend keeps per stored document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaMetadata {
    pub id: String,
    /// Version label of the current document.
    pub version: String,
    pub index: IndexFields,
    pub size: u64,
    pub checksum: Option<String>,
    /// RFC 3339 timestamp string.
    pub created_at: String,
    /// RFC 3339 timestamp string.
    pub updated_at: String,
    /// Reads of the current document through `get`.
    pub access_count: u64,
    /// RFC 3339 timestamp string. None if never read.
    pub last_access: Option<String>,
}

/// Criteria for [`SchemaStorage::list`](crate::SchemaStorage::list).
///
/// Every set criterion must match; `tags` requires all listed tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListFilter {
    pub schema_type: Option<String>,
    pub category: Option<String>,
    pub module: Option<String>,
    pub tags: Vec<String>,
    pub tenant_id: Option<String>,
    /// Maximum number of ids returned. 0 means no limit.
    pub limit: usize,
    pub offset: usize,
}

impl ListFilter {
    pub fn matches(&self, index: &IndexFields) -> bool {
        let same = |want: &Option<String>, have: &Option<String>| {
            want.as_ref().map_or(true, |w| have.as_ref() == Some(w))
        };
        same(&self.schema_type, &index.schema_type)
            && same(&self.category, &index.category)
            && same(&self.module, &index.module)
            && same(&self.tenant_id, &index.tenant_id)
            && self.tags.iter().all(|t| index.tags.contains(t))
    }

    /// Apply offset and limit to an already filtered, ordered list.
    pub fn page(&self, ids: Vec<String>) -> Vec<String> {
        let rest = ids.into_iter().skip(self.offset);
        if self.limit == 0 {
            rest.collect()
        } else {
            rest.take(self.limit).collect()
        }
    }
}
