//! Metadata predicates applied before scoring.

use crate::index::ChunkMetadata;

/// Conjunction of `must` conditions with none of the `must_not` conditions.
///
/// Recognized fields: `source`, `file_name`, `content_type` (text) and `page`,
/// `chunk_index` (integer). A `must` on an unknown or absent field matches nothing; a
/// `must_not` on one excludes nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilter {
    pub must: Vec<FieldCondition>,
    pub must_not: Vec<FieldCondition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldCondition {
    pub field: String,
    pub value: FieldValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Integer(i64),
    Text(String),
}

impl FieldCondition {
    #[must_use]
    pub fn text(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: FieldValue::Text(value.into()),
        }
    }

    #[must_use]
    pub fn integer(field: impl Into<String>, value: i64) -> Self {
        Self {
            field: field.into(),
            value: FieldValue::Integer(value),
        }
    }

    fn matches(&self, metadata: &ChunkMetadata) -> bool {
        match (&self.value, self.field.as_str()) {
            (FieldValue::Text(v), "source") => metadata.source == *v,
            (FieldValue::Text(v), "file_name") => metadata.file_name == *v,
            (FieldValue::Text(v), "content_type") => metadata.content_type == *v,
            (FieldValue::Integer(v), "page") => metadata.page.map(i64::from) == Some(*v),
            (FieldValue::Integer(v), "chunk_index") => {
                i64::try_from(metadata.chunk_index).ok() == Some(*v)
            }
            _ => false,
        }
    }
}

impl SearchFilter {
    #[must_use]
    pub fn must(mut self, condition: FieldCondition) -> Self {
        self.must.push(condition);
        self
    }

    #[must_use]
    pub fn must_not(mut self, condition: FieldCondition) -> Self {
        self.must_not.push(condition);
        self
    }

    #[must_use]
    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        self.must.iter().all(|c| c.matches(metadata))
            && !self.must_not.iter().any(|c| c.matches(metadata))
    }
}
