use std::sync::RwLock;

use arrow::datatypes::SchemaRef;
use orion_error::prelude::*;

use crate::error::{CoreReason, CoreResult};

// ---------------------------------------------------------------------------
// IndexDescriptor
// ---------------------------------------------------------------------------

/// Metadata describing one index maintained over a window's contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexDescriptor {
    pub unique: bool,
    /// Columns looked up by equality.
    pub hash_columns: Vec<String>,
    /// Columns looked up by range.
    pub range_columns: Vec<String>,
}

impl IndexDescriptor {
    pub fn hash(unique: bool, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            unique,
            hash_columns: columns.into_iter().map(Into::into).collect(),
            range_columns: Vec::new(),
        }
    }

    pub fn with_range(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.range_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Hash columns followed by range columns.
    pub fn key_columns(&self) -> impl Iterator<Item = &str> {
        self.hash_columns
            .iter()
            .chain(self.range_columns.iter())
            .map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// IndexCatalog
// ---------------------------------------------------------------------------

/// Append-only set of index descriptors owned by one window processor.
#[derive(Debug)]
pub struct IndexCatalog {
    schema: SchemaRef,
    entries: RwLock<Vec<IndexDescriptor>>,
}

impl IndexCatalog {
    pub fn new(schema: SchemaRef) -> Self {
        Self {
            schema,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Add `descriptor` unless an equal one is already present.
    ///
    /// Returns `Ok(false)` for a duplicate. Descriptors without key columns,
    /// or naming columns absent from the window schema, are rejected.
    pub fn record(&self, descriptor: IndexDescriptor) -> CoreResult<bool> {
        if descriptor.key_columns().next().is_none() {
            return StructError::from(CoreReason::IndexBuild)
                .with_detail("index descriptor has no key columns")
                .err();
        }
        if let Some(missing) = descriptor
            .key_columns()
            .find(|col| self.schema.index_of(col).is_err())
        {
            return StructError::from(CoreReason::IndexBuild)
                .with_detail(format!("index column {missing:?} not in window schema"))
                .err();
        }

        let mut entries = self.entries.write().expect("index catalog poisoned");
        if entries.contains(&descriptor) {
            return Ok(false);
        }
        entries.push(descriptor);
        Ok(true)
    }

    /// Snapshot in insertion order.
    pub fn descriptors(&self) -> Vec<IndexDescriptor> {
        self.entries.read().expect("index catalog poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("index catalog poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn clear(&self) {
        self.entries.write().expect("index catalog poisoned").clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn test_schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("order_id", DataType::Utf8, false),
            Field::new("price", DataType::Float64, false),
            Field::new("qty", DataType::Int64, false),
        ]))
    }

    #[test]
    fn record_appends_in_order() {
        let catalog = IndexCatalog::new(test_schema());
        assert!(catalog.record(IndexDescriptor::hash(true, ["order_id"])).unwrap());
        assert!(catalog
            .record(IndexDescriptor::hash(false, ["qty"]).with_range(["price"]))
            .unwrap());

        let all = catalog.descriptors();
        assert_eq!(all.len(), 2);
        assert!(all[0].unique);
        assert_eq!(all[1].key_columns().collect::<Vec<_>>(), vec!["qty", "price"]);
    }

    #[test]
    fn duplicate_descriptor_is_noop() {
        let catalog = IndexCatalog::new(test_schema());
        assert!(catalog.record(IndexDescriptor::hash(false, ["qty"])).unwrap());
        assert!(!catalog.record(IndexDescriptor::hash(false, ["qty"])).unwrap());
        assert_eq!(catalog.len(), 1);

        // Uniqueness is part of identity.
        assert!(catalog.record(IndexDescriptor::hash(true, ["qty"])).unwrap());
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn unknown_column_rejected() {
        let catalog = IndexCatalog::new(test_schema());
        let err = catalog
            .record(IndexDescriptor::hash(false, ["customer"]))
            .unwrap_err();
        assert!(err.to_string().contains("index build error"), "{err}");
        assert!(catalog.is_empty());
    }

    #[test]
    fn empty_key_rejected() {
        let catalog = IndexCatalog::new(test_schema());
        let empty: [&str; 0] = [];
        assert!(catalog.record(IndexDescriptor::hash(false, empty)).is_err());
    }

    #[test]
    fn clear_empties_catalog() {
        let catalog = IndexCatalog::new(test_schema());
        catalog.record(IndexDescriptor::hash(false, ["qty"])).unwrap();
        catalog.clear();
        assert!(catalog.descriptors().is_empty());
    }
}
