use arrow::compute::concat_batches;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use orion_error::prelude::*;

use crate::error::{CoreReason, CoreResult};

/// One computed change batch of a named window: the rows inserted and the
/// rows removed by a single processing step, in event order.
///
/// Both batches carry the window schema; either may hold zero rows, never
/// both.
#[derive(Debug, Clone)]
pub struct NamedWindowDeltaData {
    window: String,
    inserted: RecordBatch,
    removed: RecordBatch,
}

impl NamedWindowDeltaData {
    /// Package a raw change set of `window`, or `None` when both sides are
    /// empty.
    ///
    /// Every batch must match `schema`; multiple batches per side are
    /// concatenated in the given order.
    pub fn build(
        window: &str,
        schema: &SchemaRef,
        inserted: &[RecordBatch],
        removed: &[RecordBatch],
    ) -> CoreResult<Option<Self>> {
        let inserted = concat_side(schema, inserted, "inserted")?;
        let removed = concat_side(schema, removed, "removed")?;
        if inserted.num_rows() == 0 && removed.num_rows() == 0 {
            return Ok(None);
        }
        Ok(Some(Self {
            window: window.to_string(),
            inserted,
            removed,
        }))
    }

    /// Merge deltas of one window accumulated within a cycle: all inserts in
    /// order, then all removes in order.
    pub(crate) fn concat(parts: &[&NamedWindowDeltaData]) -> CoreResult<Self> {
        let Some(first) = parts.first() else {
            return StructError::from(CoreReason::DataFormat)
                .with_detail("no deltas to concatenate")
                .err();
        };
        if let Some(other) = parts.iter().find(|d| d.window != first.window) {
            return StructError::from(CoreReason::DataFormat)
                .with_detail(format!(
                    "cannot merge deltas of {:?} and {:?}",
                    first.window, other.window
                ))
                .err();
        }
        let schema = first.schema();
        let inserted: Vec<RecordBatch> = parts.iter().map(|d| d.inserted.clone()).collect();
        let removed: Vec<RecordBatch> = parts.iter().map(|d| d.removed.clone()).collect();
        Ok(Self {
            window: first.window.clone(),
            inserted: concat_side(&schema, &inserted, "inserted")?,
            removed: concat_side(&schema, &removed, "removed")?,
        })
    }

    /// Name of the named window that produced this delta.
    pub fn window(&self) -> &str {
        &self.window
    }

    pub fn inserted(&self) -> &RecordBatch {
        &self.inserted
    }

    pub fn removed(&self) -> &RecordBatch {
        &self.removed
    }

    pub fn schema(&self) -> SchemaRef {
        self.inserted.schema()
    }
}

fn concat_side(schema: &SchemaRef, batches: &[RecordBatch], side: &str) -> CoreResult<RecordBatch> {
    if let Some(bad) = batches.iter().find(|b| b.schema() != *schema) {
        return StructError::from(CoreReason::DataFormat)
            .with_detail(format!(
                "{side} batch schema mismatch: expected {:?}, got {:?}",
                schema,
                bad.schema()
            ))
            .err();
    }
    match batches {
        [] => Ok(RecordBatch::new_empty(schema.clone())),
        [single] => Ok(single.clone()),
        many => concat_batches(schema, many).map_err(|e| {
            StructError::from(CoreReason::DataFormat)
                .with_detail(format!("concat {side} batches: {e}"))
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, Int64Array};
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn test_schema() -> SchemaRef {
        Arc::new(Schema::new(vec![Field::new("qty", DataType::Int64, false)]))
    }

    fn make_batch(schema: &SchemaRef, values: &[i64]) -> RecordBatch {
        RecordBatch::try_new(
            schema.clone(),
            vec![Arc::new(Int64Array::from(values.to_vec()))],
        )
        .unwrap()
    }

    fn column(batch: &RecordBatch) -> Vec<i64> {
        let arr = batch
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        (0..arr.len()).map(|i| arr.value(i)).collect()
    }

    #[test]
    fn empty_change_set_yields_none() {
        let schema = test_schema();
        assert!(NamedWindowDeltaData::build("W", &schema, &[], &[]).unwrap().is_none());

        let empty = make_batch(&schema, &[]);
        let delta = NamedWindowDeltaData::build("W", &schema, &[empty.clone()], &[empty]).unwrap();
        assert!(delta.is_none());
    }

    #[test]
    fn insert_only_has_empty_remove_side() {
        let schema = test_schema();
        let delta = NamedWindowDeltaData::build("W", &schema, &[make_batch(&schema, &[1, 2])], &[])
            .unwrap()
            .unwrap();
        assert_eq!(column(delta.inserted()), vec![1, 2]);
        assert_eq!(delta.removed().num_rows(), 0);
        assert_eq!(delta.removed().schema(), schema);
    }

    #[test]
    fn multiple_batches_concatenate_in_order() {
        let schema = test_schema();
        let delta = NamedWindowDeltaData::build(
            "W",
            &schema,
            &[make_batch(&schema, &[1]), make_batch(&schema, &[2, 3])],
            &[make_batch(&schema, &[9])],
        )
        .unwrap()
        .unwrap();
        assert_eq!(column(delta.inserted()), vec![1, 2, 3]);
        assert_eq!(column(delta.removed()), vec![9]);
    }

    #[test]
    fn concat_keeps_enqueue_order_per_side() {
        let schema = test_schema();
        let build = |ins: &[i64], rem: &[i64]| {
            NamedWindowDeltaData::build(
                "W",
                &schema,
                &[make_batch(&schema, ins)],
                &[make_batch(&schema, rem)],
            )
            .unwrap()
            .unwrap()
        };
        let d1 = build(&[1], &[]);
        let d2 = build(&[2], &[1]);
        let d3 = build(&[3, 4], &[]);

        let merged = NamedWindowDeltaData::concat(&[&d1, &d2, &d3]).unwrap();
        assert_eq!(merged.window(), "W");
        assert_eq!(column(merged.inserted()), vec![1, 2, 3, 4]);
        assert_eq!(column(merged.removed()), vec![1]);
    }

    #[test]
    fn concat_rejects_mixed_windows() {
        let schema = test_schema();
        let a = NamedWindowDeltaData::build("A", &schema, &[make_batch(&schema, &[1])], &[])
            .unwrap()
            .unwrap();
        let b = NamedWindowDeltaData::build("B", &schema, &[make_batch(&schema, &[2])], &[])
            .unwrap()
            .unwrap();
        assert!(NamedWindowDeltaData::concat(&[&a, &b]).is_err());
        assert!(NamedWindowDeltaData::concat(&[]).is_err());
    }

    #[test]
    fn schema_mismatch_rejected() {
        let schema = test_schema();
        let other: SchemaRef =
            Arc::new(Schema::new(vec![Field::new("price", DataType::Int64, false)]));
        let err = NamedWindowDeltaData::build("W", &schema, &[make_batch(&other, &[1])], &[])
            .unwrap_err();
        assert!(err.to_string().contains("data format error"), "{err}");
    }
}
