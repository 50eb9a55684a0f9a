//! Parquet persistence for the embedded dataset table.
//!
//! One row per document: `source`, `label`, and a fixed-size `embedding`
//! list. The table is written once by the dataset builder and read back by
//! every training run.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, FixedSizeListArray, FixedSizeListBuilder, Float32Array, Float32Builder,
    LargeStringArray, StringArray, StringBuilder,
};
use arrow::record_batch::RecordBatch;
use doclass_core::{LabeledExample, dataset, embedding_dim};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::info;

use crate::StoreError;

/// Write examples to a Parquet file, replacing any existing file.
pub fn write_dataset(path: &Path, examples: &[LabeledExample]) -> Result<(), StoreError> {
    let batch = examples_to_batch(examples)?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(&batch)?;
    writer.close()?;

    info!(rows = batch.num_rows(), path = %path.display(), "wrote dataset");
    Ok(())
}

/// Read every example from a dataset Parquet file.
pub fn read_dataset(path: &Path) -> Result<Vec<LabeledExample>, StoreError> {
    if !path.exists() {
        return Err(StoreError::NotFound(path.to_path_buf()));
    }
    let batches = read_parquet(path)?;

    let mut examples = Vec::new();
    for batch in &batches {
        examples.extend(batch_to_examples(batch)?);
    }

    info!(rows = examples.len(), path = %path.display(), "read dataset");
    Ok(examples)
}

/// Read a Parquet file into Arrow RecordBatches.
pub fn read_parquet(path: &Path) -> Result<Vec<RecordBatch>, StoreError> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let batches: Result<Vec<RecordBatch>, _> = reader.collect();
    Ok(batches?)
}

/// Build a single RecordBatch from examples.
///
/// Fails on an empty slice, zero-length vectors, or mixed vector lengths.
pub fn examples_to_batch(examples: &[LabeledExample]) -> Result<RecordBatch, StoreError> {
    let dim = embedding_dim(examples)
        .map_err(|e| StoreError::Schema(e.to_string()))?
        .ok_or_else(|| StoreError::Schema("cannot write a dataset with no examples".into()))?;
    if dim == 0 {
        return Err(StoreError::Schema("embeddings have zero length".into()));
    }
    let dim = i32::try_from(dim)
        .map_err(|_| StoreError::Schema(format!("embedding dimension {dim} too large")))?;

    let mut source_builder = StringBuilder::new();
    let mut label_builder = StringBuilder::new();
    let mut emb_builder = FixedSizeListBuilder::new(Float32Builder::new(), dim);

    for ex in examples {
        source_builder.append_value(&ex.source);
        label_builder.append_value(&ex.label);
        let values = emb_builder.values();
        for &v in &ex.embedding {
            values.append_value(v);
        }
        emb_builder.append(true);
    }

    let schema = Arc::new(dataset::schema(dim));
    Ok(RecordBatch::try_new(
        schema,
        vec![
            Arc::new(source_builder.finish()),
            Arc::new(label_builder.finish()),
            Arc::new(emb_builder.finish()),
        ],
    )?)
}

/// Convert one RecordBatch of the dataset table back into examples.
pub fn batch_to_examples(batch: &RecordBatch) -> Result<Vec<LabeledExample>, StoreError> {
    let source_col = column(batch, dataset::SOURCE)?;
    let label_col = column(batch, dataset::LABEL)?;
    let emb_col = column(batch, dataset::EMBEDDING)?;

    let fsl = emb_col
        .as_any()
        .downcast_ref::<FixedSizeListArray>()
        .ok_or_else(|| StoreError::Schema("embedding column is not FixedSizeList".into()))?;

    let mut out = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let label = get_string(label_col.as_ref(), row)
            .ok_or_else(|| StoreError::Schema(format!("null label at row {row}")))?;
        let source = get_string(source_col.as_ref(), row).unwrap_or_default();
        if fsl.is_null(row) {
            return Err(StoreError::Schema(format!("null embedding at row {row}")));
        }
        let values = fsl.value(row);
        let values = values
            .as_any()
            .downcast_ref::<Float32Array>()
            .ok_or_else(|| StoreError::Schema("embedding values are not Float32".into()))?;
        out.push(LabeledExample {
            source,
            label,
            embedding: values.values().to_vec(),
        });
    }
    Ok(out)
}

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Arc<dyn Array>, StoreError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| StoreError::Schema(format!("missing '{name}' column")))
}

/// Extract a string value from an Arrow array (handles Utf8 and LargeUtf8).
fn get_string(col: &dyn Array, row: usize) -> Option<String> {
    if col.is_null(row) {
        return None;
    }
    col.as_any()
        .downcast_ref::<StringArray>()
        .map(|arr| arr.value(row).to_string())
        .or_else(|| {
            col.as_any()
                .downcast_ref::<LargeStringArray>()
                .map(|arr| arr.value(row).to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> Vec<LabeledExample> {
        vec![
            LabeledExample::new("data/business/1.txt", "business", vec![0.1, 0.2, 0.3, 0.4]),
            LabeledExample::new("data/sport/7.txt", "sport", vec![-1.0, 0.0, 1.0, 2.5]),
            LabeledExample::new("data/tech/3.txt", "tech", vec![0.0, 0.0, 0.0, 1.0]),
        ]
    }

    #[test]
    fn parquet_file_preserves_examples() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("embedding_labels.parquet");

        write_dataset(&path, &sample()).unwrap();
        let back = read_dataset(&path).unwrap();

        assert_eq!(back, sample());
    }

    #[test]
    fn batch_has_fixed_size_embeddings() {
        let batch = examples_to_batch(&sample()).unwrap();
        assert_eq!(batch.num_rows(), 3);
        let fsl = batch
            .column_by_name("embedding")
            .unwrap()
            .as_any()
            .downcast_ref::<FixedSizeListArray>()
            .unwrap();
        assert_eq!(fsl.value_length(), 4);
    }

    #[test]
    fn empty_dataset_rejected() {
        let err = examples_to_batch(&[]).unwrap_err();
        assert!(matches!(err, StoreError::Schema(_)));
    }

    #[test]
    fn mixed_dimensions_rejected() {
        let mut examples = sample();
        examples[1].embedding.pop();
        let err = examples_to_batch(&examples).unwrap_err();
        assert!(err.to_string().contains("data/sport/7.txt"), "got: {err}");
    }

    #[test]
    fn missing_file_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = read_dataset(&tmp.path().join("absent.parquet")).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
