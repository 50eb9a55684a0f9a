/// Arrow schema of the persisted dataset table.
pub mod dataset {
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    pub const SOURCE: &str = "source";
    pub const LABEL: &str = "label";
    pub const EMBEDDING: &str = "embedding";

    /// Schema for embedded, labeled documents.
    ///
    /// `embedding` is a `FixedSizeList<Float32, dim>`, so every row in a
    /// table shares the same vector length.
    pub fn schema(dim: i32) -> Schema {
        Schema::new(vec![
            Field::new(SOURCE, DataType::Utf8, false),
            Field::new(LABEL, DataType::Utf8, false),
            Field::new(
                EMBEDDING,
                DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim),
                false,
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::dataset;
    use arrow::datatypes::DataType;

    #[test]
    fn dataset_schema_has_expected_fields() {
        let schema = dataset::schema(384);
        assert_eq!(schema.fields().len(), 3);
        assert!(schema.field_with_name(dataset::SOURCE).is_ok());
        assert!(schema.field_with_name(dataset::LABEL).is_ok());
        let emb = schema.field_with_name(dataset::EMBEDDING).unwrap();
        match emb.data_type() {
            DataType::FixedSizeList(_, n) => assert_eq!(*n, 384),
            other => panic!("unexpected embedding type: {other:?}"),
        }
    }
}
