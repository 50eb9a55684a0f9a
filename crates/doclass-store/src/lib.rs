//! Storage layer: Parquet dataset tables and JSON artifact files.

mod error;
pub use error::StoreError;

mod dataset;
pub use dataset::{examples_to_batch, batch_to_examples, read_dataset, read_parquet, write_dataset};

mod json;
pub use json::{read_json, write_json};
