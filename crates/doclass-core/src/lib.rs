pub mod api;
pub mod error;
pub mod example;
pub mod labels;
pub mod schema;

pub use api::{ClassifyRequest, ClassifyResponse, ErrorBody, GatewayEvent, GatewayResponse};
pub use error::CoreError;
pub use example::{LabeledExample, embedding_dim};
pub use labels::LabelMapping;
pub use schema::dataset;
