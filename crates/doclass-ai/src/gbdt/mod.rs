//! Deterministic multiclass gradient-boosted trees.
//!
//! Softmax boosting over quantile-binned features with leaf-wise tree
//! growth, in the manner of LightGBM:
//! - `gbdt` and `dart` boosting,
//! - L1/L2 regularised second-order gains,
//! - seeded row bagging and per-tree feature sampling,
//! - JSON export/load of the trained trees via serde.

mod binning;
mod model;
mod params;
mod train;

pub use binning::BinMapper;
pub use model::{BoostedClassifier, Node, Round, Tree, softmax};
pub use params::{BoostingParams, BoostingType};
pub use train::train;
