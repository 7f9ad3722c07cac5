mod linear;
mod loader;
mod table;
mod tree;

pub use linear::LinearModel;
pub use loader::{ModelCandidates, ModelLoader};
pub use table::Table;
pub use tree::{Objective, TreeEnsemble};

use crate::{Error, Result};
use serde_json::Value;
use tree::BoosterDocument;

/// A deserialized model artifact.
#[derive(Debug, Clone, PartialEq)]
pub enum Model {
    Trees(TreeEnsemble),
    Linear(LinearModel),
}

impl Model {
    /// Decodes an artifact, telling the formats apart by their top-level keys.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| Error::model_load(format!("artifact is not a JSON document: {}", e)))?;

        if value.get("learner").is_some() {
            let doc: BoosterDocument = serde_json::from_value(value)
                .map_err(|e| Error::model_load(format!("invalid booster document: {}", e)))?;
            return TreeEnsemble::from_document(doc).map(Self::Trees);
        }

        if value.get("weights").is_some() {
            let linear: LinearModel = serde_json::from_value(value)
                .map_err(|e| Error::model_load(format!("invalid linear model: {}", e)))?;
            return Ok(Self::Linear(linear));
        }

        Err(Error::model_load(
            "unrecognized artifact: expected a booster ('learner') or linear ('weights') document",
        ))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Trees(_) => "gbtree",
            Self::Linear(_) => "linear",
        }
    }

    pub fn num_features(&self) -> usize {
        match self {
            Self::Trees(trees) => trees.num_features(),
            Self::Linear(linear) => linear.num_features(),
        }
    }

    /// One value per row, in row order.
    pub fn predict(&self, table: &Table) -> Result<Vec<f64>> {
        let predictions = match self {
            Self::Trees(trees) => trees.predict(table)?,
            Self::Linear(linear) => linear.predict(table)?,
        };
        debug_assert_eq!(predictions.len(), table.n_rows());
        Ok(predictions)
    }
}

impl From<LinearModel> for Model {
    fn from(linear: LinearModel) -> Self {
        Self::Linear(linear)
    }
}
