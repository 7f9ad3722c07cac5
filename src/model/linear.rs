use super::Table;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// `bias + Σ wᵢ·xᵢ`; missing inputs contribute nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinearModel {
    pub weights: Vec<f64>,
    #[serde(default)]
    pub bias: f64,
}

impl LinearModel {
    pub fn new(weights: Vec<f64>, bias: f64) -> Self {
        Self { weights, bias }
    }

    pub fn num_features(&self) -> usize {
        self.weights.len()
    }

    pub fn predict(&self, table: &Table) -> Result<Vec<f64>> {
        if !table.is_empty() && table.n_cols() != self.weights.len() {
            return Err(Error::prediction(format!(
                "model expects {} features, got {}",
                self.weights.len(),
                table.n_cols()
            )));
        }

        Ok(table.rows().map(|row| self.predict_row(row)).collect())
    }

    fn predict_row(&self, row: &[f64]) -> f64 {
        self.weights
            .iter()
            .zip(row)
            .filter(|(_, x)| !x.is_nan())
            .fold(self.bias, |acc, (w, x)| acc + w * x)
    }
}
