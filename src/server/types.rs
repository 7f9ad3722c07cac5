use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use std::fmt::Write;

pub const CSV_MEDIA_TYPE: &str = "text/csv";

/// Single-column, headerless CSV: one prediction per line.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvPredictions(pub Vec<f64>);

impl CsvPredictions {
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(self.0.len() * 8);
        for value in &self.0 {
            // `{:?}` keeps the fractional part: 6 renders as "6.0".
            let _ = writeln!(out, "{:?}", value);
        }
        out
    }
}

impl IntoResponse for CsvPredictions {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [(header::CONTENT_TYPE, CSV_MEDIA_TYPE)],
            self.encode(),
        )
            .into_response()
    }
}
