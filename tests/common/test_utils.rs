#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response},
};
use tabular_serve::{
    model::ModelLoader,
    server::{self, handlers::AppState},
};
use std::{
    io,
    sync::{Arc, Mutex},
};
use tempfile::TempDir;
use tracing::subscriber::DefaultGuard;

/// Linear model whose prediction is the sum of three features.
pub const ROW_SUM_MODEL: &str = r#"{"weights": [1.0, 1.0, 1.0], "bias": 0.0}"#;

/// Two-stump regression ensemble in XGBoost's JSON layout.
///
/// Tree 0 splits feature 0 at 0.5 (-1.0 / 1.0), tree 1 splits feature 1 at
/// 2.0 (0.25 / 0.75, missing goes left). Base score 0.5.
pub const BOOSTER_MODEL: &str = r#"{
  "learner": {
    "attributes": {},
    "feature_names": [],
    "feature_types": [],
    "gradient_booster": {
      "name": "gbtree",
      "model": {
        "gbtree_model_param": {"num_parallel_tree": "1", "num_trees": "2"},
        "iteration_indptr": [0, 2],
        "tree_info": [0, 0],
        "trees": [
          {
            "base_weights": [0.0, -1.0, 1.0],
            "categories": [],
            "default_left": [0, 0, 0],
            "id": 0,
            "left_children": [1, -1, -1],
            "loss_changes": [1.0, 0.0, 0.0],
            "parents": [2147483647, 0, 0],
            "right_children": [2, -1, -1],
            "split_conditions": [0.5, -1.0, 1.0],
            "split_indices": [0, 0, 0],
            "split_type": [0, 0, 0],
            "sum_hessian": [2.0, 1.0, 1.0],
            "tree_param": {"num_deleted": "0", "num_feature": "2", "num_nodes": "3", "size_leaf_vector": "1"}
          },
          {
            "base_weights": [0.0, 0.25, 0.75],
            "categories": [],
            "default_left": [1, 0, 0],
            "id": 1,
            "left_children": [1, -1, -1],
            "loss_changes": [1.0, 0.0, 0.0],
            "parents": [2147483647, 0, 0],
            "right_children": [2, -1, -1],
            "split_conditions": [2.0, 0.25, 0.75],
            "split_indices": [1, 0, 0],
            "split_type": [0, 0, 0],
            "sum_hessian": [2.0, 1.0, 1.0],
            "tree_param": {"num_deleted": "0", "num_feature": "2", "num_nodes": "3", "size_leaf_vector": "1"}
          }
        ]
      }
    },
    "learner_model_param": {
      "base_score": "5E-1",
      "boost_from_average": "1",
      "num_class": "0",
      "num_feature": "2",
      "num_target": "1"
    },
    "objective": {
      "name": "reg:squarederror",
      "reg_loss_param": {"scale_pos_weight": "1"}
    }
  },
  "version": [2, 0, 3]
}"#;

pub const TEST_BODY_LIMIT: usize = 64 * 1024;

/// Create a temporary model directory holding the given files
pub fn create_model_dir(files: &[(&str, &str)]) -> TempDir {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    for (name, content) in files {
        std::fs::write(temp_dir.path().join(name), content).expect("Failed to write model file");
    }
    temp_dir
}

/// Build the app over a model directory, returning the state for inspection
pub fn create_test_app(model_dir: &TempDir) -> (Router, AppState) {
    let state = AppState::new(ModelLoader::new(model_dir.path()));
    (server::router(state.clone(), TEST_BODY_LIMIT), state)
}

pub fn ping_request() -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri("/ping")
        .body(Body::empty())
        .unwrap()
}

pub fn invocation_request(content_type: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/invocations")
        .header("content-type", content_type)
        .body(body.into())
        .unwrap()
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Log lines written while the guard from `capture_logs` is alive
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    pub fn count_matching(&self, needle: &str) -> usize {
        self.contents().lines().filter(|line| line.contains(needle)).count()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Route this thread's events into a buffer; use with a current-thread runtime
pub fn capture_logs() -> (CapturedLogs, DefaultGuard) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();
    (logs, tracing::subscriber::set_default(subscriber))
}
