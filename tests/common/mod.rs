//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Map, Value};
use tower::ServiceExt;

use grade_predictor::inference::Predictor;
use grade_predictor::preprocessing::Profile;
use grade_predictor::server::{create_router, AppState, ServerConfig};
use grade_predictor::storage::{DocumentStore, MemoryStore, Repository};
use grade_predictor::training::{TrainEngine, TrainingConfig};

/// Rows shaped like the imported CSV: spaced column names and the
/// `race/ethnicity` header.
pub fn grade_documents(n: usize, subjects: &[&str]) -> Vec<Map<String, Value>> {
    (0..n)
        .map(|i| {
            let mut doc = json!({
                "gender": (["female", "male"][i % 2]),
                "race/ethnicity": (["group A", "group B", "group C", "group D"][i % 4]),
                "parental level of education": (["bachelor's degree", "high school", "some college"][i % 3]),
                "lunch": (["standard", "free/reduced"][(i / 2) % 2]),
                "test preparation course": (["none", "completed"][(i / 3) % 2]),
            });
            for (j, subject) in subjects.iter().enumerate() {
                doc[*subject] = json!(48 + ((i * 13 + j * 7) % 50));
            }
            doc.as_object().cloned().unwrap_or_default()
        })
        .collect()
}

pub fn subjects_for(profile: Profile) -> Vec<String> {
    TrainingConfig::for_profile(profile).spec.subjects
}

pub fn predictor(profile: Profile) -> Predictor {
    let config = TrainingConfig::for_profile(profile);
    let subjects: Vec<&str> = config.spec.subjects.iter().map(String::as_str).collect();
    let docs = grade_documents(60, &subjects);
    let bundle = TrainEngine::new(config).fit_documents(&docs).unwrap();
    Predictor::new(bundle).unwrap()
}

pub fn temp_dir(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("grade-predictor-{}-{}", tag, uuid::Uuid::new_v4()))
}

pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        artifact_dir: PathBuf::from("/tmp/grade-predictor-test-artifacts"),
        store_dir: None,
        recent_results_capacity: 16,
        recent_results_ttl_secs: 600,
        cors_origin: None,
    }
}

pub fn test_app_with(config: ServerConfig, profile: Profile, store: Arc<dyn DocumentStore>) -> Router {
    let state = Arc::new(AppState::new(
        config,
        Arc::new(predictor(profile)),
        Repository::new(store),
    ));
    create_router(state)
}

pub fn test_app_with_store(profile: Profile, store: Arc<dyn DocumentStore>) -> Router {
    test_app_with(test_config(), profile, store)
}

pub fn test_app(profile: Profile) -> Router {
    test_app_with_store(profile, Arc::new(MemoryStore::new()))
}

/// A request body every profile accepts for its categorical columns
pub fn student(extra: Value) -> Value {
    let mut body = json!({
        "gender": "female",
        "race": "group B",
        "parental_level_of_education": "bachelor's degree",
        "lunch": "standard",
        "test_preparation_course": "completed",
    });
    if let (Some(target), Value::Object(extra)) = (body.as_object_mut(), extra) {
        target.extend(extra);
    }
    body
}

/// Send a request through the router and decode the JSON response
pub async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}
