//! Integration test: prediction endpoint end to end

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use grade_predictor::error::{GradeError, Result};
use grade_predictor::inference::LetterGrade;
use grade_predictor::preprocessing::Profile;
use grade_predictor::storage::{Document, DocumentStore, JsonFileStore};
use serde_json::{json, Map, Value};

use common::{send, student, temp_dir, test_app, test_app_with_store};

/// Store whose every call fails as an outage
struct DownStore;

impl DocumentStore for DownStore {
    fn insert(&self, _collection: &str, _doc: Document) -> Result<()> {
        Err(GradeError::StoreUnavailable("connection refused".to_string()))
    }

    fn find_all(&self, _collection: &str) -> Result<Vec<Document>> {
        Err(GradeError::StoreUnavailable("connection refused".to_string()))
    }

    fn update(&self, _collection: &str, _id: &str, _patch: Map<String, Value>) -> Result<Option<Document>> {
        Err(GradeError::StoreUnavailable("connection refused".to_string()))
    }

    fn delete(&self, _collection: &str, _id: &str) -> Result<bool> {
        Err(GradeError::StoreUnavailable("connection refused".to_string()))
    }

    fn ping(&self) -> Result<()> {
        Err(GradeError::StoreUnavailable("connection refused".to_string()))
    }
}

fn subject_request(target: &str) -> Value {
    let mut body = student(json!({ "target_subject": target }));
    for subject in [
        "math_score", "reading_score", "writing_score", "history_score",
        "geography_score", "physics_score", "chemistry_score", "science_score",
    ] {
        body[subject] = json!(74);
    }
    body
}

fn grade_of(value: &Value) -> LetterGrade {
    serde_json::from_value(value.clone()).unwrap()
}

/// Grades come from the unrounded score, at most 0.05 from the reported one
fn assert_grade_near(grade: LetterGrade, reported: f64) {
    let candidates = [LetterGrade::from_score(reported - 0.05), LetterGrade::from_score(reported + 0.05)];
    assert!(candidates.contains(&grade), "{} does not fit {}", grade, reported);
}

#[tokio::test]
async fn test_fixed_prediction_end_to_end() {
    let app = test_app(Profile::Fixed);
    let body = student(json!({ "math_score": 72, "reading_score": 88 }));
    let (status, response) = send(app, "POST", "/api/predict", Some(body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["success"], json!(true));
    let scores = &response["predicted_scores"];
    let math = scores["math"].as_f64().unwrap();
    let reading = scores["reading"].as_f64().unwrap();
    let writing = scores["writing"].as_f64().unwrap();
    let average = scores["average"].as_f64().unwrap();

    assert!(((math + reading + writing) / 3.0 - average).abs() <= 0.06);
    assert_grade_near(grade_of(&response["prediction"]), average);
    let confidence = response["confidence"].as_f64().unwrap();
    assert!(confidence > 0.0 && confidence <= 1.0);
    assert!(response.get("neighbors").is_none());
}

#[tokio::test]
async fn test_legacy_root_route() {
    let app = test_app(Profile::Fixed);
    let (status, response) = send(app, "POST", "/predict", Some(student(json!({})))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["success"], json!(true));
}

#[tokio::test]
async fn test_missing_field_is_reported() {
    let app = test_app(Profile::Fixed);
    let mut body = student(json!({ "math_score": 60 }));
    body.as_object_mut().unwrap().remove("lunch");

    let (status, response) = send(app, "POST", "/api/predict", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["success"], json!(false));
    assert!(response["error"].as_str().unwrap().contains("lunch"));
}

#[tokio::test]
async fn test_invalid_json_is_bad_request() {
    let app = test_app(Profile::Fixed);
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/predict")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{\"gender\": "))
        .unwrap();
    let response = tower::ServiceExt::oneshot(app, request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_subject_prediction_end_to_end() {
    let app = test_app(Profile::MultiSubject);
    let (status, response) =
        send(app, "POST", "/api/predict", Some(subject_request("Physics Score"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["target_subject"], json!("physics score"));
    let score = response["predicted_score"].as_f64().unwrap();
    assert_grade_near(grade_of(&response["predicted_grade"]), score);
    assert_eq!(response["neighbors"].as_array().map(Vec::len), Some(5));
    assert!(response["avg_grade"].is_number());
    assert!(response["message"].as_str().unwrap().contains("physics"));
    assert!(!response["recommendation"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_subject_is_rejected() {
    let app = test_app(Profile::MultiSubject);
    let (status, response) =
        send(app, "POST", "/api/predict", Some(subject_request("art score"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(response["error"].as_str().unwrap().contains("art score"));
}

#[tokio::test]
async fn test_missing_subject_score_is_rejected() {
    let app = test_app(Profile::MultiSubject);
    let mut body = subject_request("math score");
    body.as_object_mut().unwrap().remove("reading_score");
    let (status, response) = send(app, "POST", "/api/predict", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(response["error"].as_str().unwrap().contains("reading score"));
}

#[tokio::test]
async fn test_prediction_is_logged_and_cached() {
    let app = test_app(Profile::MultiSubject);
    let mut body = subject_request("history score");
    body["user_email"] = json!("Student@Example.com");

    let (status, predicted) = send(app.clone(), "POST", "/api/predict", Some(body)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, logged) =
        send(app.clone(), "GET", "/api/predictions?user=student@example.com", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(logged["count"], json!(1));
    let record = &logged["predictions"][0];
    assert_eq!(record["user_email"], json!("student@example.com"));
    assert_eq!(record["target_subject"], json!("history score"));
    assert_eq!(record["predicted_score"], predicted["predicted_score"]);

    let (status, latest) =
        send(app, "GET", "/api/neighbors/latest?user=student@example.com", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest["target_subject"], json!("history score"));
    assert_eq!(latest["neighbors"], predicted["neighbors"]);
}

#[tokio::test]
async fn test_anonymous_prediction_is_not_logged() {
    let app = test_app(Profile::Fixed);
    let (status, _) = send(app.clone(), "POST", "/api/predict", Some(student(json!({})))).await;
    assert_eq!(status, StatusCode::OK);

    let (_, logged) = send(app.clone(), "GET", "/api/predictions", None).await;
    assert_eq!(logged["count"], json!(0));

    // The neighbor cache still records anonymous requests.
    let (status, latest) = send(app, "GET", "/api/neighbors/latest", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest["target_subject"], json!("average"));
    assert_eq!(latest["neighbors"].as_array().map(Vec::len), Some(5));
}

#[tokio::test]
async fn test_store_outage_does_not_fail_prediction() {
    let app = test_app_with_store(Profile::Fixed, Arc::new(DownStore));
    let body = student(json!({ "user_email": "student@example.com", "math_score": 80 }));

    let (status, response) = send(app.clone(), "POST", "/api/predict", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["success"], json!(true));

    let (status, response) = send(app, "GET", "/api/users", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response["success"], json!(false));
}

#[tokio::test]
async fn test_logged_prediction_stamps_last_login() {
    let dir = temp_dir("last-login");
    let store = Arc::new(JsonFileStore::new(dir.clone()).unwrap());
    let app = test_app_with_store(Profile::Fixed, store);

    let (status, created) = send(
        app.clone(),
        "POST",
        "/api/users",
        Some(json!({ "name": "Ada", "email": "ada@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(created["user"]["last_login"].is_null());

    let body = student(json!({ "user_email": "ADA@example.com", "math_score": 77 }));
    let (status, _) = send(app.clone(), "POST", "/api/predict", Some(body)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, users) = send(app.clone(), "GET", "/api/users", None).await;
    let user = &users["users"][0];
    assert_eq!(user["email"], json!("ada@example.com"));
    assert!(user["last_login"].is_string());

    let (_, logged) = send(app, "GET", "/api/predictions?user=ada@example.com", None).await;
    assert_eq!(logged["count"], json!(1));

    std::fs::remove_dir_all(&dir).ok();
}
