//! Serves the graphs under `tests/fixtures` (see `make_fixtures.py`) end to end.

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use mlserve::model::model_manager::ModelHolder;
use mlserve::model::model_utils::{Capability, RawPrediction, RawScalar};
use mlserve::serve::configure;
use ndarray::array;
use serde_json::{json, Value};
use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn holder(name: &str) -> ModelHolder {
    let holder = ModelHolder::from_path(&fixture(name));
    assert!(holder.is_loaded(), "{name} did not load");
    holder
}

async fn post_predict(holder: ModelHolder, features: Value) -> (StatusCode, Value) {
    let app =
        test::init_service(App::new().app_data(web::Data::new(holder)).configure(configure)).await;
    let req = test::TestRequest::post()
        .uri("/predict")
        .set_json(json!({ "features": features }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let status = resp.status();
    (status, test::read_body_json(resp).await)
}

#[::core::prelude::v1::test]
fn capability_is_chosen_from_outputs() {
    let capability = |name: &str| holder(name).current().map(|m| m.capability());
    assert_eq!(capability("classifier.onnx"), Some(Capability::Probabilistic));
    assert_eq!(capability("decision_scores.onnx"), Some(Capability::Probabilistic));
    assert_eq!(capability("regressor.onnx"), Some(Capability::Point));
}

#[actix_web::test]
async fn classifier_label_and_probabilities_from_runtime() {
    let model = holder("classifier.onnx").current().unwrap();
    let inference = model
        .infer(&array![[1.5, 2.3, 4.1, 0.8]])
        .await
        .unwrap();
    assert_eq!(inference.prediction, RawPrediction::Scalar(RawScalar::I64(2)));
    let probabilities = inference.probabilities.unwrap();
    assert_eq!(probabilities.len(), 3);
    assert!((probabilities.iter().sum::<f64>() - 1.0).abs() < 1e-4);
}

#[actix_web::test]
async fn classifier_serves_integer_label_with_probability() {
    let (status, body) = post_predict(holder("classifier.onnx"), json!([1.5, 2.3, 4.1, 0.8])).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["prediction"].is_i64());
    assert_eq!(body["prediction"], json!(2));
    // softmax of [1.5, 2.3, 4.1]
    let probability = body["probability"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&probability));
    assert!((probability - 0.8067).abs() < 1e-3, "{probability}");
}

#[actix_web::test]
async fn classifier_rejects_wrong_feature_count() {
    let (status, body) = post_predict(holder("classifier.onnx"), json!([1.5, 2.3])).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .contains("expects 4 features, got 2"));
}

#[actix_web::test]
async fn decision_scores_never_become_probability() {
    let (status, body) =
        post_predict(holder("decision_scores.onnx"), json!([1.5, 2.3, 4.1, 0.8])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["prediction"], json!(2));
    assert!(body.get("probability").is_none());
}

#[actix_web::test]
async fn regressor_serves_float_without_probability() {
    let (status, body) = post_predict(holder("regressor.onnx"), json!([1.5, 2.3, 4.1, 0.8])).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("probability").is_none());
    let prediction = body["prediction"].as_f64().unwrap();
    assert!(body["prediction"].is_f64());
    assert!((prediction - 9.2).abs() < 1e-9, "{prediction}");

    let (status, body) = post_predict(holder("regressor.onnx"), json!([1.0, 2.0, 3.0])).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .contains("expects 4 features"));
}
