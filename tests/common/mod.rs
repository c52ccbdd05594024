#![allow(dead_code)]

use async_trait::async_trait;
use mlserve::error::{InferenceError, InferenceResult};
use mlserve::model::model_utils::{Capability, Inference, ModelTrait, RawPrediction, RawScalar};
use ndarray::Array2;

/// Classifier over 4 features that votes class 1 and reports class probabilities.
pub struct FakeClassifier;

#[async_trait]
impl ModelTrait for FakeClassifier {
    async fn infer(&self, features: &Array2<f64>) -> InferenceResult<Inference> {
        if features.ncols() != 4 {
            return Err(InferenceError::FeatureCount {
                expected: 4,
                actual: features.ncols(),
            });
        }
        Ok(Inference {
            prediction: RawPrediction::Scalar(RawScalar::I64(1)),
            probabilities: Some(vec![0.15, 0.8, 0.05]),
        })
    }

    fn capability(&self) -> Capability {
        Capability::Probabilistic
    }
}

/// Regressor returning the feature sum as a float32.
pub struct FakeRegressor;

#[async_trait]
impl ModelTrait for FakeRegressor {
    async fn infer(&self, features: &Array2<f64>) -> InferenceResult<Inference> {
        Ok(Inference {
            prediction: RawPrediction::Scalar(RawScalar::F32(features.sum() as f32)),
            probabilities: None,
        })
    }

    fn capability(&self) -> Capability {
        Capability::Point
    }
}

/// Multi-output model echoing its input row.
pub struct EchoModel;

#[async_trait]
impl ModelTrait for EchoModel {
    async fn infer(&self, features: &Array2<f64>) -> InferenceResult<Inference> {
        Ok(Inference {
            prediction: RawPrediction::Row(features.iter().map(|v| RawScalar::F64(*v)).collect()),
            probabilities: None,
        })
    }

    fn capability(&self) -> Capability {
        Capability::Point
    }
}

/// Point predictor with an integer label of a narrow storage width.
pub struct NarrowLabelModel;

#[async_trait]
impl ModelTrait for NarrowLabelModel {
    async fn infer(&self, _features: &Array2<f64>) -> InferenceResult<Inference> {
        Ok(Inference {
            prediction: RawPrediction::Scalar(RawScalar::I32(3)),
            probabilities: None,
        })
    }

    fn capability(&self) -> Capability {
        Capability::Point
    }
}

/// Model whose output cannot be represented over JSON.
pub struct MapOutputModel;

#[async_trait]
impl ModelTrait for MapOutputModel {
    async fn infer(&self, _features: &Array2<f64>) -> InferenceResult<Inference> {
        Ok(Inference {
            prediction: RawPrediction::Other("map(int64,float)".to_string()),
            probabilities: None,
        })
    }

    fn capability(&self) -> Capability {
        Capability::Point
    }
}

/// Margin classifier whose second output holds raw decision scores.
pub struct DecisionScoreModel;

#[async_trait]
impl ModelTrait for DecisionScoreModel {
    async fn infer(&self, _features: &Array2<f64>) -> InferenceResult<Inference> {
        Ok(Inference {
            prediction: RawPrediction::Scalar(RawScalar::I64(1)),
            probabilities: Some(vec![-1.3, 2.7, 0.4]),
        })
    }

    fn capability(&self) -> Capability {
        Capability::Probabilistic
    }
}
