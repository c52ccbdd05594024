use crate::error::InferenceResult;
use async_trait::async_trait;
use half::f16;
use ndarray::Array2;
use serde::Serialize;

/// What a loaded predictor can report besides its prediction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Point,
    Probabilistic,
}

/// One element of a model's first output row, before normalization.
#[derive(Clone, Debug, PartialEq)]
pub enum RawScalar {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F16(f16),
    F32(f32),
    F64(f64),
    Bool(bool),
    Text(String),
}

/// The first output row of a model, as the model produced it.
#[derive(Clone, Debug, PartialEq)]
pub enum RawPrediction {
    Scalar(RawScalar),
    Row(Vec<RawScalar>),
    /// Output kinds the service does not know how to represent.
    Other(String),
}

/// Result of one inference call on a single-row input.
#[derive(Clone, Debug, PartialEq)]
pub struct Inference {
    pub prediction: RawPrediction,
    /// First row of the probability estimate; `None` for point predictors.
    pub probabilities: Option<Vec<f64>>,
}

#[async_trait]
pub trait ModelTrait: Send + Sync {
    /// Runs the model on a `[1, N]` feature matrix.
    async fn infer(&self, features: &Array2<f64>) -> InferenceResult<Inference>;

    fn capability(&self) -> Capability;
}
