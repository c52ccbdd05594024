use super::model_utils::{RawPrediction, RawScalar};
use crate::error::{InferenceError, InferenceResult};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Number {
    Integer(i64),
    Unsigned(u64),
    Float(f64),
}

/// Transport-safe prediction value.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PredictionValue {
    Number(Number),
    Bool(bool),
    Text(String),
    Sequence(Vec<Number>),
}

fn finite(value: f64) -> InferenceResult<Number> {
    if value.is_finite() {
        Ok(Number::Float(value))
    } else {
        Err(InferenceError::InvalidOutput(format!(
            "non-finite prediction value {value}"
        )))
    }
}

fn number(scalar: &RawScalar) -> Option<InferenceResult<Number>> {
    let n = match *scalar {
        RawScalar::I8(v) => Number::Integer(v.into()),
        RawScalar::I16(v) => Number::Integer(v.into()),
        RawScalar::I32(v) => Number::Integer(v.into()),
        RawScalar::I64(v) => Number::Integer(v),
        RawScalar::U8(v) => Number::Integer(v.into()),
        RawScalar::U16(v) => Number::Integer(v.into()),
        RawScalar::U32(v) => Number::Integer(v.into()),
        RawScalar::U64(v) => match i64::try_from(v) {
            Ok(v) => Number::Integer(v),
            Err(_) => Number::Unsigned(v),
        },
        RawScalar::F16(v) => return Some(finite(v.to_f64())),
        RawScalar::F32(v) => return Some(finite(v.into())),
        RawScalar::F64(v) => return Some(finite(v)),
        RawScalar::Bool(_) | RawScalar::Text(_) => return None,
    };
    Some(Ok(n))
}

/// Converts a raw model output into its transport shape.
///
/// Integer elements of any width become integers and float elements become
/// floats. Booleans and strings pass through. Rows must be numeric.
pub fn normalize(raw: RawPrediction) -> InferenceResult<PredictionValue> {
    match raw {
        RawPrediction::Scalar(RawScalar::Bool(b)) => Ok(PredictionValue::Bool(b)),
        RawPrediction::Scalar(RawScalar::Text(s)) => Ok(PredictionValue::Text(s)),
        RawPrediction::Scalar(scalar) => match number(&scalar) {
            Some(n) => Ok(PredictionValue::Number(n?)),
            None => Err(InferenceError::Unsupported(format!("{scalar:?}"))),
        },
        RawPrediction::Row(row) => {
            if row.is_empty() {
                return Err(InferenceError::InvalidOutput(
                    "model returned an empty prediction row".to_string(),
                ));
            }
            let numbers = row
                .iter()
                .map(|scalar| {
                    number(scalar).unwrap_or_else(|| {
                        Err(InferenceError::Unsupported(format!(
                            "non-numeric element {scalar:?} in prediction row"
                        )))
                    })
                })
                .collect::<InferenceResult<Vec<Number>>>()?;
            Ok(PredictionValue::Sequence(numbers))
        }
        RawPrediction::Other(kind) => Err(InferenceError::Unsupported(kind)),
    }
}

// slack for float32 rounding in exported softmax outputs
const ELEMENT_TOLERANCE: f64 = 1e-5;
const SUM_TOLERANCE: f64 = 1e-3;

/// Highest class probability of a row.
///
/// Returns `None` unless the row is a probability distribution: non-empty,
/// every value in `[0, 1]` and summing to 1. Raw decision scores therefore
/// never surface as a confidence.
pub fn confidence(probabilities: &[f64]) -> Option<f64> {
    let in_range = probabilities
        .iter()
        .all(|p| (-ELEMENT_TOLERANCE..=1.0 + ELEMENT_TOLERANCE).contains(p));
    let sum: f64 = probabilities.iter().sum();
    if probabilities.is_empty() || !in_range || (sum - 1.0).abs() > SUM_TOLERANCE {
        return None;
    }
    probabilities
        .iter()
        .copied()
        .reduce(f64::max)
        .map(|p| p.min(1.0).max(0.0))
}
