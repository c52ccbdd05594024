//! Predictors backed by ONNX graphs exported from tabular training pipelines.
//!
//! Output 0 carries the prediction. When output 1 is a `[N, C]` float tensor
//! the graph also exports class probabilities and is served as a
//! [`ProbabilisticONNX`].

use crate::error::{InferenceError, InferenceResult, LoadError};
use crate::model::model_manager::ModelHandle;
use crate::model::model_utils::{Capability, Inference, ModelTrait, RawPrediction, RawScalar};
use async_trait::async_trait;
use half::f16;
use log::{debug, info, warn};
use ndarray::{Array2, ArrayViewD};
use ort::execution_providers::{CPUExecutionProvider, ExecutionProviderDispatch};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::tensor::TensorElementType;
use ort::value::{DynValue, ValueType};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::available_parallelism;
use std::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq)]
enum FloatKind {
    F32,
    F64,
}

impl FloatKind {
    fn of(value_type: &ValueType) -> Option<Self> {
        match value_type.tensor_type() {
            Some(TensorElementType::Float32) => Some(FloatKind::F32),
            Some(TensorElementType::Float64) => Some(FloatKind::F64),
            _ => None,
        }
    }
}

#[derive(Serialize, Clone, Debug)]
pub struct TensorSignature {
    pub name: String,
    pub value_type: String,
    pub dimensions: Option<Vec<i64>>,
}

impl TensorSignature {
    fn new(name: &str, value_type: &ValueType) -> Self {
        Self {
            name: name.to_string(),
            value_type: format!("{:?}", value_type),
            dimensions: value_type.tensor_dimensions().cloned(),
        }
    }
}

/// Load-time view of an artifact, printed by `mlserve inspect`.
#[derive(Serialize, Clone, Debug)]
pub struct ModelDescription {
    pub path: PathBuf,
    pub capability: Capability,
    pub expected_features: Option<usize>,
    pub inputs: Vec<TensorSignature>,
    pub outputs: Vec<TensorSignature>,
}

struct OnnxGraph {
    session: Session,
    input_kind: FloatKind,
    n_features: Option<usize>,
    label_type: TensorElementType,
    proba_kind: Option<FloatKind>,
    inputs: Vec<TensorSignature>,
    outputs: Vec<TensorSignature>,
}

#[cfg(not(feature = "cuda"))]
fn execution_providers() -> Vec<ExecutionProviderDispatch> {
    vec![CPUExecutionProvider::default().build()]
}

#[cfg(feature = "cuda")]
fn execution_providers() -> Vec<ExecutionProviderDispatch> {
    vec![
        ort::execution_providers::CUDAExecutionProvider::default().build(),
        CPUExecutionProvider::default().build(),
    ]
}

static RUNTIME_READY: Mutex<bool> = Mutex::new(false);

/// Commits the ORT environment once per process.
fn init_runtime() -> Result<(), LoadError> {
    let mut ready = RUNTIME_READY
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if !*ready {
        ort::init()
            .with_name("mlserve")
            .with_execution_providers(execution_providers())
            .commit()?;
        *ready = true;
    }
    Ok(())
}

impl OnnxGraph {
    fn open(path: &Path) -> Result<Self, LoadError> {
        init_runtime()?;

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(available_parallelism()?.get())?
            .commit_from_file(path)?;

        let input = session
            .inputs
            .first()
            .ok_or_else(|| LoadError::Incompatible("model declares no inputs".to_string()))?;
        let input_kind = FloatKind::of(&input.input_type).ok_or_else(|| {
            LoadError::Incompatible(format!(
                "input '{}' must be a float32 or float64 tensor, found {:?}",
                input.name, input.input_type
            ))
        })?;
        // a fixed column count is checked per request; -1 means dynamic
        let n_features = input
            .input_type
            .tensor_dimensions()
            .and_then(|dims| match dims.as_slice() {
                [_, n] if *n > 0 => Some(*n as usize),
                _ => None,
            });

        let label = session
            .outputs
            .first()
            .ok_or_else(|| LoadError::Incompatible("model declares no outputs".to_string()))?;
        let label_type = label.output_type.tensor_type().ok_or_else(|| {
            LoadError::Incompatible(format!(
                "prediction output '{}' is not a tensor: {:?}",
                label.name, label.output_type
            ))
        })?;

        let proba_kind = match session.outputs.get(1) {
            Some(output) => {
                let kind = FloatKind::of(&output.output_type).filter(|_| {
                    output
                        .output_type
                        .tensor_dimensions()
                        .is_some_and(|dims| is_class_matrix(dims))
                });
                if kind.is_none() {
                    warn!(
                        "output '{}' ({:?}) is not a [N, C>=2] float tensor; serving without \
                         probabilities. Export class probabilities as a plain tensor to report confidence",
                        output.name, output.output_type
                    );
                }
                kind
            }
            None => None,
        };

        let inputs = session
            .inputs
            .iter()
            .map(|i| TensorSignature::new(&i.name, &i.input_type))
            .collect();
        let outputs = session
            .outputs
            .iter()
            .map(|o| TensorSignature::new(&o.name, &o.output_type))
            .collect();

        info!(
            "input: {:?} with {:?} features, prediction dtype: {:?}",
            input_kind, n_features, label_type
        );

        Ok(Self {
            session,
            input_kind,
            n_features,
            label_type,
            proba_kind,
            inputs,
            outputs,
        })
    }

    fn capability(&self) -> Capability {
        match self.proba_kind {
            Some(_) => Capability::Probabilistic,
            None => Capability::Point,
        }
    }

    fn describe(&self, path: &Path) -> ModelDescription {
        ModelDescription {
            path: path.to_path_buf(),
            capability: self.capability(),
            expected_features: self.n_features,
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
        }
    }

    fn run(
        &self,
        features: &Array2<f64>,
        proba_kind: Option<FloatKind>,
    ) -> InferenceResult<Inference> {
        if let Some(expected) = self.n_features {
            if features.ncols() != expected {
                return Err(InferenceError::FeatureCount {
                    expected,
                    actual: features.ncols(),
                });
            }
        }

        let start = Instant::now();
        let outputs = match self.input_kind {
            FloatKind::F32 => self
                .session
                .run(ort::inputs![features.mapv(|v| v as f32)]?)?,
            FloatKind::F64 => self.session.run(ort::inputs![features.to_owned()]?)?,
        };
        debug!("actual inference took: {:?}", start.elapsed());

        let prediction = extract_prediction(&outputs[0], self.label_type)?;
        let probabilities = match proba_kind {
            Some(kind) => Some(extract_probabilities(&outputs[1], kind)?),
            None => None,
        };

        Ok(Inference {
            prediction,
            probabilities,
        })
    }
}

/// Class probabilities come as `[N, C]` with at least two classes; `-1` is a
/// dynamic class count, checked per request instead.
fn is_class_matrix(dims: &[i64]) -> bool {
    matches!(dims, [_, c] if *c == -1 || *c >= 2)
}

/// Takes the first sample of an output tensor. `[N]` and `[N, 1]` outputs
/// yield a scalar, `[N, K]` a row.
fn first_row<T: Clone>(
    view: ArrayViewD<'_, T>,
    wrap: impl Fn(T) -> RawScalar,
) -> InferenceResult<RawPrediction> {
    let first = match view.ndim() {
        0 | 1 => view
            .iter()
            .next()
            .cloned()
            .map(|v| RawPrediction::Scalar(wrap(v))),
        2 => view.outer_iter().next().map(|row| {
            let mut values: Vec<RawScalar> = row.iter().cloned().map(&wrap).collect();
            if values.len() == 1 {
                RawPrediction::Scalar(values.remove(0))
            } else {
                RawPrediction::Row(values)
            }
        }),
        n => return Ok(RawPrediction::Other(format!("{n}-dimensional tensor"))),
    };
    first.ok_or_else(|| InferenceError::InvalidOutput("model returned no rows".to_string()))
}

fn extract_prediction(
    value: &DynValue,
    label_type: TensorElementType,
) -> InferenceResult<RawPrediction> {
    match label_type {
        TensorElementType::Int8 => first_row(value.try_extract_tensor::<i8>()?, RawScalar::I8),
        TensorElementType::Int16 => first_row(value.try_extract_tensor::<i16>()?, RawScalar::I16),
        TensorElementType::Int32 => first_row(value.try_extract_tensor::<i32>()?, RawScalar::I32),
        TensorElementType::Int64 => first_row(value.try_extract_tensor::<i64>()?, RawScalar::I64),
        TensorElementType::Uint8 => first_row(value.try_extract_tensor::<u8>()?, RawScalar::U8),
        TensorElementType::Uint16 => first_row(value.try_extract_tensor::<u16>()?, RawScalar::U16),
        TensorElementType::Uint32 => first_row(value.try_extract_tensor::<u32>()?, RawScalar::U32),
        TensorElementType::Uint64 => first_row(value.try_extract_tensor::<u64>()?, RawScalar::U64),
        TensorElementType::Float16 => first_row(value.try_extract_tensor::<f16>()?, RawScalar::F16),
        TensorElementType::Float32 => first_row(value.try_extract_tensor::<f32>()?, RawScalar::F32),
        TensorElementType::Float64 => first_row(value.try_extract_tensor::<f64>()?, RawScalar::F64),
        TensorElementType::Bool => first_row(value.try_extract_tensor::<bool>()?, RawScalar::Bool),
        TensorElementType::String => {
            let labels = value.try_extract_string_tensor()?;
            first_row(labels.view(), RawScalar::Text)
        }
        other => Ok(RawPrediction::Other(format!("{:?} tensor", other))),
    }
}

fn probability_row(view: ArrayViewD<'_, f64>) -> Vec<f64> {
    match view.ndim() {
        2 => view
            .outer_iter()
            .next()
            .map(|r| r.iter().copied().collect())
            .unwrap_or_default(),
        _ => view.iter().copied().collect(),
    }
}

fn extract_probabilities(value: &DynValue, kind: FloatKind) -> InferenceResult<Vec<f64>> {
    Ok(match kind {
        FloatKind::F32 => {
            probability_row(value.try_extract_tensor::<f32>()?.mapv(f64::from).view())
        }
        FloatKind::F64 => probability_row(value.try_extract_tensor::<f64>()?),
    })
}

/// Serves only the prediction output.
pub struct PointONNX {
    graph: OnnxGraph,
}

/// Serves the prediction and the class-probability output.
pub struct ProbabilisticONNX {
    graph: OnnxGraph,
    proba_kind: FloatKind,
}

#[async_trait]
impl ModelTrait for PointONNX {
    async fn infer(&self, features: &Array2<f64>) -> InferenceResult<Inference> {
        self.graph.run(features, None)
    }

    fn capability(&self) -> Capability {
        Capability::Point
    }
}

#[async_trait]
impl ModelTrait for ProbabilisticONNX {
    async fn infer(&self, features: &Array2<f64>) -> InferenceResult<Inference> {
        self.graph.run(features, Some(self.proba_kind))
    }

    fn capability(&self) -> Capability {
        Capability::Probabilistic
    }
}

/// Opens the graph and picks the predictor flavour once, from its outputs.
pub fn load(path: &Path) -> Result<ModelHandle, LoadError> {
    let graph = OnnxGraph::open(path)?;
    Ok(match graph.proba_kind {
        Some(proba_kind) => Arc::new(ProbabilisticONNX { graph, proba_kind }),
        None => Arc::new(PointONNX { graph }),
    })
}

pub fn inspect(path: &Path) -> Result<ModelDescription, LoadError> {
    if !path.is_file() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }
    Ok(OnnxGraph::open(path)?.describe(path))
}
