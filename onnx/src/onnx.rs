//! Safe wrappers for ONNX Runtime Env, Session, and Tensor.

use std::path::Path;
use std::sync::Mutex;

use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session as OrtSession;
use ort::value::{DynValue, Tensor as OrtTensor};
use tracing::debug;

use crate::error::{runtime_err, OnnxError};

// ---------------------------------------------------------------------------
// Env
// ---------------------------------------------------------------------------

/// ONNX Runtime environment. Create one per process.
///
/// The first `Env` commits the global runtime environment under its name;
/// later ones reuse it.
pub struct Env {
    name: String,
}

/// Options applied to every session an [`Env`] creates.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Intra-op thread count; `None` lets the runtime decide.
    pub intra_threads: Option<usize>,
}

impl Env {
    /// Creates the ONNX Runtime environment.
    pub fn new(name: &str) -> Result<Self, OnnxError> {
        let committed = ort::init().with_name(name).commit().map_err(runtime_err)?;
        if !committed {
            debug!(name, "onnx runtime environment already initialized");
        }
        Ok(Self { name: name.to_string() })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Loads an ONNX graph from a file.
    pub fn new_session(&self, path: &Path, opts: &SessionOptions) -> Result<Session, OnnxError> {
        if !path.is_file() {
            return Err(OnnxError::ModelNotFound(path.to_path_buf()));
        }
        let session = self.builder(opts)?.commit_from_file(path).map_err(runtime_err)?;
        debug!(env = %self.name, path = %path.display(), "onnx session loaded");
        Ok(Session::wrap(session))
    }

    /// Loads an ONNX graph from in-memory model data.
    pub fn new_session_from_memory(
        &self,
        model_data: &[u8],
        opts: &SessionOptions,
    ) -> Result<Session, OnnxError> {
        if model_data.is_empty() {
            return Err(OnnxError::EmptyData);
        }
        let session = self.builder(opts)?.commit_from_memory(model_data).map_err(runtime_err)?;
        Ok(Session::wrap(session))
    }

    fn builder(&self, opts: &SessionOptions) -> Result<SessionBuilder, OnnxError> {
        let builder = OrtSession::builder().map_err(runtime_err)?;
        let mut builder = builder
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(runtime_err)?;
        if let Some(n) = opts.intra_threads {
            builder = builder.with_intra_threads(n).map_err(runtime_err)?;
        }
        Ok(builder)
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Holds a loaded ONNX graph.
///
/// Running a graph needs exclusive access to the underlying session, so
/// calls to [`Session::run`] are serialized.
pub struct Session {
    inner: Mutex<OrtSession>,
    input_names: Vec<String>,
    output_names: Vec<String>,
}

impl Session {
    fn wrap(session: OrtSession) -> Self {
        let input_names = session.inputs.iter().map(|i| i.name.clone()).collect();
        let output_names = session.outputs.iter().map(|o| o.name.clone()).collect();
        Self {
            inner: Mutex::new(session),
            input_names,
            output_names,
        }
    }

    /// Input names declared by the graph, in declaration order.
    pub fn input_names(&self) -> &[String] {
        &self.input_names
    }

    /// Output names declared by the graph, in declaration order.
    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }

    /// Runs inference with the given inputs and output names.
    ///
    /// Outputs must be f32 tensors; they are copied out in the order of
    /// `output_names`.
    pub fn run(
        &self,
        input_names: &[&str],
        inputs: &[&Tensor],
        output_names: &[&str],
    ) -> Result<Vec<Tensor>, OnnxError> {
        if input_names.len() != inputs.len() {
            return Err(OnnxError::Runtime(format!(
                "input names/tensors length mismatch: {} vs {}",
                input_names.len(),
                inputs.len()
            )));
        }

        let mut values: Vec<(String, DynValue)> = Vec::with_capacity(inputs.len());
        for (name, tensor) in input_names.iter().zip(inputs) {
            values.push((name.to_string(), tensor.to_value()?));
        }

        let mut session = self
            .inner
            .lock()
            .map_err(|_| OnnxError::Runtime("session lock poisoned".into()))?;
        let outputs = session.run(values).map_err(runtime_err)?;

        let mut result = Vec::with_capacity(output_names.len());
        for name in output_names {
            let value = outputs
                .get(*name)
                .ok_or_else(|| OnnxError::MissingOutput(name.to_string()))?;
            let (shape, data) = value.try_extract_tensor::<f32>().map_err(runtime_err)?;
            let shape: Vec<i64> = shape.to_vec();
            result.push(Tensor::from_vec(shape, data.to_vec())?);
        }
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Tensor
// ---------------------------------------------------------------------------

/// Element storage of a [`Tensor`].
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    Float(Vec<f32>),
    Int64(Vec<i64>),
}

impl TensorData {
    fn len(&self) -> usize {
        match self {
            TensorData::Float(v) => v.len(),
            TensorData::Int64(v) => v.len(),
        }
    }
}

/// N-dimensional host tensor, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<i64>,
    data: TensorData,
}

impl Tensor {
    /// Creates a float32 tensor with the given shape; extra data is ignored.
    pub fn new(shape: &[i64], data: &[f32]) -> Result<Self, OnnxError> {
        let total = element_count(shape)?;
        if data.len() < total {
            return Err(OnnxError::Shape(format!(
                "tensor data too short: got {}, need {total}",
                data.len()
            )));
        }
        Self::from_vec(shape.to_vec(), data[..total].to_vec())
    }

    /// Creates a float32 tensor taking ownership of `data`, which must
    /// match the shape exactly.
    pub fn from_vec(shape: Vec<i64>, data: Vec<f32>) -> Result<Self, OnnxError> {
        Self::checked(shape, TensorData::Float(data))
    }

    /// Creates an int64 tensor taking ownership of `data`.
    pub fn from_vec_i64(shape: Vec<i64>, data: Vec<i64>) -> Result<Self, OnnxError> {
        Self::checked(shape, TensorData::Int64(data))
    }

    fn checked(shape: Vec<i64>, data: TensorData) -> Result<Self, OnnxError> {
        if data.len() == 0 {
            return Err(OnnxError::EmptyData);
        }
        let total = element_count(&shape)?;
        if data.len() != total {
            return Err(OnnxError::Shape(format!(
                "shape {shape:?} needs {total} elements, got {}",
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    /// Returns the tensor dimensions.
    pub fn shape(&self) -> &[i64] {
        &self.shape
    }

    pub fn data(&self) -> &TensorData {
        &self.data
    }

    /// Returns the f32 elements, or an error for integer tensors.
    pub fn float_data(&self) -> Result<&[f32], OnnxError> {
        match &self.data {
            TensorData::Float(v) => Ok(v),
            TensorData::Int64(_) => Err(OnnxError::Shape("expected f32 tensor, got i64".into())),
        }
    }

    /// Returns a copy with elements cast to i64 (floats are rounded).
    pub fn to_i64(&self) -> Tensor {
        let data = match &self.data {
            TensorData::Float(v) => TensorData::Int64(v.iter().map(|&x| x.round() as i64).collect()),
            TensorData::Int64(v) => TensorData::Int64(v.clone()),
        };
        Tensor { shape: self.shape.clone(), data }
    }

    fn to_value(&self) -> Result<DynValue, OnnxError> {
        let value = match &self.data {
            TensorData::Float(v) => OrtTensor::from_array((self.shape.clone(), v.clone()))
                .map_err(runtime_err)?
                .into_dyn(),
            TensorData::Int64(v) => OrtTensor::from_array((self.shape.clone(), v.clone()))
                .map_err(runtime_err)?
                .into_dyn(),
        };
        Ok(value)
    }
}

fn element_count(shape: &[i64]) -> Result<usize, OnnxError> {
    if shape.iter().any(|&d| d < 0) {
        return Err(OnnxError::Shape(format!("negative dimension in {shape:?}")));
    }
    let total: i64 = shape.iter().product();
    if total == 0 {
        return Err(OnnxError::EmptyData);
    }
    Ok(total as usize)
}
