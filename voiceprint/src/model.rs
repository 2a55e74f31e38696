use std::collections::BTreeMap;
use std::path::Path;

use spksim_onnx::{Session, Tensor};
use tracing::debug;

use crate::error::VoiceprintError;
use crate::frontend::FrontEnd;
use crate::registry::Family;
use crate::similarity::cosine_similarity;

/// Named graph inputs for one audio file.
///
/// Built per file by [`SpeakerModel::extract_features`] and consumed once by
/// [`SpeakerModel::infer`].
#[derive(Debug, Clone, Default)]
pub struct FeatureSet {
    tensors: BTreeMap<String, Tensor>,
}

impl FeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a tensor to an input slot, replacing any previous one.
    pub fn insert(&mut self, name: impl Into<String>, tensor: Tensor) {
        self.tensors.insert(name.into(), tensor);
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.tensors.get(name)
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Iterates `(slot name, tensor)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tensor)> {
        self.tensors.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Turns audio files into speaker embeddings and compares them.
///
/// Implementations are immutable once loaded and shared read-only across a
/// batch run.
pub trait SpeakerModel: Send + Sync {
    /// Decodes `path` and builds the model's input tensors.
    fn extract_features(&self, path: &Path) -> Result<FeatureSet, VoiceprintError>;

    /// Runs the model on prepared features and returns the embedding.
    fn infer(&self, features: &FeatureSet) -> Result<Vec<f32>, VoiceprintError>;

    /// Cosine similarity of two embeddings.
    fn compute_similarity(&self, a: &[f32], b: &[f32]) -> Result<f64, VoiceprintError> {
        cosine_similarity(a, b)
    }

    /// Extracts features from `path` and infers its embedding.
    fn embed(&self, path: &Path) -> Result<Vec<f32>, VoiceprintError> {
        let features = self.extract_features(path)?;
        self.infer(&features)
    }
}

/// A speaker embedding network loaded from ONNX, paired with the front end
/// its family needs.
pub struct EmbeddingModel {
    name: String,
    front_end: FrontEnd,
    session: Session,
}

impl EmbeddingModel {
    /// Binds a loaded session to a front end.
    ///
    /// The graph must declare at least one input and one output.
    pub fn new(name: impl Into<String>, front_end: FrontEnd, session: Session) -> Result<Self, VoiceprintError> {
        let name = name.into();
        if session.input_names().is_empty() || session.output_names().is_empty() {
            return Err(VoiceprintError::Configuration(format!(
                "model {name:?} graph must declare inputs and outputs (inputs: {:?}, outputs: {:?})",
                session.input_names(),
                session.output_names()
            )));
        }
        debug!(
            model = %name,
            family = %front_end.family(),
            inputs = ?session.input_names(),
            outputs = ?session.output_names(),
            "embedding model ready"
        );
        Ok(Self {
            name,
            front_end,
            session,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn family(&self) -> Family {
        self.front_end.family()
    }

    /// Input slots declared by the graph.
    pub fn input_names(&self) -> &[String] {
        self.session.input_names()
    }
}

impl SpeakerModel for EmbeddingModel {
    fn extract_features(&self, path: &Path) -> Result<FeatureSet, VoiceprintError> {
        self.front_end.extract(path, self.session.input_names())
    }

    fn infer(&self, features: &FeatureSet) -> Result<Vec<f32>, VoiceprintError> {
        if features.is_empty() {
            return Err(VoiceprintError::Configuration(format!(
                "no features match the inputs of model {:?} ({:?})",
                self.name,
                self.session.input_names()
            )));
        }

        let (names, tensors): (Vec<&str>, Vec<&Tensor>) = features.iter().unzip();
        let output = self.session.output_names()[0].as_str();
        let outputs = self.session.run(&names, &tensors, &[output])?;

        // [1, D] or [D]; either way the embedding is every element.
        let embedding = outputs
            .into_iter()
            .next()
            .ok_or_else(|| VoiceprintError::Embedding(format!("model produced no {output:?} output")))?;
        let data = embedding.float_data()?.to_vec();
        if data.is_empty() {
            return Err(VoiceprintError::Embedding("empty embedding".into()));
        }
        debug!(model = %self.name, shape = ?embedding.shape(), "embedding");
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ConstModel(Vec<f32>);

    impl SpeakerModel for ConstModel {
        fn extract_features(&self, _path: &Path) -> Result<FeatureSet, VoiceprintError> {
            let mut set = FeatureSet::new();
            set.insert("x", Tensor::from_vec(vec![1], vec![0.0]).unwrap());
            Ok(set)
        }

        fn infer(&self, _features: &FeatureSet) -> Result<Vec<f32>, VoiceprintError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn feature_set_basics() {
        let mut set = FeatureSet::new();
        assert!(set.is_empty());
        set.insert("b", Tensor::from_vec(vec![2], vec![1.0, 2.0]).unwrap());
        set.insert("a", Tensor::from_vec(vec![1], vec![3.0]).unwrap());
        set.insert("a", Tensor::from_vec(vec![1], vec![4.0]).unwrap());
        assert_eq!(set.len(), 2);
        let names: Vec<&str> = set.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(set.get("a").unwrap().float_data().unwrap(), &[4.0]);
    }

    #[test]
    fn default_embed_and_similarity() {
        let model = ConstModel(vec![1.0, 2.0, 2.0]);
        let a = model.embed(Path::new("a.wav")).unwrap();
        let b = model.embed(Path::new("b.wav")).unwrap();
        let s = model.compute_similarity(&a, &b).unwrap();
        assert!((s - 1.0).abs() < 1e-6);
    }

    #[test]
    fn default_similarity_rejects_zero_embedding() {
        let model = ConstModel(vec![0.0; 3]);
        let a = model.embed(Path::new("a.wav")).unwrap();
        assert!(model.compute_similarity(&a, &[1.0, 0.0, 0.0]).is_err());
    }
}
