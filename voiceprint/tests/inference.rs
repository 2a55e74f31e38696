//! Runs a real ONNX graph through the session wrapper and the WavLM model.
//!
//! The graph is serialized by hand so the test needs no model download:
//!
//! ```text
//! input_values   f32 [1, N] ─┬─ ReduceMax(axis 1) ─┐
//!                            └─ ReduceMin(axis 1) ─┼─ Concat(axis 1) ─ embeddings f32 [1, 3]
//! attention_mask i64 [1, N] ── Cast(f32) ─ ReduceSum ┘
//! ```

use std::path::Path;

use spksim_onnx::{Env, OnnxError, SessionOptions, Tensor, TensorData};
use spksim_voiceprint::{Family, ModelSelection, Registry, SpeakerModel};

mod graph {
    //! Minimal protobuf writer for ONNX ModelProto.

    const VARINT: u64 = 0;
    const LEN: u64 = 2;

    const FLOAT: i64 = 1;
    const INT64: i64 = 7;

    const ATTR_INT: i64 = 2;
    const ATTR_INTS: i64 = 7;

    fn varint(buf: &mut Vec<u8>, mut v: u64) {
        loop {
            let byte = (v & 0x7f) as u8;
            v >>= 7;
            if v == 0 {
                buf.push(byte);
                return;
            }
            buf.push(byte | 0x80);
        }
    }

    fn int(buf: &mut Vec<u8>, field: u64, v: i64) {
        varint(buf, field << 3 | VARINT);
        varint(buf, v as u64);
    }

    fn bytes(buf: &mut Vec<u8>, field: u64, data: &[u8]) {
        varint(buf, field << 3 | LEN);
        varint(buf, data.len() as u64);
        buf.extend_from_slice(data);
    }

    pub enum Attr {
        Int(&'static str, i64),
        Ints(&'static str, &'static [i64]),
    }

    fn attribute(attr: &Attr) -> Vec<u8> {
        let mut buf = Vec::new();
        match attr {
            Attr::Int(name, v) => {
                bytes(&mut buf, 1, name.as_bytes());
                int(&mut buf, 3, *v);
                int(&mut buf, 20, ATTR_INT);
            }
            Attr::Ints(name, vs) => {
                bytes(&mut buf, 1, name.as_bytes());
                for v in *vs {
                    int(&mut buf, 8, *v);
                }
                int(&mut buf, 20, ATTR_INTS);
            }
        }
        buf
    }

    fn node(op: &str, inputs: &[&str], outputs: &[&str], attrs: &[Attr]) -> Vec<u8> {
        let mut buf = Vec::new();
        for i in inputs {
            bytes(&mut buf, 1, i.as_bytes());
        }
        for o in outputs {
            bytes(&mut buf, 2, o.as_bytes());
        }
        bytes(&mut buf, 3, format!("{op}_{}", outputs[0]).as_bytes());
        bytes(&mut buf, 4, op.as_bytes());
        for a in attrs {
            bytes(&mut buf, 5, &attribute(a));
        }
        buf
    }

    pub enum Dim {
        Fixed(i64),
        Named(&'static str),
    }

    fn value_info(name: &str, elem_type: i64, dims: &[Dim]) -> Vec<u8> {
        let mut shape = Vec::new();
        for d in dims {
            let mut dim = Vec::new();
            match d {
                Dim::Fixed(v) => int(&mut dim, 1, *v),
                Dim::Named(p) => bytes(&mut dim, 2, p.as_bytes()),
            }
            bytes(&mut shape, 1, &dim);
        }
        let mut tensor = Vec::new();
        int(&mut tensor, 1, elem_type);
        bytes(&mut tensor, 2, &shape);
        let mut ty = Vec::new();
        bytes(&mut ty, 1, &tensor);

        let mut buf = Vec::new();
        bytes(&mut buf, 1, name.as_bytes());
        bytes(&mut buf, 2, &ty);
        buf
    }

    /// Peak, trough and unmasked length of a `[1, N]` waveform as a
    /// `[1, 3]` embedding.
    pub fn waveform_stats_model() -> Vec<u8> {
        let nodes = [
            node("ReduceMax", &["input_values"], &["peak"], &[Attr::Ints("axes", &[1]), Attr::Int("keepdims", 1)]),
            node("ReduceMin", &["input_values"], &["trough"], &[Attr::Ints("axes", &[1]), Attr::Int("keepdims", 1)]),
            node("Cast", &["attention_mask"], &["mask_f"], &[Attr::Int("to", FLOAT)]),
            node("ReduceSum", &["mask_f"], &["frames"], &[Attr::Int("keepdims", 1)]),
            node("Concat", &["peak", "trough", "frames"], &["embeddings"], &[Attr::Int("axis", 1)]),
        ];

        let mut graph = Vec::new();
        for n in &nodes {
            bytes(&mut graph, 1, n);
        }
        bytes(&mut graph, 2, b"waveform_stats");
        let samples = [Dim::Fixed(1), Dim::Named("N")];
        bytes(&mut graph, 11, &value_info("input_values", FLOAT, &samples));
        bytes(&mut graph, 11, &value_info("attention_mask", INT64, &samples));
        bytes(&mut graph, 12, &value_info("embeddings", FLOAT, &[Dim::Fixed(1), Dim::Fixed(3)]));

        let mut opset = Vec::new();
        int(&mut opset, 2, 13);

        let mut model = Vec::new();
        int(&mut model, 1, 8);
        bytes(&mut model, 2, b"spksim-tests");
        bytes(&mut model, 7, &graph);
        bytes(&mut model, 8, &opset);
        model
    }
}

fn write_wav(path: &Path, rate: u32, samples: &[i16]) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut w = hound::WavWriter::create(path, spec).unwrap();
    for &s in samples {
        w.write_sample(s).unwrap();
    }
    w.finalize().unwrap();
}

#[test]
fn session_runs_graph_with_int64_mask() {
    let env = Env::new("spksim-tests").unwrap();
    let session = env
        .new_session_from_memory(&graph::waveform_stats_model(), &SessionOptions::default())
        .unwrap();
    assert_eq!(session.input_names(), ["input_values", "attention_mask"]);
    assert_eq!(session.output_names(), ["embeddings"]);

    let values = Tensor::from_vec(vec![1, 4], vec![0.5, -1.0, 2.0, 0.0]).unwrap();
    let mask = Tensor::from_vec_i64(vec![1, 4], vec![1, 1, 1, 0]).unwrap();
    let outputs = session
        .run(&["input_values", "attention_mask"], &[&values, &mask], &["embeddings"])
        .unwrap();

    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].shape(), &[1, 3]);
    assert_eq!(outputs[0].data(), &TensorData::Float(vec![2.0, -1.0, 3.0]));
}

#[test]
fn session_rejects_bad_inputs() {
    let env = Env::new("spksim-tests").unwrap();
    let session = env
        .new_session_from_memory(&graph::waveform_stats_model(), &SessionOptions::default())
        .unwrap();
    let values = Tensor::from_vec(vec![1, 2], vec![0.1, 0.2]).unwrap();

    // The mask must be int64.
    let float_mask = Tensor::from_vec(vec![1, 2], vec![1.0, 1.0]).unwrap();
    let err = session
        .run(&["input_values", "attention_mask"], &[&values, &float_mask], &["embeddings"])
        .unwrap_err();
    assert!(matches!(err, OnnxError::Runtime(_)), "{err}");

    let mask = float_mask.to_i64();
    let err = session
        .run(&["input_values", "attention_mask"], &[&values, &mask], &["scores"])
        .unwrap_err();
    assert!(matches!(err, OnnxError::MissingOutput(ref name) if name == "scores"), "{err}");

    assert!(session.run(&["input_values"], &[&values, &mask], &["embeddings"]).is_err());
}

#[test]
fn wavlm_model_embeds_audio_files() {
    let dir = tempfile::tempdir().unwrap();
    let weights = dir.path().join("waveform_stats.onnx");
    std::fs::write(&weights, graph::waveform_stats_model()).unwrap();

    let fe = dir.path().join("feature_extractor");
    std::fs::create_dir(&fe).unwrap();
    std::fs::write(
        fe.join("preprocessor_config.json"),
        r#"{"sampling_rate": 16000, "do_normalize": false, "return_attention_mask": true, "feature_size": 1}"#,
    )
    .unwrap();

    let long = dir.path().join("long.wav");
    let samples: Vec<i16> = (0..1600).map(|i| if i % 2 == 0 { 16384 } else { -8192 }).collect();
    write_wav(&long, 16000, &samples);

    let short = dir.path().join("short.wav");
    let samples: Vec<i16> = (0..800).map(|i| if i % 4 == 0 { 8192 } else { -16384 }).collect();
    write_wav(&short, 16000, &samples);

    let registry = Registry::new(dir.path().join("cache")).unwrap();
    let model = registry
        .load(&ModelSelection::Local {
            family: Family::WavLm,
            weights,
            feature_extractor: Some(fe),
        })
        .unwrap();
    assert_eq!(model.name(), "waveform_stats");
    assert_eq!(model.family(), Family::WavLm);

    let features = model.extract_features(&long).unwrap();
    assert_eq!(features.len(), 2);
    assert_eq!(features.get("attention_mask").unwrap().shape(), &[1, 1600]);

    let a = model.infer(&features).unwrap();
    assert_eq!(a.len(), 3);
    assert!((a[0] - 0.5).abs() < 1e-6);
    assert!((a[1] + 0.25).abs() < 1e-6);
    assert!((a[2] - 1600.0).abs() < 1e-3);

    let b = model.embed(&short).unwrap();
    assert!((b[0] - 0.25).abs() < 1e-6);
    assert!((b[1] + 0.5).abs() < 1e-6);
    assert!((b[2] - 800.0).abs() < 1e-3);

    let s = model.compute_similarity(&a, &b).unwrap();
    let dot: f64 = a.iter().zip(&b).map(|(&x, &y)| x as f64 * y as f64).sum();
    let norm = |v: &[f32]| v.iter().map(|&x| (x as f64).powi(2)).sum::<f64>().sqrt();
    assert!((s - dot / (norm(&a) * norm(&b))).abs() < 1e-6);
}
