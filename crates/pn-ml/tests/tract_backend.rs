//! Tract Backend Integration Tests
//!
//! Loads a small ONNX graph from disk and runs it through:
//! - TractLoader / TractModel forward pass
//! - Output widening from (frames, bins) to (frames, bins, 1)
//! - InferenceRunner caching

use std::path::{Path, PathBuf};

use ndarray::Array3;
use pn_ml::{Device, InferenceRunner, ModelLoader, ModelMode, PitchModel, TractLoader};

const FRAMES: usize = 2;
const WINDOW: usize = 8;
const BINS: usize = 4;

// ═══════════════════════════════════════════════════════════════════════════════
// ONNX FIXTURE
// ═══════════════════════════════════════════════════════════════════════════════

// Minimal protobuf writer for the handful of ONNX messages the fixture needs

fn varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

fn int_field(out: &mut Vec<u8>, field: u64, value: u64) {
    varint(out, field << 3);
    varint(out, value);
}

fn bytes_field(out: &mut Vec<u8>, field: u64, data: &[u8]) {
    varint(out, (field << 3) | 2);
    varint(out, data.len() as u64);
    out.extend_from_slice(data);
}

fn message_field(out: &mut Vec<u8>, field: u64, build: impl FnOnce(&mut Vec<u8>)) {
    let mut message = Vec::new();
    build(&mut message);
    bytes_field(out, field, &message);
}

/// ValueInfoProto for a float tensor of fixed shape
fn value_info(out: &mut Vec<u8>, field: u64, name: &str, dims: &[u64]) {
    message_field(out, field, |info| {
        bytes_field(info, 1, name.as_bytes());
        message_field(info, 2, |ty| {
            message_field(ty, 1, |tensor| {
                int_field(tensor, 1, 1); // FLOAT
                message_field(tensor, 2, |shape| {
                    for &dim in dims {
                        message_field(shape, 1, |d| int_field(d, 1, dim));
                    }
                });
            });
        });
    });
}

/// `frames (FRAMES, 1, WINDOW) -> Flatten -> MatMul(W) -> logits (FRAMES, BINS)`
///
/// `W` picks the first `BINS` samples of each frame.
fn projection_model() -> Vec<u8> {
    let mut weights = vec![0.0f32; WINDOW * BINS];
    for bin in 0..BINS {
        weights[bin * BINS + bin] = 1.0;
    }
    let raw: Vec<u8> = weights.iter().flat_map(|w| w.to_le_bytes()).collect();

    let mut model = Vec::new();
    int_field(&mut model, 1, 7); // ir_version
    bytes_field(&mut model, 2, b"pn-ml-tests");
    message_field(&mut model, 7, |graph| {
        message_field(graph, 1, |node| {
            bytes_field(node, 1, b"frames");
            bytes_field(node, 2, b"flat");
            bytes_field(node, 3, b"flatten");
            bytes_field(node, 4, b"Flatten");
            message_field(node, 5, |attr| {
                bytes_field(attr, 1, b"axis");
                int_field(attr, 3, 1);
                int_field(attr, 20, 2); // INT
            });
        });
        message_field(graph, 1, |node| {
            bytes_field(node, 1, b"flat");
            bytes_field(node, 1, b"weights");
            bytes_field(node, 2, b"logits");
            bytes_field(node, 3, b"project");
            bytes_field(node, 4, b"MatMul");
        });
        bytes_field(graph, 2, b"projection");
        message_field(graph, 5, |tensor| {
            int_field(tensor, 1, WINDOW as u64);
            int_field(tensor, 1, BINS as u64);
            int_field(tensor, 2, 1); // FLOAT
            bytes_field(tensor, 8, b"weights");
            bytes_field(tensor, 9, &raw);
        });
        value_info(graph, 11, "frames", &[FRAMES as u64, 1, WINDOW as u64]);
        value_info(graph, 12, "logits", &[FRAMES as u64, BINS as u64]);
    });
    message_field(&mut model, 8, |opset| {
        bytes_field(opset, 1, b"");
        int_field(opset, 2, 13);
    });
    model
}

fn write_model(dir: &Path) -> PathBuf {
    let path = dir.join("projection.onnx");
    std::fs::write(&path, projection_model()).unwrap();
    path
}

/// Frame `f` holds `f * 100 + sample`
fn frames() -> Array3<f32> {
    Array3::from_shape_fn((FRAMES, 1, WINDOW), |(frame, _, sample)| (frame * 100 + sample) as f32)
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRACT MODEL TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_tract_forward_widens_logits() {
    let dir = tempfile::tempdir().unwrap();
    let checkpoint = write_model(dir.path());

    let mut model = TractLoader.load(&checkpoint, Device::Cpu).unwrap();
    assert_eq!(model.device(), Device::Cpu);

    let logits = model.forward(&frames()).unwrap();
    assert_eq!(logits.shape(), &[FRAMES, BINS, 1]);
    for frame in 0..FRAMES {
        for bin in 0..BINS {
            assert_eq!(logits[[frame, bin, 0]], (frame * 100 + bin) as f32);
        }
    }
}

#[test]
fn test_tract_rejects_garbage_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let checkpoint = dir.path().join("broken.onnx");
    std::fs::write(&checkpoint, b"not a model").unwrap();

    assert!(TractLoader.load(&checkpoint, Device::Cpu).is_err());
}

// ═══════════════════════════════════════════════════════════════════════════════
// RUNNER TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_runner_infers_with_tract() {
    let dir = tempfile::tempdir().unwrap();
    let checkpoint = write_model(dir.path());
    let mut runner = InferenceRunner::new(TractLoader);

    let first = runner.infer(&frames(), &checkpoint, Device::Cpu).unwrap();
    let second = runner.infer(&frames(), &checkpoint, Device::Cpu).unwrap();

    assert_eq!(first.shape(), &[FRAMES, BINS, 1]);
    assert_eq!(first, second);
    assert_eq!(first[[1, 3, 0]], 103.0);
    assert_eq!(runner.loads(), 1);
    assert!(runner.is_loaded(&checkpoint, Device::Cpu));

    // The scope hands the model back in the mode it was loaded in
    let model = runner.ensure_loaded(&checkpoint, Device::Cpu).unwrap();
    assert_eq!(model.mode(), ModelMode::Train);
    assert_eq!(runner.loads(), 1);
}
