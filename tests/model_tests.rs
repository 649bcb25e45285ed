use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use seqformer::{ModelConfig, ModelError, SamplingOptions, SequenceModel};

fn var_builder(device: &Device) -> (VarMap, VarBuilder) {
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
    (varmap, vb)
}

fn small_config() -> ModelConfig {
    ModelConfig {
        vocab_size: 30,
        n_embd: 48,
        n_head: 6,
        n_block: 2,
        block_size: 16,
        dropout_rate: 0.0,
        norm_eps: 1e-5,
    }
}

fn token_tensor(batch: usize, seq: usize, vocab: usize, device: &Device) -> Tensor {
    let data: Vec<u32> = (0..batch * seq).map(|i| (i % vocab) as u32).collect();
    Tensor::from_vec(data, (batch, seq), device).unwrap()
}

#[test]
fn forward_produces_vocab_sized_logits() {
    let device = Device::Cpu;
    let (_varmap, vb) = var_builder(&device);
    let model = SequenceModel::new(small_config(), vb).unwrap();

    let tokens = token_tensor(2, 8, 30, &device);
    let logits = model.forward(&tokens, false).unwrap();

    assert_eq!(logits.dims3().unwrap(), (2, 8, 30));
    let values = logits.flatten_all().unwrap().to_vec1::<f32>().unwrap();
    assert!(values.iter().all(|v| v.is_finite()));
}

#[test]
fn inference_mode_is_deterministic() {
    let device = Device::Cpu;
    let (_varmap, vb) = var_builder(&device);
    let config = ModelConfig {
        dropout_rate: 0.4,
        ..small_config()
    };
    let model = SequenceModel::new(config, vb).unwrap();

    let tokens = token_tensor(1, 6, 30, &device);
    let first = model.forward(&tokens, false).unwrap();
    let second = model.forward(&tokens, false).unwrap();

    let diff = first
        .sub(&second)
        .unwrap()
        .abs()
        .unwrap()
        .max_all()
        .unwrap()
        .to_vec0::<f32>()
        .unwrap();
    assert!(diff < 1e-6, "inference outputs diverged by {diff}");
}

#[test]
fn full_context_window_is_accepted() {
    let device = Device::Cpu;
    let (_varmap, vb) = var_builder(&device);
    let model = SequenceModel::new(small_config(), vb).unwrap();

    let tokens = token_tensor(1, 16, 30, &device);
    let logits = model.forward(&tokens, false).unwrap();
    assert_eq!(logits.dims3().unwrap(), (1, 16, 30));
}

#[test]
fn overlong_sequence_is_rejected() {
    let device = Device::Cpu;
    let (_varmap, vb) = var_builder(&device);
    let model = SequenceModel::new(small_config(), vb).unwrap();

    let tokens = token_tensor(1, 17, 30, &device);
    let err = model.forward(&tokens, false).unwrap_err();
    assert!(matches!(err, ModelError::ShapeMismatch { .. }));
}

#[test]
fn three_dimensional_input_is_rejected() {
    let device = Device::Cpu;
    let (_varmap, vb) = var_builder(&device);
    let model = SequenceModel::new(small_config(), vb).unwrap();

    let tokens = Tensor::zeros((1, 4, 4), DType::U32, &device).unwrap();
    let err = model.forward(&tokens, false).unwrap_err();
    assert!(matches!(err, ModelError::ShapeMismatch { .. }));
}

#[test]
fn indivisible_width_fails_at_construction() {
    let device = Device::Cpu;
    let (_varmap, vb) = var_builder(&device);
    let config = ModelConfig {
        n_embd: 5,
        n_head: 2,
        ..small_config()
    };
    let err = SequenceModel::new(config, vb).unwrap_err();
    assert!(matches!(err, ModelError::InvalidConfig { .. }));
}

#[test]
fn generation_extends_the_sequence() {
    let device = Device::Cpu;
    let (_varmap, vb) = var_builder(&device);
    let model = SequenceModel::new(small_config(), vb).unwrap();

    let context = token_tensor(1, 2, 30, &device);
    let generated = model.generate(&context, 5).unwrap();

    let (batch, seq_len) = generated.dims2().unwrap();
    assert_eq!(batch, 1);
    assert_eq!(seq_len, 7);

    let ids = generated.flatten_all().unwrap().to_vec1::<u32>().unwrap();
    assert!(ids.iter().all(|&id| (id as usize) < 30));
}

#[test]
fn generation_crops_beyond_the_context_window() {
    let device = Device::Cpu;
    let (_varmap, vb) = var_builder(&device);
    let config = ModelConfig {
        block_size: 8,
        ..small_config()
    };
    let model = SequenceModel::new(config, vb).unwrap();

    let context = token_tensor(1, 2, 30, &device);
    let generated = model.generate(&context, 10).unwrap();
    assert_eq!(generated.dims2().unwrap(), (1, 12));
}

#[test]
fn greedy_generation_is_deterministic() {
    let device = Device::Cpu;
    let (_varmap, vb) = var_builder(&device);
    let model = SequenceModel::new(small_config(), vb).unwrap();

    let context = token_tensor(2, 3, 30, &device);
    let options = SamplingOptions {
        temperature: 0.0,
        top_k: None,
        top_p: None,
    };

    let first = model
        .generate_with_sampling(&context, 4, &options)
        .unwrap()
        .to_vec2::<u32>()
        .unwrap();
    let second = model
        .generate_with_sampling(&context, 4, &options)
        .unwrap()
        .to_vec2::<u32>()
        .unwrap();
    assert_eq!(first, second);
}

#[test]
fn parameter_count_matches_geometry() {
    let device = Device::Cpu;
    let (_varmap, vb) = var_builder(&device);
    let config = small_config();
    let model = SequenceModel::new(config.clone(), vb).unwrap();

    let c = config.n_embd;
    let v = config.vocab_size;
    let per_block = 3 * c * c + c * c + c // attention projections
        + 2 * c + 4 * c * c + 4 * c + 4 * c * c + c // feed-forward with inner norm
        + 4 * c; // block norms
    let expected =
        v * c + config.block_size * c + config.n_block * per_block + 2 * c + c * v + v;

    assert_eq!(model.count_parameters(), expected);
}
