use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use seqformer::{ModelConfig, SamplingOptions, SequenceModel};

fn main() -> Result<()> {
    let device = Device::Cpu;

    let config = ModelConfig {
        vocab_size: 32,
        n_embd: 64,
        n_head: 4,
        n_block: 2,
        block_size: 32,
        dropout_rate: 0.0,
        ..ModelConfig::default()
    };

    println!("Building a randomly initialized sequence model...");
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
    let model = SequenceModel::new(config, vb)?;
    println!(
        "  vocab={} width={} heads={} blocks={} context={} ({} parameters)",
        model.config().vocab_size,
        model.config().n_embd,
        model.config().n_head,
        model.config().n_block,
        model.config().block_size,
        model.count_parameters()
    );

    println!("\nForward pass on a toy batch:");
    let tokens: Vec<u32> = (0..2 * 8).map(|i| (i % 32) as u32).collect();
    let batch = Tensor::from_vec(tokens, (2, 8), &device)?;
    let logits = model.forward(&batch, false)?;
    println!("  input shape:  {:?}", batch.shape());
    println!("  logits shape: {:?}", logits.shape());

    println!("\nSampling a continuation from token 0:");
    let context = Tensor::from_vec(vec![0u32], (1, 1), &device)?;
    let options = SamplingOptions {
        temperature: 0.8,
        top_k: Some(8),
        top_p: None,
    };
    let generated = model.generate_with_sampling(&context, 24, &options)?;
    let ids = generated.squeeze(0)?.to_vec1::<u32>()?;
    println!("  generated ids: {ids:?}");

    Ok(())
}
