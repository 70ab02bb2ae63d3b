//! Dense sentence embeddings from a Candle BERT/XLM-R encoder
//!
//! Pipeline: tokenize → encoder forward pass → mean pooling over attended
//! tokens → L2 normalisation. The model id is the model type plus a
//! fingerprint of `config.json`, `tokenizer.json` and `model.safetensors`.

use anyhow::Result;
use candle_core::{DType, Tensor};
use std::path::Path;
use tokenizers::Tokenizer;

use super::{require_text, Embedder};
use crate::bert::{select_device, BertEncoder, EncodedInput, ModelFiles};
use crate::error::EmbeddingError;

pub struct BertEmbedder {
    encoder: BertEncoder,
    tokenizer: Tokenizer,
    model_id: String,
    dimension: usize,
    max_tokens: usize,
}

impl BertEmbedder {
    /// Load from a local model directory
    pub fn load(model_path: &Path) -> Result<Self> {
        let device = select_device()?;
        tracing::info!("Loading embedding model on device: {:?}", device);

        let files = ModelFiles::open(model_path)?;
        let vb = files.var_builder(&device)?;
        let vb = BertEncoder::root(vb, &files.config);
        let encoder = BertEncoder::load(vb, &files.config, &device)?;

        let model_id = files.model_id();
        tracing::info!("Embedding model {} loaded, dimension {}", model_id, files.config.hidden_size);

        Ok(Self {
            encoder,
            tokenizer: files.tokenizer,
            model_id,
            dimension: files.config.hidden_size,
            max_tokens: files.config.max_tokens(),
        })
    }

    fn embed_inner(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))?;
        let input = EncodedInput::from_encoding(&encoding, self.max_tokens);

        let hidden = self.encoder.forward(&input)?;
        let mask = Tensor::new(input.mask.as_slice(), self.encoder.device())?
            .to_dtype(DType::F32)?
            .reshape((1, input.mask.len(), 1))?;
        let pooled = mean_pool(&hidden, &mask)?;
        let normalized = l2_normalize(&pooled)?;
        Ok(normalized.to_vec1::<f32>()?)
    }
}

/// Mean over attended positions: [1, seq, hidden] -> [hidden]
fn mean_pool(hidden: &Tensor, mask: &Tensor) -> Result<Tensor> {
    let summed = hidden.broadcast_mul(mask)?.sum(1)?;
    let count = mask.sum(1)?;
    Ok(summed.broadcast_div(&count)?.squeeze(0)?)
}

fn l2_normalize(tensor: &Tensor) -> Result<Tensor> {
    let norm = (tensor.sqr()?.sum_all()?.sqrt()? + 1e-12)?;
    Ok(tensor.broadcast_div(&norm)?)
}

impl Embedder for BertEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let text = require_text(text)?;
        self.embed_inner(text)
            .map_err(|e| EmbeddingError::Backend(e.to_string()))
    }
}
