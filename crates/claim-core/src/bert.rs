//! BERT-family transformer encoder built on Hugging Face Candle
//!
//! Shared by the dense embedder and the NLI cross-encoder. Supports BERT and
//! (XLM-)RoBERTa checkpoints stored as `config.json` + `tokenizer.json` +
//! `model.safetensors`.

use anyhow::{anyhow, Result};
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{embedding, layer_norm, linear, Activation, Embedding, LayerNorm, Linear, VarBuilder};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

/// Hard cap on tokens fed to the encoder
pub const MAX_SEQ_LEN: usize = 512;

/// Model configuration loaded from config.json
#[derive(Debug, Clone, Deserialize)]
pub struct BertConfig {
    pub vocab_size: usize,
    pub hidden_size: usize,
    pub num_hidden_layers: usize,
    pub num_attention_heads: usize,
    pub intermediate_size: usize,
    #[serde(default = "default_hidden_act")]
    pub hidden_act: String,
    pub max_position_embeddings: usize,
    #[serde(default = "default_type_vocab_size")]
    pub type_vocab_size: usize,
    #[serde(default = "default_layer_norm_eps")]
    pub layer_norm_eps: f64,
    #[serde(default)]
    pub pad_token_id: usize,
    #[serde(default)]
    pub model_type: String,
    /// Classification heads only: "0" -> "entailment", ...
    #[serde(default)]
    pub id2label: BTreeMap<String, String>,
}

fn default_hidden_act() -> String {
    "gelu".to_string()
}

fn default_type_vocab_size() -> usize {
    2
}

fn default_layer_norm_eps() -> f64 {
    1e-12
}

impl BertConfig {
    fn is_roberta(&self) -> bool {
        self.model_type.contains("roberta")
    }

    /// RoBERTa position ids start after the padding index
    pub fn position_offset(&self) -> usize {
        if self.is_roberta() {
            self.pad_token_id + 1
        } else {
            0
        }
    }

    /// Longest token sequence the position table can address
    pub fn max_tokens(&self) -> usize {
        self.max_position_embeddings
            .saturating_sub(self.position_offset())
            .min(MAX_SEQ_LEN)
    }

    /// Weight-name prefix used by `*ForSequenceClassification` exports
    pub fn weight_prefix(&self) -> &'static str {
        if self.is_roberta() {
            "roberta"
        } else {
            "bert"
        }
    }

    fn activation(&self) -> Activation {
        match self.hidden_act.as_str() {
            "relu" => Activation::Relu,
            "gelu_new" | "gelu_pytorch_tanh" => Activation::GeluPytorchTanh,
            _ => Activation::Gelu,
        }
    }
}

/// Files making up a local model directory
pub struct ModelFiles {
    pub config: BertConfig,
    pub tokenizer: Tokenizer,
    pub weights: PathBuf,
    pub fingerprint: String,
}

impl ModelFiles {
    /// Open a model directory containing:
    ///   - `config.json` - the model configuration
    ///   - `tokenizer.json` - the tokenizer configuration
    ///   - `model.safetensors` - the model weights
    pub fn open(dir: &Path) -> Result<Self> {
        let config_path = dir.join("config.json");
        if !config_path.exists() {
            return Err(anyhow!("Config not found at {}", config_path.display()));
        }
        let config_bytes = std::fs::read(&config_path)?;
        let config: BertConfig = serde_json::from_slice(&config_bytes)
            .map_err(|e| anyhow!("Failed to parse config.json: {}", e))?;

        let tokenizer_path = dir.join("tokenizer.json");
        if !tokenizer_path.exists() {
            return Err(anyhow!("Tokenizer not found at {}", tokenizer_path.display()));
        }
        let tokenizer_bytes = std::fs::read(&tokenizer_path)?;
        let tokenizer = Tokenizer::from_bytes(&tokenizer_bytes)
            .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;

        let weights = dir.join("model.safetensors");
        if !weights.exists() {
            return Err(anyhow!("Model weights not found at {}", weights.display()));
        }

        tracing::info!(
            "Loaded config from {}: {} layers, {} hidden size, {} attention heads",
            dir.display(),
            config.num_hidden_layers,
            config.hidden_size,
            config.num_attention_heads
        );

        Ok(Self {
            config,
            tokenizer,
            fingerprint: fingerprint(dir)?,
            weights,
        })
    }

    /// `<model type>@<first 16 hex chars of the fingerprint>`
    ///
    /// Independent of where the files live: the same checkpoint copied to
    /// another directory keeps its id, and any change to the weights,
    /// configuration or vocabulary produces a new one.
    pub fn model_id(&self) -> String {
        model_id(&self.config, &self.fingerprint)
    }

    /// Memory-map the safetensors weights
    pub fn var_builder(&self, device: &Device) -> Result<VarBuilder<'static>> {
        // SAFETY: the weights file is treated as immutable for the life of the process
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[self.weights.clone()], DType::F32, device)?
        };
        Ok(vb)
    }
}

/// Files hashed into a model fingerprint, in order
const FINGERPRINT_FILES: [&str; 3] = ["config.json", "tokenizer.json", "model.safetensors"];

/// SHA-256 over config, tokenizer and weights of a model directory, hex encoded
///
/// Each file contributes its length followed by its bytes. The weights are
/// streamed so large checkpoints are never held in memory.
pub fn fingerprint(dir: &Path) -> Result<String> {
    let mut hasher = Sha256::new();
    for name in FINGERPRINT_FILES {
        let path = dir.join(name);
        let file = File::open(&path)
            .map_err(|e| anyhow!("Failed to open {}: {}", path.display(), e))?;
        hasher.update(file.metadata()?.len().to_le_bytes());
        std::io::copy(&mut BufReader::new(file), &mut hasher)?;
    }
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn model_id(config: &BertConfig, fingerprint: &str) -> String {
    let family = if config.model_type.is_empty() {
        "bert"
    } else {
        config.model_type.as_str()
    };
    format!("{}@{}", family, &fingerprint[..16.min(fingerprint.len())])
}

/// Prefer CUDA, then Metal, then CPU
pub fn select_device() -> Result<Device> {
    let device = if candle_core::utils::cuda_is_available() {
        Device::new_cuda(0)?
    } else if candle_core::utils::metal_is_available() {
        Device::new_metal(0)?
    } else {
        Device::Cpu
    };
    Ok(device)
}

/// Download model files from the Hugging Face Hub and return the snapshot directory
pub fn fetch_model(repo_id: &str) -> Result<PathBuf> {
    use hf_hub::api::sync::Api;

    tracing::info!("Downloading {} from Hugging Face Hub...", repo_id);

    let api = Api::new()?;
    let repo = api.model(repo_id.to_string());
    let config = repo.get("config.json")?;
    repo.get("tokenizer.json")?;
    repo.get("model.safetensors")?;

    config
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| anyhow!("Downloaded config has no parent directory"))
}

/// Token ids, segment ids and attention mask for one sequence
pub struct EncodedInput {
    pub ids: Vec<u32>,
    pub type_ids: Vec<u32>,
    pub mask: Vec<u32>,
}

impl EncodedInput {
    pub fn from_encoding(encoding: &tokenizers::Encoding, max_tokens: usize) -> Self {
        let len = encoding.get_ids().len().min(max_tokens);
        Self {
            ids: encoding.get_ids()[..len].to_vec(),
            type_ids: encoding.get_type_ids()[..len].to_vec(),
            mask: encoding.get_attention_mask()[..len].to_vec(),
        }
    }
}

/// Embeddings layer
struct BertEmbeddings {
    word_embeddings: Embedding,
    position_embeddings: Embedding,
    token_type_embeddings: Embedding,
    layer_norm: LayerNorm,
}

impl BertEmbeddings {
    fn load(vb: VarBuilder, config: &BertConfig) -> Result<Self> {
        Ok(Self {
            word_embeddings: embedding(config.vocab_size, config.hidden_size, vb.pp("word_embeddings"))?,
            position_embeddings: embedding(
                config.max_position_embeddings,
                config.hidden_size,
                vb.pp("position_embeddings"),
            )?,
            token_type_embeddings: embedding(
                config.type_vocab_size,
                config.hidden_size,
                vb.pp("token_type_embeddings"),
            )?,
            layer_norm: layer_norm(config.hidden_size, config.layer_norm_eps, vb.pp("LayerNorm"))?,
        })
    }

    fn forward(&self, input_ids: &Tensor, token_type_ids: &Tensor, position_ids: &Tensor) -> Result<Tensor> {
        let words = self.word_embeddings.forward(input_ids)?;
        let positions = self.position_embeddings.forward(position_ids)?;
        let types = self.token_type_embeddings.forward(token_type_ids)?;
        let summed = words.add(&positions)?.add(&types)?;
        Ok(self.layer_norm.forward(&summed)?)
    }
}

/// Multi-head self-attention with its output projection
struct BertAttention {
    query: Linear,
    key: Linear,
    value: Linear,
    output: Linear,
    layer_norm: LayerNorm,
    num_heads: usize,
    head_dim: usize,
}

impl BertAttention {
    fn load(vb: VarBuilder, config: &BertConfig) -> Result<Self> {
        let head_dim = config.hidden_size / config.num_attention_heads;
        let all_heads = config.num_attention_heads * head_dim;
        let sa = vb.pp("self");
        let out = vb.pp("output");
        Ok(Self {
            query: linear(config.hidden_size, all_heads, sa.pp("query"))?,
            key: linear(config.hidden_size, all_heads, sa.pp("key"))?,
            value: linear(config.hidden_size, all_heads, sa.pp("value"))?,
            output: linear(all_heads, config.hidden_size, out.pp("dense"))?,
            layer_norm: layer_norm(config.hidden_size, config.layer_norm_eps, out.pp("LayerNorm"))?,
            num_heads: config.num_attention_heads,
            head_dim,
        })
    }

    /// [batch, seq, hidden] -> [batch, heads, seq, head_dim]
    fn split_heads(&self, x: Tensor) -> Result<Tensor> {
        let (batch, seq, _) = x.dims3()?;
        Ok(x.reshape((batch, seq, self.num_heads, self.head_dim))?
            .transpose(1, 2)?
            .contiguous()?)
    }

    fn forward(&self, hidden: &Tensor, mask: &Tensor) -> Result<Tensor> {
        let (batch, seq, _) = hidden.dims3()?;
        let q = self.split_heads(self.query.forward(hidden)?)?;
        let k = self.split_heads(self.key.forward(hidden)?)?;
        let v = self.split_heads(self.value.forward(hidden)?)?;

        let scores = (q.matmul(&k.t()?.contiguous()?)? / (self.head_dim as f64).sqrt())?;
        let scores = scores.broadcast_add(mask)?;
        let probs = candle_nn::ops::softmax_last_dim(&scores)?;

        let context = probs
            .matmul(&v)?
            .transpose(1, 2)?
            .contiguous()?
            .reshape((batch, seq, self.num_heads * self.head_dim))?;

        let projected = self.output.forward(&context)?;
        Ok(self.layer_norm.forward(&projected.add(hidden)?)?)
    }
}

/// One transformer block
struct BertLayer {
    attention: BertAttention,
    intermediate: Linear,
    activation: Activation,
    output: Linear,
    layer_norm: LayerNorm,
}

impl BertLayer {
    fn load(vb: VarBuilder, config: &BertConfig) -> Result<Self> {
        Ok(Self {
            attention: BertAttention::load(vb.pp("attention"), config)?,
            intermediate: linear(
                config.hidden_size,
                config.intermediate_size,
                vb.pp("intermediate").pp("dense"),
            )?,
            activation: config.activation(),
            output: linear(
                config.intermediate_size,
                config.hidden_size,
                vb.pp("output").pp("dense"),
            )?,
            layer_norm: layer_norm(
                config.hidden_size,
                config.layer_norm_eps,
                vb.pp("output").pp("LayerNorm"),
            )?,
        })
    }

    fn forward(&self, hidden: &Tensor, mask: &Tensor) -> Result<Tensor> {
        let attended = self.attention.forward(hidden, mask)?;
        let expanded = self.activation.forward(&self.intermediate.forward(&attended)?)?;
        let projected = self.output.forward(&expanded)?;
        Ok(self.layer_norm.forward(&projected.add(&attended)?)?)
    }
}

/// Embeddings plus the stack of transformer blocks
pub struct BertEncoder {
    embeddings: BertEmbeddings,
    layers: Vec<BertLayer>,
    position_offset: usize,
    single_segment: bool,
    device: Device,
}

impl BertEncoder {
    pub fn load(vb: VarBuilder, config: &BertConfig, device: &Device) -> Result<Self> {
        let embeddings = BertEmbeddings::load(vb.pp("embeddings"), config)?;

        let mut layers = Vec::with_capacity(config.num_hidden_layers);
        let vb_l = vb.pp("encoder").pp("layer");
        for i in 0..config.num_hidden_layers {
            layers.push(BertLayer::load(vb_l.pp(i), config)?);
        }

        Ok(Self {
            embeddings,
            layers,
            position_offset: config.position_offset(),
            single_segment: config.type_vocab_size <= 1,
            device: device.clone(),
        })
    }

    /// Resolve the encoder root: bare exports have no prefix
    pub fn root<'a>(vb: VarBuilder<'a>, config: &BertConfig) -> VarBuilder<'a> {
        if vb.contains_tensor("embeddings.word_embeddings.weight") {
            vb
        } else {
            vb.pp(config.weight_prefix())
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Hidden states of shape [1, seq, hidden]
    pub fn forward(&self, input: &EncodedInput) -> Result<Tensor> {
        let seq_len = input.ids.len();
        if seq_len == 0 {
            return Err(anyhow!("Cannot encode an empty token sequence"));
        }

        let input_ids = Tensor::new(input.ids.as_slice(), &self.device)?.unsqueeze(0)?;
        let type_ids = if self.single_segment {
            Tensor::zeros((1, seq_len), DType::U32, &self.device)?
        } else {
            Tensor::new(input.type_ids.as_slice(), &self.device)?.unsqueeze(0)?
        };
        let positions: Vec<u32> = (0..seq_len)
            .map(|p| (p + self.position_offset) as u32)
            .collect();
        let position_ids = Tensor::new(positions.as_slice(), &self.device)?.unsqueeze(0)?;

        // Additive mask: 0 where attended, -10000 where padded
        let mask = Tensor::new(input.mask.as_slice(), &self.device)?
            .to_dtype(DType::F32)?
            .reshape((1, 1, 1, seq_len))?
            .affine(10000.0, -10000.0)?;

        let mut hidden = self.embeddings.forward(&input_ids, &type_ids, &position_ids)?;
        for layer in &self.layers {
            hidden = layer.forward(&hidden, &mask)?;
        }
        Ok(hidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(model_type: &str) -> BertConfig {
        serde_json::from_value(serde_json::json!({
            "vocab_size": 100,
            "hidden_size": 8,
            "num_hidden_layers": 1,
            "num_attention_heads": 2,
            "intermediate_size": 16,
            "max_position_embeddings": 514,
            "pad_token_id": 1,
            "model_type": model_type,
        }))
        .unwrap()
    }

    #[test]
    fn test_roberta_positions_skip_padding_index() {
        let roberta = config("xlm-roberta");
        assert_eq!(roberta.position_offset(), 2);
        assert_eq!(roberta.max_tokens(), 512);
        assert_eq!(roberta.weight_prefix(), "roberta");

        let bert = config("bert");
        assert_eq!(bert.position_offset(), 0);
        assert_eq!(bert.weight_prefix(), "bert");
    }

    #[test]
    fn test_config_defaults() {
        let c = config("bert");
        assert_eq!(c.hidden_act, "gelu");
        assert_eq!(c.type_vocab_size, 2);
        assert!(c.id2label.is_empty());
    }

    fn write_model(dir: &Path, weights: &[u8]) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join("config.json"), br#"{"model_type":"bert"}"#).unwrap();
        std::fs::write(dir.join("tokenizer.json"), b"{\"version\":\"1.0\"}").unwrap();
        std::fs::write(dir.join("model.safetensors"), weights).unwrap();
    }

    #[test]
    fn test_fingerprint_ignores_directory_name() {
        let root = tempfile::tempdir().unwrap();
        let hub = root.path().join("snapshot-abc123");
        let local = root.path().join("embedder");
        write_model(&hub, b"weights-v1");
        write_model(&local, b"weights-v1");

        let a = fingerprint(&hub).unwrap();
        assert_eq!(a.len(), 64);
        assert_eq!(a, fingerprint(&local).unwrap());
        assert_eq!(model_id(&config("bert"), &a), model_id(&config("bert"), &fingerprint(&local).unwrap()));
    }

    #[test]
    fn test_fingerprint_changes_with_weights() {
        let root = tempfile::tempdir().unwrap();
        let base = root.path().join("base");
        let tuned = root.path().join("tuned");
        write_model(&base, b"weights-v1");
        write_model(&tuned, b"weights-v2");

        let c = config("bert");
        assert_ne!(
            model_id(&c, &fingerprint(&base).unwrap()),
            model_id(&c, &fingerprint(&tuned).unwrap())
        );
    }

    #[test]
    fn test_fingerprint_changes_with_tokenizer() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("m");
        write_model(&dir, b"weights");
        let before = fingerprint(&dir).unwrap();
        std::fs::write(dir.join("tokenizer.json"), b"{\"version\":\"2.0\"}").unwrap();
        assert_ne!(before, fingerprint(&dir).unwrap());
    }

    #[test]
    fn test_model_id_names_family() {
        let fp = "0123456789abcdef0123456789abcdef";
        assert_eq!(model_id(&config("xlm-roberta"), fp), "xlm-roberta@0123456789abcdef");
        assert_eq!(model_id(&config(""), fp), "bert@0123456789abcdef");
    }

    #[test]
    fn test_open_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let err = ModelFiles::open(dir.path()).err().unwrap();
        assert!(err.to_string().contains("Config not found"));
    }
}
