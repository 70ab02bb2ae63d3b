//! Cross-encoder NLI stance classifier
//!
//! Feeds `(claim, passage)` as a sentence pair through a sequence
//! classification checkpoint (BERT or XLM-R family) and maps the argmax label
//! onto a [`Stance`]. Label names come from `id2label` in `config.json`.

use anyhow::{anyhow, Result};
use candle_core::{IndexOp, Module, Tensor};
use candle_nn::{linear, Linear, VarBuilder};
use std::collections::BTreeMap;
use std::path::Path;
use tokenizers::utils::truncation::{TruncationParams, TruncationStrategy};
use tokenizers::Tokenizer;

use super::{Stance, StanceClassifier, StancePrediction};
use crate::bert::{select_device, BertConfig, BertEncoder, EncodedInput, ModelFiles};
use crate::error::ClassificationError;

/// Classification head on top of the `[CLS]` state
enum Head {
    /// BERT: pooler (dense + tanh) then a single linear layer
    Pooled { pooler: Linear, classifier: Linear },
    /// RoBERTa: dense + tanh then an output projection
    Roberta { dense: Linear, out_proj: Linear },
}

impl Head {
    fn load(vb: &VarBuilder, encoder_vb: &VarBuilder, config: &BertConfig, num_labels: usize) -> Result<Self> {
        let hidden = config.hidden_size;
        if vb.contains_tensor("classifier.out_proj.weight") {
            let head = vb.pp("classifier");
            Ok(Head::Roberta {
                dense: linear(hidden, hidden, head.pp("dense"))?,
                out_proj: linear(hidden, num_labels, head.pp("out_proj"))?,
            })
        } else {
            Ok(Head::Pooled {
                pooler: linear(hidden, hidden, encoder_vb.pp("pooler").pp("dense"))?,
                classifier: linear(hidden, num_labels, vb.pp("classifier"))?,
            })
        }
    }

    /// [1, hidden] -> [1, num_labels]
    fn forward(&self, cls: &Tensor) -> Result<Tensor> {
        let (first, second) = match self {
            Head::Pooled { pooler, classifier } => (pooler, classifier),
            Head::Roberta { dense, out_proj } => (dense, out_proj),
        };
        let x = first.forward(cls)?.tanh()?;
        Ok(second.forward(&x)?)
    }
}

pub struct NliClassifier {
    encoder: BertEncoder,
    head: Head,
    tokenizer: Tokenizer,
    labels: Vec<Stance>,
    model_id: String,
}

impl NliClassifier {
    /// Load from a local model directory
    pub fn load(model_path: &Path) -> Result<Self> {
        let device = select_device()?;
        tracing::info!("Loading NLI model on device: {:?}", device);

        let files = ModelFiles::open(model_path)?;
        let labels = stance_labels(&files.config.id2label)?;

        let vb = files.var_builder(&device)?;
        let encoder_vb = BertEncoder::root(vb.clone(), &files.config);
        let encoder = BertEncoder::load(encoder_vb.clone(), &files.config, &device)?;
        let head = Head::load(&vb, &encoder_vb, &files.config, labels.len())?;

        let mut tokenizer = files.tokenizer.clone();
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: files.config.max_tokens(),
                strategy: TruncationStrategy::LongestFirst,
                ..Default::default()
            }))
            .map_err(|e| anyhow!("Failed to configure truncation: {}", e))?;

        let model_id = files.model_id();
        tracing::info!("NLI model {} loaded with labels {:?}", model_id, labels);

        Ok(Self {
            encoder,
            head,
            tokenizer,
            labels,
            model_id,
        })
    }

    fn probabilities(&self, claim: &str, passage: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode((claim, passage), true)
            .map_err(|e| anyhow!("Tokenization failed: {}", e))?;
        let input = EncodedInput::from_encoding(&encoding, usize::MAX);

        let hidden = self.encoder.forward(&input)?;
        let cls = hidden.i((.., 0))?;
        let logits = self.head.forward(&cls)?;
        let probs = candle_nn::ops::softmax_last_dim(&logits)?;
        Ok(probs.squeeze(0)?.to_vec1::<f32>()?)
    }
}

impl StanceClassifier for NliClassifier {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn classify(&self, claim: &str, passage: &str) -> Result<StancePrediction, ClassificationError> {
        let probs = self
            .probabilities(claim, passage)
            .map_err(|e| ClassificationError::Backend(e.to_string()))?;
        let (index, confidence) = argmax(&probs)
            .ok_or_else(|| ClassificationError::Backend("model produced no logits".to_string()))?;
        let label = self.labels.get(index).copied().ok_or_else(|| {
            ClassificationError::Backend(format!("label index {index} out of range"))
        })?;
        Ok(StancePrediction::new(label, confidence))
    }
}

/// Map `id2label` entries onto stances, ordered by label index
pub fn stance_labels(id2label: &BTreeMap<String, String>) -> Result<Vec<Stance>> {
    if id2label.is_empty() {
        return Err(anyhow!("config.json has no id2label mapping; not a classification model"));
    }

    let mut indexed = Vec::with_capacity(id2label.len());
    for (id, name) in id2label {
        let index: usize = id
            .parse()
            .map_err(|_| anyhow!("Invalid label index '{}' in id2label", id))?;
        indexed.push((index, stance_for_label(name)?));
    }
    indexed.sort_by_key(|(index, _)| *index);

    for (expected, (index, _)) in indexed.iter().enumerate() {
        if *index != expected {
            return Err(anyhow!("id2label indices are not contiguous: missing {}", expected));
        }
    }
    Ok(indexed.into_iter().map(|(_, stance)| stance).collect())
}

fn stance_for_label(name: &str) -> Result<Stance> {
    let normalized = name.trim().to_lowercase().replace(['-', ' '], "_");
    // Order matters: "not_entailment" contains "entail"
    let stance = if normalized.contains("contradict") || normalized.starts_with("refute") {
        Stance::Refute
    } else if normalized.contains("not_entail") || normalized.contains("non_entail") {
        Stance::NotEnoughInfo
    } else if normalized.contains("entail") || normalized.starts_with("support") {
        Stance::Support
    } else if normalized.contains("neutral") || normalized.contains("not_enough_info") {
        Stance::NotEnoughInfo
    } else {
        return Err(anyhow!("Unrecognised NLI label '{}'", name));
    };
    Ok(stance)
}

/// Highest probability and its index; ties go to the lowest index
fn argmax(probs: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &p) in probs.iter().enumerate() {
        if best.map_or(true, |(_, b)| p > b) {
            best = Some((i, p));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_mnli_labels() {
        let map = labels(&[("0", "entailment"), ("1", "neutral"), ("2", "contradiction")]);
        assert_eq!(
            stance_labels(&map).unwrap(),
            vec![Stance::Support, Stance::NotEnoughInfo, Stance::Refute]
        );
    }

    #[test]
    fn test_binary_entailment_labels() {
        let map = labels(&[("0", "entailment"), ("1", "not_entailment")]);
        assert_eq!(
            stance_labels(&map).unwrap(),
            vec![Stance::Support, Stance::NotEnoughInfo]
        );
    }

    #[test]
    fn test_fever_labels() {
        let map = labels(&[("0", "SUPPORTS"), ("1", "REFUTES"), ("2", "NOT ENOUGH INFO")]);
        assert_eq!(
            stance_labels(&map).unwrap(),
            vec![Stance::Support, Stance::Refute, Stance::NotEnoughInfo]
        );
    }

    #[test]
    fn test_labels_sorted_numerically() {
        // BTreeMap orders "10" before "2"; indices must still be numeric
        let mut pairs: Vec<(String, String)> = (0..11)
            .map(|i| (i.to_string(), "neutral".to_string()))
            .collect();
        pairs[10].1 = "contradiction".to_string();
        let map: BTreeMap<String, String> = pairs.into_iter().collect();
        let stances = stance_labels(&map).unwrap();
        assert_eq!(stances.len(), 11);
        assert_eq!(stances[10], Stance::Refute);
    }

    #[test]
    fn test_rejects_unknown_or_missing_labels() {
        assert!(stance_labels(&BTreeMap::new()).is_err());
        assert!(stance_labels(&labels(&[("0", "LABEL_0")])).is_err());
        assert!(stance_labels(&labels(&[("0", "entailment"), ("2", "neutral")])).is_err());
    }

    #[test]
    fn test_argmax_prefers_lowest_index_on_ties() {
        assert_eq!(argmax(&[0.2, 0.4, 0.4]), Some((1, 0.4)));
        assert_eq!(argmax(&[0.7, 0.2, 0.1]), Some((0, 0.7)));
        assert_eq!(argmax(&[]), None);
    }
}
