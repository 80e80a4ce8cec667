//! Attention-based text encoder backend.
//!
//! A compact stand-in for a fine-tuned neural classifier: learned token
//! embeddings, a single additive-attention pooling layer, and a softmax
//! head, trained from scratch with seeded mini-batch gradient descent.
//! Unlike the one-pass backends it trains over epochs, holds out a
//! validation split, and honors cooperative cancellation at epoch
//! boundaries.

use std::collections::BTreeMap;

use ahash::AHashMap;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::analysis::Tokenizer;
use crate::config::TrainingOptions;
use crate::dataset::Dataset;
use crate::error::{HeraldError, Result};
use crate::ml::CancelToken;
use crate::ml::artifact::ModelArtifact;
use crate::ml::backend::{ModelBackend, ModelType, Prediction, check_trainable};
use crate::ml::naive_bayes::softmax;

/// Learned state of one transformer training run.
#[derive(Debug, Serialize, Deserialize)]
struct TransformerParameters {
    tokenizer: Tokenizer,
    vocab: AHashMap<String, usize>,
    labels: Vec<String>,
    dim: usize,
    /// Token embeddings, `vocab.len() * dim`, row-major.
    embed: Vec<f64>,
    /// Attention projection, `dim * dim`, row-major.
    attn_w: Vec<f64>,
    attn_b: Vec<f64>,
    /// Attention scoring vector.
    attn_u: Vec<f64>,
    /// Classifier head, `labels.len() * dim`, row-major.
    head_w: Vec<f64>,
    head_b: Vec<f64>,
}

/// See the module docs. Confidence is the softmax probability of the winning
/// label.
#[derive(Debug, Default)]
pub struct TransformerBackend;

impl ModelBackend for TransformerBackend {
    fn model_type(&self) -> ModelType {
        ModelType::Transformer
    }

    fn train(
        &self,
        dataset: &Dataset,
        options: &TrainingOptions,
        cancel: &CancelToken,
    ) -> Result<ModelArtifact> {
        check_trainable(dataset)?;

        let tokenizer = Tokenizer::default();
        let mut labels = dataset.labels();
        labels.sort();

        // Vocabulary in first-seen order, like the vectorizer.
        let mut vocab: AHashMap<String, usize> = AHashMap::new();
        for example in dataset.examples() {
            for token in tokenizer.tokenize(&example.text) {
                let next = vocab.len();
                vocab.entry(token).or_insert(next);
            }
        }

        let docs: Vec<Vec<usize>> = dataset
            .examples()
            .iter()
            .map(|e| {
                tokenizer
                    .tokenize(&e.text)
                    .into_iter()
                    .filter_map(|t| vocab.get(&t).copied())
                    .collect()
            })
            .collect();
        let targets: Vec<usize> = dataset
            .examples()
            .iter()
            .map(|e| labels.iter().position(|l| l == &e.label).unwrap_or(0))
            .collect();

        let mut rng = StdRng::seed_from_u64(options.seed);
        let (train_rows, val_rows) = split_rows(&targets, labels.len(), options.validation_split, &mut rng);

        let dim = options.embed_dim.max(4);
        let mut model = init_parameters(tokenizer, vocab, labels, dim, &mut rng);

        let batch_size = options.batch_size.max(1);
        let mut order = train_rows.clone();
        for epoch in 0..options.epochs.max(1) {
            if cancel.is_cancelled() {
                return Err(HeraldError::cancelled(format!(
                    "transformer training cancelled at epoch {epoch}"
                )));
            }
            order.shuffle(&mut rng);
            let mut epoch_loss = 0.0;
            for batch in order.chunks(batch_size) {
                let loss = train_batch(&mut model, &docs, &targets, batch, options);
                epoch_loss += loss;
            }
            if !epoch_loss.is_finite() {
                return Err(HeraldError::training(format!(
                    "transformer loss diverged to a non-finite value at epoch {epoch}"
                )));
            }
        }

        let train_accuracy = accuracy(&model, &docs, &targets, &train_rows);
        let (val_accuracy, val_loss) = evaluate(&model, &docs, &targets, &val_rows);

        let mut metrics = BTreeMap::new();
        metrics.insert("train_accuracy".to_string(), train_accuracy);
        metrics.insert("val_accuracy".to_string(), val_accuracy);
        metrics.insert("val_loss".to_string(), val_loss);
        metrics.insert("examples".to_string(), dataset.len() as f64);

        Ok(ModelArtifact::draft(
            &dataset.name,
            self.model_type(),
            metrics,
            ModelArtifact::encode_parameters(&model)?,
        ))
    }

    fn predict(&self, text: &str, artifact: &ModelArtifact) -> Result<Prediction> {
        artifact.check_model_type(self.model_type())?;
        let model: TransformerParameters = artifact.decode_parameters()?;

        let tokens: Vec<usize> = model
            .tokenizer
            .tokenize(text)
            .into_iter()
            .filter_map(|t| model.vocab.get(&t).copied())
            .collect();
        let (probabilities, _) = forward(&model, &tokens);

        let (best, &confidence) = probabilities
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .expect("labels are never empty after training");

        let raw_scores: BTreeMap<String, f64> = model
            .labels
            .iter()
            .cloned()
            .zip(probabilities.iter().copied())
            .collect();

        Ok(Prediction {
            label: model.labels[best].clone(),
            confidence,
            raw_scores,
        })
    }
}

/// Per-label holdout so every label keeps at least one training example.
fn split_rows(
    targets: &[usize],
    n_classes: usize,
    validation_split: f64,
    rng: &mut StdRng,
) -> (Vec<usize>, Vec<usize>) {
    let fraction = validation_split.clamp(0.0, 0.5);
    let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
    for (row, &class) in targets.iter().enumerate() {
        by_class[class].push(row);
    }

    let mut train_rows = Vec::new();
    let mut val_rows = Vec::new();
    for mut rows in by_class {
        rows.shuffle(rng);
        let holdout = ((rows.len() as f64 * fraction).floor() as usize)
            .max(1)
            .min(rows.len() - 1);
        val_rows.extend(rows.drain(..holdout));
        train_rows.extend(rows);
    }
    train_rows.sort_unstable();
    val_rows.sort_unstable();
    (train_rows, val_rows)
}

fn init_parameters(
    tokenizer: Tokenizer,
    vocab: AHashMap<String, usize>,
    labels: Vec<String>,
    dim: usize,
    rng: &mut StdRng,
) -> TransformerParameters {
    let n_vocab = vocab.len();
    let n_labels = labels.len();
    let mut init = |len: usize, scale: f64| -> Vec<f64> {
        (0..len).map(|_| (rng.random::<f64>() - 0.5) * scale).collect()
    };
    TransformerParameters {
        tokenizer,
        vocab,
        labels,
        dim,
        embed: init(n_vocab * dim, 0.2),
        attn_w: init(dim * dim, 0.2),
        attn_b: vec![0.0; dim],
        attn_u: init(dim, 0.2),
        head_w: init(n_labels * dim, 0.2),
        head_b: vec![0.0; n_labels],
    }
}

/// Forward-pass cache kept for the backward pass.
struct ForwardCache {
    hidden: Vec<Vec<f64>>,
    attention: Vec<f64>,
    pooled: Vec<f64>,
}

fn forward(model: &TransformerParameters, tokens: &[usize]) -> (Vec<f64>, ForwardCache) {
    let dim = model.dim;
    let n_labels = model.labels.len();

    let mut hidden = Vec::with_capacity(tokens.len());
    let mut scores = Vec::with_capacity(tokens.len());
    for &token in tokens {
        let e = &model.embed[token * dim..(token + 1) * dim];
        let mut h = vec![0.0; dim];
        for (r, slot) in h.iter_mut().enumerate() {
            let mut sum = model.attn_b[r];
            for (c, &value) in e.iter().enumerate() {
                sum += model.attn_w[r * dim + c] * value;
            }
            *slot = sum.tanh();
        }
        scores.push(model.attn_u.iter().zip(&h).map(|(u, h)| u * h).sum::<f64>());
        hidden.push(h);
    }

    let attention = if tokens.is_empty() {
        Vec::new()
    } else {
        softmax(&scores)
    };

    let mut pooled = vec![0.0; dim];
    for (&token, &weight) in tokens.iter().zip(&attention) {
        let e = &model.embed[token * dim..(token + 1) * dim];
        for (slot, &value) in pooled.iter_mut().zip(e) {
            *slot += weight * value;
        }
    }

    let logits: Vec<f64> = (0..n_labels)
        .map(|l| {
            model.head_b[l]
                + model.head_w[l * dim..(l + 1) * dim]
                    .iter()
                    .zip(&pooled)
                    .map(|(w, p)| w * p)
                    .sum::<f64>()
        })
        .collect();

    (
        softmax(&logits),
        ForwardCache {
            hidden,
            attention,
            pooled,
        },
    )
}

/// One mini-batch of backpropagation. Returns the batch's summed loss.
fn train_batch(
    model: &mut TransformerParameters,
    docs: &[Vec<usize>],
    targets: &[usize],
    batch: &[usize],
    options: &TrainingOptions,
) -> f64 {
    let dim = model.dim;
    let n_labels = model.labels.len();

    let mut d_embed = vec![0.0; model.embed.len()];
    let mut d_attn_w = vec![0.0; model.attn_w.len()];
    let mut d_attn_b = vec![0.0; dim];
    let mut d_attn_u = vec![0.0; dim];
    let mut d_head_w = vec![0.0; model.head_w.len()];
    let mut d_head_b = vec![0.0; n_labels];
    let mut loss = 0.0;

    for &row in batch {
        let tokens = &docs[row];
        let target = targets[row];
        let (probs, cache) = forward(model, tokens);
        loss -= probs[target].max(1e-12).ln();

        // Head gradients.
        let d_logits: Vec<f64> = (0..n_labels)
            .map(|l| probs[l] - if l == target { 1.0 } else { 0.0 })
            .collect();
        let mut d_pooled = vec![0.0; dim];
        for (l, &dl) in d_logits.iter().enumerate() {
            d_head_b[l] += dl;
            for c in 0..dim {
                d_head_w[l * dim + c] += dl * cache.pooled[c];
                d_pooled[c] += dl * model.head_w[l * dim + c];
            }
        }

        if tokens.is_empty() {
            continue;
        }

        // Through the attention-weighted pool.
        let d_attention: Vec<f64> = tokens
            .iter()
            .map(|&token| {
                model.embed[token * dim..(token + 1) * dim]
                    .iter()
                    .zip(&d_pooled)
                    .map(|(e, d)| e * d)
                    .sum::<f64>()
            })
            .collect();
        let weighted: f64 = cache
            .attention
            .iter()
            .zip(&d_attention)
            .map(|(a, d)| a * d)
            .sum();
        let d_scores: Vec<f64> = cache
            .attention
            .iter()
            .zip(&d_attention)
            .map(|(a, d)| a * (d - weighted))
            .collect();

        for (i, &token) in tokens.iter().enumerate() {
            let e: Vec<f64> = model.embed[token * dim..(token + 1) * dim].to_vec();
            let h = &cache.hidden[i];
            let ds = d_scores[i];

            // de from the pooling term.
            let mut d_e: Vec<f64> = d_pooled.iter().map(|d| cache.attention[i] * d).collect();

            // Through the scoring MLP: s = u . tanh(W e + b).
            for r in 0..dim {
                d_attn_u[r] += ds * h[r];
                let d_pre = ds * model.attn_u[r] * (1.0 - h[r] * h[r]);
                d_attn_b[r] += d_pre;
                for c in 0..dim {
                    d_attn_w[r * dim + c] += d_pre * e[c];
                    d_e[c] += d_pre * model.attn_w[r * dim + c];
                }
            }

            for (c, &value) in d_e.iter().enumerate() {
                d_embed[token * dim + c] += value;
            }
        }
    }

    let scale = options.learning_rate / batch.len().max(1) as f64;
    let l2 = options.l2_penalty;
    apply(&mut model.embed, &d_embed, scale, l2);
    apply(&mut model.attn_w, &d_attn_w, scale, l2);
    apply(&mut model.attn_b, &d_attn_b, scale, 0.0);
    apply(&mut model.attn_u, &d_attn_u, scale, l2);
    apply(&mut model.head_w, &d_head_w, scale, l2);
    apply(&mut model.head_b, &d_head_b, scale, 0.0);

    loss
}

fn apply(weights: &mut [f64], gradients: &[f64], scale: f64, l2: f64) {
    for (w, g) in weights.iter_mut().zip(gradients) {
        *w -= scale * (g + l2 * *w);
    }
}

fn accuracy(
    model: &TransformerParameters,
    docs: &[Vec<usize>],
    targets: &[usize],
    rows: &[usize],
) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    let correct = rows
        .iter()
        .filter(|&&row| {
            let (probs, _) = forward(model, &docs[row]);
            probs
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(label, _)| label)
                == Some(targets[row])
        })
        .count();
    correct as f64 / rows.len() as f64
}

fn evaluate(
    model: &TransformerParameters,
    docs: &[Vec<usize>],
    targets: &[usize],
    rows: &[usize],
) -> (f64, f64) {
    if rows.is_empty() {
        return (0.0, 0.0);
    }
    let mut loss = 0.0;
    for &row in rows {
        let (probs, _) = forward(model, &docs[row]);
        loss -= probs[targets[row]].max(1e-12).ln();
    }
    (accuracy(model, docs, targets, rows), loss / rows.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::TrainingExample;

    fn app_commands() -> Dataset {
        let mut dataset = Dataset::new("application_commands");
        let examples = [
            ("open chrome", "open_app"),
            ("open firefox", "open_app"),
            ("open notepad", "open_app"),
            ("start chrome", "open_app"),
            ("open calculator", "open_app"),
            ("close chrome", "close_app"),
            ("close firefox", "close_app"),
            ("close notepad", "close_app"),
            ("quit chrome", "close_app"),
            ("close calculator", "close_app"),
        ];
        for (text, label) in examples {
            dataset
                .push(TrainingExample::new(text, label, 1.0).unwrap())
                .unwrap();
        }
        dataset
    }

    fn fast_options() -> TrainingOptions {
        TrainingOptions {
            epochs: 60,
            embed_dim: 8,
            batch_size: 4,
            learning_rate: 0.1,
            ..TrainingOptions::default()
        }
    }

    #[test]
    fn test_train_reports_validation_metrics() {
        let backend = TransformerBackend;
        let artifact = backend
            .train(&app_commands(), &fast_options(), &CancelToken::new())
            .unwrap();

        assert!(artifact.metrics.contains_key("train_accuracy"));
        assert!(artifact.metrics.contains_key("val_accuracy"));
        assert!(artifact.metrics.contains_key("val_loss"));
        assert!(artifact.metrics["val_loss"].is_finite());
    }

    #[test]
    fn test_predict_known_intent() {
        let backend = TransformerBackend;
        let artifact = backend
            .train(&app_commands(), &fast_options(), &CancelToken::new())
            .unwrap();
        let prediction = backend.predict("open chrome", &artifact).unwrap();
        assert_eq!(prediction.label, "open_app");
        assert!(prediction.confidence > 0.5);
    }

    #[test]
    fn test_same_seed_is_deterministic() {
        let backend = TransformerBackend;
        let options = fast_options();
        let a = backend
            .train(&app_commands(), &options, &CancelToken::new())
            .unwrap();
        let b = backend
            .train(&app_commands(), &options, &CancelToken::new())
            .unwrap();

        for probe in ["open chrome", "quit chrome", "play some jazz"] {
            let pa = backend.predict(probe, &a).unwrap();
            let pb = backend.predict(probe, &b).unwrap();
            assert_eq!(pa.label, pb.label);
            assert_eq!(pa.confidence, pb.confidence);
        }
    }

    #[test]
    fn test_cancel_between_epochs() {
        let backend = TransformerBackend;
        let token = CancelToken::new();
        token.cancel();
        assert!(matches!(
            backend.train(&app_commands(), &fast_options(), &token),
            Err(HeraldError::Cancelled(_))
        ));
    }

    #[test]
    fn test_out_of_vocabulary_text_still_predicts() {
        let backend = TransformerBackend;
        let artifact = backend
            .train(&app_commands(), &fast_options(), &CancelToken::new())
            .unwrap();
        let prediction = backend.predict("xyzzyqux", &artifact).unwrap();
        assert!(!prediction.label.is_empty());
        assert!((0.0..=1.0).contains(&prediction.confidence));
    }
}
