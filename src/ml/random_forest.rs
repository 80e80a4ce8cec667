//! Random forest backend.

use std::collections::BTreeMap;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::analysis::Tokenizer;
use crate::config::TrainingOptions;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::ml::CancelToken;
use crate::ml::artifact::ModelArtifact;
use crate::ml::backend::{
    ModelBackend, ModelType, Prediction, check_not_cancelled, check_trainable,
};
use crate::ml::tfidf::TfIdfVectorizer;

/// Learned state of one random forest training run.
#[derive(Debug, Serialize, Deserialize)]
struct RandomForestParameters {
    vectorizer: TfIdfVectorizer,
    labels: Vec<String>,
    trees: Vec<DecisionTree>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DecisionTree {
    /// Arena of nodes; the root is index 0.
    nodes: Vec<TreeNode>,
}

#[derive(Debug, Serialize, Deserialize)]
enum TreeNode {
    Leaf {
        /// Class distribution at the leaf, aligned with the label set.
        probabilities: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Bagged, depth-limited decision trees over TF-IDF features.
///
/// Each tree draws a bootstrap sample and considers a random subset of
/// features per split. Tree seeds are derived from the run seed by index, so
/// the forest is deterministic even though trees train in parallel.
/// Confidence is the fraction-weighted vote: the mean of per-tree leaf
/// distributions.
#[derive(Debug, Default)]
pub struct RandomForestBackend;

impl ModelBackend for RandomForestBackend {
    fn model_type(&self) -> ModelType {
        ModelType::RandomForest
    }

    fn train(
        &self,
        dataset: &Dataset,
        options: &TrainingOptions,
        cancel: &CancelToken,
    ) -> Result<ModelArtifact> {
        check_not_cancelled(cancel, self.model_type())?;
        check_trainable(dataset)?;

        let texts: Vec<String> = dataset.examples().iter().map(|e| e.text.clone()).collect();
        let mut vectorizer = TfIdfVectorizer::new(Tokenizer::default());
        vectorizer.fit(&texts);

        let mut labels = dataset.labels();
        labels.sort();

        let features: Vec<Vec<f64>> = texts.iter().map(|t| vectorizer.transform(t)).collect();
        let targets: Vec<usize> = dataset
            .examples()
            .iter()
            .map(|e| labels.iter().position(|l| l == &e.label).unwrap_or(0))
            .collect();

        let n_classes = labels.len();
        let n_trees = options.n_trees.max(1);
        let trees: Vec<DecisionTree> = (0..n_trees)
            .into_par_iter()
            .map(|tree_index| {
                let seed = options
                    .seed
                    .wrapping_add((tree_index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
                let mut rng = StdRng::seed_from_u64(seed);
                grow_tree(
                    &features,
                    &targets,
                    n_classes,
                    options.max_depth.max(1),
                    &mut rng,
                )
            })
            .collect();

        let parameters = RandomForestParameters {
            vectorizer,
            labels,
            trees,
        };

        let correct = dataset
            .examples()
            .iter()
            .filter(|example| predict_with(&example.text, &parameters).label == example.label)
            .count();

        let mut metrics = BTreeMap::new();
        metrics.insert(
            "train_accuracy".to_string(),
            correct as f64 / dataset.len() as f64,
        );
        metrics.insert("examples".to_string(), dataset.len() as f64);
        metrics.insert("trees".to_string(), n_trees as f64);

        Ok(ModelArtifact::draft(
            &dataset.name,
            self.model_type(),
            metrics,
            ModelArtifact::encode_parameters(&parameters)?,
        ))
    }

    fn predict(&self, text: &str, artifact: &ModelArtifact) -> Result<Prediction> {
        artifact.check_model_type(self.model_type())?;
        let parameters: RandomForestParameters = artifact.decode_parameters()?;
        Ok(predict_with(text, &parameters))
    }
}

/// Grow one tree on a bootstrap sample of the training rows.
fn grow_tree(
    features: &[Vec<f64>],
    targets: &[usize],
    n_classes: usize,
    max_depth: usize,
    rng: &mut StdRng,
) -> DecisionTree {
    let n = features.len();
    let sample: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
    let mut tree = DecisionTree { nodes: Vec::new() };
    grow_node(&mut tree, features, targets, n_classes, &sample, max_depth, rng);
    tree
}

fn grow_node(
    tree: &mut DecisionTree,
    features: &[Vec<f64>],
    targets: &[usize],
    n_classes: usize,
    rows: &[usize],
    depth_left: usize,
    rng: &mut StdRng,
) -> usize {
    let distribution = class_distribution(targets, rows, n_classes);
    let n_features = features.first().map_or(0, |f| f.len());

    let pure = distribution.iter().any(|&p| p == 1.0);
    if depth_left == 0 || rows.len() < 2 || pure || n_features == 0 {
        return push_leaf(tree, distribution);
    }

    let Some((feature, threshold)) =
        best_split(features, targets, n_classes, rows, n_features, rng)
    else {
        return push_leaf(tree, distribution);
    };

    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
        .iter()
        .partition(|&&row| features[row][feature] <= threshold);
    if left_rows.is_empty() || right_rows.is_empty() {
        return push_leaf(tree, distribution);
    }

    // Reserve the split slot before recursing so child indices are known.
    let index = tree.nodes.len();
    tree.nodes.push(TreeNode::Split {
        feature,
        threshold,
        left: 0,
        right: 0,
    });
    let left = grow_node(tree, features, targets, n_classes, &left_rows, depth_left - 1, rng);
    let right = grow_node(tree, features, targets, n_classes, &right_rows, depth_left - 1, rng);
    tree.nodes[index] = TreeNode::Split {
        feature,
        threshold,
        left,
        right,
    };
    index
}

fn push_leaf(tree: &mut DecisionTree, probabilities: Vec<f64>) -> usize {
    tree.nodes.push(TreeNode::Leaf { probabilities });
    tree.nodes.len() - 1
}

/// Pick the gini-optimal split among a random subset of features.
fn best_split(
    features: &[Vec<f64>],
    targets: &[usize],
    n_classes: usize,
    rows: &[usize],
    n_features: usize,
    rng: &mut StdRng,
) -> Option<(usize, f64)> {
    let k = (n_features as f64).sqrt().ceil() as usize;
    let mut candidates: Vec<usize> = (0..n_features).collect();
    candidates.shuffle(rng);
    candidates.truncate(k.max(1));

    let parent_gini = gini(&class_distribution(targets, rows, n_classes));
    let mut best: Option<(usize, f64, f64)> = None;

    for &feature in &candidates {
        let mut values: Vec<f64> = rows.iter().map(|&row| features[row][feature]).collect();
        values.sort_by(f64::total_cmp);
        values.dedup();
        for pair in values.windows(2) {
            let threshold = (pair[0] + pair[1]) / 2.0;
            let (left, right): (Vec<usize>, Vec<usize>) = rows
                .iter()
                .partition(|&&row| features[row][feature] <= threshold);
            if left.is_empty() || right.is_empty() {
                continue;
            }
            let weighted = (left.len() as f64 * gini(&class_distribution(targets, &left, n_classes))
                + right.len() as f64 * gini(&class_distribution(targets, &right, n_classes)))
                / rows.len() as f64;
            let gain = parent_gini - weighted;
            if gain > 1e-12 && best.is_none_or(|(_, _, g)| gain > g) {
                best = Some((feature, threshold, gain));
            }
        }
    }

    best.map(|(feature, threshold, _)| (feature, threshold))
}

fn class_distribution(targets: &[usize], rows: &[usize], n_classes: usize) -> Vec<f64> {
    let mut counts = vec![0.0; n_classes];
    for &row in rows {
        counts[targets[row]] += 1.0;
    }
    let total: f64 = counts.iter().sum();
    if total > 0.0 {
        for count in &mut counts {
            *count /= total;
        }
    }
    counts
}

fn gini(distribution: &[f64]) -> f64 {
    1.0 - distribution.iter().map(|p| p * p).sum::<f64>()
}

fn predict_with(text: &str, parameters: &RandomForestParameters) -> Prediction {
    let x = parameters.vectorizer.transform(text);
    let n_classes = parameters.labels.len();

    let mut votes = vec![0.0; n_classes];
    for tree in &parameters.trees {
        let leaf = walk(tree, &x);
        for (vote, p) in votes.iter_mut().zip(leaf) {
            *vote += p;
        }
    }
    let n_trees = parameters.trees.len().max(1) as f64;
    for vote in &mut votes {
        *vote /= n_trees;
    }

    let (best, &confidence) = votes
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .expect("labels are never empty after training");

    let raw_scores: BTreeMap<String, f64> = parameters
        .labels
        .iter()
        .cloned()
        .zip(votes.iter().copied())
        .collect();

    Prediction {
        label: parameters.labels[best].clone(),
        confidence,
        raw_scores,
    }
}

fn walk<'a>(tree: &'a DecisionTree, x: &[f64]) -> &'a [f64] {
    let mut index = 0;
    loop {
        match &tree.nodes[index] {
            TreeNode::Leaf { probabilities } => return probabilities,
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                index = if x.get(*feature).copied().unwrap_or(0.0) <= *threshold {
                    *left
                } else {
                    *right
                };
            }
        }
    }
}
