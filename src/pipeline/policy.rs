//! Confidence threshold policy.

use crate::pipeline::result::ClassificationResult;

/// Choose between a model result and the rule fallback.
///
/// Pure function: returns the model result when it exists and its confidence
/// reaches `threshold`, otherwise the rule result. The bound is closed —
/// equality favors the model — so the tie-break is documented and
/// deterministic rather than dependent on floating-point evaluation order.
pub fn decide(
    model_result: Option<&ClassificationResult>,
    rule_result: ClassificationResult,
    threshold: f64,
) -> ClassificationResult {
    match model_result {
        Some(model) if model.confidence >= threshold => model.clone(),
        _ => rule_result,
    }
}
