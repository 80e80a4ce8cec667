//! The request-time classification pipeline.
//!
//! Raw text flows one direction: through the intent classifier (and, in
//! parallel, the rule matcher), into the confidence threshold policy, and
//! out of the command processor as a structured [`Decision`].

pub mod intent;
pub mod policy;
pub mod processor;
pub mod result;
pub mod rules;

pub use intent::IntentClassifier;
pub use policy::decide;
pub use processor::CommandProcessor;
pub use result::{ClassificationResult, Decision, ResultSource, UNKNOWN_LABEL};
pub use rules::{Rule, RuleMatcher};
