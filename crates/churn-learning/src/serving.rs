//! Read-only inference handle and risk policy.
//!
//! A [`ModelHandle`] is created empty and passed to whatever answers
//! prediction requests. One initialization step loads an artifact; until it
//! succeeds, predictions fail with a service-level error instead of
//! returning a default. Clones share the same state, and a loaded pipeline
//! is never mutated, so any number of threads can predict at once.

use crate::error::{LearningError, Result};
use crate::pipeline::FittedPipeline;
use churn_processing::schema::{NO, YES};
use churn_processing::CustomerRecord;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

/// How probabilities become labels and risk tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskPolicy {
    /// Probabilities strictly above this are high risk.
    pub threshold: f64,
    pub high_label: String,
    pub low_label: String,
    /// Probabilities at or above this are labelled as churn.
    pub decision_threshold: f64,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            threshold: 0.7,
            high_label: "Critical".to_string(),
            low_label: "Safe".to_string(),
            decision_threshold: 0.5,
        }
    }
}

impl RiskPolicy {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("threshold", self.threshold),
            ("decision_threshold", self.decision_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(LearningError::InvalidConfig(format!(
                    "{name} must be in [0.0, 1.0], got {value}"
                )));
            }
        }
        if self.high_label.trim().is_empty() || self.low_label.trim().is_empty() {
            return Err(LearningError::InvalidConfig(
                "risk labels must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn risk_level(&self, probability: f64) -> &str {
        if probability > self.threshold {
            &self.high_label
        } else {
            &self.low_label
        }
    }

    pub fn classify(&self, probability: f64) -> ChurnPrediction {
        let churn = probability >= self.decision_threshold;
        ChurnPrediction {
            churn_prediction: if churn { YES } else { NO }.to_string(),
            churn_probability: probability,
            risk_level: self.risk_level(probability).to_string(),
        }
    }
}

/// Answer for one customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChurnPrediction {
    /// `"Yes"` or `"No"`.
    pub churn_prediction: String,
    pub churn_probability: f64,
    pub risk_level: String,
}

#[derive(Debug, Clone, Default)]
enum HandleState {
    #[default]
    NotReady,
    Ready(Arc<FittedPipeline>),
    Unavailable(String),
}

/// Shared handle to the pipeline used for inference.
#[derive(Debug, Clone, Default)]
pub struct ModelHandle {
    state: Arc<RwLock<HandleState>>,
    policy: Arc<RiskPolicy>,
}

static_assertions::assert_impl_all!(ModelHandle: Send, Sync);

impl ModelHandle {
    /// An empty handle with the default policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty handle with a custom policy.
    pub fn with_policy(policy: RiskPolicy) -> Result<Self> {
        policy.validate()?;
        Ok(Self {
            state: Arc::default(),
            policy: Arc::new(policy),
        })
    }

    /// A ready handle around an in-memory pipeline.
    pub fn from_pipeline(pipeline: FittedPipeline, policy: RiskPolicy) -> Result<Self> {
        let handle = Self::with_policy(policy)?;
        *handle.state.write() = HandleState::Ready(Arc::new(pipeline));
        Ok(handle)
    }

    pub fn policy(&self) -> &RiskPolicy {
        &self.policy
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.state.read(), HandleState::Ready(_))
    }

    /// Load the artifact at `path`. On failure the handle becomes
    /// unavailable and the load error is returned.
    pub fn initialize_from_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let loaded = FittedPipeline::load(path);
        self.install(loaded, &path.display().to_string())
    }

    /// Load an artifact from memory.
    pub fn initialize_from_bytes(&self, bytes: &[u8]) -> Result<()> {
        self.install(FittedPipeline::from_bytes(bytes), "<bytes>")
    }

    fn install(&self, loaded: Result<FittedPipeline>, source: &str) -> Result<()> {
        let mut state = self.state.write();
        match loaded {
            Ok(pipeline) => {
                info!(
                    "Model ready from {} ({} features)",
                    source,
                    pipeline.feature_names().len()
                );
                *state = HandleState::Ready(Arc::new(pipeline));
                Ok(())
            }
            Err(e) => {
                error!("Model failed to load from {}: {}", source, e);
                *state = HandleState::Unavailable(e.to_string());
                Err(e)
            }
        }
    }

    /// The loaded pipeline.
    ///
    /// # Errors
    ///
    /// [`LearningError::ModelNotReady`] before initialization and
    /// [`LearningError::ModelUnavailable`] after a failed one.
    pub fn pipeline(&self) -> Result<Arc<FittedPipeline>> {
        match &*self.state.read() {
            HandleState::Ready(pipeline) => Ok(Arc::clone(pipeline)),
            HandleState::NotReady => Err(LearningError::ModelNotReady),
            HandleState::Unavailable(reason) => Err(LearningError::ModelUnavailable(reason.clone())),
        }
    }

    /// Validate `record` and predict its label, probability and risk tier.
    pub fn predict(&self, record: &CustomerRecord) -> Result<ChurnPrediction> {
        let pipeline = self.pipeline()?;
        let probability = pipeline.predict_record_proba(record)?;
        Ok(self.policy.classify(probability))
    }
}
