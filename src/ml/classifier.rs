use crate::error::{AppError, Result};
use crate::ml::features::Label;
use crate::ml::forest::RandomForest;
use crate::ml::models::ModelType;
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Probability of each outcome for one input
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassProbabilities {
    /// P(label = 0)
    pub no_delay: f64,

    /// P(label = 1)
    pub delay: f64,
}

impl ClassProbabilities {
    pub fn new(no_delay: f64, delay: f64) -> Self {
        Self { no_delay, delay }
    }

    /// Larger of the two class probabilities
    pub fn max(&self) -> f64 {
        self.no_delay.max(self.delay)
    }

    /// Most likely label; ties resolve to 0
    pub fn label(&self) -> Label {
        if self.delay > self.no_delay {
            1
        } else {
            0
        }
    }
}

/// Binary classification capability consumed by training evaluation and
/// the prediction service
pub trait ProbabilisticClassifier: Send + Sync {
    /// Class probabilities for one feature row
    fn classify_proba(&self, features: &[f64]) -> Result<ClassProbabilities>;

    /// Predicted label for one feature row
    fn classify(&self, features: &[f64]) -> Result<Label> {
        Ok(self.classify_proba(features)?.label())
    }

    /// Predicted labels for every row of a feature matrix
    fn classify_batch(&self, features: &Array2<f64>) -> Result<Vec<Label>> {
        features
            .rows()
            .into_iter()
            .map(|row| match row.as_slice() {
                Some(slice) => self.classify(slice),
                None => self.classify(&row.to_vec()),
            })
            .collect()
    }

    /// Get model type
    fn model_type(&self) -> ModelType;
}

impl ProbabilisticClassifier for RandomForest {
    fn classify_proba(&self, features: &[f64]) -> Result<ClassProbabilities> {
        let proba = self.predict_proba_row(ArrayView1::from(features))?;
        let probabilities = ClassProbabilities::new(proba[0], proba[1]);

        if !(probabilities.no_delay.is_finite() && probabilities.delay.is_finite()) {
            return Err(AppError::Prediction(
                "classifier produced non-finite probabilities".to_string(),
            ));
        }
        Ok(probabilities)
    }

    fn model_type(&self) -> ModelType {
        ModelType::RandomForestClassifier
    }
}
