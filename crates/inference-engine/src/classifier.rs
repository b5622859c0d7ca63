//! Classifier Interface and Voting Ensemble

use crate::InferenceError;
use koi_record::Disposition;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A trained binary classifier over schema-ordered feature rows
pub trait Classifier: Send + Sync {
    /// Width of the rows the classifier accepts
    fn n_features(&self) -> usize;

    /// Hard label per row
    fn predict_labels(&self, batch: &[Vec<f64>]) -> Result<Vec<Disposition>, InferenceError>;

    /// `[P(CANDIDATE), P(CONFIRMED)]` per row
    fn predict_proba(&self, batch: &[Vec<f64>]) -> Result<Vec<[f64; 2]>, InferenceError>;
}

/// Node of a binary decision tree, children addressed by index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    /// Go left when `x[feature] <= threshold`
    Split {
        feature: usize,
        threshold: f64,
        left: u32,
        right: u32,
    },
    Leaf {
        /// Fraction of CONFIRMED training samples in the leaf
        p_confirmed: f64,
    },
}

/// Decision tree stored as a flat node list rooted at index 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
}

impl DecisionTree {
    /// Build a tree; children must come after their parent so every walk
    /// terminates
    pub fn new(nodes: Vec<TreeNode>) -> Result<Self, InferenceError> {
        let tree = Self { nodes };
        tree.check(usize::MAX)?;
        Ok(tree)
    }

    fn check(&self, n_features: usize) -> Result<(), InferenceError> {
        if self.nodes.is_empty() {
            return Err(InferenceError::DataUnavailable("empty decision tree".to_string()));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let (left, right) = (*left as usize, *right as usize);
                    if *feature >= n_features || !threshold.is_finite() {
                        return Err(InferenceError::DataUnavailable(format!(
                            "tree node {} splits on invalid feature {}",
                            i, feature
                        )));
                    }
                    let len = self.nodes.len();
                    if left <= i || right <= i || left >= len || right >= len {
                        return Err(InferenceError::DataUnavailable(format!(
                            "tree node {} has invalid children",
                            i
                        )));
                    }
                }
                TreeNode::Leaf { p_confirmed } => {
                    if !(0.0..=1.0).contains(p_confirmed) {
                        return Err(InferenceError::DataUnavailable(format!(
                            "tree leaf {} has probability {}",
                            i, p_confirmed
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn p_confirmed(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { p_confirmed } => return *p_confirmed,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left as usize
                    } else {
                        *right as usize
                    };
                }
            }
        }
    }
}

/// Ensemble member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Member {
    /// `sigmoid(w·x + b)`
    Logistic { coefficients: Vec<f64>, intercept: f64 },
    Tree(DecisionTree),
}

impl Member {
    fn p_confirmed(&self, row: &[f64]) -> f64 {
        match self {
            Member::Logistic {
                coefficients,
                intercept,
            } => {
                let dot: f64 = coefficients.iter().zip(row).map(|(w, x)| w * x).sum();
                let z = dot + intercept;
                1.0 / (1.0 + (-z).exp())
            }
            Member::Tree(tree) => tree.p_confirmed(row),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct WeightedMember {
    weight: f64,
    member: Member,
}

/// Soft-voting ensemble: the weighted mean of member probabilities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VotingEnsemble {
    n_features: usize,
    members: Vec<WeightedMember>,
}

impl VotingEnsemble {
    pub fn new(n_features: usize, members: Vec<(f64, Member)>) -> Result<Self, InferenceError> {
        let ensemble = Self {
            n_features,
            members: members
                .into_iter()
                .map(|(weight, member)| WeightedMember { weight, member })
                .collect(),
        };
        ensemble.check()?;
        Ok(ensemble)
    }

    fn check(&self) -> Result<(), InferenceError> {
        if self.members.is_empty() {
            return Err(InferenceError::DataUnavailable("ensemble has no members".to_string()));
        }
        for m in &self.members {
            if !(m.weight.is_finite() && m.weight > 0.0) {
                return Err(InferenceError::DataUnavailable(format!(
                    "member weight {} is not positive",
                    m.weight
                )));
            }
            match &m.member {
                Member::Logistic {
                    coefficients,
                    intercept,
                } => {
                    if coefficients.len() != self.n_features || !intercept.is_finite() {
                        return Err(InferenceError::DataUnavailable(format!(
                            "logistic member has {} coefficients for {} features",
                            coefficients.len(),
                            self.n_features
                        )));
                    }
                }
                Member::Tree(tree) => tree.check(self.n_features)?,
            }
        }
        Ok(())
    }

    /// Decode the classifier blob of a model artifact
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, InferenceError> {
        let ensemble: Self = postcard::from_bytes(bytes)
            .map_err(|e| InferenceError::DataUnavailable(format!("corrupt classifier: {}", e)))?;
        ensemble.check()?;
        debug!(
            "Decoded voting ensemble: {} members over {} features",
            ensemble.members.len(),
            ensemble.n_features
        );
        Ok(ensemble)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, InferenceError> {
        postcard::to_allocvec(self)
            .map_err(|e| {
                InferenceError::InferenceFailed(format!("classifier encoding failed: {}", e))
            })
    }

    fn p_confirmed(&self, row: &[f64]) -> f64 {
        let total: f64 = self.members.iter().map(|m| m.weight).sum();
        self.members
            .iter()
            .map(|m| m.weight * m.member.p_confirmed(row))
            .sum::<f64>()
            / total
    }

    fn check_batch(&self, batch: &[Vec<f64>]) -> Result<(), InferenceError> {
        match batch.iter().find(|row| row.len() != self.n_features) {
            Some(row) => Err(InferenceError::InvalidInputShape {
                expected: self.n_features,
                actual: row.len(),
            }),
            None => Ok(()),
        }
    }
}

impl Classifier for VotingEnsemble {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_labels(&self, batch: &[Vec<f64>]) -> Result<Vec<Disposition>, InferenceError> {
        self.check_batch(batch)?;
        Ok(batch
            .iter()
            .map(|row| {
                // ties go to the first class, as with argmax
                if self.p_confirmed(row) > 0.5 {
                    Disposition::Confirmed
                } else {
                    Disposition::Candidate
                }
            })
            .collect())
    }

    fn predict_proba(&self, batch: &[Vec<f64>]) -> Result<Vec<[f64; 2]>, InferenceError> {
        self.check_batch(batch)?;
        Ok(batch
            .iter()
            .map(|row| {
                let p = self.p_confirmed(row);
                [1.0 - p, p]
            })
            .collect())
    }
}
