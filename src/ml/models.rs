use crate::config::TrainingSettings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Class names in label order (0, 1)
pub const CLASS_NAMES: [&str; 2] = ["no disease", "disease"];

/// Hyperparameters of the bagged tree ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of trees
    pub n_trees: usize,

    /// Maximum tree depth (unbounded when `None`)
    pub max_depth: Option<u16>,

    /// Minimum rows required to split a node
    pub min_samples_split: usize,

    /// Minimum rows in a leaf
    pub min_samples_leaf: usize,

    /// Tree `i` draws its bootstrap from `seed + i`
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: 42,
        }
    }
}

impl ForestConfig {
    pub fn hyperparameters(&self) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert("n_trees".to_string(), self.n_trees.to_string());
        params.insert(
            "max_depth".to_string(),
            self.max_depth
                .map(|d| d.to_string())
                .unwrap_or_else(|| "none".to_string()),
        );
        params.insert(
            "min_samples_split".to_string(),
            self.min_samples_split.to_string(),
        );
        params.insert(
            "min_samples_leaf".to_string(),
            self.min_samples_leaf.to_string(),
        );
        params.insert("criterion".to_string(), "gini".to_string());
        params.insert("seed".to_string(), self.seed.to_string());
        params
    }
}

/// Everything the offline pipeline needs besides the artifact store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub dataset_path: PathBuf,
    pub target_column: String,
    pub drop_columns: Vec<String>,
    /// Held-out proportion, in (0, 1)
    pub test_size: f64,
    /// Seed for the split; the forest carries its own copy
    pub seed: u64,
    pub forest: ForestConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self::from(&TrainingSettings::default())
    }
}

impl From<&TrainingSettings> for TrainingConfig {
    fn from(settings: &TrainingSettings) -> Self {
        Self {
            dataset_path: settings.dataset_path.clone(),
            target_column: settings.target_column.clone(),
            drop_columns: settings.drop_columns.clone(),
            test_size: settings.test_size,
            seed: settings.seed,
            forest: ForestConfig {
                n_trees: settings.n_trees,
                max_depth: settings.max_depth,
                min_samples_split: settings.min_samples_split,
                min_samples_leaf: settings.min_samples_leaf,
                seed: settings.seed,
            },
        }
    }
}

/// Per-class evaluation metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Model evaluation metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Accuracy
    pub accuracy: f64,

    /// Macro-averaged precision
    pub precision: f64,

    /// Macro-averaged recall
    pub recall: f64,

    /// Macro-averaged F1 score
    pub f1_score: f64,

    /// Rows are true labels, columns predicted labels
    pub confusion_matrix: [[usize; 2]; 2],

    /// Per-class metrics, indexed by label
    pub per_class_metrics: Vec<ClassMetrics>,
}

impl ModelMetrics {
    pub fn new() -> Self {
        Self {
            accuracy: 0.0,
            precision: 0.0,
            recall: 0.0,
            f1_score: 0.0,
            confusion_matrix: [[0; 2]; 2],
            per_class_metrics: Vec::new(),
        }
    }

    /// Number of evaluated rows
    pub fn support(&self) -> usize {
        self.confusion_matrix.iter().flatten().sum()
    }

    /// Support-weighted average of precision, recall and F1
    pub fn weighted_average(&self) -> (f64, f64, f64) {
        let total = self.support();
        if total == 0 {
            return (0.0, 0.0, 0.0);
        }
        let weighted = |f: fn(&ClassMetrics) -> f64| {
            self.per_class_metrics
                .iter()
                .map(|m| f(m) * m.support as f64)
                .sum::<f64>()
                / total as f64
        };
        (
            weighted(|m| m.precision),
            weighted(|m| m.recall),
            weighted(|m| m.f1_score),
        )
    }

    pub fn report(&self) -> ClassificationReport<'_> {
        ClassificationReport { metrics: self }
    }
}

impl Default for ModelMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Binary classification metrics over label 0 / 1
pub fn calculate_metrics(y_true: &[usize], y_pred: &[usize]) -> ModelMetrics {
    let n_samples = y_true.len().min(y_pred.len());
    if n_samples == 0 {
        return ModelMetrics::new();
    }

    let mut confusion = [[0usize; 2]; 2];
    for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
        if t < 2 && p < 2 {
            confusion[t][p] += 1;
        }
    }

    let correct = confusion[0][0] + confusion[1][1];
    let accuracy = correct as f64 / n_samples as f64;

    let per_class: Vec<ClassMetrics> = (0..2)
        .map(|class_idx| {
            let tp = confusion[class_idx][class_idx];
            let fp = confusion[1 - class_idx][class_idx];
            let fn_count = confusion[class_idx][1 - class_idx];

            let precision = if tp + fp > 0 {
                tp as f64 / (tp + fp) as f64
            } else {
                0.0
            };

            let recall = if tp + fn_count > 0 {
                tp as f64 / (tp + fn_count) as f64
            } else {
                0.0
            };

            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };

            ClassMetrics {
                precision,
                recall,
                f1_score: f1,
                support: tp + fn_count,
            }
        })
        .collect();

    let n_classes = per_class.len() as f64;
    let avg_precision = per_class.iter().map(|m| m.precision).sum::<f64>() / n_classes;
    let avg_recall = per_class.iter().map(|m| m.recall).sum::<f64>() / n_classes;
    let avg_f1 = per_class.iter().map(|m| m.f1_score).sum::<f64>() / n_classes;

    ModelMetrics {
        accuracy,
        precision: avg_precision,
        recall: avg_recall,
        f1_score: avg_f1,
        confusion_matrix: confusion,
        per_class_metrics: per_class,
    }
}

/// Text report in the familiar precision / recall / f1 / support layout
pub struct ClassificationReport<'a> {
    metrics: &'a ModelMetrics,
}

impl fmt::Display for ClassificationReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.metrics;
        let total = m.support();

        writeln!(
            f,
            "{:>14} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for (name, class) in CLASS_NAMES.iter().zip(m.per_class_metrics.iter()) {
            writeln!(
                f,
                "{:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, class.precision, class.recall, class.f1_score, class.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>14} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", m.accuracy, total
        )?;
        writeln!(
            f,
            "{:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}",
            "macro avg", m.precision, m.recall, m.f1_score, total
        )?;
        let (wp, wr, wf) = m.weighted_average();
        writeln!(
            f,
            "{:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}",
            "weighted avg", wp, wr, wf, total
        )?;
        writeln!(f)?;
        writeln!(f, "Confusion matrix (rows = true, cols = predicted):")?;
        writeln!(f, "  {:?}", m.confusion_matrix[0])?;
        write!(f, "  {:?}", m.confusion_matrix[1])
    }
}

/// Model type enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// Bagged decision trees with vote-fraction probabilities
    RandomForest,
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelType::RandomForest => write!(f, "Random Forest"),
        }
    }
}

/// Model metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Model name
    pub name: String,

    /// Crate version that produced the model
    pub version: String,

    /// Model type
    pub model_type: ModelType,

    /// Training timestamp
    pub trained_at: chrono::DateTime<chrono::Utc>,

    /// Number of training samples
    pub n_training_samples: usize,

    /// Feature names in column order
    pub feature_names: Vec<String>,

    /// Training metrics
    pub training_metrics: ModelMetrics,

    /// Held-out metrics
    pub validation_metrics: Option<ModelMetrics>,

    /// Hyperparameters
    pub hyperparameters: BTreeMap<String, String>,
}

impl ModelMetadata {
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }
}
