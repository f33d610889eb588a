use crate::error::{AppError, Result};
use crate::ml::models::{calculate_metrics, ForestConfig, ModelMetadata, ModelMetrics, ModelType};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_classifier::{
    DecisionTreeClassifier, DecisionTreeClassifierParameters, SplitCriterion,
};
use tracing::{debug, info};

/// Bootstrap redraws allowed per tree before giving up on a single-class sample
const MAX_BOOTSTRAP_ATTEMPTS: usize = 32;

/// Probability above which a row is labelled as disease
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Trait for fitted binary classifiers.
///
/// Implementations are immutable once built, so a shared reference can serve
/// concurrent predictions.
pub trait Classifier: Send + Sync {
    /// Per-row probabilities; column 0 is "no disease", column 1 is "disease"
    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>>;

    /// Class labels, 1 iff the disease probability exceeds [`DECISION_THRESHOLD`]
    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>> {
        let proba = self.predict_proba(features)?;
        Ok(proba
            .rows()
            .into_iter()
            .map(|row| usize::from(row[1] > DECISION_THRESHOLD))
            .collect())
    }

    /// Get model metadata
    fn metadata(&self) -> &ModelMetadata;

    /// Get model type
    fn model_type(&self) -> ModelType;

    /// Width of the feature matrix the model was fitted on
    fn n_features(&self) -> usize {
        self.metadata().n_features()
    }
}

type Tree = DecisionTreeClassifier<f64, i32, DenseMatrix<f64>, Vec<i32>>;

fn to_dense_matrix(arr: &Array2<f64>) -> DenseMatrix<f64> {
    let shape = arr.shape();
    let data: Vec<f64> = arr.iter().copied().collect();
    DenseMatrix::new(shape[0], shape[1], data, false)
}

/// Bagged ensemble of Gini decision trees.
///
/// The disease probability of a row is the fraction of trees voting for it.
#[derive(Serialize, Deserialize)]
pub struct ForestClassifier {
    /// Model metadata
    metadata: ModelMetadata,

    /// Hyperparameters used for the fit
    config: ForestConfig,

    /// Fitted trees
    trees: Vec<Tree>,
}

impl std::fmt::Debug for ForestClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForestClassifier")
            .field("metadata", &self.metadata)
            .field("config", &self.config)
            .field("n_trees", &self.trees.len())
            .finish()
    }
}

impl ForestClassifier {
    /// Fit the ensemble on a scaled feature matrix and 0/1 labels
    pub fn fit(
        features: &Array2<f64>,
        labels: &[usize],
        feature_names: Vec<String>,
        config: ForestConfig,
    ) -> Result<Self> {
        let (n_samples, n_features) = features.dim();
        if n_samples == 0 {
            return Err(AppError::Fit("Cannot fit on zero rows".to_string()));
        }
        if labels.len() != n_samples {
            return Err(AppError::Fit(format!(
                "{} labels for {} rows",
                labels.len(),
                n_samples
            )));
        }
        if feature_names.len() != n_features {
            return Err(AppError::Fit(format!(
                "{} feature names for {} columns",
                feature_names.len(),
                n_features
            )));
        }
        if config.n_trees == 0 {
            return Err(AppError::Fit("Forest needs at least one tree".to_string()));
        }
        if labels.iter().any(|&l| l > 1) {
            return Err(AppError::Fit("Labels must be 0 or 1".to_string()));
        }
        if !(labels.contains(&0) && labels.contains(&1)) {
            return Err(AppError::Fit(
                "Training split contains a single class".to_string(),
            ));
        }

        info!(
            n_trees = config.n_trees,
            n_samples, n_features, "🌲 Fitting forest classifier"
        );

        let mut trees = Vec::with_capacity(config.n_trees);
        for i in 0..config.n_trees {
            let tree_seed = config.seed.wrapping_add(i as u64);
            trees.push(Self::fit_tree(features, labels, &config, tree_seed)?);
        }

        let mut classifier = Self {
            metadata: ModelMetadata {
                name: "Heart Disease Forest".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                model_type: ModelType::RandomForest,
                trained_at: chrono::Utc::now(),
                n_training_samples: n_samples,
                feature_names,
                training_metrics: ModelMetrics::new(),
                validation_metrics: None,
                hyperparameters: config.hyperparameters(),
            },
            config,
            trees,
        };

        let predictions = classifier.predict(features)?;
        classifier.metadata.training_metrics = calculate_metrics(labels, &predictions);

        info!(
            accuracy = classifier.metadata.training_metrics.accuracy,
            "✅ Forest fitted"
        );

        Ok(classifier)
    }

    fn fit_tree(
        features: &Array2<f64>,
        labels: &[usize],
        config: &ForestConfig,
        tree_seed: u64,
    ) -> Result<Tree> {
        let n_samples = labels.len();
        let mut rng = StdRng::seed_from_u64(tree_seed);

        let mut sample = Vec::with_capacity(n_samples);
        let mut attempts = 0;
        loop {
            attempts += 1;
            sample.clear();
            sample.extend((0..n_samples).map(|_| rng.gen_range(0..n_samples)));

            let first = labels[sample[0]];
            if sample.iter().any(|&i| labels[i] != first) {
                break;
            }
            if attempts >= MAX_BOOTSTRAP_ATTEMPTS {
                return Err(AppError::Fit(format!(
                    "Bootstrap for seed {} drew a single class {} times",
                    tree_seed, attempts
                )));
            }
            debug!(tree_seed, attempts, "Redrawing single-class bootstrap");
        }

        let n_features = features.ncols();
        let mut data = Vec::with_capacity(n_samples * n_features);
        for &i in &sample {
            data.extend(features.row(i).iter().copied());
        }
        let x = DenseMatrix::new(n_samples, n_features, data, false);
        let y: Vec<i32> = sample.iter().map(|&i| labels[i] as i32).collect();

        let mut params = DecisionTreeClassifierParameters::default()
            .with_criterion(SplitCriterion::Gini)
            .with_min_samples_split(config.min_samples_split)
            .with_min_samples_leaf(config.min_samples_leaf);
        if let Some(depth) = config.max_depth {
            params = params.with_max_depth(depth);
        }
        params.seed = Some(tree_seed);

        DecisionTreeClassifier::fit(&x, &y, params)
            .map_err(|e| AppError::Fit(format!("Failed to train decision tree: {}", e)))
    }

    /// Attach held-out metrics to the metadata
    pub fn with_validation_metrics(mut self, metrics: ModelMetrics) -> Self {
        self.metadata.validation_metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for ForestClassifier {
    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        if features.ncols() != self.n_features() {
            return Err(AppError::Internal(format!(
                "Model expects {} features, got {}",
                self.n_features(),
                features.ncols()
            )));
        }

        let n_samples = features.nrows();
        let x = to_dense_matrix(features);
        let mut votes = Array1::<f64>::zeros(n_samples);

        for tree in &self.trees {
            let predictions = tree
                .predict(&x)
                .map_err(|e| AppError::Internal(format!("Prediction failed: {}", e)))?;
            for (vote, &label) in votes.iter_mut().zip(predictions.iter()) {
                if label == 1 {
                    *vote += 1.0;
                }
            }
        }

        let n_trees = self.trees.len() as f64;
        let mut proba = Array2::zeros((n_samples, 2));
        for (i, &vote) in votes.iter().enumerate() {
            let p1 = vote / n_trees;
            proba[[i, 0]] = 1.0 - p1;
            proba[[i, 1]] = p1;
        }

        Ok(proba)
    }

    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn model_type(&self) -> ModelType {
        ModelType::RandomForest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two separable blobs with a little overlap
    fn create_test_dataset(n_samples: usize) -> (Array2<f64>, Vec<usize>) {
        let mut rng = StdRng::seed_from_u64(7);
        let mut data = Vec::with_capacity(n_samples * 3);
        let mut labels = Vec::with_capacity(n_samples);
        for i in 0..n_samples {
            let label = i % 2;
            let center = if label == 1 { 1.0 } else { -1.0 };
            data.push(center + rng.gen_range(-0.8..0.8));
            data.push(center * 0.5 + rng.gen_range(-1.0..1.0));
            data.push(rng.gen_range(-1.0..1.0));
            labels.push(label);
        }
        (
            Array2::from_shape_vec((n_samples, 3), data).unwrap(),
            labels,
        )
    }

    fn names() -> Vec<String> {
        vec!["a".to_string(), "b".to_string(), "c".to_string()]
    }

    fn small_config() -> ForestConfig {
        ForestConfig {
            n_trees: 15,
            ..ForestConfig::default()
        }
    }

    #[test]
    fn test_forest_fits_and_predicts() {
        let (x, y) = create_test_dataset(120);
        let forest = ForestClassifier::fit(&x, &y, names(), small_config()).unwrap();

        assert_eq!(forest.n_trees(), 15);
        assert_eq!(forest.n_features(), 3);
        assert!(forest.metadata().training_metrics.accuracy > 0.9);

        let proba = forest.predict_proba(&x).unwrap();
        assert_eq!(proba.dim(), (120, 2));
        for row in proba.rows() {
            assert!((row[0] + row[1] - 1.0).abs() < 1e-12);
            assert!((0.0..=1.0).contains(&row[1]));
        }
    }

    #[test]
    fn test_labels_agree_with_probabilities() {
        let (x, y) = create_test_dataset(80);
        let forest = ForestClassifier::fit(&x, &y, names(), small_config()).unwrap();
        let proba = forest.predict_proba(&x).unwrap();
        let labels = forest.predict(&x).unwrap();
        for (row, label) in proba.rows().into_iter().zip(labels) {
            assert_eq!(label == 1, row[1] > 0.5);
        }
    }

    #[test]
    fn test_same_seed_same_model() {
        let (x, y) = create_test_dataset(80);
        let a = ForestClassifier::fit(&x, &y, names(), small_config()).unwrap();
        let b = ForestClassifier::fit(&x, &y, names(), small_config()).unwrap();
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_single_class_is_fit_error() {
        let (x, _) = create_test_dataset(20);
        let y = vec![1; 20];
        assert!(matches!(
            ForestClassifier::fit(&x, &y, names(), small_config()),
            Err(AppError::Fit(_))
        ));
    }

    #[test]
    fn test_feature_width_is_checked() {
        let (x, y) = create_test_dataset(40);
        let forest = ForestClassifier::fit(&x, &y, names(), small_config()).unwrap();
        let narrow = Array2::<f64>::zeros((1, 2));
        assert!(forest.predict_proba(&narrow).is_err());
    }

    #[test]
    fn test_serde_round_trip_preserves_predictions() {
        let (x, y) = create_test_dataset(60);
        let forest = ForestClassifier::fit(&x, &y, names(), small_config()).unwrap();
        let bytes = bincode::serialize(&forest).unwrap();
        let restored: ForestClassifier = bincode::deserialize(&bytes).unwrap();
        assert_eq!(
            forest.predict_proba(&x).unwrap(),
            restored.predict_proba(&x).unwrap()
        );
        assert_eq!(forest.metadata(), restored.metadata());
    }
}
