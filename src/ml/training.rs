//! Offline training: clean, encode, split, scale, fit, evaluate, commit.
//!
//! Nothing reaches the artifact store until every step has succeeded.

use crate::artifacts::{ArtifactSet, ArtifactStore};
use crate::error::{AppError, Result};
use crate::ml::classifier::{Classifier, ForestClassifier};
use crate::ml::codec::{encode_dataset, PreprocessingCodec};
use crate::ml::dataset::{stratified_split, Cleaner, RawTable};
use crate::ml::encoder::CategoricalEncoder;
use crate::ml::models::{calculate_metrics, ModelMetrics, TrainingConfig};
use crate::ml::scaler::StandardScaler;
use crate::ml::schema::FeatureSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::info;
use uuid::Uuid;

/// Summary of one training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub run_id: Uuid,
    pub n_rows: usize,
    pub n_train: usize,
    pub n_test: usize,
    /// Share of rows labelled as disease after binarization
    pub positive_rate: f64,
    /// Learned category vocabularies, in code order
    pub categories: BTreeMap<String, Vec<String>>,
    pub training_metrics: ModelMetrics,
    /// Metrics on the held-out split
    pub test_metrics: ModelMetrics,
}

impl fmt::Display for TrainingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run: {}", self.run_id)?;
        writeln!(
            f,
            "Rows: {} (train {}, test {}), disease rate {:.3}",
            self.n_rows, self.n_train, self.n_test, self.positive_rate
        )?;
        writeln!(f, "Accuracy: {:.4}", self.test_metrics.accuracy)?;
        writeln!(f, "Classification Report:")?;
        write!(f, "{}", self.test_metrics.report())
    }
}

/// Fitted artifacts plus the report describing them
#[derive(Debug)]
pub struct TrainedModel {
    pub artifacts: ArtifactSet,
    pub report: TrainingReport,
}

pub struct TrainingPipeline {
    config: TrainingConfig,
    schema: FeatureSchema,
}

impl TrainingPipeline {
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            schema: FeatureSchema::heart_disease(),
        }
    }

    pub fn with_schema(mut self, schema: FeatureSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Fit every component in memory from a raw table
    pub fn fit(&self, raw: &RawTable) -> Result<TrainedModel> {
        info!(rows = raw.n_rows(), columns = raw.columns().len(), "📥 Training data loaded");

        let cleaner = Cleaner::new(
            self.schema.clone(),
            self.config.target_column.clone(),
            self.config.drop_columns.clone(),
        );
        let dataset = cleaner.clean(raw)?;
        let labels = dataset.binary_labels();
        let positives = labels.iter().filter(|&&l| l == 1).count();
        let positive_rate = positives as f64 / labels.len() as f64;
        info!(positives, negatives = labels.len() - positives, "🏷️ Target binarized");

        let encoder = CategoricalEncoder::fit(&self.schema, &dataset)?;
        info!(fields = encoder.mappings().count(), "🔤 Categorical mappings fitted");

        let split = stratified_split(&labels, self.config.test_size, self.config.seed)?;
        info!(train = split.train.len(), test = split.test.len(), "✂️ Stratified split");

        let x_train_raw = encode_dataset(&self.schema, &encoder, &dataset, &split.train)?;
        let x_test_raw = encode_dataset(&self.schema, &encoder, &dataset, &split.test)?;
        let y_train: Vec<usize> = split.train.iter().map(|&i| labels[i]).collect();
        let y_test: Vec<usize> = split.test.iter().map(|&i| labels[i]).collect();

        let names = self.schema.names();
        let scaler = StandardScaler::fit(&x_train_raw, &names)?;
        let x_train = scaler.transform(&x_train_raw)?;
        let x_test = scaler.transform(&x_test_raw)?;
        info!(columns = names.len(), "📏 Scaler fitted on training split");

        let classifier = ForestClassifier::fit(
            &x_train,
            &y_train,
            names.iter().map(|n| n.to_string()).collect(),
            self.config.forest.clone(),
        )?;

        let test_predictions = classifier.predict(&x_test)?;
        let test_metrics = calculate_metrics(&y_test, &test_predictions);
        info!(
            accuracy = %format!("{:.4}", test_metrics.accuracy),
            f1 = %format!("{:.4}", test_metrics.f1_score),
            "📊 Held-out evaluation"
        );

        let training_metrics = classifier.metadata().training_metrics.clone();
        let classifier = classifier.with_validation_metrics(test_metrics.clone());
        let codec = PreprocessingCodec::new(self.schema.clone(), encoder, scaler)?;

        let categories = codec
            .encoder()
            .mappings()
            .map(|m| (m.field().to_string(), m.classes().to_vec()))
            .collect();

        let artifacts = ArtifactSet::new(codec, classifier);
        let report = TrainingReport {
            run_id: artifacts.run_id,
            n_rows: dataset.n_rows(),
            n_train: y_train.len(),
            n_test: y_test.len(),
            positive_rate,
            categories,
            training_metrics,
            test_metrics,
        };

        Ok(TrainedModel { artifacts, report })
    }

    /// Load the configured dataset, fit, and commit the artifacts
    pub fn run(&self, store: &dyn ArtifactStore) -> Result<TrainingReport> {
        if !self.config.dataset_path.exists() {
            return Err(AppError::DataSource(format!(
                "Dataset {} not found",
                self.config.dataset_path.display()
            )));
        }
        let raw = RawTable::from_path(&self.config.dataset_path)?;
        self.run_on(&raw, store)
    }

    /// Fit on an already loaded table and commit the artifacts
    pub fn run_on(&self, raw: &RawTable, store: &dyn ArtifactStore) -> Result<TrainingReport> {
        let trained = self.fit(raw)?;
        let staged = trained.artifacts.stage()?;
        info!(bytes = staged.size(), keys = ?staged.keys(), "Artifacts staged");
        staged.commit(store)?;
        Ok(trained.report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::InMemoryArtifactStore;
    use crate::ml::models::ForestConfig;

    fn tiny_table() -> RawTable {
        let mut csv = String::from(
            "id,age,sex,dataset,cp,trestbps,chol,fbs,restecg,thalch,exang,oldpeak,slope,ca,thal,num\n",
        );
        for i in 0..40 {
            let sick = i % 2 == 1;
            csv.push_str(&format!(
                "{},{},{},Cleveland,{},{},{},{},{},{},{},{},{},{},{},{}\n",
                i,
                40 + i,
                if i % 3 == 0 { "Female" } else { "Male" },
                if sick { "asymptomatic" } else { "non-anginal" },
                120 + i,
                200 + 2 * i,
                if i % 5 == 0 { "TRUE" } else { "FALSE" },
                if i % 4 == 0 { "lv hypertrophy" } else { "normal" },
                if sick { 120 + i } else { 170 - i },
                if sick { "TRUE" } else { "FALSE" },
                if sick { 2.0 } else { 0.5 },
                if sick { "flat" } else { "upsloping" },
                if sick { i % 4 } else { 0 },
                if sick { "reversable defect" } else { "normal" },
                if sick { 1 + i % 3 } else { 0 },
            ));
        }
        RawTable::from_reader(csv.as_bytes()).unwrap()
    }

    fn pipeline() -> TrainingPipeline {
        TrainingPipeline::new(TrainingConfig {
            forest: ForestConfig {
                n_trees: 10,
                ..ForestConfig::default()
            },
            ..TrainingConfig::default()
        })
    }

    #[test]
    fn test_fit_produces_consistent_artifacts() {
        let trained = pipeline().fit(&tiny_table()).unwrap();
        let report = &trained.report;

        assert_eq!(report.n_rows, 40);
        assert_eq!(report.n_train + report.n_test, 40);
        assert_eq!(report.n_test, 8);
        assert!((report.positive_rate - 0.5).abs() < 1e-12);
        assert_eq!(
            report.categories["slope"],
            vec!["flat".to_string(), "upsloping".to_string()]
        );
        assert_eq!(trained.artifacts.classifier.n_features(), 13);
        assert!(report.to_string().contains("Accuracy:"));
    }

    #[test]
    fn test_run_commits_three_artifacts() {
        let store = InMemoryArtifactStore::new();
        let report = pipeline().run_on(&tiny_table(), &store).unwrap();
        assert_eq!(store.len(), 3);

        let loaded = ArtifactSet::load(&store, &FeatureSchema::heart_disease()).unwrap();
        assert_eq!(loaded.run_id, report.run_id);
    }

    #[test]
    fn test_failed_fit_commits_nothing() {
        let csv = "age,sex,cp,trestbps,chol,fbs,restecg,thalch,exang,oldpeak,slope,ca,thal\n\
                   63,Male,asymptomatic,145,233,TRUE,normal,150,FALSE,2.3,flat,0,normal\n";
        let raw = RawTable::from_reader(csv.as_bytes()).unwrap();
        let store = InMemoryArtifactStore::new();
        assert!(matches!(
            pipeline().run_on(&raw, &store),
            Err(AppError::Data(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_zero_variance_column_is_fit_error() {
        let mut csv = String::from(
            "age,sex,cp,trestbps,chol,fbs,restecg,thalch,exang,oldpeak,slope,ca,thal,num\n",
        );
        for i in 0..20 {
            let sick = i % 2 == 1;
            csv.push_str(&format!(
                "{},Male,asymptomatic,130,{},FALSE,normal,150,FALSE,1.0,flat,{},normal,{}\n",
                40 + i,
                200 + i,
                i % 3,
                u8::from(sick),
            ));
        }
        let raw = RawTable::from_reader(csv.as_bytes()).unwrap();
        let store = InMemoryArtifactStore::new();
        assert!(matches!(
            pipeline().run_on(&raw, &store),
            Err(AppError::Fit(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_missing_dataset_is_data_source_error() {
        let pipeline = TrainingPipeline::new(TrainingConfig {
            dataset_path: "/nonexistent/heart.csv".into(),
            ..TrainingConfig::default()
        });
        let store = InMemoryArtifactStore::new();
        assert!(matches!(pipeline.run(&store), Err(AppError::DataSource(_))));
    }
}
