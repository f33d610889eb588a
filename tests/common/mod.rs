//! Common test utilities
//!
//! Deterministic heart-disease-shaped datasets and sample patients shared by
//! the integration tests.

#![allow(dead_code)]

use heart_risk::ml::{ForestConfig, TrainingConfig};
use heart_risk::models::{FlagInput, PatientInput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};

pub const HEADER: &str =
    "id,age,sex,dataset,cp,trestbps,chol,fbs,restecg,thalch,exang,oldpeak,slope,ca,thal,num";

const CP: [&str; 4] = ["typical angina", "atypical angina", "non-anginal", "asymptomatic"];
const RESTECG: [&str; 3] = ["normal", "st-t abnormality", "lv hypertrophy"];
const SLOPE: [&str; 3] = ["upsloping", "flat", "downsloping"];
const THAL: [&str; 3] = ["normal", "fixed defect", "reversable defect"];
const SITES: [&str; 4] = ["Cleveland", "Hungary", "Switzerland", "VA Long Beach"];

fn maybe_missing(rng: &mut StdRng, value: String, rate: f64) -> String {
    if rng.gen_bool(rate) {
        ["", "NA", "?"][rng.gen_range(0..3)].to_string()
    } else {
        value
    }
}

/// Build a CSV with `n_rows` rows, some missing cells and a learnable target.
///
/// The first rows cycle through every category so each vocabulary is complete.
pub fn synthetic_csv(n_rows: usize, seed: u64) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut csv = String::from(HEADER);
    csv.push('\n');

    for i in 0..n_rows {
        let sick = rng.gen_bool(0.45);
        let forced = i < 12;

        let age: u32 = if sick { rng.gen_range(45..78) } else { rng.gen_range(29..65) };
        let sex = if forced {
            ["Male", "Female"][i % 2]
        } else if rng.gen_bool(if sick { 0.85 } else { 0.6 }) {
            "Male"
        } else {
            "Female"
        };
        let cp = if forced {
            CP[i % 4]
        } else if sick && rng.gen_bool(0.7) {
            "asymptomatic"
        } else {
            CP[rng.gen_range(0..4)]
        };
        let trestbps: u32 = rng.gen_range(100..180) + if sick { 10 } else { 0 };
        let chol: u32 = rng.gen_range(160..330);
        let fbs = if forced {
            ["TRUE", "FALSE"][i % 2]
        } else if rng.gen_bool(0.15) {
            "TRUE"
        } else {
            "FALSE"
        };
        let restecg = if forced { RESTECG[i % 3] } else { RESTECG[rng.gen_range(0..3)] };
        let thalch: u32 = if sick { rng.gen_range(95..160) } else { rng.gen_range(130..200) };
        let exang = if forced {
            ["TRUE", "FALSE"][(i / 2) % 2]
        } else if rng.gen_bool(if sick { 0.6 } else { 0.15 }) {
            "TRUE"
        } else {
            "FALSE"
        };
        let oldpeak: f64 = if sick { rng.gen_range(0.5..4.0) } else { rng.gen_range(0.0..1.5) };
        let slope = if forced {
            SLOPE[i % 3]
        } else if sick {
            SLOPE[rng.gen_range(1..3)]
        } else {
            SLOPE[rng.gen_range(0..2)]
        };
        let ca: u32 = if sick { rng.gen_range(0..4) } else { rng.gen_range(0..2) };
        let thal = if forced {
            THAL[i % 3]
        } else if sick && rng.gen_bool(0.6) {
            "reversable defect"
        } else {
            THAL[rng.gen_range(0..3)]
        };
        let num: u32 = if sick { rng.gen_range(1..5) } else { 0 };

        let trestbps = maybe_missing(&mut rng, trestbps.to_string(), 0.05);
        let chol = maybe_missing(&mut rng, chol.to_string(), 0.05);
        let ca = maybe_missing(&mut rng, ca.to_string(), 0.1);
        let fbs = if forced { fbs.to_string() } else { maybe_missing(&mut rng, fbs.to_string(), 0.05) };
        let slope = if forced { slope.to_string() } else { maybe_missing(&mut rng, slope.to_string(), 0.1) };
        let thal = if forced { thal.to_string() } else { maybe_missing(&mut rng, thal.to_string(), 0.1) };

        csv.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{},{},{:.1},{},{},{},{}\n",
            i + 1,
            age,
            sex,
            SITES[i % SITES.len()],
            cp,
            trestbps,
            chol,
            fbs,
            restecg,
            thalch,
            exang,
            oldpeak,
            slope,
            ca,
            thal,
            num
        ));
    }

    csv
}

/// Write a synthetic dataset to `dir/heart.csv`
pub fn write_dataset(dir: &Path, n_rows: usize, seed: u64) -> PathBuf {
    let path = dir.join("heart.csv");
    std::fs::write(&path, synthetic_csv(n_rows, seed)).unwrap();
    path
}

/// Small forest so integration tests stay fast
pub fn training_config(dataset_path: PathBuf) -> TrainingConfig {
    TrainingConfig {
        dataset_path,
        forest: ForestConfig {
            n_trees: 25,
            ..ForestConfig::default()
        },
        ..TrainingConfig::default()
    }
}

/// A complete, valid patient
pub fn sample_patient() -> PatientInput {
    PatientInput {
        age: Some(63),
        sex: Some("Male".to_string()),
        cp: Some("typical angina".to_string()),
        trestbps: Some(145),
        chol: Some(233),
        fbs: Some(FlagInput::Bool(true)),
        restecg: Some("lv hypertrophy".to_string()),
        thalch: Some(150),
        exang: Some(FlagInput::Bool(false)),
        oldpeak: Some(2.3),
        slope: Some("downsloping".to_string()),
        ca: Some(0),
        thal: Some("fixed defect".to_string()),
    }
}

/// A patient with the strongest disease indicators
pub fn high_risk_patient() -> PatientInput {
    PatientInput {
        age: Some(70),
        sex: Some("Male".to_string()),
        cp: Some("asymptomatic".to_string()),
        trestbps: Some(170),
        chol: Some(300),
        fbs: Some(FlagInput::Bool(false)),
        restecg: Some("normal".to_string()),
        thalch: Some(100),
        exang: Some(FlagInput::Bool(true)),
        oldpeak: Some(3.5),
        slope: Some("flat".to_string()),
        ca: Some(3),
        thal: Some("reversable defect".to_string()),
    }
}
