use crate::error::{AppError, Result};
use crate::ml::schema::{FeatureRow, FeatureValue};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Category spelling of a boolean field, as it appears in the training data
pub fn flag_category(flag: bool) -> &'static str {
    if flag {
        "True"
    } else {
        "False"
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, EnumIter, IntoStaticStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Sex {
    #[strum(serialize = "Male")]
    Male,
    #[strum(serialize = "Female")]
    Female,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, EnumIter, IntoStaticStr,
)]
#[strum(ascii_case_insensitive)]
pub enum ChestPainType {
    #[strum(serialize = "typical angina")]
    #[serde(rename = "typical angina")]
    TypicalAngina,
    #[strum(serialize = "atypical angina")]
    #[serde(rename = "atypical angina")]
    AtypicalAngina,
    #[strum(serialize = "non-anginal")]
    #[serde(rename = "non-anginal")]
    NonAnginal,
    #[strum(serialize = "asymptomatic")]
    #[serde(rename = "asymptomatic")]
    Asymptomatic,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, EnumIter, IntoStaticStr,
)]
#[strum(ascii_case_insensitive)]
pub enum RestingEcg {
    #[strum(serialize = "normal")]
    #[serde(rename = "normal")]
    Normal,
    #[strum(serialize = "st-t abnormality")]
    #[serde(rename = "st-t abnormality")]
    StTAbnormality,
    #[strum(serialize = "lv hypertrophy")]
    #[serde(rename = "lv hypertrophy")]
    LvHypertrophy,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, EnumIter, IntoStaticStr,
)]
#[strum(ascii_case_insensitive)]
pub enum StSlope {
    #[strum(serialize = "upsloping")]
    #[serde(rename = "upsloping")]
    Upsloping,
    #[strum(serialize = "flat")]
    #[serde(rename = "flat")]
    Flat,
    #[strum(serialize = "downsloping")]
    #[serde(rename = "downsloping")]
    Downsloping,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, EnumIter, IntoStaticStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Thalassemia {
    #[strum(serialize = "normal")]
    #[serde(rename = "normal")]
    Normal,
    #[strum(serialize = "fixed defect")]
    #[serde(rename = "fixed defect")]
    FixedDefect,
    #[strum(serialize = "reversable defect")]
    #[serde(rename = "reversable defect")]
    ReversableDefect,
}

/// Allowed spellings of a categorical enum, in declaration order
pub fn allowed_values<T>() -> Vec<&'static str>
where
    T: IntoEnumIterator + Into<&'static str>,
{
    T::iter().map(Into::into).collect()
}

/// Validated patient attributes, one field per model feature.
///
/// Field names match the training columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub age: u32,
    pub sex: Sex,
    pub cp: ChestPainType,
    pub trestbps: u32,
    pub chol: u32,
    pub fbs: bool,
    pub restecg: RestingEcg,
    pub thalch: u32,
    pub exang: bool,
    pub oldpeak: f64,
    pub slope: StSlope,
    pub ca: u8,
    pub thal: Thalassemia,
}

/// Advisory input ranges; values outside are flagged, not rejected
pub const ADVISORY_RANGES: [(&str, f64, f64); 6] = [
    ("age", 20.0, 100.0),
    ("trestbps", 90.0, 200.0),
    ("chol", 100.0, 600.0),
    ("thalch", 60.0, 220.0),
    ("oldpeak", 0.0, 6.0),
    ("ca", 0.0, 3.0),
];

impl PatientRecord {
    /// Field-name keyed view consumed by the codec
    pub fn to_feature_row(&self) -> FeatureRow {
        FeatureRow::new()
            .with_number("age", self.age as f64)
            .with_category("sex", <&'static str>::from(self.sex))
            .with_category("cp", <&'static str>::from(self.cp))
            .with_number("trestbps", self.trestbps as f64)
            .with_number("chol", self.chol as f64)
            .with_category("fbs", flag_category(self.fbs))
            .with_category("restecg", <&'static str>::from(self.restecg))
            .with_number("thalch", self.thalch as f64)
            .with_category("exang", flag_category(self.exang))
            .with_number("oldpeak", self.oldpeak)
            .with_category("slope", <&'static str>::from(self.slope))
            .with_number("ca", self.ca as f64)
            .with_category("thal", <&'static str>::from(self.thal))
    }

    /// Notes for numeric values outside their advisory range
    pub fn advisories(&self) -> Vec<String> {
        let row = self.to_feature_row();
        ADVISORY_RANGES
            .iter()
            .filter_map(|(name, lo, hi)| match row.get(name) {
                Some(FeatureValue::Number(v)) if *v < *lo || *v > *hi => Some(format!(
                    "{} = {} is outside the expected range [{}, {}]",
                    name, v, lo, hi
                )),
                _ => None,
            })
            .collect()
    }
}

/// Boolean field as submitted: a JSON bool or a `True`/`False` string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagInput {
    Bool(bool),
    Text(String),
}

impl From<bool> for FlagInput {
    fn from(flag: bool) -> Self {
        FlagInput::Bool(flag)
    }
}

/// Patient attributes as collected by a form, before validation.
///
/// Every field is optional here; [`PatientInput::validate`] reports all
/// missing or malformed fields at once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatientInput {
    pub age: Option<i64>,
    pub sex: Option<String>,
    pub cp: Option<String>,
    pub trestbps: Option<i64>,
    pub chol: Option<i64>,
    pub fbs: Option<FlagInput>,
    pub restecg: Option<String>,
    pub thalch: Option<i64>,
    pub exang: Option<FlagInput>,
    pub oldpeak: Option<f64>,
    pub slope: Option<String>,
    pub ca: Option<i64>,
    pub thal: Option<String>,
}

impl PatientInput {
    /// Check presence and typing of all 13 fields
    pub fn validate(&self) -> Result<PatientRecord> {
        let mut problems = Vec::new();

        let age = unsigned_field("age", self.age, &mut problems);
        let sex = category_field::<Sex>("sex", self.sex.as_deref(), &mut problems);
        let cp = category_field::<ChestPainType>("cp", self.cp.as_deref(), &mut problems);
        let trestbps = unsigned_field("trestbps", self.trestbps, &mut problems);
        let chol = unsigned_field("chol", self.chol, &mut problems);
        let fbs = flag_field("fbs", self.fbs.as_ref(), &mut problems);
        let restecg = category_field::<RestingEcg>("restecg", self.restecg.as_deref(), &mut problems);
        let thalch = unsigned_field("thalch", self.thalch, &mut problems);
        let exang = flag_field("exang", self.exang.as_ref(), &mut problems);
        let oldpeak = match self.oldpeak {
            None => {
                problems.push("missing field 'oldpeak'".to_string());
                None
            }
            Some(v) if !v.is_finite() => {
                problems.push(format!("field 'oldpeak' must be a finite number, got {}", v));
                None
            }
            Some(v) => Some(v),
        };
        let slope = category_field::<StSlope>("slope", self.slope.as_deref(), &mut problems);
        let ca = unsigned_field("ca", self.ca, &mut problems).and_then(|v| {
            u8::try_from(v)
                .map_err(|_| problems.push(format!("field 'ca' is out of range: {}", v)))
                .ok()
        });
        let thal = category_field::<Thalassemia>("thal", self.thal.as_deref(), &mut problems);

        match (
            age, sex, cp, trestbps, chol, fbs, restecg, thalch, exang, oldpeak, slope, ca, thal,
        ) {
            (
                Some(age),
                Some(sex),
                Some(cp),
                Some(trestbps),
                Some(chol),
                Some(fbs),
                Some(restecg),
                Some(thalch),
                Some(exang),
                Some(oldpeak),
                Some(slope),
                Some(ca),
                Some(thal),
            ) if problems.is_empty() => Ok(PatientRecord {
                age,
                sex,
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
            }),
            _ => Err(AppError::Validation(problems.join("; "))),
        }
    }
}

impl From<&PatientRecord> for PatientInput {
    fn from(record: &PatientRecord) -> Self {
        Self {
            age: Some(record.age as i64),
            sex: Some(record.sex.to_string()),
            cp: Some(record.cp.to_string()),
            trestbps: Some(record.trestbps as i64),
            chol: Some(record.chol as i64),
            fbs: Some(FlagInput::Bool(record.fbs)),
            restecg: Some(record.restecg.to_string()),
            thalch: Some(record.thalch as i64),
            exang: Some(FlagInput::Bool(record.exang)),
            oldpeak: Some(record.oldpeak),
            slope: Some(record.slope.to_string()),
            ca: Some(record.ca as i64),
            thal: Some(record.thal.to_string()),
        }
    }
}

fn unsigned_field(name: &str, value: Option<i64>, problems: &mut Vec<String>) -> Option<u32> {
    match value {
        None => {
            problems.push(format!("missing field '{}'", name));
            None
        }
        Some(v) => match u32::try_from(v) {
            Ok(v) => Some(v),
            Err(_) => {
                problems.push(format!("field '{}' must be a non-negative integer, got {}", name, v));
                None
            }
        },
    }
}

fn category_field<T>(name: &str, value: Option<&str>, problems: &mut Vec<String>) -> Option<T>
where
    T: FromStr + IntoEnumIterator + Into<&'static str>,
{
    let raw = match value {
        None => {
            problems.push(format!("missing field '{}'", name));
            return None;
        }
        Some(raw) => raw.trim(),
    };

    match T::from_str(raw) {
        Ok(v) => Some(v),
        Err(_) => {
            problems.push(format!(
                "invalid value '{}' for field '{}' (expected one of: {})",
                raw,
                name,
                allowed_values::<T>().join(", ")
            ));
            None
        }
    }
}

fn flag_field(name: &str, value: Option<&FlagInput>, problems: &mut Vec<String>) -> Option<bool> {
    match value {
        None => {
            problems.push(format!("missing field '{}'", name));
            None
        }
        Some(FlagInput::Bool(b)) => Some(*b),
        Some(FlagInput::Text(text)) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            other => {
                problems.push(format!(
                    "invalid value '{}' for field '{}' (expected True or False)",
                    other, name
                ));
                None
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_input() -> PatientInput {
        PatientInput {
            age: Some(63),
            sex: Some("Male".to_string()),
            cp: Some("typical angina".to_string()),
            trestbps: Some(145),
            chol: Some(233),
            fbs: Some(FlagInput::Text("True".to_string())),
            restecg: Some("lv hypertrophy".to_string()),
            thalch: Some(150),
            exang: Some(FlagInput::Bool(false)),
            oldpeak: Some(2.3),
            slope: Some("downsloping".to_string()),
            ca: Some(0),
            thal: Some("fixed defect".to_string()),
        }
    }

    #[test]
    fn test_validate_complete_input() {
        let record = complete_input().validate().unwrap();
        assert_eq!(record.age, 63);
        assert_eq!(record.sex, Sex::Male);
        assert_eq!(record.cp, ChestPainType::TypicalAngina);
        assert!(record.fbs);
        assert!(!record.exang);
        assert_eq!(record.restecg, RestingEcg::LvHypertrophy);
        assert_eq!(record.slope, StSlope::Downsloping);
        assert_eq!(record.thal, Thalassemia::FixedDefect);
    }

    #[test]
    fn test_missing_thal_is_validation_error() {
        let mut input = complete_input();
        input.thal = None;
        match input.validate() {
            Err(AppError::Validation(msg)) => assert!(msg.contains("missing field 'thal'")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_all_problems_reported_together() {
        let mut input = complete_input();
        input.age = Some(-4);
        input.cp = Some("sharp".to_string());
        input.exang = Some(FlagInput::Text("maybe".to_string()));
        let err = input.validate().unwrap_err().to_string();
        assert!(err.contains("'age'"));
        assert!(err.contains("'sharp'"));
        assert!(err.contains("'exang'"));
    }

    #[test]
    fn test_category_parsing_is_case_insensitive() {
        let mut input = complete_input();
        input.sex = Some("female".to_string());
        input.thal = Some("Reversable Defect".to_string());
        let record = input.validate().unwrap();
        assert_eq!(record.sex, Sex::Female);
        assert_eq!(record.thal, Thalassemia::ReversableDefect);
    }

    #[test]
    fn test_feature_row_uses_dataset_spellings() {
        let record = complete_input().validate().unwrap();
        let row = record.to_feature_row();
        assert_eq!(row.len(), 13);
        assert_eq!(
            row.get("restecg"),
            Some(&FeatureValue::Category("lv hypertrophy".to_string()))
        );
        assert_eq!(
            row.get("fbs"),
            Some(&FeatureValue::Category("True".to_string()))
        );
        assert_eq!(row.get("oldpeak"), Some(&FeatureValue::Number(2.3)));
    }

    #[test]
    fn test_advisories_flag_implausible_values() {
        let mut record = complete_input().validate().unwrap();
        assert!(record.advisories().is_empty());

        record.chol = 0;
        let notes = record.advisories();
        assert_eq!(notes.len(), 1);
        assert!(notes[0].starts_with("chol"));
    }

    #[test]
    fn test_record_round_trips_through_input() {
        let record = complete_input().validate().unwrap();
        let again = PatientInput::from(&record).validate().unwrap();
        assert_eq!(record, again);
    }

    #[test]
    fn test_allowed_values() {
        assert_eq!(
            allowed_values::<ChestPainType>(),
            vec!["typical angina", "atypical angina", "non-anginal", "asymptomatic"]
        );
    }
}
