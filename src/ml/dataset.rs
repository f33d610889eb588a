//! Raw training table, cleaning stage and stratified split.

use crate::error::{AppError, Result};
use crate::ml::schema::{FeatureSchema, FieldKind};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Tokens treated as a missing cell
const MISSING_TOKENS: [&str; 5] = ["", "NA", "NaN", "nan", "?"];

fn is_missing(cell: &str) -> bool {
    MISSING_TOKENS.contains(&cell)
}

/// Canonical spelling of a category cell; boolean-ish tokens become `True`/`False`
pub fn canonical_category(cell: &str) -> String {
    let trimmed = cell.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        "True".to_string()
    } else if trimmed.eq_ignore_ascii_case("false") {
        "False".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Tabular data as read from disk; `None` marks a missing cell
#[derive(Debug, Clone)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Result<Self> {
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != columns.len()) {
            return Err(AppError::DataSource(format!(
                "Row {} has {} cells, expected {}",
                i + 1,
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// Read a CSV file with a header row
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| {
            AppError::DataSource(format!("Cannot open dataset {}: {}", path.display(), e))
        })?;
        Self::from_reader(file).map_err(|e| match e {
            AppError::DataSource(msg) => {
                AppError::DataSource(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Read CSV with a header row from any reader
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let columns: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|h| h.to_string())
            .collect();

        if columns.is_empty() || columns.iter().all(|c| c.is_empty()) {
            return Err(AppError::DataSource("Dataset has no header".to_string()));
        }

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            rows.push(
                record
                    .iter()
                    .map(|cell| {
                        if is_missing(cell) {
                            None
                        } else {
                            Some(cell.to_string())
                        }
                    })
                    .collect(),
            );
        }

        if rows.is_empty() {
            return Err(AppError::DataSource("Dataset has no rows".to_string()));
        }

        Self::new(columns, rows)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    fn column_cells(&self, name: &str) -> Option<Vec<Option<&str>>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|r| r[idx].as_deref()).collect())
    }
}

/// One cleaned, fully populated column
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Numeric(Vec<f64>),
    Categorical(Vec<String>),
}

/// Cleaned training table: schema features plus the raw target, no missing cells
#[derive(Debug, Clone)]
pub struct CleanDataset {
    columns: HashMap<String, Column>,
    target: Vec<f64>,
    n_rows: usize,
}

impl CleanDataset {
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    pub fn target(&self) -> &[f64] {
        &self.target
    }

    /// Collapse the severity target: anything above zero is disease (1), zero is 0
    pub fn binary_labels(&self) -> Vec<usize> {
        self.target
            .iter()
            .map(|&t| if t > 0.0 { 1 } else { 0 })
            .collect()
    }
}

/// Column median of the present values (mean of the two middle values for even counts)
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Most frequent value; ties go to the value encountered first
pub fn mode<'a>(values: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for value in values {
        match counts.iter_mut().find(|(v, _)| *v == value) {
            Some(entry) => entry.1 += 1,
            None => counts.push((value, 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (value, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((value, count));
        }
    }
    best.map(|(v, _)| v.to_string())
}

/// Cleaning stage: drops administrative columns, imputes missing numeric cells
/// with the column median and categorical cells with the column mode.
#[derive(Debug, Clone)]
pub struct Cleaner {
    schema: FeatureSchema,
    target_column: String,
    drop_columns: Vec<String>,
}

impl Cleaner {
    pub fn new(schema: FeatureSchema, target_column: impl Into<String>, drop_columns: Vec<String>) -> Self {
        Self {
            schema,
            target_column: target_column.into(),
            drop_columns,
        }
    }

    pub fn clean(&self, raw: &RawTable) -> Result<CleanDataset> {
        let target_cells = raw.column_cells(&self.target_column).ok_or_else(|| {
            AppError::Data(format!(
                "Target column '{}' not found",
                self.target_column
            ))
        })?;

        for dropped in self.drop_columns.iter().filter(|c| raw.has_column(c)) {
            debug!(column = %dropped, "Dropping administrative column");
        }

        let ignored: Vec<&String> = raw
            .columns()
            .iter()
            .filter(|c| {
                **c != self.target_column
                    && !self.drop_columns.contains(c)
                    && self.schema.field(c).is_none()
            })
            .collect();
        if !ignored.is_empty() {
            debug!(columns = ?ignored, "Ignoring columns outside the feature schema");
        }

        let mut columns = HashMap::new();
        for field in self.schema.fields() {
            if self.drop_columns.iter().any(|c| c == field.name) {
                return Err(AppError::Data(format!(
                    "Feature column '{}' is configured to be dropped",
                    field.name
                )));
            }
            let cells = raw.column_cells(field.name).ok_or_else(|| {
                AppError::Data(format!("Feature column '{}' not found", field.name))
            })?;

            let column = match field.kind {
                FieldKind::Numeric => Column::Numeric(impute_numeric(field.name, &cells)?),
                FieldKind::Categorical => {
                    Column::Categorical(impute_categorical(field.name, &cells)?)
                }
            };
            columns.insert(field.name.to_string(), column);
        }

        let target = impute_numeric(&self.target_column, &target_cells)?;

        info!(
            rows = raw.n_rows(),
            features = self.schema.len(),
            "Cleaned dataset"
        );

        Ok(CleanDataset {
            columns,
            target,
            n_rows: raw.n_rows(),
        })
    }
}

fn impute_numeric(name: &str, cells: &[Option<&str>]) -> Result<Vec<f64>> {
    let parsed: Vec<Option<f64>> = cells
        .iter()
        .enumerate()
        .map(|(i, cell)| match cell {
            None => Ok(None),
            Some(text) => text.parse::<f64>().map(Some).map_err(|_| {
                AppError::DataSource(format!(
                    "Malformed numeric value '{}' in column '{}' (row {})",
                    text,
                    name,
                    i + 1
                ))
            }),
        })
        .collect::<Result<_>>()?;

    let present: Vec<f64> = parsed.iter().flatten().copied().collect();
    let missing = parsed.len() - present.len();
    if missing == 0 {
        return Ok(present);
    }

    let fill = median(&present).ok_or_else(|| {
        AppError::Data(format!("Column '{}' has no values to impute from", name))
    })?;
    debug!(column = name, missing, fill, "Imputed missing numeric values with median");

    Ok(parsed.into_iter().map(|v| v.unwrap_or(fill)).collect())
}

fn impute_categorical(name: &str, cells: &[Option<&str>]) -> Result<Vec<String>> {
    let canonical: Vec<Option<String>> = cells
        .iter()
        .map(|cell| cell.map(canonical_category))
        .collect();

    let missing = canonical.iter().filter(|c| c.is_none()).count();
    if missing == 0 {
        return Ok(canonical.into_iter().flatten().collect());
    }

    let fill = mode(canonical.iter().flatten().map(String::as_str)).ok_or_else(|| {
        AppError::Data(format!("Column '{}' has no values to impute from", name))
    })?;
    debug!(column = name, missing, fill = %fill, "Imputed missing categorical values with mode");

    Ok(canonical
        .into_iter()
        .map(|c| c.unwrap_or_else(|| fill.clone()))
        .collect())
}

/// Row indices of the train and test partitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Seeded split preserving the label ratio in both partitions.
///
/// Each label contributes `round(count * test_size)` rows to the test side
/// (at least one). Every label needs at least two rows.
pub fn stratified_split(labels: &[usize], test_size: f64, seed: u64) -> Result<SplitIndices> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(AppError::Configuration(format!(
            "test_size must be in (0, 1), got {}",
            test_size
        )));
    }

    let mut by_label: Vec<(usize, Vec<usize>)> = Vec::new();
    for (idx, &label) in labels.iter().enumerate() {
        match by_label.iter_mut().find(|(l, _)| *l == label) {
            Some((_, indices)) => indices.push(idx),
            None => by_label.push((label, vec![idx])),
        }
    }
    by_label.sort_by_key(|(label, _)| *label);

    if by_label.len() < 2 {
        return Err(AppError::Data(
            "Stratified split needs at least two label values".to_string(),
        ));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    for (label, mut indices) in by_label {
        if indices.len() < 2 {
            return Err(AppError::Data(format!(
                "Label {} has {} row(s); stratified split needs at least 2",
                label,
                indices.len()
            )));
        }
        indices.shuffle(&mut rng);
        let n_test = ((indices.len() as f64 * test_size).round() as usize)
            .clamp(1, indices.len() - 1);
        test.extend_from_slice(&indices[..n_test]);
        train.extend_from_slice(&indices[n_test..]);
    }

    train.shuffle(&mut rng);
    test.shuffle(&mut rng);

    Ok(SplitIndices { train, test })
}
