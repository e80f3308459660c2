//! Column-typed table of observations.

use crate::error::{AnalysisError, AnalysisResult};
use anyhow::{Context, Result};
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Cells of a single column, one per observation.
///
/// Missing values are `None`; which rows are dropped because of them is up
/// to each analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Column {
    Numeric(Vec<Option<f64>>),
    Categorical(Vec<Option<String>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(cells) => cells.len(),
            Column::Categorical(cells) => cells.len(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Column::Numeric(_) => "numeric",
            Column::Categorical(_) => "categorical",
        }
    }
}

/// Observations of one group, labeled by its category value.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub label: String,
    pub vals: Vec<f64>,
}

/// Named columns of equal length.
///
/// The schema is fixed at construction and checked there, so analyses only
/// have to deal with missing cells, never with ragged or mistyped data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    names: Vec<String>,
    columns: Vec<Column>,
}

impl Dataset {
    /// Build a dataset from named columns, validating the schema.
    pub fn new(named_columns: Vec<(String, Column)>) -> AnalysisResult<Self> {
        let (names, columns) = named_columns.into_iter().unzip();
        let dataset = Self { names, columns };
        dataset.validate()?;
        Ok(dataset)
    }

    /// Load a dataset from a MessagePack-encoded file.
    pub fn load<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);
        let dataset: Dataset =
            decode::from_read(&mut reader).context("failed to deserialize dataset")?;
        dataset.validate().context("failed to validate dataset")?;
        Ok(dataset)
    }

    /// Save the dataset to a MessagePack-encoded file.
    pub fn save<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, self).context("failed to serialize dataset")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }

    fn validate(&self) -> AnalysisResult<()> {
        if self.names.len() != self.columns.len() {
            return Err(schema_error(format!(
                "{} names given for {} columns",
                self.names.len(),
                self.columns.len()
            )));
        }

        let mut seen = HashSet::new();
        for name in &self.names {
            if !seen.insert(name.as_str()) {
                return Err(schema_error(format!("duplicate column {name:?}")));
            }
        }

        let n_rows = self.n_rows();
        for (name, column) in self.names.iter().zip(&self.columns) {
            let len = column.len();
            if len != n_rows {
                return Err(schema_error(format!(
                    "column {name:?} must have {n_rows} rows, but has {len}"
                )));
            }
            if let Column::Numeric(cells) = column {
                if cells.iter().flatten().any(|val| !val.is_finite()) {
                    return Err(schema_error(format!(
                        "column {name:?} contains non-finite values"
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn column(&self, field: &str) -> AnalysisResult<&Column> {
        self.names
            .iter()
            .position(|name| name == field)
            .map(|idx| &self.columns[idx])
            .ok_or_else(|| AnalysisError::UnknownField {
                field: field.to_string(),
            })
    }

    pub fn numeric(&self, field: &str) -> AnalysisResult<&[Option<f64>]> {
        match self.column(field)? {
            Column::Numeric(cells) => Ok(cells),
            other => Err(type_error(field, "numeric", other)),
        }
    }

    pub fn categorical(&self, field: &str) -> AnalysisResult<&[Option<String>]> {
        match self.column(field)? {
            Column::Categorical(cells) => Ok(cells),
            other => Err(type_error(field, "categorical", other)),
        }
    }

    /// Non-missing values of a numeric field.
    pub fn present(&self, field: &str) -> AnalysisResult<Vec<f64>> {
        Ok(self.numeric(field)?.iter().flatten().copied().collect())
    }

    /// Values of two numeric fields over the rows where both are present.
    pub fn paired(&self, x_field: &str, y_field: &str) -> AnalysisResult<(Vec<f64>, Vec<f64>)> {
        let x_cells = self.numeric(x_field)?;
        let y_cells = self.numeric(y_field)?;
        Ok(x_cells
            .iter()
            .zip(y_cells)
            .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
            .unzip())
    }

    /// Outcome values split by group label, in order of first appearance.
    ///
    /// Rows missing either the outcome or the label are dropped.
    pub fn grouped(&self, outcome: &str, group: &str) -> AnalysisResult<Vec<Group>> {
        let vals = self.numeric(outcome)?;
        let labels = self.categorical(group)?;

        let mut groups: Vec<Group> = Vec::new();
        for (val, label) in vals.iter().zip(labels) {
            let (Some(val), Some(label)) = (val, label) else {
                continue;
            };
            match groups.iter_mut().find(|grp| &grp.label == label) {
                Some(grp) => grp.vals.push(*val),
                None => groups.push(Group {
                    label: label.clone(),
                    vals: vec![*val],
                }),
            }
        }
        Ok(groups)
    }
}

fn schema_error(reason: String) -> AnalysisError {
    AnalysisError::Schema { reason }
}

fn type_error(field: &str, expected: &str, found: &Column) -> AnalysisError {
    AnalysisError::FieldType {
        field: field.to_string(),
        expected: format!("{expected} (found {})", found.kind()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::new(vec![
            (
                "x".to_string(),
                Column::Numeric(vec![Some(1.0), None, Some(3.0), Some(4.0)]),
            ),
            (
                "y".to_string(),
                Column::Numeric(vec![Some(2.0), Some(5.0), None, Some(8.0)]),
            ),
            (
                "day".to_string(),
                Column::Categorical(vec![
                    Some("Mon".to_string()),
                    Some("Tue".to_string()),
                    Some("Mon".to_string()),
                    None,
                ]),
            ),
        ])
        .expect("failed to build dataset")
    }

    #[test]
    fn paired_uses_common_rows() {
        let (x, y) = sample().paired("x", "y").unwrap();
        assert_eq!(x, vec![1.0, 4.0]);
        assert_eq!(y, vec![2.0, 8.0]);
    }

    #[test]
    fn grouped_drops_incomplete_rows() {
        let groups = sample().grouped("y", "day").unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].label, "Mon");
        assert_eq!(groups[0].vals, vec![2.0]);
        assert_eq!(groups[1].label, "Tue");
        assert_eq!(groups[1].vals, vec![5.0]);
    }

    #[test]
    fn rejects_ragged_columns() {
        let err = Dataset::new(vec![
            ("a".to_string(), Column::Numeric(vec![Some(1.0)])),
            ("b".to_string(), Column::Numeric(vec![Some(1.0), Some(2.0)])),
        ])
        .unwrap_err();
        assert!(matches!(err, AnalysisError::Schema { .. }));
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = Dataset::new(vec![
            ("a".to_string(), Column::Numeric(vec![Some(1.0)])),
            ("a".to_string(), Column::Numeric(vec![Some(2.0)])),
        ])
        .unwrap_err();
        assert!(matches!(err, AnalysisError::Schema { .. }));
    }

    #[test]
    fn rejects_non_finite_values() {
        let err = Dataset::new(vec![(
            "a".to_string(),
            Column::Numeric(vec![Some(f64::NAN)]),
        )])
        .unwrap_err();
        assert!(matches!(err, AnalysisError::Schema { .. }));
    }

    #[test]
    fn reports_unknown_and_mistyped_fields() {
        let dataset = sample();
        assert!(matches!(
            dataset.numeric("z"),
            Err(AnalysisError::UnknownField { .. })
        ));
        assert!(matches!(
            dataset.numeric("day"),
            Err(AnalysisError::FieldType { .. })
        ));
        assert!(matches!(
            dataset.categorical("x"),
            Err(AnalysisError::FieldType { .. })
        ));
    }
}
