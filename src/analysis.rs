use crate::config::Config;
use crate::dataset::Dataset;
use crate::error::{AnalysisError, AnalysisResult};
use crate::hypothesis::{self, Anova, Correlation, TwoGroup};
use crate::stats::{Accumulator, compute_percentile};
use serde::{Deserialize, Serialize};

/// Descriptive statistics of one numeric field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Description {
    pub field: String,
    pub count: usize,
    pub mean: f64,
    pub std_dev: Option<f64>,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

/// Describe the non-missing values of a numeric field.
pub fn describe(data: &Dataset, field: &str) -> AnalysisResult<Description> {
    let mut vals = data.present(field)?;
    if vals.is_empty() {
        return Err(AnalysisError::undefined(format!(
            "field {field:?} has no values"
        )));
    }
    vals.sort_by(f64::total_cmp);

    let acc = Accumulator::from_vals(&vals);
    Ok(Description {
        field: field.to_string(),
        count: acc.n_vals(),
        mean: acc.mean(),
        std_dev: acc.sample_var().map(f64::sqrt),
        min: acc.min(),
        q1: compute_percentile(&vals, 0.25),
        median: compute_percentile(&vals, 0.5),
        q3: compute_percentile(&vals, 0.75),
        max: acc.max(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "test", rename_all = "snake_case")]
pub enum Findings {
    Summary(Description),
    Correlation(Correlation),
    Anova(Anova),
    TwoGroup(TwoGroup),
}

/// Result of one completed analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub findings: Findings,
}

/// Entry of a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Completed(TestResult),
    NotRun {
        name: String,
        failure: AnalysisError,
    },
}

impl Outcome {
    pub fn name(&self) -> &str {
        match self {
            Outcome::Completed(result) => &result.name,
            Outcome::NotRun { name, .. } => name,
        }
    }
}

pub trait Analysis {
    fn name(&self) -> String;
    fn run(&self, data: &Dataset) -> AnalysisResult<Findings>;
}

pub struct Summary {
    field: String,
}

impl Analysis for Summary {
    fn name(&self) -> String {
        format!("summary of {}", self.field)
    }

    fn run(&self, data: &Dataset) -> AnalysisResult<Findings> {
        describe(data, &self.field).map(Findings::Summary)
    }
}

pub struct CorrelationTest {
    name: Option<String>,
    x: String,
    y: String,
    significance: f64,
}

impl Analysis for CorrelationTest {
    fn name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("correlation of {} and {}", self.x, self.y))
    }

    fn run(&self, data: &Dataset) -> AnalysisResult<Findings> {
        hypothesis::correlate(data, &self.x, &self.y, self.significance)
            .map(Findings::Correlation)
    }
}

pub struct AnovaTest {
    name: Option<String>,
    outcome: String,
    group: String,
    min_group_size: usize,
    significance: f64,
}

impl Analysis for AnovaTest {
    fn name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("anova of {} by {}", self.outcome, self.group))
    }

    fn run(&self, data: &Dataset) -> AnalysisResult<Findings> {
        hypothesis::one_way_anova(
            data,
            &self.outcome,
            &self.group,
            self.min_group_size,
            self.significance,
        )
        .map(Findings::Anova)
    }
}

pub struct TwoGroupTest {
    name: Option<String>,
    outcome: String,
    group: String,
    levels: Option<Vec<String>>,
    companion: Option<String>,
    min_group_size: usize,
    significance: f64,
}

impl Analysis for TwoGroupTest {
    fn name(&self) -> String {
        self.name.clone().unwrap_or_else(|| match self.levels.as_deref() {
            Some([first, second]) => format!(
                "{} of {first} vs {second} by {}",
                self.outcome, self.group
            ),
            _ => format!("{} by {}", self.outcome, self.group),
        })
    }

    fn run(&self, data: &Dataset) -> AnalysisResult<Findings> {
        hypothesis::compare_two_groups(
            data,
            &self.outcome,
            &self.group,
            self.levels.as_deref(),
            self.companion.as_deref(),
            self.min_group_size,
            self.significance,
        )
        .map(Findings::TwoGroup)
    }
}

/// Ordered battery of analyses run against one dataset.
pub struct Analyzer {
    analysis_ptr_vec: Vec<Box<dyn Analysis>>,
}

impl Analyzer {
    pub fn new(cfg: &Config) -> Self {
        let significance = cfg.analysis.significance;
        let min_group_size = cfg.analysis.min_group_size;

        let mut analysis_ptr_vec: Vec<Box<dyn Analysis>> = Vec::new();
        for field in &cfg.summary.fields {
            analysis_ptr_vec.push(Box::new(Summary {
                field: field.clone(),
            }));
        }
        for corr in &cfg.correlation {
            analysis_ptr_vec.push(Box::new(CorrelationTest {
                name: corr.name.clone(),
                x: corr.x.clone(),
                y: corr.y.clone(),
                significance,
            }));
        }
        for anova in &cfg.anova {
            analysis_ptr_vec.push(Box::new(AnovaTest {
                name: anova.name.clone(),
                outcome: anova.outcome.clone(),
                group: anova.group.clone(),
                min_group_size,
                significance,
            }));
        }
        for two_group in &cfg.two_group {
            analysis_ptr_vec.push(Box::new(TwoGroupTest {
                name: two_group.name.clone(),
                outcome: two_group.outcome.clone(),
                group: two_group.group.clone(),
                levels: two_group.levels.clone(),
                companion: two_group.companion.clone(),
                min_group_size,
                significance,
            }));
        }

        Self { analysis_ptr_vec }
    }

    pub fn n_analyses(&self) -> usize {
        self.analysis_ptr_vec.len()
    }

    /// Run every analysis in order.
    ///
    /// A failing analysis is recorded as not run; the rest still run.
    pub fn run(&self, data: &Dataset) -> Vec<Outcome> {
        self.analysis_ptr_vec
            .iter()
            .map(|analysis| {
                let name = analysis.name();
                match analysis.run(data) {
                    Ok(findings) => Outcome::Completed(TestResult { name, findings }),
                    Err(failure) => {
                        log::warn!("skipped {name:?}: {failure}");
                        Outcome::NotRun { name, failure }
                    }
                }
            })
            .collect()
    }
}
