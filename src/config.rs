use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{
    fmt::Debug,
    fs,
    ops::{Bound, RangeBounds},
    path::Path,
};

/// Analysis configuration.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Global test parameters.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Fields to describe.
    #[serde(default)]
    pub summary: SummaryConfig,

    /// Correlation tests between two numeric fields.
    #[serde(default)]
    pub correlation: Vec<CorrelationConfig>,

    /// One-way group comparisons.
    #[serde(default)]
    pub anova: Vec<AnovaConfig>,

    /// Two-group comparisons.
    #[serde(default)]
    pub two_group: Vec<TwoGroupConfig>,

    /// Ranking and keyword reports.
    #[serde(default)]
    pub insights: InsightsConfig,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Significance level shared by every test.
    pub significance: f64,
    /// Minimum number of observations for a group to take part in a test.
    pub min_group_size: usize,
}

#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SummaryConfig {
    pub fields: Vec<String>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CorrelationConfig {
    pub name: Option<String>,
    pub x: String,
    pub y: String,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnovaConfig {
    pub name: Option<String>,
    pub outcome: String,
    pub group: String,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TwoGroupConfig {
    pub name: Option<String>,
    pub outcome: String,
    pub group: String,
    /// Categories to compare, in order; all categories when absent.
    pub levels: Option<Vec<String>>,
    /// Numeric field averaged per group next to the outcome.
    pub companion: Option<String>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InsightsConfig {
    /// Number of rows in each top-N table.
    pub top_n: usize,
    /// Fraction of rows, by views, whose titles are scanned for keywords.
    pub keyword_share: f64,
    /// Number of keywords reported.
    pub keyword_count: usize,
    /// Categorical field of the per-group table.
    pub group_field: String,
    /// Categorical period field of the trend table.
    pub period_field: String,
    /// Numeric fields of the correlation matrix.
    pub matrix_fields: Vec<String>,
}

/// Per-video metrics summarized and correlated by default.
const METRIC_FIELDS: [&str; 7] = [
    "views",
    "likes",
    "comments",
    "duration_sec",
    "likes_per_view",
    "comments_per_view",
    "engagement_rate",
];

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            significance: 0.05,
            min_group_size: 2,
        }
    }
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            top_n: 10,
            keyword_share: 0.1,
            keyword_count: 15,
            group_field: "category".to_string(),
            period_field: "upload_quarter".to_string(),
            matrix_fields: METRIC_FIELDS.into_iter().map(String::from).collect(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let correlation = ["likes_per_view", "comments_per_view", "engagement_rate"]
            .into_iter()
            .map(|y| CorrelationConfig {
                name: Some(format!("duration vs {y}")),
                x: "duration_sec".to_string(),
                y: y.to_string(),
            })
            .collect();

        Self {
            analysis: AnalysisConfig::default(),
            summary: SummaryConfig {
                fields: METRIC_FIELDS.into_iter().map(String::from).collect(),
            },
            correlation,
            anova: vec![
                AnovaConfig {
                    name: Some("views by publication day".to_string()),
                    outcome: "views".to_string(),
                    group: "day_name".to_string(),
                },
                AnovaConfig {
                    name: Some("views by category".to_string()),
                    outcome: "views".to_string(),
                    group: "category".to_string(),
                },
            ],
            two_group: vec![TwoGroupConfig {
                name: Some("tutorial vs career views".to_string()),
                outcome: "views".to_string(),
                group: "category".to_string(),
                levels: Some(vec!["Tutorial".to_string(), "Career".to_string()]),
                companion: Some("engagement_rate".to_string()),
            }],
            insights: InsightsConfig::default(),
        }
    }
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded and contain a serialized [`Config`].
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let open_unit = (Bound::Excluded(0.0), Bound::Excluded(1.0));
        check_num(self.analysis.significance, open_unit).context("invalid significance level")?;
        check_num(self.analysis.min_group_size, 2..10_000).context("invalid minimum group size")?;

        for field in &self.summary.fields {
            check_name(field).context("invalid summary field")?;
        }
        for (idx, corr) in self.correlation.iter().enumerate() {
            check_name(&corr.x)
                .and_then(|_| check_name(&corr.y))
                .with_context(|| format!("invalid correlation {idx}"))?;
        }
        for (idx, anova) in self.anova.iter().enumerate() {
            check_name(&anova.outcome)
                .and_then(|_| check_name(&anova.group))
                .with_context(|| format!("invalid anova {idx}"))?;
        }
        for (idx, two_group) in self.two_group.iter().enumerate() {
            check_name(&two_group.outcome)
                .and_then(|_| check_name(&two_group.group))
                .and_then(|_| two_group.companion.as_deref().map_or(Ok(()), check_name))
                .and_then(|_| check_levels(two_group.levels.as_deref()))
                .with_context(|| format!("invalid two-group comparison {idx}"))?;
        }

        let insights = &self.insights;
        check_num(insights.top_n, 1..10_000).context("invalid top-N size")?;
        check_num(
            insights.keyword_share,
            (Bound::Excluded(0.0), Bound::Included(1.0)),
        )
        .context("invalid keyword share")?;
        check_num(insights.keyword_count, 1..10_000).context("invalid keyword count")?;
        check_name(&insights.group_field).context("invalid insights group field")?;
        check_name(&insights.period_field).context("invalid insights period field")?;
        for field in &insights.matrix_fields {
            check_name(field).context("invalid correlation matrix field")?;
        }

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

fn check_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("field name must not be empty");
    }
    Ok(())
}

fn check_levels(levels: Option<&[String]>) -> Result<()> {
    let Some(levels) = levels else {
        return Ok(());
    };
    if levels.len() != 2 {
        bail!("exactly 2 levels must be given, but {} are", levels.len());
    }
    if levels[0] == levels[1] {
        bail!("levels must be distinct, but both are {:?}", levels[0]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.analysis.significance, 0.05);
        assert_eq!(config.correlation.len(), 3);
        assert_eq!(config.insights.matrix_fields.len(), 7);
        assert_eq!(
            config.two_group[0].companion.as_deref(),
            Some("engagement_rate")
        );
    }

    #[test]
    fn parses_partial_file() {
        let contents = String::new()
            + "[analysis]\n"
            + "significance = 0.01\n"
            + "min_group_size = 3\n"
            + "\n"
            + "[[correlation]]\n"
            + "x = \"duration_sec\"\n"
            + "y = \"views\"\n"
            + "\n"
            + "[[two_group]]\n"
            + "outcome = \"views\"\n"
            + "group = \"category\"\n"
            + "levels = [\"Tutorial\", \"Career\"]\n";

        let config = Config::from_toml(&contents).unwrap();
        assert_eq!(config.analysis.significance, 0.01);
        assert_eq!(config.analysis.min_group_size, 3);
        assert_eq!(config.correlation[0].name, None);
        assert!(config.anova.is_empty());
        assert!(config.summary.fields.is_empty());
        assert_eq!(config.insights, InsightsConfig::default());
    }

    #[test]
    fn rejects_out_of_range_significance() {
        for level in ["0.0", "1.0", "1.5"] {
            let contents = format!("[analysis]\nsignificance = {level}\nmin_group_size = 2\n");
            assert!(Config::from_toml(&contents).is_err(), "accepted {level}");
        }
    }

    #[test]
    fn rejects_bad_levels() {
        let contents = String::new()
            + "[[two_group]]\n"
            + "outcome = \"views\"\n"
            + "group = \"category\"\n"
            + "levels = [\"Tutorial\", \"Tutorial\"]\n";
        assert!(Config::from_toml(&contents).is_err());
    }

    #[test]
    fn fills_missing_keys_with_defaults() {
        let config = Config::from_toml("[insights]\ntop_n = 5\n").unwrap();
        assert_eq!(config.insights.top_n, 5);
        assert_eq!(config.insights.keyword_count, 15);
        assert_eq!(config.analysis, AnalysisConfig::default());
    }

    #[test]
    fn rejects_blank_insight_fields() {
        let contents = "[insights]\nmatrix_fields = [\"views\", \" \"]\n";
        assert!(Config::from_toml(contents).is_err());
        let contents = "[insights]\nperiod_field = \"\"\n";
        assert!(Config::from_toml(contents).is_err());

        let config = Config::from_toml("[insights]\nperiod_field = \"year\"\n").unwrap();
        assert_eq!(config.insights.period_field, "year");
        assert_eq!(config.insights.matrix_fields.len(), 7);
    }

    #[test]
    fn rejects_unknown_keys() {
        let contents = "[analysis]\nsignificance = 0.05\nmin_group_size = 2\nalpha = 0.05\n";
        assert!(Config::from_toml(contents).is_err());
    }
}
