//! Rankings, keyword counts and summary tables over the prepared table.

use crate::config::InsightsConfig;
use crate::dataset::Dataset;
use crate::error::{AnalysisError, AnalysisResult};
use crate::hypothesis::pearson;
use crate::stats::{Accumulator, compute_median};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Words too common to say anything about a title.
const STOP_WORDS: [&str; 10] = [
    "the", "and", "for", "with", "from", "are", "this", "that", "your", "you",
];

const RANKED_METRICS: [&str; 2] = ["views", "engagement_rate"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedRow {
    pub rank: usize,
    pub title: Option<String>,
    pub group: Option<String>,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopRows {
    pub metric: String,
    pub rows: Vec<RankedRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordCount {
    pub keyword: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keywords {
    pub share: f64,
    pub n_titles: usize,
    pub counts: Vec<KeywordCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRow {
    pub label: String,
    pub count: usize,
    pub mean_views: Option<f64>,
    pub median_views: Option<f64>,
    pub total_views: f64,
    pub mean_likes_per_view: Option<f64>,
    pub mean_comments_per_view: Option<f64>,
    pub mean_engagement_rate: Option<f64>,
    pub mean_duration_min: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupTable {
    pub field: String,
    pub rows: Vec<GroupRow>,
}

/// Pairwise Pearson coefficients; a cell is `None` where r is undefined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub fields: Vec<String>,
    pub coefficients: Vec<Vec<Option<f64>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodRow {
    pub period: String,
    pub count: usize,
    pub total_views: f64,
    pub mean_engagement_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodTable {
    pub field: String,
    pub rows: Vec<PeriodRow>,
}

/// Everything the insights step produced; parts that failed are absent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Insights {
    pub top: Vec<TopRows>,
    pub keywords: Option<Keywords>,
    pub groups: Option<GroupTable>,
    pub correlation_matrix: Option<CorrelationMatrix>,
    pub quarterly: Option<PeriodTable>,
}

impl Insights {
    pub fn collect(data: &Dataset, cfg: &InsightsConfig) -> Self {
        let mut insights = Self::default();

        for metric in RANKED_METRICS {
            match top_rows(data, metric, &cfg.group_field, cfg.top_n) {
                Ok(top) => insights.top.push(top),
                Err(error) => log::warn!("skipped top videos by {metric}: {error}"),
            }
        }

        insights.keywords =
            match keyword_frequency(data, "views", cfg.keyword_share, cfg.keyword_count) {
                Ok(keywords) => Some(keywords),
                Err(error) => {
                    log::warn!("skipped keyword frequency: {error}");
                    None
                }
            };

        insights.groups = match group_table(data, &cfg.group_field) {
            Ok(table) => Some(table),
            Err(error) => {
                log::warn!("skipped group table: {error}");
                None
            }
        };

        insights.correlation_matrix = match correlation_matrix(data, &cfg.matrix_fields) {
            Ok(matrix) => Some(matrix),
            Err(error) => {
                log::warn!("skipped correlation matrix: {error}");
                None
            }
        };

        insights.quarterly = match period_table(data, &cfg.period_field) {
            Ok(table) => Some(table),
            Err(error) => {
                log::warn!("skipped period table: {error}");
                None
            }
        };

        insights
    }
}

/// Row indices with a value, sorted by value in descending order.
///
/// The sort is stable, so equal values keep their table order.
fn ranked(cells: &[Option<f64>]) -> Vec<(usize, f64)> {
    let mut rows: Vec<(usize, f64)> = cells
        .iter()
        .enumerate()
        .filter_map(|(idx, cell)| cell.map(|val| (idx, val)))
        .collect();
    rows.sort_by(|a, b| b.1.total_cmp(&a.1));
    rows
}

/// The `n` rows with the largest values of `metric`.
pub fn top_rows(
    data: &Dataset,
    metric: &str,
    group_field: &str,
    n: usize,
) -> AnalysisResult<TopRows> {
    let vals = data.numeric(metric)?;
    let titles = data.categorical("title")?;
    let groups = data.categorical(group_field)?;

    let rows = ranked(vals)
        .into_iter()
        .take(n)
        .enumerate()
        .map(|(pos, (idx, value))| RankedRow {
            rank: pos + 1,
            title: titles[idx].clone(),
            group: groups[idx].clone(),
            value,
        })
        .collect();

    Ok(TopRows {
        metric: metric.to_string(),
        rows,
    })
}

/// Most common title words among the top `share` of rows by `metric`.
pub fn keyword_frequency(
    data: &Dataset,
    metric: &str,
    share: f64,
    count: usize,
) -> AnalysisResult<Keywords> {
    let vals = data.numeric(metric)?;
    let titles = data.categorical("title")?;
    let n_titles = (data.n_rows() as f64 * share).floor() as usize;

    let word_re =
        Regex::new(r"\w+").map_err(|error| AnalysisError::undefined(error.to_string()))?;

    let mut counts: Vec<KeywordCount> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for (idx, _) in ranked(vals).into_iter().take(n_titles) {
        let Some(title) = &titles[idx] else {
            continue;
        };
        let title = title.to_lowercase();
        for word in word_re.find_iter(&title).map(|m| m.as_str()) {
            if word.chars().count() <= 2 || STOP_WORDS.contains(&word) {
                continue;
            }
            match positions.get(word) {
                Some(&pos) => counts[pos].count += 1,
                None => {
                    positions.insert(word.to_string(), counts.len());
                    counts.push(KeywordCount {
                        keyword: word.to_string(),
                        count: 1,
                    });
                }
            }
        }
    }

    // Stable, so ties stay in order of first appearance.
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(count);

    Ok(Keywords {
        share,
        n_titles,
        counts,
    })
}

/// Per-category performance, one row per label in lexical order.
pub fn group_table(data: &Dataset, group_field: &str) -> AnalysisResult<GroupTable> {
    let labels = data.categorical(group_field)?;
    let views = data.numeric("views")?;
    let likes_per_view = data.numeric("likes_per_view")?;
    let comments_per_view = data.numeric("comments_per_view")?;
    let engagement_rate = data.numeric("engagement_rate")?;
    let duration_min = data.numeric("duration_min")?;

    let mut members: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (idx, label) in labels.iter().enumerate() {
        if let Some(label) = label {
            members.entry(label.as_str()).or_default().push(idx);
        }
    }

    let rows = members
        .into_iter()
        .map(|(label, idxs)| {
            let group_views = present_at(views, &idxs);
            GroupRow {
                label: label.to_string(),
                count: idxs.len(),
                mean_views: mean_of(&group_views),
                median_views: (!group_views.is_empty()).then(|| compute_median(&group_views)),
                total_views: group_views.iter().sum(),
                mean_likes_per_view: mean_of(&present_at(likes_per_view, &idxs)),
                mean_comments_per_view: mean_of(&present_at(comments_per_view, &idxs)),
                mean_engagement_rate: mean_of(&present_at(engagement_rate, &idxs)),
                mean_duration_min: mean_of(&present_at(duration_min, &idxs)),
            }
        })
        .collect();

    Ok(GroupTable {
        field: group_field.to_string(),
        rows,
    })
}

/// Correlation of every pair of `fields`, each pair over the rows where
/// both are present.
pub fn correlation_matrix(data: &Dataset, fields: &[String]) -> AnalysisResult<CorrelationMatrix> {
    let n_fields = fields.len();
    let mut coefficients = vec![vec![None; n_fields]; n_fields];
    for i_field in 0..n_fields {
        for j_field in i_field..n_fields {
            let (x_vals, y_vals) = data.paired(&fields[i_field], &fields[j_field])?;
            let coefficient = pearson(&x_vals, &y_vals).ok().map(|(r, _)| r);
            coefficients[i_field][j_field] = coefficient;
            coefficients[j_field][i_field] = coefficient;
        }
    }
    Ok(CorrelationMatrix {
        fields: fields.to_vec(),
        coefficients,
    })
}

/// Views and engagement per period, in lexical order of the period label.
pub fn period_table(data: &Dataset, period_field: &str) -> AnalysisResult<PeriodTable> {
    let periods = data.categorical(period_field)?;
    let views = data.numeric("views")?;
    let engagement_rate = data.numeric("engagement_rate")?;

    let mut members: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (idx, period) in periods.iter().enumerate() {
        if let Some(period) = period {
            members.entry(period.as_str()).or_default().push(idx);
        }
    }

    let rows = members
        .into_iter()
        .map(|(period, idxs)| PeriodRow {
            period: period.to_string(),
            count: idxs.len(),
            total_views: present_at(views, &idxs).iter().sum(),
            mean_engagement_rate: mean_of(&present_at(engagement_rate, &idxs)),
        })
        .collect();

    Ok(PeriodTable {
        field: period_field.to_string(),
        rows,
    })
}

fn present_at(cells: &[Option<f64>], idxs: &[usize]) -> Vec<f64> {
    idxs.iter().filter_map(|&idx| cells[idx]).collect()
}

fn mean_of(vals: &[f64]) -> Option<f64> {
    (!vals.is_empty()).then(|| Accumulator::from_vals(vals).mean())
}
