//! Classical hypothesis tests over a [`Dataset`].

use crate::dataset::{Dataset, Group};
use crate::error::{AnalysisError, AnalysisResult};
use crate::range_dist::{ptukey, qtukey};
use crate::stats::{Accumulator, compute_median, compute_ranks, normal_cdf};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, FisherSnedecor, StudentsT};

/// Pearson correlation between two numeric fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    pub x_field: String,
    pub y_field: String,
    pub n_pairs: usize,
    pub coefficient: f64,
    pub p_value: f64,
    pub significant: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub label: String,
    pub count: usize,
    pub mean: f64,
    pub std_dev: Option<f64>,
}

/// Group left out of a test for having too few observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedGroup {
    pub label: String,
    pub count: usize,
}

/// Tukey HSD comparison of two groups.
///
/// `mean_diff` is `mean(group_a) - mean(group_b)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairwiseComparison {
    pub group_a: String,
    pub group_b: String,
    pub mean_diff: f64,
    pub std_err: f64,
    pub q_stat: f64,
    pub p_adj: f64,
    pub lower: f64,
    pub upper: f64,
    pub significant: bool,
}

/// One-way analysis of variance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anova {
    pub outcome: String,
    pub group: String,
    pub f_stat: f64,
    pub df_between: usize,
    pub df_within: usize,
    pub p_value: f64,
    pub significant: bool,
    /// Retained groups, highest mean first.
    pub groups: Vec<GroupSummary>,
    pub excluded: Vec<ExcludedGroup>,
    /// Present only when the overall test is significant.
    pub post_hoc: Option<Vec<PairwiseComparison>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TTest {
    pub t_stat: f64,
    pub df: usize,
    pub p_value: f64,
    pub significant: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UMethod {
    Exact,
    Asymptotic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MannWhitney {
    /// U statistic of the first group.
    pub u_stat: f64,
    pub method: UMethod,
    pub p_value: f64,
    pub significant: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Magnitude {
    Negligible,
    Small,
    Medium,
    Large,
}

impl Magnitude {
    pub fn of(cohens_d: f64) -> Self {
        match cohens_d.abs() {
            d if d < 0.2 => Magnitude::Negligible,
            d if d < 0.5 => Magnitude::Small,
            d if d < 0.8 => Magnitude::Medium,
            _ => Magnitude::Large,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectSize {
    pub cohens_d: f64,
    pub magnitude: Magnitude,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSummary {
    pub label: String,
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std_dev: Option<f64>,
    /// Fraction of the compared observations in this group.
    pub content_share: f64,
    /// Mean of the companion field over this group, when one is set.
    pub companion_mean: Option<f64>,
}

/// Comparison of two groups.
///
/// Each sub-result carries its own verdict; none is privileged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwoGroup {
    pub outcome: String,
    pub group: String,
    pub companion: Option<String>,
    pub first: SampleSummary,
    pub second: SampleSummary,
    pub t_test: TTest,
    pub mann_whitney: MannWhitney,
    pub effect_size: EffectSize,
}

/// Pearson correlation test with pairwise deletion.
pub fn correlate(
    data: &Dataset,
    x_field: &str,
    y_field: &str,
    significance: f64,
) -> AnalysisResult<Correlation> {
    let (x_vals, y_vals) = data.paired(x_field, y_field)?;
    let (coefficient, p_value) = pearson(&x_vals, &y_vals)?;
    Ok(Correlation {
        x_field: x_field.to_string(),
        y_field: y_field.to_string(),
        n_pairs: x_vals.len(),
        coefficient,
        p_value,
        significant: p_value < significance,
    })
}

/// Correlation coefficient and its two-sided p-value.
pub fn pearson(x_vals: &[f64], y_vals: &[f64]) -> AnalysisResult<(f64, f64)> {
    const MIN_PAIRS: usize = 3;

    if x_vals.len() != y_vals.len() {
        return Err(AnalysisError::Schema {
            reason: format!(
                "{} x values paired with {} y values",
                x_vals.len(),
                y_vals.len()
            ),
        });
    }
    let n_pairs = x_vals.len();
    if n_pairs < MIN_PAIRS {
        return Err(AnalysisError::InsufficientData {
            required: MIN_PAIRS,
            found: n_pairs,
        });
    }

    let x_mean = Accumulator::from_vals(x_vals).mean();
    let y_mean = Accumulator::from_vals(y_vals).mean();
    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for (&x, &y) in x_vals.iter().zip(y_vals) {
        let dx = x - x_mean;
        let dy = y - y_mean;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return Err(AnalysisError::undefined(
            "correlation of a field with zero variance",
        ));
    }

    let r = (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0);
    if 1.0 - r.abs() <= 1e-12 {
        return Ok((r.signum(), 0.0));
    }

    let df = (n_pairs - 2) as f64;
    let t_stat = r * (df / (1.0 - r * r)).sqrt();
    let p_value = two_sided_t(t_stat, df)?;
    Ok((r, p_value))
}

/// One-way ANOVA with listwise deletion and Tukey HSD follow-up.
pub fn one_way_anova(
    data: &Dataset,
    outcome: &str,
    group: &str,
    min_group_size: usize,
    significance: f64,
) -> AnalysisResult<Anova> {
    let (retained, excluded): (Vec<Group>, Vec<Group>) = data
        .grouped(outcome, group)?
        .into_iter()
        .partition(|grp| grp.vals.len() >= min_group_size);

    let excluded: Vec<_> = excluded
        .into_iter()
        .map(|grp| ExcludedGroup {
            count: grp.vals.len(),
            label: grp.label,
        })
        .collect();
    for grp in &excluded {
        log::warn!(
            "excluded group {:?} of {group:?} ({} < {min_group_size} observations)",
            grp.label,
            grp.count
        );
    }

    let table = anova_table(&retained)?;
    let significant = table.p_value < significance;

    let mut groups: Vec<_> = retained
        .iter()
        .zip(&table.accs)
        .map(|(grp, acc)| GroupSummary {
            label: grp.label.clone(),
            count: acc.n_vals(),
            mean: acc.mean(),
            std_dev: acc.sample_var().map(f64::sqrt),
        })
        .collect();
    groups.sort_by(|a, b| b.mean.total_cmp(&a.mean));

    let post_hoc = significant
        .then(|| tukey_hsd(&groups, table.ms_within, table.df_within, significance));

    Ok(Anova {
        outcome: outcome.to_string(),
        group: group.to_string(),
        f_stat: table.f_stat,
        df_between: table.df_between,
        df_within: table.df_within,
        p_value: table.p_value,
        significant,
        groups,
        excluded,
        post_hoc,
    })
}

struct AnovaTable {
    accs: Vec<Accumulator>,
    f_stat: f64,
    df_between: usize,
    df_within: usize,
    ms_within: f64,
    p_value: f64,
}

fn anova_table(groups: &[Group]) -> AnalysisResult<AnovaTable> {
    let n_groups = groups.len();
    if n_groups < 2 {
        return Err(AnalysisError::InsufficientGroups { found: n_groups });
    }

    let accs: Vec<_> = groups
        .iter()
        .map(|grp| Accumulator::from_vals(&grp.vals))
        .collect();
    let n_total: usize = accs.iter().map(Accumulator::n_vals).sum();
    let grand_mean = accs
        .iter()
        .map(|acc| acc.mean() * acc.n_vals() as f64)
        .sum::<f64>()
        / n_total as f64;

    let ss_between: f64 = accs
        .iter()
        .map(|acc| acc.n_vals() as f64 * (acc.mean() - grand_mean).powi(2))
        .sum();
    let ss_within: f64 = accs.iter().map(Accumulator::sum_sq_dev).sum();
    if ss_within <= 0.0 {
        return Err(AnalysisError::undefined("within-group variance is zero"));
    }

    let df_between = n_groups - 1;
    let df_within = n_total - n_groups;
    let ms_between = ss_between / df_between as f64;
    let ms_within = ss_within / df_within as f64;
    let f_stat = ms_between / ms_within;

    let f_dist = FisherSnedecor::new(df_between as f64, df_within as f64)
        .map_err(|err| AnalysisError::undefined(err.to_string()))?;
    let p_value = f_dist.sf(f_stat).clamp(0.0, 1.0);

    Ok(AnovaTable {
        accs,
        f_stat,
        df_between,
        df_within,
        ms_within,
        p_value,
    })
}

/// All pairwise comparisons (Tukey-Kramer for unequal sizes).
fn tukey_hsd(
    groups: &[GroupSummary],
    ms_within: f64,
    df_within: usize,
    significance: f64,
) -> Vec<PairwiseComparison> {
    let n_means = groups.len() as f64;
    let df = df_within as f64;
    let q_crit = qtukey(1.0 - significance, n_means, df);

    let mut comparisons = Vec::with_capacity(groups.len() * (groups.len() - 1) / 2);
    for (i_grp, grp_a) in groups.iter().enumerate() {
        for grp_b in &groups[i_grp + 1..] {
            let mean_diff = grp_a.mean - grp_b.mean;
            let std_err = (ms_within / 2.0
                * (1.0 / grp_a.count as f64 + 1.0 / grp_b.count as f64))
                .sqrt();
            let q_stat = mean_diff.abs() / std_err;
            let p_adj = (1.0 - ptukey(q_stat, n_means, df)).clamp(0.0, 1.0);
            let margin = q_crit * std_err;
            comparisons.push(PairwiseComparison {
                group_a: grp_a.label.clone(),
                group_b: grp_b.label.clone(),
                mean_diff,
                std_err,
                q_stat,
                p_adj,
                lower: mean_diff - margin,
                upper: mean_diff + margin,
                significant: p_adj < significance,
            });
        }
    }
    comparisons
}

/// Two-sample t-test, Mann-Whitney U test and Cohen's d on one outcome.
///
/// With `levels`, only those two categories are compared, in that order;
/// otherwise the grouping field itself must have exactly two categories.
/// With `companion`, that numeric field is also averaged per group.
pub fn compare_two_groups(
    data: &Dataset,
    outcome: &str,
    group: &str,
    levels: Option<&[String]>,
    companion: Option<&str>,
    min_group_size: usize,
    significance: f64,
) -> AnalysisResult<TwoGroup> {
    let mut groups = data.grouped(outcome, group)?;
    if let Some(levels) = levels {
        groups = levels
            .iter()
            .filter_map(|level| groups.iter().find(|grp| &grp.label == level).cloned())
            .collect();
    }

    let [first, second] = <[Group; 2]>::try_from(groups).map_err(|groups| {
        AnalysisError::InvalidGroupCount {
            found: groups.len(),
        }
    })?;
    for grp in [&first, &second] {
        if grp.vals.len() < min_group_size {
            return Err(AnalysisError::InsufficientData {
                required: min_group_size,
                found: grp.vals.len(),
            });
        }
    }

    let t_test = t_test(&first.vals, &second.vals, significance)?;
    let mann_whitney = mann_whitney(&first.vals, &second.vals, significance)?;
    let cohens_d = cohens_d(&first.vals, &second.vals)?;

    let companion_groups = match companion {
        Some(field) => Some(data.grouped(field, group)?),
        None => None,
    };
    let n_compared = first.vals.len() + second.vals.len();
    let summarize = |grp: &Group| {
        let companion_mean = companion_groups.as_ref().and_then(|groups| {
            groups
                .iter()
                .find(|other| other.label == grp.label)
                .map(|other| Accumulator::from_vals(&other.vals).mean())
        });
        sample_summary(grp, n_compared, companion_mean)
    };

    Ok(TwoGroup {
        outcome: outcome.to_string(),
        group: group.to_string(),
        companion: companion.map(String::from),
        first: summarize(&first),
        second: summarize(&second),
        t_test,
        mann_whitney,
        effect_size: EffectSize {
            cohens_d,
            magnitude: Magnitude::of(cohens_d),
        },
    })
}

fn sample_summary(
    grp: &Group,
    n_compared: usize,
    companion_mean: Option<f64>,
) -> SampleSummary {
    let acc = Accumulator::from_vals(&grp.vals);
    SampleSummary {
        label: grp.label.clone(),
        count: acc.n_vals(),
        mean: acc.mean(),
        median: compute_median(&grp.vals),
        std_dev: acc.sample_var().map(f64::sqrt),
        content_share: acc.n_vals() as f64 / n_compared as f64,
        companion_mean,
    }
}

/// Student's t-test with the pooled variance estimate.
pub fn t_test(a_vals: &[f64], b_vals: &[f64], significance: f64) -> AnalysisResult<TTest> {
    let acc_a = Accumulator::from_vals(a_vals);
    let acc_b = Accumulator::from_vals(b_vals);
    if acc_a.n_vals() < 2 || acc_b.n_vals() < 2 {
        return Err(AnalysisError::InsufficientData {
            required: 2,
            found: acc_a.n_vals().min(acc_b.n_vals()),
        });
    }

    let df = acc_a.n_vals() + acc_b.n_vals() - 2;
    let pooled_var = (acc_a.sum_sq_dev() + acc_b.sum_sq_dev()) / df as f64;
    if pooled_var <= 0.0 {
        return Err(AnalysisError::undefined("both groups have zero variance"));
    }

    let std_err =
        (pooled_var * (1.0 / acc_a.n_vals() as f64 + 1.0 / acc_b.n_vals() as f64)).sqrt();
    let t_stat = (acc_a.mean() - acc_b.mean()) / std_err;
    let p_value = two_sided_t(t_stat, df as f64)?;

    Ok(TTest {
        t_stat,
        df,
        p_value,
        significant: p_value < significance,
    })
}

/// Two-sided Mann-Whitney U test.
///
/// Exact when the smaller sample has at most 8 values and nothing is tied,
/// normal approximation with tie and continuity corrections otherwise.
pub fn mann_whitney(
    a_vals: &[f64],
    b_vals: &[f64],
    significance: f64,
) -> AnalysisResult<MannWhitney> {
    const MAX_EXACT: usize = 8;

    let n_a = a_vals.len();
    let n_b = b_vals.len();
    if n_a == 0 || n_b == 0 {
        return Err(AnalysisError::InsufficientData {
            required: 1,
            found: 0,
        });
    }

    let combined: Vec<f64> = a_vals.iter().chain(b_vals).copied().collect();
    let (ranks, tie_term) = compute_ranks(&combined);
    let rank_sum_a: f64 = ranks[..n_a].iter().sum();
    let u_stat = rank_sum_a - (n_a * (n_a + 1)) as f64 / 2.0;
    let n_prod = (n_a * n_b) as f64;
    let u_max = u_stat.max(n_prod - u_stat);

    let (method, p_value) = if tie_term == 0.0 && n_a.min(n_b) <= MAX_EXACT {
        let dist = exact_u_dist(n_a, n_b);
        let upper_tail: f64 = dist[u_max.round() as usize..].iter().sum();
        (UMethod::Exact, (2.0 * upper_tail).min(1.0))
    } else {
        let n_total = (n_a + n_b) as f64;
        let var = n_prod / 12.0 * ((n_total + 1.0) - tie_term / (n_total * (n_total - 1.0)));
        if var <= 0.0 {
            return Err(AnalysisError::undefined("all values are tied"));
        }
        let z_stat = (u_max - n_prod / 2.0 - 0.5) / var.sqrt();
        (UMethod::Asymptotic, (2.0 * normal_cdf(-z_stat)).min(1.0))
    };

    Ok(MannWhitney {
        u_stat,
        method,
        p_value,
        significant: p_value < significance,
    })
}

/// Null distribution of U for samples of sizes `n_a` and `n_b`.
///
/// Built from the largest remaining value: it belongs to the first sample
/// with probability `m / (m + n)` and then beats all `n` values of the second.
fn exact_u_dist(n_a: usize, n_b: usize) -> Vec<f64> {
    // prev[n] is the distribution for sizes (m - 1, n).
    let mut prev: Vec<Vec<f64>> = vec![vec![1.0]; n_b + 1];
    for m in 1..=n_a {
        let mut cur: Vec<Vec<f64>> = Vec::with_capacity(n_b + 1);
        cur.push(vec![1.0]);
        for n in 1..=n_b {
            let weight_a = m as f64 / (m + n) as f64;
            let weight_b = n as f64 / (m + n) as f64;
            let mut dist = vec![0.0; m * n + 1];
            for (u, &prob) in prev[n].iter().enumerate() {
                dist[u + n] += weight_a * prob;
            }
            for (u, &prob) in cur[n - 1].iter().enumerate() {
                dist[u] += weight_b * prob;
            }
            cur.push(dist);
        }
        prev = cur;
    }
    prev.swap_remove(n_b)
}

/// Difference of means over the root mean of the population variances.
pub fn cohens_d(a_vals: &[f64], b_vals: &[f64]) -> AnalysisResult<f64> {
    let acc_a = Accumulator::from_vals(a_vals);
    let acc_b = Accumulator::from_vals(b_vals);
    let (Some(var_a), Some(var_b)) = (acc_a.pop_var(), acc_b.pop_var()) else {
        return Err(AnalysisError::InsufficientData {
            required: 1,
            found: 0,
        });
    };
    let pooled_std = ((var_a + var_b) / 2.0).sqrt();
    if pooled_std <= 0.0 {
        return Err(AnalysisError::undefined("both groups have zero variance"));
    }
    Ok((acc_a.mean() - acc_b.mean()) / pooled_std)
}

fn two_sided_t(t_stat: f64, df: f64) -> AnalysisResult<f64> {
    let t_dist =
        StudentsT::new(0.0, 1.0, df).map_err(|err| AnalysisError::undefined(err.to_string()))?;
    Ok((2.0 * t_dist.sf(t_stat.abs())).clamp(0.0, 1.0))
}
