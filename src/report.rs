use crate::analysis::{Description, Findings, Outcome, TestResult};
use crate::hypothesis::{Anova, Correlation, TwoGroup};
use crate::insights::Insights;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

/// Results of one `analyze` run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub n_rows: usize,
    pub significance: f64,
    pub outcomes: Vec<Outcome>,
    pub insights: Insights,
}

impl Report {
    pub fn n_completed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome, Outcome::Completed(_)))
            .count()
    }

    /// Write the report to the log as text.
    pub fn log(&self) {
        log::info!(
            "{} of {} analyses completed over {} rows (significance level {})",
            self.n_completed(),
            self.outcomes.len(),
            self.n_rows,
            self.significance
        );

        for outcome in &self.outcomes {
            log::info!("== {} ==", outcome.name());
            match outcome {
                Outcome::Completed(TestResult { findings, .. }) => match findings {
                    Findings::Summary(desc) => log_description(desc),
                    Findings::Correlation(corr) => log_correlation(corr),
                    Findings::Anova(anova) => log_anova(anova),
                    Findings::TwoGroup(two_group) => log_two_group(two_group),
                },
                Outcome::NotRun { failure, .. } => log::info!("not run: {failure}"),
            }
        }

        self.log_insights();
    }

    fn log_insights(&self) {
        for top in &self.insights.top {
            log::info!("== top videos by {} ==", top.metric);
            for row in &top.rows {
                log::info!(
                    "{:>3}. {:<60} {:<16} {:.4}",
                    row.rank,
                    row.title.as_deref().unwrap_or("-"),
                    row.group.as_deref().unwrap_or("-"),
                    row.value
                );
            }
        }

        if let Some(keywords) = &self.insights.keywords {
            log::info!(
                "== keywords in the top {:.0}% ({} titles) ==",
                keywords.share * 100.0,
                keywords.n_titles
            );
            for kc in &keywords.counts {
                log::info!("{:.<30} {:>4}", kc.keyword, kc.count);
            }
        }

        if let Some(table) = &self.insights.groups {
            log::info!("== performance by {} ==", table.field);
            for row in &table.rows {
                log::info!(
                    "{:<16} n={:<4} mean={} median={} total={:.0} engagement={} minutes={}",
                    row.label,
                    row.count,
                    fmt_opt(row.mean_views, 2),
                    fmt_opt(row.median_views, 2),
                    row.total_views,
                    fmt_opt(row.mean_engagement_rate, 4),
                    fmt_opt(row.mean_duration_min, 2)
                );
            }
        }

        if let Some(matrix) = &self.insights.correlation_matrix {
            log::info!("== correlation matrix ==");
            log::info!("{:<20} {}", "", matrix.fields.join(" "));
            for (field, coefficients) in matrix.fields.iter().zip(&matrix.coefficients) {
                let cells: Vec<String> = coefficients
                    .iter()
                    .map(|r| format!("{:>6}", fmt_opt(*r, 3)))
                    .collect();
                log::info!("{:<20} {}", field, cells.join(" "));
            }
        }

        if let Some(table) = &self.insights.quarterly {
            log::info!("== views by {} ==", table.field);
            for row in &table.rows {
                log::info!(
                    "{:<10} n={:<4} total={:.0} engagement={}",
                    row.period,
                    row.count,
                    row.total_views,
                    fmt_opt(row.mean_engagement_rate, 4)
                );
            }
        }
    }

    /// Save the report to a JSON file.
    pub fn save<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self).context("failed to serialize report")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }
}

fn log_description(desc: &Description) {
    log::info!(
        "{}: n={} mean={:.4} sd={} min={} q1={} median={} q3={} max={}",
        desc.field,
        desc.count,
        desc.mean,
        fmt_opt(desc.std_dev, 4),
        desc.min,
        desc.q1,
        desc.median,
        desc.q3,
        desc.max
    );
}

fn log_correlation(corr: &Correlation) {
    log::info!(
        "{} vs {}: r={:.4} p={:.4} (n={}) {}",
        corr.x_field,
        corr.y_field,
        corr.coefficient,
        corr.p_value,
        corr.n_pairs,
        verdict(corr.significant)
    );
}

fn log_anova(anova: &Anova) {
    log::info!(
        "F({}, {})={:.4} p={:.4} {}",
        anova.df_between,
        anova.df_within,
        anova.f_stat,
        anova.p_value,
        verdict(anova.significant)
    );
    for grp in &anova.groups {
        log::info!(
            "  {:<16} n={:<4} mean={:.2} sd={}",
            grp.label,
            grp.count,
            grp.mean,
            fmt_opt(grp.std_dev, 2)
        );
    }
    for grp in &anova.excluded {
        log::info!("  {:<16} n={:<4} excluded", grp.label, grp.count);
    }
    if let (Some(best), Some(worst)) = (anova.groups.first(), anova.groups.last()) {
        log::info!(
            "best {} ({:.2}), worst {} ({:.2})",
            best.label,
            best.mean,
            worst.label,
            worst.mean
        );
    }
    if let Some(pairs) = &anova.post_hoc {
        log::info!("Tukey HSD:");
        for pair in pairs {
            log::info!(
                "  {} - {}: diff={:.2} p={:.4} [{:.2}, {:.2}] {}",
                pair.group_a,
                pair.group_b,
                pair.mean_diff,
                pair.p_adj,
                pair.lower,
                pair.upper,
                if pair.significant { "reject" } else { "-" }
            );
        }
    }
}

fn log_two_group(two_group: &TwoGroup) {
    for sample in [&two_group.first, &two_group.second] {
        log::info!(
            "  {:<16} n={:<4} share={:.1}% mean={:.2} median={:.2} sd={}",
            sample.label,
            sample.count,
            sample.content_share * 100.0,
            sample.mean,
            sample.median,
            fmt_opt(sample.std_dev, 2)
        );
        if let Some(companion) = &two_group.companion {
            log::info!(
                "  {:<16} mean {}={}",
                "",
                companion,
                fmt_opt(sample.companion_mean, 4)
            );
        }
    }
    let t_test = &two_group.t_test;
    log::info!(
        "t({})={:.4} p={:.4} {}",
        t_test.df,
        t_test.t_stat,
        t_test.p_value,
        verdict(t_test.significant)
    );
    let mann_whitney = &two_group.mann_whitney;
    log::info!(
        "U={} p={:.4} ({:?}) {}",
        mann_whitney.u_stat,
        mann_whitney.p_value,
        mann_whitney.method,
        verdict(mann_whitney.significant)
    );
    let effect_size = &two_group.effect_size;
    log::info!(
        "Cohen's d={:.4} ({:?})",
        effect_size.cohens_d,
        effect_size.magnitude
    );
}

fn verdict(significant: bool) -> &'static str {
    if significant {
        "significant"
    } else {
        "not significant"
    }
}

fn fmt_opt(val: Option<f64>, precision: usize) -> String {
    match val {
        Some(val) => format!("{val:.precision$}"),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;
    use crate::insights::CorrelationMatrix;

    #[test]
    fn save_writes_readable_json() {
        let report = Report {
            n_rows: 4,
            significance: 0.05,
            outcomes: vec![
                Outcome::Completed(TestResult {
                    name: "summary of views".to_string(),
                    findings: Findings::Summary(Description {
                        field: "views".to_string(),
                        count: 1,
                        mean: 3.0,
                        std_dev: None,
                        min: 3.0,
                        q1: 3.0,
                        median: 3.0,
                        q3: 3.0,
                        max: 3.0,
                    }),
                }),
                Outcome::NotRun {
                    name: "views by category".to_string(),
                    failure: AnalysisError::InvalidGroupCount { found: 3 },
                },
            ],
            insights: Insights {
                correlation_matrix: Some(CorrelationMatrix {
                    fields: vec!["views".to_string(), "likes".to_string()],
                    coefficients: vec![vec![Some(1.0), None], vec![None, None]],
                }),
                ..Insights::default()
            },
        };
        assert_eq!(report.n_completed(), 1);
        report.log();

        let file = std::env::temp_dir().join(format!(
            "chanstats-report-{}.json",
            std::process::id()
        ));
        report.save(&file).unwrap();
        let contents = std::fs::read_to_string(&file).unwrap();
        std::fs::remove_file(&file).unwrap();

        let json: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(json["outcomes"][0]["status"], "completed");
        assert_eq!(json["outcomes"][0]["findings"]["test"], "summary");
        assert_eq!(json["outcomes"][1]["failure"]["kind"], "invalid_group_count");
        let coefficients = &json["insights"]["correlation_matrix"]["coefficients"];
        assert_eq!(coefficients[0][0], 1.0);
        assert!(coefficients[0][1].is_null());
        assert!(json["insights"]["quarterly"].is_null());

        let loaded: Report = serde_json::from_str(&contents).unwrap();
        assert_eq!(loaded, report);
    }
}
