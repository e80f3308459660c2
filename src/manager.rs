use crate::analysis::Analyzer;
use crate::config::Config;
use crate::dataset::Dataset;
use crate::insights::Insights;
use crate::prepare::{Preparer, load_videos};
use crate::report::Report;
use anyhow::{Context, Result, bail};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub struct Manager {
    work_dir: PathBuf,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(work_dir: P) -> Result<Self> {
        let work_dir = work_dir.as_ref().to_path_buf();
        if !work_dir.is_dir() {
            bail!("{work_dir:?} is not a directory");
        }
        Ok(Self { work_dir })
    }

    pub fn prepare_dataset(&self) -> Result<()> {
        let videos_file = self.videos_file();
        let videos =
            load_videos(&videos_file).with_context(|| format!("failed to load {videos_file:?}"))?;
        log::info!("loaded {} videos from {videos_file:?}", videos.len());

        let preparer = Preparer::new().context("failed to construct preparer")?;
        let dataset = preparer
            .prepare(&videos)
            .context("failed to prepare dataset")?;

        let dataset_file = self.dataset_file();
        dataset
            .save(&dataset_file)
            .with_context(|| format!("failed to save {dataset_file:?}"))?;
        log::info!("saved {dataset_file:?}");

        Ok(())
    }

    /// Analyze the prepared dataset with `config_file`, or with the work
    /// directory's `config.toml` when none is given.
    pub fn analyze_dataset(&self, config_file: Option<&Path>) -> Result<()> {
        let cfg = self
            .load_config(config_file)
            .context("failed to load config")?;
        log::info!("{cfg:#?}");

        let dataset_file = self.dataset_file();
        let dataset = Dataset::load(&dataset_file)
            .with_context(|| format!("failed to load {dataset_file:?}"))?;
        log::info!(
            "loaded {} rows of {:?}",
            dataset.n_rows(),
            dataset.names()
        );

        let analyzer = Analyzer::new(&cfg);
        log::info!("running {} analyses", analyzer.n_analyses());
        let outcomes = analyzer.run(&dataset);
        let insights = Insights::collect(&dataset, &cfg.insights);

        let report = Report {
            n_rows: dataset.n_rows(),
            significance: cfg.analysis.significance,
            outcomes,
            insights,
        };
        report.log();

        let results_file = self.results_file();
        report
            .save(&results_file)
            .with_context(|| format!("failed to save {results_file:?}"))?;
        log::info!("saved {results_file:?}");

        Ok(())
    }

    /// Remove the dataset and results files; inputs are never touched.
    pub fn clean_outputs(&self) -> Result<()> {
        for file in [self.dataset_file(), self.results_file()] {
            if !file.is_file() {
                continue;
            }
            fs::remove_file(&file).with_context(|| format!("failed to remove {file:?}"))?;
            log::info!("removed {file:?}");
        }

        Ok(())
    }

    fn load_config(&self, config_file: Option<&Path>) -> Result<Config> {
        if let Some(config_file) = config_file {
            return Config::from_file(config_file)
                .with_context(|| format!("failed to read {config_file:?}"));
        }

        let config_file = self.config_file();
        if !config_file.exists() {
            log::info!("{config_file:?} not found, using default config");
            return Ok(Config::default());
        }
        Config::from_file(&config_file).with_context(|| format!("failed to read {config_file:?}"))
    }

    fn videos_file(&self) -> PathBuf {
        self.work_dir.join("videos.json")
    }

    fn config_file(&self) -> PathBuf {
        self.work_dir.join("config.toml")
    }

    fn dataset_file(&self) -> PathBuf {
        self.work_dir.join("dataset.msgpack")
    }

    fn results_file(&self) -> PathBuf {
        self.work_dir.join("results.json")
    }
}
