//! Normalization of raw video records into a [`Dataset`].

use crate::dataset::{Column, Dataset};
use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Utc, Weekday};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path};

/// Video metadata as delivered by the acquisition step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawVideo {
    pub video_id: String,
    pub title: String,
    pub views: Option<u64>,
    pub likes: Option<u64>,
    pub comments: Option<u64>,
    /// ISO 8601 duration, e.g. `PT15M30S`.
    pub duration: String,
    /// RFC 3339 timestamp.
    pub published: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Title keywords per category, checked in order.
const CATEGORY_KEYWORDS: [(&str, &[&str]); 6] = [
    (
        "Tutorial",
        &[
            "tutorial",
            "how to",
            "guide",
            "learn",
            "beginner",
            "advanced",
            "intermediate",
            "basics",
            "step by step",
            "complete",
            "full course",
            "training",
        ],
    ),
    (
        "Career",
        &[
            "career",
            "job",
            "salary",
            "interview",
            "resume",
            "hiring",
            "work",
            "employment",
            "promotion",
            "cv",
            "recruiter",
        ],
    ),
    (
        "Project",
        &[
            "project",
            "portfolio",
            "bootcamp",
            "full project",
            "hands-on",
            "practical",
            "real world",
        ],
    ),
    (
        "Tools",
        &[
            "excel", "sql", "python", "tableau", "power bi", "pandas", "mysql", "jupyter",
            "anaconda", "azure", "aws",
        ],
    ),
    (
        "Q&A/Livestream",
        &[
            "q&a",
            "qa",
            "livestream",
            "ask me anything",
            "ama",
            "live",
            "questions",
            "answers",
        ],
    ),
    (
        "Advice",
        &[
            "tips",
            "mistakes",
            "reasons",
            "best",
            "top",
            "avoid",
            "should",
            "shouldn't",
            "advice",
            "recommendation",
        ],
    ),
];

/// Upper bounds in minutes (inclusive) of the duration buckets.
const DURATION_BUCKETS: [(f64, &str); 5] = [
    (5.0, "Very Short (<5min)"),
    (15.0, "Short (5-15min)"),
    (30.0, "Medium (15-30min)"),
    (60.0, "Long (30-60min)"),
    (f64::INFINITY, "Very Long (>60min)"),
];

/// Load raw video records from a JSON file.
pub fn load_videos<P: AsRef<Path>>(file: P) -> Result<Vec<RawVideo>> {
    let file = file.as_ref();
    let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader).context("failed to deserialize videos")
}

pub struct Preparer {
    duration_re: Regex,
}

impl Preparer {
    pub fn new() -> Result<Self> {
        let duration_re =
            Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+(?:\.\d+)?)S)?)?$")
                .context("failed to compile duration pattern")?;
        Ok(Self { duration_re })
    }

    /// Convert an ISO 8601 duration to seconds.
    pub fn duration_to_seconds(&self, duration: &str) -> Result<f64> {
        let caps = self
            .duration_re
            .captures(duration)
            .with_context(|| format!("invalid duration {duration:?}"))?;

        let mut total = 0.0;
        for (idx, scale) in [(1, 86_400.0), (2, 3_600.0), (3, 60.0), (4, 1.0)] {
            if let Some(part) = caps.get(idx) {
                let val: f64 = part
                    .as_str()
                    .parse()
                    .with_context(|| format!("invalid duration {duration:?}"))?;
                total += val * scale;
            }
        }
        Ok(total)
    }

    /// Build the analysis table, one row per video.
    pub fn prepare(&self, videos: &[RawVideo]) -> Result<Dataset> {
        let mut rows = Rows::default();
        for video in videos {
            rows.push(self, video)
                .with_context(|| format!("failed to prepare video {:?}", video.video_id))?;
        }
        log::info!("prepared {} videos", videos.len());

        Dataset::new(rows.into_columns()).context("failed to build dataset")
    }
}

#[derive(Default)]
struct Rows {
    video_id: Vec<Option<String>>,
    title: Vec<Option<String>>,
    published: Vec<Option<String>>,
    views: Vec<Option<f64>>,
    likes: Vec<Option<f64>>,
    comments: Vec<Option<f64>>,
    duration_sec: Vec<Option<f64>>,
    duration_min: Vec<Option<f64>>,
    likes_per_view: Vec<Option<f64>>,
    comments_per_view: Vec<Option<f64>>,
    engagement_rate: Vec<Option<f64>>,
    day_of_week: Vec<Option<f64>>,
    month: Vec<Option<f64>>,
    year: Vec<Option<f64>>,
    day_name: Vec<Option<String>>,
    upload_quarter: Vec<Option<String>>,
    category: Vec<Option<String>>,
    duration_category: Vec<Option<String>>,
}

impl Rows {
    fn push(&mut self, preparer: &Preparer, video: &RawVideo) -> Result<()> {
        let duration_sec = match preparer.duration_to_seconds(&video.duration) {
            Ok(duration_sec) => Some(duration_sec),
            Err(error) => {
                log::warn!("video {:?}: {error:#}", video.video_id);
                None
            }
        };
        let published = DateTime::parse_from_rfc3339(&video.published)
            .with_context(|| format!("invalid timestamp {:?}", video.published))?
            .with_timezone(&Utc);

        let views = video.views.map(|val| val as f64);
        let likes = video.likes.map(|val| val as f64);
        let comments = video.comments.map(|val| val as f64);
        // Zero views count as one so rates stay finite.
        let per_view = |count: Option<f64>| Some(count? / views?.max(1.0));
        let engagement = likes.zip(comments).map(|(l, c)| l + c);

        self.video_id.push(Some(video.video_id.clone()));
        self.title.push(Some(video.title.clone()));
        self.published.push(Some(published.to_rfc3339()));
        self.views.push(views);
        self.likes.push(likes);
        self.comments.push(comments);
        self.duration_sec.push(duration_sec);
        self.duration_min.push(duration_sec.map(|sec| sec / 60.0));
        self.likes_per_view.push(per_view(likes));
        self.comments_per_view.push(per_view(comments));
        self.engagement_rate.push(per_view(engagement));
        self.day_of_week
            .push(Some(published.weekday().num_days_from_monday() as f64));
        self.month.push(Some(published.month() as f64));
        self.year.push(Some(published.year() as f64));
        self.day_name.push(Some(day_name(published.weekday()).to_string()));
        self.upload_quarter.push(Some(format!(
            "{}Q{}",
            published.year(),
            published.month0() / 3 + 1
        )));
        self.category
            .push(Some(categorize_title(&video.title).to_string()));
        self.duration_category.push(
            duration_sec
                .and_then(|sec| duration_bucket(sec / 60.0))
                .map(String::from),
        );

        Ok(())
    }

    fn into_columns(self) -> Vec<(String, Column)> {
        let text = |name: &str, cells| (name.to_string(), Column::Categorical(cells));
        let num = |name: &str, cells| (name.to_string(), Column::Numeric(cells));
        vec![
            text("video_id", self.video_id),
            text("title", self.title),
            text("published", self.published),
            num("views", self.views),
            num("likes", self.likes),
            num("comments", self.comments),
            num("duration_sec", self.duration_sec),
            num("duration_min", self.duration_min),
            num("likes_per_view", self.likes_per_view),
            num("comments_per_view", self.comments_per_view),
            num("engagement_rate", self.engagement_rate),
            num("day_of_week", self.day_of_week),
            num("month", self.month),
            num("year", self.year),
            text("day_name", self.day_name),
            text("upload_quarter", self.upload_quarter),
            text("category", self.category),
            text("duration_category", self.duration_category),
        ]
    }
}

/// Category of a video, from the first keyword list matching its title.
pub fn categorize_title(title: &str) -> &'static str {
    let title = title.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|keyword| title.contains(keyword)))
        .map_or("Other", |(category, _)| *category)
}

/// Duration bucket label; zero-length videos fall in none.
pub fn duration_bucket(duration_min: f64) -> Option<&'static str> {
    if duration_min <= 0.0 {
        return None;
    }
    DURATION_BUCKETS
        .iter()
        .find(|(upper, _)| duration_min <= *upper)
        .map(|(_, label)| *label)
}

fn day_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}
