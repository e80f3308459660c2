use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
};

fn run_bin(args: &[&str], should_succeed: bool) {
    let bin = PathBuf::from(env!("CARGO_BIN_EXE_chanstats"));

    let output = Command::new(bin)
        .args(args)
        .output()
        .expect("failed to execute command");

    let stdout_str =
        std::str::from_utf8(&output.stdout).expect("failed to convert stdout to string");
    let stderr_str =
        std::str::from_utf8(&output.stderr).expect("failed to convert stderr to string");

    assert_eq!(
        output.status.success(),
        should_succeed,
        "unexpected exit status with {args:?}\nstdout:\n{stdout_str}\nstderr:\n{stderr_str}\n"
    );
}

fn videos_json() -> String {
    let mut videos = Vec::new();
    for idx in 0..8 {
        let (title, views) = match idx % 2 {
            0 => (format!("SQL tutorial part {idx}"), 1_000 + 37 * idx),
            _ => (format!("My first job story {idx}"), 300 + 23 * idx),
        };
        videos.push(format!(
            concat!(
                "{{\"video_id\": \"v{idx}\", \"title\": \"{title}\", ",
                "\"views\": {views}, \"likes\": {likes}, \"comments\": {comments}, ",
                "\"duration\": \"PT{min}M{sec}S\", ",
                "\"published\": \"2024-03-{day:02}T15:30:00Z\"}}"
            ),
            idx = idx,
            title = title,
            views = views,
            likes = views / 20 + idx,
            comments = views / 100 + 2 * idx,
            min = 4 + 3 * idx,
            sec = 10 * idx,
            day = 4 + idx % 3,
        ));
    }
    // No like or comment counts at all.
    videos.push(
        concat!(
            "{\"video_id\": \"v8\", \"title\": \"Day in the life\", \"views\": 50, ",
            "\"duration\": \"PT1H2M3S\", \"published\": \"2024-05-11T08:00:00Z\"}"
        )
        .to_string(),
    );
    format!("[{}]", videos.join(",\n"))
}

fn load_results(test_dir: &Path) -> serde_json::Value {
    let contents =
        fs::read_to_string(test_dir.join("results.json")).expect("failed to read results file");
    serde_json::from_str(&contents).expect("failed to parse results file")
}

#[test]
fn basic_workflow() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("basic_workflow");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    fs::write(test_dir.join("videos.json"), videos_json()).expect("failed to write videos file");

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    // Nothing to analyze yet.
    run_bin(&["--work-dir", test_dir_str, "analyze"], false);

    run_bin(&["--work-dir", test_dir_str, "prepare"], true);
    assert!(test_dir.join("dataset.msgpack").is_file());

    // Without a config file the built-in battery runs.
    run_bin(&["--work-dir", test_dir_str, "analyze"], true);
    let results = load_results(&test_dir);
    assert_eq!(results["n_rows"], 9);
    let outcomes = results["outcomes"].as_array().expect("outcomes not an array");
    assert_eq!(outcomes.len(), 13);
    let two_group = &outcomes[12];
    assert_eq!(two_group["status"], "completed");
    assert_eq!(two_group["findings"]["test"], "two_group");
    assert_eq!(two_group["findings"]["first"]["label"], "Tutorial");
    assert_eq!(two_group["findings"]["t_test"]["significant"], true);
    assert_eq!(two_group["findings"]["companion"], "engagement_rate");
    assert_eq!(two_group["findings"]["first"]["content_share"], 0.5);
    assert!(two_group["findings"]["second"]["companion_mean"].is_f64());
    let insights = &results["insights"];
    assert_eq!(insights["top"][0]["rows"][0]["title"], "SQL tutorial part 6");
    assert_eq!(insights["correlation_matrix"]["fields"][0], "views");
    assert_eq!(insights["correlation_matrix"]["coefficients"][0][0], 1.0);
    assert_eq!(insights["quarterly"]["rows"][0]["period"], "2024Q1");
    assert_eq!(insights["quarterly"]["rows"][0]["count"], 8);
    assert_eq!(insights["quarterly"]["rows"][1]["count"], 1);

    let config_contents = String::new()
        + "[analysis]\n"
        + "significance = 0.01\n"
        + "min_group_size = 2\n"
        + "\n"
        + "[summary]\n"
        + "fields = [\"views\", \"subscribers\"]\n"
        + "\n"
        + "[[anova]]\n"
        + "outcome = \"views\"\n"
        + "group = \"category\"\n"
        + "\n"
        + "[[two_group]]\n"
        + "outcome = \"views\"\n"
        + "group = \"category\"\n";
    fs::write(test_dir.join("config.toml"), config_contents).expect("failed to write config file");

    run_bin(&["--work-dir", test_dir_str, "analyze"], true);
    let results = load_results(&test_dir);
    let outcomes = results["outcomes"].as_array().expect("outcomes not an array");
    assert_eq!(outcomes.len(), 4);
    assert_eq!(outcomes[0]["status"], "completed");
    assert_eq!(outcomes[1]["status"], "not_run");
    assert_eq!(outcomes[1]["failure"]["kind"], "unknown_field");
    // "Other" holds a single video, so only two categories take part.
    assert_eq!(outcomes[2]["status"], "completed");
    assert_eq!(outcomes[2]["findings"]["excluded"][0]["label"], "Other");
    assert_eq!(outcomes[3]["status"], "not_run");
    assert_eq!(outcomes[3]["failure"]["kind"], "invalid_group_count");

    fs::write(test_dir.join("config.toml"), "[analysis]\nsignificance = 2.0\n")
        .expect("failed to write config file");
    run_bin(&["--work-dir", test_dir_str, "analyze"], false);

    // An explicit config file takes precedence over config.toml.
    let summary_config = test_dir.join("summary.toml");
    fs::write(&summary_config, "[summary]\nfields = [\"views\"]\n")
        .expect("failed to write config file");
    let summary_config_str = summary_config
        .to_str()
        .expect("failed to convert config path to string");
    run_bin(&["--work-dir", test_dir_str, "clean"], true);
    run_bin(
        &["--work-dir", test_dir_str, "run", "--config", summary_config_str],
        true,
    );
    assert!(test_dir.join("dataset.msgpack").is_file());
    let results = load_results(&test_dir);
    let outcomes = results["outcomes"].as_array().expect("outcomes not an array");
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0]["findings"]["field"], "views");

    let missing_config = test_dir.join("missing.toml");
    let missing_config_str = missing_config
        .to_str()
        .expect("failed to convert config path to string");
    run_bin(
        &["--work-dir", test_dir_str, "analyze", "--config", missing_config_str],
        false,
    );

    // Files sharing a stem with the outputs are left alone.
    fs::write(test_dir.join("dataset.csv"), "video_id\nv0\n").expect("failed to write csv file");
    fs::write(test_dir.join("results.txt"), "notes\n").expect("failed to write notes file");

    run_bin(&["--work-dir", test_dir_str, "clean"], true);
    assert!(!test_dir.join("dataset.msgpack").exists());
    assert!(!test_dir.join("results.json").exists());
    assert!(test_dir.join("videos.json").exists());
    assert!(test_dir.join("dataset.csv").exists());
    assert!(test_dir.join("results.txt").exists());
    assert!(test_dir.join("summary.toml").exists());

    // Cleaning twice is fine.
    run_bin(&["--work-dir", test_dir_str, "clean"], true);

    fs::remove_dir_all(&test_dir).ok();
}
