use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Binary with config, cache and log locations pointed into a scratch dir.
fn post_reel(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("post-reel").expect("binary built");
    cmd.env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join("config"))
        .env("XDG_CACHE_HOME", home.path().join("cache"))
        .env_remove("POST_REEL_LOG");
    cmd
}

const POSTS: &str = r#"{
  "posts": [
    {"post_number": 1, "content": "Sunset over the bay", "timestamp": "2024-01-01T08:00:00",
     "post_type": "image", "media_urls": ["https://cdn.example.com/a.jpg"]},
    {"post_number": 2, "content": "Quarterly update", "timestamp": "2024-02-01T08:00:00",
     "post_type": "text"},
    {"post_number": 3, "content": "Sunset timelapse", "post_type": "video",
     "media_urls": ["blob:https://www.example.com/1"]}
  ]
}"#;

#[test]
fn prints_version() {
    let home = TempDir::new().unwrap();
    post_reel(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn prints_help() {
    let home = TempDir::new().unwrap();
    post_reel(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("post-reel"))
        .stdout(predicate::str::contains("--export"));
}

#[test]
fn rejects_unknown_flags() {
    let home = TempDir::new().unwrap();
    post_reel(&home)
        .arg("--bogus")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown option"));
}

#[test]
fn rejects_unknown_post_type() {
    let home = TempDir::new().unwrap();
    post_reel(&home)
        .args(["--type", "podcast"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown post type"));
}

#[test]
fn headless_export_writes_filtered_posts() {
    let home = TempDir::new().unwrap();
    let input = home.path().join("posts.json");
    fs::write(&input, POSTS).unwrap();
    let out = home.path().join("out");

    post_reel(&home)
        .arg(&input)
        .args(["--search", "sunset"])
        .arg("--export")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 2 posts"));

    let written: Vec<_> = fs::read_dir(&out).unwrap().map(|e| e.unwrap().path()).collect();
    assert_eq!(written.len(), 1);
    let name = written[0].file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("posts_filtered_") && name.ends_with(".json"));

    let exported: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&written[0]).unwrap()).unwrap();
    let numbers: Vec<i64> = exported
        .as_array()
        .unwrap()
        .iter()
        .map(|post| post["post_number"].as_i64().unwrap())
        .collect();
    // Dated post first, undated after.
    assert_eq!(numbers, vec![1, 3]);
}

#[test]
fn headless_export_respects_type_filter() {
    let home = TempDir::new().unwrap();
    let input = home.path().join("posts.json");
    fs::write(&input, POSTS).unwrap();
    let out = home.path().join("out");

    post_reel(&home)
        .arg(&input)
        .args(["--type", "text", "--export"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 1 posts"));
}

#[test]
fn export_of_unrecognized_payload_fails() {
    let home = TempDir::new().unwrap();
    let input = home.path().join("posts.json");
    fs::write(&input, r#"{"items": []}"#).unwrap();

    post_reel(&home)
        .arg(&input)
        .arg("--export")
        .arg(home.path().join("out"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("posts"));
}

#[test]
fn export_without_source_fails() {
    let home = TempDir::new().unwrap();
    post_reel(&home)
        .arg("--export")
        .arg(home.path().join("out"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("--export needs"));
}

#[test]
fn demo_feed_exports_headless() {
    let home = TempDir::new().unwrap();
    post_reel(&home)
        .args(["--demo", "--export"])
        .arg(home.path().join("out"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 3 posts"));
}
