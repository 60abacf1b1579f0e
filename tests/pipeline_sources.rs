// tests/pipeline_sources.rs

mod common;
use crate::common::TestResult;

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sitepipe::config::Globs;
use sitepipe::fs::mock::MockFileSystem;
use sitepipe::tasks::pipeline::{collect_sources, filter_since, glob_base, walk_files};
use sitepipe::tasks::TaskReport;

fn at(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

fn scss_tree() -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_file("/site/src/scss/main.scss", "@use 'vars';");
    fs.add_file("/site/src/scss/_vars.scss", "$c: red;");
    fs.add_file("/site/src/scss/pages/home.scss", ".home { color: blue; }");
    fs.add_file("/site/src/scss/notes.txt", "not a stylesheet");
    fs
}

fn rels(sources: &[sitepipe::tasks::pipeline::SourceFile]) -> Vec<String> {
    sources
        .iter()
        .map(|s| s.rel.to_string_lossy().replace('\\', "/"))
        .collect()
}

#[test]
fn glob_base_stops_at_the_first_wildcard_component() {
    assert_eq!(glob_base("src/scss/**/*.scss"), PathBuf::from("src/scss"));
    assert_eq!(glob_base("src/js/*.js"), PathBuf::from("src/js"));
    assert_eq!(glob_base("./src/images/{a,b}/*.png"), PathBuf::from("src/images"));
    assert_eq!(glob_base("**/*.html"), PathBuf::new());
}

#[test]
fn literal_pattern_is_based_at_its_parent() {
    assert_eq!(glob_base("src/index.html"), PathBuf::from("src"));
    assert_eq!(glob_base("favicon.ico"), PathBuf::new());
}

#[test]
fn sources_keep_their_path_below_the_glob_base() -> TestResult {
    let fs = scss_tree();
    let globs = Globs::new(["src/scss/**/*.scss"]);

    let sources = collect_sources(&fs, Path::new("/site"), &globs, None)?;

    assert_eq!(rels(&sources), vec!["_vars.scss", "main.scss", "pages/home.scss"]);
    let out = sources[2].dest_with_extension(Path::new("/site/dist/css"), "css");
    assert_eq!(out, PathBuf::from("/site/dist/css/pages/home.css"));
    Ok(())
}

#[test]
fn exclusion_patterns_remove_matches() -> TestResult {
    let fs = scss_tree();
    let globs = Globs::new(["src/scss/**/*.scss", "!src/scss/**/_*.scss"]);

    let sources = collect_sources(&fs, Path::new("/site"), &globs, None)?;

    assert_eq!(rels(&sources), vec!["main.scss", "pages/home.scss"]);
    Ok(())
}

#[test]
fn single_star_does_not_cross_directories() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file("/site/src/index.html", "<p>home</p>");
    fs.add_file("/site/src/blog/post.html", "<p>post</p>");

    let shallow = collect_sources(&fs, Path::new("/site"), &Globs::new(["src/*.html"]), None)?;
    assert_eq!(rels(&shallow), vec!["index.html"]);

    let deep = collect_sources(&fs, Path::new("/site"), &Globs::new(["src/**/*.html"]), None)?;
    assert_eq!(rels(&deep), vec!["blog/post.html", "index.html"]);
    Ok(())
}

#[test]
fn overlapping_patterns_yield_each_file_once() -> TestResult {
    let fs = scss_tree();
    let globs = Globs::new(["src/scss/**/*.scss", "src/scss/main.scss"]);

    let sources = collect_sources(&fs, Path::new("/site"), &globs, None)?;
    assert_eq!(sources.len(), 3);
    Ok(())
}

#[test]
fn missing_base_directory_matches_nothing() -> TestResult {
    let fs = scss_tree();
    let sources = collect_sources(&fs, Path::new("/site"), &Globs::new(["src/fonts/**/*"]), None)?;
    assert!(sources.is_empty());
    assert!(walk_files(&fs, Path::new("/site/src/fonts"))?.is_empty());
    Ok(())
}

#[test]
fn base_override_keeps_the_package_directory() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file("/site/node_modules/jquery/dist/jquery.js", "jq");

    let sources = collect_sources(
        &fs,
        Path::new("/site"),
        &Globs::new(["node_modules/jquery/**/*.*"]),
        Some(Path::new("node_modules")),
    )?;

    assert_eq!(rels(&sources), vec!["jquery/dist/jquery.js"]);
    Ok(())
}

#[test]
fn since_filter_keeps_files_modified_at_or_after_the_last_run() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file_modified_at("/site/src/fonts/old.woff", "old", at(1_000));
    fs.add_file_modified_at("/site/src/fonts/same.woff", "same", at(2_000));
    fs.add_file_modified_at("/site/src/fonts/new.woff", "new", at(3_000));

    let globs = Globs::new(["src/fonts/**/*"]);
    let sources = collect_sources(&fs, Path::new("/site"), &globs, None)?;

    let mut report = TaskReport::default();
    let all = filter_since(&fs, sources.clone(), None, &mut report)?;
    assert_eq!(all.len(), 3);
    assert_eq!(report.skipped, 0);

    let kept = filter_since(&fs, sources, Some(at(2_000)), &mut report)?;
    assert_eq!(rels(&kept), vec!["new.woff", "same.woff"]);
    assert_eq!(report.skipped, 1);
    Ok(())
}
