// tests/tasks_files.rs

mod common;
use crate::common::builders::{mock_path, mock_project, SiteConfigBuilder};
use crate::common::{init_tracing, TestResult};

use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sitepipe::fs::FileSystem;
use sitepipe::tasks::clean::{CleanCache, CleanDist};
use sitepipe::tasks::copy::{CopyHtml, CopyVendors, Fonts};
use sitepipe::tasks::deploy::deploy_command;
use sitepipe::tasks::env::Env;
use sitepipe::tasks::reload::Reload;
use sitepipe::tasks::scripts::{bundler_command, output_path, Scripts};
use sitepipe::tasks::pipeline::SourceFile;
use sitepipe::tasks::vendors::{manifest_dependencies, Vendors};
use sitepipe::tasks::Task;
use sitepipe::types::Mode;
use sitepipe::watch::HashTable;

fn at(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

#[tokio::test]
async fn vendors_with_missing_manifest_writes_nothing() -> TestResult {
    init_tracing();
    let (fs, ctx) = mock_project(SiteConfigBuilder::new().build(), Mode::Development);

    let report = Vendors.run(&ctx).await?;

    assert_eq!(report.written, 0);
    assert!(fs.files_under(mock_path("dist")).is_empty());
    Ok(())
}

#[tokio::test]
async fn vendors_with_no_dependencies_writes_nothing() -> TestResult {
    let (fs, ctx) = mock_project(SiteConfigBuilder::new().build(), Mode::Development);
    fs.add_file(mock_path("package.json"), r#"{ "name": "site", "dependencies": {} }"#);
    fs.add_file(mock_path("node_modules/leftover/index.js"), "x");

    let report = Vendors.run(&ctx).await?;

    assert_eq!(report.written, 0);
    assert!(fs.files_under(mock_path("dist/vendors")).is_empty());
    Ok(())
}

#[tokio::test]
async fn vendors_copies_each_dependency_keeping_its_package_dir() -> TestResult {
    let (fs, ctx) = mock_project(SiteConfigBuilder::new().build(), Mode::Development);
    fs.add_file(
        mock_path("package.json"),
        r#"{ "dependencies": { "jquery": "^3.7.0" }, "devDependencies": { "sass": "^1" } }"#,
    );
    fs.add_file(mock_path("node_modules/jquery/dist/jquery.js"), "/* jq */");
    fs.add_file(mock_path("node_modules/jquery/LICENSE"), "MIT");
    fs.add_file(mock_path("node_modules/sass/sass.js"), "dev only");

    let report = Vendors.run(&ctx).await?;

    assert_eq!(report.written, 1);
    assert_eq!(
        fs.files_under(mock_path("dist/vendors")),
        vec![mock_path("dist/vendors/jquery/dist/jquery.js")]
    );
    Ok(())
}

#[test]
fn malformed_manifest_is_an_error() {
    let (fs, _ctx) = mock_project(SiteConfigBuilder::new().build(), Mode::Development);
    fs.add_file(mock_path("package.json"), "{ not json");

    assert!(manifest_dependencies(&fs, &mock_path("package.json")).is_err());
}

#[tokio::test]
async fn fonts_only_copies_files_changed_since_the_last_run() -> TestResult {
    let (fs, ctx) = mock_project(SiteConfigBuilder::new().build(), Mode::Development);
    fs.add_file_modified_at(mock_path("src/fonts/a.woff2"), "a", at(1_000));
    fs.add_file_modified_at(mock_path("src/fonts/sub/b.woff2"), "b", at(1_000));

    let first = Fonts.run(&ctx).await?;
    assert_eq!(first.written, 2);
    assert!(fs.is_file(&mock_path("dist/fonts/sub/b.woff2")));

    ctx.last_runs.record("fonts", at(2_000));
    fs.add_file_modified_at(mock_path("src/fonts/a.woff2"), "a2", at(3_000));

    let second = Fonts.run(&ctx).await?;
    assert_eq!(second.written, 1);
    assert_eq!(second.skipped, 1);
    assert_eq!(fs.read(&mock_path("dist/fonts/a.woff2"))?, b"a2");
    Ok(())
}

#[tokio::test]
async fn copy_html_mirrors_the_source_tree() -> TestResult {
    let (fs, ctx) = mock_project(SiteConfigBuilder::new().build(), Mode::Development);
    fs.add_file(mock_path("src/index.html"), "<h1>home</h1>");
    fs.add_file(mock_path("src/blog/post.html"), "<h1>post</h1>");
    fs.add_file(mock_path("src/scss/main.scss"), "a {}");

    let report = CopyHtml.run(&ctx).await?;

    assert_eq!(report.written, 2);
    assert_eq!(
        fs.files_under(mock_path("dist")),
        vec![mock_path("dist/blog/post.html"), mock_path("dist/index.html")]
    );
    Ok(())
}

#[tokio::test]
async fn clean_dist_removes_only_the_output_root() -> TestResult {
    let (fs, ctx) = mock_project(SiteConfigBuilder::new().build(), Mode::Development);
    fs.add_file(mock_path("dist/css/main.css"), "a{}");
    fs.add_file(mock_path("src/index.html"), "<p></p>");

    CleanDist.run(&ctx).await?;

    assert!(fs.files_under(mock_path("dist")).is_empty());
    assert!(fs.is_file(&mock_path("src/index.html")));

    // A missing output root is not an error.
    CleanDist.run(&ctx).await?;
    Ok(())
}

#[tokio::test]
async fn clean_cache_forgets_every_image_hash() -> TestResult {
    let (_fs, ctx) = mock_project(SiteConfigBuilder::new().build(), Mode::Development);
    let table = HashTable::from([("src/images/logo.png".to_string(), "abc123".to_string())]);
    ctx.image_cache.lock().unwrap().save_all(&table)?;

    CleanCache.run(&ctx).await?;

    assert_eq!(ctx.image_cache.lock().unwrap().load("src/images/logo.png")?, None);
    Ok(())
}

#[tokio::test]
async fn copy_vendors_minifies_css_and_js() -> TestResult {
    let (fs, ctx) = mock_project(SiteConfigBuilder::new().build(), Mode::Development);
    fs.add_file(
        mock_path("src/vendors/lib/lib.css"),
        ".lib {\n  color: #ff0000;\n  margin: 0px 0px 0px 0px;\n}\n",
    );
    let script = "(function () {\n    // greeting helper\n    var message = 'hello';\n    window.lib = {\n        greet: function () {\n            return message;\n        }\n    };\n})();\n";
    fs.add_file(mock_path("src/vendors/lib/lib.js"), script);
    fs.add_file(mock_path("src/vendors/lib/README.md"), "# lib");

    let report = CopyVendors.run(&ctx).await?;

    assert_eq!(report.written, 2);
    assert_eq!(report.skipped, 1);

    let css = fs.read_to_string(&mock_path("dist/vendors/lib/lib.css"))?;
    assert!(!css.contains('\n'), "not minified: {css}");
    assert!(css.starts_with(".lib{"), "{css}");

    let js = fs.read_to_string(&mock_path("dist/vendors/lib/lib.js"))?;
    assert!(js.len() < script.len(), "not minified: {js}");
    assert!(!js.contains("greeting helper"), "{js}");
    assert!(js.contains("window.lib"), "{js}");
    assert!(!fs.exists(&mock_path("dist/vendors/lib/README.md")));
    Ok(())
}

#[tokio::test]
async fn copy_vendors_copies_unparseable_js_unchanged() -> TestResult {
    let (fs, ctx) = mock_project(SiteConfigBuilder::new().build(), Mode::Development);
    fs.add_file(mock_path("src/vendors/broken.js"), "window.lib = {;\n");

    let report = CopyVendors.run(&ctx).await?;

    assert_eq!(report.written, 1);
    assert_eq!(
        fs.read_to_string(&mock_path("dist/vendors/broken.js"))?,
        "window.lib = {;\n"
    );
    Ok(())
}

#[tokio::test]
async fn scripts_without_bundler_are_copied_with_min_suffix_in_production() -> TestResult {
    let (fs, ctx) = mock_project(SiteConfigBuilder::new().build(), Mode::Production);
    fs.add_file(mock_path("src/js/app.js"), "console.log('app');");
    fs.add_file(mock_path("src/js/lib/helper.js"), "// not an entry");

    let report = Scripts.run(&ctx).await?;

    assert_eq!(report.written, 1);
    assert_eq!(
        fs.files_under(mock_path("dist")),
        vec![mock_path("dist/js/app.min.js")]
    );
    Ok(())
}

#[test]
fn script_output_names_follow_the_mode() {
    let source = SourceFile {
        path: mock_path("src/js/app.js"),
        rel: "app.js".into(),
    };
    let dest = mock_path("dist/js");

    assert_eq!(output_path(&source, &dest, Mode::Development), dest.join("app.js"));
    assert_eq!(output_path(&source, &dest, Mode::Production), dest.join("app.min.js"));
}

#[test]
fn bundler_template_gets_quoted_paths() {
    let line = bundler_command(
        "esbuild {input} --bundle --outfile={output}",
        Path::new("/site/src/js/app.js"),
        Path::new("/site/dist/js/app.js"),
    );
    assert_eq!(
        line,
        "esbuild \"/site/src/js/app.js\" --bundle --outfile=\"/site/dist/js/app.js\""
    );
}

#[test]
fn deploy_adds_the_production_flag_only_in_production() {
    let cfg = SiteConfigBuilder::new().deploy_command("netlify deploy").build();

    assert_eq!(deploy_command(&cfg.deploy, Mode::Development), "netlify deploy");
    assert_eq!(deploy_command(&cfg.deploy, Mode::Production), "netlify deploy --prod");

    let mut section = cfg.deploy.clone();
    section.prod_flag = String::new();
    assert_eq!(deploy_command(&section, Mode::Production), "netlify deploy");
}

#[tokio::test]
async fn reload_task_reaches_connected_viewers() -> TestResult {
    let (_fs, ctx) = mock_project(SiteConfigBuilder::new().build(), Mode::Development);
    let mut viewer = ctx.reload.subscribe();

    Reload.run(&ctx).await?;
    Reload.run(&ctx).await?;

    assert_eq!(viewer.recv().await?, 1);
    assert_eq!(viewer.recv().await?, 2);
    assert_eq!(ctx.reload.generation(), 2);
    Ok(())
}

#[tokio::test]
async fn reload_without_viewers_still_succeeds() -> TestResult {
    let (_fs, ctx) = mock_project(SiteConfigBuilder::new().build(), Mode::Development);
    Reload.run(&ctx).await?;
    Env.run(&ctx).await?;
    assert_eq!(ctx.reload.viewers(), 0);
    Ok(())
}
