#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sitepipe::config::{from_yaml_str, Globs, SiteConfig};
use sitepipe::fs::mock::MockFileSystem;
use sitepipe::fs::FileSystem;
use sitepipe::tasks::TaskContext;
use sitepipe::types::{Mode, TriggerWhileRunningBehaviour};

/// A complete, valid configuration using the conventional `src/` → `dist/`
/// layout.
pub const SITE_CONFIG_YAML: &str = r#"
sass:
  src: "src/scss/**/*.scss"
  dest: "dist/css"
js:
  src: "src/js/*.js"
  dest: "dist/js"
image:
  src: "src/images/**/*"
  dest: "dist/images"
  webp: "src/images/**/*.{jpg,png}"
fonts:
  src: "src/fonts/**/*"
  dest: "dist/fonts"
copy:
  html:
    src: "src/**/*.html"
    dest: "dist"
  vendors:
    src: "src/vendors/**/*"
    dest: "dist/vendors"
watch:
  scss: "src/scss/**/*.scss"
  js: "src/js/**/*.js"
  html: "src/**/*.html"
  fonts: "src/fonts/**/*"
  images: "src/images/**/*"
browsersync:
  port: 3000
vendors:
  dest: "dist/vendors"
"#;

/// Builder for `SiteConfig` starting from [`SITE_CONFIG_YAML`].
pub struct SiteConfigBuilder {
    config: SiteConfig,
}

impl SiteConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: from_yaml_str(SITE_CONFIG_YAML).expect("fixture config must be valid"),
        }
    }

    pub fn dist(mut self, dist: &str) -> Self {
        self.config.dist = PathBuf::from(dist);
        self
    }

    pub fn js_bundler(mut self, command: &str) -> Self {
        self.config.js.bundler = Some(command.to_string());
        self
    }

    pub fn deploy_command(mut self, command: &str) -> Self {
        self.config.deploy.command = command.to_string();
        self
    }

    pub fn deploy_fail_on_error(mut self, val: bool) -> Self {
        self.config.deploy.fail_on_error = val;
        self
    }

    pub fn vendors_manifest(mut self, path: &str) -> Self {
        self.config.vendors.manifest = PathBuf::from(path);
        self
    }

    pub fn image_src(mut self, patterns: &[&str]) -> Self {
        self.config.image.src = Globs::new(patterns.iter().copied());
        self
    }

    pub fn while_running(mut self, behaviour: TriggerWhileRunningBehaviour) -> Self {
        self.config.watch.while_running = behaviour;
        self
    }

    pub fn build(self) -> SiteConfig {
        self.config
    }
}

impl Default for SiteConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Project root used by mock-filesystem tests.
pub const MOCK_ROOT: &str = "/site";

/// An empty in-memory project plus a context rooted at [`MOCK_ROOT`].
pub fn mock_project(config: SiteConfig, mode: Mode) -> (MockFileSystem, TaskContext) {
    let fs = MockFileSystem::new();
    let shared: Arc<dyn FileSystem> = Arc::new(fs.clone());
    let ctx = TaskContext::new(config, mode, MOCK_ROOT, shared);
    (fs, ctx)
}

/// `MOCK_ROOT` joined with `rel`.
pub fn mock_path(rel: &str) -> PathBuf {
    Path::new(MOCK_ROOT).join(rel)
}
