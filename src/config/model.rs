// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

use crate::types::TriggerWhileRunningBehaviour;

/// One glob or a list of globs.
///
/// Both of these forms are accepted in the config:
///
/// ```yaml
/// sass:
///   src: src/scss/**/*.scss
/// fonts:
///   src: [src/fonts/**/*, "!src/fonts/**/*.txt"]
/// ```
///
/// A pattern starting with `!` excludes matching files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "GlobsRepr")]
pub struct Globs(Vec<String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum GlobsRepr {
    One(String),
    Many(Vec<String>),
}

impl From<GlobsRepr> for Globs {
    fn from(repr: GlobsRepr) -> Self {
        match repr {
            GlobsRepr::One(s) => Globs(vec![s]),
            GlobsRepr::Many(v) => Globs(v),
        }
    }
}

impl Globs {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Globs(patterns.into_iter().map(Into::into).collect())
    }

    pub fn patterns(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Raw configuration as read from `site.config.yml`.
///
/// The sections follow the usual gulp-style layout:
///
/// ```yaml
/// sass:
///   src: src/scss/**/*.scss
///   dest: dist/css
/// js:
///   src: src/js/*.js
///   dest: dist/js
/// image:
///   src: src/images/**/*
///   dest: dist/images
///   webp: src/images/**/*.{jpg,png}
/// fonts:
///   src: src/fonts/**/*
///   dest: dist/fonts
/// copy:
///   html: { src: src/**/*.html, dest: dist }
///   vendors: { src: src/vendors/**/*, dest: dist/vendors }
/// watch:
///   scss: src/scss/**/*.scss
///   js: src/js/**/*.js
///   html: src/**/*.html
///   fonts: src/fonts/**/*
///   images: src/images/**/*
/// browsersync:
///   port: 3000
/// vendors:
///   dest: dist/vendors
/// ```
///
/// Every section above is required; missing keys fail at load time.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSiteConfig {
    /// Output root: deleted by `clean_dist`, served by the dev server and
    /// scanned by the `html` minifier.
    #[serde(default = "default_dist")]
    pub dist: PathBuf,

    pub sass: PathPair,
    pub js: ScriptsSection,
    pub image: ImageSection,
    pub fonts: PathPair,
    pub copy: CopySection,
    pub watch: WatchSection,
    pub browsersync: ServerSection,
    pub vendors: VendorsSection,

    #[serde(default)]
    pub deploy: DeploySection,

    #[serde(default)]
    pub cache: CacheSection,
}

/// Validated configuration. Build it with `SiteConfig::try_from(raw)` or
/// through [`crate::config::load_and_validate`].
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub dist: PathBuf,
    pub sass: PathPair,
    pub js: ScriptsSection,
    pub image: ImageSection,
    pub fonts: PathPair,
    pub copy: CopySection,
    pub watch: WatchSection,
    pub browsersync: ServerSection,
    pub vendors: VendorsSection,
    pub deploy: DeploySection,
    pub cache: CacheSection,
}

impl SiteConfig {
    pub(crate) fn new_unchecked(raw: RawSiteConfig) -> Self {
        Self {
            dist: raw.dist,
            sass: raw.sass,
            js: raw.js,
            image: raw.image,
            fonts: raw.fonts,
            copy: raw.copy,
            watch: raw.watch,
            browsersync: raw.browsersync,
            vendors: raw.vendors,
            deploy: raw.deploy,
            cache: raw.cache,
        }
    }
}

/// `src` globs and a `dest` directory.
#[derive(Debug, Clone, Deserialize)]
pub struct PathPair {
    pub src: Globs,
    pub dest: PathBuf,
}

/// `[js]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptsSection {
    pub src: Globs,
    pub dest: PathBuf,

    /// Optional bundler command run once per entry file, e.g.
    /// `"esbuild {input} --bundle --outfile={output}"`.
    ///
    /// Without it entries are copied unchanged.
    #[serde(default)]
    pub bundler: Option<String>,
}

/// `[image]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageSection {
    pub src: Globs,
    pub dest: PathBuf,
    /// Sources converted to `.webp` by the `webp` task.
    pub webp: Globs,
}

/// `[copy]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CopySection {
    pub html: PathPair,
    pub vendors: VendorCopy,
}

/// `copy.vendors`: vendor assets that are minified and copied.
#[derive(Debug, Clone, Deserialize)]
pub struct VendorCopy {
    pub src: Globs,
    pub dest: PathBuf,
    /// Destination for stylesheets; falls back to `dest`.
    #[serde(default)]
    pub css: Option<PathBuf>,
    /// Destination for scripts; falls back to `dest`.
    #[serde(default)]
    pub js: Option<PathBuf>,
}

impl VendorCopy {
    pub fn css_dest(&self) -> &PathBuf {
        self.css.as_ref().unwrap_or(&self.dest)
    }

    pub fn js_dest(&self) -> &PathBuf {
        self.js.as_ref().unwrap_or(&self.dest)
    }
}

/// `[watch]` section: one glob set per watch binding, plus event coalescing.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSection {
    pub scss: Globs,
    pub js: Globs,
    pub html: Globs,
    pub fonts: Globs,
    pub images: Globs,

    /// Quiet period used to coalesce bursts of file-system events.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// `"queue"` or `"cancel"`.
    #[serde(default)]
    pub while_running: TriggerWhileRunningBehaviour,

    /// Maximum number of queued runs to remember.
    #[serde(default = "default_queue_length")]
    pub queue_length: usize,
}

/// `[browsersync]` section: dev server settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    pub port: u16,

    /// Log every request at info level.
    #[serde(default)]
    pub debug: bool,

    /// Show an in-page notice before reloading.
    #[serde(default)]
    pub notify: bool,

    /// Open the default browser once the server is listening.
    #[serde(default)]
    pub open: bool,

    #[serde(default)]
    pub preferences: GhostPreferences,
}

/// Interaction mirroring preferences. Parsed for compatibility; the dev
/// server does not mirror interactions between clients.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GhostPreferences {
    #[serde(default)]
    pub clicks: bool,
    #[serde(default)]
    pub scroll: bool,
}

/// `[vendors]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct VendorsSection {
    pub dest: PathBuf,

    /// Logged when the manifest lists no dependencies.
    #[serde(default = "default_vendor_notification")]
    pub notification: String,

    /// Manifest whose `dependencies` keys name the vendored packages.
    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,
}

/// `[deploy]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct DeploySection {
    #[serde(default = "default_deploy_command")]
    pub command: String,

    /// Appended to `command` in production mode.
    #[serde(default = "default_prod_flag")]
    pub prod_flag: String,

    /// Whether a non-zero exit status fails the deploy task.
    #[serde(default = "default_true")]
    pub fail_on_error: bool,
}

impl Default for DeploySection {
    fn default() -> Self {
        Self {
            command: default_deploy_command(),
            prod_flag: default_prod_flag(),
            fail_on_error: true,
        }
    }
}

/// `[cache]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    /// Directory holding the image optimisation cache.
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
        }
    }
}

fn default_dist() -> PathBuf {
    PathBuf::from("dist")
}

fn default_debounce_ms() -> u64 {
    200
}

fn default_queue_length() -> usize {
    1
}

fn default_vendor_notification() -> String {
    "No vendor dependencies to copy.".to_string()
}

fn default_manifest() -> PathBuf {
    PathBuf::from("package.json")
}

fn default_deploy_command() -> String {
    "netlify deploy".to_string()
}

fn default_prod_flag() -> String {
    "--prod".to_string()
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".sitepipe")
}

fn default_true() -> bool {
    true
}
