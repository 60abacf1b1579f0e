// src/tasks/styles.rs

//! Stylesheet compilation: Sass via `grass`; import inlining, vendor
//! prefixing, minification and source maps via `lightningcss`.

use std::collections::HashMap;
use std::io;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, bail, Context, Result};
use lightningcss::bundler::{Bundler, ResolveResult, SourceProvider};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap;
use regex::Regex;
use tracing::debug;

use crate::config::SiteConfig;
use crate::fs::{normalize_path, FileSystem};
use crate::tasks::pipeline::{
    collect_sources, compile_matcher, glob_base, slash_path, walk_files, write_output,
};
use crate::tasks::{blocking, Task, TaskContext, TaskFuture, TaskReport};

/// Browser versions prefixes are generated for.
pub fn prefix_targets() -> Targets {
    let version = |major: u32| Some(major << 16);
    Targets::from(Browsers {
        android: version(100),
        chrome: version(100),
        edge: version(100),
        firefox: version(100),
        ios_saf: version(14),
        opera: version(86),
        safari: version(14),
        samsung: version(16),
        ..Browsers::default()
    })
}

/// Add vendor prefixes to `css` and, if `minify`, compress it.
pub fn finish_css(css: &str, filename: &str, minify: bool) -> Result<String> {
    let targets = prefix_targets();

    let mut sheet = StyleSheet::parse(
        css,
        ParserOptions {
            filename: filename.to_string(),
            ..ParserOptions::default()
        },
    )
    .map_err(|err| anyhow!("parsing {filename}: {err}"))?;

    sheet
        .minify(MinifyOptions {
            targets,
            ..MinifyOptions::default()
        })
        .map_err(|err| anyhow!("optimising {filename}: {err}"))?;

    let out = sheet
        .to_css(PrinterOptions {
            minify,
            targets,
            ..PrinterOptions::default()
        })
        .map_err(|err| anyhow!("printing {filename}: {err}"))?;

    Ok(out.code)
}

/// Output of [`bundle_css`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedCss {
    pub code: String,
    /// Source map JSON, when one was requested.
    pub map: Option<String>,
}

/// Files pulled in by plain-CSS `@import`s, read through our [`FileSystem`].
///
/// The bundler only borrows its provider, so unknown files are recorded on
/// read and loaded between bundling attempts.
#[derive(Debug)]
struct ImportSources<'f> {
    fs: &'f dyn FileSystem,
    loaded: HashMap<PathBuf, String>,
    missing: Mutex<Vec<PathBuf>>,
}

impl<'f> ImportSources<'f> {
    fn new(fs: &'f dyn FileSystem, entry: &Path, css: String) -> Self {
        Self {
            fs,
            loaded: HashMap::from([(entry.to_path_buf(), css)]),
            missing: Mutex::new(Vec::new()),
        }
    }

    fn has_missing(&self) -> bool {
        self.missing.lock().is_ok_and(|missing| !missing.is_empty())
    }

    /// Load every file recorded as missing. False when nothing new was read.
    fn load_missing(&mut self) -> Result<bool> {
        let missing = mem::take(
            self.missing
                .get_mut()
                .map_err(|_| anyhow!("import bookkeeping poisoned"))?,
        );

        let mut loaded_any = false;
        for path in missing {
            if self.loaded.contains_key(&path) {
                continue;
            }
            let code = self
                .fs
                .read_to_string(&path)
                .with_context(|| format!("importing {:?}", path))?;
            debug!(path = ?path, "loaded css import");
            self.loaded.insert(path, code);
            loaded_any = true;
        }
        Ok(loaded_any)
    }
}

impl SourceProvider for ImportSources<'_> {
    type Error = io::Error;

    fn read<'a>(&'a self, file: &Path) -> std::result::Result<&'a str, Self::Error> {
        if let Some(code) = self.loaded.get(file) {
            return Ok(code);
        }
        if let Ok(mut missing) = self.missing.lock() {
            missing.push(file.to_path_buf());
        }
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} is not loaded", file.display()),
        ))
    }

    fn resolve(&self, specifier: &str, originating_file: &Path) -> std::result::Result<ResolveResult, Self::Error> {
        if ["http:", "https:", "//"].iter().any(|scheme| specifier.starts_with(scheme)) {
            return Ok(ResolveResult::External(specifier.to_string()));
        }
        let dir = originating_file.parent().unwrap_or(Path::new(""));
        Ok(ResolveResult::File(normalize_path(&dir.join(specifier))))
    }
}

/// One bundling pass. `None` when an import still has to be loaded.
fn print_bundle(
    sources: &ImportSources<'_>,
    entry: &Path,
    minify: bool,
    source_map_root: Option<&str>,
) -> Result<Option<FinishedCss>> {
    let targets = prefix_targets();
    let mut map = source_map_root.map(SourceMap::new);

    let bundled = {
        let mut bundler = Bundler::new(sources, map.as_mut(), ParserOptions::default());
        bundler.bundle(entry).map_err(|err| err.to_string())
    };
    let mut sheet = match bundled {
        Ok(sheet) => sheet,
        Err(_) if sources.has_missing() => return Ok(None),
        Err(err) => bail!("bundling {:?}: {err}", entry),
    };

    sheet
        .minify(MinifyOptions {
            targets,
            ..MinifyOptions::default()
        })
        .map_err(|err| anyhow!("optimising {:?}: {err}", entry))?;

    let out = sheet
        .to_css(PrinterOptions {
            minify,
            targets,
            source_map: map.as_mut(),
            ..PrinterOptions::default()
        })
        .map_err(|err| anyhow!("printing {:?}: {err}", entry))?;

    let map = match map {
        Some(mut map) => Some(
            map.to_json(None)
                .map_err(|err| anyhow!("serialising source map of {:?}: {err:?}", entry))?,
        ),
        None => None,
    };

    Ok(Some(FinishedCss { code: out.code, map }))
}

/// Inline the plain-CSS `@import`s of the compiled stylesheet `entry`, then
/// prefix and optionally minify the result.
///
/// Imports resolve relative to the importing file; `http(s):` and `//`
/// imports are left in place. With `source_map_root`, a source map is built
/// with paths relative to it.
pub fn bundle_css(
    fs: &dyn FileSystem,
    entry: &Path,
    css: String,
    minify: bool,
    source_map_root: Option<&str>,
) -> Result<FinishedCss> {
    let mut sources = ImportSources::new(fs, entry, css);
    loop {
        if let Some(finished) = print_bundle(&sources, entry, minify, source_map_root)? {
            return Ok(finished);
        }
        if !sources.load_missing()? {
            bail!("bundling {:?}: unresolved import", entry);
        }
    }
}

/// Lets the Sass compiler resolve imports through our [`FileSystem`], and
/// expands glob imports such as `@import "components/**/*.scss";`.
#[derive(Debug)]
struct SassFs<'a> {
    fs: &'a dyn FileSystem,
    glob_import: Regex,
}

impl<'a> SassFs<'a> {
    fn new(fs: &'a dyn FileSystem) -> Result<Self> {
        Ok(Self {
            fs,
            glob_import: Regex::new(r#"@import\s+["']([^"']*[*?\[{][^"']*)["']\s*;"#)?,
        })
    }

    fn expand_glob_imports(&self, file: &Path, source: &str) -> Result<String> {
        let dir = file.parent().unwrap_or(Path::new(""));
        let mut out = String::with_capacity(source.len());
        let mut last = 0;

        for caps in self.glob_import.captures_iter(source) {
            let (Some(whole), Some(pattern)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            out.push_str(&source[last..whole.start()]);
            out.push_str(&self.glob_imports(file, dir, pattern.as_str())?);
            last = whole.end();
        }
        out.push_str(&source[last..]);
        Ok(out)
    }

    /// One `@import` per file under `dir` matching `pattern`, sorted. A
    /// pattern matching nothing imports nothing.
    fn glob_imports(&self, file: &Path, dir: &Path, pattern: &str) -> Result<String> {
        let matcher = compile_matcher(pattern)?;
        let mut imports = String::new();

        for path in walk_files(self.fs, &dir.join(glob_base(pattern)))? {
            if path == file {
                continue;
            }
            let Ok(rel) = path.strip_prefix(dir) else {
                continue;
            };
            let rel = slash_path(rel);
            if matcher.is_match(&rel) {
                imports.push_str(&format!("@import \"{rel}\";\n"));
            }
        }

        debug!(file = ?file, pattern, "expanded glob import");
        Ok(imports)
    }
}

impl grass::Fs for SassFs<'_> {
    fn is_dir(&self, path: &Path) -> bool {
        self.fs.is_dir(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.fs.is_file(path)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let bytes = self.fs.read(path).map_err(to_io)?;
        if path.extension().and_then(|e| e.to_str()) != Some("scss") {
            return Ok(bytes);
        }
        match String::from_utf8(bytes) {
            Ok(text) if self.glob_import.is_match(&text) => self
                .expand_glob_imports(path, &text)
                .map(String::into_bytes)
                .map_err(to_io),
            Ok(text) => Ok(text.into_bytes()),
            Err(err) => Ok(err.into_bytes()),
        }
    }
}

fn to_io(err: anyhow::Error) -> io::Error {
    io::Error::other(format!("{err:#}"))
}

/// Compile one Sass entry point to CSS.
pub fn compile_sass(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let sass_fs = SassFs::new(fs)?;
    let mut options = grass::Options::default()
        .style(grass::OutputStyle::Expanded)
        .fs(&sass_fs);
    if let Some(dir) = path.parent() {
        options = options.load_path(dir);
    }

    grass::from_path(path, &options).map_err(|err| anyhow!("compiling {:?}: {err}", path))
}

/// Partials (`_name.scss`) are only compiled through the files importing
/// them.
fn is_entry_point(file_name: &str, ext: &str) -> bool {
    !file_name.starts_with('_') && matches!(ext, "scss" | "sass" | "css")
}

/// Compiles Sass entry points into `sass.dest`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sass;

impl Task for Sass {
    fn name(&self) -> &'static str {
        "sass"
    }

    fn description(&self) -> &'static str {
        "compile, inline imports, prefix and minify (production) or map (development) stylesheets"
    }

    fn write_set(&self, cfg: &SiteConfig) -> Vec<PathBuf> {
        vec![cfg.sass.dest.clone()]
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext) -> TaskFuture<'a> {
        blocking(ctx, |ctx| {
            let mut report = TaskReport::default();
            let minify = ctx.mode.is_production();
            let dest = ctx.resolve(&ctx.config.sass.dest);
            let map_root = (!minify).then(|| ctx.root.to_string_lossy().into_owned());

            let sources = collect_sources(ctx.fs.as_ref(), &ctx.root, &ctx.config.sass.src, None)?;
            for source in sources {
                if !is_entry_point(source.file_name(), &source.extension()) {
                    report.record_skip();
                    continue;
                }

                let compiled = compile_sass(ctx.fs.as_ref(), &source.path)?;
                let finished = bundle_css(ctx.fs.as_ref(), &source.path, compiled, minify, map_root.as_deref())
                    .with_context(|| format!("post-processing {:?}", source.path))?;

                let out = source.dest_with_extension(&dest, "css");
                debug!(src = ?source.path, out = ?out, minify, "compiled stylesheet");
                match finished.map {
                    Some(map) => {
                        let map_out = out.with_extension("css.map");
                        let map_name = map_out
                            .file_name()
                            .map(|name| name.to_string_lossy().into_owned())
                            .unwrap_or_default();
                        let code = format!("{}\n/*# sourceMappingURL={map_name} */\n", finished.code);
                        write_output(ctx, &out, code.as_bytes(), &mut report)?;
                        write_output(ctx, &map_out, map.as_bytes(), &mut report)?;
                    }
                    None => write_output(ctx, &out, finished.code.as_bytes(), &mut report)?,
                }
            }

            Ok(report)
        })
    }
}
