// src/tasks/html.rs

//! In-place HTML minification of the output root (production only).

use std::path::PathBuf;

use regex::Regex;
use tracing::debug;

use crate::config::SiteConfig;
use crate::tasks::pipeline::{walk_files, write_output};
use crate::tasks::{blocking, Task, TaskContext, TaskFuture, TaskReport};

/// Elements whose content is copied verbatim.
const PRESERVED_TAGS: [&str; 4] = ["pre", "textarea", "script", "style"];

/// Elements around which whitespace never renders.
const BLOCK_TAGS: &str = "address|article|aside|blockquote|body|br|dd|div|dl|dt|fieldset|\
figcaption|figure|footer|form|h[1-6]|head|header|hr|html|li|link|main|meta|nav|ol|option|p|\
section|select|table|tbody|td|tfoot|th|thead|title|tr|ul";

/// Comment stripping and whitespace collapsing for HTML documents.
#[derive(Debug, Clone)]
pub struct HtmlMinifier {
    preserved: Vec<Regex>,
    comment: Regex,
    around_block: Regex,
    whitespace: Regex,
}

impl HtmlMinifier {
    pub fn new() -> Result<Self, regex::Error> {
        let preserved = PRESERVED_TAGS
            .iter()
            .map(|tag| Regex::new(&format!(r"(?is)<{tag}\b.*?</{tag}\s*>")))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            preserved,
            // Conditional comments (`<!--[if IE]>`) are kept.
            comment: Regex::new(r"(?s)<!--(?:[^\[].*?)?-->")?,
            around_block: Regex::new(&format!(
                r"(?i)\s*(<(?:/?(?:{BLOCK_TAGS})\b|!doctype\b)[^>]*>)\s*"
            ))?,
            whitespace: Regex::new(r"\s+")?,
        })
    }

    /// Earliest preserved block starting at or after `from`.
    fn next_preserved<'t>(&self, input: &'t str, from: usize) -> Option<regex::Match<'t>> {
        self.preserved
            .iter()
            .filter_map(|re| re.find_at(input, from))
            .min_by_key(|m| m.start())
    }

    fn squeeze(&self, chunk: &str) -> String {
        let without_comments = self.comment.replace_all(chunk, "");
        let collapsed = self.whitespace.replace_all(&without_comments, " ");
        self.around_block.replace_all(&collapsed, "$1").into_owned()
    }

    /// Remove comments, collapse whitespace runs to one space and drop
    /// whitespace next to block-level tags. `pre`, `textarea`, `script` and
    /// `style` blocks are left untouched.
    pub fn minify(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        let mut last = 0;

        while let Some(block) = self.next_preserved(input, last) {
            out.push_str(&self.squeeze(&input[last..block.start()]));
            out.push_str(block.as_str());
            last = block.end();
        }
        out.push_str(&self.squeeze(&input[last..]));

        out.trim().to_string()
    }
}

/// Minifies every `.html` file below the output root in production builds.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinifyHtml;

impl Task for MinifyHtml {
    fn name(&self) -> &'static str {
        "html"
    }

    fn description(&self) -> &'static str {
        "minify HTML in the output root (production only)"
    }

    fn write_set(&self, cfg: &SiteConfig) -> Vec<PathBuf> {
        vec![cfg.dist.clone()]
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext) -> TaskFuture<'a> {
        blocking(ctx, |ctx| {
            let mut report = TaskReport::default();
            if !ctx.mode.is_production() {
                debug!("html minification is production only");
                return Ok(report);
            }

            let minifier = HtmlMinifier::new()?;
            for path in walk_files(ctx.fs.as_ref(), &ctx.resolve(&ctx.config.dist))? {
                let is_html = path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("html"));
                if !is_html {
                    continue;
                }

                let source = ctx.fs.read_to_string(&path)?;
                let minified = minifier.minify(&source);
                if minified == source {
                    report.record_skip();
                    continue;
                }
                write_output(ctx, &path, minified.as_bytes(), &mut report)?;
            }

            Ok(report)
        })
    }
}
