// src/tasks/images.rs

//! Image optimisation and WebP conversion.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::codecs::gif::{GifDecoder, GifEncoder};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::{AnimationDecoder, DynamicImage};
use regex::Regex;
use tracing::{debug, warn};

use crate::config::SiteConfig;
use crate::tasks::pipeline::{changed_sources, slash_path, write_output};
use crate::tasks::{blocking, Task, TaskContext, TaskFuture, TaskReport};
use crate::watch::hash::{compute_hash, HashTable};

const JPEG_QUALITY: u8 = 90;

/// Strip comments, metadata, the XML prolog and the whitespace between
/// elements. Documents with `<text>` keep their whitespace.
pub fn minify_svg(bytes: &[u8]) -> Result<Vec<u8>> {
    let noise = Regex::new(r"(?s)<!--.*?-->|<metadata\b.*?</metadata\s*>|<\?xml\b.*?\?>|<!DOCTYPE[^>]*>")?;
    let gaps = Regex::new(r">\s+<")?;

    let svg = std::str::from_utf8(bytes).context("svg is not utf-8")?;
    let stripped = noise.replace_all(svg, "");
    if stripped.contains("<text") {
        return Ok(stripped.trim().as_bytes().to_vec());
    }
    Ok(gaps.replace_all(stripped.trim(), "><").into_owned().into_bytes())
}

/// Re-encode a single-frame GIF. Animations are left to the caller.
fn reencode_gif(bytes: &[u8]) -> Result<Option<Vec<u8>>> {
    let mut frames = GifDecoder::new(Cursor::new(bytes))?.into_frames().collect_frames()?;
    if frames.len() != 1 {
        return Ok(None);
    }

    let mut out = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut out);
        encoder.encode_frame(frames.remove(0))?;
    }
    Ok(Some(out))
}

/// Re-encode PNG, JPEG, single-frame GIF and SVG data. Returns `None` for
/// formats that are copied as-is.
pub fn reencode(ext: &str, bytes: &[u8]) -> Result<Option<Vec<u8>>> {
    let encode = |img: DynamicImage, jpeg: bool| -> Result<Vec<u8>> {
        let mut out = Vec::new();
        if jpeg {
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY))?;
        } else {
            img.write_with_encoder(PngEncoder::new_with_quality(
                &mut out,
                CompressionType::Best,
                FilterType::Adaptive,
            ))?;
        }
        Ok(out)
    };

    match ext {
        "png" => Ok(Some(encode(image::load_from_memory(bytes)?, false)?)),
        "jpg" | "jpeg" => Ok(Some(encode(image::load_from_memory(bytes)?, true)?)),
        "gif" => reencode_gif(bytes),
        "svg" => Ok(Some(minify_svg(bytes)?)),
        _ => Ok(None),
    }
}

/// Pick the smaller of the original and the optimised encoding.
pub fn optimise(ext: &str, original: Vec<u8>) -> Vec<u8> {
    match reencode(ext, &original) {
        Ok(Some(optimised)) if optimised.len() < original.len() => optimised,
        Ok(_) => original,
        Err(err) => {
            warn!(error = %err, "could not re-encode image; copying unchanged");
            original
        }
    }
}

/// Lossless WebP encoding of any decodable image.
pub fn to_webp(bytes: &[u8]) -> Result<Vec<u8>> {
    let img = image::load_from_memory(bytes)?;
    let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
    let mut out = Vec::new();
    rgba.write_with_encoder(WebPEncoder::new_lossless(&mut out))?;
    Ok(out)
}

fn dest_is_newer(ctx: &TaskContext, src: &Path, dest: &Path) -> Result<bool> {
    if !ctx.fs.is_file(dest) {
        return Ok(false);
    }
    Ok(ctx.fs.modified(dest)? >= ctx.fs.modified(src)?)
}

/// Optimises images into `image.dest`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Images;

impl Task for Images {
    fn name(&self) -> &'static str {
        "images"
    }

    fn description(&self) -> &'static str {
        "optimise new or changed images"
    }

    fn write_set(&self, cfg: &SiteConfig) -> Vec<PathBuf> {
        vec![cfg.image.dest.clone(), cfg.cache.dir.clone()]
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext) -> TaskFuture<'a> {
        let name = self.name();
        blocking(ctx, move |ctx| {
            let mut report = TaskReport::default();
            let stored = ctx
                .image_cache
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .load_all()
                .context("reading image cache")?;

            let mut hashes = stored.clone();
            let outcome = optimise_sources(ctx, name, &mut hashes, &mut report);

            // Whatever was optimised before a failure stays recorded.
            if hashes != stored {
                ctx.image_cache
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .save_all(&hashes)
                    .context("updating image cache")?;
            }

            outcome.map(|()| report)
        })
    }
}

fn optimise_sources(ctx: &TaskContext, task: &str, hashes: &mut HashTable, report: &mut TaskReport) -> Result<()> {
    let dest = ctx.resolve(&ctx.config.image.dest);

    for source in changed_sources(ctx, task, &ctx.config.image.src, report)? {
        let out = source.dest_in(&dest);
        if dest_is_newer(ctx, &source.path, &out)? {
            debug!(src = ?source.path, "output is newer; skipping");
            report.record_skip();
            continue;
        }

        let bytes = ctx.fs.read(&source.path)?;
        let hash = compute_hash(&bytes);
        let key = source
            .path
            .strip_prefix(&ctx.root)
            .map(slash_path)
            .unwrap_or_else(|_| slash_path(&source.path));

        if hashes.get(&key) == Some(&hash) && ctx.fs.is_file(&out) {
            debug!(src = ?source.path, "already optimised; skipping");
            report.record_skip();
            continue;
        }

        let before = bytes.len();
        let optimised = optimise(&source.extension(), bytes);
        debug!(src = ?source.path, before, after = optimised.len(), "optimised image");
        write_output(ctx, &out, &optimised, report)?;
        hashes.insert(key, hash);
    }

    Ok(())
}

/// Converts `image.webp` sources to `.webp` files in `image.dest`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Webp;

impl Task for Webp {
    fn name(&self) -> &'static str {
        "webp"
    }

    fn description(&self) -> &'static str {
        "convert images to lossless WebP"
    }

    fn write_set(&self, cfg: &SiteConfig) -> Vec<PathBuf> {
        vec![cfg.image.dest.clone()]
    }

    fn run<'a>(&'a self, ctx: &'a TaskContext) -> TaskFuture<'a> {
        let name = self.name();
        blocking(ctx, move |ctx| {
            let mut report = TaskReport::default();
            let dest = ctx.resolve(&ctx.config.image.dest);

            for source in changed_sources(ctx, name, &ctx.config.image.webp, &mut report)? {
                let bytes = ctx.fs.read(&source.path)?;
                let webp = to_webp(&bytes).with_context(|| format!("converting {:?}", source.path))?;
                write_output(ctx, &source.dest_with_extension(&dest, "webp"), &webp, &mut report)?;
            }

            Ok(report)
        })
    }
}
