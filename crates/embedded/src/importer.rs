//! Importer bindings
//!
//! An importer teaches the compiler how to resolve `@use`, `@forward`,
//! and `@import` URLs it cannot find on its own load paths. Three flavors:
//!
//! - [`SassImporter::LoadPath`]: a directory the compiler searches with
//!   its own file I/O, no callbacks involved.
//! - A custom [`Importer`]: the host canonicalizes URLs and produces
//!   stylesheet text itself.
//! - A [`FileImporter`]: the host only maps URLs to `file:` URLs and the
//!   compiler loads them.
//!
//! Importers are consulted in registration order, per-compilation entries
//! before compiler-global ones.

use crate::options::Syntax;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

/// Context the compiler provides with canonicalize and file-import
/// callbacks.
#[derive(Debug, Clone)]
pub struct ImporterContext {
    /// True when the load comes from an `@import` rule rather than
    /// `@use`/`@forward`
    pub from_import: bool,
    /// Canonical URL of the requesting stylesheet, when known
    pub containing_url: Option<Url>,
}

/// A stylesheet produced by a custom importer.
#[derive(Debug, Clone)]
pub struct ImporterResults {
    pub contents: String,
    pub syntax: Syntax,
    /// URL to report in source maps for this stylesheet
    pub source_map_url: Option<Url>,
}

impl ImporterResults {
    /// SCSS contents with no source-map URL.
    pub fn scss(contents: impl Into<String>) -> Self {
        Self {
            contents: contents.into(),
            syntax: Syntax::Scss,
            source_map_url: None,
        }
    }
}

/// A host importer that canonicalizes and loads stylesheets itself.
///
/// `canonicalize` answering `Ok(None)` means "not mine, try the next
/// importer" and is not an error. An `Err` string is reported through the
/// compiler as a load failure; the compilation continues and usually
/// fails cleanly with that message in context.
#[async_trait]
pub trait Importer: Send + Sync {
    /// Map a URL as written in the stylesheet to its canonical form.
    async fn canonicalize(
        &self,
        url: &str,
        context: &ImporterContext,
    ) -> Result<Option<Url>, String>;

    /// Load the stylesheet for a canonical URL this importer produced.
    async fn load(&self, canonical_url: &Url) -> Result<ImporterResults, String>;

    /// URL schemes this importer will never canonicalize, letting the
    /// compiler treat them as plain CSS loads.
    fn non_canonical_schemes(&self) -> Vec<String> {
        Vec::new()
    }
}

/// A host importer that resolves URLs to `file:` URLs; the compiler does
/// the actual loading.
#[async_trait]
pub trait FileImporter: Send + Sync {
    /// Map a URL to the `file:` URL to load, or `Ok(None)` to pass.
    async fn find_file_url(
        &self,
        url: &str,
        context: &ImporterContext,
    ) -> Result<Option<Url>, String>;
}

/// One importer binding in a compilation's resolution order.
#[derive(Clone)]
pub enum SassImporter {
    /// A directory the compiler searches itself
    LoadPath(PathBuf),
    /// A custom canonicalize/load importer
    Importer(Arc<dyn Importer>),
    /// A file-URL resolver
    FileImporter(Arc<dyn FileImporter>),
}

impl SassImporter {
    pub fn load_path(path: impl Into<PathBuf>) -> Self {
        SassImporter::LoadPath(path.into())
    }

    pub fn custom(importer: impl Importer + 'static) -> Self {
        SassImporter::Importer(Arc::new(importer))
    }

    pub fn file(importer: impl FileImporter + 'static) -> Self {
        SassImporter::FileImporter(Arc::new(importer))
    }

    /// The `Filesystem(root)` binding: host-side resolution of the Sass
    /// load algorithm under a root directory.
    pub fn filesystem(root: impl Into<PathBuf>) -> Self {
        SassImporter::FileImporter(Arc::new(FilesystemImporter::new(root)))
    }
}

impl std::fmt::Debug for SassImporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SassImporter::LoadPath(path) => {
                f.debug_tuple("LoadPath").field(path).finish()
            }
            SassImporter::Importer(_) => f.write_str("Importer(..)"),
            SassImporter::FileImporter(_) => f.write_str("FileImporter(..)"),
        }
    }
}

/// Resolves Sass's file load algorithm under a fixed root directory.
///
/// The root must be absolute: this crate never resolves paths against the
/// process working directory.
#[derive(Debug, Clone)]
pub struct FilesystemImporter {
    root: PathBuf,
}

impl FilesystemImporter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl FileImporter for FilesystemImporter {
    async fn find_file_url(
        &self,
        url: &str,
        _context: &ImporterContext,
    ) -> Result<Option<Url>, String> {
        if !self.root.is_absolute() {
            return Err(format!(
                "Filesystem importer root {} is not absolute",
                self.root.display()
            ));
        }
        // Scheme-qualified URLs other than file: are not ours
        let relative = match Url::parse(url) {
            Ok(parsed) if parsed.scheme() == "file" => match parsed.to_file_path() {
                Ok(path) => return Ok(resolve_sass_path(&path)?.map(file_url)),
                Err(()) => return Err(format!("Unrepresentable file URL: {}", url)),
            },
            Ok(_) => return Ok(None),
            Err(_) => url.trim_start_matches("./").to_string(),
        };

        let joined = self.root.join(relative);
        Ok(resolve_sass_path(&joined)?.map(file_url))
    }
}

fn file_url(path: PathBuf) -> Url {
    // resolve_sass_path only returns absolute paths, which always convert
    Url::from_file_path(&path)
        .unwrap_or_else(|_| Url::parse("file:///").expect("static URL"))
}

/// The Sass load algorithm for one candidate path: exact matches and
/// partials for explicit extensions, otherwise extension and index
/// probing. Ambiguity between `.scss` and `.sass` is an error.
fn resolve_sass_path(path: &Path) -> Result<Option<PathBuf>, String> {
    let extension = path.extension().and_then(|e| e.to_str());
    if matches!(extension, Some("scss") | Some("sass") | Some("css")) {
        return Ok(exact_or_partial(path));
    }

    let mut matches: Vec<PathBuf> = Vec::new();
    for ext in ["scss", "sass"] {
        let candidate = path.with_extension(ext);
        if let Some(found) = exact_or_partial(&candidate) {
            matches.push(found);
        }
    }
    match matches.len() {
        0 => {}
        1 => return Ok(matches.pop()),
        _ => {
            return Err(format!(
                "It's not clear which file to import: {}",
                matches
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(" or ")
            ));
        }
    }

    let css = path.with_extension("css");
    if let Some(found) = exact_or_partial(&css) {
        return Ok(Some(found));
    }

    // Directory index
    if path.is_dir() {
        for ext in ["scss", "sass", "css"] {
            let index = path.join(format!("index.{}", ext));
            if let Some(found) = exact_or_partial(&index) {
                return Ok(Some(found));
            }
        }
    }
    Ok(None)
}

/// A file matches either exactly or as a `_name` partial; the partial
/// wins when both exist, matching the compiler's own resolution.
fn exact_or_partial(path: &Path) -> Option<PathBuf> {
    if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
        let partial = parent.join(format!("_{}", name.to_string_lossy()));
        if partial.is_file() {
            return Some(partial);
        }
    }
    if path.is_file() {
        return Some(path.to_path_buf());
    }
    None
}
