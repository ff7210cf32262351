//! Compiler and per-compilation options
//!
//! [`Options`] is the closed set accepted by [`crate::Compiler::new`];
//! [`CompileOptions`] and [`StringOptions`] carry the per-compilation
//! subset. Both use builder-style `with_*` methods.
//!
//! No environment variables are consulted: diagnostic styling is
//! controlled by [`MessageStyle`], not `$CLICOLOR`.

use crate::importer::SassImporter;
use sass_values::CallableFunction;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Input syntax of a stylesheet string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Syntax {
    #[default]
    Scss,
    /// The whitespace-sensitive `.sass` syntax
    Indented,
    Css,
}

/// CSS output style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputStyle {
    #[default]
    Expanded,
    Compressed,
}

/// Whether and how a source map is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceMapStyle {
    /// No source map
    #[default]
    None,
    /// A source map referencing sources by URL
    Separate,
    /// A source map embedding the source texts
    EmbeddedSources,
}

/// How compiler diagnostics are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageStyle {
    #[default]
    Plain,
    /// ANSI colors and Unicode rules in formatted diagnostics
    TerminalColored,
}

/// How chatty warnings are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WarningLevel {
    /// The compiler's normal warning behavior
    #[default]
    Default,
    /// Suppress warnings entirely
    Silent,
    /// Emit every occurrence instead of deduplicating
    Verbose,
}

/// Per-deprecation-id overrides.
///
/// Ids are the compiler's deprecation names, e.g. `slash-div`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeprecationControl {
    /// Deprecations upgraded to errors
    pub fatal: BTreeSet<String>,
    /// Deprecations silenced
    pub silence: BTreeSet<String>,
    /// Future deprecations opted into early
    pub future: BTreeSet<String>,
}

/// Options for constructing a [`crate::Compiler`].
#[derive(Clone, Default)]
pub struct Options {
    pub(crate) compiler_path: Option<PathBuf>,
    pub(crate) compiler_args: Vec<String>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) message_style: MessageStyle,
    pub(crate) verbose_deprecations: bool,
    pub(crate) warning_level: WarningLevel,
    pub(crate) deprecations: DeprecationControl,
    pub(crate) importers: Vec<SassImporter>,
    pub(crate) functions: HashMap<String, Arc<dyn CallableFunction>>,
}

/// Compilations time out after a minute unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

impl Options {
    pub fn new() -> Self {
        Self {
            timeout: Some(DEFAULT_TIMEOUT),
            ..Self::default()
        }
    }

    /// Use a specific compiler binary instead of the bundled lookup.
    pub fn with_compiler_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.compiler_path = Some(path.into());
        self
    }

    /// Extra arguments passed to the compiler binary after `--embedded`.
    pub fn with_compiler_arg(mut self, arg: impl Into<String>) -> Self {
        self.compiler_args.push(arg.into());
        self
    }

    /// Per-compilation deadline. See [`Options::without_timeout`].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Let compilations run forever. A hung compiler then blocks until
    /// [`crate::Compiler::reinit`] is called.
    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    pub fn with_message_style(mut self, style: MessageStyle) -> Self {
        self.message_style = style;
        self
    }

    /// Emit every deprecation warning instead of deduplicating them.
    pub fn with_verbose_deprecations(mut self) -> Self {
        self.verbose_deprecations = true;
        self
    }

    pub fn with_warning_level(mut self, level: WarningLevel) -> Self {
        self.warning_level = level;
        self
    }

    pub fn with_deprecations(mut self, control: DeprecationControl) -> Self {
        self.deprecations = control;
        self
    }

    /// Append a compiler-global importer. Per-compilation importers are
    /// consulted first.
    pub fn with_importer(mut self, importer: SassImporter) -> Self {
        self.importers.push(importer);
        self
    }

    /// Register a compiler-global host function by signature, e.g.
    /// `"darken($color, $by)"`. Per-compilation functions shadow globals
    /// with the same name.
    pub fn with_function(
        mut self,
        signature: impl Into<String>,
        callable: Arc<dyn CallableFunction>,
    ) -> Self {
        self.functions.insert(signature.into(), callable);
        self
    }
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("compiler_path", &self.compiler_path)
            .field("compiler_args", &self.compiler_args)
            .field("timeout", &self.timeout)
            .field("message_style", &self.message_style)
            .field("verbose_deprecations", &self.verbose_deprecations)
            .field("warning_level", &self.warning_level)
            .field("deprecations", &self.deprecations)
            .field("importers", &self.importers.len())
            .field("functions", &self.functions.len())
            .finish()
    }
}

/// Per-compilation options shared by string and file compilation.
#[derive(Clone, Default)]
pub struct CompileOptions {
    pub(crate) output_style: OutputStyle,
    pub(crate) source_map: SourceMapStyle,
    pub(crate) include_charset: bool,
    pub(crate) importers: Vec<SassImporter>,
    pub(crate) functions: HashMap<String, Arc<dyn CallableFunction>>,
}

impl CompileOptions {
    pub fn new() -> Self {
        Self {
            include_charset: true,
            ..Self::default()
        }
    }

    pub fn with_output_style(mut self, style: OutputStyle) -> Self {
        self.output_style = style;
        self
    }

    pub fn with_source_map(mut self, style: SourceMapStyle) -> Self {
        self.source_map = style;
        self
    }

    /// Suppress the leading `@charset`/BOM on non-ASCII output.
    pub fn without_charset(mut self) -> Self {
        self.include_charset = false;
        self
    }

    /// Prepend an importer for this compilation only.
    pub fn with_importer(mut self, importer: SassImporter) -> Self {
        self.importers.push(importer);
        self
    }

    /// Register a host function for this compilation only.
    pub fn with_function(
        mut self,
        signature: impl Into<String>,
        callable: Arc<dyn CallableFunction>,
    ) -> Self {
        self.functions.insert(signature.into(), callable);
        self
    }
}

/// Options for compiling a string, on top of [`CompileOptions`].
#[derive(Clone, Default)]
pub struct StringOptions {
    pub(crate) common: CompileOptions,
    pub(crate) syntax: Syntax,
    pub(crate) url: Option<Url>,
}

impl StringOptions {
    pub fn new() -> Self {
        Self {
            common: CompileOptions::new(),
            ..Self::default()
        }
    }

    pub fn with_syntax(mut self, syntax: Syntax) -> Self {
        self.syntax = syntax;
        self
    }

    /// The URL the source pretends to live at, used for relative loads
    /// and source maps.
    pub fn with_url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    pub fn with_output_style(mut self, style: OutputStyle) -> Self {
        self.common = self.common.with_output_style(style);
        self
    }

    pub fn with_source_map(mut self, style: SourceMapStyle) -> Self {
        self.common = self.common.with_source_map(style);
        self
    }

    pub fn without_charset(mut self) -> Self {
        self.common = self.common.without_charset();
        self
    }

    pub fn with_importer(mut self, importer: SassImporter) -> Self {
        self.common = self.common.with_importer(importer);
        self
    }

    pub fn with_function(
        mut self,
        signature: impl Into<String>,
        callable: Arc<dyn CallableFunction>,
    ) -> Self {
        self.common = self.common.with_function(signature, callable);
        self
    }
}
