//! Embedded Sass for Rust
//!
//! Runs the Dart Sass reference compiler as a long-lived child process
//! and exposes a typed async API over it: compile strings and files,
//! resolve imports with host [`Importer`]s, and define Sass functions in
//! Rust that stylesheets call back into.
//!
//! ```no_run
//! use sass_embedded::{Compiler, Options, StringOptions};
//!
//! # async fn demo() -> Result<(), sass_embedded::Error> {
//! let compiler = Compiler::new(Options::new()).await?;
//! let results = compiler
//!     .compile_string("a { b: 1 + 2 }", StringOptions::new())
//!     .await?;
//! assert!(results.css.contains("b: 3"));
//! compiler.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! One [`Compiler`] multiplexes any number of concurrent compilations
//! over a single child process; it is `Clone` and every clone shares the
//! same child. Values exchanged with host functions use the
//! backend-independent [`sass_values`] model, re-exported here as
//! [`values`].

mod compilation;
mod compiler;
mod convert;
mod dispatcher;
mod error;
mod importer;
mod multiplexer;
mod options;
mod results;
mod supervisor;

#[cfg(test)]
mod e2e_tests;

pub use compiler::{Compiler, CompilerInfo};
pub use error::{
    CompilerError, CompilerMessage, Error, LifecycleError, Location, MessageKind,
    ProtocolError, Span,
};
pub use importer::{
    FileImporter, FilesystemImporter, Importer, ImporterContext, ImporterResults,
    SassImporter,
};
pub use options::{
    CompileOptions, DEFAULT_TIMEOUT, DeprecationControl, MessageStyle, Options,
    OutputStyle, SourceMapStyle, StringOptions, Syntax, WarningLevel,
};
pub use results::CompileResults;

pub use sass_values as values;
pub use sass_values::{ArgumentList, CallableFunction, Value, ValueError};
