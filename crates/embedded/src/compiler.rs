//! The lifecycle controller and public facade
//!
//! A [`Compiler`] owns one Dart Sass child process and multiplexes every
//! compilation over it. Child state is explicit:
//!
//! ```text
//! starting -> running -> broken -> running -> ... -> shutdown
//!                  \-> failed (start or handshake failed; permanent)
//! ```
//!
//! The controller is the only component that restarts the child. A broken
//! connection fails the compilations that were in flight; the next
//! compile attempts a restart. A child that will not start parks the
//! controller in the failed state, where every call reports
//! "failed to start" until a new `Compiler` is constructed.
//!
//! `Compiler` is cheap to clone and safe to use from many tasks at once;
//! host callbacks may clone it and start nested compilations.

use crate::compilation::{CompilationDriver, DriverOutcome};
use crate::dispatcher::Dispatcher;
use crate::error::{Error, LifecycleError};
use crate::multiplexer::Registry;
use crate::options::{
    CompileOptions, MessageStyle, Options, SourceMapStyle, StringOptions, Syntax,
    WarningLevel,
};
use crate::results::CompileResults;
use crate::supervisor::{ChildHandle, ReaderEvent, WriteRequest};
use sass_protocol::messages::{self as proto, InboundMessage, outbound_message};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::{debug, info, warn};
use url::Url;

/// How long the version handshake may take before a start counts as
/// failed.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a graceful shutdown waits after closing stdin before killing.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

/// Protocol versions below this are rejected at the handshake.
const MINIMUM_PROTOCOL_VERSION: (u64, u64, u64) = (2, 0, 0);

/// Compiler versions accepted by default; overridable at build time via
/// `SASS_EMBEDDED_COMPILER_MIN` / `SASS_EMBEDDED_COMPILER_MAX`.
const DEFAULT_COMPILER_MIN: &str = "1.63.0";
const DEFAULT_COMPILER_MAX: &str = "2.0.0";

/// Identity reported by the child at the version handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerInfo {
    pub protocol_version: String,
    pub compiler_version: String,
    pub implementation_name: String,
    pub implementation_version: String,
}

/// How to produce a child connection.
pub(crate) enum Launcher {
    Binary { path: PathBuf, args: Vec<String> },
    #[cfg(test)]
    Mock(Arc<dyn Fn() -> ChildHandle + Send + Sync>),
}

/// A live child connection and its routing task.
struct Connection {
    handle: ChildHandle,
    generation: u64,
    /// Set by the router when the connection dies under us
    broken: Arc<AtomicBool>,
}

enum ControllerState {
    Running(Connection),
    /// Connection lost; the next compile restarts
    Broken,
    /// Start or handshake failed; permanent
    Failed,
    Shutdown,
}

struct CompilerInner {
    options: Options,
    launcher: Launcher,
    registry: Arc<Registry>,
    state: Mutex<ControllerState>,
    start_count: AtomicU64,
    generation: AtomicU64,
    info: StdMutex<Option<CompilerInfo>>,
    pending_version: Arc<StdMutex<Option<oneshot::Sender<proto::VersionResponse>>>>,
}

/// The embedded Sass compiler.
#[derive(Clone)]
pub struct Compiler {
    inner: Arc<CompilerInner>,
}

impl std::fmt::Debug for Compiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiler").finish_non_exhaustive()
    }
}

impl Compiler {
    /// Start the compiler and perform the version handshake.
    ///
    /// Without an explicit binary path, the bundled platform-specific
    /// compiler next to the host executable is used; if none is found
    /// this fails with `LifecycleError("embedded compiler not found")`.
    pub async fn new(options: Options) -> Result<Self, Error> {
        let path = match &options.compiler_path {
            Some(path) => path.clone(),
            None => bundled_compiler_path().ok_or_else(|| {
                Error::Lifecycle(LifecycleError::new("embedded compiler not found"))
            })?,
        };
        let mut args = vec!["--embedded".to_string()];
        args.extend(options.compiler_args.iter().cloned());
        Self::with_launcher(options, Launcher::Binary { path, args }).await
    }

    pub(crate) async fn with_launcher(
        options: Options,
        launcher: Launcher,
    ) -> Result<Self, Error> {
        let inner = Arc::new(CompilerInner {
            options,
            launcher,
            registry: Arc::new(Registry::new()),
            state: Mutex::new(ControllerState::Broken),
            start_count: AtomicU64::new(0),
            generation: AtomicU64::new(0),
            info: StdMutex::new(None),
            pending_version: Arc::new(StdMutex::new(None)),
        });
        let compiler = Compiler { inner };
        {
            let mut state = compiler.inner.state.lock().await;
            match compiler.inner.start_connection().await {
                Ok(connection) => *state = ControllerState::Running(connection),
                Err(e) => {
                    *state = ControllerState::Failed;
                    return Err(e.into());
                }
            }
        }
        Ok(compiler)
    }

    /// Compile a stylesheet given as a string.
    pub async fn compile_string(
        &self,
        source: impl Into<String>,
        options: StringOptions,
    ) -> Result<CompileResults, Error> {
        let input = proto::compile_request::Input::String(proto::StringInput {
            source: source.into(),
            url: options.url.as_ref().map(Url::to_string).unwrap_or_default(),
            syntax: syntax_to_wire(options.syntax) as i32,
            importer: None,
        });
        self.compile(input, options.common).await
    }

    /// Compile a stylesheet the compiler loads from disk itself.
    pub async fn compile_file(
        &self,
        path: impl AsRef<Path>,
        options: CompileOptions,
    ) -> Result<CompileResults, Error> {
        let input =
            proto::compile_request::Input::Path(path.as_ref().display().to_string());
        self.compile(input, options).await
    }

    async fn compile(
        &self,
        input: proto::compile_request::Input,
        options: CompileOptions,
    ) -> Result<CompileResults, Error> {
        let inner = &self.inner;
        let (writer, generation) = inner.ensure_running().await?;

        let dispatcher = Arc::new(Dispatcher::new(
            &inner.options.importers,
            options.importers,
            &inner.options.functions,
            options.functions,
        ));
        let request = build_request(
            &inner.options,
            options.output_style,
            options.source_map,
            options.include_charset,
            &dispatcher,
            input,
        );

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let id = inner.registry.register(events_tx.clone());
        let driver = CompilationDriver::new(
            id,
            dispatcher,
            events_rx,
            events_tx,
            writer,
            inner.options.timeout,
        );
        let outcome = driver.run(request).await;
        inner.registry.deregister(id);

        match outcome {
            DriverOutcome::Success(results) => Ok(results),
            DriverOutcome::Failure(error) => Err(Error::Compiler(error)),
            DriverOutcome::Cancelled(error) => Err(Error::Lifecycle(error)),
            DriverOutcome::Protocol(error) => {
                inner.mark_broken(generation).await;
                Err(Error::Protocol(error))
            }
            DriverOutcome::TimedOut(error) => {
                // The child is presumed stuck; restart it for everyone
                inner
                    .restart(generation, "compiler restarted after a timeout")
                    .await;
                Err(Error::Lifecycle(error))
            }
        }
    }

    /// Kill the child and start a fresh one. Every in-flight compilation
    /// fails with a "User requested" lifecycle error.
    pub async fn reinit(&self) -> Result<(), Error> {
        let inner = &self.inner;
        let mut state = inner.state.lock().await;
        match std::mem::replace(&mut *state, ControllerState::Broken) {
            ControllerState::Shutdown => {
                *state = ControllerState::Shutdown;
                Err(Error::Lifecycle(LifecycleError::new(
                    "the compiler is shut down",
                )))
            }
            ControllerState::Failed => {
                *state = ControllerState::Failed;
                Err(Error::Lifecycle(LifecycleError::new(
                    "the Sass compiler failed to start and is out of service",
                )))
            }
            previous => {
                inner
                    .registry
                    .cancel_all("User requested restart of the Sass compiler");
                if let ControllerState::Running(mut connection) = previous {
                    connection.handle.kill().await;
                }
                match inner.start_connection().await {
                    Ok(connection) => {
                        *state = ControllerState::Running(connection);
                        Ok(())
                    }
                    Err(e) => {
                        *state = ControllerState::Failed;
                        Err(e.into())
                    }
                }
            }
        }
    }

    /// Stop accepting compilations, wait for in-flight ones, and end the
    /// child. Idempotent.
    pub async fn shutdown(&self) {
        let previous = {
            let mut state = self.inner.state.lock().await;
            std::mem::replace(&mut *state, ControllerState::Shutdown)
        };
        if let ControllerState::Running(mut connection) = previous {
            debug!("waiting for in-flight compilations before shutdown");
            self.inner.registry.wait_idle().await;
            connection.handle.graceful_shutdown(SHUTDOWN_GRACE).await;
            info!("Sass compiler shut down");
        }
    }

    /// Number of successful child starts over this controller's life.
    /// Increments on construction and on every restart.
    pub fn start_count(&self) -> u64 {
        self.inner.start_count.load(Ordering::Relaxed)
    }

    /// Compilations currently in flight.
    pub fn active_compilations(&self) -> usize {
        self.inner.registry.active_count()
    }

    /// Identity the child reported at the last successful handshake.
    pub fn compiler_info(&self) -> Option<CompilerInfo> {
        self.inner
            .info
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl CompilerInner {
    /// Hand out the current connection, restarting a broken child first.
    async fn ensure_running(
        &self,
    ) -> Result<(mpsc::UnboundedSender<WriteRequest>, u64), Error> {
        let mut state = self.state.lock().await;
        loop {
            match &mut *state {
                ControllerState::Running(connection) => {
                    if connection.broken.load(Ordering::Acquire) {
                        connection.handle.kill().await;
                        *state = ControllerState::Broken;
                        continue;
                    }
                    return Ok((connection.handle.sender(), connection.generation));
                }
                ControllerState::Broken => match self.start_connection().await {
                    Ok(connection) => *state = ControllerState::Running(connection),
                    Err(e) => {
                        *state = ControllerState::Failed;
                        return Err(e.into());
                    }
                },
                ControllerState::Failed => {
                    return Err(Error::Lifecycle(LifecycleError::new(
                        "the Sass compiler failed to start and is out of service",
                    )));
                }
                ControllerState::Shutdown => {
                    return Err(Error::Lifecycle(LifecycleError::new(
                        "the compiler is shut down",
                    )));
                }
            }
        }
    }

    /// Launch a child and complete the version handshake.
    async fn start_connection(&self) -> Result<Connection, LifecycleError> {
        let mut handle = match &self.launcher {
            Launcher::Binary { path, args } => ChildHandle::spawn(path, args)?,
            #[cfg(test)]
            Launcher::Mock(factory) => factory(),
        };
        let inbound = handle.take_inbound().ok_or_else(|| {
            LifecycleError::new("failed to start Sass compiler: connection already used")
        })?;
        let broken = Arc::new(AtomicBool::new(false));
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;

        tokio::spawn(router_task(
            inbound,
            self.registry.clone(),
            self.pending_version.clone(),
            broken.clone(),
            handle.sender(),
        ));

        let (version_tx, version_rx) = oneshot::channel();
        *self
            .pending_version
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(version_tx);

        if !handle.send(
            0,
            InboundMessage::version_request(proto::VersionRequest { id: 0 }),
        ) {
            handle.kill().await;
            return Err(LifecycleError::new(
                "failed to start Sass compiler: connection closed before handshake",
            ));
        }
        let response = match tokio::time::timeout(HANDSHAKE_TIMEOUT, version_rx).await {
            Ok(Ok(response)) => response,
            _ => {
                handle.kill().await;
                return Err(LifecycleError::new(
                    "failed to start Sass compiler: no version handshake",
                ));
            }
        };

        let info = match validate_version(&response) {
            Ok(info) => info,
            Err(e) => {
                handle.kill().await;
                return Err(e);
            }
        };
        info!(
            compiler = %info.compiler_version,
            implementation = %info.implementation_name,
            protocol = %info.protocol_version,
            "Sass compiler ready"
        );
        *self.info.lock().unwrap_or_else(|e| e.into_inner()) = Some(info);
        self.start_count.fetch_add(1, Ordering::Relaxed);

        Ok(Connection {
            handle,
            generation,
            broken,
        })
    }

    /// Tear down a connection a compilation found broken, unless a newer
    /// one already replaced it.
    async fn mark_broken(&self, generation: u64) {
        let mut state = self.state.lock().await;
        if let ControllerState::Running(connection) = &mut *state {
            if connection.generation == generation {
                connection.handle.kill().await;
                self.registry.break_all("the Sass compiler connection was lost");
                *state = ControllerState::Broken;
            }
        }
    }

    /// Kill and immediately respawn, cancelling everything in flight.
    async fn restart(&self, generation: u64, reason: &str) {
        let mut state = self.state.lock().await;
        if let ControllerState::Running(connection) = &mut *state {
            if connection.generation != generation {
                return;
            }
            self.registry.cancel_all(reason);
            connection.handle.kill().await;
            match self.start_connection().await {
                Ok(connection) => *state = ControllerState::Running(connection),
                Err(e) => {
                    warn!(error = %e, "restart after timeout failed");
                    *state = ControllerState::Failed;
                }
            }
        }
    }
}

/// Forward reader events to their compilations; id 0 belongs to the
/// controller itself.
async fn router_task(
    mut inbound: mpsc::UnboundedReceiver<ReaderEvent>,
    registry: Arc<Registry>,
    pending_version: Arc<StdMutex<Option<oneshot::Sender<proto::VersionResponse>>>>,
    broken: Arc<AtomicBool>,
    writer: mpsc::UnboundedSender<WriteRequest>,
) {
    while let Some(event) = inbound.recv().await {
        match event {
            ReaderEvent::Frame(0, message) => match message.message {
                Some(outbound_message::Message::VersionResponse(response)) => {
                    let pending = pending_version
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .take();
                    match pending {
                        Some(tx) => {
                            let _ = tx.send(response);
                        }
                        None => warn!("unsolicited version response"),
                    }
                }
                Some(outbound_message::Message::Error(error)) => {
                    broken.store(true, Ordering::Release);
                    registry.break_all(&format!(
                        "the compiler reported a protocol error: {}",
                        error.message
                    ));
                    return;
                }
                _ => {
                    broken.store(true, Ordering::Release);
                    let _ = writer.send(WriteRequest::Frame(
                        0,
                        InboundMessage::error(proto::ProtocolErrorEvent {
                            r#type: proto::ProtocolErrorType::Params as i32,
                            id: 0,
                            message: "unexpected message addressed to the compiler id"
                                .to_string(),
                        }),
                    ));
                    warn!("unexpected message at id 0");
                    registry.break_all("unexpected message addressed to id 0");
                    return;
                }
            },
            ReaderEvent::Frame(id, message) => {
                let droppable = Registry::droppable_when_stale(&message);
                let kind = message.kind_name();
                match registry.route(id, message) {
                    crate::multiplexer::RouteOutcome::Delivered => {}
                    crate::multiplexer::RouteOutcome::UnknownId if droppable => {
                        debug!(id, kind, "dropping stale message");
                    }
                    crate::multiplexer::RouteOutcome::UnknownId => {
                        broken.store(true, Ordering::Release);
                        let _ = writer.send(WriteRequest::Frame(
                            0,
                            InboundMessage::error(proto::ProtocolErrorEvent {
                                r#type: proto::ProtocolErrorType::Params as i32,
                                id,
                                message: format!(
                                    "{} addressed to unknown compilation {}",
                                    kind, id
                                ),
                            }),
                        ));
                        registry.break_all(&format!(
                            "{} addressed to unknown compilation {}",
                            kind, id
                        ));
                        return;
                    }
                }
            }
            ReaderEvent::Closed(reason) => {
                broken.store(true, Ordering::Release);
                let description = reason
                    .unwrap_or_else(|| "the Sass compiler exited unexpectedly".to_string());
                registry.break_all(&description);
                return;
            }
        }
    }
}

fn build_request(
    options: &Options,
    output_style: crate::options::OutputStyle,
    source_map: SourceMapStyle,
    include_charset: bool,
    dispatcher: &Dispatcher,
    input: proto::compile_request::Input,
) -> proto::CompileRequest {
    proto::CompileRequest {
        input: Some(input),
        style: match output_style {
            crate::options::OutputStyle::Expanded => proto::OutputStyle::Expanded as i32,
            crate::options::OutputStyle::Compressed => {
                proto::OutputStyle::Compressed as i32
            }
        },
        source_map: source_map != SourceMapStyle::None,
        source_map_include_sources: source_map == SourceMapStyle::EmbeddedSources,
        importers: dispatcher.importer_specs(),
        global_functions: dispatcher.function_signatures(),
        alert_color: options.message_style == MessageStyle::TerminalColored,
        alert_ascii: false,
        verbose: options.verbose_deprecations
            || options.warning_level == WarningLevel::Verbose,
        quiet_deps: options.warning_level == WarningLevel::Silent,
        silent: options.warning_level == WarningLevel::Silent,
        charset: include_charset,
        fatal_deprecation: options.deprecations.fatal.iter().cloned().collect(),
        silence_deprecation: options.deprecations.silence.iter().cloned().collect(),
        future_deprecation: options.deprecations.future.iter().cloned().collect(),
    }
}

fn syntax_to_wire(syntax: Syntax) -> proto::Syntax {
    match syntax {
        Syntax::Scss => proto::Syntax::Scss,
        Syntax::Indented => proto::Syntax::Indented,
        Syntax::Css => proto::Syntax::Css,
    }
}

/// Accept the child iff its protocol version meets the pinned minimum on
/// the same major, and its compiler version falls in the accepted range.
fn validate_version(
    response: &proto::VersionResponse,
) -> Result<CompilerInfo, LifecycleError> {
    let protocol = parse_version(&response.protocol_version).ok_or_else(|| {
        LifecycleError::new(format!(
            "failed to start Sass compiler: unparseable protocol version {:?}",
            response.protocol_version
        ))
    })?;
    if protocol < MINIMUM_PROTOCOL_VERSION || protocol.0 != MINIMUM_PROTOCOL_VERSION.0 {
        return Err(LifecycleError::new(format!(
            "failed to start Sass compiler: protocol version {} is unsupported",
            response.protocol_version
        )));
    }

    let minimum = option_env!("SASS_EMBEDDED_COMPILER_MIN").unwrap_or(DEFAULT_COMPILER_MIN);
    let maximum = option_env!("SASS_EMBEDDED_COMPILER_MAX").unwrap_or(DEFAULT_COMPILER_MAX);
    let compiler = parse_version(&response.compiler_version).ok_or_else(|| {
        LifecycleError::new(format!(
            "failed to start Sass compiler: unparseable compiler version {:?}",
            response.compiler_version
        ))
    })?;
    let in_range = parse_version(minimum).is_none_or(|min| compiler >= min)
        && parse_version(maximum).is_none_or(|max| compiler < max);
    if !in_range {
        return Err(LifecycleError::new(format!(
            "failed to start Sass compiler: version {} is outside {}..{}",
            response.compiler_version, minimum, maximum
        )));
    }

    Ok(CompilerInfo {
        protocol_version: response.protocol_version.clone(),
        compiler_version: response.compiler_version.clone(),
        implementation_name: response.implementation_name.clone(),
        implementation_version: response.implementation_version.clone(),
    })
}

/// `major[.minor[.patch]]`, tolerating pre-release suffixes on the last
/// component.
fn parse_version(text: &str) -> Option<(u64, u64, u64)> {
    let mut parts = text.splitn(3, '.');
    let major = parts.next()?.parse().ok()?;
    let minor = match parts.next() {
        Some(p) => p.parse().ok()?,
        None => 0,
    };
    let patch = match parts.next() {
        Some(p) => {
            let digits: String = p.chars().take_while(|c| c.is_ascii_digit()).collect();
            if digits.is_empty() {
                0
            } else {
                digits.parse().ok()?
            }
        }
        None => 0,
    };
    Some((major, minor, patch))
}

/// Platform-specific lookup of the compiler packaged next to the host
/// executable.
fn bundled_compiler_path() -> Option<PathBuf> {
    let platform = match (std::env::consts::OS, std::env::consts::ARCH) {
        ("macos", "aarch64") => "macos-arm64",
        ("macos", "x86_64") => "macos-x64",
        ("linux", "aarch64") => "linux-arm64",
        ("linux", "x86_64") => "linux-x64",
        _ => return None,
    };
    let exe = std::env::current_exe().ok()?;
    let dir = exe.parent()?;
    let candidate = dir
        .join("sass-embedded")
        .join(platform)
        .join("dart-sass")
        .join("sass");
    candidate.is_file().then_some(candidate)
}
