//! Child process supervision
//!
//! Owns the compiler process and its two pipes. One reader task drains
//! stdout into decoded messages; one writer task serializes everything the
//! host sends, so bytes hit stdin in enqueue order. stderr is inherited -
//! the compiler's own diagnostics go wherever the host's stderr goes.
//!
//! The supervisor reports breakage (unexpected exit, EOF, decode or write
//! failure) as an event and never restarts the child on its own; restart
//! policy belongs to the lifecycle controller.
//!
//! The transport is injectable: anything `AsyncRead`/`AsyncWrite` works,
//! which is how the end-to-end tests drive a scripted mock compiler over
//! an in-memory duplex.

use bytes::BytesMut;
use prost::Message;
use sass_protocol::frame::{encode_frame, read_frame};
use sass_protocol::messages::{InboundMessage, OutboundMessage};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::error::LifecycleError;

/// Outbound work for the writer task.
pub(crate) enum WriteRequest {
    Frame(u32, InboundMessage),
    /// Close stdin, telling a healthy compiler to exit
    Shutdown,
}

/// What the reader saw.
pub(crate) enum ReaderEvent {
    Frame(u32, OutboundMessage),
    /// The stream ended. `None` is a clean EOF on a frame boundary;
    /// `Some` describes corruption or an I/O failure.
    Closed(Option<String>),
}

/// A running compiler child (or an injected transport) plus its pumps.
pub(crate) struct ChildHandle {
    writer_tx: mpsc::UnboundedSender<WriteRequest>,
    inbound_rx: Option<mpsc::UnboundedReceiver<ReaderEvent>>,
    child: Option<Child>,
}

impl ChildHandle {
    /// Launch the compiler binary in embedded mode.
    pub(crate) fn spawn(path: &Path, args: &[String]) -> Result<Self, LifecycleError> {
        let mut child = Command::new(path)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                LifecycleError::new(format!(
                    "failed to start Sass compiler {}: {}",
                    path.display(),
                    e
                ))
            })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            LifecycleError::new("failed to start Sass compiler: no stdin pipe")
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            LifecycleError::new("failed to start Sass compiler: no stdout pipe")
        })?;
        debug!(path = %path.display(), pid = child.id(), "spawned Sass compiler");
        Ok(Self::connect(stdout, stdin, Some(child)))
    }

    /// Attach to an arbitrary transport. Used by [`ChildHandle::spawn`]
    /// and by tests.
    pub(crate) fn connect<R, W>(stdout: R, stdin: W, child: Option<Child>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (writer_tx, writer_rx) = mpsc::unbounded_channel();

        tokio::spawn(reader_task(stdout, inbound_tx.clone()));
        tokio::spawn(writer_task(stdin, writer_rx, inbound_tx));

        Self {
            writer_tx,
            inbound_rx: Some(inbound_rx),
            child,
        }
    }

    /// Queue a frame. Returns false when the writer is gone, which means
    /// the connection is broken.
    pub(crate) fn send(&self, compilation_id: u32, message: InboundMessage) -> bool {
        self.writer_tx
            .send(WriteRequest::Frame(compilation_id, message))
            .is_ok()
    }

    pub(crate) fn sender(&self) -> mpsc::UnboundedSender<WriteRequest> {
        self.writer_tx.clone()
    }

    /// The reader's event stream. Taken once, by the router.
    pub(crate) fn take_inbound(&mut self) -> Option<mpsc::UnboundedReceiver<ReaderEvent>> {
        self.inbound_rx.take()
    }

    /// SIGKILL the child and reap it.
    pub(crate) async fn kill(&mut self) {
        if let Some(child) = self.child.as_mut() {
            if let Err(e) = child.start_kill() {
                trace!(error = %e, "kill on already-dead compiler");
            }
            let _ = child.wait().await;
        }
        self.child = None;
    }

    /// Close stdin and wait for the child to exit; kill after the grace
    /// period.
    pub(crate) async fn graceful_shutdown(&mut self, grace: Duration) {
        let _ = self.writer_tx.send(WriteRequest::Shutdown);
        if let Some(child) = self.child.as_mut() {
            match tokio::time::timeout(grace, child.wait()).await {
                Ok(Ok(status)) => debug!(%status, "Sass compiler exited"),
                Ok(Err(e)) => warn!(error = %e, "error reaping Sass compiler"),
                Err(_) => {
                    warn!("Sass compiler did not exit after stdin close, killing");
                    self.kill().await;
                    return;
                }
            }
        }
        self.child = None;
    }
}

async fn reader_task<R: AsyncRead + Unpin>(
    mut stdout: R,
    events: mpsc::UnboundedSender<ReaderEvent>,
) {
    loop {
        match read_frame(&mut stdout).await {
            Ok(Some((id, body))) => match OutboundMessage::decode(body) {
                Ok(message) => {
                    trace!(id, kind = message.kind_name(), "inbound message");
                    if events.send(ReaderEvent::Frame(id, message)).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    let _ = events.send(ReaderEvent::Closed(Some(format!(
                        "undecodable message from compiler: {}",
                        e
                    ))));
                    return;
                }
            },
            Ok(None) => {
                let _ = events.send(ReaderEvent::Closed(None));
                return;
            }
            Err(e) => {
                let _ = events.send(ReaderEvent::Closed(Some(e.to_string())));
                return;
            }
        }
    }
}

async fn writer_task<W: AsyncWrite + Unpin>(
    mut stdin: W,
    mut requests: mpsc::UnboundedReceiver<WriteRequest>,
    events: mpsc::UnboundedSender<ReaderEvent>,
) {
    let mut buf = BytesMut::new();
    while let Some(request) = requests.recv().await {
        match request {
            WriteRequest::Frame(id, message) => {
                buf.clear();
                if let Err(e) = encode_frame(id, &message, &mut buf) {
                    let _ = events.send(ReaderEvent::Closed(Some(e.to_string())));
                    return;
                }
                if let Err(e) = stdin.write_all(&buf).await {
                    let _ = events.send(ReaderEvent::Closed(Some(format!(
                        "write to compiler failed: {}",
                        e
                    ))));
                    return;
                }
                if let Err(e) = stdin.flush().await {
                    let _ = events.send(ReaderEvent::Closed(Some(format!(
                        "flush to compiler failed: {}",
                        e
                    ))));
                    return;
                }
            }
            WriteRequest::Shutdown => {
                let _ = stdin.shutdown().await;
                return;
            }
        }
    }
}
