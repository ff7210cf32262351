//! The per-compilation state machine
//!
//! One driver owns each compilation: it sends the compile request, then
//! services the compiler's callback round trips until the final response,
//! a cancellation, or a protocol violation ends it.
//!
//! ## States
//!
//! `Created -> Sent -> Servicing <-> AwaitingReply -> Completed`.
//! Terminal outcomes are absorbing; at most one result is ever produced.
//!
//! ## Reply ordering
//!
//! Callback handlers run on their own tasks so slow user code never
//! blocks the reader, but replies must reach the compiler in the order
//! its requests arrived. Each request gets an arrival sequence number;
//! finished replies park in a buffer until every earlier reply has been
//! flushed.
//!
//! ## Cancellation
//!
//! Timeouts, `reinit`, and shutdown cancel cooperatively: the driver
//! returns on the next event-loop turn and in-flight handler tasks are
//! detached, their eventual replies discarded with the channel.

use crate::dispatcher::Dispatcher;
use crate::error::{
    CompilerError, CompilerMessage, LifecycleError, Location, MessageKind, ProtocolError,
    Span,
};
use crate::results::CompileResults;
use crate::supervisor::WriteRequest;
use sass_protocol::messages::{
    self as proto, InboundMessage, OutboundMessage, outbound_message,
};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, trace, warn};
use url::Url;

/// Everything that can wake a compilation driver.
#[derive(Debug)]
pub(crate) enum CompilationEvent {
    /// A frame routed from the compiler
    Inbound(OutboundMessage),
    /// A callback handler finished
    HandlerReply { seq: u64, reply: InboundMessage },
    /// A callback referenced something the host never registered
    HandlerViolation { description: String },
    /// reinit/shutdown/timeout ended this compilation
    Cancelled(String),
    /// The child process broke underneath us
    ChildBroken(String),
}

/// Terminal result of a driver run.
#[derive(Debug)]
pub(crate) enum DriverOutcome {
    Success(CompileResults),
    Failure(CompilerError),
    /// The child misbehaved; the caller tears the connection down
    Protocol(ProtocolError),
    Cancelled(LifecycleError),
    /// The deadline fired; the caller forces a restart
    TimedOut(LifecycleError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriverState {
    Created,
    Sent,
    Servicing,
    AwaitingReply,
    Completed,
}

pub(crate) struct CompilationDriver {
    id: u32,
    dispatcher: Arc<Dispatcher>,
    events_rx: mpsc::UnboundedReceiver<CompilationEvent>,
    events_tx: mpsc::UnboundedSender<CompilationEvent>,
    writer: mpsc::UnboundedSender<WriteRequest>,
    timeout: Option<Duration>,
    state: DriverState,
    messages: Vec<CompilerMessage>,
    /// Next arrival sequence number to hand out
    next_seq: u64,
    /// Next sequence allowed onto the wire
    next_to_flush: u64,
    /// Handlers running right now
    outstanding: usize,
    /// Finished replies waiting for their turn
    parked_replies: BTreeMap<u64, InboundMessage>,
}

impl CompilationDriver {
    pub(crate) fn new(
        id: u32,
        dispatcher: Arc<Dispatcher>,
        events_rx: mpsc::UnboundedReceiver<CompilationEvent>,
        events_tx: mpsc::UnboundedSender<CompilationEvent>,
        writer: mpsc::UnboundedSender<WriteRequest>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            id,
            dispatcher,
            events_rx,
            events_tx,
            writer,
            timeout,
            state: DriverState::Created,
            messages: Vec::new(),
            next_seq: 0,
            next_to_flush: 0,
            outstanding: 0,
            parked_replies: BTreeMap::new(),
        }
    }

    /// Drive the compilation to a terminal outcome.
    pub(crate) async fn run(mut self, request: proto::CompileRequest) -> DriverOutcome {
        self.transition(DriverState::Sent);
        if self
            .writer
            .send(WriteRequest::Frame(
                self.id,
                InboundMessage::compile_request(request),
            ))
            .is_err()
        {
            return self.complete(DriverOutcome::Protocol(ProtocolError::new(
                "compiler connection is closed",
            )));
        }
        // The deadline arms when the request is sent
        let deadline = self.timeout.map(|t| Instant::now() + t);

        loop {
            let event = match deadline {
                Some(at) => match tokio::time::timeout_at(at, self.events_rx.recv()).await
                {
                    Ok(event) => event,
                    Err(_) => {
                        let timeout = self.timeout.unwrap_or_default();
                        return self.complete(DriverOutcome::TimedOut(
                            LifecycleError::new(format!(
                                "Timeout: compilation took longer than {:?}",
                                timeout
                            )),
                        ));
                    }
                },
                None => self.events_rx.recv().await,
            };
            let Some(event) = event else {
                return self.complete(DriverOutcome::Protocol(ProtocolError::new(
                    "compilation event channel closed",
                )));
            };

            match event {
                CompilationEvent::Inbound(message) => {
                    if let Some(outcome) = self.handle_inbound(message) {
                        return self.complete(outcome);
                    }
                }
                CompilationEvent::HandlerReply { seq, reply } => {
                    self.release_in_order(seq, reply);
                }
                CompilationEvent::HandlerViolation { description } => {
                    return self.complete(self.escalate(description));
                }
                CompilationEvent::Cancelled(reason) => {
                    return self
                        .complete(DriverOutcome::Cancelled(LifecycleError::new(reason)));
                }
                CompilationEvent::ChildBroken(reason) => {
                    return self
                        .complete(DriverOutcome::Protocol(ProtocolError::new(reason)));
                }
            }
        }
    }

    fn transition(&mut self, to: DriverState) {
        if self.state != to {
            trace!(id = self.id, from = ?self.state, to = ?to, "compilation state");
            self.state = to;
        }
    }

    fn complete(&mut self, outcome: DriverOutcome) -> DriverOutcome {
        self.transition(DriverState::Completed);
        outcome
    }

    /// Returns the terminal outcome once the final message arrives.
    fn handle_inbound(&mut self, message: OutboundMessage) -> Option<DriverOutcome> {
        match message.message {
            Some(outbound_message::Message::CompileResponse(response)) => {
                Some(self.finish(response))
            }
            Some(outbound_message::Message::LogEvent(event)) => {
                self.transition(DriverState::Servicing);
                self.messages.push(message_from_log(event));
                None
            }
            Some(outbound_message::Message::CanonicalizeRequest(request)) => {
                let dispatcher = self.dispatcher.clone();
                self.spawn_handler(async move {
                    dispatcher.handle_canonicalize(request).await
                });
                None
            }
            Some(outbound_message::Message::ImportRequest(request)) => {
                let dispatcher = self.dispatcher.clone();
                self.spawn_handler(async move { dispatcher.handle_import(request).await });
                None
            }
            Some(outbound_message::Message::FileImportRequest(request)) => {
                let dispatcher = self.dispatcher.clone();
                self.spawn_handler(async move {
                    dispatcher.handle_file_import(request).await
                });
                None
            }
            Some(outbound_message::Message::FunctionCallRequest(request)) => {
                let dispatcher = self.dispatcher.clone();
                self.spawn_handler(async move {
                    dispatcher.handle_function_call(request).await
                });
                None
            }
            Some(outbound_message::Message::Error(error)) => {
                Some(DriverOutcome::Protocol(ProtocolError::new(format!(
                    "compiler reported: {}",
                    error.message
                ))))
            }
            Some(outbound_message::Message::VersionResponse(_)) => {
                Some(self.escalate("unexpected VersionResponse for a compilation".into()))
            }
            None => Some(self.escalate("message with no payload".into())),
        }
    }

    /// Run a callback handler on its own task, tagged with its arrival
    /// order.
    fn spawn_handler<F>(&mut self, handler: F)
    where
        F: Future<Output = Result<InboundMessage, String>> + Send + 'static,
    {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.outstanding += 1;
        self.transition(DriverState::AwaitingReply);

        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let event = match handler.await {
                Ok(reply) => CompilationEvent::HandlerReply { seq, reply },
                Err(description) => CompilationEvent::HandlerViolation { description },
            };
            // The driver may have completed already; that drop is fine
            let _ = events.send(event);
        });
    }

    /// Park a finished reply and flush everything that is now in order.
    fn release_in_order(&mut self, seq: u64, reply: InboundMessage) {
        self.outstanding -= 1;
        self.parked_replies.insert(seq, reply);
        while let Some(reply) = self.parked_replies.remove(&self.next_to_flush) {
            let _ = self
                .writer
                .send(WriteRequest::Frame(self.id, reply));
            self.next_to_flush += 1;
        }
        if self.outstanding == 0 && self.parked_replies.is_empty() {
            self.transition(DriverState::Servicing);
        }
    }

    /// Report a violation to the compiler (id 0) and fail this
    /// compilation; the controller tears the child down.
    fn escalate(&self, description: String) -> DriverOutcome {
        warn!(id = self.id, %description, "protocol violation");
        let _ = self.writer.send(WriteRequest::Frame(
            0,
            InboundMessage::error(proto::ProtocolErrorEvent {
                r#type: proto::ProtocolErrorType::Params as i32,
                id: self.id,
                message: description.clone(),
            }),
        ));
        DriverOutcome::Protocol(ProtocolError::new(description))
    }

    fn finish(&mut self, response: proto::CompileResponse) -> DriverOutcome {
        let loaded_urls = response
            .loaded_urls
            .iter()
            .filter_map(|raw| {
                Url::parse(raw)
                    .inspect_err(|e| warn!(url = raw, error = %e, "unparseable loaded URL"))
                    .ok()
            })
            .collect();
        let messages = std::mem::take(&mut self.messages);

        match response.result {
            Some(proto::compile_response::Result::Success(success)) => {
                debug!(id = self.id, css_bytes = success.css.len(), "compilation succeeded");
                DriverOutcome::Success(CompileResults {
                    css: success.css,
                    source_map: if success.source_map.is_empty() {
                        None
                    } else {
                        Some(success.source_map)
                    },
                    loaded_urls,
                    messages,
                })
            }
            Some(proto::compile_response::Result::Failure(failure)) => {
                debug!(id = self.id, message = %failure.message, "compilation failed");
                DriverOutcome::Failure(CompilerError {
                    message: failure.message,
                    span: failure.span.map(span_from_wire),
                    stack_trace: none_if_empty(failure.stack_trace),
                    messages,
                    description: failure.formatted,
                })
            }
            None => self.escalate("CompileResponse with no result".into()),
        }
    }
}

fn none_if_empty(text: String) -> Option<String> {
    if text.is_empty() { None } else { Some(text) }
}

/// Wire locations are 0-based; everything user-facing here is 1-based.
fn location_from_wire(location: proto::SourceLocation) -> Location {
    Location {
        offset: location.offset as usize,
        line: location.line as usize + 1,
        column: location.column as usize + 1,
    }
}

pub(crate) fn span_from_wire(span: proto::SourceSpan) -> Span {
    Span {
        text: span.text,
        url: Url::parse(&span.url).ok(),
        start: location_from_wire(span.start.unwrap_or_default()),
        end: span.end.map(location_from_wire),
        context: none_if_empty(span.context),
    }
}

pub(crate) fn message_from_log(event: proto::LogEvent) -> CompilerMessage {
    let kind = match proto::LogEventType::try_from(event.r#type) {
        Ok(proto::LogEventType::Warning) => MessageKind::Warning,
        Ok(proto::LogEventType::DeprecationWarning) => MessageKind::Deprecation,
        Ok(proto::LogEventType::Debug) => MessageKind::Debug,
        Err(_) => {
            warn!(raw = event.r#type, "unknown log event type");
            MessageKind::Warning
        }
    };
    CompilerMessage {
        kind,
        message: event.message,
        span: event.span.map(span_from_wire),
        stack_trace: none_if_empty(event.stack_trace),
        formatted: event.formatted,
    }
}
