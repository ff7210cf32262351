//! End-to-end tests against a scripted mock compiler
//!
//! The real Dart Sass binary is not available here, so these tests drive
//! the full stack - facade, multiplexer, drivers, dispatcher, supervisor,
//! frame codec - against a mock compiler speaking the wire protocol over
//! in-memory duplex pipes. Each test scripts the compiler side explicitly.

use crate::compiler::{Compiler, Launcher};
use crate::error::{Error, MessageKind};
use crate::importer::{Importer, ImporterContext, ImporterResults, SassImporter};
use crate::options::{Options, StringOptions};
use crate::supervisor::ChildHandle;
use async_trait::async_trait;
use bytes::BytesMut;
use prost::Message;
use sass_protocol::frame::{encode_frame, read_frame};
use sass_protocol::messages::{self as proto, inbound_message, outbound_message};
use sass_values::{ArgumentList, CallableFunction, SassNumber, SassString, Value, ValueError};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, DuplexStream};
use url::Url;

/// The mock compiler's end of the pipes.
struct MockIo {
    /// Reads what the host writes to the child's stdin
    reader: DuplexStream,
    /// Writes what the host reads from the child's stdout
    writer: DuplexStream,
}

impl MockIo {
    async fn recv(&mut self) -> Option<(u32, proto::InboundMessage)> {
        let (id, body) = read_frame(&mut self.reader).await.ok()??;
        Some((id, proto::InboundMessage::decode(body).ok()?))
    }

    async fn send(&mut self, id: u32, message: proto::OutboundMessage) {
        let mut buf = BytesMut::new();
        encode_frame(id, &message, &mut buf).unwrap();
        self.writer.write_all(&buf).await.unwrap();
    }

    /// Answer the version handshake.
    async fn handshake(&mut self) {
        self.handshake_with("2.7.1", "1.77.0").await;
    }

    async fn handshake_with(&mut self, protocol: &str, compiler: &str) {
        let (id, message) = self.recv().await.expect("handshake request");
        assert_eq!(id, 0);
        let request_id = match message.message {
            Some(inbound_message::Message::VersionRequest(r)) => r.id,
            other => panic!("expected version request, got {:?}", other),
        };
        self.send(
            0,
            out(outbound_message::Message::VersionResponse(
                proto::VersionResponse {
                    id: request_id,
                    protocol_version: protocol.to_string(),
                    compiler_version: compiler.to_string(),
                    implementation_version: compiler.to_string(),
                    implementation_name: "mock-sass".to_string(),
                },
            )),
        )
        .await;
    }

    /// Wait for a compile request and return its id and body.
    async fn expect_compile(&mut self) -> (u32, proto::CompileRequest) {
        match self.recv().await.expect("compile request") {
            (id, proto::InboundMessage {
                message: Some(inbound_message::Message::CompileRequest(request)),
            }) => (id, request),
            (_, other) => panic!("expected compile request, got {:?}", other),
        }
    }
}

fn out(message: outbound_message::Message) -> proto::OutboundMessage {
    proto::OutboundMessage {
        message: Some(message),
    }
}

fn success_css(css: &str, loaded_urls: &[&str]) -> proto::OutboundMessage {
    out(outbound_message::Message::CompileResponse(
        proto::CompileResponse {
            result: Some(proto::compile_response::Result::Success(
                proto::CompileSuccess {
                    css: css.to_string(),
                    source_map: String::new(),
                },
            )),
            loaded_urls: loaded_urls.iter().map(|u| u.to_string()).collect(),
        },
    ))
}

fn log_warning(text: &str) -> proto::OutboundMessage {
    out(outbound_message::Message::LogEvent(proto::LogEvent {
        r#type: proto::LogEventType::Warning as i32,
        message: text.to_string(),
        span: None,
        stack_trace: String::new(),
        formatted: format!("WARNING: {}", text),
    }))
}

fn call_request(id: u32, name: &str, arguments: Vec<proto::Value>) -> proto::OutboundMessage {
    out(outbound_message::Message::FunctionCallRequest(
        proto::FunctionCallRequest {
            id,
            identifier: Some(proto::function_call_request::Identifier::Name(
                name.to_string(),
            )),
            arguments,
            keyword_arguments: Default::default(),
        },
    ))
}

fn wire_number(value: f64) -> proto::Value {
    proto::Value {
        kind: Some(proto::value::Kind::Number(proto::NumberValue {
            value,
            numerators: vec![],
            denominators: vec![],
        })),
    }
}

fn string_source(request: &proto::CompileRequest) -> String {
    match &request.input {
        Some(proto::compile_request::Input::String(input)) => input.source.clone(),
        other => panic!("expected string input, got {:?}", other),
    }
}

/// A launcher that runs `server` for every child session, plus a counter
/// of sessions started.
fn mock_launcher<F, Fut>(server: F) -> (Launcher, Arc<AtomicU64>)
where
    F: Fn(MockIo, u64) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let sessions = Arc::new(AtomicU64::new(0));
    let counted = sessions.clone();
    let launcher = Launcher::Mock(Arc::new(move || {
        let session = counted.fetch_add(1, Ordering::SeqCst) + 1;
        let (host_stdin, mock_stdin) = tokio::io::duplex(1 << 16);
        let (mock_stdout, host_stdout) = tokio::io::duplex(1 << 16);
        tokio::spawn(server(
            MockIo {
                reader: mock_stdin,
                writer: mock_stdout,
            },
            session,
        ));
        ChildHandle::connect(host_stdout, host_stdin, None)
    }));
    (launcher, sessions)
}

async fn compiler_with<F, Fut>(options: Options, server: F) -> (Compiler, Arc<AtomicU64>)
where
    F: Fn(MockIo, u64) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (launcher, sessions) = mock_launcher(server);
    let compiler = Compiler::with_launcher(options, launcher)
        .await
        .expect("mock compiler starts");
    (compiler, sessions)
}

/// Handshake then answer every compile with a canned success.
async fn echo_server(mut io: MockIo, _session: u64) {
    io.handshake().await;
    while let Some((id, message)) = io.recv().await {
        if let Some(inbound_message::Message::CompileRequest(request)) = message.message {
            let css = format!("/* {} */", string_source(&request));
            io.send(id, success_css(&css, &[])).await;
        }
    }
}

#[tokio::test]
async fn test_inline_compile() {
    let server = |mut io: MockIo, _session: u64| async move {
        io.handshake().await;
        let (id, request) = io.expect_compile().await;
        assert_eq!(id, 1);
        assert!(string_source(&request).contains("div"));
        io.send(id, success_css("div a {\n  color: blue;\n}\n", &[]))
            .await;
    };
    let (compiler, _) = compiler_with(Options::new(), server).await;

    let results = compiler
        .compile_string("div { a { color: blue; } }", StringOptions::new())
        .await
        .unwrap();
    assert!(results.css.contains("div a {"));
    assert!(results.css.contains("color: blue;"));
    assert!(results.messages.is_empty());
    assert!(results.source_map.is_none());
    compiler.shutdown().await;
}

#[tokio::test]
async fn test_warning_propagation() {
    let server = |mut io: MockIo, _session: u64| async move {
        io.handshake().await;
        let (id, _request) = io.expect_compile().await;
        io.send(id, log_warning("hi")).await;
        io.send(id, success_css("a {\n  b: 1;\n}\n", &[])).await;
    };
    let (compiler, _) = compiler_with(Options::new(), server).await;

    let results = compiler
        .compile_string("@warn \"hi\"; a{b:1}", StringOptions::new())
        .await
        .unwrap();
    assert_eq!(results.messages.len(), 1);
    assert_eq!(results.messages[0].kind, MessageKind::Warning);
    assert!(results.messages[0].message.contains("hi"));
    assert!(results.css.contains("b: 1;"));
    compiler.shutdown().await;
}

#[tokio::test]
async fn test_compile_error_spans() {
    let server = |mut io: MockIo, _session: u64| async move {
        io.handshake().await;
        let (id, _request) = io.expect_compile().await;
        io.send(
            id,
            out(outbound_message::Message::CompileResponse(
                proto::CompileResponse {
                    result: Some(proto::compile_response::Result::Failure(
                        proto::CompileFailure {
                            message: "expected \"}\".".to_string(),
                            span: Some(proto::SourceSpan {
                                text: String::new(),
                                start: Some(proto::SourceLocation {
                                    offset: 8,
                                    line: 0,
                                    column: 8,
                                }),
                                end: None,
                                url: String::new(),
                                context: "a { b: c".to_string(),
                            }),
                            stack_trace: String::new(),
                            formatted: "Error: expected \"}\".".to_string(),
                        },
                    )),
                    loaded_urls: vec![],
                },
            )),
        )
        .await;
    };
    let (compiler, _) = compiler_with(Options::new(), server).await;

    let error = compiler
        .compile_string("a { b: c", StringOptions::new())
        .await
        .unwrap_err();
    match error {
        Error::Compiler(e) => {
            let span = e.span.expect("span");
            assert_eq!(span.start.line, 1);
            assert!(e.description.starts_with("Error:"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    compiler.shutdown().await;
}

struct ExtrasImporter;

#[async_trait]
impl Importer for ExtrasImporter {
    async fn canonicalize(
        &self,
        url: &str,
        _context: &ImporterContext,
    ) -> Result<Option<Url>, String> {
        if url == "extras" {
            Ok(Some(Url::parse("custom://extras").unwrap()))
        } else {
            Ok(None)
        }
    }

    async fn load(&self, _canonical_url: &Url) -> Result<ImporterResults, String> {
        Ok(ImporterResults::scss("$c: red; a{color:$c}"))
    }
}

#[tokio::test]
async fn test_custom_importer_round_trips() {
    let server = |mut io: MockIo, _session: u64| async move {
        io.handshake().await;
        let (id, request) = io.expect_compile().await;
        assert_eq!(
            request.importers[0].importer,
            Some(proto::compile_request::ImporterKind::ImporterId(1))
        );

        io.send(
            id,
            out(outbound_message::Message::CanonicalizeRequest(
                proto::CanonicalizeRequest {
                    id: 1,
                    importer_id: 1,
                    url: "extras".to_string(),
                    from_import: false,
                    containing_url: None,
                },
            )),
        )
        .await;
        match io.recv().await.expect("canonicalize response") {
            (_, proto::InboundMessage {
                message: Some(inbound_message::Message::CanonicalizeResponse(response)),
            }) => {
                assert_eq!(
                    response.result,
                    Some(proto::canonicalize_response::Result::Url(
                        "custom://extras".to_string()
                    ))
                );
            }
            (_, other) => panic!("expected canonicalize response, got {:?}", other),
        }

        io.send(
            id,
            out(outbound_message::Message::ImportRequest(
                proto::ImportRequest {
                    id: 2,
                    importer_id: 1,
                    url: "custom://extras".to_string(),
                },
            )),
        )
        .await;
        match io.recv().await.expect("import response") {
            (_, proto::InboundMessage {
                message: Some(inbound_message::Message::ImportResponse(response)),
            }) => match response.result {
                Some(proto::import_response::Result::Success(success)) => {
                    assert!(success.contents.contains("$c: red"));
                }
                other => panic!("expected import success, got {:?}", other),
            },
            (_, other) => panic!("expected import response, got {:?}", other),
        }

        io.send(
            id,
            success_css("a {\n  color: red;\n}\n", &["custom://extras"]),
        )
        .await;
    };
    let (compiler, _) = compiler_with(Options::new(), server).await;

    let results = compiler
        .compile_string(
            "@use 'extras';",
            StringOptions::new().with_importer(SassImporter::custom(ExtrasImporter)),
        )
        .await
        .unwrap();
    assert!(results.css.contains("color: red;"));
    assert!(
        results
            .loaded_urls
            .contains(&Url::parse("custom://extras").unwrap())
    );
    compiler.shutdown().await;
}

#[tokio::test]
async fn test_host_function() {
    let server = |mut io: MockIo, _session: u64| async move {
        io.handshake().await;
        let (id, request) = io.expect_compile().await;
        assert_eq!(request.global_functions, vec!["double($x)".to_string()]);

        io.send(id, call_request(9, "double", vec![wire_number(3.0)]))
            .await;
        match io.recv().await.expect("function response") {
            (_, proto::InboundMessage {
                message: Some(inbound_message::Message::FunctionCallResponse(response)),
            }) => {
                assert_eq!(response.id, 9);
                assert_eq!(
                    response.result,
                    Some(proto::function_call_response::Result::Success(wire_number(
                        6.0
                    )))
                );
            }
            (_, other) => panic!("expected function response, got {:?}", other),
        }
        io.send(id, success_css("a {\n  b: 6;\n}\n", &[])).await;
    };

    let options = Options::new().with_function(
        "double($x)",
        Arc::new(|args: ArgumentList| -> Result<Value, ValueError> {
            let n = args.get(0)?.try_number()?;
            Ok(Value::Number(SassNumber::new(n.value() * 2.0)))
        }),
    );
    let (compiler, _) = compiler_with(options, server).await;

    let results = compiler
        .compile_string("a{b: double(3)}", StringOptions::new())
        .await
        .unwrap();
    assert!(results.css.contains("b: 6"));
    compiler.shutdown().await;
}

/// A host function that takes a configurable time to answer.
struct Sleepy {
    delay: Duration,
    result: f64,
}

#[async_trait]
impl CallableFunction for Sleepy {
    async fn invoke(&self, _args: ArgumentList) -> Result<Value, ValueError> {
        tokio::time::sleep(self.delay).await;
        Ok(Value::Number(SassNumber::new(self.result)))
    }
}

/// Callback replies must hit the wire in request-arrival order even when
/// the handlers finish in the opposite order.
#[tokio::test]
async fn test_callback_replies_keep_arrival_order() {
    let server = |mut io: MockIo, _session: u64| async move {
        io.handshake().await;
        let (id, _request) = io.expect_compile().await;

        io.send(id, call_request(21, "slow", vec![])).await;
        io.send(id, call_request(22, "mid", vec![])).await;
        io.send(id, call_request(23, "fast", vec![])).await;

        let mut reply_ids = Vec::new();
        for _ in 0..3 {
            match io.recv().await.expect("function response") {
                (_, proto::InboundMessage {
                    message: Some(inbound_message::Message::FunctionCallResponse(r)),
                }) => reply_ids.push(r.id),
                (_, other) => panic!("expected function response, got {:?}", other),
            }
        }
        assert_eq!(reply_ids, [21, 22, 23]);
        io.send(id, success_css("ordered", &[])).await;
    };

    let options = Options::new()
        .with_function(
            "slow()",
            Arc::new(Sleepy {
                delay: Duration::from_millis(120),
                result: 1.0,
            }),
        )
        .with_function(
            "mid()",
            Arc::new(Sleepy {
                delay: Duration::from_millis(60),
                result: 2.0,
            }),
        )
        .with_function(
            "fast()",
            Arc::new(Sleepy {
                delay: Duration::from_millis(0),
                result: 3.0,
            }),
        );
    let (compiler, _) = compiler_with(options, server).await;

    let results = compiler
        .compile_string("a{}", StringOptions::new())
        .await
        .unwrap();
    assert_eq!(results.css, "ordered");
    compiler.shutdown().await;
}

/// N concurrent compilations over one child, responses delivered in
/// reverse submission order: every caller still gets its own output.
#[tokio::test]
async fn test_concurrent_compilations_do_not_cross_talk() {
    const N: usize = 4;
    let server = |mut io: MockIo, _session: u64| async move {
        io.handshake().await;
        let mut pending = Vec::new();
        for _ in 0..N {
            let (id, request) = io.expect_compile().await;
            pending.push((id, string_source(&request)));
        }
        for (id, source) in pending.into_iter().rev() {
            io.send(id, success_css(&format!("/* {} */", source), &[]))
                .await;
        }
    };
    let (compiler, _) = compiler_with(Options::new(), server).await;

    let mut tasks = Vec::new();
    for i in 0..N {
        let compiler = compiler.clone();
        tasks.push(tokio::spawn(async move {
            let marker = format!("mark-{}", i);
            let results = compiler
                .compile_string(marker.clone(), StringOptions::new())
                .await
                .unwrap();
            (marker, results.css)
        }));
    }
    for task in tasks {
        let (marker, css) = task.await.unwrap();
        assert_eq!(css, format!("/* {} */", marker));
    }
    compiler.shutdown().await;
}

/// A child dying mid-compilation fails that compilation promptly with a
/// protocol error, and the next compile restarts the child.
#[tokio::test]
async fn test_child_crash_recovers_on_next_compile() {
    let server = |mut io: MockIo, session: u64| async move {
        io.handshake().await;
        let (id, request) = io.expect_compile().await;
        if session == 1 {
            // Die without answering
            return;
        }
        let css = format!("/* {} */", string_source(&request));
        io.send(id, success_css(&css, &[])).await;
    };
    let (compiler, sessions) = compiler_with(Options::new(), server).await;

    let error = tokio::time::timeout(
        Duration::from_secs(5),
        compiler.compile_string("first", StringOptions::new()),
    )
    .await
    .expect("no hang on child death")
    .unwrap_err();
    assert!(matches!(error, Error::Protocol(_)));

    let results = compiler
        .compile_string("second", StringOptions::new())
        .await
        .unwrap();
    assert_eq!(results.css, "/* second */");
    assert_eq!(sessions.load(Ordering::SeqCst), 2);
    assert_eq!(compiler.start_count(), 2);
    compiler.shutdown().await;
}

#[tokio::test]
async fn test_reinit_restarts_exactly_once() {
    let (compiler, _) = compiler_with(Options::new(), echo_server).await;

    compiler
        .compile_string("one", StringOptions::new())
        .await
        .unwrap();
    assert_eq!(compiler.start_count(), 1);

    compiler.reinit().await.unwrap();
    assert_eq!(compiler.start_count(), 2);

    let results = compiler
        .compile_string("two", StringOptions::new())
        .await
        .unwrap();
    assert_eq!(results.css, "/* two */");
    assert_eq!(compiler.compiler_info().unwrap().implementation_name, "mock-sass");
    compiler.shutdown().await;
}

/// A hanging compilation trips the deadline, the child is restarted, and
/// the compiler is usable again.
#[tokio::test]
async fn test_timeout_then_recovery() {
    let server = |mut io: MockIo, _session: u64| async move {
        io.handshake().await;
        let (id, request) = io.expect_compile().await;
        if string_source(&request).contains("hang") {
            std::future::pending::<()>().await;
        }
        io.send(id, success_css("recovered", &[])).await;
    };
    let options = Options::new().with_timeout(Duration::from_millis(200));
    let (compiler, sessions) = compiler_with(options, server).await;

    let error = compiler
        .compile_string("hang forever", StringOptions::new())
        .await
        .unwrap_err();
    match error {
        Error::Lifecycle(e) => assert!(e.message.contains("Timeout")),
        other => panic!("unexpected error: {:?}", other),
    }

    let results = compiler
        .compile_string("", StringOptions::new())
        .await
        .unwrap();
    assert_eq!(results.css, "recovered");
    assert_eq!(sessions.load(Ordering::SeqCst), 2);
    assert_eq!(compiler.start_count(), 2);
    compiler.shutdown().await;
}

/// With the timeout disabled, a hanging child blocks indefinitely; only
/// `reinit` ends the compilation, with a "User requested" error.
#[tokio::test]
async fn test_disabled_timeout_waits_for_reinit() {
    let server = |mut io: MockIo, session: u64| async move {
        io.handshake().await;
        let (id, _request) = io.expect_compile().await;
        if session == 1 {
            std::future::pending::<()>().await;
        }
        io.send(id, success_css("after reinit", &[])).await;
    };
    let options = Options::new().without_timeout();
    let (compiler, _) = compiler_with(options, server).await;

    let hanging = {
        let compiler = compiler.clone();
        tokio::spawn(async move {
            compiler
                .compile_string("never returns", StringOptions::new())
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(!hanging.is_finished());

    compiler.reinit().await.unwrap();
    let error = tokio::time::timeout(Duration::from_secs(5), hanging)
        .await
        .expect("reinit unblocks the compilation")
        .unwrap()
        .unwrap_err();
    match error {
        Error::Lifecycle(e) => assert!(e.message.contains("User requested")),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(compiler.start_count(), 2);

    let results = compiler
        .compile_string("again", StringOptions::new())
        .await
        .unwrap();
    assert_eq!(results.css, "after reinit");
    compiler.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_is_idempotent_and_blocks_new_work() {
    let (compiler, _) = compiler_with(Options::new(), echo_server).await;

    compiler
        .compile_string("x", StringOptions::new())
        .await
        .unwrap();
    compiler.shutdown().await;
    compiler.shutdown().await;

    let error = compiler
        .compile_string("y", StringOptions::new())
        .await
        .unwrap_err();
    match error {
        Error::Lifecycle(e) => assert!(e.message.contains("shut down")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_unsupported_protocol_version_fails_construction() {
    let server = |mut io: MockIo, _session: u64| async move {
        io.handshake_with("1.0.0", "1.77.0").await;
    };
    let (launcher, _) = mock_launcher(server);
    let error = Compiler::with_launcher(Options::new(), launcher)
        .await
        .unwrap_err();
    match error {
        Error::Lifecycle(e) => assert!(e.message.contains("protocol version")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_out_of_range_compiler_version_fails_construction() {
    let server = |mut io: MockIo, _session: u64| async move {
        io.handshake_with("2.7.1", "0.9.0").await;
    };
    let (launcher, _) = mock_launcher(server);
    let error = Compiler::with_launcher(Options::new(), launcher)
        .await
        .unwrap_err();
    assert!(matches!(error, Error::Lifecycle(_)));
}

/// A host function that compiles a nested stylesheet through the same
/// compiler.
struct NestedCompile {
    compiler: Compiler,
}

#[async_trait]
impl CallableFunction for NestedCompile {
    async fn invoke(&self, _args: ArgumentList) -> Result<Value, ValueError> {
        let results = self
            .compiler
            .compile_string("inner", StringOptions::new())
            .await
            .map_err(|e| ValueError::Custom(e.to_string()))?;
        Ok(Value::String(SassString::new(results.css)))
    }
}

/// Host callbacks may start fresh top-level compilations; the nested one
/// gets its own id and completes while the outer one is mid-callback.
#[tokio::test]
async fn test_nested_compilation_from_callback() {
    let server = |mut io: MockIo, _session: u64| async move {
        io.handshake().await;
        let (outer_id, _request) = io.expect_compile().await;
        io.send(outer_id, call_request(1, "nest", vec![])).await;

        loop {
            match io.recv().await.expect("more messages") {
                (inner_id, proto::InboundMessage {
                    message: Some(inbound_message::Message::CompileRequest(request)),
                }) => {
                    assert_ne!(inner_id, outer_id);
                    assert_eq!(string_source(&request), "inner");
                    io.send(inner_id, success_css("inner-css", &[])).await;
                }
                (id, proto::InboundMessage {
                    message: Some(inbound_message::Message::FunctionCallResponse(r)),
                }) => {
                    assert_eq!(id, outer_id);
                    assert!(matches!(
                        r.result,
                        Some(proto::function_call_response::Result::Success(_))
                    ));
                    io.send(outer_id, success_css("outer-css", &[])).await;
                    break;
                }
                (_, other) => panic!("unexpected message: {:?}", other),
            }
        }
    };
    let (compiler, _) = compiler_with(Options::new(), server).await;

    let options = StringOptions::new().with_function(
        "nest()",
        Arc::new(NestedCompile {
            compiler: compiler.clone(),
        }),
    );
    let results = compiler.compile_string("outer", options).await.unwrap();
    assert_eq!(results.css, "outer-css");
    compiler.shutdown().await;
}

/// An importer failure is carried in the response; the compilation then
/// fails cleanly through the normal failure path.
#[tokio::test]
async fn test_importer_error_flows_into_clean_failure() {
    struct Failing;

    #[async_trait]
    impl Importer for Failing {
        async fn canonicalize(
            &self,
            _url: &str,
            _context: &ImporterContext,
        ) -> Result<Option<Url>, String> {
            Err("boom: no such module".to_string())
        }

        async fn load(&self, _canonical_url: &Url) -> Result<ImporterResults, String> {
            unreachable!("canonicalize never succeeds")
        }
    }

    let server = |mut io: MockIo, _session: u64| async move {
        io.handshake().await;
        let (id, _request) = io.expect_compile().await;
        io.send(
            id,
            out(outbound_message::Message::CanonicalizeRequest(
                proto::CanonicalizeRequest {
                    id: 1,
                    importer_id: 1,
                    url: "anything".to_string(),
                    from_import: false,
                    containing_url: None,
                },
            )),
        )
        .await;
        let error_text = match io.recv().await.expect("canonicalize response") {
            (_, proto::InboundMessage {
                message: Some(inbound_message::Message::CanonicalizeResponse(response)),
            }) => match response.result {
                Some(proto::canonicalize_response::Result::Error(message)) => message,
                other => panic!("expected an error result, got {:?}", other),
            },
            (_, other) => panic!("expected canonicalize response, got {:?}", other),
        };
        io.send(
            id,
            out(outbound_message::Message::CompileResponse(
                proto::CompileResponse {
                    result: Some(proto::compile_response::Result::Failure(
                        proto::CompileFailure {
                            message: error_text,
                            span: None,
                            stack_trace: String::new(),
                            formatted: String::new(),
                        },
                    )),
                    loaded_urls: vec![],
                },
            )),
        )
        .await;
    };
    let (compiler, _) = compiler_with(Options::new(), server).await;

    let error = compiler
        .compile_string(
            "@use 'anything';",
            StringOptions::new().with_importer(SassImporter::custom(Failing)),
        )
        .await
        .unwrap_err();
    match error {
        Error::Compiler(e) => assert!(e.message.contains("boom")),
        other => panic!("unexpected error: {:?}", other),
    }
    compiler.shutdown().await;
}

/// Dropping the whole compiler mid-flight must not leave the child
/// process table entry behind; with mocks we can at least assert the
/// shutdown path drains cleanly while work is queued.
#[tokio::test]
async fn test_shutdown_waits_for_in_flight_work() {
    let server = |mut io: MockIo, _session: u64| async move {
        io.handshake().await;
        let (id, _request) = io.expect_compile().await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        io.send(id, success_css("late", &[])).await;
    };
    let (compiler, _) = compiler_with(Options::new(), server).await;

    let in_flight = {
        let compiler = compiler.clone();
        tokio::spawn(async move {
            compiler.compile_string("slow", StringOptions::new()).await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    compiler.shutdown().await;

    let results = in_flight.await.unwrap().unwrap();
    assert_eq!(results.css, "late");
}
