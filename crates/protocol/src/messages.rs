//! Embedded Sass protocol messages
//!
//! Hand-maintained prost structs for the message set this host speaks,
//! pinned to protocol version 2.7.1. Hosts send [`InboundMessage`]s and
//! receive [`OutboundMessage`]s ("inbound"/"outbound" are named from the
//! compiler's point of view, as in the upstream schema).
//!
//! Field tags follow the upstream `.proto`. Unknown fields skip cleanly
//! thanks to prost's default behavior; unknown enum values survive in the
//! raw `i32` representation and are mapped conservatively by the
//! conversion layer in the host crate.

/// The protocol version these messages are pinned to.
pub const PROTOCOL_VERSION: &str = "2.7.1";

/// A message from the host to the compiler.
#[derive(Clone, PartialEq, prost::Message)]
pub struct InboundMessage {
    #[prost(oneof = "inbound_message::Message", tags = "1, 2, 3, 4, 5, 6, 7")]
    pub message: Option<inbound_message::Message>,
}

pub mod inbound_message {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Message {
        #[prost(message, tag = "1")]
        VersionRequest(super::VersionRequest),
        #[prost(message, tag = "2")]
        CompileRequest(super::CompileRequest),
        #[prost(message, tag = "3")]
        CanonicalizeResponse(super::CanonicalizeResponse),
        #[prost(message, tag = "4")]
        ImportResponse(super::ImportResponse),
        #[prost(message, tag = "5")]
        FileImportResponse(super::FileImportResponse),
        #[prost(message, tag = "6")]
        FunctionCallResponse(super::FunctionCallResponse),
        /// Host-detected protocol violation, addressed to compilation id 0
        #[prost(message, tag = "7")]
        Error(super::ProtocolErrorEvent),
    }
}

/// A message from the compiler to the host.
#[derive(Clone, PartialEq, prost::Message)]
pub struct OutboundMessage {
    #[prost(oneof = "outbound_message::Message", tags = "1, 2, 3, 4, 5, 6, 7, 8")]
    pub message: Option<outbound_message::Message>,
}

pub mod outbound_message {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Message {
        #[prost(message, tag = "1")]
        Error(super::ProtocolErrorEvent),
        #[prost(message, tag = "2")]
        CompileResponse(super::CompileResponse),
        #[prost(message, tag = "3")]
        LogEvent(super::LogEvent),
        #[prost(message, tag = "4")]
        CanonicalizeRequest(super::CanonicalizeRequest),
        #[prost(message, tag = "5")]
        ImportRequest(super::ImportRequest),
        #[prost(message, tag = "6")]
        FileImportRequest(super::FileImportRequest),
        #[prost(message, tag = "7")]
        FunctionCallRequest(super::FunctionCallRequest),
        #[prost(message, tag = "8")]
        VersionResponse(super::VersionResponse),
    }
}

/// A protocol violation detected by either side.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ProtocolErrorEvent {
    #[prost(enumeration = "ProtocolErrorType", tag = "1")]
    pub r#type: i32,
    /// Id of the offending message's compilation, or u32::MAX when unknown
    #[prost(uint32, tag = "2")]
    pub id: u32,
    #[prost(string, tag = "3")]
    pub message: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum ProtocolErrorType {
    /// A message could not be decoded at all
    Parse = 0,
    /// A message decoded but its contents are invalid
    Params = 1,
    /// The reporting side failed internally
    Internal = 2,
}

// --- Version handshake -------------------------------------------------

#[derive(Clone, PartialEq, prost::Message)]
pub struct VersionRequest {
    #[prost(uint32, tag = "1")]
    pub id: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VersionResponse {
    #[prost(uint32, tag = "1")]
    pub id: u32,
    #[prost(string, tag = "2")]
    pub protocol_version: String,
    #[prost(string, tag = "3")]
    pub compiler_version: String,
    #[prost(string, tag = "4")]
    pub implementation_version: String,
    #[prost(string, tag = "5")]
    pub implementation_name: String,
}

// --- Compilation -------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum OutputStyle {
    Expanded = 0,
    Compressed = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum Syntax {
    Scss = 0,
    Indented = 1,
    Css = 2,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CompileRequest {
    #[prost(oneof = "compile_request::Input", tags = "2, 3")]
    pub input: Option<compile_request::Input>,
    #[prost(enumeration = "OutputStyle", tag = "4")]
    pub style: i32,
    #[prost(bool, tag = "5")]
    pub source_map: bool,
    #[prost(message, repeated, tag = "6")]
    pub importers: Vec<compile_request::Importer>,
    /// Signatures of the host functions available to this compilation
    #[prost(string, repeated, tag = "7")]
    pub global_functions: Vec<String>,
    #[prost(bool, tag = "8")]
    pub alert_color: bool,
    #[prost(bool, tag = "9")]
    pub alert_ascii: bool,
    #[prost(bool, tag = "10")]
    pub verbose: bool,
    #[prost(bool, tag = "11")]
    pub quiet_deps: bool,
    #[prost(bool, tag = "12")]
    pub source_map_include_sources: bool,
    #[prost(bool, tag = "13")]
    pub charset: bool,
    #[prost(bool, tag = "14")]
    pub silent: bool,
    #[prost(string, repeated, tag = "15")]
    pub fatal_deprecation: Vec<String>,
    #[prost(string, repeated, tag = "16")]
    pub silence_deprecation: Vec<String>,
    #[prost(string, repeated, tag = "17")]
    pub future_deprecation: Vec<String>,
}

pub mod compile_request {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Input {
        #[prost(message, tag = "2")]
        String(super::StringInput),
        /// An absolute path the compiler loads itself
        #[prost(string, tag = "3")]
        Path(String),
    }

    /// One entry in the compilation's importer resolution order.
    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Importer {
        #[prost(oneof = "ImporterKind", tags = "1, 2, 3")]
        pub importer: Option<ImporterKind>,
        #[prost(string, repeated, tag = "4")]
        pub non_canonical_scheme: Vec<String>,
    }

    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum ImporterKind {
        /// A load path the compiler resolves on its own filesystem
        #[prost(string, tag = "1")]
        Path(String),
        /// A host importer addressed via canonicalize/import callbacks
        #[prost(uint32, tag = "2")]
        ImporterId(u32),
        /// A host importer that resolves URLs to file: URLs
        #[prost(uint32, tag = "3")]
        FileImporterId(u32),
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct StringInput {
    #[prost(string, tag = "1")]
    pub source: String,
    #[prost(string, tag = "2")]
    pub url: String,
    #[prost(enumeration = "Syntax", tag = "3")]
    pub syntax: i32,
    /// Importer used to resolve relative loads from the entrypoint
    #[prost(message, optional, tag = "4")]
    pub importer: Option<compile_request::Importer>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CompileResponse {
    #[prost(oneof = "compile_response::Result", tags = "2, 3")]
    pub result: Option<compile_response::Result>,
    #[prost(string, repeated, tag = "4")]
    pub loaded_urls: Vec<String>,
}

pub mod compile_response {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Result {
        #[prost(message, tag = "2")]
        Success(super::CompileSuccess),
        #[prost(message, tag = "3")]
        Failure(super::CompileFailure),
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CompileSuccess {
    #[prost(string, tag = "1")]
    pub css: String,
    /// Empty when no source map was requested
    #[prost(string, tag = "2")]
    pub source_map: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CompileFailure {
    #[prost(string, tag = "1")]
    pub message: String,
    #[prost(message, optional, tag = "2")]
    pub span: Option<SourceSpan>,
    #[prost(string, tag = "3")]
    pub stack_trace: String,
    /// The compiler's pre-formatted, printable description
    #[prost(string, tag = "4")]
    pub formatted: String,
}

// --- Diagnostics -------------------------------------------------------

#[derive(Clone, PartialEq, prost::Message)]
pub struct LogEvent {
    #[prost(enumeration = "LogEventType", tag = "1")]
    pub r#type: i32,
    #[prost(string, tag = "2")]
    pub message: String,
    #[prost(message, optional, tag = "3")]
    pub span: Option<SourceSpan>,
    #[prost(string, tag = "4")]
    pub stack_trace: String,
    #[prost(string, tag = "5")]
    pub formatted: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum LogEventType {
    Warning = 0,
    DeprecationWarning = 1,
    Debug = 2,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SourceSpan {
    /// The text the span covers
    #[prost(string, tag = "1")]
    pub text: String,
    #[prost(message, optional, tag = "2")]
    pub start: Option<SourceLocation>,
    #[prost(message, optional, tag = "3")]
    pub end: Option<SourceLocation>,
    #[prost(string, tag = "4")]
    pub url: String,
    /// Surrounding text for human-readable excerpts
    #[prost(string, tag = "5")]
    pub context: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct SourceLocation {
    #[prost(uint32, tag = "1")]
    pub offset: u32,
    /// 0-based on the wire
    #[prost(uint32, tag = "2")]
    pub line: u32,
    #[prost(uint32, tag = "3")]
    pub column: u32,
}

// --- Host callbacks ----------------------------------------------------

#[derive(Clone, PartialEq, prost::Message)]
pub struct CanonicalizeRequest {
    #[prost(uint32, tag = "1")]
    pub id: u32,
    #[prost(uint32, tag = "2")]
    pub importer_id: u32,
    #[prost(string, tag = "3")]
    pub url: String,
    #[prost(bool, tag = "4")]
    pub from_import: bool,
    #[prost(string, optional, tag = "5")]
    pub containing_url: Option<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CanonicalizeResponse {
    #[prost(uint32, tag = "1")]
    pub id: u32,
    /// Unset when this importer does not recognize the URL
    #[prost(oneof = "canonicalize_response::Result", tags = "2, 3")]
    pub result: Option<canonicalize_response::Result>,
}

pub mod canonicalize_response {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Result {
        #[prost(string, tag = "2")]
        Url(String),
        #[prost(string, tag = "3")]
        Error(String),
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ImportRequest {
    #[prost(uint32, tag = "1")]
    pub id: u32,
    #[prost(uint32, tag = "2")]
    pub importer_id: u32,
    #[prost(string, tag = "3")]
    pub url: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ImportResponse {
    #[prost(uint32, tag = "1")]
    pub id: u32,
    #[prost(oneof = "import_response::Result", tags = "2, 3")]
    pub result: Option<import_response::Result>,
}

pub mod import_response {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Result {
        #[prost(message, tag = "2")]
        Success(super::ImportSuccess),
        #[prost(string, tag = "3")]
        Error(String),
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ImportSuccess {
    #[prost(string, tag = "1")]
    pub contents: String,
    #[prost(enumeration = "Syntax", tag = "2")]
    pub syntax: i32,
    #[prost(string, optional, tag = "3")]
    pub source_map_url: Option<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FileImportRequest {
    #[prost(uint32, tag = "1")]
    pub id: u32,
    #[prost(uint32, tag = "2")]
    pub importer_id: u32,
    #[prost(string, tag = "3")]
    pub url: String,
    #[prost(bool, tag = "4")]
    pub from_import: bool,
    #[prost(string, optional, tag = "5")]
    pub containing_url: Option<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FileImportResponse {
    #[prost(uint32, tag = "1")]
    pub id: u32,
    #[prost(oneof = "file_import_response::Result", tags = "2, 3")]
    pub result: Option<file_import_response::Result>,
}

pub mod file_import_response {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Result {
        /// An absolute file: URL the compiler loads itself
        #[prost(string, tag = "2")]
        FileUrl(String),
        #[prost(string, tag = "3")]
        Error(String),
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FunctionCallRequest {
    #[prost(uint32, tag = "1")]
    pub id: u32,
    #[prost(oneof = "function_call_request::Identifier", tags = "2, 3")]
    pub identifier: Option<function_call_request::Identifier>,
    #[prost(message, repeated, tag = "4")]
    pub arguments: Vec<Value>,
    #[prost(map = "string, message", tag = "5")]
    pub keyword_arguments: std::collections::HashMap<String, Value>,
}

pub mod function_call_request {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Identifier {
        /// The function's Sass name, e.g. `darken`
        #[prost(string, tag = "2")]
        Name(String),
        /// Id of an anonymous host function passed by value
        #[prost(uint32, tag = "3")]
        FunctionId(u32),
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FunctionCallResponse {
    #[prost(uint32, tag = "1")]
    pub id: u32,
    #[prost(oneof = "function_call_response::Result", tags = "2, 3")]
    pub result: Option<function_call_response::Result>,
}

pub mod function_call_response {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Result {
        #[prost(message, tag = "2")]
        Success(super::Value),
        #[prost(string, tag = "3")]
        Error(String),
    }
}

// --- Values ------------------------------------------------------------

/// The wire form of a Sass value.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Value {
    #[prost(
        oneof = "value::Kind",
        tags = "1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13"
    )]
    pub kind: Option<value::Kind>,
}

pub mod value {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Kind {
        #[prost(message, tag = "1")]
        String(super::StringValue),
        #[prost(message, tag = "2")]
        Number(super::NumberValue),
        #[prost(message, tag = "3")]
        RgbColor(super::RgbColor),
        #[prost(message, tag = "4")]
        HslColor(super::HslColor),
        #[prost(message, tag = "5")]
        List(super::ListValue),
        #[prost(message, tag = "6")]
        Map(super::MapValue),
        #[prost(enumeration = "super::SingletonValue", tag = "7")]
        Singleton(i32),
        #[prost(message, tag = "8")]
        CompilerFunction(super::CompilerFunctionValue),
        #[prost(message, tag = "9")]
        HostFunction(super::HostFunctionValue),
        #[prost(message, tag = "10")]
        ArgumentList(super::ArgumentListValue),
        #[prost(message, tag = "11")]
        HwbColor(super::HwbColor),
        #[prost(message, tag = "12")]
        Calculation(super::CalculationValue),
        #[prost(message, tag = "13")]
        CompilerMixin(super::CompilerMixinValue),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum SingletonValue {
    True = 0,
    False = 1,
    Null = 2,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct StringValue {
    #[prost(string, tag = "1")]
    pub text: String,
    #[prost(bool, tag = "2")]
    pub quoted: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct NumberValue {
    #[prost(double, tag = "1")]
    pub value: f64,
    #[prost(string, repeated, tag = "2")]
    pub numerators: Vec<String>,
    #[prost(string, repeated, tag = "3")]
    pub denominators: Vec<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RgbColor {
    #[prost(uint32, tag = "1")]
    pub red: u32,
    #[prost(uint32, tag = "2")]
    pub green: u32,
    #[prost(uint32, tag = "3")]
    pub blue: u32,
    #[prost(double, tag = "4")]
    pub alpha: f64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct HslColor {
    #[prost(double, tag = "1")]
    pub hue: f64,
    #[prost(double, tag = "2")]
    pub saturation: f64,
    #[prost(double, tag = "3")]
    pub lightness: f64,
    #[prost(double, tag = "4")]
    pub alpha: f64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct HwbColor {
    #[prost(double, tag = "1")]
    pub hue: f64,
    #[prost(double, tag = "2")]
    pub whiteness: f64,
    #[prost(double, tag = "3")]
    pub blackness: f64,
    #[prost(double, tag = "4")]
    pub alpha: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum ListSeparator {
    Comma = 0,
    Space = 1,
    Slash = 2,
    Undecided = 3,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ListValue {
    #[prost(enumeration = "ListSeparator", tag = "1")]
    pub separator: i32,
    #[prost(bool, tag = "2")]
    pub has_brackets: bool,
    #[prost(message, repeated, tag = "3")]
    pub contents: Vec<Value>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MapValue {
    #[prost(message, repeated, tag = "1")]
    pub entries: Vec<MapEntry>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MapEntry {
    #[prost(message, optional, tag = "1")]
    pub key: Option<Value>,
    #[prost(message, optional, tag = "2")]
    pub value: Option<Value>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ArgumentListValue {
    #[prost(enumeration = "ListSeparator", tag = "1")]
    pub separator: i32,
    #[prost(message, repeated, tag = "2")]
    pub contents: Vec<Value>,
    #[prost(map = "string, message", tag = "3")]
    pub keywords: std::collections::HashMap<String, Value>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CompilerFunctionValue {
    #[prost(uint32, tag = "1")]
    pub id: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct HostFunctionValue {
    /// Id the host allocated for this callable within the compilation
    #[prost(uint32, tag = "1")]
    pub id: u32,
    #[prost(string, tag = "2")]
    pub signature: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CompilerMixinValue {
    #[prost(uint32, tag = "1")]
    pub id: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum CalculationOperator {
    Plus = 0,
    Minus = 1,
    Times = 2,
    Divide = 3,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CalculationValue {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(message, repeated, tag = "2")]
    pub arguments: Vec<CalculationOperand>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CalculationOperand {
    #[prost(oneof = "calculation_operand::Kind", tags = "1, 2, 3, 4")]
    pub kind: Option<calculation_operand::Kind>,
}

pub mod calculation_operand {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Kind {
        #[prost(message, tag = "1")]
        Number(super::NumberValue),
        #[prost(string, tag = "2")]
        String(String),
        #[prost(message, tag = "3")]
        Operation(Box<super::CalculationOperation>),
        #[prost(message, tag = "4")]
        Calculation(super::CalculationValue),
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CalculationOperation {
    #[prost(enumeration = "CalculationOperator", tag = "1")]
    pub operator: i32,
    #[prost(message, optional, boxed, tag = "2")]
    pub lhs: Option<Box<CalculationOperand>>,
    #[prost(message, optional, boxed, tag = "3")]
    pub rhs: Option<Box<CalculationOperand>>,
}

// Convenience wrappers so call sites read as message constructors rather
// than oneof plumbing.

impl InboundMessage {
    pub fn version_request(message: VersionRequest) -> Self {
        Self {
            message: Some(inbound_message::Message::VersionRequest(message)),
        }
    }

    pub fn compile_request(message: CompileRequest) -> Self {
        Self {
            message: Some(inbound_message::Message::CompileRequest(message)),
        }
    }

    pub fn canonicalize_response(message: CanonicalizeResponse) -> Self {
        Self {
            message: Some(inbound_message::Message::CanonicalizeResponse(message)),
        }
    }

    pub fn import_response(message: ImportResponse) -> Self {
        Self {
            message: Some(inbound_message::Message::ImportResponse(message)),
        }
    }

    pub fn file_import_response(message: FileImportResponse) -> Self {
        Self {
            message: Some(inbound_message::Message::FileImportResponse(message)),
        }
    }

    pub fn function_call_response(message: FunctionCallResponse) -> Self {
        Self {
            message: Some(inbound_message::Message::FunctionCallResponse(message)),
        }
    }

    pub fn error(message: ProtocolErrorEvent) -> Self {
        Self {
            message: Some(inbound_message::Message::Error(message)),
        }
    }
}

impl OutboundMessage {
    /// Short name of the contained message kind, for logs and errors.
    pub fn kind_name(&self) -> &'static str {
        match &self.message {
            Some(outbound_message::Message::Error(_)) => "Error",
            Some(outbound_message::Message::CompileResponse(_)) => "CompileResponse",
            Some(outbound_message::Message::LogEvent(_)) => "LogEvent",
            Some(outbound_message::Message::CanonicalizeRequest(_)) => {
                "CanonicalizeRequest"
            }
            Some(outbound_message::Message::ImportRequest(_)) => "ImportRequest",
            Some(outbound_message::Message::FileImportRequest(_)) => "FileImportRequest",
            Some(outbound_message::Message::FunctionCallRequest(_)) => {
                "FunctionCallRequest"
            }
            Some(outbound_message::Message::VersionResponse(_)) => "VersionResponse",
            None => "empty",
        }
    }
}
