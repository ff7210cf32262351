//! Host-callback dispatch
//!
//! One dispatcher exists per compilation. It owns the merged importer and
//! function tables (per-compilation entries ahead of compiler-global
//! ones), hands the compiler its importer ids and function signatures for
//! the compile request, and services the four callback kinds.
//!
//! User code runs inside a freshly spawned task so a panic in an importer
//! or host function is caught at the join and reported as an ordinary
//! callback error instead of wedging the compilation.

use crate::convert::{decode_value, encode_value};
use crate::importer::{ImporterContext, SassImporter};
use crate::options::Syntax;
use sass_protocol::messages as proto;
use sass_values::{ArgumentList, CallableFunction, ListSeparator, SassHostFunction};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::warn;
use url::Url;

/// Anonymous host functions that crossed the wire as values, keyed by the
/// per-compilation id we issued.
#[derive(Default)]
struct FunctionStore {
    by_id: HashMap<u32, SassHostFunction>,
    ids_by_callable: HashMap<usize, u32>,
    next_id: u32,
}

/// Per-compilation importer and function tables.
pub(crate) struct Dispatcher {
    importers: Vec<SassImporter>,
    functions_by_name: HashMap<String, Arc<dyn CallableFunction>>,
    signatures: Vec<String>,
    anonymous: Mutex<FunctionStore>,
}

impl Dispatcher {
    /// Merge per-compilation tables over compiler-global ones.
    ///
    /// Importer order decides resolution order: per-compilation first.
    /// Function collisions are by name (the part before `(`); the
    /// per-compilation signature wins.
    pub(crate) fn new(
        global_importers: &[SassImporter],
        local_importers: Vec<SassImporter>,
        global_functions: &HashMap<String, Arc<dyn CallableFunction>>,
        local_functions: HashMap<String, Arc<dyn CallableFunction>>,
    ) -> Self {
        let mut importers = local_importers;
        importers.extend(global_importers.iter().cloned());

        let mut functions_by_name: HashMap<String, Arc<dyn CallableFunction>> =
            HashMap::new();
        let mut signatures_by_name: HashMap<String, String> = HashMap::new();
        for (signature, callable) in
            global_functions.iter().chain(local_functions.iter())
        {
            let name = function_name(signature).to_string();
            functions_by_name.insert(name.clone(), callable.clone());
            signatures_by_name.insert(name, signature.clone());
        }
        let mut signatures: Vec<String> = signatures_by_name.into_values().collect();
        signatures.sort();

        Self {
            importers,
            functions_by_name,
            signatures,
            anonymous: Mutex::new(FunctionStore::default()),
        }
    }

    /// A dispatcher with no importers or functions.
    pub(crate) fn empty() -> Self {
        Self::new(&[], Vec::new(), &HashMap::new(), HashMap::new())
    }

    /// Importer table for the compile request. Ids are dense from 1 in
    /// resolution order.
    pub(crate) fn importer_specs(&self) -> Vec<proto::compile_request::Importer> {
        self.importers
            .iter()
            .enumerate()
            .map(|(index, importer)| {
                let id = index as u32 + 1;
                match importer {
                    SassImporter::LoadPath(path) => proto::compile_request::Importer {
                        importer: Some(proto::compile_request::ImporterKind::Path(
                            path.display().to_string(),
                        )),
                        non_canonical_scheme: Vec::new(),
                    },
                    SassImporter::Importer(custom) => proto::compile_request::Importer {
                        importer: Some(proto::compile_request::ImporterKind::ImporterId(
                            id,
                        )),
                        non_canonical_scheme: custom.non_canonical_schemes(),
                    },
                    SassImporter::FileImporter(_) => proto::compile_request::Importer {
                        importer: Some(
                            proto::compile_request::ImporterKind::FileImporterId(id),
                        ),
                        non_canonical_scheme: Vec::new(),
                    },
                }
            })
            .collect()
    }

    /// Function signatures for the compile request, sorted for
    /// deterministic requests.
    pub(crate) fn function_signatures(&self) -> Vec<String> {
        self.signatures.clone()
    }

    /// Issue (or reuse) an id for a host function sent by value.
    pub(crate) fn register_anonymous(&self, function: &SassHostFunction) -> u32 {
        let mut store = self.anonymous.lock().unwrap_or_else(|e| e.into_inner());
        let key = Arc::as_ptr(function.callable()) as *const () as usize;
        if let Some(&id) = store.ids_by_callable.get(&key) {
            return id;
        }
        store.next_id += 1;
        let id = store.next_id;
        store.ids_by_callable.insert(key, id);
        store.by_id.insert(id, function.clone());
        id
    }

    /// Look up an anonymous host function the compiler echoed back.
    pub(crate) fn anonymous(&self, id: u32) -> Option<SassHostFunction> {
        let store = self.anonymous.lock().unwrap_or_else(|e| e.into_inner());
        store.by_id.get(&id).cloned()
    }

    fn custom_importer(
        &self,
        importer_id: u32,
    ) -> Result<&Arc<dyn crate::importer::Importer>, String> {
        match self.importers.get(importer_id.wrapping_sub(1) as usize) {
            Some(SassImporter::Importer(importer)) => Ok(importer),
            Some(_) => Err(format!(
                "Importer id {} is not a custom importer",
                importer_id
            )),
            None => Err(format!("Unknown importer id {}", importer_id)),
        }
    }

    fn file_importer(
        &self,
        importer_id: u32,
    ) -> Result<&Arc<dyn crate::importer::FileImporter>, String> {
        match self.importers.get(importer_id.wrapping_sub(1) as usize) {
            Some(SassImporter::FileImporter(importer)) => Ok(importer),
            Some(_) => Err(format!(
                "Importer id {} is not a file importer",
                importer_id
            )),
            None => Err(format!("Unknown importer id {}", importer_id)),
        }
    }

    /// Service a canonicalize callback.
    ///
    /// `Err` means the compiler referenced an importer we never gave it -
    /// a protocol violation. Importer failures are not errors here; they
    /// travel back in the response.
    pub(crate) async fn handle_canonicalize(
        &self,
        request: proto::CanonicalizeRequest,
    ) -> Result<proto::InboundMessage, String> {
        let importer = self.custom_importer(request.importer_id)?.clone();
        let context = importer_context(request.from_import, &request.containing_url);
        let url = request.url;

        let outcome = tokio::spawn(async move {
            importer.canonicalize(&url, &context).await
        })
        .await;

        let result = match outcome {
            Ok(Ok(Some(url))) => Some(proto::canonicalize_response::Result::Url(
                url.to_string(),
            )),
            Ok(Ok(None)) => None,
            Ok(Err(message)) => {
                Some(proto::canonicalize_response::Result::Error(message))
            }
            Err(join_error) => Some(proto::canonicalize_response::Result::Error(
                panic_message("canonicalize", join_error),
            )),
        };
        Ok(proto::InboundMessage::canonicalize_response(
            proto::CanonicalizeResponse {
                id: request.id,
                result,
            },
        ))
    }

    /// Service an import (load) callback.
    pub(crate) async fn handle_import(
        &self,
        request: proto::ImportRequest,
    ) -> Result<proto::InboundMessage, String> {
        let importer = self.custom_importer(request.importer_id)?.clone();
        let canonical = Url::parse(&request.url)
            .map_err(|e| format!("Import request URL {} is invalid: {}", request.url, e))?;

        let outcome =
            tokio::spawn(async move { importer.load(&canonical).await }).await;

        let result = match outcome {
            Ok(Ok(results)) => {
                Some(proto::import_response::Result::Success(proto::ImportSuccess {
                    contents: results.contents,
                    syntax: syntax_to_wire(results.syntax) as i32,
                    source_map_url: results.source_map_url.map(|u| u.to_string()),
                }))
            }
            Ok(Err(message)) => Some(proto::import_response::Result::Error(message)),
            Err(join_error) => Some(proto::import_response::Result::Error(
                panic_message("load", join_error),
            )),
        };
        Ok(proto::InboundMessage::import_response(
            proto::ImportResponse {
                id: request.id,
                result,
            },
        ))
    }

    /// Service a file-import callback.
    pub(crate) async fn handle_file_import(
        &self,
        request: proto::FileImportRequest,
    ) -> Result<proto::InboundMessage, String> {
        let importer = self.file_importer(request.importer_id)?.clone();
        let context = importer_context(request.from_import, &request.containing_url);
        let url = request.url;

        let outcome = tokio::spawn(async move {
            importer.find_file_url(&url, &context).await
        })
        .await;

        let result = match outcome {
            Ok(Ok(Some(url))) if url.scheme() == "file" => Some(
                proto::file_import_response::Result::FileUrl(url.to_string()),
            ),
            Ok(Ok(Some(url))) => Some(proto::file_import_response::Result::Error(
                format!("Importer returned non-file URL {}", url),
            )),
            Ok(Ok(None)) => None,
            Ok(Err(message)) => {
                Some(proto::file_import_response::Result::Error(message))
            }
            Err(join_error) => Some(proto::file_import_response::Result::Error(
                panic_message("find_file_url", join_error),
            )),
        };
        Ok(proto::InboundMessage::file_import_response(
            proto::FileImportResponse {
                id: request.id,
                result,
            },
        ))
    }

    /// Service a function-call callback.
    pub(crate) async fn handle_function_call(
        &self,
        request: proto::FunctionCallRequest,
    ) -> Result<proto::InboundMessage, String> {
        let callable = match request
            .identifier
            .as_ref()
            .ok_or("Function call request has no identifier")?
        {
            proto::function_call_request::Identifier::Name(name) => self
                .functions_by_name
                .get(name)
                .cloned()
                .ok_or_else(|| format!("Unknown function name {:?}", name))?,
            proto::function_call_request::Identifier::FunctionId(id) => self
                .anonymous(*id)
                .map(|f| f.callable().clone())
                .ok_or_else(|| format!("Unknown function id {}", id))?,
        };

        let mut positional = Vec::with_capacity(request.arguments.len());
        for argument in request.arguments {
            positional.push(decode_value(argument, self, 0)?);
        }
        let mut keywords = indexmap::IndexMap::new();
        let mut pairs: Vec<(String, proto::Value)> =
            request.keyword_arguments.into_iter().collect();
        pairs.sort_by(|(a, _), (b, _)| a.cmp(b));
        for (name, value) in pairs {
            keywords.insert(name, decode_value(value, self, 0)?);
        }
        let args = ArgumentList::new(positional, keywords, ListSeparator::Comma);

        let outcome = tokio::spawn(async move { callable.invoke(args).await }).await;

        let result = match outcome {
            Ok(Ok(value)) => match encode_value(&value, self, 0) {
                Ok(wire) => Some(proto::function_call_response::Result::Success(wire)),
                Err(e) => Some(proto::function_call_response::Result::Error(
                    e.to_string(),
                )),
            },
            Ok(Err(e)) => {
                Some(proto::function_call_response::Result::Error(e.to_string()))
            }
            Err(join_error) => Some(proto::function_call_response::Result::Error(
                panic_message("host function", join_error),
            )),
        };
        Ok(proto::InboundMessage::function_call_response(
            proto::FunctionCallResponse {
                id: request.id,
                result,
            },
        ))
    }
}

/// The declared name is everything before the argument list.
fn function_name(signature: &str) -> &str {
    signature
        .split_once('(')
        .map(|(name, _)| name)
        .unwrap_or(signature)
        .trim()
}

fn importer_context(from_import: bool, containing_url: &Option<String>) -> ImporterContext {
    let containing_url = containing_url.as_deref().and_then(|raw| {
        Url::parse(raw)
            .inspect_err(|e| warn!(url = raw, error = %e, "unparseable containing URL"))
            .ok()
    });
    ImporterContext {
        from_import,
        containing_url,
    }
}

fn syntax_to_wire(syntax: Syntax) -> proto::Syntax {
    match syntax {
        Syntax::Scss => proto::Syntax::Scss,
        Syntax::Indented => proto::Syntax::Indented,
        Syntax::Css => proto::Syntax::Css,
    }
}

fn panic_message(what: &str, join_error: tokio::task::JoinError) -> String {
    if join_error.is_panic() {
        format!("The {} callback panicked", what)
    } else {
        format!("The {} callback was cancelled", what)
    }
}
