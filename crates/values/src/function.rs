//! Function and mixin values
//!
//! First-class Sass functions come in two flavors: references the compiler
//! issued (opaque ids, only meaningful within their compilation) and host
//! functions the embedding program defines. Mixin references work like
//! compiler functions.

use crate::error::ValueError;
use crate::list::ArgumentList;
use crate::Value;
use async_trait::async_trait;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A function reference issued by the compiler.
///
/// The id is opaque and scoped to the compilation that produced it;
/// passing it back in a later compilation is a compiler-side error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompilerFunction {
    id: u32,
}

impl CompilerFunction {
    pub fn new(id: u32) -> Self {
        Self { id }
    }

    pub fn id(&self) -> u32 {
        self.id
    }
}

/// A mixin reference issued by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompilerMixin {
    id: u32,
}

impl CompilerMixin {
    pub fn new(id: u32) -> Self {
        Self { id }
    }

    pub fn id(&self) -> u32 {
        self.id
    }
}

/// User code callable from a stylesheet.
///
/// Implementations may await freely; the driver runs them on worker tasks
/// so slow functions never stall protocol reads. Plain closures of type
/// `Fn(ArgumentList) -> Result<Value, ValueError>` get this impl for free.
#[async_trait]
pub trait CallableFunction: Send + Sync {
    async fn invoke(&self, args: ArgumentList) -> Result<Value, ValueError>;
}

#[async_trait]
impl<F> CallableFunction for F
where
    F: Fn(ArgumentList) -> Result<Value, ValueError> + Send + Sync,
{
    async fn invoke(&self, args: ArgumentList) -> Result<Value, ValueError> {
        self(args)
    }
}

/// A host-defined function as a first-class Sass value.
///
/// Two host functions are the same value iff they share the same
/// underlying callable, matching identity semantics for closures.
#[derive(Clone)]
pub struct SassHostFunction {
    signature: String,
    callable: Arc<dyn CallableFunction>,
}

impl SassHostFunction {
    /// Wrap a callable with its Sass signature, e.g. `"darken($c, $by)"`.
    pub fn new(signature: impl Into<String>, callable: Arc<dyn CallableFunction>) -> Self {
        Self {
            signature: signature.into(),
            callable,
        }
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn callable(&self) -> &Arc<dyn CallableFunction> {
        &self.callable
    }
}

impl std::fmt::Debug for SassHostFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SassHostFunction")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

impl PartialEq for SassHostFunction {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.callable, &other.callable)
    }
}

impl Eq for SassHostFunction {}

impl Hash for SassHostFunction {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.callable) as *const () as usize).hash(state);
    }
}
