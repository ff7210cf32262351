//! The Sass value model
//!
//! Every value a stylesheet can hand to a host function, and every value a
//! host function can hand back, is a [`Value`]. Values are immutable once
//! constructed and live no longer than the compilation that exchanged them.
//!
//! This crate is backend-independent: it knows nothing about the embedded
//! compiler protocol, so an in-process backend can share the same types.
//!
//! ## Sass semantics worth knowing
//!
//! - Equality is structural, with two twists from the language: numbers
//!   compare in canonical unit form (`1in == 96px`) and strings ignore
//!   their quoted flag (`"a" == a`).
//! - Every value is a list of length one for indexing purposes. Sass
//!   indices are 1-based and negative indices count from the end.
//! - `Null` and `Bool(false)` are the only falsey values.

mod calculation;
mod color;
mod error;
mod function;
mod list;
mod map;
mod number;
mod string;

pub use calculation::{CalculationOperator, CalculationValue, SassCalculation};
pub use color::SassColor;
pub use error::ValueError;
pub use function::{
    CallableFunction, CompilerFunction, CompilerMixin, SassHostFunction,
};
pub use list::{ArgumentList, ListSeparator, SassList};
pub use map::SassMap;
pub use number::{NUMERIC_EPSILON, SassNumber};
pub use string::SassString;

/// A Sass value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Null,
    Bool(bool),
    String(SassString),
    Number(SassNumber),
    Color(SassColor),
    List(SassList),
    ArgumentList(ArgumentList),
    Map(SassMap),
    Calculation(SassCalculation),
    CompilerFunction(CompilerFunction),
    HostFunction(SassHostFunction),
    CompilerMixin(CompilerMixin),
}

/// Exhaustive dispatch over value variants.
///
/// Host-side code that must handle every variant implements this instead
/// of matching, so adding a variant is a compile error at every dispatch
/// site.
pub trait ValueVisitor {
    type Output;

    fn visit_null(&mut self) -> Self::Output;
    fn visit_bool(&mut self, value: bool) -> Self::Output;
    fn visit_string(&mut self, string: &SassString) -> Self::Output;
    fn visit_number(&mut self, number: &SassNumber) -> Self::Output;
    fn visit_color(&mut self, color: &SassColor) -> Self::Output;
    fn visit_list(&mut self, list: &SassList) -> Self::Output;
    fn visit_argument_list(&mut self, args: &ArgumentList) -> Self::Output;
    fn visit_map(&mut self, map: &SassMap) -> Self::Output;
    fn visit_calculation(&mut self, calculation: &SassCalculation) -> Self::Output;
    fn visit_compiler_function(&mut self, function: &CompilerFunction) -> Self::Output;
    fn visit_host_function(&mut self, function: &SassHostFunction) -> Self::Output;
    fn visit_compiler_mixin(&mut self, mixin: &CompilerMixin) -> Self::Output;
}

impl Value {
    /// The canonical true value.
    pub const TRUE: Value = Value::Bool(true);
    /// The canonical false value.
    pub const FALSE: Value = Value::Bool(false);

    /// The variant name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::String(_) => "string",
            Value::Number(_) => "number",
            Value::Color(_) => "color",
            Value::List(_) => "list",
            Value::ArgumentList(_) => "argument list",
            Value::Map(_) => "map",
            Value::Calculation(_) => "calculation",
            Value::CompilerFunction(_) => "function",
            Value::HostFunction(_) => "function",
            Value::CompilerMixin(_) => "mixin",
        }
    }

    /// Everything except `null` and `false` is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Null | Value::Bool(false))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Downcast to a boolean.
    pub fn try_bool(&self) -> Result<bool, ValueError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(wrong_type("boolean", other)),
        }
    }

    /// Downcast to a string.
    pub fn try_string(&self) -> Result<&SassString, ValueError> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(wrong_type("string", other)),
        }
    }

    /// Downcast to a number.
    pub fn try_number(&self) -> Result<&SassNumber, ValueError> {
        match self {
            Value::Number(n) => Ok(n),
            other => Err(wrong_type("number", other)),
        }
    }

    /// Downcast to a color.
    pub fn try_color(&self) -> Result<&SassColor, ValueError> {
        match self {
            Value::Color(c) => Ok(c),
            other => Err(wrong_type("color", other)),
        }
    }

    /// Downcast to a list. Argument lists do not downcast to lists; use
    /// [`Value::sass_length`]/[`Value::sass_index`] to treat values
    /// uniformly.
    pub fn try_list(&self) -> Result<&SassList, ValueError> {
        match self {
            Value::List(l) => Ok(l),
            other => Err(wrong_type("list", other)),
        }
    }

    /// Downcast to a map.
    pub fn try_map(&self) -> Result<&SassMap, ValueError> {
        match self {
            Value::Map(m) => Ok(m),
            other => Err(wrong_type("map", other)),
        }
    }

    /// Downcast to a calculation.
    pub fn try_calculation(&self) -> Result<&SassCalculation, ValueError> {
        match self {
            Value::Calculation(c) => Ok(c),
            other => Err(wrong_type("calculation", other)),
        }
    }

    /// Number of elements when the value is viewed as a list.
    ///
    /// Non-list values are lists of length one.
    pub fn sass_length(&self) -> usize {
        match self {
            Value::List(l) => l.len(),
            Value::ArgumentList(a) => a.len(),
            _ => 1,
        }
    }

    /// Index with a 1-based Sass index.
    ///
    /// Negative indices count from the end; 0 is never valid. A non-list
    /// value answers index 1 (or -1) with itself.
    pub fn sass_index(&self, index: i64) -> Result<&Value, ValueError> {
        let length = self.sass_length();
        let out_of_range = || ValueError::IndexOutOfRange {
            index,
            length,
        };

        if index == 0 || index.unsigned_abs() as usize > length {
            return Err(out_of_range());
        }
        let offset = if index > 0 {
            index as usize - 1
        } else {
            length - index.unsigned_abs() as usize
        };

        match self {
            Value::List(l) => l.elements().get(offset).ok_or_else(out_of_range),
            Value::ArgumentList(a) => a.elements().get(offset).ok_or_else(out_of_range),
            other => Ok(other),
        }
    }

    /// Dispatch to the visitor method for this variant.
    pub fn accept<V: ValueVisitor>(&self, visitor: &mut V) -> V::Output {
        match self {
            Value::Null => visitor.visit_null(),
            Value::Bool(b) => visitor.visit_bool(*b),
            Value::String(s) => visitor.visit_string(s),
            Value::Number(n) => visitor.visit_number(n),
            Value::Color(c) => visitor.visit_color(c),
            Value::List(l) => visitor.visit_list(l),
            Value::ArgumentList(a) => visitor.visit_argument_list(a),
            Value::Map(m) => visitor.visit_map(m),
            Value::Calculation(c) => visitor.visit_calculation(c),
            Value::CompilerFunction(f) => visitor.visit_compiler_function(f),
            Value::HostFunction(f) => visitor.visit_host_function(f),
            Value::CompilerMixin(m) => visitor.visit_compiler_mixin(m),
        }
    }
}

fn wrong_type(expected: &'static str, actual: &Value) -> ValueError {
    ValueError::WrongType {
        expected,
        actual: actual.type_name(),
    }
}
