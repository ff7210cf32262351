//! Sass calculations
//!
//! `calc()`, `min()`, `max()` and `clamp()` expressions that could not be
//! simplified to a plain number. The argument tree mirrors the wire
//! representation: leaves are numbers or raw expression strings, interior
//! nodes are binary operations or nested calculations.

use crate::number::SassNumber;

/// Operator in a calculation expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalculationOperator {
    Plus,
    Minus,
    Times,
    Divide,
}

impl CalculationOperator {
    /// The operator as it appears in CSS.
    pub fn symbol(&self) -> &'static str {
        match self {
            CalculationOperator::Plus => "+",
            CalculationOperator::Minus => "-",
            CalculationOperator::Times => "*",
            CalculationOperator::Divide => "/",
        }
    }
}

/// One operand in a calculation's argument tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CalculationValue {
    Number(SassNumber),
    /// An unparsed expression, e.g. a variable reference the compiler
    /// chose to keep as text
    String(String),
    Calculation(SassCalculation),
    Operation {
        operator: CalculationOperator,
        lhs: Box<CalculationValue>,
        rhs: Box<CalculationValue>,
    },
}

/// A Sass calculation: a name and its argument operands.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SassCalculation {
    name: String,
    arguments: Vec<CalculationValue>,
}

impl SassCalculation {
    pub fn new(name: impl Into<String>, arguments: Vec<CalculationValue>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// A single-argument `calc()`.
    pub fn calc(argument: CalculationValue) -> Self {
        Self::new("calc", vec![argument])
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &[CalculationValue] {
        &self.arguments
    }
}
