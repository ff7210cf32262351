//! Errors raised by the value model
//!
//! Everything that can go wrong while constructing or interrogating a Sass
//! value: bad downcasts, unit mismatches, out-of-range channels, indices.
//! Host functions also use this type to report their own failures back to
//! the compiler (`ValueError::Custom`).

/// Error during value construction, downcast, or coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueError {
    /// A typed downcast found a different variant than expected
    WrongType {
        /// Variant the caller asked for (e.g. "number")
        expected: &'static str,
        /// Variant actually present
        actual: &'static str,
    },
    /// Integer coercion on a number that is not within 1e-11 of an integer
    NotAnInteger(f64),
    /// Integer coercion on a number outside the representable range
    IntegerOverflow(f64),
    /// A color channel was outside its permitted range
    ChannelOutOfRange {
        /// Channel name ("red", "saturation", "alpha", ...)
        channel: &'static str,
        /// The rejected input
        value: f64,
    },
    /// The same unit string appeared in both numerator and denominator
    DuplicateUnit(String),
    /// Dimensional analysis failed: units do not convert
    IncompatibleUnits {
        /// Unit form of the source number
        from: String,
        /// Requested unit form
        to: String,
    },
    /// 1-based Sass index outside the value's length
    IndexOutOfRange {
        /// The rejected index (0 is never valid)
        index: i64,
        /// Length of the value being indexed
        length: usize,
    },
    /// An undecided list separator on a list with more than one element
    UndecidedSeparator(usize),
    /// Value nesting exceeds the wire encoder's depth bound
    NestingTooDeep,
    /// Failure reported by user code inside a host function
    Custom(String),
}

impl std::fmt::Display for ValueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueError::WrongType { expected, actual } => {
                write!(f, "Expected a {}, got a {}", expected, actual)
            }
            ValueError::NotAnInteger(v) => {
                write!(f, "{} is not an integer", v)
            }
            ValueError::IntegerOverflow(v) => {
                write!(f, "{} is outside the representable integer range", v)
            }
            ValueError::ChannelOutOfRange { channel, value } => {
                write!(f, "Channel {} is out of range: {}", channel, value)
            }
            ValueError::DuplicateUnit(unit) => {
                write!(
                    f,
                    "Unit {} appears in both numerator and denominator",
                    unit
                )
            }
            ValueError::IncompatibleUnits { from, to } => {
                write!(f, "Cannot convert {} to {}", from, to)
            }
            ValueError::IndexOutOfRange { index, length } => {
                write!(f, "Index {} is out of range for length {}", index, length)
            }
            ValueError::UndecidedSeparator(len) => {
                write!(
                    f,
                    "A list of {} elements must have a decided separator",
                    len
                )
            }
            ValueError::NestingTooDeep => {
                write!(f, "Value nesting is too deep to send to the compiler")
            }
            ValueError::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ValueError {}

impl From<String> for ValueError {
    fn from(msg: String) -> Self {
        ValueError::Custom(msg)
    }
}

impl From<&str> for ValueError {
    fn from(msg: &str) -> Self {
        ValueError::Custom(msg.to_string())
    }
}
