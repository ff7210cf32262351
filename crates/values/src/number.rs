//! Sass numbers: doubles with units
//!
//! A Sass number carries a double plus two unit sequences, numerator and
//! denominator (`12px`, `3em/s`). Numbers with convertible units compare
//! equal after canonicalization (`1in == 96px`), and dimensional analysis
//! drives coercion between unit forms.
//!
//! ## Canonical form
//!
//! Equality and hashing work on the canonical form: every unit with a known
//! CSS dimension is rewritten to that dimension's canonical unit (folding
//! the ratio into the value), matching units across the fraction bar are
//! cancelled, and the remaining unit lists are sorted. Two numbers are equal
//! iff their canonical forms match exactly - no tolerance. The separate
//! [`SassNumber::approx_eq`] helper compares within 1e-11 for callers that
//! want unit-aware numeric comparison.

use crate::error::ValueError;
use std::hash::{Hash, Hasher};

/// Tolerance for treating a double as an integer, and for `approx_eq`.
pub const NUMERIC_EPSILON: f64 = 1e-11;

/// CSS dimensions with fixed conversion ratios.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dimension {
    Length,
    Time,
    Angle,
    Frequency,
    Resolution,
}

/// Known CSS units: (unit, dimension, canonical units per 1 of this unit).
///
/// The first unit listed for each dimension is the canonical one.
const CONVERSIONS: &[(&str, Dimension, f64)] = &[
    ("px", Dimension::Length, 1.0),
    ("in", Dimension::Length, 96.0),
    ("cm", Dimension::Length, 96.0 / 2.54),
    ("mm", Dimension::Length, 96.0 / 25.4),
    ("q", Dimension::Length, 96.0 / 101.6),
    ("pt", Dimension::Length, 96.0 / 72.0),
    ("pc", Dimension::Length, 16.0),
    ("s", Dimension::Time, 1.0),
    ("ms", Dimension::Time, 1.0 / 1000.0),
    ("deg", Dimension::Angle, 1.0),
    ("grad", Dimension::Angle, 0.9),
    ("rad", Dimension::Angle, 180.0 / std::f64::consts::PI),
    ("turn", Dimension::Angle, 360.0),
    ("hz", Dimension::Frequency, 1.0),
    ("khz", Dimension::Frequency, 1000.0),
    ("dppx", Dimension::Resolution, 1.0),
    ("dpi", Dimension::Resolution, 1.0 / 96.0),
    ("dpcm", Dimension::Resolution, 2.54 / 96.0),
];

fn lookup_unit(unit: &str) -> Option<(Dimension, f64)> {
    CONVERSIONS
        .iter()
        .find(|(u, _, _)| unit.eq_ignore_ascii_case(u))
        .map(|&(_, d, f)| (d, f))
}

fn canonical_unit(dimension: Dimension) -> &'static str {
    match dimension {
        Dimension::Length => "px",
        Dimension::Time => "s",
        Dimension::Angle => "deg",
        Dimension::Frequency => "hz",
        Dimension::Resolution => "dppx",
    }
}

/// Multiplier converting `from` into `to`, or None if the units do not
/// convert. Unknown units convert only to themselves.
fn conversion_factor(from: &str, to: &str) -> Option<f64> {
    if from.eq_ignore_ascii_case(to) {
        return Some(1.0);
    }
    let (from_dim, from_factor) = lookup_unit(from)?;
    let (to_dim, to_factor) = lookup_unit(to)?;
    if from_dim != to_dim {
        return None;
    }
    Some(from_factor / to_factor)
}

/// A Sass number: a double with numerator and denominator units.
///
/// Immutable once constructed. The unit sequences never share a unit
/// string; construction rejects that.
#[derive(Debug, Clone)]
pub struct SassNumber {
    value: f64,
    numerator_units: Vec<String>,
    denominator_units: Vec<String>,
}

impl SassNumber {
    /// A unitless number.
    pub fn new(value: f64) -> Self {
        Self {
            value,
            numerator_units: Vec::new(),
            denominator_units: Vec::new(),
        }
    }

    /// A number with a single numerator unit, e.g. `12px`.
    pub fn with_unit(value: f64, unit: impl Into<String>) -> Self {
        Self {
            value,
            numerator_units: vec![unit.into()],
            denominator_units: Vec::new(),
        }
    }

    /// A number with arbitrary unit sequences.
    ///
    /// Rejects a unit string appearing in both sequences - such a quantity
    /// is not in reduced form.
    pub fn with_units(
        value: f64,
        numerator_units: Vec<String>,
        denominator_units: Vec<String>,
    ) -> Result<Self, ValueError> {
        for unit in &numerator_units {
            if denominator_units.iter().any(|d| d == unit) {
                return Err(ValueError::DuplicateUnit(unit.clone()));
            }
        }
        Ok(Self {
            value,
            numerator_units,
            denominator_units,
        })
    }

    /// The double value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Numerator units, in declaration order.
    pub fn numerator_units(&self) -> &[String] {
        &self.numerator_units
    }

    /// Denominator units, in declaration order.
    pub fn denominator_units(&self) -> &[String] {
        &self.denominator_units
    }

    /// True when the number carries no units at all.
    pub fn is_unitless(&self) -> bool {
        self.numerator_units.is_empty() && self.denominator_units.is_empty()
    }

    /// True when the number is exactly one numerator unit, e.g. `10px`.
    pub fn has_single_unit(&self) -> bool {
        self.numerator_units.len() == 1 && self.denominator_units.is_empty()
    }

    /// The unit form as written, e.g. `px/s` or `""` for unitless.
    pub fn unit_string(&self) -> String {
        unit_string(&self.numerator_units, &self.denominator_units)
    }

    /// Coerce to an integer.
    ///
    /// Requires the value to be within 1e-11 of an integer and inside the
    /// `i64` range; units are ignored.
    pub fn assert_int(&self) -> Result<i64, ValueError> {
        if !self.value.is_finite() {
            return Err(ValueError::NotAnInteger(self.value));
        }
        let rounded = self.value.round();
        if (self.value - rounded).abs() >= NUMERIC_EPSILON {
            return Err(ValueError::NotAnInteger(self.value));
        }
        if rounded < i64::MIN as f64 || rounded > i64::MAX as f64 {
            return Err(ValueError::IntegerOverflow(self.value));
        }
        Ok(rounded as i64)
    }

    /// Coerce this quantity into the given unit form.
    ///
    /// Succeeds when the dimensional analysis matches: every target unit
    /// consumes one convertible source unit and nothing is left over.
    /// `1in` coerces to `(px)` as `96px`; `px` will not coerce to `s`.
    pub fn coerce(
        &self,
        numerator_units: &[&str],
        denominator_units: &[&str],
    ) -> Result<SassNumber, ValueError> {
        let incompatible = || ValueError::IncompatibleUnits {
            from: self.unit_string(),
            to: unit_string_refs(numerator_units, denominator_units),
        };

        let mut value = self.value;
        let mut old_numerators = self.numerator_units.clone();
        let mut old_denominators = self.denominator_units.clone();

        for target in numerator_units {
            let index = old_numerators
                .iter()
                .position(|u| conversion_factor(u, target).is_some())
                .ok_or_else(incompatible)?;
            let source = old_numerators.remove(index);
            // conversion_factor is Some by the position check above
            value *= conversion_factor(&source, target).unwrap_or(1.0);
        }
        for target in denominator_units {
            let index = old_denominators
                .iter()
                .position(|u| conversion_factor(u, target).is_some())
                .ok_or_else(incompatible)?;
            let source = old_denominators.remove(index);
            value /= conversion_factor(&source, target).unwrap_or(1.0);
        }
        if !old_numerators.is_empty() || !old_denominators.is_empty() {
            return Err(incompatible());
        }

        SassNumber::with_units(
            value,
            numerator_units.iter().map(|u| u.to_string()).collect(),
            denominator_units.iter().map(|u| u.to_string()).collect(),
        )
    }

    /// Unit-aware numeric comparison within 1e-11.
    ///
    /// Converts `other` into this number's unit form first; numbers whose
    /// units do not convert are never approximately equal.
    pub fn approx_eq(&self, other: &SassNumber) -> bool {
        let numerators: Vec<&str> =
            self.numerator_units.iter().map(String::as_str).collect();
        let denominators: Vec<&str> =
            self.denominator_units.iter().map(String::as_str).collect();
        match other.coerce(&numerators, &denominators) {
            Ok(converted) => (self.value - converted.value).abs() < NUMERIC_EPSILON,
            Err(_) => false,
        }
    }

    /// Canonical form: known units rewritten to their dimension's canonical
    /// unit with the ratio folded into the value, matching units cancelled
    /// across the fraction bar, unit lists sorted.
    fn canonical(&self) -> (f64, Vec<String>, Vec<String>) {
        let mut value = self.value;
        let mut numerators: Vec<String> = Vec::with_capacity(self.numerator_units.len());
        let mut denominators: Vec<String> =
            Vec::with_capacity(self.denominator_units.len());

        for unit in &self.numerator_units {
            match lookup_unit(unit) {
                Some((dim, factor)) => {
                    value *= factor;
                    numerators.push(canonical_unit(dim).to_string());
                }
                None => numerators.push(unit.clone()),
            }
        }
        for unit in &self.denominator_units {
            match lookup_unit(unit) {
                Some((dim, factor)) => {
                    value /= factor;
                    denominators.push(canonical_unit(dim).to_string());
                }
                None => denominators.push(unit.clone()),
            }
        }

        // Cancel matching canonical units (px/px and the like)
        let mut remaining_denominators: Vec<String> = Vec::new();
        for denom in denominators {
            if let Some(index) = numerators.iter().position(|n| *n == denom) {
                numerators.remove(index);
            } else {
                remaining_denominators.push(denom);
            }
        }

        numerators.sort();
        remaining_denominators.sort();
        (value, numerators, remaining_denominators)
    }
}

fn unit_string(numerators: &[String], denominators: &[String]) -> String {
    match (numerators.is_empty(), denominators.is_empty()) {
        (true, true) => String::new(),
        (false, true) => numerators.join("*"),
        (true, false) => format!("1/{}", denominators.join("*")),
        (false, false) => format!("{}/{}", numerators.join("*"), denominators.join("*")),
    }
}

fn unit_string_refs(numerators: &[&str], denominators: &[&str]) -> String {
    unit_string(
        &numerators.iter().map(|u| u.to_string()).collect::<Vec<_>>(),
        &denominators.iter().map(|u| u.to_string()).collect::<Vec<_>>(),
    )
}

/// Normalize a double for hashing: -0.0 folds into 0.0 and every NaN maps
/// to one bit pattern so Hash stays consistent with Eq.
fn hashable_bits(value: f64) -> u64 {
    if value == 0.0 {
        0.0f64.to_bits()
    } else if value.is_nan() {
        f64::NAN.to_bits()
    } else {
        value.to_bits()
    }
}

impl PartialEq for SassNumber {
    fn eq(&self, other: &Self) -> bool {
        let (a, a_num, a_den) = self.canonical();
        let (b, b_num, b_den) = other.canonical();
        let values_equal = a == b || (a.is_nan() && b.is_nan());
        values_equal && a_num == b_num && a_den == b_den
    }
}

// NaN == NaN above, so equality is reflexive and Eq is lawful.
impl Eq for SassNumber {}

impl Hash for SassNumber {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let (value, numerators, denominators) = self.canonical();
        hashable_bits(value).hash(state);
        numerators.hash(state);
        denominators.hash(state);
    }
}

impl std::fmt::Display for SassNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)?;
        let units = self.unit_string();
        if !units.is_empty() {
            write!(f, "{}", units)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(n: &SassNumber) -> u64 {
        let mut hasher = DefaultHasher::new();
        n.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_unitless_equality() {
        assert_eq!(SassNumber::new(1.5), SassNumber::new(1.5));
        assert_ne!(SassNumber::new(1.5), SassNumber::new(1.6));
    }

    #[test]
    fn test_convertible_units_equal() {
        let inches = SassNumber::with_unit(1.0, "in");
        let pixels = SassNumber::with_unit(96.0, "px");
        assert_eq!(inches, pixels);
        assert_eq!(hash_of(&inches), hash_of(&pixels));
    }

    #[test]
    fn test_incompatible_units_not_equal() {
        assert_ne!(
            SassNumber::with_unit(1.0, "px"),
            SassNumber::with_unit(1.0, "s")
        );
        assert_ne!(SassNumber::with_unit(1.0, "px"), SassNumber::new(1.0));
    }

    #[test]
    fn test_unknown_units_compare_exactly() {
        let a = SassNumber::with_unit(3.0, "glorp");
        let b = SassNumber::with_unit(3.0, "glorp");
        let c = SassNumber::with_unit(3.0, "fnord");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_duplicate_unit_rejected() {
        let result = SassNumber::with_units(
            1.0,
            vec!["px".to_string()],
            vec!["px".to_string()],
        );
        assert_eq!(result, Err(ValueError::DuplicateUnit("px".to_string())));
    }

    #[test]
    fn test_coerce_lengths() {
        let inches = SassNumber::with_unit(1.0, "in");
        let pixels = inches.coerce(&["px"], &[]).unwrap();
        assert!((pixels.value() - 96.0).abs() < NUMERIC_EPSILON);
        assert_eq!(pixels.numerator_units(), ["px".to_string()]);
    }

    #[test]
    fn test_coerce_compound_units() {
        // 2 in/s -> 192 px/s
        let speed = SassNumber::with_units(
            2.0,
            vec!["in".to_string()],
            vec!["s".to_string()],
        )
        .unwrap();
        let converted = speed.coerce(&["px"], &["s"]).unwrap();
        assert!((converted.value() - 192.0).abs() < NUMERIC_EPSILON);

        // Denominator conversion folds the other way: 1 px/s = 0.001 px/ms
        let rate = SassNumber::with_units(
            1.0,
            vec!["px".to_string()],
            vec!["s".to_string()],
        )
        .unwrap();
        let per_ms = rate.coerce(&["px"], &["ms"]).unwrap();
        assert!((per_ms.value() - 0.001).abs() < NUMERIC_EPSILON);
    }

    #[test]
    fn test_coerce_rejects_leftover_units() {
        let speed = SassNumber::with_units(
            1.0,
            vec!["px".to_string()],
            vec!["s".to_string()],
        )
        .unwrap();
        assert!(matches!(
            speed.coerce(&["px"], &[]),
            Err(ValueError::IncompatibleUnits { .. })
        ));
    }

    #[test]
    fn test_coerce_unitless_to_unit_fails() {
        assert!(SassNumber::new(4.0).coerce(&["px"], &[]).is_err());
    }

    #[test]
    fn test_assert_int() {
        assert_eq!(SassNumber::new(3.0).assert_int(), Ok(3));
        assert_eq!(SassNumber::new(3.0 + 1e-13).assert_int(), Ok(3));
        assert_eq!(SassNumber::new(-2.0).assert_int(), Ok(-2));
        assert!(matches!(
            SassNumber::new(3.5).assert_int(),
            Err(ValueError::NotAnInteger(_))
        ));
        assert!(matches!(
            SassNumber::new(f64::NAN).assert_int(),
            Err(ValueError::NotAnInteger(_))
        ));
        assert!(matches!(
            SassNumber::new(1e300).assert_int(),
            Err(ValueError::IntegerOverflow(_))
        ));
    }

    #[test]
    fn test_approx_eq() {
        let a = SassNumber::with_unit(96.0, "px");
        let b = SassNumber::with_unit(1.0, "in");
        assert!(a.approx_eq(&b));
        assert!(b.approx_eq(&a));

        let c = SassNumber::with_unit(96.0 + 1e-12, "px");
        assert!(a.approx_eq(&c));

        let d = SassNumber::with_unit(96.1, "px");
        assert!(!a.approx_eq(&d));
        assert!(!a.approx_eq(&SassNumber::with_unit(96.0, "s")));
    }

    #[test]
    fn test_cancelled_units_compare_unitless() {
        // px/in canonicalizes to px/px, which cancels
        let ratio = SassNumber::with_units(
            96.0,
            vec!["px".to_string()],
            vec!["in".to_string()],
        )
        .unwrap();
        assert_eq!(ratio, SassNumber::new(1.0));
    }

    #[test]
    fn test_negative_zero_hashes_like_zero() {
        assert_eq!(SassNumber::new(0.0), SassNumber::new(-0.0));
        assert_eq!(hash_of(&SassNumber::new(0.0)), hash_of(&SassNumber::new(-0.0)));
    }

    #[test]
    fn test_nan_is_reflexive() {
        let nan = SassNumber::new(f64::NAN);
        assert_eq!(nan, nan.clone());
    }

    #[test]
    fn test_unit_string() {
        assert_eq!(SassNumber::new(1.0).unit_string(), "");
        assert_eq!(SassNumber::with_unit(1.0, "px").unit_string(), "px");
        let compound = SassNumber::with_units(
            1.0,
            vec!["px".to_string()],
            vec!["s".to_string()],
        )
        .unwrap();
        assert_eq!(compound.unit_string(), "px/s");
    }
}
