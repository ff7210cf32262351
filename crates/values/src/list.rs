//! Sass lists and argument lists
//!
//! Lists carry a separator and a bracketed flag; both participate in
//! equality. An argument list is a comma list plus the keyword arguments
//! that were passed by name, preserved in first-seen order.

use crate::Value;
use crate::error::ValueError;
use indexmap::IndexMap;
use std::hash::{Hash, Hasher};

/// How a list's elements are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ListSeparator {
    #[default]
    Comma,
    Space,
    Slash,
    /// Only permitted on lists of at most one element
    Undecided,
}

/// An ordered Sass list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SassList {
    elements: Vec<Value>,
    separator: ListSeparator,
    bracketed: bool,
}

impl SassList {
    /// A list with the given separator and bracket flag.
    ///
    /// Rejects [`ListSeparator::Undecided`] on lists longer than one
    /// element.
    pub fn new(
        elements: Vec<Value>,
        separator: ListSeparator,
        bracketed: bool,
    ) -> Result<Self, ValueError> {
        if separator == ListSeparator::Undecided && elements.len() > 1 {
            return Err(ValueError::UndecidedSeparator(elements.len()));
        }
        Ok(Self {
            elements,
            separator,
            bracketed,
        })
    }

    /// An unbracketed comma list.
    pub fn comma(elements: Vec<Value>) -> Self {
        Self {
            elements,
            separator: ListSeparator::Comma,
            bracketed: false,
        }
    }

    /// An unbracketed space list.
    pub fn space(elements: Vec<Value>) -> Self {
        Self {
            elements,
            separator: ListSeparator::Space,
            bracketed: false,
        }
    }

    /// The empty list with an undecided separator.
    pub fn empty() -> Self {
        Self {
            elements: Vec::new(),
            separator: ListSeparator::Undecided,
            bracketed: false,
        }
    }

    pub fn elements(&self) -> &[Value] {
        &self.elements
    }

    pub fn separator(&self) -> ListSeparator {
        self.separator
    }

    pub fn is_bracketed(&self) -> bool {
        self.bracketed
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.elements.iter()
    }
}

impl<'a> IntoIterator for &'a SassList {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

/// The `$args...` value a variadic Sass function receives.
///
/// Iteration yields positional elements only; keywords are exposed
/// separately and keep the order they were first seen in.
#[derive(Debug, Clone)]
pub struct ArgumentList {
    elements: Vec<Value>,
    keywords: IndexMap<String, Value>,
    separator: ListSeparator,
}

impl ArgumentList {
    /// Positional arguments plus keyword arguments.
    pub fn new(
        elements: Vec<Value>,
        keywords: IndexMap<String, Value>,
        separator: ListSeparator,
    ) -> Self {
        Self {
            elements,
            keywords,
            separator,
        }
    }

    /// Positional arguments only.
    pub fn positional(elements: Vec<Value>) -> Self {
        Self {
            elements,
            keywords: IndexMap::new(),
            separator: ListSeparator::Comma,
        }
    }

    /// Positional elements.
    pub fn elements(&self) -> &[Value] {
        &self.elements
    }

    /// Keyword arguments in first-seen order, names without the `$`.
    pub fn keywords(&self) -> &IndexMap<String, Value> {
        &self.keywords
    }

    pub fn separator(&self) -> ListSeparator {
        self.separator
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Iterates positional elements only.
    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.elements.iter()
    }

    /// A positional argument by 0-based offset, with a typed error for
    /// arity mistakes in host functions.
    pub fn get(&self, index: usize) -> Result<&Value, ValueError> {
        self.elements
            .get(index)
            .ok_or(ValueError::IndexOutOfRange {
                index: index as i64 + 1,
                length: self.elements.len(),
            })
    }
}

impl PartialEq for ArgumentList {
    fn eq(&self, other: &Self) -> bool {
        self.elements == other.elements
            && self.separator == other.separator
            && self.keywords == other.keywords
    }
}

impl Eq for ArgumentList {}

impl Hash for ArgumentList {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.elements.hash(state);
        self.separator.hash(state);
        // IndexMap equality is order-insensitive, so the hash must be too
        let mut combined: u64 = 0;
        for (name, value) in &self.keywords {
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            name.hash(&mut hasher);
            value.hash(&mut hasher);
            combined = combined.wrapping_add(hasher.finish());
        }
        combined.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SassNumber;

    fn num(v: f64) -> Value {
        Value::Number(SassNumber::new(v))
    }

    #[test]
    fn test_undecided_separator_bound() {
        assert!(SassList::new(vec![], ListSeparator::Undecided, false).is_ok());
        assert!(SassList::new(vec![num(1.0)], ListSeparator::Undecided, false).is_ok());
        assert_eq!(
            SassList::new(
                vec![num(1.0), num(2.0)],
                ListSeparator::Undecided,
                false
            ),
            Err(ValueError::UndecidedSeparator(2))
        );
    }

    #[test]
    fn test_separator_and_brackets_in_equality() {
        let comma = SassList::comma(vec![num(1.0)]);
        let space = SassList::space(vec![num(1.0)]);
        assert_ne!(comma, space);

        let bracketed = SassList::new(vec![num(1.0)], ListSeparator::Comma, true).unwrap();
        assert_ne!(comma, bracketed);
        assert_eq!(comma, SassList::comma(vec![num(1.0)]));
    }

    #[test]
    fn test_argument_list_keywords_preserved() {
        let mut keywords = IndexMap::new();
        keywords.insert("first".to_string(), num(1.0));
        keywords.insert("second".to_string(), num(2.0));
        let args = ArgumentList::new(vec![num(0.0)], keywords, ListSeparator::Comma);

        let names: Vec<&str> = args.keywords().keys().map(String::as_str).collect();
        assert_eq!(names, ["first", "second"]);
        // Iteration yields positional elements only
        assert_eq!(args.iter().count(), 1);
    }

    #[test]
    fn test_argument_list_get() {
        let args = ArgumentList::positional(vec![num(7.0)]);
        assert_eq!(args.get(0), Ok(&num(7.0)));
        assert_eq!(
            args.get(1),
            Err(ValueError::IndexOutOfRange {
                index: 2,
                length: 1
            })
        );
    }
}
