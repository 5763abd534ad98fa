//! Scalar cell values
//!
//! Provides [`Value`], the single cell type stored in a [`crate::Table`].
//! The empty string is the "unset" sentinel.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// A single table cell
///
/// Cells are heterogeneous: the same column may hold text in one file and
/// numbers in another. Coercion only happens in [`crate::ParseMode::Typed`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Boolean-like scalar (`true` / `false`, any case)
    Bool(bool),
    /// Numeric scalar
    Number(f64),
    /// Verbatim text; the empty string means unset
    Text(String),
}

impl Value {
    /// The unset sentinel
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self::Text(String::new())
    }

    /// Check for the unset sentinel
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Text(s) if s.is_empty())
    }

    /// Borrow the text payload, if this is a text cell
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view, if this is a number cell
    #[inline]
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Coerce a raw field into a typed value
    ///
    /// Recognizes `true`/`false` (case-insensitive) and plain decimal numbers.
    /// A number is only produced when it prints back identically, so `"007"`,
    /// `"1.50"` and `"1e3"` keep their exact spelling as text.
    #[must_use]
    pub fn coerce(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("true") {
            return Self::Bool(true);
        }
        if raw.eq_ignore_ascii_case("false") {
            return Self::Bool(false);
        }
        if looks_numeric(raw) {
            if let Ok(n) = raw.parse::<f64>() {
                if n.is_finite() && n.to_string() == raw {
                    return Self::Number(n);
                }
            }
        }
        Self::Text(raw.to_string())
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::empty()
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for Value {
    #[allow(clippy::cast_precision_loss)]
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Shape check: `-?digits[.digits]` with optional `e[+-]digits`
fn looks_numeric(raw: &str) -> bool {
    let body = raw.strip_prefix('-').unwrap_or(raw);
    let (mantissa, exponent) = match body.find(['e', 'E']) {
        Some(at) => (&body[..at], Some(&body[at + 1..])),
        None => (body, None),
    };
    let (int, frac) = match mantissa.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (mantissa, None),
    };
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !digits(int) || frac.is_some_and(|f| !digits(f)) {
        return false;
    }
    match exponent {
        None => true,
        Some(e) => digits(e.strip_prefix(['+', '-']).unwrap_or(e)),
    }
}
