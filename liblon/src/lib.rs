//! LON (Lax Object Notation) parser implementation.
//!
//! LON is a relaxed, human-writable object notation: JSON-like, but with
//! unquoted keys, optional commas, and both line (`// ...`) and block
//! (`/* ... */`) comments. A document is a dictionary without enclosing
//! braces:
//!
//! ```text
//! name "demo"          // string value
//! retries 3, debug true
//! limits {
//!     sizes [1 2.5 10]
//!     label null
//! }
//! ```
//!
//! # Architecture
//!
//! The parser is a recursive-descent parser built from combinators:
//!
//! 1. **Combinator engine** (`combinator`): a small algebra of composable
//!    rules over the character stream - literals, sequencing with
//!    projections, PEG-style ordered choice, repetition, scan-until, and
//!    deferred rules for recursive grammars.
//!
//! 2. **Grammar** (`grammar`): the LON rules assembled from those
//!    primitives - ignorable content (whitespace, commas, comments),
//!    scalars, and the mutually recursive list/dictionary rules. Built
//!    once and shared read-only across all parse calls.
//!
//! Whitespace, commas, and comments are interchangeable separators.
//! Quoted strings have no escape sequences: a string runs to the next
//! double quote. Numbers must start with a digit (`1.` is valid, `.1` is
//! not) and have no exponent form.
//!
//! Recursion depth follows the nesting depth of the input document;
//! pathologically deep nesting (thousands of levels of lists or
//! dictionaries within each other) can exhaust the call stack.

mod combinator;
mod error;
mod grammar;
mod value;

pub use error::{ParseError, Result};
pub use value::Value;

/// Parse a LON document from a string.
///
/// The document root is an implicit dictionary: key-value pairs without
/// enclosing braces. The entire input must be consumed.
///
/// # Example
///
/// ```
/// use liblon::parse;
///
/// let value = parse("answer 42 nested { flag true }").unwrap();
/// let dict = value.as_dict().unwrap();
/// assert_eq!(dict.get("answer").unwrap().as_number(), Some(42.0));
/// ```
pub fn parse(input: &str) -> Result<Value> {
    parse_with_filename(input, None)
}

/// Parse a LON document from a string with a filename for error messages.
pub fn parse_with_filename(input: &str, filename: Option<&str>) -> Result<Value> {
    let ctx = error::ParseContext::new(filename);
    grammar::parse_document(input, &ctx)
}
