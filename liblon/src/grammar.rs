//! The LON grammar, assembled from the primitive combinators.
//!
//! Rule layering, leaves first:
//!
//! 1. **Ignorable content**: whitespace, commas, line comments, and block
//!    comments, all interchangeable as separators between tokens.
//! 2. **Scalars**: `null`, booleans, numbers, quoted strings, and bare
//!    tokens (used for unquoted keys).
//! 3. **Recursive values**: lists and dictionaries, which contain scalars,
//!    which in turn may be lists and dictionaries. The cycle is closed with
//!    a deferred rule bound once all of the rules exist.
//!
//! The document root is dictionary contents without enclosing braces.
//!
//! The combinator graph is built once, at first use, and shared read-only
//! thereafter; per-parse state lives entirely in the offsets threaded
//! through rule applications.

use crate::combinator::{
    any_char, choice, end_of_input, literal, many, map, map_to, one_or_more, satisfy, take_left,
    take_mid, take_right, take_sides, take_until, then, try_map, Deferred, Failure, Outcome, Rule,
    Scanner,
};
use crate::error::{ParseContext, ParseError, Result};
use crate::value::Value;
use indexmap::IndexMap;
use once_cell::sync::Lazy;

/// The full rule set. Individual rules are exposed for the unit tests;
/// parsing goes through [`parse_document`].
pub(crate) struct Grammar {
    pub token: Rule<String>,
    pub unit: Rule<Value>,
    pub boolean: Rule<Value>,
    pub number: Rule<Value>,
    pub string: Rule<String>,
    pub key: Rule<String>,
    pub scalar: Rule<Value>,
    pub whitespace: Rule<String>,
    pub comma: Rule<String>,
    pub line_comment: Rule<String>,
    pub block_comment: Rule<String>,
    pub ignored: Rule<()>,
    pub key_value: Rule<(String, Value)>,
    pub list_contents: Rule<Value>,
    pub list: Rule<Value>,
    pub dict_contents: Rule<Value>,
    pub dict: Rule<Value>,
    /// Dictionary contents plus any trailing ignorable content.
    pub document: Rule<Value>,
}

pub(crate) static GRAMMAR: Lazy<Grammar> = Lazy::new(Grammar::build);

fn collect(chars: Vec<char>) -> String {
    chars.into_iter().collect()
}

impl Grammar {
    fn build() -> Self {
        // Ignorable content.
        let whitespace = map(
            one_or_more(satisfy(
                |c| c == ' ' || c == '\t' || c == '\n' || c == '\r',
                "whitespace",
            )),
            |chars, _| collect(chars),
        );
        let comma = map(literal(","), |s, _| s.to_string());
        let line_end = choice(vec![
            map_to(
                choice(vec![literal("\r\n"), literal("\n"), literal("\r")]),
                (),
            ),
            end_of_input(),
        ]);
        let line_comment = map(
            take_right(literal("//"), take_until(any_char(), line_end)),
            |chars, _| collect(chars),
        );
        let block_comment = map(
            take_right(literal("/*"), take_until(any_char(), literal("*/"))),
            |chars, _| collect(chars),
        );
        let ignored = map_to(
            many(choice(vec![
                line_comment.clone(),
                block_comment.clone(),
                comma.clone(),
                whitespace.clone(),
            ])),
            (),
        );

        // Scalars.
        //
        // A bare token is any run of characters up to the next whitespace.
        // Matching zero characters means whitespace was already at the
        // cursor; that is malformed input no alternative could legitimately
        // accept, so it is a fatal rejection rather than a backtrackable one.
        let token = try_map(
            take_until(any_char(), whitespace.clone()),
            |chars, _| {
                if chars.is_empty() {
                    Err("whitespace encountered before token".to_string())
                } else {
                    Ok(collect(chars))
                }
            },
        );
        let unit = map_to(literal("null"), Value::Null);
        let boolean = choice(vec![
            map_to(literal("true"), Value::Bool(true)),
            map_to(literal("false"), Value::Bool(false)),
        ]);

        // A number starts with a digit, never a bare decimal point. The
        // float form is tried first so "1.5" is not consumed as just "1".
        let digit = satisfy(|c| c.is_ascii_digit(), "a digit");
        let digits = map(one_or_more(digit.clone()), |chars, _| collect(chars));
        let fraction = map(many(digit), |chars, _| collect(chars));
        let float_form = map(
            then(then(digits.clone(), literal(".")), fraction),
            |((whole, _), frac), _| format!("{}.{}", whole, frac),
        );
        let number = try_map(choice(vec![float_form, digits]), |text, _| {
            text.parse::<f64>()
                .map(Value::Number)
                .map_err(|_| format!("a number, got \"{}\"", text))
        });

        // A quoted string runs to the next double quote; there are no
        // escape sequences, so an embedded quote cannot be represented.
        let string = map(
            take_right(literal("\""), take_until(any_char(), literal("\""))),
            |chars, _| collect(chars),
        );

        // The bare-token alternative is tried first. Its scan only stops at
        // whitespace, so a quoted key immediately followed by whitespace is
        // matched by `token` and keeps its quote characters in the returned
        // key. Documented behavior; the order must not be swapped.
        let key = choice(vec![token.clone(), string.clone()]);

        // Recursive values. `scalar` is forward-declared so that lists and
        // dictionaries can contain it before it is defined in terms of them.
        let scalar_slot = Deferred::new();
        let scalar = scalar_slot.rule();

        let list_contents = map(
            many(take_mid(ignored.clone(), scalar.clone(), ignored.clone())),
            |items, _| Value::List(items),
        );
        let list = take_mid(literal("["), list_contents.clone(), literal("]"));

        let key_value = take_mid(
            ignored.clone(),
            take_sides(key.clone(), ignored.clone(), scalar.clone()),
            ignored.clone(),
        );
        let dict_contents = map(many(key_value.clone()), |pairs, _| {
            let mut dict = IndexMap::new();
            for (key, value) in pairs {
                // Last write wins on duplicate keys.
                dict.insert(key, value);
            }
            Value::Dict(dict)
        });
        let dict = take_mid(literal("{"), dict_contents.clone(), literal("}"));

        scalar_slot.bind(choice(vec![
            unit.clone(),
            boolean.clone(),
            number.clone(),
            map(string.clone(), |s, _| Value::String(s)),
            list.clone(),
            dict.clone(),
        ]));

        // Trailing separators and comments after the last pair belong to no
        // pair; consume them so that full-consumption checking sees only
        // genuine leftover content.
        let document = take_left(dict_contents.clone(), ignored.clone());

        Grammar {
            token,
            unit,
            boolean,
            number,
            string,
            key,
            scalar,
            whitespace,
            comma,
            line_comment,
            block_comment,
            ignored,
            key_value,
            list_contents,
            list,
            dict_contents,
            dict,
            document,
        }
    }
}

/// Parse a full document as braceless dictionary contents, requiring the
/// entire input to be consumed.
pub(crate) fn parse_document(input: &str, ctx: &ParseContext) -> Result<Value> {
    let scanner = Scanner::new(input);
    match GRAMMAR.document.apply(&scanner, 0) {
        Outcome::Ok(value, end) => {
            if end < scanner.len() {
                return Err(trailing_error(&scanner, ctx, end));
            }
            Ok(value)
        }
        Outcome::Miss(failure) => Err(expected_error(&scanner, ctx, &failure)),
        Outcome::Fatal(failure) => Err(invalid_error(&scanner, ctx, &failure)),
    }
}

/// Turn leftover input into an error, probing the key-value rule at the
/// stopping point for a more specific expectation than "extra content".
fn trailing_error(scanner: &Scanner<'_>, ctx: &ParseContext, end: usize) -> ParseError {
    match GRAMMAR.key_value.apply(scanner, end) {
        Outcome::Miss(failure) => expected_error(scanner, ctx, &failure),
        Outcome::Fatal(failure) => invalid_error(scanner, ctx, &failure),
        Outcome::Ok(..) => {
            let (line, column) = scanner.position(end);
            ParseError::TrailingContent {
                offset: end,
                location: ctx.loc_suffix(line, column),
            }
        }
    }
}

fn expected_error(scanner: &Scanner<'_>, ctx: &ParseContext, failure: &Failure) -> ParseError {
    let (line, column) = scanner.position(failure.offset);
    ParseError::Expected {
        expected: failure.expected.clone(),
        offset: failure.offset,
        location: ctx.loc_suffix(line, column),
    }
}

fn invalid_error(scanner: &Scanner<'_>, ctx: &ParseContext, failure: &Failure) -> ParseError {
    let (line, column) = scanner.position(failure.offset);
    ParseError::Invalid {
        expected: failure.expected.clone(),
        offset: failure.offset,
        location: ctx.loc_suffix(line, column),
    }
}
