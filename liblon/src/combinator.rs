//! Primitive parser combinators.
//!
//! A [`Rule<T>`] is a composable parsing function from a cursor offset to an
//! [`Outcome<T>`]. Rules are plain values: they can be stored, cloned, and
//! combined, which is what makes forward declaration (and therefore recursive
//! grammars) possible via [`Deferred`].
//!
//! Two failure channels flow through every combinator:
//!
//! - [`Outcome::Miss`]: the rule did not match at this position. Ordered
//!   choice recovers from this by trying the next alternative from the same
//!   starting offset; nothing is consumed.
//! - [`Outcome::Fatal`]: the input matched structurally but is semantically
//!   invalid. This aborts the whole parse; no alternative may recover.
//!
//! The combinators here know nothing about the LON grammar; see
//! `grammar.rs` for the rules built on top of them.

use std::sync::{Arc, OnceLock};

/// Byte-offset half-open range of input attempted by a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }
}

/// Why a rule did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Failure {
    /// The input range the rule attempted.
    pub span: Span,
    /// The offset at which matching stopped.
    pub offset: usize,
    /// Human-readable description of what was expected.
    pub expected: String,
}

impl Failure {
    /// A failure at a single position, before anything was consumed.
    pub fn at(offset: usize, expected: impl Into<String>) -> Self {
        Failure {
            span: Span::new(offset, offset),
            offset,
            expected: expected.into(),
        }
    }
}

/// Result of applying a rule at an offset.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Outcome<T> {
    /// Matched: the parsed value and the offset just past the consumed input.
    Ok(T, usize),
    /// Backtrackable failure: ordered choice may try another alternative.
    Miss(Failure),
    /// Fatal failure: aborts the whole parse.
    Fatal(Failure),
}

/// Read-only view of the input text.
///
/// Cursors are byte offsets into the source; rules never mutate the scanner,
/// they only thread offsets through their outcomes.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Scanner<'a> {
    src: &'a str,
}

impl<'a> Scanner<'a> {
    pub fn new(src: &'a str) -> Self {
        Scanner { src }
    }

    /// Total length of the input in bytes.
    pub fn len(&self) -> usize {
        self.src.len()
    }

    /// The character starting at a byte offset, if any.
    pub fn char_at(&self, offset: usize) -> Option<char> {
        self.src.get(offset..)?.chars().next()
    }

    /// Whether the input at `offset` starts with `s`.
    pub fn starts_with(&self, offset: usize, s: &str) -> bool {
        self.src.get(offset..).is_some_and(|rest| rest.starts_with(s))
    }

    /// One-based line and column of a byte offset, for error display.
    pub fn position(&self, offset: usize) -> (usize, usize) {
        let clamped = offset.min(self.src.len());
        let before = &self.src[..clamped];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |nl| nl + 1);
        let column = before[line_start..].chars().count() + 1;
        (line, column)
    }
}

type RuleFn<T> = dyn Fn(&Scanner<'_>, usize) -> Outcome<T> + Send + Sync;

/// A composable grammar rule.
///
/// Cloning a rule is cheap (shared behavior). Rules carry no per-parse
/// state, so a fully built grammar is safely shared across threads.
pub(crate) struct Rule<T> {
    f: Arc<RuleFn<T>>,
}

impl<T> Clone for Rule<T> {
    fn clone(&self) -> Self {
        Rule { f: Arc::clone(&self.f) }
    }
}

impl<T: 'static> Rule<T> {
    pub fn new(f: impl Fn(&Scanner<'_>, usize) -> Outcome<T> + Send + Sync + 'static) -> Self {
        Rule { f: Arc::new(f) }
    }

    /// Apply this rule at a cursor offset.
    pub fn apply(&self, input: &Scanner<'_>, offset: usize) -> Outcome<T> {
        (self.f)(input, offset)
    }
}

/// Run a rule against a full input buffer, starting at offset zero.
///
/// Partial consumption is not an error at this layer; callers that require
/// full consumption must check the returned offset themselves.
pub(crate) fn run<T: 'static>(rule: &Rule<T>, input: &str) -> Outcome<T> {
    let scanner = Scanner::new(input);
    rule.apply(&scanner, 0)
}

/// Match exactly one character, whatever it is.
pub(crate) fn any_char() -> Rule<char> {
    Rule::new(|input, offset| match input.char_at(offset) {
        Some(c) => Outcome::Ok(c, offset + c.len_utf8()),
        None => Outcome::Miss(Failure::at(offset, "any character")),
    })
}

/// Match the exact string `s`.
pub(crate) fn literal(s: &'static str) -> Rule<&'static str> {
    Rule::new(move |input, offset| {
        if input.starts_with(offset, s) {
            Outcome::Ok(s, offset + s.len())
        } else {
            Outcome::Miss(Failure::at(offset, format!("\"{}\"", s)))
        }
    })
}

/// Match one character satisfying `pred`.
pub(crate) fn satisfy(
    pred: impl Fn(char) -> bool + Send + Sync + 'static,
    expected: &'static str,
) -> Rule<char> {
    Rule::new(move |input, offset| match input.char_at(offset) {
        Some(c) if pred(c) => Outcome::Ok(c, offset + c.len_utf8()),
        _ => Outcome::Miss(Failure::at(offset, expected)),
    })
}

/// Match the end of the input, consuming nothing.
pub(crate) fn end_of_input() -> Rule<()> {
    Rule::new(|input, offset| {
        if offset >= input.len() {
            Outcome::Ok((), offset)
        } else {
            Outcome::Miss(Failure::at(offset, "end of input"))
        }
    })
}

/// Run `p` then `q`, `q` continuing from where `p` stopped.
///
/// Failure of either side fails the whole sequence; since offsets are
/// threaded through outcomes rather than mutated, the caller naturally
/// resumes from the sequence's starting offset.
pub(crate) fn then<A: 'static, B: 'static>(p: Rule<A>, q: Rule<B>) -> Rule<(A, B)> {
    Rule::new(move |input, offset| match p.apply(input, offset) {
        Outcome::Ok(a, mid) => match q.apply(input, mid) {
            Outcome::Ok(b, end) => Outcome::Ok((a, b), end),
            Outcome::Miss(f) => Outcome::Miss(f),
            Outcome::Fatal(f) => Outcome::Fatal(f),
        },
        Outcome::Miss(f) => Outcome::Miss(f),
        Outcome::Fatal(f) => Outcome::Fatal(f),
    })
}

/// Run `p` then `q`, keeping only `p`'s value.
pub(crate) fn take_left<A: 'static, B: 'static>(p: Rule<A>, q: Rule<B>) -> Rule<A> {
    map(then(p, q), |(a, _), _| a)
}

/// Run `p` then `q`, keeping only `q`'s value.
pub(crate) fn take_right<A: 'static, B: 'static>(p: Rule<A>, q: Rule<B>) -> Rule<B> {
    map(then(p, q), |(_, b), _| b)
}

/// Run three rules in order, keeping only the middle value.
pub(crate) fn take_mid<A: 'static, B: 'static, C: 'static>(
    a: Rule<A>,
    b: Rule<B>,
    c: Rule<C>,
) -> Rule<B> {
    map(then(then(a, b), c), |((_, b), _), _| b)
}

/// Run three rules in order, keeping the outer two values.
pub(crate) fn take_sides<A: 'static, B: 'static, C: 'static>(
    a: Rule<A>,
    b: Rule<B>,
    c: Rule<C>,
) -> Rule<(A, C)> {
    map(then(then(a, b), c), |((a, _), c), _| (a, c))
}

/// Ordered choice: try each alternative from the same starting offset and
/// return the first success.
///
/// First match wins, so alternative order is semantically significant. A
/// `Fatal` from any alternative propagates immediately. When every
/// alternative misses, the misses that reached deepest into the input are
/// reported, since they are the most specific.
pub(crate) fn choice<T: 'static>(rules: Vec<Rule<T>>) -> Rule<T> {
    Rule::new(move |input, offset| {
        let mut deepest = offset;
        let mut expected: Vec<String> = Vec::new();
        let mut span = Span::new(offset, offset);
        for rule in &rules {
            match rule.apply(input, offset) {
                Outcome::Ok(v, end) => return Outcome::Ok(v, end),
                Outcome::Fatal(f) => return Outcome::Fatal(f),
                Outcome::Miss(f) => {
                    if f.offset > deepest || expected.is_empty() {
                        deepest = f.offset;
                        span = f.span;
                        expected.clear();
                        expected.push(f.expected);
                    } else if f.offset == deepest && !expected.contains(&f.expected) {
                        expected.push(f.expected);
                    }
                }
            }
        }
        if expected.is_empty() {
            expected.push("one of no alternatives".to_string());
        }
        Outcome::Miss(Failure {
            span,
            offset: deepest,
            expected: expected.join(" or "),
        })
    })
}

/// Apply `p` zero or more times, collecting the results.
///
/// Always succeeds; the final failing attempt consumes nothing. A `Fatal`
/// from any repetition still aborts.
pub(crate) fn many<T: 'static>(p: Rule<T>) -> Rule<Vec<T>> {
    Rule::new(move |input, offset| {
        let mut items = Vec::new();
        let mut at = offset;
        loop {
            match p.apply(input, at) {
                Outcome::Ok(v, end) => {
                    items.push(v);
                    // A rule that consumes nothing would repeat forever.
                    if end == at {
                        return Outcome::Ok(items, at);
                    }
                    at = end;
                }
                Outcome::Miss(_) => return Outcome::Ok(items, at),
                Outcome::Fatal(f) => return Outcome::Fatal(f),
            }
        }
    })
}

/// Apply `p` at least once, collecting the results.
pub(crate) fn one_or_more<T: 'static>(p: Rule<T>) -> Rule<Vec<T>> {
    map(then(p.clone(), many(p)), |(first, mut rest), _| {
        rest.insert(0, first);
        rest
    })
}

/// Apply `item` repeatedly until `terminator` matches.
///
/// The terminator is probed *before* each item application; on a match its
/// input is consumed but its value is excluded from the collected results.
/// Misses if the input is exhausted (or `item` stops matching) before the
/// terminator ever matches, reporting the terminator as the expectation.
pub(crate) fn take_until<I: 'static, T: 'static>(
    item: Rule<I>,
    terminator: Rule<T>,
) -> Rule<Vec<I>> {
    Rule::new(move |input, offset| {
        let mut items = Vec::new();
        let mut at = offset;
        loop {
            let stop = match terminator.apply(input, at) {
                Outcome::Ok(_, end) => return Outcome::Ok(items, end),
                Outcome::Fatal(f) => return Outcome::Fatal(f),
                Outcome::Miss(f) => f,
            };
            match item.apply(input, at) {
                Outcome::Ok(v, end) => {
                    if end == at {
                        return Outcome::Miss(stop);
                    }
                    items.push(v);
                    at = end;
                }
                // The terminator's expectation is the informative one.
                Outcome::Miss(_) => {
                    return Outcome::Miss(Failure {
                        span: Span::new(offset, at),
                        offset: at,
                        expected: stop.expected,
                    })
                }
                Outcome::Fatal(f) => return Outcome::Fatal(f),
            }
        }
    })
}

/// Transform `p`'s value on success. The callback also receives the span of
/// input the value was matched from.
pub(crate) fn map<T: 'static, U: 'static>(
    p: Rule<T>,
    f: impl Fn(T, Span) -> U + Send + Sync + 'static,
) -> Rule<U> {
    Rule::new(move |input, offset| match p.apply(input, offset) {
        Outcome::Ok(v, end) => Outcome::Ok(f(v, Span::new(offset, end)), end),
        Outcome::Miss(fail) => Outcome::Miss(fail),
        Outcome::Fatal(fail) => Outcome::Fatal(fail),
    })
}

/// Transform `p`'s value on success, with the callback able to reject the
/// match. A rejection is a *fatal* failure: it propagates past any enclosing
/// choice instead of triggering backtracking.
pub(crate) fn try_map<T: 'static, U: 'static>(
    p: Rule<T>,
    f: impl Fn(T, Span) -> Result<U, String> + Send + Sync + 'static,
) -> Rule<U> {
    Rule::new(move |input, offset| match p.apply(input, offset) {
        Outcome::Ok(v, end) => {
            let span = Span::new(offset, end);
            match f(v, span) {
                Ok(u) => Outcome::Ok(u, end),
                Err(expected) => Outcome::Fatal(Failure {
                    span,
                    offset,
                    expected,
                }),
            }
        }
        Outcome::Miss(fail) => Outcome::Miss(fail),
        Outcome::Fatal(fail) => Outcome::Fatal(fail),
    })
}

/// Discard `p`'s value, substituting a fixed constant.
pub(crate) fn map_to<T: 'static, U: Clone + Send + Sync + 'static>(
    p: Rule<T>,
    value: U,
) -> Rule<U> {
    map(p, move |_, _| value.clone())
}

/// A rule whose behavior is bound after construction.
///
/// Breaks definition cycles in recursive grammars: lists and dictionaries
/// contain values, and values contain lists and dictionaries. The slot is
/// bound exactly once; applying the rule before binding, or binding twice,
/// is a programming error and panics.
pub(crate) struct Deferred<T> {
    slot: Arc<OnceLock<Rule<T>>>,
}

impl<T: 'static> Deferred<T> {
    pub fn new() -> Self {
        Deferred {
            slot: Arc::new(OnceLock::new()),
        }
    }

    /// The forward-declared rule, usable before the slot is bound.
    pub fn rule(&self) -> Rule<T> {
        let slot = Arc::clone(&self.slot);
        Rule::new(move |input, offset| {
            let rule = slot.get().expect("deferred rule applied before bind");
            rule.apply(input, offset)
        })
    }

    /// Fix the rule's behavior.
    pub fn bind(&self, rule: Rule<T>) {
        if self.slot.set(rule).is_err() {
            panic!("deferred rule bound twice");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expect_ok<T: std::fmt::Debug + PartialEq>(outcome: Outcome<T>, value: T, end: usize) {
        match outcome {
            Outcome::Ok(v, at) => {
                assert_eq!(v, value);
                assert_eq!(at, end);
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    fn expect_miss<T: std::fmt::Debug>(outcome: Outcome<T>) -> Failure {
        match outcome {
            Outcome::Miss(f) => f,
            other => panic!("expected miss, got {:?}", other),
        }
    }

    #[test]
    fn any_char_consumes_one_character() {
        expect_ok(run(&any_char(), "ab"), 'a', 1);
    }

    #[test]
    fn any_char_handles_multibyte_characters() {
        expect_ok(run(&any_char(), "é"), 'é', 2);
    }

    #[test]
    fn any_char_misses_at_end_of_input() {
        let failure = expect_miss(run(&any_char(), ""));
        assert_eq!(failure.offset, 0);
        assert_eq!(failure.expected, "any character");
    }

    #[test]
    fn literal_matches_exactly() {
        expect_ok(run(&literal("null"), "null!"), "null", 4);
    }

    #[test]
    fn literal_misses_without_consuming() {
        let failure = expect_miss(run(&literal("null"), "nul"));
        assert_eq!(failure.offset, 0);
    }

    #[test]
    fn satisfy_matches_by_predicate() {
        let digit = satisfy(|c| c.is_ascii_digit(), "a digit");
        expect_ok(run(&digit, "7x"), '7', 1);
        expect_miss(run(&digit, "x7"));
    }

    #[test]
    fn then_threads_the_cursor() {
        let rule = then(literal("a"), literal("b"));
        expect_ok(run(&rule, "ab"), ("a", "b"), 2);
        expect_miss(run(&rule, "ax"));
    }

    #[test]
    fn projections_select_sub_results() {
        expect_ok(run(&take_left(literal("a"), literal("b")), "ab"), "a", 2);
        expect_ok(run(&take_right(literal("a"), literal("b")), "ab"), "b", 2);
        expect_ok(
            run(&take_mid(literal("("), literal("x"), literal(")")), "(x)"),
            "x",
            3,
        );
        expect_ok(
            run(
                &take_sides(literal("a"), literal(" "), literal("b")),
                "a b",
            ),
            ("a", "b"),
            3,
        );
    }

    #[test]
    fn choice_returns_first_match() {
        let rule = choice(vec![literal("aa"), literal("a")]);
        expect_ok(run(&rule, "aa"), "aa", 2);
        expect_ok(run(&rule, "ab"), "a", 1);
    }

    #[test]
    fn choice_never_consumes_from_a_failing_alternative() {
        // The first alternative consumes "ab" internally before failing;
        // the second must still see the input from the starting offset.
        let rule = choice(vec![
            map(then(literal("ab"), literal("X")), |_, _| "first"),
            map(literal("abc"), |_, _| "second"),
        ]);
        expect_ok(run(&rule, "abc"), "second", 3);
    }

    #[test]
    fn choice_reports_the_deepest_miss() {
        let rule = choice(vec![
            map(literal("x"), |_, _| ()),
            map(then(literal("ab"), literal("Y")), |_, _| ()),
        ]);
        let failure = expect_miss(run(&rule, "abZ"));
        assert_eq!(failure.offset, 2);
        assert_eq!(failure.expected, "\"Y\"");
    }

    #[test]
    fn choice_joins_expectations_at_the_same_depth() {
        let rule = choice(vec![literal("true"), literal("false")]);
        let failure = expect_miss(run(&rule, "nope"));
        assert_eq!(failure.expected, "\"true\" or \"false\"");
    }

    #[test]
    fn many_accepts_zero_repetitions() {
        let rule = many(literal("a"));
        expect_ok(run(&rule, ""), vec![], 0);
        expect_ok(run(&rule, "bbb"), vec![], 0);
    }

    #[test]
    fn many_stops_at_the_last_success() {
        let rule = many(literal("ab"));
        expect_ok(run(&rule, "ababa"), vec!["ab", "ab"], 4);
    }

    #[test]
    fn one_or_more_requires_a_first_match() {
        let rule = one_or_more(literal("a"));
        expect_ok(run(&rule, "aab"), vec!["a", "a"], 2);
        expect_miss(run(&rule, "b"));
    }

    #[test]
    fn take_until_consumes_but_excludes_the_terminator() {
        let rule = take_until(any_char(), literal(";"));
        expect_ok(run(&rule, "ab;c"), vec!['a', 'b'], 3);
    }

    #[test]
    fn take_until_matches_an_empty_body() {
        let rule = take_until(any_char(), literal(";"));
        expect_ok(run(&rule, ";"), vec![], 1);
    }

    #[test]
    fn take_until_misses_when_the_terminator_never_appears() {
        let rule = take_until(any_char(), literal(";"));
        let failure = expect_miss(run(&rule, "abc"));
        assert_eq!(failure.offset, 3);
        assert_eq!(failure.expected, "\";\"");
    }

    #[test]
    fn map_receives_the_matched_span() {
        let rule = map(literal("ab"), |_, span| (span.start, span.end));
        expect_ok(run(&rule, "ab"), (0, 2), 2);
    }

    #[test]
    fn map_to_substitutes_a_constant() {
        expect_ok(run(&map_to(literal("yes"), 1u8), "yes"), 1u8, 3);
    }

    #[test]
    fn try_map_rejection_is_fatal_and_skips_remaining_alternatives() {
        let poisoned = try_map(literal("a"), |_, _| Err::<(), _>("rejected".to_string()));
        let rule = choice(vec![poisoned, map_to(literal("a"), ())]);
        match run(&rule, "a") {
            Outcome::Fatal(f) => assert_eq!(f.expected, "rejected"),
            other => panic!("expected fatal, got {:?}", other),
        }
    }

    #[test]
    fn deferred_rule_resolves_after_binding() {
        let slot = Deferred::new();
        let rule = slot.rule();
        slot.bind(literal("x"));
        expect_ok(run(&rule, "x"), "x", 1);
    }

    #[test]
    #[should_panic(expected = "applied before bind")]
    fn deferred_rule_panics_before_binding() {
        let slot = Deferred::<()>::new();
        let rule = slot.rule();
        let _ = run(&rule, "x");
    }

    #[test]
    #[should_panic(expected = "bound twice")]
    fn deferred_rule_panics_on_double_bind() {
        let slot = Deferred::new();
        slot.bind(literal("x"));
        slot.bind(literal("y"));
    }

    #[test]
    fn end_of_input_consumes_nothing() {
        expect_ok(run(&end_of_input(), ""), (), 0);
        expect_miss(run(&end_of_input(), "a"));
    }

    #[test]
    fn position_reports_one_based_line_and_column() {
        let scanner = Scanner::new("ab\ncd");
        assert_eq!(scanner.position(0), (1, 1));
        assert_eq!(scanner.position(2), (1, 3));
        assert_eq!(scanner.position(3), (2, 1));
        assert_eq!(scanner.position(5), (2, 3));
    }
}
