//! Recursive-descent parser for the query dialect.
//!
//! Precedence, loosest to tightest: comparisons, `+`/`-`, `*`/`/`/`%`,
//! unary sign, primaries. Range selectors (`metric[5m]`) are accepted only
//! as the direct argument of a range function.

use ruletest_series::{CompactDuration, METRIC_NAME_LABEL};

use crate::ast::{AggOp, BinOp, Expr, MatchOp, Matcher, RangeFunc, VectorSelector};
use crate::error::{QueryError, Result};

/// Vector-matching and set-operator keywords the dialect rejects outright.
const VECTOR_MATCHING_KEYWORDS: [&str; 7] = [
    "on",
    "ignoring",
    "group_left",
    "group_right",
    "and",
    "or",
    "unless",
];

/// Parses an expression without evaluating it.
pub fn parse(expr: &str) -> Result<Expr> {
    let mut parser = Parser::new(expr);
    parser.skip_ws();
    let parsed = parser.parse_expression()?;
    parser.skip_ws();
    if !parser.at_end() {
        // Name set operators in the error instead of a bare trailing-input
        // complaint.
        if let Some(word) = parser.peek_ident() {
            if VECTOR_MATCHING_KEYWORDS.contains(&word.as_str()) {
                return Err(QueryError::Unsupported {
                    reason: format!("vector matching operator '{word}'"),
                });
            }
        }
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(parsed)
}

struct Parser<'a> {
    text: &'a str,
    chars: Vec<(usize, char)>,
    index: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            chars: text.char_indices().collect(),
            index: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.index).map(|(_, c)| *c)
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.index + ahead).map(|(_, c)| *c)
    }

    fn bump(&mut self) -> Option<char> {
        let next = self.peek();
        if next.is_some() {
            self.index += 1;
        }
        next
    }

    fn at_end(&self) -> bool {
        self.index >= self.chars.len()
    }

    /// Byte offset of the cursor, for error reporting.
    fn offset(&self) -> usize {
        self.chars
            .get(self.index)
            .map_or(self.text.len(), |(offset, _)| *offset)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.index += 1;
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{expected}'")))
        }
    }

    fn error(&self, reason: &str) -> QueryError {
        self.error_at(self.offset(), reason)
    }

    fn error_at(&self, offset: usize, reason: &str) -> QueryError {
        QueryError::Parse {
            expr: self.text.to_string(),
            offset,
            reason: reason.to_string(),
        }
    }

    fn is_ident_start(c: char) -> bool {
        c.is_ascii_alphabetic() || c == '_' || c == ':'
    }

    fn is_ident_char(c: char) -> bool {
        c.is_ascii_alphanumeric() || c == '_' || c == ':'
    }

    fn scan_ident(&mut self) -> Option<String> {
        if !matches!(self.peek(), Some(c) if Self::is_ident_start(c)) {
            return None;
        }
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if Self::is_ident_char(c) {
                word.push(c);
                self.index += 1;
            } else {
                break;
            }
        }
        Some(word)
    }

    /// Reads the next identifier without consuming it.
    fn peek_ident(&self) -> Option<String> {
        let mut index = self.index;
        let mut word = String::new();
        while let Some((_, c)) = self.chars.get(index) {
            let c = *c;
            if word.is_empty() {
                if !Self::is_ident_start(c) {
                    return None;
                }
            } else if !Self::is_ident_char(c) {
                break;
            }
            word.push(c);
            index += 1;
        }
        if word.is_empty() { None } else { Some(word) }
    }

    fn parse_expression(&mut self) -> Result<Expr> {
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_additive()?;
        loop {
            self.skip_ws();
            let (op, width) = match (self.peek(), self.peek_at(1)) {
                (Some('='), Some('=')) => (BinOp::Eq, 2),
                (Some('!'), Some('=')) => (BinOp::Ne, 2),
                (Some('>'), Some('=')) => (BinOp::Ge, 2),
                (Some('<'), Some('=')) => (BinOp::Le, 2),
                (Some('>'), _) => (BinOp::Gt, 1),
                (Some('<'), _) => (BinOp::Lt, 1),
                _ => break,
            };
            self.index += width;
            self.skip_ws();
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            self.skip_ws();
            let op = match self.peek() {
                Some('+') => BinOp::Add,
                Some('-') => BinOp::Sub,
                _ => break,
            };
            self.index += 1;
            self.skip_ws();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            self.skip_ws();
            let op = match self.peek() {
                Some('*') => BinOp::Mul,
                Some('/') => BinOp::Div,
                Some('%') => BinOp::Mod,
                _ => break,
            };
            self.index += 1;
            self.skip_ws();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        self.skip_ws();
        if self.eat('-') {
            self.skip_ws();
            return Ok(Expr::Neg(Box::new(self.parse_unary()?)));
        }
        if self.eat('+') {
            self.skip_ws();
            return self.parse_unary();
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        self.skip_ws();
        let Some(next) = self.peek() else {
            return Err(self.error("unexpected end of expression"));
        };

        if next == '(' {
            self.index += 1;
            let inner = self.parse_expression()?;
            self.skip_ws();
            self.expect(')')?;
            return self.check_range_suffix(inner);
        }
        if next == '{' {
            let selector = self.parse_selector(None)?;
            return self.check_range_suffix(Expr::Selector(selector));
        }
        if next.is_ascii_digit() || next == '.' {
            let number = self.scan_number()?;
            return Ok(Expr::Number(number));
        }
        if Self::is_ident_start(next) {
            return self.parse_ident_expr();
        }
        Err(self.error(&format!("unexpected character '{next}'")))
    }

    /// Rejects a trailing `[range]` anywhere a range function did not ask
    /// for one.
    fn check_range_suffix(&mut self, expr: Expr) -> Result<Expr> {
        self.skip_ws();
        if self.peek() == Some('[') {
            return Err(self.error(
                "range selector is only valid as the argument of a range function",
            ));
        }
        Ok(expr)
    }

    fn parse_ident_expr(&mut self) -> Result<Expr> {
        let start = self.offset();
        let Some(word) = self.scan_ident() else {
            return Err(self.error("expected identifier"));
        };

        if word.eq_ignore_ascii_case("inf") || word.eq_ignore_ascii_case("infinity") {
            return Ok(Expr::Number(f64::INFINITY));
        }
        if word.eq_ignore_ascii_case("nan") {
            return Ok(Expr::Number(f64::NAN));
        }

        if let Some(op) = AggOp::from_name(&word) {
            return self.parse_aggregate(op);
        }

        self.skip_ws();
        if self.peek() == Some('(') {
            if let Some(func) = RangeFunc::from_name(&word) {
                return self.parse_range_call(func);
            }
            if word == "timestamp" {
                self.index += 1;
                let arg = self.parse_expression()?;
                self.skip_ws();
                self.expect(')')?;
                if arg.is_scalar() {
                    return Err(QueryError::Unsupported {
                        reason: "timestamp() requires a vector argument".to_string(),
                    });
                }
                return self.check_range_suffix(Expr::Timestamp(Box::new(arg)));
            }
            if word == "vector" {
                self.index += 1;
                let arg = self.parse_expression()?;
                self.skip_ws();
                self.expect(')')?;
                if !arg.is_scalar() {
                    return Err(QueryError::Unsupported {
                        reason: "vector() requires a scalar argument".to_string(),
                    });
                }
                return self.check_range_suffix(Expr::VectorLift(Box::new(arg)));
            }
            return Err(self.error_at(start, &format!("unknown function '{word}'")));
        }

        if VECTOR_MATCHING_KEYWORDS.contains(&word.as_str()) || word == "by" || word == "without" {
            return Err(self.error_at(start, &format!("unexpected keyword '{word}'")));
        }

        let selector = self.parse_selector(Some(word))?;
        self.check_range_suffix(Expr::Selector(selector))
    }

    fn parse_aggregate(&mut self, op: AggOp) -> Result<Expr> {
        self.skip_ws();
        let mut by = None;
        if let Some(word) = self.peek_ident() {
            if word == "without" {
                return Err(QueryError::Unsupported {
                    reason: "aggregation modifier 'without'".to_string(),
                });
            }
            if word == "by" {
                let _ = self.scan_ident();
                self.skip_ws();
                by = Some(self.parse_label_list()?);
                self.skip_ws();
            }
        }
        self.expect('(')?;
        let arg = self.parse_expression()?;
        self.skip_ws();
        self.expect(')')?;
        if by.is_none() {
            self.skip_ws();
            if let Some(word) = self.peek_ident() {
                if word == "without" {
                    return Err(QueryError::Unsupported {
                        reason: "aggregation modifier 'without'".to_string(),
                    });
                }
                if word == "by" {
                    let _ = self.scan_ident();
                    self.skip_ws();
                    by = Some(self.parse_label_list()?);
                }
            }
        }
        if arg.is_scalar() {
            return Err(QueryError::Unsupported {
                reason: format!("aggregating a scalar with {}", op.name()),
            });
        }
        Ok(Expr::Aggregate {
            op,
            by: by.unwrap_or_default(),
            arg: Box::new(arg),
        })
    }

    fn parse_label_list(&mut self) -> Result<Vec<String>> {
        self.expect('(')?;
        let mut labels = Vec::new();
        loop {
            self.skip_ws();
            if self.eat(')') {
                break;
            }
            let Some(label) = self.scan_ident() else {
                return Err(self.error("expected label name"));
            };
            labels.push(label);
            self.skip_ws();
            if self.eat(',') {
                continue;
            }
            self.expect(')')?;
            break;
        }
        Ok(labels)
    }

    fn parse_range_call(&mut self, func: RangeFunc) -> Result<Expr> {
        self.expect('(')?;
        self.skip_ws();
        let selector = if self.peek() == Some('{') {
            self.parse_selector(None)?
        } else {
            let Some(name) = self.scan_ident() else {
                return Err(self.error("expected a series selector"));
            };
            self.parse_selector(Some(name))?
        };
        self.skip_ws();
        self.expect('[')?;
        let range = self.parse_range_duration()?;
        self.skip_ws();
        self.expect(')')?;
        self.check_range_suffix(Expr::RangeCall {
            func,
            selector,
            range,
        })
    }

    fn parse_range_duration(&mut self) -> Result<CompactDuration> {
        let start = self.offset();
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c == ']' {
                break;
            }
            text.push(c);
            self.index += 1;
        }
        if !self.eat(']') {
            return Err(self.error("expected ']'"));
        }
        let range: CompactDuration = text
            .trim()
            .parse()
            .map_err(|e: ruletest_series::SeriesError| self.error_at(start, &e.to_string()))?;
        if range.is_zero() {
            return Err(self.error_at(start, "range duration must be positive"));
        }
        Ok(range)
    }

    fn parse_selector(&mut self, name: Option<String>) -> Result<VectorSelector> {
        let mut matchers = Vec::new();
        if let Some(name) = name {
            let matcher = Matcher::new(METRIC_NAME_LABEL, MatchOp::Equal, name)
                .map_err(|e| self.error(&format!("invalid matcher: {e}")))?;
            matchers.push(matcher);
        }
        self.skip_ws();
        if self.eat('{') {
            loop {
                self.skip_ws();
                if self.eat('}') {
                    break;
                }
                let label_offset = self.offset();
                let Some(label) = self.scan_ident() else {
                    return Err(self.error("expected label name"));
                };
                self.skip_ws();
                let op = self.scan_match_op()?;
                self.skip_ws();
                let value = self.parse_quoted_string()?;
                let matcher = Matcher::new(label, op, value)
                    .map_err(|e| self.error_at(label_offset, &format!("invalid regex: {e}")))?;
                matchers.push(matcher);
                self.skip_ws();
                if self.eat(',') {
                    continue;
                }
                self.expect('}')?;
                break;
            }
        }
        if matchers.is_empty() {
            return Err(self.error("selector must contain at least one matcher"));
        }
        Ok(VectorSelector { matchers })
    }

    fn scan_match_op(&mut self) -> Result<MatchOp> {
        match (self.peek(), self.peek_at(1)) {
            (Some('='), Some('~')) => {
                self.index += 2;
                Ok(MatchOp::Regex)
            }
            (Some('='), _) => {
                self.index += 1;
                Ok(MatchOp::Equal)
            }
            (Some('!'), Some('=')) => {
                self.index += 2;
                Ok(MatchOp::NotEqual)
            }
            (Some('!'), Some('~')) => {
                self.index += 2;
                Ok(MatchOp::NotRegex)
            }
            _ => Err(self.error("expected one of '=', '!=', '=~', '!~'")),
        }
    }

    fn parse_quoted_string(&mut self) -> Result<String> {
        if !self.eat('"') {
            return Err(self.error("expected '\"'"));
        }
        let mut value = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some('"') => break,
                Some('\\') => match self.bump() {
                    Some('"') => value.push('"'),
                    Some('\\') => value.push('\\'),
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some(other) => {
                        return Err(self.error(&format!("unknown escape '\\{other}'")));
                    }
                    None => return Err(self.error("unterminated string")),
                },
                Some(c) => value.push(c),
            }
        }
        Ok(value)
    }

    fn scan_number(&mut self) -> Result<f64> {
        let start = self.offset();
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.index += 1;
        }
        if self.eat('.') {
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.index += 1;
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let saved = self.index;
            self.index += 1;
            if matches!(self.peek(), Some('+' | '-')) {
                self.index += 1;
            }
            let mut exponent_digits = false;
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.index += 1;
                exponent_digits = true;
            }
            if !exponent_digits {
                self.index = saved;
            }
        }
        let end = self.offset();
        let slice = &self.text[start..end];
        slice
            .parse::<f64>()
            .map_err(|_| self.error_at(start, &format!("invalid number '{slice}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(expr: &str) -> Expr {
        match parse(expr) {
            Ok(parsed) => parsed,
            Err(e) => panic!("expected '{expr}' to parse, got {e}"),
        }
    }

    fn parse_err(expr: &str) -> QueryError {
        match parse(expr) {
            Ok(parsed) => panic!("expected '{expr}' to fail, got {parsed:?}"),
            Err(e) => e,
        }
    }

    mod number_tests {
        use super::*;

        #[test]
        fn integer_and_float_literals() {
            for (text, value) in [("1", 1.0), ("2.5", 2.5), (".5", 0.5), ("1e3", 1000.0)] {
                match parse_ok(text) {
                    Expr::Number(parsed) => assert!((parsed - value).abs() < f64::EPSILON),
                    other => panic!("expected number for '{text}', got {other:?}"),
                }
            }
        }

        #[test]
        fn infinity_word_forms() {
            for text in ["Inf", "inf", "INFINITY"] {
                match parse_ok(text) {
                    Expr::Number(parsed) => assert!(parsed.is_infinite() && parsed > 0.0),
                    other => panic!("expected Inf for '{text}', got {other:?}"),
                }
            }
            match parse_ok("-Inf") {
                Expr::Neg(inner) => match *inner {
                    Expr::Number(parsed) => assert!(parsed.is_infinite()),
                    other => panic!("expected number, got {other:?}"),
                },
                other => panic!("expected negation, got {other:?}"),
            }
        }

        #[test]
        fn nan_word_form() {
            match parse_ok("NaN") {
                Expr::Number(parsed) => assert!(parsed.is_nan()),
                other => panic!("expected NaN, got {other:?}"),
            }
        }

        #[test]
        fn lone_dot_is_rejected() {
            match parse_err(".") {
                QueryError::Parse { reason, .. } => assert!(reason.contains("invalid number")),
                other => panic!("expected parse error, got {other:?}"),
            }
        }
    }

    mod selector_tests {
        use super::*;

        fn selector_of(expr: &str) -> VectorSelector {
            match parse_ok(expr) {
                Expr::Selector(selector) => selector,
                other => panic!("expected selector for '{expr}', got {other:?}"),
            }
        }

        #[test]
        fn bare_metric_name() {
            let selector = selector_of("up");
            assert_eq!(selector.name(), Some("up"));
            assert_eq!(selector.matchers.len(), 1);
        }

        #[test]
        fn recording_rule_names_contain_colons() {
            let selector = selector_of("job:errors:rate5m");
            assert_eq!(selector.name(), Some("job:errors:rate5m"));
        }

        #[test]
        fn name_with_matchers() {
            let selector = selector_of("up{job=\"api\", env!=\"dev\"}");
            assert_eq!(selector.name(), Some("up"));
            assert_eq!(selector.matchers.len(), 3);
        }

        #[test]
        fn nameless_matcher_selector() {
            let selector = selector_of("{job=~\"api.*\"}");
            assert_eq!(selector.name(), None);
            assert_eq!(selector.matchers.len(), 1);
        }

        #[test]
        fn trailing_comma_is_allowed() {
            let selector = selector_of("up{job=\"api\",}");
            assert_eq!(selector.matchers.len(), 2);
        }

        #[test]
        fn string_escapes() {
            let selector = selector_of("up{path=\"C:\\\\data\\n\"}");
            let matcher = &selector.matchers[1];
            assert_eq!(matcher.value, "C:\\data\n");
        }

        #[test]
        fn empty_selector_is_rejected() {
            match parse_err("{}") {
                QueryError::Parse { reason, .. } => {
                    assert!(reason.contains("at least one matcher"));
                }
                other => panic!("expected parse error, got {other:?}"),
            }
        }

        #[test]
        fn missing_value_is_rejected() {
            assert!(matches!(
                parse_err("up{job=}"),
                QueryError::Parse { .. }
            ));
        }

        #[test]
        fn unterminated_braces_are_rejected() {
            assert!(matches!(
                parse_err("up{job=\"x\""),
                QueryError::Parse { .. }
            ));
        }

        #[test]
        fn invalid_regex_is_rejected() {
            match parse_err("up{job=~\"a(\"}") {
                QueryError::Parse { reason, .. } => assert!(reason.contains("invalid regex")),
                other => panic!("expected parse error, got {other:?}"),
            }
        }
    }

    mod function_tests {
        use super::*;

        #[test]
        fn range_call_with_duration() {
            match parse_ok("rate(up[5m])") {
                Expr::RangeCall {
                    func,
                    selector,
                    range,
                } => {
                    assert_eq!(func, RangeFunc::Rate);
                    assert_eq!(selector.name(), Some("up"));
                    assert_eq!(range.millis(), 300_000);
                }
                other => panic!("expected range call, got {other:?}"),
            }
        }

        #[test]
        fn range_call_with_matchers() {
            match parse_ok("count_over_time({job=\"api\"}[1h30m])") {
                Expr::RangeCall { func, range, .. } => {
                    assert_eq!(func, RangeFunc::CountOverTime);
                    assert_eq!(range.millis(), 5_400_000);
                }
                other => panic!("expected range call, got {other:?}"),
            }
        }

        #[test]
        fn range_outside_function_is_rejected() {
            match parse_err("up[5m]") {
                QueryError::Parse { reason, .. } => assert!(reason.contains("range selector")),
                other => panic!("expected parse error, got {other:?}"),
            }
        }

        #[test]
        fn range_function_requires_a_range() {
            assert!(matches!(parse_err("rate(up)"), QueryError::Parse { .. }));
        }

        #[test]
        fn zero_range_is_rejected() {
            match parse_err("rate(up[0])") {
                QueryError::Parse { reason, .. } => assert!(reason.contains("positive")),
                other => panic!("expected parse error, got {other:?}"),
            }
        }

        #[test]
        fn bad_range_duration_is_rejected() {
            match parse_err("rate(up[5q])") {
                QueryError::Parse { reason, .. } => assert!(reason.contains("invalid duration")),
                other => panic!("expected parse error, got {other:?}"),
            }
        }

        #[test]
        fn unknown_function_is_rejected() {
            match parse_err("floor(up)") {
                QueryError::Parse { reason, .. } => {
                    assert!(reason.contains("unknown function 'floor'"));
                }
                other => panic!("expected parse error, got {other:?}"),
            }
        }

        #[test]
        fn timestamp_takes_a_vector() {
            assert!(matches!(parse_ok("timestamp(up)"), Expr::Timestamp(_)));
            assert!(matches!(
                parse_err("timestamp(1)"),
                QueryError::Unsupported { .. }
            ));
        }

        #[test]
        fn vector_takes_a_scalar() {
            assert!(matches!(parse_ok("vector(0)"), Expr::VectorLift(_)));
            assert!(matches!(parse_ok("vector(1 + 2)"), Expr::VectorLift(_)));
            assert!(matches!(
                parse_err("vector(up)"),
                QueryError::Unsupported { .. }
            ));
        }
    }

    mod aggregation_tests {
        use super::*;

        #[test]
        fn plain_aggregation() {
            match parse_ok("sum(up)") {
                Expr::Aggregate { op, by, .. } => {
                    assert_eq!(op, AggOp::Sum);
                    assert!(by.is_empty());
                }
                other => panic!("expected aggregation, got {other:?}"),
            }
        }

        #[test]
        fn prefix_by_clause() {
            match parse_ok("sum by (job, env) (up)") {
                Expr::Aggregate { by, .. } => assert_eq!(by, vec!["job", "env"]),
                other => panic!("expected aggregation, got {other:?}"),
            }
        }

        #[test]
        fn postfix_by_clause() {
            match parse_ok("count(up) by (job)") {
                Expr::Aggregate { op, by, .. } => {
                    assert_eq!(op, AggOp::Count);
                    assert_eq!(by, vec!["job"]);
                }
                other => panic!("expected aggregation, got {other:?}"),
            }
        }

        #[test]
        fn empty_by_clause() {
            match parse_ok("sum by () (up)") {
                Expr::Aggregate { by, .. } => assert!(by.is_empty()),
                other => panic!("expected aggregation, got {other:?}"),
            }
        }

        #[test]
        fn without_is_unsupported() {
            assert!(matches!(
                parse_err("sum without (job) (up)"),
                QueryError::Unsupported { .. }
            ));
        }

        #[test]
        fn aggregating_a_scalar_is_unsupported() {
            assert!(matches!(
                parse_err("avg(1)"),
                QueryError::Unsupported { .. }
            ));
        }
    }

    mod binary_tests {
        use super::*;

        #[test]
        fn comparison_binds_loosest() {
            match parse_ok("up + 1 > 2") {
                Expr::Binary { op, lhs, .. } => {
                    assert_eq!(op, BinOp::Gt);
                    assert!(matches!(
                        *lhs,
                        Expr::Binary {
                            op: BinOp::Add,
                            ..
                        }
                    ));
                }
                other => panic!("expected comparison, got {other:?}"),
            }
        }

        #[test]
        fn multiplication_binds_tighter_than_addition() {
            match parse_ok("1 + 2 * 3") {
                Expr::Binary { op, rhs, .. } => {
                    assert_eq!(op, BinOp::Add);
                    assert!(matches!(
                        *rhs,
                        Expr::Binary {
                            op: BinOp::Mul,
                            ..
                        }
                    ));
                }
                other => panic!("expected addition, got {other:?}"),
            }
        }

        #[test]
        fn parens_override_precedence() {
            match parse_ok("(1 + 2) * 3") {
                Expr::Binary { op, lhs, .. } => {
                    assert_eq!(op, BinOp::Mul);
                    assert!(matches!(
                        *lhs,
                        Expr::Binary {
                            op: BinOp::Add,
                            ..
                        }
                    ));
                }
                other => panic!("expected multiplication, got {other:?}"),
            }
        }

        #[test]
        fn set_operators_are_unsupported() {
            for expr in ["up and up", "up or up", "up unless up"] {
                assert!(
                    matches!(parse_err(expr), QueryError::Unsupported { .. }),
                    "expected unsupported for '{expr}'"
                );
            }
        }

        #[test]
        fn trailing_input_is_rejected() {
            match parse_err("up up") {
                QueryError::Parse { offset, reason, .. } => {
                    assert_eq!(offset, 3);
                    assert!(reason.contains("trailing"));
                }
                other => panic!("expected parse error, got {other:?}"),
            }
        }
    }

    mod robustness_tests {
        use super::*;
        use test_case::test_case;

        #[test_case(""; "empty expression")]
        #[test_case("()"; "empty parens")]
        #[test_case("1 +"; "dangling operator")]
        #[test_case("rate(up[5m]"; "unclosed call")]
        #[test_case("sum by (job (up)"; "unclosed by list")]
        #[test_case("up{"; "unclosed matcher block")]
        #[test_case("up{job=\"api"; "unterminated string")]
        fn truncated_expressions_fail(expr: &str) {
            assert!(parse(expr).is_err(), "expected '{expr}' to fail");
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn arbitrary_input_never_panics(expr in "\\PC{0,60}") {
                let _ = parse(&expr);
            }

            #[test]
            fn generated_selectors_parse(
                name in "m_[a-z0-9_]{0,20}",
                label in "[a-z][a-z0-9_]{0,10}",
                value in "[a-zA-Z0-9 .:-]{0,12}",
            ) {
                let expr = format!("{name}{{{label}=\"{value}\"}}");
                match parse(&expr) {
                    Ok(Expr::Selector(selector)) => {
                        prop_assert_eq!(selector.name(), Some(name.as_str()));
                        prop_assert_eq!(selector.matchers.len(), 2);
                        prop_assert_eq!(selector.matchers[1].value.as_str(), value.as_str());
                    }
                    other => prop_assert!(false, "'{}' gave {:?}", expr, other),
                }
            }
        }
    }
}
