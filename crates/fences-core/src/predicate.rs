//! Filter expressions over entity metrics.
//!
//! Filters are written as strings in configuration, e.g.
//! `not has(is_interface) and class_complexity <> 0`, and evaluated with
//! three-valued logic: a comparison against a metric the entity does not
//! carry is unknown, and only entities for which the filter is definitely
//! true are kept.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::PredicateError;
use crate::model::CodeEntity;

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?P<num>-?\d+(?:\.\d+)?)|(?P<ident>[A-Za-z_][A-Za-z0-9_]*)|(?P<op><>|!=|==|<=|>=|=|<|>)|(?P<lparen>\()|(?P<rparen>\)))",
    )
    .expect("token pattern is valid")
});

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn apply(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            CmpOp::Eq => lhs == rhs,
            CmpOp::Ne => lhs != rhs,
            CmpOp::Lt => lhs < rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Gt => lhs > rhs,
            CmpOp::Ge => lhs >= rhs,
        }
    }

    fn parse(op: &str) -> Option<Self> {
        match op {
            "=" | "==" => Some(CmpOp::Eq),
            "<>" | "!=" => Some(CmpOp::Ne),
            "<" => Some(CmpOp::Lt),
            "<=" => Some(CmpOp::Le),
            ">" => Some(CmpOp::Gt),
            ">=" => Some(CmpOp::Ge),
            _ => None,
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "<>",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        };
        f.write_str(s)
    }
}

/// A filter over the metrics of one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Predicate {
    /// Matches every entity.
    #[default]
    Always,
    /// The entity carries the metric.
    Has(String),
    /// The metric is present and nonzero.
    Truthy(String),
    Compare {
        property: String,
        op: CmpOp,
        value: f64,
    },
    Not(Box<Predicate>),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn parse(expr: &str) -> Result<Self, PredicateError> {
        let tokens = tokenize(expr)?;
        if tokens.is_empty() {
            return Ok(Predicate::Always);
        }
        let mut parser = Parser {
            expr,
            tokens,
            pos: 0,
        };
        let predicate = parser.parse_or()?;
        if let Some(tok) = parser.peek() {
            return Err(parser.error_at(tok.offset, format!("unexpected '{}'", tok.text)));
        }
        Ok(predicate)
    }

    pub fn has(property: &str) -> Self {
        Predicate::Has(property.to_string())
    }

    pub fn compare(property: &str, op: CmpOp, value: f64) -> Self {
        Predicate::Compare {
            property: property.to_string(),
            op,
            value,
        }
    }

    pub fn negate(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    /// Three-valued evaluation: `None` means unknown.
    pub fn evaluate(&self, entity: &CodeEntity) -> Option<bool> {
        match self {
            Predicate::Always => Some(true),
            Predicate::Has(property) => Some(entity.has_metric(property)),
            Predicate::Truthy(property) => entity.metric_value(property).map(|v| v != 0.0),
            Predicate::Compare {
                property,
                op,
                value,
            } => entity
                .metric_value(property)
                .map(|actual| op.apply(actual, *value)),
            Predicate::Not(inner) => inner.evaluate(entity).map(|b| !b),
            Predicate::And(parts) => {
                let mut result = Some(true);
                for part in parts {
                    match part.evaluate(entity) {
                        Some(false) => return Some(false),
                        None => result = None,
                        Some(true) => {}
                    }
                }
                result
            }
            Predicate::Or(parts) => {
                let mut result = Some(false);
                for part in parts {
                    match part.evaluate(entity) {
                        Some(true) => return Some(true),
                        None => result = None,
                        Some(false) => {}
                    }
                }
                result
            }
        }
    }

    /// True only when the filter definitely holds.
    pub fn matches(&self, entity: &CodeEntity) -> bool {
        self.evaluate(entity) == Some(true)
    }

    /// Render as an operand of `and`, which binds tighter than `or`.
    fn fmt_conjunct(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if matches!(self, Predicate::Or(parts) if parts.len() > 1) {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Always => f.write_str("true"),
            Predicate::Has(p) => write!(f, "has({p})"),
            Predicate::Truthy(p) => f.write_str(p),
            Predicate::Compare {
                property,
                op,
                value,
            } => write!(f, "{property} {op} {value}"),
            Predicate::Not(inner) => {
                f.write_str("not ")?;
                match inner.as_ref() {
                    Predicate::And(parts) | Predicate::Or(parts) if parts.len() > 1 => {
                        write!(f, "({inner})")
                    }
                    _ => write!(f, "{inner}"),
                }
            }
            Predicate::And(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" and ")?;
                    }
                    part.fmt_conjunct(f)?;
                }
                Ok(())
            }
            Predicate::Or(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" or ")?;
                    }
                    match part {
                        Predicate::Or(inner) if inner.len() > 1 => write!(f, "({part})")?,
                        _ => write!(f, "{part}")?,
                    }
                }
                Ok(())
            }
        }
    }
}

impl std::str::FromStr for Predicate {
    type Err = PredicateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Predicate::parse(s)
    }
}

impl TryFrom<String> for Predicate {
    type Error = PredicateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Predicate::parse(&value)
    }
}

impl From<Predicate> for String {
    fn from(value: Predicate) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(f64),
    Ident,
    Op,
    LParen,
    RParen,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    text: String,
    offset: usize,
}

fn tokenize(expr: &str) -> Result<Vec<Token>, PredicateError> {
    let mut tokens = Vec::new();
    let mut offset = 0;

    while offset < expr.len() {
        let rest = &expr[offset..];
        let trimmed = rest.trim_start();
        if trimmed.is_empty() {
            break;
        }
        offset += rest.len() - trimmed.len();

        let Some(caps) = TOKEN.captures(trimmed) else {
            return Err(PredicateError {
                expr: expr.to_string(),
                offset,
                reason: format!("unexpected character '{}'", trimmed.chars().next().unwrap_or(' ')),
            });
        };

        let (kind, text) = if let Some(m) = caps.name("num") {
            let value = m.as_str().parse::<f64>().map_err(|e| PredicateError {
                expr: expr.to_string(),
                offset,
                reason: e.to_string(),
            })?;
            (TokenKind::Number(value), m.as_str())
        } else if let Some(m) = caps.name("ident") {
            (TokenKind::Ident, m.as_str())
        } else if let Some(m) = caps.name("op") {
            (TokenKind::Op, m.as_str())
        } else if let Some(m) = caps.name("lparen") {
            (TokenKind::LParen, m.as_str())
        } else if let Some(m) = caps.name("rparen") {
            (TokenKind::RParen, m.as_str())
        } else {
            unreachable!("token pattern has no other groups")
        };

        tokens.push(Token {
            kind,
            text: text.to_string(),
            offset,
        });
        offset += text.len();
    }

    Ok(tokens)
}

struct Parser<'a> {
    expr: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        self.peek()
            .is_some_and(|t| t.kind == TokenKind::Ident && t.text.eq_ignore_ascii_case(keyword))
    }

    fn error_at(&self, offset: usize, reason: impl Into<String>) -> PredicateError {
        PredicateError {
            expr: self.expr.to_string(),
            offset,
            reason: reason.into(),
        }
    }

    fn error_at_end(&self, reason: impl Into<String>) -> PredicateError {
        self.error_at(self.expr.len(), reason)
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, PredicateError> {
        match self.next() {
            Some(tok) if tok.kind == kind => Ok(tok),
            Some(tok) => Err(self.error_at(tok.offset, format!("expected {what}, found '{}'", tok.text))),
            None => Err(self.error_at_end(format!("expected {what}"))),
        }
    }

    fn parse_or(&mut self) -> Result<Predicate, PredicateError> {
        let mut parts = vec![self.parse_and()?];
        while self.peek_keyword("or") {
            self.pos += 1;
            parts.push(self.parse_and()?);
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Predicate::Or(parts)
        })
    }

    fn parse_and(&mut self) -> Result<Predicate, PredicateError> {
        let mut parts = Vec::new();
        push_flattened(&mut parts, self.parse_unary()?);
        while self.peek_keyword("and") {
            self.pos += 1;
            push_flattened(&mut parts, self.parse_unary()?);
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Predicate::And(parts)
        })
    }

    fn parse_unary(&mut self) -> Result<Predicate, PredicateError> {
        if self.peek_keyword("not") {
            self.pos += 1;
            return Ok(self.parse_unary()?.negate());
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Predicate, PredicateError> {
        let Some(tok) = self.next() else {
            return Err(self.error_at_end("expected a condition"));
        };

        match tok.kind {
            TokenKind::LParen => {
                let inner = self.parse_or()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::Ident if tok.text.eq_ignore_ascii_case("has") => {
                self.expect(TokenKind::LParen, "'(' after has")?;
                let property = self.expect(TokenKind::Ident, "a property name")?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(Predicate::Has(property.text))
            }
            TokenKind::Ident if tok.text.eq_ignore_ascii_case("true") => Ok(Predicate::Always),
            TokenKind::Ident if is_keyword(&tok.text) => {
                Err(self.error_at(tok.offset, format!("unexpected keyword '{}'", tok.text)))
            }
            TokenKind::Ident => {
                let is_op = self.peek().is_some_and(|t| t.kind == TokenKind::Op);
                if !is_op {
                    return Ok(Predicate::Truthy(tok.text));
                }
                let op_tok = self.expect(TokenKind::Op, "an operator")?;
                let op = CmpOp::parse(&op_tok.text)
                    .ok_or_else(|| self.error_at(op_tok.offset, "unknown operator"))?;
                match self.next() {
                    Some(Token {
                        kind: TokenKind::Number(value),
                        ..
                    }) => Ok(Predicate::Compare {
                        property: tok.text,
                        op,
                        value,
                    }),
                    Some(other) => Err(self.error_at(
                        other.offset,
                        format!("expected a number, found '{}'", other.text),
                    )),
                    None => Err(self.error_at_end("expected a number")),
                }
            }
            _ => Err(self.error_at(tok.offset, format!("unexpected '{}'", tok.text))),
        }
    }
}

fn is_keyword(word: &str) -> bool {
    ["and", "or", "not"]
        .iter()
        .any(|k| word.eq_ignore_ascii_case(k))
}

fn push_flattened(parts: &mut Vec<Predicate>, predicate: Predicate) {
    match predicate {
        Predicate::And(inner) => parts.extend(inner),
        other => parts.push(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CodeModel;

    fn class_with(metrics: &[(&str, f64)]) -> (CodeModel, crate::types::EntityId) {
        let mut model = CodeModel::new();
        let app = model.create_application("app");
        let class = model.create_class("C", app).unwrap();
        for (name, value) in metrics {
            model.attach_metric(class, name, *value).unwrap();
        }
        (model, class)
    }

    #[test]
    fn test_parse_catalog_filter() {
        let p = Predicate::parse("NOT HAS(is_interface) AND class_complexity <> 0").unwrap();
        assert_eq!(
            p,
            Predicate::And(vec![
                Predicate::has("is_interface").negate(),
                Predicate::compare("class_complexity", CmpOp::Ne, 0.0),
            ])
        );
    }

    #[test]
    fn test_parse_empty_is_always() {
        assert_eq!(Predicate::parse("").unwrap(), Predicate::Always);
        assert_eq!(Predicate::parse("   ").unwrap(), Predicate::Always);
        assert_eq!(Predicate::parse("true").unwrap(), Predicate::Always);
    }

    #[test]
    fn test_parse_precedence_and_parens() {
        let p = Predicate::parse("a > 1 or b < 2 and not c").unwrap();
        assert_eq!(
            p,
            Predicate::Or(vec![
                Predicate::compare("a", CmpOp::Gt, 1.0),
                Predicate::And(vec![
                    Predicate::compare("b", CmpOp::Lt, 2.0),
                    Predicate::Truthy("c".to_string()).negate(),
                ]),
            ])
        );

        let p = Predicate::parse("(a > 1 or b < 2) and c >= -1.5").unwrap();
        assert!(matches!(p, Predicate::And(ref parts) if parts.len() == 2));
    }

    #[test]
    fn test_parse_errors_report_offset() {
        let err = Predicate::parse("a >").unwrap_err();
        assert_eq!(err.offset, 3);

        let err = Predicate::parse("a > 1 and").unwrap_err();
        assert!(err.reason.contains("expected a condition"), "{err}");

        let err = Predicate::parse("a $ 1").unwrap_err();
        assert_eq!(err.offset, 2);

        let err = Predicate::parse("has(1)").unwrap_err();
        assert!(err.reason.contains("property name"), "{err}");

        let err = Predicate::parse("(a > 1").unwrap_err();
        assert!(err.reason.contains("')'"), "{err}");

        assert!(Predicate::parse("a > 1 b").is_err());
        assert!(Predicate::parse("a > b").is_err());
    }

    #[test]
    fn test_display_roundtrips() {
        for expr in [
            "not has(is_interface) and class_complexity <> 0",
            "number_of_implemented_interfaces > 1",
            "not has(is_interface) and number_of_lines > 0 and number_of_methods <> 0 and is_view_controller",
            "a > 1 or b < 2 and not c",
            "(a > 1 or b < 2) and c >= -1.5",
            "not (a = 1 or b = 2)",
            "true",
        ] {
            let parsed = Predicate::parse(expr).unwrap();
            let reparsed = Predicate::parse(&parsed.to_string()).unwrap();
            assert_eq!(parsed, reparsed, "roundtrip failed for '{expr}' -> '{parsed}'");
        }
    }

    #[test]
    fn test_evaluate_has_and_compare() {
        let (model, class) = class_with(&[("class_complexity", 5.0)]);
        let entity = model.entity(class).unwrap();

        let p = Predicate::parse("not has(is_interface) and class_complexity <> 0").unwrap();
        assert!(p.matches(entity));

        let p = Predicate::parse("has(is_interface)").unwrap();
        assert!(!p.matches(entity));
    }

    #[test]
    fn test_missing_property_is_unknown() {
        let (model, class) = class_with(&[]);
        let entity = model.entity(class).unwrap();

        let p = Predicate::parse("number_of_lines > 0").unwrap();
        assert_eq!(p.evaluate(entity), None);
        assert_eq!(p.clone().negate().evaluate(entity), None);
        assert!(!p.matches(entity));
        assert!(!p.negate().matches(entity));
    }

    #[test]
    fn test_kleene_and_or() {
        let (model, class) = class_with(&[("a", 1.0)]);
        let entity = model.entity(class).unwrap();

        // unknown and false = false; unknown or true = true
        let p = Predicate::parse("missing > 0 and a = 2").unwrap();
        assert_eq!(p.evaluate(entity), Some(false));
        let p = Predicate::parse("missing > 0 or a = 1").unwrap();
        assert_eq!(p.evaluate(entity), Some(true));
        let p = Predicate::parse("missing > 0 and a = 1").unwrap();
        assert_eq!(p.evaluate(entity), None);
    }

    #[test]
    fn test_truthy_property() {
        let (model, class) = class_with(&[("is_view_controller", 1.0), ("zero", 0.0)]);
        let entity = model.entity(class).unwrap();
        assert!(Predicate::parse("is_view_controller").unwrap().matches(entity));
        assert!(!Predicate::parse("zero").unwrap().matches(entity));
        assert_eq!(Predicate::parse("absent").unwrap().evaluate(entity), None);
    }

    #[test]
    fn test_serde_as_string() {
        #[derive(Serialize, Deserialize)]
        struct Row {
            filter: Predicate,
        }
        let row: Row = toml::from_str("filter = \"has(is_interface)\"").unwrap();
        assert_eq!(row.filter, Predicate::has("is_interface"));

        let bad: Result<Row, _> = toml::from_str("filter = \"has(\"");
        assert!(bad.is_err());

        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"filter":"has(is_interface)"}"#);
    }
}
