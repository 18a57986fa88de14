//! The trigger-condition boolean expression language (component C3, §4.3.2).
//!
//! A small, hand-written recursive-descent parser producing a tagged-union
//! AST, per the design notes — a general expression engine would be
//! overkill for a grammar this size, and missing-value semantics belong in
//! the evaluator, not bolted on afterward.

use crate::error::{KernelError, Result};
use crate::path::read_country_numeric;
use crate::state::GlobalState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Eq,
    Ne,
    Ge,
    Gt,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    BoolLit(bool),
    NumberLit(f64),
    StrLit(String),
    T,
    /// `country('CODE').a.b` — the country code and its dotted field path.
    Country(String, Vec<String>),
    Cmp(CmpOp, Box<Expr>, Box<Expr>),
    /// `date <op> YYYY-MM-DD`, pre-compiled to a comparison against `t`.
    DateCmp(CmpOp, f64),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Number(f64),
    Str(String),
    Bool(bool),
    Date(f64),
    Ident(String),
    Cmp(CmpOp),
    And,
    Or,
    Not,
    LParen,
    RParen,
    Dot,
    End,
}

fn lex(input: &str) -> Result<Vec<Tok>> {
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0usize;
    let mut toks = Vec::new();
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '(' => {
                toks.push(Tok::LParen);
                i += 1;
            }
            ')' => {
                toks.push(Tok::RParen);
                i += 1;
            }
            '.' => {
                toks.push(Tok::Dot);
                i += 1;
            }
            '&' => {
                if chars.get(i + 1) == Some(&'&') {
                    toks.push(Tok::And);
                    i += 2;
                } else {
                    return Err(KernelError::ExpressionError("expected '&&'".to_string()));
                }
            }
            '|' => {
                if chars.get(i + 1) == Some(&'|') {
                    toks.push(Tok::Or);
                    i += 2;
                } else {
                    return Err(KernelError::ExpressionError("expected '||'".to_string()));
                }
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    toks.push(Tok::Cmp(CmpOp::Ne));
                    i += 2;
                } else {
                    toks.push(Tok::Not);
                    i += 1;
                }
            }
            '=' => {
                if chars.get(i + 1) == Some(&'=') {
                    i += 2;
                } else {
                    i += 1;
                }
                toks.push(Tok::Cmp(CmpOp::Eq));
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    toks.push(Tok::Cmp(CmpOp::Le));
                    i += 2;
                } else {
                    toks.push(Tok::Cmp(CmpOp::Lt));
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    toks.push(Tok::Cmp(CmpOp::Ge));
                    i += 2;
                } else {
                    toks.push(Tok::Cmp(CmpOp::Gt));
                    i += 1;
                }
            }
            '\'' => {
                let mut s = String::new();
                i += 1;
                while i < chars.len() && chars[i] != '\'' {
                    s.push(chars[i]);
                    i += 1;
                }
                if i >= chars.len() {
                    return Err(KernelError::ExpressionError(
                        "unterminated string literal".to_string(),
                    ));
                }
                i += 1;
                toks.push(Tok::Str(s));
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                if chars.get(i) == Some(&'-')
                    && chars[start..i].len() == 4
                    && chars.get(i + 1).map(|c| c.is_ascii_digit()).unwrap_or(false)
                {
                    // ISO date: YYYY-MM-DD
                    let year: i64 = chars[start..i].iter().collect::<String>().parse().unwrap();
                    i += 1; // '-'
                    let m_start = i;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                    let _month = &chars[m_start..i];
                    if chars.get(i) != Some(&'-') {
                        return Err(KernelError::ExpressionError(
                            "malformed date literal".to_string(),
                        ));
                    }
                    i += 1;
                    let d_start = i;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                    if i == d_start {
                        return Err(KernelError::ExpressionError(
                            "malformed date literal".to_string(),
                        ));
                    }
                    let quarter = 4.0 * (year - 2025) as f64;
                    toks.push(Tok::Date(quarter));
                } else {
                    let mut end = i;
                    if chars.get(end) == Some(&'.') {
                        end += 1;
                        while end < chars.len() && chars[end].is_ascii_digit() {
                            end += 1;
                        }
                    }
                    let text: String = chars[start..end].iter().collect();
                    let n: f64 = text
                        .parse()
                        .map_err(|_| KernelError::ExpressionError(format!("bad number '{}'", text)))?;
                    toks.push(Tok::Number(n));
                    i = end;
                }
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                match text.as_str() {
                    "true" => toks.push(Tok::Bool(true)),
                    "false" => toks.push(Tok::Bool(false)),
                    _ => toks.push(Tok::Ident(text)),
                }
            }
            other => {
                return Err(KernelError::ExpressionError(format!(
                    "unexpected character '{}'",
                    other
                )))
            }
        }
    }
    toks.push(Tok::End);
    Ok(toks)
}

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Tok {
        &self.toks[self.pos]
    }

    fn advance(&mut self) -> Tok {
        let t = self.toks[self.pos].clone();
        if self.pos + 1 < self.toks.len() {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, tok: &Tok) -> Result<()> {
        if self.peek() == tok {
            self.advance();
            Ok(())
        } else {
            Err(KernelError::ExpressionError(format!(
                "expected {:?}, found {:?}",
                tok,
                self.peek()
            )))
        }
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_and()?;
        while *self.peek() == Tok::Or {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_not()?;
        while *self.peek() == Tok::And {
            self.advance();
            let rhs = self.parse_not()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if *self.peek() == Tok::Not {
            self.advance();
            let inner = self.parse_not()?;
            Ok(Expr::Not(Box::new(inner)))
        } else {
            self.parse_comparison()
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        // special form: `date <op> YYYY-MM-DD`
        if let Tok::Ident(name) = self.peek() {
            if name == "date" {
                self.advance();
                let op = match self.advance() {
                    Tok::Cmp(op) => op,
                    other => {
                        return Err(KernelError::ExpressionError(format!(
                            "expected comparison operator after 'date', found {:?}",
                            other
                        )))
                    }
                };
                let target = match self.advance() {
                    Tok::Date(q) => q,
                    other => {
                        return Err(KernelError::ExpressionError(format!(
                            "expected date literal, found {:?}",
                            other
                        )))
                    }
                };
                return Ok(Expr::DateCmp(op, target));
            }
        }

        let lhs = self.parse_atom()?;
        if let Tok::Cmp(op) = self.peek().clone() {
            self.advance();
            let rhs = self.parse_atom()?;
            Ok(Expr::Cmp(op, Box::new(lhs), Box::new(rhs)))
        } else {
            Ok(lhs)
        }
    }

    fn parse_atom(&mut self) -> Result<Expr> {
        match self.advance() {
            Tok::LParen => {
                let inner = self.parse_expr()?;
                self.expect(&Tok::RParen)?;
                Ok(inner)
            }
            Tok::Bool(b) => Ok(Expr::BoolLit(b)),
            Tok::Number(n) => Ok(Expr::NumberLit(n)),
            Tok::Date(q) => Ok(Expr::NumberLit(q)),
            Tok::Str(s) => Ok(Expr::StrLit(s)),
            Tok::Ident(name) if name == "t" => Ok(Expr::T),
            Tok::Ident(name) if name == "country" => {
                self.expect(&Tok::LParen)?;
                let code = match self.advance() {
                    Tok::Str(s) => s,
                    other => {
                        return Err(KernelError::ExpressionError(format!(
                            "expected country code string, found {:?}",
                            other
                        )))
                    }
                };
                self.expect(&Tok::RParen)?;
                self.expect(&Tok::Dot)?;
                let mut segments = Vec::new();
                loop {
                    match self.advance() {
                        Tok::Ident(seg) => segments.push(seg),
                        other => {
                            return Err(KernelError::ExpressionError(format!(
                                "expected field path segment, found {:?}",
                                other
                            )))
                        }
                    }
                    if *self.peek() == Tok::Dot {
                        self.advance();
                    } else {
                        break;
                    }
                }
                Ok(Expr::Country(code, segments))
            }
            other => Err(KernelError::ExpressionError(format!(
                "unexpected token {:?}",
                other
            ))),
        }
    }
}

/// Parses a condition expression into its AST.
pub fn parse(input: &str) -> Result<Expr> {
    let toks = lex(input)?;
    let mut parser = Parser { toks, pos: 0 };
    let expr = parser.parse_expr()?;
    if *parser.peek() != Tok::End {
        return Err(KernelError::ExpressionError(format!(
            "unexpected trailing token {:?}",
            parser.peek()
        )));
    }
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq)]
enum EvalValue {
    Number(f64),
    Bool(bool),
    Text(String),
    Missing,
}

fn eval_operand(expr: &Expr, state: &GlobalState) -> EvalValue {
    match expr {
        Expr::BoolLit(b) => EvalValue::Bool(*b),
        Expr::NumberLit(n) => EvalValue::Number(*n),
        Expr::StrLit(s) => EvalValue::Text(s.clone()),
        Expr::T => EvalValue::Number(state.t as f64),
        Expr::Country(code, path) => {
            let segs: Vec<&str> = path.iter().map(|s| s.as_str()).collect();
            match read_country_numeric(state, code, &segs) {
                Some(n) => EvalValue::Number(n),
                None => EvalValue::Missing,
            }
        }
        _ => EvalValue::Missing,
    }
}

fn compare(op: CmpOp, lhs: &EvalValue, rhs: &EvalValue) -> bool {
    if *lhs == EvalValue::Missing || *rhs == EvalValue::Missing {
        return false;
    }
    match (lhs, rhs) {
        (EvalValue::Number(a), EvalValue::Number(b)) => compare_f64(op, *a, *b),
        (EvalValue::Bool(a), EvalValue::Bool(b)) => compare_bool(op, *a, *b),
        (EvalValue::Text(a), EvalValue::Text(b)) => compare_text(op, a, b),
        _ => false,
    }
}

fn compare_f64(op: CmpOp, a: f64, b: f64) -> bool {
    match op {
        CmpOp::Lt => a < b,
        CmpOp::Le => a <= b,
        CmpOp::Eq => a == b,
        CmpOp::Ne => a != b,
        CmpOp::Ge => a >= b,
        CmpOp::Gt => a > b,
    }
}

fn compare_bool(op: CmpOp, a: bool, b: bool) -> bool {
    match op {
        CmpOp::Eq => a == b,
        CmpOp::Ne => a != b,
        _ => false,
    }
}

fn compare_text(op: CmpOp, a: &str, b: &str) -> bool {
    match op {
        CmpOp::Lt => a < b,
        CmpOp::Le => a <= b,
        CmpOp::Eq => a == b,
        CmpOp::Ne => a != b,
        CmpOp::Ge => a >= b,
        CmpOp::Gt => a > b,
    }
}

fn eval_bool(expr: &Expr, state: &GlobalState) -> Result<bool> {
    match expr {
        Expr::BoolLit(b) => Ok(*b),
        Expr::And(a, b) => Ok(eval_bool(a, state)? && eval_bool(b, state)?),
        Expr::Or(a, b) => Ok(eval_bool(a, state)? || eval_bool(b, state)?),
        Expr::Not(a) => Ok(!eval_bool(a, state)?),
        Expr::DateCmp(op, target) => Ok(compare_f64(*op, state.t as f64, *target)),
        Expr::Cmp(op, lhs, rhs) => {
            let l = eval_operand(lhs, state);
            let r = eval_operand(rhs, state);
            Ok(compare(*op, &l, &r))
        }
        _ => Err(KernelError::ExpressionError(
            "expression does not evaluate to a boolean".to_string(),
        )),
    }
}

/// Evaluates a trigger condition expression against `state`. An empty
/// expression is always true. Parse and evaluation failures are returned
/// as `ExpressionError` so the caller can record them and treat the
/// trigger as non-firing.
pub fn eval_condition(state: &GlobalState, expression: &str) -> Result<bool> {
    if expression.trim().is_empty() {
        return Ok(true);
    }
    let expr = parse(expression)?;
    eval_bool(&expr, state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{CountryState, Macro};

    fn state_with_usa(inflation: f64, t: u64) -> GlobalState {
        let mut state = GlobalState::new().with_country(
            "USA",
            CountryState {
                macro_: Macro {
                    inflation: Some(inflation),
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        state.t = t;
        state
    }

    #[test]
    fn empty_expression_is_true() {
        assert!(eval_condition(&GlobalState::new(), "").unwrap());
    }

    #[test]
    fn bare_t_comparison() {
        let state = state_with_usa(0.05, 3);
        assert!(eval_condition(&state, "t >= 3").unwrap());
        assert!(!eval_condition(&state, "t >= 4").unwrap());
    }

    #[test]
    fn country_field_access() {
        let state = state_with_usa(0.08, 0);
        assert!(eval_condition(&state, "country('USA').macro.inflation > 0.05").unwrap());
    }

    #[test]
    fn unknown_country_is_missing_and_comparisons_are_false() {
        let state = state_with_usa(0.08, 0);
        assert!(!eval_condition(&state, "country('RUS').macro.inflation > 0.0").unwrap());
    }

    #[test]
    fn date_operator_compiles_to_quarterly_timestep() {
        let state = state_with_usa(0.0, 4);
        assert!(eval_condition(&state, "date >= 2026-01-01").unwrap());
        assert!(!eval_condition(&state, "date >= 2027-01-01").unwrap());
    }

    #[test]
    fn logical_combinators_and_parens() {
        let state = state_with_usa(0.08, 3);
        assert!(eval_condition(
            &state,
            "(t >= 3 && country('USA').macro.inflation > 0.05) || false"
        )
        .unwrap());
        assert!(!eval_condition(&state, "!(t >= 3) || false").unwrap());
    }

    #[test]
    fn malformed_expression_is_an_error_not_a_panic() {
        assert!(eval_condition(&GlobalState::new(), "t >=").is_err());
        assert!(eval_condition(&GlobalState::new(), "(t >= 1").is_err());
    }
}
