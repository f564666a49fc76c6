//! Evaluation of textual amount values.
//!
//! The parser hands amounts over as raw text: either a plain decimal literal
//! (`-1,234.56`) or a parenthesized arithmetic expression (`(100.00 / 3 + 1)`)
//! over `+ - * /` with the usual precedence, left associativity and unary
//! sign. Everything else is rejected with the offending position in the
//! string.

use std::str::FromStr;

use lazy_static::lazy_static;
use pest::iterators::Pair;
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser as PestParser;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(PestParser)]
#[grammar = "expr.pest"]
struct ExprParser;

lazy_static! {
    static ref PRATT: PrattParser<Rule> = PrattParser::new()
        .op(Op::infix(Rule::add, Assoc::Left) | Op::infix(Rule::subtract, Assoc::Left))
        .op(Op::infix(Rule::multiply, Assoc::Left) | Op::infix(Rule::divide, Assoc::Left))
        .op(Op::prefix(Rule::neg) | Op::prefix(Rule::pos));
}

pub type ExprResult<T> = Result<T, ExprError>;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ExprError {
    #[error("invalid amount at position {position}: {message}")]
    Invalid { position: usize, message: String },

    #[error("invalid number '{value}': {message}")]
    Number { value: String, message: String },

    #[error("division by zero")]
    DivisionByZero,
}

impl ExprError {
    fn from_pest(err: pest::error::Error<Rule>) -> Self {
        let position = match err.location {
            pest::error::InputLocation::Pos(p) => p,
            pest::error::InputLocation::Span((start, _)) => start,
        };
        ExprError::Invalid {
            position,
            message: err.variant.message().into_owned(),
        }
    }
}

/// Evaluates the textual value of an amount.
///
/// Accepts a signed decimal literal or an expression wrapped in outer
/// parentheses; the result keeps the scale produced by the arithmetic, so
/// `"100.00"` evaluates to a decimal of scale 2.
pub fn eval_amount(input: &str) -> ExprResult<Decimal> {
    let trimmed = input.trim();
    let rule = if trimmed.trim_start_matches(&['-', '+'][..]).trim_start().starts_with('(') {
        Rule::paren_value
    } else {
        Rule::literal_value
    };
    let mut parsed = ExprParser::parse(rule, trimmed).map_err(ExprError::from_pest)?;
    let top = parsed.next().expect("a successful parse has one match");

    let mut negate = false;
    let mut value = None;
    for pair in top.into_inner() {
        match pair.as_rule() {
            Rule::neg => negate = !negate,
            Rule::pos => {}
            Rule::num => value = Some(decimal(pair)?),
            Rule::num_expr => value = Some(eval_expr(pair)?),
            Rule::EOI => {}
            _ => unreachable!(),
        }
    }
    let mut value = value.expect("entry rules always contain a value");
    if negate {
        value.set_sign_positive(!value.is_sign_positive());
    }
    Ok(value)
}

fn decimal(pair: Pair<'_, Rule>) -> ExprResult<Decimal> {
    let s = pair.as_str().replace(',', "");
    Decimal::from_str(&s).map_err(|e| ExprError::Number {
        value: pair.as_str().to_string(),
        message: e.to_string(),
    })
}

fn eval_expr(pair: Pair<'_, Rule>) -> ExprResult<Decimal> {
    debug_assert!(pair.as_rule() == Rule::num_expr);
    PRATT
        .map_primary(|primary| match primary.as_rule() {
            Rule::num => decimal(primary),
            Rule::num_expr => eval_expr(primary),
            _ => unreachable!(),
        })
        .map_prefix(|op, rhs| match op.as_rule() {
            Rule::neg => rhs.map(|mut v| {
                v.set_sign_positive(!v.is_sign_positive());
                v
            }),
            Rule::pos => rhs,
            _ => unreachable!(),
        })
        .map_infix(|lhs, op, rhs| {
            let lhs = lhs?;
            let rhs = rhs?;
            Ok(match op.as_rule() {
                Rule::add => lhs + rhs,
                Rule::subtract => lhs - rhs,
                Rule::multiply => lhs * rhs,
                Rule::divide => {
                    if rhs.is_zero() {
                        return Err(ExprError::DivisionByZero);
                    }
                    lhs / rhs
                }
                _ => unreachable!(),
            })
        })
        .parse(pair.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn plain_literals() {
        assert_eq!(eval_amount("1"), Ok(dec!(1)));
        assert_eq!(eval_amount("-1.50"), Ok(dec!(-1.50)));
        assert_eq!(eval_amount("+2"), Ok(dec!(2)));
        assert_eq!(eval_amount("1,234.56"), Ok(dec!(1234.56)));
        assert_eq!(eval_amount("  120.50 "), Ok(dec!(120.50)));
    }

    #[test]
    fn literal_scale_is_preserved() {
        assert_eq!(eval_amount("100.00").unwrap().scale(), 2);
        assert_eq!(eval_amount("1000.004").unwrap().scale(), 3);
        assert_eq!(eval_amount("100").unwrap().scale(), 0);
    }

    #[test]
    fn parenthesized_arithmetic() {
        assert_eq!(eval_amount("(1 + 2)"), Ok(dec!(3)));
        assert_eq!(eval_amount("(1 - 2)"), Ok(dec!(-1)));
        assert_eq!(eval_amount("(2 * 3 + 1)"), Ok(dec!(7)));
        assert_eq!(eval_amount("(1 + 2 * 3)"), Ok(dec!(7)));
        assert_eq!(eval_amount("(10 / 4)"), Ok(dec!(2.5)));
        assert_eq!(eval_amount("-(3)"), Ok(dec!(-3)));
        assert_eq!(eval_amount("(1+-(2*3))"), Ok(dec!(-5)));
        assert_eq!(eval_amount("((1 + 2) * (3 - 1))"), Ok(dec!(6)));
    }

    #[test]
    fn division_by_zero_is_its_own_error() {
        assert_eq!(eval_amount("(1 / 0)"), Err(ExprError::DivisionByZero));
        assert_eq!(eval_amount("(1 / (2 - 2))"), Err(ExprError::DivisionByZero));
    }

    #[test]
    fn garbage_reports_a_position() {
        match eval_amount("(1 + )") {
            Err(ExprError::Invalid { position, .. }) => assert!(position > 0),
            other => panic!("expected Invalid, got {:?}", other),
        }
        assert!(eval_amount("abc").is_err());
        assert!(eval_amount("1 + 2").is_err());
        assert!(eval_amount("(1 + 2").is_err());
        assert!(eval_amount("").is_err());
    }
}
