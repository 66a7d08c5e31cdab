//! Calculator Tool
//!
//! Evaluates arithmetic with `+ - * / ^`, parentheses and unary minus.
//! `^` binds tighter than unary minus and is right-associative.

use async_trait::async_trait;

use agent_core::{Result as CoreResult, Tool, ToolSchema, tool::ParameterSchema};

use crate::error::{Result, ToolError, str_arg};

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "calculator".into(),
            description: "Evaluate an arithmetic expression, e.g. '25 * 4' or '(2 + 3) ^ 2'".into(),
            parameters: vec![ParameterSchema::required(
                "expr",
                "string",
                "Expression using + - * / ^ and parentheses",
            )],
            category: Some("math".into()),
            has_side_effects: false,
        }
    }

    fn validate(&self, arguments: &serde_json::Value) -> CoreResult<()> {
        str_arg(arguments, "expr", &["expression"])
            .map(|_| ())
            .map_err(|e| agent_core::AgentError::ToolValidation(e.to_string()))
    }

    async fn execute(&self, arguments: &serde_json::Value) -> CoreResult<serde_json::Value> {
        let expr = str_arg(arguments, "expr", &["expression"])?;
        let result = evaluate(expr)?;

        Ok(serde_json::json!({
            "expr": expr,
            "result": number(result),
        }))
    }
}

/// Whole results are reported as integers
#[allow(clippy::cast_possible_truncation)]
fn number(value: f64) -> serde_json::Value {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        serde_json::json!(value as i64)
    } else {
        serde_json::json!(value)
    }
}

/// Deepest nesting of parentheses, signs and exponents accepted
const MAX_DEPTH: usize = 64;

pub fn evaluate(expr: &str) -> Result<f64> {
    let mut parser = Parser {
        chars: expr.chars().filter(|c| !c.is_whitespace()).collect(),
        pos: 0,
        depth: 0,
    };
    if parser.chars.is_empty() {
        return Err(ToolError::Evaluation("empty expression".into()));
    }

    let value = parser.expression()?;
    if let Some(c) = parser.peek() {
        return Err(ToolError::Evaluation(format!(
            "unexpected '{c}' at position {}",
            parser.pos
        )));
    }
    if !value.is_finite() {
        return Err(ToolError::Evaluation("result is not a finite number".into()));
    }
    Ok(value)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    // expression := term (('+' | '-') term)*
    fn expression(&mut self) -> Result<f64> {
        let mut value = self.term()?;
        loop {
            if self.eat('+') {
                value += self.term()?;
            } else if self.eat('-') {
                value -= self.term()?;
            } else {
                return Ok(value);
            }
        }
    }

    // term := unary (('*' | '/') unary)*
    fn term(&mut self) -> Result<f64> {
        let mut value = self.unary()?;
        loop {
            if self.eat('*') {
                value *= self.unary()?;
            } else if self.eat('/') {
                let divisor = self.unary()?;
                if divisor == 0.0 {
                    return Err(ToolError::DivisionByZero);
                }
                value /= divisor;
            } else {
                return Ok(value);
            }
        }
    }

    // Every recursive rule passes through here
    fn unary(&mut self) -> Result<f64> {
        if self.depth >= MAX_DEPTH {
            return Err(ToolError::Evaluation(format!(
                "expression nested deeper than {MAX_DEPTH} levels"
            )));
        }
        self.depth += 1;
        let value = self.signed();
        self.depth -= 1;
        value
    }

    // unary := '-' unary | power
    fn signed(&mut self) -> Result<f64> {
        if self.eat('-') {
            return Ok(-self.unary()?);
        }
        if self.eat('+') {
            return self.unary();
        }
        self.power()
    }

    // power := atom ('^' unary)?
    fn power(&mut self) -> Result<f64> {
        let base = self.atom()?;
        if self.eat('^') {
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    // atom := number | '(' expression ')'
    fn atom(&mut self) -> Result<f64> {
        if self.eat('(') {
            let value = self.expression()?;
            if !self.eat(')') {
                return Err(ToolError::Evaluation("missing closing parenthesis".into()));
            }
            return Ok(value);
        }

        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || c == '.')
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(match self.peek() {
                Some(c) => ToolError::Evaluation(format!("unexpected '{c}' at position {start}")),
                None => ToolError::Evaluation("unexpected end of expression".into()),
            });
        }

        let literal: String = self.chars[start..self.pos].iter().collect();
        literal
            .parse()
            .map_err(|_| ToolError::Evaluation(format!("invalid number '{literal}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(expr: &str, expected: f64) {
        let value = evaluate(expr).unwrap();
        assert!((value - expected).abs() < 1e-9, "{expr} = {value}, expected {expected}");
    }

    #[test]
    fn test_calculator() {
        approx("2 + 2", 4.0);
        approx("10 * 5", 50.0);
        approx("(2 + 3) * 4", 20.0);
        approx("2 ^ 8", 256.0);
        approx("2 ^ 3 ^ 2", 512.0);
        approx("10 - 4 - 3", 3.0);
        approx("-3 * -(2 + 1)", 9.0);
        approx("-2 ^ 2", -4.0);
        approx("7 / 2", 3.5);
    }

    #[test]
    fn test_division_by_zero() {
        assert!(matches!(evaluate("1/0"), Err(ToolError::DivisionByZero)));
        assert!(matches!(evaluate("5 / (3 - 3)"), Err(ToolError::DivisionByZero)));
    }

    #[test]
    fn test_malformed_expressions() {
        for bad in ["", "2 +", "(1 + 2", "1 + 2)", "abc", "1..2"] {
            assert!(
                matches!(evaluate(bad), Err(ToolError::Evaluation(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn test_nesting_depth_is_bounded() {
        let nested = |depth: usize| format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        approx(&nested(40), 1.0);

        for deep in [
            nested(200_000),
            format!("{}1", "-".repeat(100_000)),
            "2^".repeat(100_000) + "1",
        ] {
            assert!(
                matches!(evaluate(&deep), Err(ToolError::Evaluation(ref m)) if m.contains("nested")),
                "accepted expression of length {}",
                deep.len()
            );
        }
    }

    #[tokio::test]
    async fn test_execute_payload() {
        let payload = CalculatorTool
            .execute(&serde_json::json!({"expr": "25*4"}))
            .await
            .unwrap();
        assert_eq!(payload, serde_json::json!({"expr": "25*4", "result": 100}));

        let payload = CalculatorTool
            .execute(&serde_json::json!({"expression": "1/4"}))
            .await
            .unwrap();
        assert_eq!(payload["result"], serde_json::json!(0.25));
    }

    #[tokio::test]
    async fn test_execute_division_by_zero_is_invocation_error() {
        let err = CalculatorTool
            .execute(&serde_json::json!({"expr": "1/0"}))
            .await
            .unwrap_err();
        assert!(matches!(err, agent_core::AgentError::Invocation(ref m) if m == "division by zero"));
    }

    #[test]
    fn test_validate_accepts_alias() {
        assert!(CalculatorTool.validate(&serde_json::json!({"expression": "1"})).is_ok());
        assert!(CalculatorTool.validate(&serde_json::json!({})).is_err());
    }
}
