//! Parser for the textual rules syntax.
//!
//! Each node type implements `FromStr`, inverse to its `Display` form:
//! `"5 Plant! OR (4 Heat!, 2 Energy!)".parse::<Instruction>()` rebuilds the
//! tree that printed that string.

use crate::error::SyntaxError;

use super::expression::{Expression, ScaledExpression};
use super::instruction::{Instruction, Intensity};
use super::metric::Metric;
use super::name::ClassName;
use super::requirement::Requirement;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    Num(i64),
    Name(String),
    Lower(String),
    Or,
    Then,
    From,
    Max,
    Has,
    Comma,
    Colon,
    QuestionColon,
    Slash,
    At,
    Minus,
    Bang,
    Dot,
    Question,
    Equals,
    Lt,
    Gt,
    LParen,
    RParen,
    LBracket,
    RBracket,
}

fn lex(input: &str) -> Result<Vec<(usize, Token)>, SyntaxError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        let token = match c {
            ',' => Token::Comma,
            ':' => Token::Colon,
            '/' => Token::Slash,
            '@' => Token::At,
            '-' => Token::Minus,
            '!' => Token::Bang,
            '.' => Token::Dot,
            '?' => {
                if bytes.get(i + 1) == Some(&b':') {
                    i += 1;
                    Token::QuestionColon
                } else {
                    Token::Question
                }
            }
            '=' => Token::Equals,
            '<' => Token::Lt,
            '>' => Token::Gt,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '0'..='9' => {
                let mut end = i;
                while end < bytes.len() && bytes[end].is_ascii_digit() {
                    end += 1;
                }
                let text = &input[i..end];
                let value = text.parse::<i64>().map_err(|_| SyntaxError {
                    offset: start,
                    message: format!("number out of range: {text}"),
                })?;
                i = end - 1;
                Token::Num(value)
            }
            _ if c.is_ascii_alphabetic() => {
                let mut end = i;
                while end < bytes.len() && bytes[end].is_ascii_alphanumeric() {
                    end += 1;
                }
                let word = &input[i..end];
                i = end - 1;
                match word {
                    "OR" => Token::Or,
                    "THEN" => Token::Then,
                    "FROM" => Token::From,
                    "MAX" => Token::Max,
                    "HAS" => Token::Has,
                    _ if c.is_ascii_uppercase() => Token::Name(word.to_owned()),
                    _ => Token::Lower(word.to_owned()),
                }
            }
            _ => {
                return Err(SyntaxError {
                    offset: start,
                    message: format!("unexpected character `{c}`"),
                })
            }
        };
        tokens.push((start, token));
        i += 1;
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    len: usize,
}

impl Parser {
    fn new(input: &str) -> Result<Self, SyntaxError> {
        let tokens = lex(input)?;
        Ok(Self {
            tokens,
            pos: 0,
            len: input.len(),
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn peek2(&self) -> Option<&Token> {
        self.tokens.get(self.pos + 1).map(|(_, t)| t)
    }

    fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.len, |(o, _)| *o)
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError {
            offset: self.offset(),
            message: message.into(),
        }
    }

    fn expect(&mut self, token: &Token, what: &str) -> Result<(), SyntaxError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(format!("expected {what}")))
        }
    }

    fn finish<T>(self, value: T) -> Result<T, SyntaxError> {
        if self.pos == self.tokens.len() {
            Ok(value)
        } else {
            Err(self.error("unexpected trailing input"))
        }
    }

    // ----- instructions -----

    /// multi := then (',' then)*
    fn parse_instruction(&mut self) -> Result<Instruction, SyntaxError> {
        let mut parts = vec![self.parse_then()?];
        while self.eat(&Token::Comma) {
            parts.push(self.parse_then()?);
        }
        if parts.len() == 1 {
            Ok(parts.pop().unwrap_or(Instruction::NoOp))
        } else {
            Ok(Instruction::Multi(parts))
        }
    }

    fn parse_then(&mut self) -> Result<Instruction, SyntaxError> {
        let mut parts = vec![self.parse_or()?];
        while self.eat(&Token::Then) {
            parts.push(self.parse_or()?);
        }
        if parts.len() == 1 {
            Ok(parts.pop().unwrap_or(Instruction::NoOp))
        } else {
            Ok(Instruction::Then(parts))
        }
    }

    fn parse_or(&mut self) -> Result<Instruction, SyntaxError> {
        let mut parts = vec![self.parse_gated()?];
        while self.eat(&Token::Or) {
            parts.push(self.parse_gated()?);
        }
        if parts.len() == 1 {
            Ok(parts.pop().unwrap_or(Instruction::NoOp))
        } else {
            Ok(Instruction::Or(parts))
        }
    }

    /// A gate is only recognized when a `:` or `?:` actually follows; anything
    /// else backtracks and parses as an instruction.
    fn parse_gated(&mut self) -> Result<Instruction, SyntaxError> {
        let save = self.pos;
        if let Ok(gate) = self.parse_gate() {
            let mandatory = if self.eat(&Token::Colon) {
                Some(true)
            } else if self.eat(&Token::QuestionColon) {
                Some(false)
            } else {
                None
            };
            if let Some(mandatory) = mandatory {
                let inner = self.parse_gated()?;
                return Ok(Instruction::Gated {
                    gate,
                    mandatory,
                    inner: Box::new(inner),
                });
            }
        }
        self.pos = save;
        self.parse_per()
    }

    /// Compound gates must be parenthesized; a bare gate is a single atom.
    fn parse_gate(&mut self) -> Result<Requirement, SyntaxError> {
        if self.eat(&Token::LParen) {
            let gate = self.parse_requirement()?;
            self.expect(&Token::RParen, "`)`")?;
            Ok(gate)
        } else {
            self.parse_requirement_atom()
        }
    }

    fn parse_per(&mut self) -> Result<Instruction, SyntaxError> {
        let inner = self.parse_atom()?;
        if self.eat(&Token::Slash) {
            let metric = self.parse_metric()?;
            Ok(Instruction::Per {
                inner: Box::new(inner),
                metric,
            })
        } else {
            Ok(inner)
        }
    }

    fn parse_atom(&mut self) -> Result<Instruction, SyntaxError> {
        match self.peek() {
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.parse_instruction()?;
                self.expect(&Token::RParen, "`)`")?;
                Ok(inner)
            }
            Some(Token::At) => {
                self.pos += 1;
                self.parse_custom()
            }
            Some(Token::Name(_)) if self.peek2() == Some(&Token::LBracket) => {
                self.parse_transform()
            }
            _ => self.parse_change(),
        }
    }

    fn parse_custom(&mut self) -> Result<Instruction, SyntaxError> {
        let name = match self.advance() {
            Some(Token::Lower(name)) => name.clone(),
            _ => return Err(self.error("expected a custom instruction name after `@`")),
        };
        self.expect(&Token::LParen, "`(`")?;
        let mut arguments = Vec::new();
        if self.peek() != Some(&Token::RParen) {
            arguments.push(self.parse_expression()?);
            while self.eat(&Token::Comma) {
                arguments.push(self.parse_expression()?);
            }
        }
        self.expect(&Token::RParen, "`)`")?;
        Ok(Instruction::Custom { name, arguments })
    }

    fn parse_transform(&mut self) -> Result<Instruction, SyntaxError> {
        let kind = match self.advance() {
            Some(Token::Name(kind)) => kind.clone(),
            _ => return Err(self.error("expected a transform name")),
        };
        self.expect(&Token::LBracket, "`[`")?;
        let inner = self.parse_instruction()?;
        self.expect(&Token::RBracket, "`]`")?;
        Ok(Instruction::Transform {
            kind,
            inner: Box::new(inner),
        })
    }

    fn parse_change(&mut self) -> Result<Instruction, SyntaxError> {
        let removing = self.eat(&Token::Minus);
        let scalar = self.parse_scalar()?.unwrap_or(1);
        let expression = self.parse_expression()?;

        if !removing && scalar == 1 && expression.is_simple() && expression.class_name == ClassName::ok() {
            return Ok(Instruction::NoOp);
        }

        if self.eat(&Token::From) {
            if removing {
                return Err(self.error("a removal cannot take a FROM clause"));
            }
            let from = self.parse_expression()?;
            let intensity = self.parse_intensity();
            return Ok(Instruction::Transmute {
                count: scalar,
                gaining: expression,
                removing: from,
                intensity,
            });
        }

        let intensity = self.parse_intensity();
        let scaled = ScaledExpression::new(scalar, expression);
        if removing {
            Ok(Instruction::Remove { scaled, intensity })
        } else {
            Ok(Instruction::Gain { scaled, intensity })
        }
    }

    fn parse_scalar(&mut self) -> Result<Option<i64>, SyntaxError> {
        if let Some(Token::Num(n)) = self.peek() {
            let n = *n;
            self.pos += 1;
            Ok(Some(n))
        } else {
            Ok(None)
        }
    }

    fn parse_intensity(&mut self) -> Option<Intensity> {
        let intensity = match self.peek() {
            Some(Token::Bang) => Intensity::Mandatory,
            Some(Token::Dot) => Intensity::Amap,
            Some(Token::Question) => Intensity::Optional,
            _ => return None,
        };
        self.pos += 1;
        Some(intensity)
    }

    // ----- requirements -----

    /// requirement := reqOr (',' reqOr)*
    fn parse_requirement(&mut self) -> Result<Requirement, SyntaxError> {
        let mut parts = vec![self.parse_requirement_or()?];
        while self.eat(&Token::Comma) {
            parts.push(self.parse_requirement_or()?);
        }
        if parts.len() == 1 {
            parts.pop().ok_or_else(|| self.error("empty requirement"))
        } else {
            Ok(Requirement::And(parts))
        }
    }

    fn parse_requirement_or(&mut self) -> Result<Requirement, SyntaxError> {
        let mut parts = vec![self.parse_requirement_atom()?];
        while self.eat(&Token::Or) {
            parts.push(self.parse_requirement_atom()?);
        }
        if parts.len() == 1 {
            parts.pop().ok_or_else(|| self.error("empty requirement"))
        } else {
            Ok(Requirement::Or(parts))
        }
    }

    fn parse_requirement_atom(&mut self) -> Result<Requirement, SyntaxError> {
        if self.eat(&Token::LParen) {
            let inner = self.parse_requirement()?;
            self.expect(&Token::RParen, "`)`")?;
            return Ok(inner);
        }
        if self.eat(&Token::Max) {
            let scalar = self
                .parse_scalar()?
                .ok_or_else(|| self.error("expected a count after MAX"))?;
            let expression = self.parse_expression()?;
            return Ok(Requirement::Max(ScaledExpression::new(scalar, expression)));
        }
        if self.eat(&Token::Equals) {
            let scalar = self
                .parse_scalar()?
                .ok_or_else(|| self.error("expected a count after `=`"))?;
            let expression = self.parse_expression()?;
            return Ok(Requirement::Exact(ScaledExpression::new(scalar, expression)));
        }
        let scalar = self.parse_scalar()?.unwrap_or(1);
        let expression = self.parse_expression()?;
        Ok(Requirement::Min(ScaledExpression::new(scalar, expression)))
    }

    // ----- metrics -----

    fn parse_metric(&mut self) -> Result<Metric, SyntaxError> {
        let unit = self.parse_scalar()?.unwrap_or(1);
        if unit < 1 {
            return Err(self.error("metric unit must be positive"));
        }
        let expression = self.parse_expression()?;
        Ok(Metric::new(unit, expression))
    }

    // ----- expressions -----

    fn parse_expression(&mut self) -> Result<Expression, SyntaxError> {
        let class_name = match self.advance() {
            Some(Token::Name(name)) => ClassName::new(name.clone()),
            _ => return Err(self.error("expected a class name")),
        };
        let mut arguments = Vec::new();
        if self.eat(&Token::Lt) {
            arguments.push(self.parse_expression()?);
            while self.eat(&Token::Comma) {
                arguments.push(self.parse_expression()?);
            }
            self.expect(&Token::Gt, "`>`")?;
        }
        let mut expression = Expression {
            class_name,
            arguments,
            refinement: None,
        };
        if self.peek() == Some(&Token::LParen) && self.peek2() == Some(&Token::Has) {
            self.pos += 2;
            let refinement = self.parse_requirement()?;
            self.expect(&Token::RParen, "`)`")?;
            expression.refinement = Some(Box::new(refinement));
        }
        Ok(expression)
    }
}

impl std::str::FromStr for Instruction {
    type Err = SyntaxError;

    fn from_str(s: &str) -> Result<Self, SyntaxError> {
        let mut parser = Parser::new(s)?;
        let value = parser.parse_instruction()?;
        parser.finish(value)
    }
}

impl std::str::FromStr for Requirement {
    type Err = SyntaxError;

    fn from_str(s: &str) -> Result<Self, SyntaxError> {
        let mut parser = Parser::new(s)?;
        let value = parser.parse_requirement()?;
        parser.finish(value)
    }
}

impl std::str::FromStr for Metric {
    type Err = SyntaxError;

    fn from_str(s: &str) -> Result<Self, SyntaxError> {
        let mut parser = Parser::new(s)?;
        let value = parser.parse_metric()?;
        parser.finish(value)
    }
}

impl std::str::FromStr for Expression {
    type Err = SyntaxError;

    fn from_str(s: &str) -> Result<Self, SyntaxError> {
        let mut parser = Parser::new(s)?;
        let value = parser.parse_expression()?;
        parser.finish(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip_instruction(text: &str) {
        let parsed: Instruction = text.parse().unwrap();
        assert_eq!(parsed.to_string(), text);
    }

    #[test]
    fn test_changes() {
        round_trip_instruction("2 Plant?");
        round_trip_instruction("Plant!");
        round_trip_instruction("-3 Energy.");
        round_trip_instruction("4 Heat");
        round_trip_instruction("2 Heat FROM Energy!");
        round_trip_instruction("CityTile<LandArea>!");
    }

    #[test]
    fn test_noop_sentinel() {
        assert_eq!("Ok".parse::<Instruction>().unwrap(), Instruction::NoOp);
    }

    #[test]
    fn test_compound_instructions() {
        round_trip_instruction("5 Plant! OR (4 Heat!, 2 Energy!)");
        round_trip_instruction("Plant THEN Heat");
        round_trip_instruction("3 Plant! / 2 Heat");
        round_trip_instruction("2 Heat: Plant!");
        round_trip_instruction("Heat ?: Plant!");
        round_trip_instruction("(2 Heat OR 2 Plant): Energy!");
        round_trip_instruction("PROD[-2 Plant]");
        round_trip_instruction("@gainLowestProduction(Player1)");
        round_trip_instruction("Plant! OR Ok");
    }

    #[test]
    fn test_gated_inside_multi() {
        let parsed: Instruction = "2 Heat: Plant!, Energy!".parse().unwrap();
        match parsed {
            Instruction::Multi(parts) => {
                assert_eq!(parts.len(), 2);
                assert!(matches!(parts[0], Instruction::Gated { .. }));
            }
            other => panic!("expected Multi, got {other:?}"),
        }
    }

    #[test]
    fn test_requirements() {
        for text in ["2 Plant", "MAX 0 Tile", "=1 Heat", "Heat OR Plant, 2 Energy"] {
            let parsed: Requirement = text.parse().unwrap();
            assert_eq!(parsed.to_string(), text);
        }
    }

    #[test]
    fn test_expressions() {
        for text in [
            "Plant",
            "Heat<Player2>",
            "Owned<Player1, Plant>",
            "Production<Class<Heat>>",
            "Tile<LandArea>(HAS MAX 0 Tile)",
        ] {
            let parsed: Expression = text.parse().unwrap();
            assert_eq!(parsed.to_string(), text);
        }
    }

    #[test]
    fn test_metric() {
        let metric: Metric = "2 Heat".parse().unwrap();
        assert_eq!(metric.unit, 2);
        assert_eq!(metric.to_string(), "2 Heat");
    }

    #[test]
    fn test_errors() {
        assert!("".parse::<Instruction>().is_err());
        assert!("2".parse::<Instruction>().is_err());
        assert!("plant".parse::<Expression>().is_err());
        assert!("Plant!!".parse::<Instruction>().is_err());
        assert!("-2 Heat FROM Energy".parse::<Instruction>().is_err());
        assert!("MAX Tile".parse::<Requirement>().is_err());
        let err = "Plant %".parse::<Instruction>().unwrap_err();
        assert_eq!(err.offset, 6);
    }
}
