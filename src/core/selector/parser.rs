use crate::core::message::PropertyValue;
use crate::core::selector::lexer::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// One element of a compiled LIKE pattern.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LikeToken {
    /// `%`
    AnyRun,
    /// `_`
    AnyOne,
    Literal(char),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(PropertyValue),
    Null,
    Identifier(String),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare(CmpOp, Box<Expr>, Box<Expr>),
    Arith(ArithOp, Box<Expr>, Box<Expr>),
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    In {
        ident: String,
        values: Vec<String>,
        negated: bool,
    },
    Like {
        ident: String,
        pattern: Vec<LikeToken>,
        negated: bool,
    },
    IsNull {
        ident: String,
        negated: bool,
    },
}

impl Expr {
    /// Whether the expression can produce a boolean. Used to reject
    /// selectors such as `1 + 2` or `'abc'` at parse time.
    fn is_conditional(&self) -> bool {
        match self {
            Expr::Literal(PropertyValue::Bool(_)) | Expr::Identifier(_) | Expr::Null => true,
            Expr::Literal(_) | Expr::Neg(_) | Expr::Arith(..) => false,
            _ => true,
        }
    }

    fn is_arithmetic_operand(&self) -> bool {
        !matches!(
            self,
            Expr::Literal(PropertyValue::Bool(_) | PropertyValue::String(_))
        ) && matches!(
            self,
            Expr::Literal(_) | Expr::Identifier(_) | Expr::Neg(_) | Expr::Arith(..) | Expr::Null
        )
    }
}

pub(crate) fn parse(tokens: Vec<Token>) -> Result<Expr, String> {
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.or_expr()?;
    if let Some(tok) = parser.peek() {
        return Err(format!("unexpected {} after end of expression", tok.describe()));
    }
    if !expr.is_conditional() {
        return Err("selector does not evaluate to a boolean".to_string());
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token, context: &str) -> Result<(), String> {
        match self.advance() {
            Some(tok) if tok == expected => Ok(()),
            Some(tok) => Err(format!(
                "expected {} {context}, found {}",
                expected.describe(),
                tok.describe()
            )),
            None => Err(format!(
                "expected {} {context}, found end of selector",
                expected.describe()
            )),
        }
    }

    fn or_expr(&mut self) -> Result<Expr, String> {
        let mut lhs = self.and_expr()?;
        while self.eat(&Token::Or) {
            let rhs = self.and_expr()?;
            lhs = Expr::Or(Box::new(conditional(lhs)?), Box::new(conditional(rhs)?));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, String> {
        let mut lhs = self.not_expr()?;
        while self.eat(&Token::And) {
            let rhs = self.not_expr()?;
            lhs = Expr::And(Box::new(conditional(lhs)?), Box::new(conditional(rhs)?));
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> Result<Expr, String> {
        if self.eat(&Token::Not) {
            let inner = self.not_expr()?;
            return Ok(Expr::Not(Box::new(conditional(inner)?)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, String> {
        let lhs = self.additive()?;

        let op = match self.peek() {
            Some(Token::Eq) => Some(CmpOp::Eq),
            Some(Token::Ne) => Some(CmpOp::Ne),
            Some(Token::Lt) => Some(CmpOp::Lt),
            Some(Token::Le) => Some(CmpOp::Le),
            Some(Token::Gt) => Some(CmpOp::Gt),
            Some(Token::Ge) => Some(CmpOp::Ge),
            _ => None,
        };
        if let Some(op) = op {
            self.pos += 1;
            let rhs = self.additive()?;
            return Ok(Expr::Compare(op, Box::new(lhs), Box::new(rhs)));
        }

        // NOT is only valid here as the prefix of BETWEEN / IN / LIKE.
        let negated = match (self.peek(), self.peek_at(1)) {
            (Some(Token::Not), Some(Token::Between | Token::In | Token::Like)) => {
                self.pos += 1;
                true
            }
            (Some(Token::Not), _) => {
                return Err("NOT must be followed by BETWEEN, IN or LIKE here".to_string())
            }
            _ => false,
        };

        match self.peek() {
            Some(Token::Between) => {
                self.pos += 1;
                let low = self.additive()?;
                self.expect(Token::And, "in BETWEEN")?;
                let high = self.additive()?;
                for operand in [&lhs, &low, &high] {
                    if !operand.is_arithmetic_operand() {
                        return Err("BETWEEN operands must be numeric".to_string());
                    }
                }
                Ok(Expr::Between {
                    expr: Box::new(lhs),
                    low: Box::new(low),
                    high: Box::new(high),
                    negated,
                })
            }
            Some(Token::In) => {
                self.pos += 1;
                let ident = identifier_operand(lhs, "IN")?;
                Ok(Expr::In {
                    ident,
                    values: self.in_list()?,
                    negated,
                })
            }
            Some(Token::Like) => {
                self.pos += 1;
                let ident = identifier_operand(lhs, "LIKE")?;
                Ok(Expr::Like {
                    ident,
                    pattern: self.like_pattern()?,
                    negated,
                })
            }
            Some(Token::Is) => {
                self.pos += 1;
                let ident = identifier_operand(lhs, "IS NULL")?;
                let negated = self.eat(&Token::Not);
                self.expect(Token::Null, "after IS")?;
                Ok(Expr::IsNull { ident, negated })
            }
            _ => Ok(lhs),
        }
    }

    fn in_list(&mut self) -> Result<Vec<String>, String> {
        self.expect(Token::LParen, "after IN")?;
        let mut values = Vec::new();
        loop {
            match self.advance() {
                Some(Token::Str(s)) => values.push(s),
                Some(tok) => return Err(format!("IN list accepts string literals, found {}", tok.describe())),
                None => return Err("unterminated IN list".to_string()),
            }
            if self.eat(&Token::Comma) {
                continue;
            }
            self.expect(Token::RParen, "to close IN list")?;
            return Ok(values);
        }
    }

    fn like_pattern(&mut self) -> Result<Vec<LikeToken>, String> {
        let pattern = match self.advance() {
            Some(Token::Str(s)) => s,
            Some(tok) => return Err(format!("LIKE expects a string pattern, found {}", tok.describe())),
            None => return Err("LIKE expects a string pattern".to_string()),
        };

        let escape = if self.eat(&Token::Escape) {
            match self.advance() {
                Some(Token::Str(s)) => {
                    let mut chars = s.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) => Some(c),
                        _ => return Err(format!("ESCAPE must be a single character, got '{s}'")),
                    }
                }
                _ => return Err("ESCAPE expects a string literal".to_string()),
            }
        } else {
            None
        };

        compile_like(&pattern, escape)
    }

    fn additive(&mut self) -> Result<Expr, String> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => ArithOp::Add,
                Some(Token::Minus) => ArithOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.multiplicative()?;
            lhs = arith(op, lhs, rhs)?;
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, String> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => ArithOp::Mul,
                Some(Token::Slash) => ArithOp::Div,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = arith(op, lhs, rhs)?;
        }
    }

    fn unary(&mut self) -> Result<Expr, String> {
        if self.eat(&Token::Minus) {
            let inner = self.unary()?;
            return match inner {
                Expr::Literal(PropertyValue::Long(v)) => Ok(Expr::Literal(PropertyValue::Long(-v))),
                Expr::Literal(PropertyValue::Double(v)) => {
                    Ok(Expr::Literal(PropertyValue::Double(-v)))
                }
                other if other.is_arithmetic_operand() => Ok(Expr::Neg(Box::new(other))),
                _ => Err("unary minus applied to a non-numeric operand".to_string()),
            };
        }
        if self.eat(&Token::Plus) {
            let inner = self.unary()?;
            if !inner.is_arithmetic_operand() {
                return Err("unary plus applied to a non-numeric operand".to_string());
            }
            return Ok(inner);
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, String> {
        match self.advance() {
            Some(Token::Ident(name)) => Ok(Expr::Identifier(name)),
            Some(Token::Str(s)) => Ok(Expr::Literal(PropertyValue::String(s))),
            Some(Token::Long(v)) => Ok(Expr::Literal(PropertyValue::Long(v))),
            Some(Token::Double(v)) => Ok(Expr::Literal(PropertyValue::Double(v))),
            Some(Token::True) => Ok(Expr::Literal(PropertyValue::Bool(true))),
            Some(Token::False) => Ok(Expr::Literal(PropertyValue::Bool(false))),
            Some(Token::Null) => Ok(Expr::Null),
            Some(Token::LParen) => {
                let inner = self.or_expr()?;
                self.expect(Token::RParen, "to close parenthesis")?;
                Ok(inner)
            }
            Some(tok) => Err(format!("unexpected {}", tok.describe())),
            None => Err("unexpected end of selector".to_string()),
        }
    }
}

fn conditional(expr: Expr) -> Result<Expr, String> {
    if expr.is_conditional() {
        Ok(expr)
    } else {
        Err("logical operator applied to a non-boolean operand".to_string())
    }
}

fn arith(op: ArithOp, lhs: Expr, rhs: Expr) -> Result<Expr, String> {
    if !lhs.is_arithmetic_operand() || !rhs.is_arithmetic_operand() {
        return Err("arithmetic applied to a non-numeric operand".to_string());
    }
    Ok(Expr::Arith(op, Box::new(lhs), Box::new(rhs)))
}

fn identifier_operand(expr: Expr, operator: &str) -> Result<String, String> {
    match expr {
        Expr::Identifier(name) => Ok(name),
        _ => Err(format!("{operator} requires an identifier on its left side")),
    }
}

fn compile_like(pattern: &str, escape: Option<char>) -> Result<Vec<LikeToken>, String> {
    let mut out = Vec::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if Some(c) == escape {
            match chars.next() {
                Some(next) => out.push(LikeToken::Literal(next)),
                None => return Err(format!("pattern '{pattern}' ends with the escape character")),
            }
            continue;
        }
        out.push(match c {
            '%' => LikeToken::AnyRun,
            '_' => LikeToken::AnyOne,
            other => LikeToken::Literal(other),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::selector::lexer::tokenize;

    fn parse_str(input: &str) -> Result<Expr, String> {
        parse(tokenize(input)?)
    }

    #[test]
    fn precedence_and_binds_tighter_than_or() {
        let expr = parse_str("a = 1 OR b = 2 AND c = 3").unwrap();
        match expr {
            Expr::Or(_, rhs) => assert!(matches!(*rhs, Expr::And(..))),
            other => panic!("unexpected tree {other:?}"),
        }
    }

    #[test]
    fn negative_literal_is_folded() {
        let expr = parse_str("x > -5").unwrap();
        assert_eq!(
            expr,
            Expr::Compare(
                CmpOp::Gt,
                Box::new(Expr::Identifier("x".into())),
                Box::new(Expr::Literal(PropertyValue::Long(-5)))
            )
        );
    }

    #[test]
    fn like_with_escape() {
        let expr = parse_str("name LIKE 'a\\_%' ESCAPE '\\'").unwrap();
        match expr {
            Expr::Like { pattern, negated, .. } => {
                assert!(!negated);
                assert_eq!(
                    pattern,
                    vec![LikeToken::Literal('a'), LikeToken::Literal('_'), LikeToken::AnyRun]
                );
            }
            other => panic!("unexpected tree {other:?}"),
        }
    }

    #[test]
    fn not_between_and_not_in() {
        assert!(matches!(
            parse_str("n NOT BETWEEN 1 AND 5").unwrap(),
            Expr::Between { negated: true, .. }
        ));
        assert!(matches!(
            parse_str("c NOT IN ('UK', 'US')").unwrap(),
            Expr::In { negated: true, .. }
        ));
        assert!(matches!(
            parse_str("c IS NOT NULL").unwrap(),
            Expr::IsNull { negated: true, .. }
        ));
    }

    #[test]
    fn rejects_malformed_selectors() {
        for bad in [
            "definitely not a message selector",
            "a = (1 + 2",
            "a = 1)",
            "1 + 2",
            "'abc'",
            "a ==",
            "a = 1 AND",
            "5 IN ('a')",
            "a LIKE 'x' ESCAPE 'ab'",
            "a IN (1, 2)",
            "NOT 3",
            "a = 'x' AND 4",
            "and = 1",
        ] {
            assert!(parse_str(bad).is_err(), "expected `{bad}` to be rejected");
        }
    }

    #[test]
    fn accepts_bare_boolean_identifier() {
        assert_eq!(parse_str("urgent").unwrap(), Expr::Identifier("urgent".into()));
    }
}
