use std::cmp::Ordering;
use std::collections::HashMap;

use crate::core::message::{Message, PropertyValue};
use crate::core::selector::parser::{ArithOp, CmpOp, Expr, LikeToken};

/// Anything a selector can be evaluated against.
pub trait PropertySource {
    /// Value of the named identifier, or `None` when it is absent (NULL).
    fn lookup(&self, name: &str) -> Option<PropertyValue>;
}

impl PropertySource for HashMap<String, PropertyValue> {
    fn lookup(&self, name: &str) -> Option<PropertyValue> {
        self.get(name).cloned()
    }
}

impl PropertySource for Message {
    fn lookup(&self, name: &str) -> Option<PropertyValue> {
        match name {
            "JMSMessageID" => self.message_id().map(PropertyValue::from),
            "JMSTimestamp" => Some(PropertyValue::Long(self.timestamp() as i64)),
            "JMSPriority" => Some(PropertyValue::Long(self.priority() as i64)),
            "JMSCorrelationID" => self.correlation_id().map(PropertyValue::from),
            "JMSType" => self.message_type().map(PropertyValue::from),
            "JMSDeliveryMode" => Some(PropertyValue::from(self.delivery_mode().as_str())),
            "JMSXDeliveryCount" => Some(PropertyValue::Long(self.delivery_count() as i64 + 1)),
            _ => self.property(name).cloned(),
        }
    }
}

/// SQL-style three-valued truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tri {
    True,
    False,
    Unknown,
}

impl Tri {
    fn from_bool(b: bool) -> Self {
        if b {
            Tri::True
        } else {
            Tri::False
        }
    }

    fn not(self) -> Self {
        match self {
            Tri::True => Tri::False,
            Tri::False => Tri::True,
            Tri::Unknown => Tri::Unknown,
        }
    }

    fn and(self, other: Tri) -> Self {
        match (self, other) {
            (Tri::False, _) | (_, Tri::False) => Tri::False,
            (Tri::True, Tri::True) => Tri::True,
            _ => Tri::Unknown,
        }
    }

    fn or(self, other: Tri) -> Self {
        match (self, other) {
            (Tri::True, _) | (_, Tri::True) => Tri::True,
            (Tri::False, Tri::False) => Tri::False,
            _ => Tri::Unknown,
        }
    }

    fn negate_if(self, negated: bool) -> Self {
        if negated {
            self.not()
        } else {
            self
        }
    }
}

pub(crate) fn evaluate(expr: &Expr, src: &dyn PropertySource) -> Tri {
    match expr {
        Expr::Literal(PropertyValue::Bool(b)) => Tri::from_bool(*b),
        Expr::Identifier(name) => match src.lookup(name) {
            Some(PropertyValue::Bool(b)) => Tri::from_bool(b),
            Some(_) => Tri::False,
            None => Tri::Unknown,
        },
        Expr::Not(inner) => evaluate(inner, src).not(),
        Expr::And(lhs, rhs) => {
            let left = evaluate(lhs, src);
            if left == Tri::False {
                return Tri::False;
            }
            left.and(evaluate(rhs, src))
        }
        Expr::Or(lhs, rhs) => {
            let left = evaluate(lhs, src);
            if left == Tri::True {
                return Tri::True;
            }
            left.or(evaluate(rhs, src))
        }
        Expr::Compare(op, lhs, rhs) => match (value(lhs, src), value(rhs, src)) {
            (Some(a), Some(b)) => compare(*op, &a, &b),
            _ => Tri::Unknown,
        },
        Expr::Between {
            expr,
            low,
            high,
            negated,
        } => match (value(expr, src), value(low, src), value(high, src)) {
            (Some(v), Some(lo), Some(hi)) => compare(CmpOp::Ge, &v, &lo)
                .and(compare(CmpOp::Le, &v, &hi))
                .negate_if(*negated),
            _ => Tri::Unknown,
        },
        Expr::In {
            ident,
            values,
            negated,
        } => match src.lookup(ident) {
            Some(PropertyValue::String(s)) => {
                Tri::from_bool(values.iter().any(|v| *v == s)).negate_if(*negated)
            }
            _ => Tri::Unknown,
        },
        Expr::Like {
            ident,
            pattern,
            negated,
        } => match src.lookup(ident) {
            Some(PropertyValue::String(s)) => {
                Tri::from_bool(like_matches(pattern, &s)).negate_if(*negated)
            }
            _ => Tri::Unknown,
        },
        Expr::IsNull { ident, negated } => {
            Tri::from_bool(src.lookup(ident).is_none()).negate_if(*negated)
        }
        Expr::Null => Tri::Unknown,
        Expr::Literal(_) | Expr::Neg(_) | Expr::Arith(..) => Tri::Unknown,
    }
}

fn value(expr: &Expr, src: &dyn PropertySource) -> Option<PropertyValue> {
    match expr {
        Expr::Literal(v) => Some(v.clone()),
        Expr::Null => None,
        Expr::Identifier(name) => src.lookup(name),
        Expr::Neg(inner) => match value(inner, src)? {
            PropertyValue::Long(v) => v.checked_neg().map(PropertyValue::Long),
            PropertyValue::Double(v) => Some(PropertyValue::Double(-v)),
            _ => None,
        },
        Expr::Arith(op, lhs, rhs) => arithmetic(*op, value(lhs, src)?, value(rhs, src)?),
        conditional => match evaluate(conditional, src) {
            Tri::True => Some(PropertyValue::Bool(true)),
            Tri::False => Some(PropertyValue::Bool(false)),
            Tri::Unknown => None,
        },
    }
}

fn arithmetic(op: ArithOp, lhs: PropertyValue, rhs: PropertyValue) -> Option<PropertyValue> {
    match (lhs, rhs) {
        (PropertyValue::Long(a), PropertyValue::Long(b)) => {
            let result = match op {
                ArithOp::Add => a.checked_add(b),
                ArithOp::Sub => a.checked_sub(b),
                ArithOp::Mul => a.checked_mul(b),
                ArithOp::Div => a.checked_div(b),
            };
            result.map(PropertyValue::Long)
        }
        (a, b) => {
            let (a, b) = (as_f64(&a)?, as_f64(&b)?);
            let result = match op {
                ArithOp::Add => a + b,
                ArithOp::Sub => a - b,
                ArithOp::Mul => a * b,
                ArithOp::Div => a / b,
            };
            Some(PropertyValue::Double(result))
        }
    }
}

fn as_f64(v: &PropertyValue) -> Option<f64> {
    match v {
        PropertyValue::Long(n) => Some(*n as f64),
        PropertyValue::Double(d) => Some(*d),
        _ => None,
    }
}

fn compare(op: CmpOp, a: &PropertyValue, b: &PropertyValue) -> Tri {
    let ordering = match (a, b) {
        (PropertyValue::Long(x), PropertyValue::Long(y)) => Some(x.cmp(y)),
        (PropertyValue::Long(_) | PropertyValue::Double(_), PropertyValue::Long(_) | PropertyValue::Double(_)) => {
            match (as_f64(a), as_f64(b)) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => None,
            }
        }
        // Strings and booleans only support equality.
        (PropertyValue::String(x), PropertyValue::String(y)) if matches!(op, CmpOp::Eq | CmpOp::Ne) => {
            Some(x.cmp(y))
        }
        (PropertyValue::Bool(x), PropertyValue::Bool(y)) if matches!(op, CmpOp::Eq | CmpOp::Ne) => {
            Some(x.cmp(y))
        }
        _ => None,
    };

    let Some(ordering) = ordering else {
        return Tri::False;
    };

    Tri::from_bool(match op {
        CmpOp::Eq => ordering == Ordering::Equal,
        CmpOp::Ne => ordering != Ordering::Equal,
        CmpOp::Lt => ordering == Ordering::Less,
        CmpOp::Le => ordering != Ordering::Greater,
        CmpOp::Gt => ordering == Ordering::Greater,
        CmpOp::Ge => ordering != Ordering::Less,
    })
}

fn like_matches(pattern: &[LikeToken], text: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let (mut p, mut t) = (0usize, 0usize);
    // (pattern index of last %, text index it is currently absorbing up to)
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some(LikeToken::AnyOne) => {
                p += 1;
                t += 1;
            }
            Some(LikeToken::Literal(c)) if *c == text[t] => {
                p += 1;
                t += 1;
            }
            Some(LikeToken::AnyRun) => {
                backtrack = Some((p, t));
                p += 1;
            }
            _ => match backtrack {
                Some((star, absorbed)) => {
                    p = star + 1;
                    t = absorbed + 1;
                    backtrack = Some((star, absorbed + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|tok| *tok == LikeToken::AnyRun)
}
