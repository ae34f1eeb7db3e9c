use std::iter::Peekable;
use std::str::CharIndices;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Ident(String),
    Str(String),
    Long(i64),
    Double(f64),
    True,
    False,
    Null,
    And,
    Or,
    Not,
    Between,
    In,
    Like,
    Escape,
    Is,
    LParen,
    RParen,
    Comma,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
}

impl Token {
    pub(crate) fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("identifier '{name}'"),
            Token::Str(s) => format!("string '{s}'"),
            Token::Long(v) => format!("number {v}"),
            Token::Double(v) => format!("number {v}"),
            other => format!("{other:?}").to_ascii_uppercase(),
        }
    }
}

fn keyword(word: &str) -> Option<Token> {
    let token = match word.to_ascii_uppercase().as_str() {
        "TRUE" => Token::True,
        "FALSE" => Token::False,
        "NULL" => Token::Null,
        "AND" => Token::And,
        "OR" => Token::Or,
        "NOT" => Token::Not,
        "BETWEEN" => Token::Between,
        "IN" => Token::In,
        "LIKE" => Token::Like,
        "ESCAPE" => Token::Escape,
        "IS" => Token::Is,
        _ => return None,
    };
    Some(token)
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Splits a selector string into tokens. Errors carry a human-readable
/// reason; the caller wraps them into `InvalidSelector`.
pub(crate) fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if is_ident_start(c) {
            let mut word = String::new();
            while let Some(&(_, c)) = chars.peek() {
                if !is_ident_part(c) {
                    break;
                }
                word.push(c);
                chars.next();
            }
            tokens.push(keyword(&word).unwrap_or(Token::Ident(word)));
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && next_is_digit(input, pos)) {
            tokens.push(number(&mut chars)?);
            continue;
        }

        chars.next();
        let token = match c {
            '\'' => Token::Str(string_literal(&mut chars, pos)?),
            '(' => Token::LParen,
            ')' => Token::RParen,
            ',' => Token::Comma,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '=' => Token::Eq,
            '<' => match chars.peek() {
                Some(&(_, '>')) => {
                    chars.next();
                    Token::Ne
                }
                Some(&(_, '=')) => {
                    chars.next();
                    Token::Le
                }
                _ => Token::Lt,
            },
            '>' => match chars.peek() {
                Some(&(_, '=')) => {
                    chars.next();
                    Token::Ge
                }
                _ => Token::Gt,
            },
            other => return Err(format!("unexpected character '{other}' at offset {pos}")),
        };
        tokens.push(token);
    }

    Ok(tokens)
}

fn next_is_digit(input: &str, pos: usize) -> bool {
    input[pos + 1..]
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit())
}

fn string_literal(chars: &mut Peekable<CharIndices<'_>>, start: usize) -> Result<String, String> {
    let mut out = String::new();
    loop {
        match chars.next() {
            Some((_, '\'')) => {
                // '' inside a literal is an escaped quote
                if let Some(&(_, '\'')) = chars.peek() {
                    chars.next();
                    out.push('\'');
                } else {
                    return Ok(out);
                }
            }
            Some((_, c)) => out.push(c),
            None => return Err(format!("unterminated string literal starting at offset {start}")),
        }
    }
}

fn take_digits(chars: &mut Peekable<CharIndices<'_>>, text: &mut String) {
    while let Some(&(_, c)) = chars.peek() {
        if !c.is_ascii_digit() {
            break;
        }
        text.push(c);
        chars.next();
    }
}

fn number(chars: &mut Peekable<CharIndices<'_>>) -> Result<Token, String> {
    let mut text = String::new();
    let mut approximate = false;

    take_digits(chars, &mut text);
    if let Some(&(_, '.')) = chars.peek() {
        approximate = true;
        text.push('.');
        chars.next();
        take_digits(chars, &mut text);
    }
    if let Some(&(_, 'e' | 'E')) = chars.peek() {
        approximate = true;
        text.push('e');
        chars.next();
        if let Some(&(_, sign @ ('+' | '-'))) = chars.peek() {
            text.push(sign);
            chars.next();
        }
        let before = text.len();
        take_digits(chars, &mut text);
        if text.len() == before {
            return Err(format!("malformed exponent in number '{text}'"));
        }
    }

    // Java-style type suffixes
    match chars.peek() {
        Some(&(_, 'l' | 'L')) if !approximate => {
            chars.next();
        }
        Some(&(_, 'f' | 'F' | 'd' | 'D')) => {
            approximate = true;
            chars.next();
        }
        _ => {}
    }

    if let Some(&(_, c)) = chars.peek() {
        if is_ident_part(c) {
            return Err(format!("malformed number '{text}{c}'"));
        }
    }

    if approximate {
        text.parse::<f64>()
            .map(Token::Double)
            .map_err(|e| format!("malformed number '{text}': {e}"))
    } else {
        text.parse::<i64>()
            .map(Token::Long)
            .map_err(|e| format!("malformed number '{text}': {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_are_case_insensitive() {
        let tokens = tokenize("a Is NoT nUlL").unwrap();
        assert_eq!(
            tokens,
            vec![Token::Ident("a".into()), Token::Is, Token::Not, Token::Null]
        );
    }

    #[test]
    fn operators_and_literals() {
        let tokens = tokenize("x<>'it''s' AND y >= 2.5e1 OR z <= 7").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("x".into()),
                Token::Ne,
                Token::Str("it's".into()),
                Token::And,
                Token::Ident("y".into()),
                Token::Ge,
                Token::Double(25.0),
                Token::Or,
                Token::Ident("z".into()),
                Token::Le,
                Token::Long(7),
            ]
        );
    }

    #[test]
    fn leading_dot_number() {
        assert_eq!(tokenize(".5").unwrap(), vec![Token::Double(0.5)]);
    }

    #[test]
    fn rejects_unknown_character() {
        let err = tokenize("definitely not a message selector!").unwrap_err();
        assert!(err.contains('!'), "{err}");
    }

    #[test]
    fn rejects_unterminated_string() {
        assert!(tokenize("name = 'abc").is_err());
    }

    #[test]
    fn rejects_glued_identifier_after_number() {
        assert!(tokenize("12abc").is_err());
    }
}
