//! Tokenizer for the sandbox expression language.

use super::ScriptSyntaxError;

/// A lexical token.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Null,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Bang,
    Question,
    Colon,
    Semicolon,
    Comma,
    Dot,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
}

/// A token together with its byte offset in the source.
#[derive(Debug, Clone)]
pub(crate) struct Spanned {
    pub token: Token,
    pub offset: usize,
}

fn err(offset: usize, message: impl Into<String>) -> ScriptSyntaxError {
    ScriptSyntaxError {
        offset,
        message: message.into(),
    }
}

/// Tokenize expression source text.
pub(crate) fn tokenize(source: &str) -> Result<Vec<Spanned>, ScriptSyntaxError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let start = i;

        match b {
            b' ' | b'\t' | b'\r' | b'\n' => {
                i += 1;
            }
            b'0'..=b'9' => {
                let mut end = i + 1;
                while end < bytes.len() && bytes[end].is_ascii_digit() {
                    end += 1;
                }
                // A '.' is part of the number only when followed by a digit,
                // so `42.toUpperCase()` lexes as a method call.
                if end + 1 < bytes.len() && bytes[end] == b'.' && bytes[end + 1].is_ascii_digit() {
                    end += 2;
                    while end < bytes.len() && bytes[end].is_ascii_digit() {
                        end += 1;
                    }
                }
                let text = &source[i..end];
                let value: f64 = text
                    .parse()
                    .map_err(|_| err(start, format!("invalid number literal `{text}`")))?;
                tokens.push(Spanned {
                    token: Token::Number(value),
                    offset: start,
                });
                i = end;
            }
            b'\'' | b'"' => {
                let quote = b;
                let mut text = String::new();
                i += 1;
                loop {
                    if i >= bytes.len() {
                        return Err(err(start, "unterminated string literal"));
                    }
                    match bytes[i] {
                        c if c == quote => {
                            i += 1;
                            break;
                        }
                        b'\\' => {
                            i += 1;
                            if i >= bytes.len() {
                                return Err(err(start, "unterminated string literal"));
                            }
                            let escaped = match bytes[i] {
                                b'n' => '\n',
                                b't' => '\t',
                                b'\\' => '\\',
                                b'\'' => '\'',
                                b'"' => '"',
                                other => {
                                    return Err(err(
                                        i,
                                        format!("unknown escape sequence `\\{}`", other as char),
                                    ))
                                }
                            };
                            text.push(escaped);
                            i += 1;
                        }
                        _ => {
                            // Consume one full UTF-8 character.
                            let ch = source[i..]
                                .chars()
                                .next()
                                .ok_or_else(|| err(i, "invalid character in string"))?;
                            text.push(ch);
                            i += ch.len_utf8();
                        }
                    }
                }
                tokens.push(Spanned {
                    token: Token::Str(text),
                    offset: start,
                });
            }
            b'A'..=b'Z' | b'a'..=b'z' | b'_' => {
                let mut end = i + 1;
                while end < bytes.len()
                    && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_')
                {
                    end += 1;
                }
                let word = &source[i..end];
                let token = match word {
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    _ => Token::Ident(word.to_string()),
                };
                tokens.push(Spanned {
                    token,
                    offset: start,
                });
                i = end;
            }
            b'+' => {
                tokens.push(Spanned {
                    token: Token::Plus,
                    offset: start,
                });
                i += 1;
            }
            b'-' => {
                tokens.push(Spanned {
                    token: Token::Minus,
                    offset: start,
                });
                i += 1;
            }
            b'*' => {
                tokens.push(Spanned {
                    token: Token::Star,
                    offset: start,
                });
                i += 1;
            }
            b'/' => {
                tokens.push(Spanned {
                    token: Token::Slash,
                    offset: start,
                });
                i += 1;
            }
            b'%' => {
                tokens.push(Spanned {
                    token: Token::Percent,
                    offset: start,
                });
                i += 1;
            }
            b'=' => {
                if i + 1 < bytes.len() && bytes[i + 1] == b'=' {
                    tokens.push(Spanned {
                        token: Token::EqEq,
                        offset: start,
                    });
                    i += 2;
                } else {
                    return Err(err(
                        start,
                        "assignment is not allowed in expressions (did you mean `==`?)",
                    ));
                }
            }
            b'!' => {
                if i + 1 < bytes.len() && bytes[i + 1] == b'=' {
                    tokens.push(Spanned {
                        token: Token::NotEq,
                        offset: start,
                    });
                    i += 2;
                } else {
                    tokens.push(Spanned {
                        token: Token::Bang,
                        offset: start,
                    });
                    i += 1;
                }
            }
            b'<' => {
                if i + 1 < bytes.len() && bytes[i + 1] == b'=' {
                    tokens.push(Spanned {
                        token: Token::Le,
                        offset: start,
                    });
                    i += 2;
                } else {
                    tokens.push(Spanned {
                        token: Token::Lt,
                        offset: start,
                    });
                    i += 1;
                }
            }
            b'>' => {
                if i + 1 < bytes.len() && bytes[i + 1] == b'=' {
                    tokens.push(Spanned {
                        token: Token::Ge,
                        offset: start,
                    });
                    i += 2;
                } else {
                    tokens.push(Spanned {
                        token: Token::Gt,
                        offset: start,
                    });
                    i += 1;
                }
            }
            b'&' => {
                if i + 1 < bytes.len() && bytes[i + 1] == b'&' {
                    tokens.push(Spanned {
                        token: Token::AndAnd,
                        offset: start,
                    });
                    i += 2;
                } else {
                    return Err(err(start, "single `&` is not a valid operator"));
                }
            }
            b'|' => {
                if i + 1 < bytes.len() && bytes[i + 1] == b'|' {
                    tokens.push(Spanned {
                        token: Token::OrOr,
                        offset: start,
                    });
                    i += 2;
                } else {
                    return Err(err(start, "single `|` is not a valid operator"));
                }
            }
            b'?' => {
                tokens.push(Spanned {
                    token: Token::Question,
                    offset: start,
                });
                i += 1;
            }
            b':' => {
                tokens.push(Spanned {
                    token: Token::Colon,
                    offset: start,
                });
                i += 1;
            }
            b';' => {
                tokens.push(Spanned {
                    token: Token::Semicolon,
                    offset: start,
                });
                i += 1;
            }
            b',' => {
                tokens.push(Spanned {
                    token: Token::Comma,
                    offset: start,
                });
                i += 1;
            }
            b'.' => {
                tokens.push(Spanned {
                    token: Token::Dot,
                    offset: start,
                });
                i += 1;
            }
            b'(' => {
                tokens.push(Spanned {
                    token: Token::LParen,
                    offset: start,
                });
                i += 1;
            }
            b')' => {
                tokens.push(Spanned {
                    token: Token::RParen,
                    offset: start,
                });
                i += 1;
            }
            b'{' => {
                tokens.push(Spanned {
                    token: Token::LBrace,
                    offset: start,
                });
                i += 1;
            }
            b'}' => {
                tokens.push(Spanned {
                    token: Token::RBrace,
                    offset: start,
                });
                i += 1;
            }
            b'[' => {
                tokens.push(Spanned {
                    token: Token::LBracket,
                    offset: start,
                });
                i += 1;
            }
            b']' => {
                tokens.push(Spanned {
                    token: Token::RBracket,
                    offset: start,
                });
                i += 1;
            }
            other => {
                return Err(err(
                    start,
                    format!("unexpected character `{}`", other as char),
                ));
            }
        }
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        tokenize(src).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn lexes_numbers_and_operators() {
        assert_eq!(
            kinds("1 + 2.5"),
            vec![Token::Number(1.0), Token::Plus, Token::Number(2.5)]
        );
    }

    #[test]
    fn dot_after_number_is_a_method_dot() {
        assert_eq!(
            kinds("42.abs"),
            vec![
                Token::Number(42.0),
                Token::Dot,
                Token::Ident("abs".to_string())
            ]
        );
    }

    #[test]
    fn lexes_string_escapes() {
        assert_eq!(
            kinds(r#"'a\'b' "c\nd""#),
            vec![Token::Str("a'b".to_string()), Token::Str("c\nd".to_string())]
        );
    }

    #[test]
    fn lexes_keywords() {
        assert_eq!(kinds("true false null"), vec![Token::True, Token::False, Token::Null]);
    }

    #[test]
    fn lone_equals_is_rejected() {
        assert!(tokenize("a = 1").is_err());
    }

    #[test]
    fn unterminated_string_is_rejected() {
        let err = tokenize("'abc").unwrap_err();
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn unexpected_character_reports_offset() {
        let err = tokenize("1 @ 2").unwrap_err();
        assert_eq!(err.offset, 2);
    }
}
