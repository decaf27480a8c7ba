//! Line-oriented tokenizer for the rules DSL.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    // Punctuation
    Dot,
    Comma,
    Colon,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Assign,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
    Not,
    Plus,
    Minus,
    Star,
    Slash,
    Interp(String),
    Newline,
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    pub line: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { chars: src.chars().peekable(), line: 1 }
    }

    pub fn tokenize(src: &'a str) -> Result<Vec<(Token, usize)>, crate::error::RuleError> {
        let mut lexer = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let line = lexer.line;
            let tok = lexer.next_token()?;
            let is_eof = tok == Token::Eof;
            out.push((tok, line));
            if is_eof {
                break;
            }
        }
        Ok(out)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c == Some('\n') {
            self.line += 1;
        }
        c
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn next_token(&mut self) -> Result<Token, crate::error::RuleError> {
        loop {
            match self.peek() {
                None => return Ok(Token::Eof),
                Some(c) if c == '\n' => {
                    self.bump();
                    return Ok(Token::Newline);
                }
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('#') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }

        let line = self.line;
        let c = match self.peek() {
            Some(c) => c,
            None => return Ok(Token::Eof),
        };

        if c.is_ascii_digit() {
            return self.lex_number();
        }
        if c == '"' || c == '\'' {
            return self.lex_string(c);
        }
        if c == '_' || c.is_alphabetic() {
            return Ok(self.lex_ident());
        }

        self.bump();
        match c {
            '.' => Ok(Token::Dot),
            ',' => Ok(Token::Comma),
            ':' => Ok(Token::Colon),
            '(' => Ok(Token::LParen),
            ')' => Ok(Token::RParen),
            '{' => Ok(Token::LBrace),
            '}' => Ok(Token::RBrace),
            '+' => Ok(Token::Plus),
            '-' => Ok(Token::Minus),
            '*' => Ok(Token::Star),
            '/' => Ok(Token::Slash),
            '=' => {
                if self.peek() == Some('=') {
                    self.bump();
                    Ok(Token::Eq)
                } else {
                    Ok(Token::Assign)
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.bump();
                    Ok(Token::Neq)
                } else {
                    Ok(Token::Not)
                }
            }
            '<' => {
                if self.peek() == Some('=') {
                    self.bump();
                    Ok(Token::Lte)
                } else {
                    Ok(Token::Lt)
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.bump();
                    Ok(Token::Gte)
                } else {
                    Ok(Token::Gt)
                }
            }
            '&' => {
                if self.peek() == Some('&') {
                    self.bump();
                    Ok(Token::And)
                } else {
                    Err(crate::error::RuleError::Parse { line, message: "expected '&&'".into() })
                }
            }
            '|' => {
                if self.peek() == Some('|') {
                    self.bump();
                    Ok(Token::Or)
                } else {
                    Err(crate::error::RuleError::Parse { line, message: "expected '||'".into() })
                }
            }
            other => Err(crate::error::RuleError::Parse {
                line,
                message: format!("unexpected character {other:?}"),
            }),
        }
    }

    fn lex_number(&mut self) -> Result<Token, crate::error::RuleError> {
        let mut buf = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '.' {
                buf.push(c);
                self.bump();
            } else {
                break;
            }
        }
        buf.parse::<f64>()
            .map(Token::Number)
            .map_err(|e| crate::error::RuleError::Parse { line: self.line, message: e.to_string() })
    }

    fn lex_string(&mut self, quote: char) -> Result<Token, crate::error::RuleError> {
        let start_line = self.line;
        self.bump(); // consume opening quote
        let mut buf = String::new();
        let mut has_interp = false;
        loop {
            match self.bump() {
                None => {
                    return Err(crate::error::RuleError::Parse {
                        line: start_line,
                        message: "unterminated string literal".into(),
                    })
                }
                Some(c) if c == quote => break,
                Some('\\') => {
                    if let Some(escaped) = self.bump() {
                        buf.push(match escaped {
                            'n' => '\n',
                            't' => '\t',
                            other => other,
                        });
                    }
                }
                Some('$') if self.peek() == Some('{') => {
                    has_interp = true;
                    buf.push('$');
                    buf.push('{');
                    self.bump();
                    let mut depth = 1;
                    while depth > 0 {
                        match self.bump() {
                            Some('{') => {
                                depth += 1;
                                buf.push('{');
                            }
                            Some('}') => {
                                depth -= 1;
                                buf.push('}');
                            }
                            Some(other) => buf.push(other),
                            None => {
                                return Err(crate::error::RuleError::Parse {
                                    line: start_line,
                                    message: "unterminated ${...} interpolation".into(),
                                })
                            }
                        }
                    }
                }
                Some(c) => buf.push(c),
            }
        }
        Ok(if has_interp { Token::Interp(buf) } else { Token::Str(buf) })
    }

    fn lex_ident(&mut self) -> Token {
        let mut buf = String::new();
        while let Some(c) = self.peek() {
            if c == '_' || c.is_alphanumeric() {
                buf.push(c);
                self.bump();
            } else {
                break;
            }
        }
        Token::Ident(buf)
    }
}
