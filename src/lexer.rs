use thiserror::Error;

use crate::token::{Span, Token, TokenKind};

/// Spaces per indentation level.
const INDENT_WIDTH: usize = 2;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("Unterminated string literal at position {position}")]
    UnterminatedString { position: usize },
    #[error("Unrecognized escape sequence '\\{escape}' at position {position}")]
    InvalidEscape { escape: char, position: usize },
    #[error("Unexpected end of line inside string literal at position {position}")]
    UnexpectedEndOfLine { position: usize },
    #[error("Invalid integer literal '{literal}' at position {position}")]
    InvalidIntegerLiteral { literal: String, position: usize },
    #[error("Indentation of {spaces} spaces at position {position} is not a multiple of 2")]
    OddIndentation { spaces: usize, position: usize },
    #[error("Tabs are not supported for indentation at position {position}")]
    TabIndentation { position: usize },
    #[error("Unexpected character '{character}' at position {position}")]
    UnexpectedCharacter { character: char, position: usize },
}

pub type LexResult<T> = Result<T, LexError>;

/// Tokenizes the whole input up front and exposes a cursor over the result.
///
/// The token vector is immutable after construction; the cursor position is
/// the only mutable state the parser sees.
pub struct Lexer {
    tokens: Vec<Token>,
    pos: usize,
}

impl Lexer {
    pub fn new(input: &str) -> LexResult<Self> {
        Ok(Self {
            tokens: Scanner::new(input).scan()?,
            pos: 0,
        })
    }

    /// Token under the cursor.
    pub fn current_token(&self) -> &Token {
        &self.tokens[self.pos]
    }

    /// Advances the cursor and returns the new current token. Past the end
    /// of the stream this keeps returning `Eof`.
    pub fn next_token(&mut self) -> &Token {
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        self.current_token()
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn into_tokens(self) -> Vec<Token> {
        self.tokens
    }
}

pub fn tokenize(input: &str) -> LexResult<Vec<Token>> {
    Lexer::new(input).map(Lexer::into_tokens)
}

/// Single-pass scanner behind [`Lexer::new`].
struct Scanner<'a> {
    input: &'a str,
    pos: usize,
    /// Leading spaces of the most recent significant line.
    indent: usize,
    tokens: Vec<Token>,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            indent: 0,
            tokens: Vec::new(),
        }
    }

    fn scan(mut self) -> LexResult<Vec<Token>> {
        while let Some(ch) = self.peek_char() {
            match ch {
                '\n' => self.scan_newline()?,
                '\'' | '"' => self.scan_string()?,
                c if c.is_ascii_alphabetic() || c == '_' => self.scan_identifier(),
                '=' | '<' | '>' | '!' => self.scan_comparison_or_char(),
                '#' => self.skip_comment(),
                c if c.is_ascii_punctuation() => {
                    let start = self.current_index();
                    self.consume_char();
                    self.push(TokenKind::Char(c), start);
                }
                c if c.is_ascii_digit() => self.scan_number()?,
                ' ' | '\r' => {
                    self.consume_char();
                }
                other => {
                    return Err(LexError::UnexpectedCharacter {
                        character: other,
                        position: self.current_index(),
                    });
                }
            }
        }

        // End-of-input closure: terminate the last statement, then unwind
        // any open indentation before Eof.
        if !matches!(
            self.last_kind(),
            None | Some(TokenKind::Newline) | Some(TokenKind::Dedent)
        ) {
            let index = self.current_index();
            self.push(TokenKind::Newline, index);
        }
        while self.indent >= INDENT_WIDTH {
            self.indent -= INDENT_WIDTH;
            let index = self.current_index();
            self.push(TokenKind::Dedent, index);
        }
        let index = self.current_index();
        self.push(TokenKind::Eof, index);
        Ok(self.tokens)
    }

    fn scan_newline(&mut self) -> LexResult<()> {
        let start = self.current_index();
        self.consume_char();
        // Consecutive blank lines collapse into a single Newline.
        if !matches!(self.last_kind(), None | Some(TokenKind::Newline)) {
            self.push(TokenKind::Newline, start);
        }
        self.scan_indentation()
    }

    fn scan_indentation(&mut self) -> LexResult<()> {
        let line_start = self.current_index();
        let spaces = self.consume_while(|c| c == ' ');

        match self.peek_char() {
            Some('\t') => {
                return Err(LexError::TabIndentation {
                    position: self.current_index(),
                });
            }
            // Blank and comment-only lines leave the indentation level
            // untouched. End of input still unwinds below.
            Some('\n') | Some('#') => return Ok(()),
            _ => {}
        }

        if spaces % INDENT_WIDTH != 0 {
            return Err(LexError::OddIndentation {
                spaces,
                position: line_start,
            });
        }

        let levels = (spaces as i32 - self.indent as i32) / INDENT_WIDTH as i32;
        self.indent = spaces;
        let kind = if levels > 0 {
            TokenKind::Indent
        } else {
            TokenKind::Dedent
        };
        for _ in 0..levels.abs() {
            self.tokens.push(Token::new(
                kind.clone(),
                Span {
                    start: line_start,
                    end: self.current_index(),
                },
            ));
        }
        Ok(())
    }

    fn scan_string(&mut self) -> LexResult<()> {
        let start = self.current_index();
        let quote = match self.consume_char() {
            Some(c) => c,
            None => return Ok(()),
        };
        let mut value = String::new();

        loop {
            let Some(ch) = self.consume_char() else {
                return Err(LexError::UnterminatedString { position: start });
            };
            match ch {
                c if c == quote => break,
                '\\' => {
                    let position = self.current_index();
                    let Some(escape) = self.consume_char() else {
                        return Err(LexError::UnterminatedString { position: start });
                    };
                    match escape {
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        'r' => value.push('\r'),
                        '"' => value.push('"'),
                        '\'' => value.push('\''),
                        '\\' => value.push('\\'),
                        other => {
                            return Err(LexError::InvalidEscape {
                                escape: other,
                                position,
                            });
                        }
                    }
                }
                '\n' | '\r' => {
                    return Err(LexError::UnexpectedEndOfLine { position: start });
                }
                other => value.push(other),
            }
        }

        self.push(TokenKind::String(value), start);
        Ok(())
    }

    fn scan_identifier(&mut self) {
        let start = self.current_index();
        self.consume_while(|c| c.is_ascii_alphanumeric() || c == '_');
        let ident = &self.input[start..self.current_index()];

        let kind = match ident {
            "class" => TokenKind::Class,
            "return" => TokenKind::Return,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "def" => TokenKind::Def,
            "print" => TokenKind::Print,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "None" => TokenKind::None,
            "True" => TokenKind::True,
            "False" => TokenKind::False,
            _ => TokenKind::Id(ident.to_string()),
        };
        self.push(kind, start);
    }

    fn scan_comparison_or_char(&mut self) {
        let start = self.current_index();
        let Some(first) = self.consume_char() else {
            return;
        };
        if self.peek_char() == Some('=') {
            let kind = match first {
                '=' => Some(TokenKind::Eq),
                '!' => Some(TokenKind::NotEq),
                '<' => Some(TokenKind::LessOrEq),
                '>' => Some(TokenKind::GreaterOrEq),
                _ => None,
            };
            if let Some(kind) = kind {
                self.consume_char();
                self.push(kind, start);
                return;
            }
        }
        self.push(TokenKind::Char(first), start);
    }

    fn scan_number(&mut self) -> LexResult<()> {
        let start = self.current_index();
        self.consume_while(|c| c.is_ascii_digit());
        let literal = &self.input[start..self.current_index()];

        let value = literal
            .parse::<i32>()
            .map_err(|_| LexError::InvalidIntegerLiteral {
                literal: literal.to_string(),
                position: start,
            })?;
        self.push(TokenKind::Number(value), start);
        Ok(())
    }

    fn skip_comment(&mut self) {
        self.consume_while(|c| c != '\n');
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token::new(
            kind,
            Span {
                start,
                end: self.current_index(),
            },
        ));
    }

    fn last_kind(&self) -> Option<&TokenKind> {
        self.tokens.last().map(Token::kind)
    }

    fn consume_while<P>(&mut self, keep_predicate: P) -> usize
    where
        P: Fn(char) -> bool,
    {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if !keep_predicate(c) {
                break;
            }
            self.consume_char();
        }
        self.pos - start
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn consume_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn current_index(&self) -> usize {
        self.pos
    }
}
