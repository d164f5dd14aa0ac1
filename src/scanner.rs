//! One-pass, streaming lexer over a UTF-8 byte slice.
//!
//! [`Scanner`] is an iterator yielding `Result<Token, LoxError>`: trivia
//! (whitespace, newlines, `//` comments) is consumed silently, every lexeme
//! is sliced zero-copy out of the source buffer, and exactly one `EOF`
//! token carrying the final line number is emitted before the iterator
//! fuses.  Errors carry the 1-based line they occurred on; the iterator can
//! keep scanning past an error, but the default pipeline collects into
//! `Result<Vec<_>>` and therefore stops at the first one.

use std::iter::FusedIterator;

use log::{debug, info};
use memchr::memchr;
use phf::phf_map;

use crate::error::{LoxError, Result};
use crate::token::{Token, TokenType};

/// Reserved words, resolved through a compile-time perfect hash.
static KEYWORDS: phf::Map<&'static [u8], TokenType> = phf_map! {
    b"and"    => TokenType::AND,
    b"break"  => TokenType::BREAK,
    b"class"  => TokenType::CLASS,
    b"else"   => TokenType::ELSE,
    b"false"  => TokenType::FALSE,
    b"fun"    => TokenType::FUN,
    b"for"    => TokenType::FOR,
    b"if"     => TokenType::IF,
    b"nil"    => TokenType::NIL,
    b"or"     => TokenType::OR,
    b"print"  => TokenType::PRINT,
    b"return" => TokenType::RETURN,
    b"super"  => TokenType::SUPER,
    b"this"   => TokenType::THIS,
    b"true"   => TokenType::TRUE,
    b"var"    => TokenType::VAR,
    b"while"  => TokenType::WHILE,
};

/// Streaming scanner.  The lifetime `'a` ties every emitted token's
/// `lexeme` slice back to the source buffer.
pub struct Scanner<'a> {
    src: &'a [u8],
    /// First byte of the lexeme currently being scanned.
    start: usize,
    /// One past the last byte examined.
    pos: usize,
    /// 1-based line counter; `\n` increments it.
    line: usize,
    eof_emitted: bool,
}

impl<'a> Scanner<'a> {
    pub fn new(src: &'a [u8]) -> Self {
        info!("Scanner created over {} bytes", src.len());

        Self {
            src,
            start: 0,
            pos: 0,
            line: 1,
            eof_emitted: false,
        }
    }

    /// Drains the whole iterator into a token vector, stopping at the
    /// first error.  This is what the pipeline driver uses.
    pub fn scan_tokens(self) -> Result<Vec<Token<'a>>> {
        self.collect()
    }

    // ───────────────────────── byte-level helpers ─────────────────────────

    #[inline(always)]
    fn is_at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    /// Consume and return the current byte.  Callers guard with
    /// [`Self::is_at_end`].
    #[inline(always)]
    fn advance(&mut self) -> u8 {
        let b = self.src[self.pos];
        self.pos += 1;
        b
    }

    /// Current byte without consuming it; `0` past the end so call sites
    /// need no branch.
    #[inline(always)]
    fn peek(&self) -> u8 {
        self.src.get(self.pos).copied().unwrap_or(0)
    }

    /// One byte beyond [`Self::peek`].  Safe at the end of input.
    #[inline(always)]
    fn peek_next(&self) -> u8 {
        self.src.get(self.pos + 1).copied().unwrap_or(0)
    }

    /// Consume the current byte only if it equals `expected`.
    #[inline(always)]
    fn match_next(&mut self, expected: u8) -> bool {
        if !self.is_at_end() && self.src[self.pos] == expected {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    // ─────────────────────────── trivia and lexemes ───────────────────────

    /// Skip whitespace, newlines, and `//` comments.  Stops at the first
    /// byte that can begin a token (a lone `/` included).
    fn skip_trivia(&mut self) {
        while !self.is_at_end() {
            match self.peek() {
                b' ' | b'\r' | b'\t' => {
                    self.pos += 1;
                }
                b'\n' => {
                    self.line += 1;
                    self.pos += 1;
                }
                b'/' if self.peek_next() == b'/' => {
                    // Bulk-skip to the next newline; memchr beats a
                    // byte-at-a-time loop on long comments.
                    match memchr(b'\n', &self.src[self.pos..]) {
                        Some(offset) => self.pos += offset,
                        None => self.pos = self.src.len(),
                    }
                }
                _ => break,
            }
        }
    }

    /// Scan a single non-trivia token starting at `self.start`.
    fn scan_token(&mut self) -> Result<Token<'a>> {
        let b = self.advance();

        let kind = match b {
            b'(' => TokenType::LEFT_PAREN,
            b')' => TokenType::RIGHT_PAREN,
            b'{' => TokenType::LEFT_BRACE,
            b'}' => TokenType::RIGHT_BRACE,
            b',' => TokenType::COMMA,
            b'.' => TokenType::DOT,
            b'-' => TokenType::MINUS,
            b'+' => TokenType::PLUS,
            b';' => TokenType::SEMICOLON,
            b'*' => TokenType::STAR,
            // `//` was already eaten as trivia.
            b'/' => TokenType::SLASH,

            b'!' => {
                if self.match_next(b'=') {
                    TokenType::BANG_EQUAL
                } else {
                    TokenType::BANG
                }
            }
            b'=' => {
                if self.match_next(b'=') {
                    TokenType::EQUAL_EQUAL
                } else {
                    TokenType::EQUAL
                }
            }
            b'<' => {
                if self.match_next(b'=') {
                    TokenType::LESS_EQUAL
                } else {
                    TokenType::LESS
                }
            }
            b'>' => {
                if self.match_next(b'=') {
                    TokenType::GREATER_EQUAL
                } else {
                    TokenType::GREATER
                }
            }

            b'"' => self.string()?,
            b'0'..=b'9' => self.number(),
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.identifier(),

            _ => {
                return Err(LoxError::lex(
                    self.line,
                    format!("Unexpected character: {}", b as char),
                ));
            }
        };

        Ok(self.make_token(kind))
    }

    fn make_token(&self, kind: TokenType) -> Token<'a> {
        let slice = &self.src[self.start..self.pos];

        // SAFETY: the source is valid UTF-8 by the caller's contract, and
        // every lexeme boundary falls on an ASCII byte.
        let lexeme: &str = unsafe { std::str::from_utf8_unchecked(slice) };

        debug!("Scanned {:?} on line {}", kind.name(), self.line);

        Token::new(kind, lexeme, self.line)
    }

    /// Double-quoted string literal.  Embedded newlines are allowed and
    /// counted.
    fn string(&mut self) -> Result<TokenType> {
        while !self.is_at_end() && self.peek() != b'"' {
            if self.advance() == b'\n' {
                self.line += 1;
            }
        }

        if self.is_at_end() {
            return Err(LoxError::lex(self.line, "Unterminated string."));
        }

        self.advance(); // closing quote

        // Contents without the surrounding quotes.
        let slice = &self.src[self.start + 1..self.pos - 1];

        // SAFETY: same argument as `make_token`; quotes are ASCII.
        let contents: &str = unsafe { std::str::from_utf8_unchecked(slice) };

        Ok(TokenType::STRING(contents.to_owned()))
    }

    /// Number literal: digits with an optional `.` fraction.  No exponent,
    /// no leading dot.
    fn number(&mut self) -> TokenType {
        while self.peek().is_ascii_digit() {
            self.pos += 1;
        }

        if self.peek() == b'.' && self.peek_next().is_ascii_digit() {
            self.pos += 1; // the dot

            while self.peek().is_ascii_digit() {
                self.pos += 1;
            }
        }

        let slice = &self.src[self.start..self.pos];

        // SAFETY: the slice holds only ASCII digits and `.`.
        let text: &str = unsafe { std::str::from_utf8_unchecked(slice) };

        // The lexeme was vetted digit by digit; parsing cannot fail.
        TokenType::NUMBER(text.parse::<f64>().unwrap_or(0.0))
    }

    /// Identifier or keyword.
    fn identifier(&mut self) -> TokenType {
        while {
            let b = self.peek();
            b.is_ascii_alphanumeric() || b == b'_'
        } {
            self.pos += 1;
        }

        KEYWORDS
            .get(&self.src[self.start..self.pos])
            .cloned()
            .unwrap_or(TokenType::IDENTIFIER)
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<Token<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_trivia();

        if self.is_at_end() {
            if self.eof_emitted {
                return None;
            }
            self.eof_emitted = true;

            return Some(Ok(Token::new(TokenType::EOF, "", self.line)));
        }

        self.start = self.pos;

        Some(self.scan_token())
    }
}

impl FusedIterator for Scanner<'_> {}
