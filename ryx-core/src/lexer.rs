//! Lexical analysis for Ryx source.
//!
//! The scanner walks the raw byte buffer with a cursor, tracking 1-based
//! line and column positions. It produces the whole token sequence in one
//! pass, stops at the first invalid input with a single `Error` token,
//! and always terminates the sequence with exactly one `Eof` token.
//!
//! String literal lexemes keep their escape sequences raw; the bytes are
//! written through C's own string syntax at code generation time. Char
//! literals are decoded here.

/// Every kind of token the scanner can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Eof,
    Error,

    // Keywords
    Fn,
    Let,
    Mut,
    If,
    Else,
    Extern,
    While,
    For,
    Loop,
    Break,
    Continue,
    Return,
    Struct,
    Impl,
    In,
    Include,
    As,

    // Primitive type names
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Bool,
    Char,
    Str,

    // Arithmetic
    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    // Comparison
    EqEq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,

    // Logical
    AndAnd,
    OrOr,
    Not,

    // Bitwise
    And,
    Or,
    Xor,
    Shl,
    Shr,

    // Assignment
    Eq,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,

    // Delimiters
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semicolon,
    Colon,
    Comma,
    Dot,
    Arrow,
    DotDot,
    ColonColon,

    // Literals
    Identifier,
    IntLiteral,
    FloatLiteral,
    StringLiteral,
    CharLiteral,
    True,
    False,
}

/// Decoded payload of a literal token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenValue {
    Int(i64),
    Float(f64),
    Char(char),
    Bool(bool),
}

/// A token: its kind, the source slice it covers, and the 1-based position
/// of its first byte. Error tokens carry a static message in place of a
/// lexeme.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub lexeme: &'src str,
    pub line: usize,
    pub column: usize,
    pub value: Option<TokenValue>,
}

/// Scans `source` into a token sequence terminated by `Eof`.
pub fn scan(source: &str) -> Vec<Token<'_>> {
    let mut lexer = Lexer::new(source);
    lexer.scan_tokens()
}

struct Lexer<'src> {
    source: &'src str,
    bytes: &'src [u8],
    pos: usize,
    line: usize,
    column: usize,
}

impl<'src> Lexer<'src> {
    fn new(source: &'src str) -> Self {
        Lexer {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn scan_tokens(&mut self) -> Vec<Token<'src>> {
        let mut tokens = Vec::new();
        while !self.is_at_end() {
            let token = self.scan_token();
            let stop = matches!(token.kind, TokenKind::Error | TokenKind::Eof);
            tokens.push(token);
            if stop {
                break;
            }
        }
        if tokens.last().map(|t| t.kind) != Some(TokenKind::Eof) {
            tokens.push(self.eof_token());
        }
        tokens
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> u8 {
        if self.is_at_end() { 0 } else { self.bytes[self.pos] }
    }

    fn peek_next(&self) -> u8 {
        if self.pos + 1 >= self.bytes.len() {
            0
        } else {
            self.bytes[self.pos + 1]
        }
    }

    fn advance(&mut self) -> u8 {
        let byte = self.bytes[self.pos];
        self.pos += 1;
        if byte == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        byte
    }

    fn match_byte(&mut self, expected: u8) -> bool {
        if self.is_at_end() || self.peek() != expected {
            return false;
        }
        self.advance();
        true
    }

    /// Skips whitespace, line comments, and block comments. Returns an
    /// error token for an unterminated block comment.
    fn skip_whitespace(&mut self) -> Option<Token<'src>> {
        loop {
            match self.peek() {
                b' ' | b'\r' | b'\t' | b'\n' => {
                    self.advance();
                }
                b'/' if self.peek_next() == b'/' => {
                    while !self.is_at_end() && self.peek() != b'\n' {
                        self.advance();
                    }
                }
                b'/' if self.peek_next() == b'*' => {
                    self.advance();
                    self.advance();
                    let mut terminated = false;
                    while !self.is_at_end() {
                        if self.peek() == b'*' && self.peek_next() == b'/' {
                            self.advance();
                            self.advance();
                            terminated = true;
                            break;
                        }
                        self.advance();
                    }
                    if !terminated {
                        return Some(self.error_token("Unterminated block comment"));
                    }
                }
                _ => return None,
            }
        }
    }

    fn make_token(
        &self,
        kind: TokenKind,
        start: usize,
        line: usize,
        column: usize,
    ) -> Token<'src> {
        Token {
            kind,
            lexeme: &self.source[start..self.pos],
            line,
            column,
            value: None,
        }
    }

    fn error_token(&self, message: &'static str) -> Token<'src> {
        Token {
            kind: TokenKind::Error,
            lexeme: message,
            line: self.line,
            column: self.column,
            value: None,
        }
    }

    fn eof_token(&self) -> Token<'src> {
        Token {
            kind: TokenKind::Eof,
            lexeme: "",
            line: self.line,
            column: self.column,
            value: None,
        }
    }

    fn scan_token(&mut self) -> Token<'src> {
        if let Some(error) = self.skip_whitespace() {
            return error;
        }
        if self.is_at_end() {
            return self.eof_token();
        }

        let start = self.pos;
        let line = self.line;
        let column = self.column;
        let byte = self.advance();

        if byte.is_ascii_alphabetic() || byte == b'_' {
            return self.scan_identifier(start, line, column);
        }
        if byte.is_ascii_digit() {
            return self.scan_number(start, line, column);
        }

        let kind = match byte {
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            b';' => TokenKind::Semicolon,
            b',' => TokenKind::Comma,
            b'%' => TokenKind::Percent,
            b'^' => TokenKind::Xor,
            b':' => {
                if self.match_byte(b':') {
                    TokenKind::ColonColon
                } else {
                    TokenKind::Colon
                }
            }
            b'.' => {
                if self.match_byte(b'.') {
                    TokenKind::DotDot
                } else {
                    TokenKind::Dot
                }
            }
            b'+' => {
                if self.match_byte(b'=') {
                    TokenKind::PlusEq
                } else {
                    TokenKind::Plus
                }
            }
            b'-' => {
                if self.match_byte(b'=') {
                    TokenKind::MinusEq
                } else if self.match_byte(b'>') {
                    TokenKind::Arrow
                } else {
                    TokenKind::Minus
                }
            }
            b'*' => {
                if self.match_byte(b'=') {
                    TokenKind::StarEq
                } else {
                    TokenKind::Star
                }
            }
            b'/' => {
                if self.match_byte(b'=') {
                    TokenKind::SlashEq
                } else {
                    TokenKind::Slash
                }
            }
            b'!' => {
                if self.match_byte(b'=') {
                    TokenKind::NotEq
                } else {
                    TokenKind::Not
                }
            }
            b'=' => {
                if self.match_byte(b'=') {
                    TokenKind::EqEq
                } else {
                    TokenKind::Eq
                }
            }
            b'<' => {
                if self.match_byte(b'=') {
                    TokenKind::LtEq
                } else if self.match_byte(b'<') {
                    TokenKind::Shl
                } else {
                    TokenKind::Lt
                }
            }
            b'>' => {
                if self.match_byte(b'=') {
                    TokenKind::GtEq
                } else if self.match_byte(b'>') {
                    TokenKind::Shr
                } else {
                    TokenKind::Gt
                }
            }
            b'&' => {
                if self.match_byte(b'&') {
                    TokenKind::AndAnd
                } else {
                    TokenKind::And
                }
            }
            b'|' => {
                if self.match_byte(b'|') {
                    TokenKind::OrOr
                } else {
                    TokenKind::Or
                }
            }
            b'"' => return self.scan_string(start, line, column),
            b'\'' => return self.scan_char(start, line, column),
            _ => return self.error_token("Unexpected character"),
        };

        self.make_token(kind, start, line, column)
    }

    fn scan_identifier(&mut self, start: usize, line: usize, column: usize) -> Token<'src> {
        while self.peek().is_ascii_alphanumeric() || self.peek() == b'_' {
            self.advance();
        }
        let lexeme = &self.source[start..self.pos];
        let kind = keyword_kind(lexeme).unwrap_or(TokenKind::Identifier);
        let mut token = self.make_token(kind, start, line, column);
        match kind {
            TokenKind::True => token.value = Some(TokenValue::Bool(true)),
            TokenKind::False => token.value = Some(TokenValue::Bool(false)),
            _ => {}
        }
        token
    }

    fn scan_number(&mut self, start: usize, line: usize, column: usize) -> Token<'src> {
        let mut is_float = false;

        while self.peek().is_ascii_digit() {
            self.advance();
        }

        if self.peek() == b'.' && self.peek_next().is_ascii_digit() {
            is_float = true;
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        if self.peek() == b'e' || self.peek() == b'E' {
            is_float = true;
            self.advance();
            if self.peek() == b'+' || self.peek() == b'-' {
                self.advance();
            }
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let lexeme = &self.source[start..self.pos];
        if is_float {
            let Ok(value) = lexeme.parse::<f64>() else {
                return self.error_token("Invalid float literal");
            };
            let mut token = self.make_token(TokenKind::FloatLiteral, start, line, column);
            token.value = Some(TokenValue::Float(value));
            token
        } else {
            let Ok(value) = lexeme.parse::<i64>() else {
                return self.error_token("Integer literal out of range");
            };
            let mut token = self.make_token(TokenKind::IntLiteral, start, line, column);
            token.value = Some(TokenValue::Int(value));
            token
        }
    }

    fn scan_string(&mut self, start: usize, line: usize, column: usize) -> Token<'src> {
        while !self.is_at_end() && self.peek() != b'"' {
            if self.peek() == b'\\' {
                self.advance();
                if !self.is_at_end() {
                    self.advance();
                }
            } else {
                self.advance();
            }
        }

        if self.is_at_end() {
            return self.error_token("Unterminated string");
        }

        self.advance();
        self.make_token(TokenKind::StringLiteral, start, line, column)
    }

    fn scan_char(&mut self, start: usize, line: usize, column: usize) -> Token<'src> {
        if self.peek() == b'\\' {
            self.advance();
            if !self.is_at_end() {
                self.advance();
            }
        } else if !self.is_at_end() {
            self.advance();
        }

        if self.peek() != b'\'' {
            return self.error_token("Invalid character literal");
        }
        self.advance();

        let mut token = self.make_token(TokenKind::CharLiteral, start, line, column);
        let bytes = token.lexeme.as_bytes();
        if bytes.len() == 3 {
            token.value = Some(TokenValue::Char(bytes[1] as char));
        } else if bytes.len() == 4 && bytes[1] == b'\\' {
            let decoded = match bytes[2] {
                b'n' => '\n',
                b't' => '\t',
                b'r' => '\r',
                b'\\' => '\\',
                b'\'' => '\'',
                b'"' => '"',
                b'0' => '\0',
                other => other as char,
            };
            token.value = Some(TokenValue::Char(decoded));
        }
        token
    }
}

fn keyword_kind(lexeme: &str) -> Option<TokenKind> {
    let kind = match lexeme {
        "fn" => TokenKind::Fn,
        "let" => TokenKind::Let,
        "mut" => TokenKind::Mut,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "extern" => TokenKind::Extern,
        "while" => TokenKind::While,
        "for" => TokenKind::For,
        "loop" => TokenKind::Loop,
        "break" => TokenKind::Break,
        "continue" => TokenKind::Continue,
        "return" => TokenKind::Return,
        "struct" => TokenKind::Struct,
        "impl" => TokenKind::Impl,
        "in" => TokenKind::In,
        "include" => TokenKind::Include,
        "as" => TokenKind::As,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "i8" => TokenKind::I8,
        "i16" => TokenKind::I16,
        "i32" => TokenKind::I32,
        "i64" => TokenKind::I64,
        "u8" => TokenKind::U8,
        "u16" => TokenKind::U16,
        "u32" => TokenKind::U32,
        "u64" => TokenKind::U64,
        "f32" => TokenKind::F32,
        "f64" => TokenKind::F64,
        "bool" => TokenKind::Bool,
        "char" => TokenKind::Char,
        "str" => TokenKind::Str,
        _ => return None,
    };
    Some(kind)
}
