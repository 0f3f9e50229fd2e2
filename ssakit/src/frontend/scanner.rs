use crate::error::IrError;
use crate::frontend::token::Location;
use crate::frontend::token::Token;
use crate::frontend::token::TokenKind;
use anyhow::Result;

pub struct Scanner {
    source: Vec<char>,
    tokens: Vec<Token>,
    start: usize,
    current: usize,
    line: usize,
    column: usize,
    token_location: Location,
}

impl Scanner {
    fn new(source: &str) -> Self {
        Scanner {
            source: source.chars().collect(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
            line: 0,
            column: 0,
            token_location: Location::new(0, 0),
        }
    }
    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }
    fn advance(&mut self) -> char {
        let c = self.source[self.current];
        self.current += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        c
    }
    fn peek(&self) -> char {
        if self.is_at_end() {
            return '\0';
        }
        self.source[self.current]
    }
    fn add_token(&mut self, kind: TokenKind) {
        let lexeme = if kind == TokenKind::Eof {
            String::new()
        } else {
            self.source[self.start..self.current].iter().collect()
        };
        self.tokens
            .push(Token::new(kind, lexeme, self.token_location.clone()));
    }
    fn is_identifier_start(c: char) -> bool {
        c.is_alphabetic() || c == '_' || c == '%' || c == '^'
    }
    fn is_identifier(c: char) -> bool {
        c.is_alphanumeric() || c == '_' || c == '.'
    }
    /// An `i` followed by digits only is an integer type such as `i8`.
    fn is_int_type(lexeme: &str) -> bool {
        match lexeme.strip_prefix('i') {
            Some(rest) => !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()),
            None => false,
        }
    }
    fn identifier(&mut self, first: char) {
        while Scanner::is_identifier(self.peek()) {
            self.advance();
        }
        let lexeme: String = self.source[self.start..self.current].iter().collect();
        let kind = match first {
            '%' => TokenKind::PercentIdentifier,
            '^' => TokenKind::CaretIdentifier,
            _ if Scanner::is_int_type(&lexeme) => TokenKind::IntType,
            _ => TokenKind::BareIdentifier,
        };
        self.add_token(kind);
    }
    fn number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        self.add_token(TokenKind::Integer);
    }
    fn string(&mut self) -> Result<()> {
        while self.peek() != '"' && !self.is_at_end() {
            let c = self.advance();
            // Skip the character after a backslash so escaped quotes do not
            // terminate the literal.
            if c == '\\' && !self.is_at_end() {
                self.advance();
            }
        }
        if self.is_at_end() {
            return Err(IrError::ParseFailure("Unterminated string".to_string()).into());
        }
        self.advance();
        self.add_token(TokenKind::Str);
        Ok(())
    }
    fn arrow_or_minus(&mut self) {
        if self.peek() == '>' {
            self.advance();
            self.add_token(TokenKind::Arrow);
        } else {
            self.add_token(TokenKind::Minus);
        }
    }
    fn line_comment(&mut self) {
        while self.peek() != '\n' && !self.is_at_end() {
            self.advance();
        }
    }
    fn scan_token(&mut self) -> Result<()> {
        let c = self.advance();
        match c {
            '(' => self.add_token(TokenKind::LParen),
            ')' => self.add_token(TokenKind::RParen),
            '{' => self.add_token(TokenKind::LBrace),
            '}' => self.add_token(TokenKind::RBrace),
            '[' => self.add_token(TokenKind::LBracket),
            ']' => self.add_token(TokenKind::RBracket),
            '<' => self.add_token(TokenKind::Less),
            '>' => self.add_token(TokenKind::Greater),
            ':' => self.add_token(TokenKind::Colon),
            ',' => self.add_token(TokenKind::Comma),
            '=' => self.add_token(TokenKind::Equal),
            '#' => self.add_token(TokenKind::Hash),
            '!' => self.add_token(TokenKind::Exclamation),
            ' ' | '\r' | '\t' | '\n' => (),
            '-' => self.arrow_or_minus(),
            '"' => self.string()?,
            '/' if self.peek() == '/' => self.line_comment(),
            c if c.is_ascii_digit() => self.number(),
            c if Scanner::is_identifier_start(c) => self.identifier(c),
            c => {
                let msg = Self::error(
                    &self.source.iter().collect::<String>(),
                    &self.token_location,
                    &format!("Scanning failed at: {c}"),
                );
                return Err(IrError::ParseFailure(msg).into());
            }
        }
        Ok(())
    }
    fn scan_tokens(&mut self) -> Result<()> {
        while !self.is_at_end() {
            self.start = self.current;
            self.token_location = Location::new(self.line, self.column);
            self.scan_token()?;
        }
        self.token_location = Location::new(self.line, self.column);
        self.add_token(TokenKind::Eof);
        Ok(())
    }
    pub fn scan(src: &str) -> Result<Vec<Token>> {
        let mut scanner = Scanner::new(src);
        scanner.scan_tokens()?;
        Ok(scanner.tokens)
    }
    /// Render a caret diagnostic pointing at `loc` in `src`.
    pub fn error(src: &str, loc: &Location, msg: &str) -> String {
        let lines = src.split('\n').collect::<Vec<&str>>();
        let n = loc.line();
        let line = lines.get(n).copied().unwrap_or("");
        let line_num_width = 4 + n.to_string().len();
        let err_indent = " ".repeat(loc.column() + line_num_width);
        format!("```\n{n}  | {line}\n{err_indent}^ {msg}\n```")
    }
}
