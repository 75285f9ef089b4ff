//! Lexer for executable GraphQL documents.

use crate::token::{Token, TokenKind};
use gqlx_core::Span;

/// A lexer over GraphQL source text.
///
/// Whitespace, line terminators, commas, comments and a leading BOM are
/// insignificant and never produce tokens.
pub struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: u32,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer.
    #[must_use]
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
        }
    }

    /// Returns the current position.
    #[inline]
    #[must_use]
    pub fn pos(&self) -> u32 {
        self.pos
    }

    #[inline]
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos as usize).copied()
    }

    #[inline]
    fn peek_at(&self, offset: u32) -> Option<u8> {
        self.bytes.get((self.pos + offset) as usize).copied()
    }

    #[inline]
    fn advance(&mut self) {
        self.pos += 1;
    }

    #[inline]
    fn advance_by(&mut self, n: u32) {
        self.pos += n;
    }

    #[inline]
    fn rest(&self) -> &'a [u8] {
        &self.bytes[self.pos as usize..]
    }

    /// Scans the next token.
    pub fn next_token(&mut self) -> Token {
        self.skip_trivia();

        let start = self.pos;

        let Some(c) = self.peek() else {
            return Token::new(TokenKind::Eof, Span::empty(start));
        };

        let kind = match c {
            b'{' => self.single(TokenKind::LBrace),
            b'}' => self.single(TokenKind::RBrace),
            b'(' => self.single(TokenKind::LParen),
            b')' => self.single(TokenKind::RParen),
            b'[' => self.single(TokenKind::LBracket),
            b']' => self.single(TokenKind::RBracket),
            b':' => self.single(TokenKind::Colon),
            b'=' => self.single(TokenKind::Eq),
            b'|' => self.single(TokenKind::Pipe),
            b'&' => self.single(TokenKind::Amp),
            b'@' => self.single(TokenKind::At),
            b'!' => self.single(TokenKind::Bang),
            b'$' => self.single(TokenKind::Dollar),
            b'.' => {
                if self.peek_at(1) == Some(b'.') && self.peek_at(2) == Some(b'.') {
                    self.advance_by(3);
                    TokenKind::Spread
                } else {
                    self.single(TokenKind::Error)
                }
            }

            b'"' => self.scan_string(),
            b'-' | b'0'..=b'9' => self.scan_number(),
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.scan_name(),

            _ => {
                // Consume a whole character so spans stay on char boundaries.
                let width = self.source[self.pos as usize..]
                    .chars()
                    .next()
                    .map_or(1, char::len_utf8);
                self.advance_by(width as u32);
                TokenKind::Error
            }
        };

        Token::new(kind, Span::new(start, self.pos))
    }

    #[inline]
    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r' | b'\n' | b',') => {
                    self.advance();
                }
                Some(b'#') => match memchr::memchr2(b'\n', b'\r', self.rest()) {
                    Some(offset) => self.advance_by(offset as u32),
                    None => self.pos = self.bytes.len() as u32,
                },
                Some(0xEF) if self.peek_at(1) == Some(0xBB) && self.peek_at(2) == Some(0xBF) => {
                    self.advance_by(3);
                }
                _ => break,
            }
        }
    }

    fn scan_name(&mut self) -> TokenKind {
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == b'_' {
                self.advance();
            } else {
                break;
            }
        }
        TokenKind::Name
    }

    fn scan_digits(&mut self) -> u32 {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        self.pos - start
    }

    fn scan_number(&mut self) -> TokenKind {
        let mut is_float = false;

        if self.peek() == Some(b'-') {
            self.advance();
        }

        if self.peek() == Some(b'0') {
            self.advance();
        } else if self.scan_digits() == 0 {
            return TokenKind::Error;
        }

        if self.peek() == Some(b'.') {
            is_float = true;
            self.advance();
            if self.scan_digits() == 0 {
                return TokenKind::Error;
            }
        }

        if let Some(b'e' | b'E') = self.peek() {
            is_float = true;
            self.advance();
            if let Some(b'+' | b'-') = self.peek() {
                self.advance();
            }
            if self.scan_digits() == 0 {
                return TokenKind::Error;
            }
        }

        // `123abc` and `1.5.` are not numbers
        if let Some(b'.' | b'_' | b'a'..=b'z' | b'A'..=b'Z') = self.peek() {
            self.advance();
            return TokenKind::Error;
        }

        if is_float {
            TokenKind::FloatLiteral
        } else {
            TokenKind::IntLiteral
        }
    }

    fn scan_string(&mut self) -> TokenKind {
        if self.peek_at(1) == Some(b'"') && self.peek_at(2) == Some(b'"') {
            self.advance_by(3);
            return self.scan_block_string();
        }

        self.advance(); // Opening quote

        loop {
            let Some(offset) = memchr::memchr3(b'"', b'\\', b'\n', self.rest()) else {
                self.pos = self.bytes.len() as u32;
                return TokenKind::Error;
            };
            self.advance_by(offset as u32);

            match self.peek() {
                Some(b'"') => {
                    self.advance();
                    return TokenKind::StringLiteral;
                }
                Some(b'\\') => {
                    self.advance();
                    if self.peek().is_some() {
                        self.advance();
                    }
                }
                _ => return TokenKind::Error,
            }
        }
    }

    fn scan_block_string(&mut self) -> TokenKind {
        loop {
            let Some(offset) = memchr::memchr2(b'"', b'\\', self.rest()) else {
                self.pos = self.bytes.len() as u32;
                return TokenKind::Error;
            };
            self.advance_by(offset as u32);

            if self.rest().starts_with(b"\"\"\"") {
                self.advance_by(3);
                return TokenKind::BlockStringLiteral;
            }
            if self.rest().starts_with(b"\\\"\"\"") {
                self.advance_by(4);
            } else {
                self.advance();
            }
        }
    }

    /// Gets the text at the given span.
    #[must_use]
    pub fn span_text(&self, span: Span) -> &'a str {
        &self.source[span.start as usize..span.end as usize]
    }
}

/// Tokenizes the entire source.
#[must_use]
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();

    loop {
        let token = lexer.next_token();
        let is_eof = token.is_eof();
        tokens.push(token);
        if is_eof {
            break;
        }
    }

    tokens
}

/// Decodes the raw text of a quoted string token, quotes included.
///
/// # Errors
///
/// Returns a message describing the first invalid escape sequence.
pub fn string_value(raw: &str) -> Result<String, String> {
    let inner = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw);

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some('b') => out.push('\u{0008}'),
            Some('f') => out.push('\u{000C}'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('u') => {
                let high = read_hex4(&mut chars)?;
                let code = if (0xD800..0xDC00).contains(&high) {
                    // Surrogate pair spelled as two escapes
                    if chars.next() != Some('\\') || chars.next() != Some('u') {
                        return Err(format!("invalid unicode escape \\u{high:04X}"));
                    }
                    let low = read_hex4(&mut chars)?;
                    if !(0xDC00..0xE000).contains(&low) {
                        return Err(format!("invalid unicode escape \\u{low:04X}"));
                    }
                    0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
                } else {
                    high
                };
                let decoded = char::from_u32(code)
                    .ok_or_else(|| format!("invalid unicode escape \\u{code:04X}"))?;
                out.push(decoded);
            }
            Some(other) => return Err(format!("invalid escape sequence \\{other}")),
            None => return Err("unterminated escape sequence".to_string()),
        }
    }

    Ok(out)
}

fn read_hex4(chars: &mut std::str::Chars<'_>) -> Result<u32, String> {
    let digits: String = chars.take(4).collect();
    if digits.len() != 4 {
        return Err(format!("invalid unicode escape \\u{digits}"));
    }
    u32::from_str_radix(&digits, 16).map_err(|_| format!("invalid unicode escape \\u{digits}"))
}

/// Decodes the raw text of a block string token, triple quotes included.
///
/// Common indentation is removed from every line but the first, and blank
/// leading and trailing lines are dropped.
#[must_use]
pub fn block_string_value(raw: &str) -> String {
    let inner = raw
        .strip_prefix("\"\"\"")
        .and_then(|s| s.strip_suffix("\"\"\""))
        .unwrap_or(raw)
        .replace("\\\"\"\"", "\"\"\"");

    let lines: Vec<&str> = inner
        .split("\r\n")
        .flat_map(|l| l.split(|c| c == '\n' || c == '\r'))
        .collect();

    let is_blank = |line: &str| line.chars().all(|c| c == ' ' || c == '\t');
    let indent_of = |line: &str| {
        line.len() - line.trim_start_matches(|c| c == ' ' || c == '\t').len()
    };

    let common_indent = lines
        .iter()
        .skip(1)
        .filter(|line| !is_blank(line))
        .map(|line| indent_of(line))
        .min()
        .unwrap_or(0);

    let mut dedented: Vec<&str> = lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            if i == 0 {
                *line
            } else if line.len() < common_indent {
                ""
            } else {
                &line[common_indent..]
            }
        })
        .collect();

    while dedented.first().is_some_and(|l| is_blank(l)) {
        dedented.remove(0);
    }
    while dedented.last().is_some_and(|l| is_blank(l)) {
        dedented.pop();
    }

    dedented.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_punctuation() {
        assert_eq!(
            kinds("{ } ( ) [ ] : ... = | & @ ! $"),
            vec![
                TokenKind::LBrace,
                TokenKind::RBrace,
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::LBracket,
                TokenKind::RBracket,
                TokenKind::Colon,
                TokenKind::Spread,
                TokenKind::Eq,
                TokenKind::Pipe,
                TokenKind::Amp,
                TokenKind::At,
                TokenKind::Bang,
                TokenKind::Dollar,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_are_names() {
        assert_eq!(
            kinds("query fragment on true"),
            vec![
                TokenKind::Name,
                TokenKind::Name,
                TokenKind::Name,
                TokenKind::Name,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_commas_and_comments_are_trivia() {
        assert_eq!(
            kinds("a, b # trailing comment\n,,c"),
            vec![TokenKind::Name, TokenKind::Name, TokenKind::Name, TokenKind::Eof]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("42 -17 0 3.14 1e10 2.5e-3"),
            vec![
                TokenKind::IntLiteral,
                TokenKind::IntLiteral,
                TokenKind::IntLiteral,
                TokenKind::FloatLiteral,
                TokenKind::FloatLiteral,
                TokenKind::FloatLiteral,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_bad_numbers() {
        assert_eq!(kinds("1.")[0], TokenKind::Error);
        assert_eq!(kinds("12abc")[0], TokenKind::Error);
        assert_eq!(kinds("-")[0], TokenKind::Error);
    }

    #[test]
    fn test_strings() {
        assert_eq!(
            kinds(r#""hello" "wo\"rld" """block "string""""#),
            vec![
                TokenKind::StringLiteral,
                TokenKind::StringLiteral,
                TokenKind::BlockStringLiteral,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unterminated_string() {
        assert_eq!(kinds("\"abc\n\"")[0], TokenKind::Error);
        assert_eq!(kinds("\"\"\"abc")[0], TokenKind::Error);
    }

    #[test]
    fn test_string_value_escapes() {
        assert_eq!(string_value(r#""a\"b\\c\nd""#).unwrap(), "a\"b\\c\nd");
        assert_eq!(string_value(r#""\u00e9""#).unwrap(), "é");
        assert_eq!(string_value(r#""\uD83D\uDE00""#).unwrap(), "😀");
        assert!(string_value(r#""\q""#).is_err());
    }

    #[test]
    fn test_block_string_value() {
        let raw = "\"\"\"\n    Hello,\n      World!\n\n    Yours\n  \"\"\"";
        assert_eq!(block_string_value(raw), "Hello,\n  World!\n\nYours");
    }

    #[test]
    fn test_spans() {
        let tokens = tokenize("{ name }");
        assert_eq!(tokens[1].span, Span::new(2, 6));
    }
}
