//! Expression lexer - tokenizes input strings
//!
//! Converts expression source into a stream of tokens. Handles quoted
//! strings with escapes, `$` sentinels, keyword operators, and the
//! backtick-delimited raw blocks that are handed verbatim to resolvers.

use crate::token::{Token, TokenType};

/// The expression lexer
pub struct Lexer {
    position: usize,
    line: usize,
    column: usize,
    chars: Vec<char>,
    current_char: Option<char>,
}

impl Lexer {
    /// Create a new lexer for the given input
    pub fn new(input: &str) -> Self {
        let chars: Vec<char> = input.chars().collect();
        let current_char = chars.first().copied();

        Self {
            position: 0,
            line: 1,
            column: 1,
            chars,
            current_char,
        }
    }

    /// Advance to the next character
    fn advance(&mut self) {
        if let Some(c) = self.current_char {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.position += 1;
        self.current_char = self.chars.get(self.position).copied();
    }

    /// Peek at the next character without advancing
    fn peek(&self) -> Option<char> {
        self.chars.get(self.position + 1).copied()
    }

    /// Skip whitespace characters
    fn skip_whitespace(&mut self) {
        while let Some(c) = self.current_char {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Read an identifier
    fn read_identifier(&mut self) -> String {
        let start_pos = self.position;

        while let Some(c) = self.current_char {
            if c.is_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }

        self.chars[start_pos..self.position].iter().collect()
    }

    /// Read a string literal delimited by `quote` (single or double)
    fn read_string(&mut self, quote: char) -> Result<String, String> {
        self.advance(); // Skip opening quote

        let mut value = String::new();

        while let Some(c) = self.current_char {
            if c == quote {
                self.advance(); // Skip closing quote
                return Ok(value);
            } else if c == '\\' {
                self.advance(); // Skip backslash
                let Some(escaped) = self.current_char else {
                    return Err("incomplete escape sequence in string literal".into());
                };
                match escaped {
                    '\'' => value.push('\''),
                    '"' => value.push('"'),
                    '\\' => value.push('\\'),
                    '/' => value.push('/'),
                    '`' => value.push('`'),
                    'n' => value.push('\n'),
                    'r' => value.push('\r'),
                    't' => value.push('\t'),
                    'f' => value.push('\x0C'),
                    'u' => {
                        // Unicode escape: \uXXXX
                        self.advance(); // Skip 'u'
                        let mut hex = String::new();
                        for _ in 0..4 {
                            match self.current_char {
                                Some(h) if h.is_ascii_hexdigit() => {
                                    hex.push(h);
                                    self.advance();
                                }
                                _ => return Err("invalid unicode escape sequence".into()),
                            }
                        }
                        let code = u32::from_str_radix(&hex, 16)
                            .map_err(|_| "invalid unicode code point".to_string())?;
                        value.push(
                            char::from_u32(code)
                                .ok_or_else(|| "invalid unicode character".to_string())?,
                        );
                        continue; // Already positioned past the escape
                    }
                    other => value.push(other),
                }
                self.advance();
            } else {
                value.push(c);
                self.advance();
            }
        }

        Err("unterminated string literal".into())
    }

    /// Read a number literal: digits with an optional decimal part
    fn read_number(&mut self) -> String {
        let start_pos = self.position;

        while let Some(c) = self.current_char {
            if c.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }

        // Decimal part only when the dot is followed by a digit; a bare
        // trailing dot belongs to the next token.
        if self.current_char == Some('.') && self.peek().map(|c| c.is_ascii_digit()).unwrap_or(false)
        {
            self.advance(); // Skip '.'
            while let Some(c) = self.current_char {
                if c.is_ascii_digit() {
                    self.advance();
                } else {
                    break;
                }
            }
        }

        self.chars[start_pos..self.position].iter().collect()
    }

    /// Read a backtick-delimited raw block verbatim.
    ///
    /// The scan tracks quoted strings (single or double) so a backtick inside
    /// a quoted string does not terminate the block, and tracks parenthesis
    /// nesting so unbalanced-looking raw programs still scan to the closing
    /// backtick. Backticks cannot be escaped inside a block.
    fn read_raw_block(&mut self) -> Result<String, String> {
        self.advance(); // Skip opening backtick

        let mut value = String::new();
        let mut quote: Option<char> = None;
        let mut paren_depth: usize = 0;

        while let Some(c) = self.current_char {
            match quote {
                Some(q) => {
                    if c == '\\' {
                        value.push(c);
                        self.advance();
                        if let Some(next) = self.current_char {
                            value.push(next);
                            self.advance();
                        }
                        continue;
                    }
                    if c == q {
                        quote = None;
                    }
                    value.push(c);
                    self.advance();
                }
                None => match c {
                    '`' => {
                        self.advance(); // Skip closing backtick
                        return Ok(value);
                    }
                    '\'' | '"' => {
                        quote = Some(c);
                        value.push(c);
                        self.advance();
                    }
                    '(' => {
                        paren_depth += 1;
                        value.push(c);
                        self.advance();
                    }
                    ')' => {
                        paren_depth = paren_depth.saturating_sub(1);
                        value.push(c);
                        self.advance();
                    }
                    _ => {
                        value.push(c);
                        self.advance();
                    }
                },
            }
        }

        Err("unterminated raw block".into())
    }

    /// Get the next token from the input
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        let start = self.position;
        let line = self.line;
        let column = self.column;

        let Some(c) = self.current_char else {
            return Token::eof(start, line, column);
        };

        match c {
            '.' => {
                self.advance();
                Token::new(TokenType::Dot, ".".into(), start, self.position, line, column)
            }
            '(' => {
                self.advance();
                Token::new(
                    TokenType::OpenParen,
                    "(".into(),
                    start,
                    self.position,
                    line,
                    column,
                )
            }
            ')' => {
                self.advance();
                Token::new(
                    TokenType::CloseParen,
                    ")".into(),
                    start,
                    self.position,
                    line,
                    column,
                )
            }
            '[' => {
                self.advance();
                Token::new(
                    TokenType::OpenBracket,
                    "[".into(),
                    start,
                    self.position,
                    line,
                    column,
                )
            }
            ']' => {
                self.advance();
                Token::new(
                    TokenType::CloseBracket,
                    "]".into(),
                    start,
                    self.position,
                    line,
                    column,
                )
            }
            '+' => {
                self.advance();
                Token::new(TokenType::Plus, "+".into(), start, self.position, line, column)
            }
            '-' => {
                self.advance();
                Token::new(
                    TokenType::Minus,
                    "-".into(),
                    start,
                    self.position,
                    line,
                    column,
                )
            }
            '*' => {
                self.advance();
                Token::new(
                    TokenType::Multiply,
                    "*".into(),
                    start,
                    self.position,
                    line,
                    column,
                )
            }
            '/' => {
                self.advance();
                Token::new(
                    TokenType::Divide,
                    "/".into(),
                    start,
                    self.position,
                    line,
                    column,
                )
            }
            '=' => {
                self.advance();
                if self.current_char == Some('=') {
                    self.advance();
                    Token::new(
                        TokenType::Equal,
                        "==".into(),
                        start,
                        self.position,
                        line,
                        column,
                    )
                } else {
                    Token::error(
                        "unexpected '='; use '==' for equality".into(),
                        start,
                        line,
                        column,
                    )
                }
            }
            '!' => {
                self.advance();
                if self.current_char == Some('=') {
                    self.advance();
                    Token::new(
                        TokenType::NotEqual,
                        "!=".into(),
                        start,
                        self.position,
                        line,
                        column,
                    )
                } else {
                    Token::error(
                        "unexpected '!'; use 'not' for negation".into(),
                        start,
                        line,
                        column,
                    )
                }
            }
            '<' => {
                self.advance();
                if self.current_char == Some('=') {
                    self.advance();
                    Token::new(
                        TokenType::LessThanOrEqual,
                        "<=".into(),
                        start,
                        self.position,
                        line,
                        column,
                    )
                } else {
                    Token::new(
                        TokenType::LessThan,
                        "<".into(),
                        start,
                        self.position,
                        line,
                        column,
                    )
                }
            }
            '>' => {
                self.advance();
                if self.current_char == Some('=') {
                    self.advance();
                    Token::new(
                        TokenType::GreaterThanOrEqual,
                        ">=".into(),
                        start,
                        self.position,
                        line,
                        column,
                    )
                } else {
                    Token::new(
                        TokenType::GreaterThan,
                        ">".into(),
                        start,
                        self.position,
                        line,
                        column,
                    )
                }
            }
            '\'' | '"' => match self.read_string(c) {
                Ok(value) => Token::new(
                    TokenType::StringLiteral,
                    value,
                    start,
                    self.position,
                    line,
                    column,
                ),
                Err(message) => Token::error(message, start, line, column),
            },
            '`' => match self.read_raw_block() {
                Ok(value) => Token::new(
                    TokenType::RawBlock,
                    value,
                    start,
                    self.position,
                    line,
                    column,
                ),
                Err(message) => Token::error(message, start, line, column),
            },
            '$' => {
                self.advance();
                let name = self.read_identifier();
                if name.is_empty() {
                    Token::error("expected sentinel name after '$'".into(), start, line, column)
                } else {
                    // The parser validates the name so unknown sentinels get
                    // their own error category.
                    Token::new(
                        TokenType::Sentinel,
                        name,
                        start,
                        self.position,
                        line,
                        column,
                    )
                }
            }
            _ => {
                if c.is_ascii_digit() {
                    let value = self.read_number();
                    Token::new(
                        TokenType::NumberLiteral,
                        value,
                        start,
                        self.position,
                        line,
                        column,
                    )
                } else if c.is_alphabetic() || c == '_' {
                    let ident = self.read_identifier();
                    let token_type = match ident.as_str() {
                        "true" | "false" => TokenType::BooleanLiteral,
                        "and" => TokenType::And,
                        "or" => TokenType::Or,
                        "not" => TokenType::Not,
                        "in" => TokenType::In,
                        "contains" => TokenType::Contains,
                        "like" => TokenType::Like,
                        "before" => TokenType::Before,
                        "after" => TokenType::After,
                        "same_day_as" => TokenType::SameDayAs,
                        "within" => TokenType::Within,
                        "older" => TokenType::Older,
                        "than" => TokenType::Than,
                        "is" => TokenType::Is,
                        _ => TokenType::Identifier,
                    };
                    Token::new(token_type, ident, start, self.position, line, column)
                } else {
                    Token::error(format!("unexpected character: {}", c), start, line, column)
                }
            }
        }
    }
}

/// Split an optional leading `name:` resolver hint off a raw block.
///
/// `` `jq: .users | length` `` yields `(Some("jq"), ".users | length")`.
/// The committed replacement for the historical `jq{…}` raw syntax; the hint
/// must look like an identifier, so JSONPath programs (starting with `$`) and
/// jq programs (starting with `.`) pass through untouched.
pub(crate) fn split_resolver_hint(raw: &str) -> (Option<&str>, &str) {
    let trimmed = raw.trim_start();
    let Some(colon) = trimmed.find(':') else {
        return (None, raw);
    };
    let candidate = &trimmed[..colon];
    let is_ident = !candidate.is_empty()
        && candidate
            .chars()
            .next()
            .map(|c| c.is_alphabetic() || c == '_')
            .unwrap_or(false)
        && candidate.chars().all(|c| c.is_alphanumeric() || c == '_');
    if is_ident {
        (Some(candidate), trimmed[colon + 1..].trim_start())
    } else {
        (None, raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(input: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(input);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token();
            let is_eof = matches!(token.token_type, TokenType::Eof);
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }

    #[test]
    fn test_identifiers() {
        let tokens = tokenize("user name _test");
        assert_eq!(tokens[0].token_type, TokenType::Identifier);
        assert_eq!(tokens[0].value, "user");
        assert_eq!(tokens[1].token_type, TokenType::Identifier);
        assert_eq!(tokens[1].value, "name");
        assert_eq!(tokens[2].token_type, TokenType::Identifier);
        assert_eq!(tokens[2].value, "_test");
    }

    #[test]
    fn test_string_literals_both_quotes() {
        let tokens = tokenize("'hello' \"world\"");
        assert_eq!(tokens[0].token_type, TokenType::StringLiteral);
        assert_eq!(tokens[0].value, "hello");
        assert_eq!(tokens[1].token_type, TokenType::StringLiteral);
        assert_eq!(tokens[1].value, "world");
    }

    #[test]
    fn test_string_escapes() {
        let tokens = tokenize(r"'it\'s \n fine'");
        assert_eq!(tokens[0].token_type, TokenType::StringLiteral);
        assert_eq!(tokens[0].value, "it's \n fine");
    }

    #[test]
    fn test_unterminated_string() {
        let tokens = tokenize("'oops");
        assert_eq!(tokens[0].token_type, TokenType::Error);
        assert_eq!(tokens[0].value, "unterminated string literal");
    }

    #[test]
    fn test_numbers() {
        let tokens = tokenize("123 45.67");
        assert_eq!(tokens[0].token_type, TokenType::NumberLiteral);
        assert_eq!(tokens[0].value, "123");
        assert_eq!(tokens[1].token_type, TokenType::NumberLiteral);
        assert_eq!(tokens[1].value, "45.67");
    }

    #[test]
    fn test_number_then_dot() {
        // `teams[0].name` style: the dot after a bare integer is a separate token
        let tokens = tokenize("0].x");
        assert_eq!(tokens[0].token_type, TokenType::NumberLiteral);
        assert_eq!(tokens[1].token_type, TokenType::CloseBracket);
        assert_eq!(tokens[2].token_type, TokenType::Dot);
        assert_eq!(tokens[3].token_type, TokenType::Identifier);
    }

    #[test]
    fn test_operators() {
        let tokens = tokenize("+ - * / == != < <= > >=");
        let expected = [
            TokenType::Plus,
            TokenType::Minus,
            TokenType::Multiply,
            TokenType::Divide,
            TokenType::Equal,
            TokenType::NotEqual,
            TokenType::LessThan,
            TokenType::LessThanOrEqual,
            TokenType::GreaterThan,
            TokenType::GreaterThanOrEqual,
        ];
        for (token, expected) in tokens.iter().zip(expected.iter()) {
            assert_eq!(&token.token_type, expected);
        }
    }

    #[test]
    fn test_single_equals_is_error() {
        let tokens = tokenize("a = b");
        assert_eq!(tokens[1].token_type, TokenType::Error);
    }

    #[test]
    fn test_keywords() {
        let tokens = tokenize("and or not in contains like before after same_day_as within older than is");
        let expected = [
            TokenType::And,
            TokenType::Or,
            TokenType::Not,
            TokenType::In,
            TokenType::Contains,
            TokenType::Like,
            TokenType::Before,
            TokenType::After,
            TokenType::SameDayAs,
            TokenType::Within,
            TokenType::Older,
            TokenType::Than,
            TokenType::Is,
        ];
        for (token, expected) in tokens.iter().zip(expected.iter()) {
            assert_eq!(&token.token_type, expected);
        }
    }

    #[test]
    fn test_sentinels() {
        let tokens = tokenize("$past $future $today $now $empty");
        for (token, name) in tokens
            .iter()
            .zip(["past", "future", "today", "now", "empty"])
        {
            assert_eq!(token.token_type, TokenType::Sentinel);
            assert_eq!(token.value, name);
        }
    }

    #[test]
    fn test_unknown_sentinel_is_lexed_not_rejected() {
        // Validation happens in the parser so the error carries its own category
        let tokens = tokenize("$bogus");
        assert_eq!(tokens[0].token_type, TokenType::Sentinel);
        assert_eq!(tokens[0].value, "bogus");
    }

    #[test]
    fn test_path_navigation() {
        let tokens = tokenize("user.profile.age");
        assert_eq!(tokens[0].token_type, TokenType::Identifier);
        assert_eq!(tokens[1].token_type, TokenType::Dot);
        assert_eq!(tokens[2].token_type, TokenType::Identifier);
        assert_eq!(tokens[3].token_type, TokenType::Dot);
        assert_eq!(tokens[4].token_type, TokenType::Identifier);
    }

    #[test]
    fn test_raw_block() {
        let tokens = tokenize("`.users | length` > 2");
        assert_eq!(tokens[0].token_type, TokenType::RawBlock);
        assert_eq!(tokens[0].value, ".users | length");
        assert_eq!(tokens[1].token_type, TokenType::GreaterThan);
        assert_eq!(tokens[2].token_type, TokenType::NumberLiteral);
    }

    #[test]
    fn test_raw_block_backtick_inside_quotes() {
        let tokens = tokenize(r#"`.name == "tick`tock"`"#);
        assert_eq!(tokens[0].token_type, TokenType::RawBlock);
        assert_eq!(tokens[0].value, r#".name == "tick`tock""#);
    }

    #[test]
    fn test_raw_block_nested_parens() {
        let tokens = tokenize("`(.a | (.b))`");
        assert_eq!(tokens[0].token_type, TokenType::RawBlock);
        assert_eq!(tokens[0].value, "(.a | (.b))");
    }

    #[test]
    fn test_unterminated_raw_block() {
        let tokens = tokenize("`.users");
        assert_eq!(tokens[0].token_type, TokenType::Error);
        assert_eq!(tokens[0].value, "unterminated raw block");
    }

    #[test]
    fn test_positions_are_one_based() {
        let tokens = tokenize("a\n  b");
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].column), (2, 3));
    }

    #[test]
    fn test_split_resolver_hint() {
        assert_eq!(
            split_resolver_hint("jq: .users | length"),
            (Some("jq"), ".users | length")
        );
        assert_eq!(
            split_resolver_hint("jsonpath: $.users"),
            (Some("jsonpath"), "$.users")
        );
        assert_eq!(split_resolver_hint(".users | length"), (None, ".users | length"));
        assert_eq!(split_resolver_hint("$.a.b"), (None, "$.a.b"));
        // jq object-construction colon does not look like a hint
        assert_eq!(split_resolver_hint("{a: 1}"), (None, "{a: 1}"));
    }
}
