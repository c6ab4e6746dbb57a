use crate::token::Token;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub line: usize,
    pub col: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub span: Span,
}

#[derive(Debug, Error)]
#[error("{line}:{col}: {message}")]
pub struct LexerError {
    pub message: String,
    pub line: usize,
    pub col: usize,
}

/// Line continuation marker (Mac Roman 0xC2).
const CONTINUATION: char = '¬';

pub struct Lexer {
    source: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            source: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn current(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current();
        // Director scripts use bare '\r' line endings; "\r\n" counts once.
        let newline = match ch {
            Some('\n') => true,
            Some('\r') => self.peek() != Some('\n'),
            _ => false,
        };
        if newline {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        self.pos += 1;
        ch
    }

    fn span(&self) -> Span {
        Span {
            line: self.line,
            col: self.col,
        }
    }

    fn error(&self, message: impl Into<String>, span: Span) -> LexerError {
        LexerError {
            message: message.into(),
            line: span.line,
            col: span.col,
        }
    }

    fn at_newline(&self) -> bool {
        matches!(self.current(), Some('\n') | Some('\r'))
    }

    fn skip_newline(&mut self) {
        if self.current() == Some('\r') && self.peek() == Some('\n') {
            self.advance();
        }
        self.advance();
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current() {
            if ch == ' ' || ch == '\t' {
                self.advance();
            } else if ch == CONTINUATION {
                // `¬` joins the next physical line onto this one.
                self.advance();
                while matches!(self.current(), Some(' ') | Some('\t')) {
                    self.advance();
                }
                if self.at_newline() {
                    self.skip_newline();
                }
            } else {
                break;
            }
        }
    }

    fn read_comment(&mut self) -> Token {
        self.advance();
        self.advance();
        let mut comment = String::new();
        while let Some(ch) = self.current() {
            if ch == '\n' || ch == '\r' {
                break;
            }
            comment.push(ch);
            self.advance();
        }
        Token::Comment(comment.trim().to_string())
    }

    fn read_string(&mut self) -> Result<Token, LexerError> {
        let start = self.span();
        self.advance();

        let mut string = String::new();
        loop {
            match self.current() {
                Some('"') => {
                    self.advance();
                    return Ok(Token::String(string));
                }
                Some('\n') | Some('\r') => {
                    return Err(self.error(
                        "unterminated string (newline before closing quote)",
                        start,
                    ));
                }
                Some(ch) => {
                    string.push(ch);
                    self.advance();
                }
                None => return Err(self.error("unterminated string literal", start)),
            }
        }
    }

    fn read_number(&mut self) -> Result<Token, LexerError> {
        let start = self.span();
        let mut digits = String::new();
        let mut has_dot = false;

        while let Some(ch) = self.current() {
            if ch.is_ascii_digit() {
                digits.push(ch);
                self.advance();
            } else if ch == '.' && !has_dot {
                // `1.foo` is not a float
                if self.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                    has_dot = true;
                    digits.push('.');
                    self.advance();
                } else {
                    break;
                }
            } else {
                break;
            }
        }

        if has_dot {
            let value: f64 = digits
                .parse()
                .map_err(|_| self.error(format!("invalid float: {}", digits), start))?;
            Ok(Token::Float(value))
        } else {
            let value: i64 = digits
                .parse()
                .map_err(|_| self.error(format!("invalid integer: {}", digits), start))?;
            Ok(Token::Integer(value))
        }
    }

    fn read_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(ch) = self.current() {
            if ch.is_alphanumeric() || ch == '_' {
                word.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        word
    }

    fn read_identifier(&mut self) -> Token {
        let ident = self.read_word();
        Token::keyword(&ident).unwrap_or(Token::Ident(ident))
    }

    fn read_symbol(&mut self) -> Result<Token, LexerError> {
        let start = self.span();
        self.advance();
        let name = self.read_word();
        if name.is_empty() {
            return Err(self.error("expected a name after '#'", start));
        }
        Ok(Token::Symbol(name))
    }

    fn read_operator(&mut self) -> Option<Token> {
        let ch = self.current()?;
        let next = self.peek();

        let (token, width) = match (ch, next) {
            ('<', Some('>')) => (Token::NotEq, 2),
            ('<', Some('=')) => (Token::LtEq, 2),
            ('>', Some('=')) => (Token::GtEq, 2),
            ('&', Some('&')) => (Token::DoubleAmpersand, 2),
            ('&', _) => (Token::Ampersand, 1),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('=', _) => (Token::Eq, 1),
            ('<', _) => (Token::Lt, 1),
            ('>', _) => (Token::Gt, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            ('[', _) => (Token::LBracket, 1),
            (']', _) => (Token::RBracket, 1),
            (',', _) => (Token::Comma, 1),
            (':', _) => (Token::Colon, 1),
            ('.', _) => (Token::Dot, 1),
            _ => return None,
        };

        for _ in 0..width {
            self.advance();
        }
        Some(token)
    }

    pub fn tokenize(&mut self) -> Result<Vec<Spanned>, LexerError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();
            let span = self.span();

            let token = match self.current() {
                None => {
                    tokens.push(Spanned {
                        token: Token::Eof,
                        span,
                    });
                    break;
                }
                Some('\n') | Some('\r') => {
                    self.skip_newline();
                    Token::Newline
                }
                Some('-') if self.peek() == Some('-') => self.read_comment(),
                Some('"') => self.read_string()?,
                Some('#') => self.read_symbol()?,
                Some(ch) if ch.is_ascii_digit() => self.read_number()?,
                Some(ch) if ch.is_alphabetic() || ch == '_' => self.read_identifier(),
                Some(ch) => match self.read_operator() {
                    Some(token) => token,
                    None => {
                        return Err(self.error(format!("unexpected character: '{}'", ch), span));
                    }
                },
            };
            tokens.push(Spanned { token, span });
        }

        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Token> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_handler_header() {
        let tokens = lex("on mouseUp me, x");
        assert_eq!(
            tokens,
            vec![
                Token::On,
                Token::Ident("mouseUp".to_string()),
                Token::Ident("me".to_string()),
                Token::Comma,
                Token::Ident("x".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        let tokens = lex("REPEAT With i = 1 TO 3");
        assert_eq!(tokens[0], Token::Repeat);
        assert_eq!(tokens[1], Token::With);
        assert_eq!(tokens[4], Token::Integer(1));
        assert_eq!(tokens[5], Token::To);
    }

    #[test]
    fn test_identifier_keeps_spelling() {
        let tokens = lex("myVar");
        assert_eq!(tokens[0], Token::Ident("myVar".to_string()));
    }

    #[test]
    fn test_comment_runs_to_end_of_line() {
        let tokens = lex("put 1 -- say one\nput 2");
        assert_eq!(tokens[2], Token::Comment("say one".to_string()));
        assert_eq!(tokens[3], Token::Newline);
        assert_eq!(tokens[4], Token::Put);
    }

    #[test]
    fn test_minus_is_operator_not_sign() {
        let tokens = lex("a-1");
        assert_eq!(
            tokens,
            vec![
                Token::Ident("a".to_string()),
                Token::Minus,
                Token::Integer(1),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_relational_operators() {
        let tokens = lex("<> <= >= < > =");
        assert_eq!(
            &tokens[..6],
            &[
                Token::NotEq,
                Token::LtEq,
                Token::GtEq,
                Token::Lt,
                Token::Gt,
                Token::Eq
            ]
        );
    }

    #[test]
    fn test_concat_operators() {
        let tokens = lex("\"a\" & \"b\" && \"c\"");
        assert_eq!(tokens[1], Token::Ampersand);
        assert_eq!(tokens[3], Token::DoubleAmpersand);
    }

    #[test]
    fn test_float_vs_dot() {
        let tokens = lex("1.5 obj.prop");
        assert_eq!(tokens[0], Token::Float(1.5));
        assert_eq!(tokens[1], Token::Ident("obj".to_string()));
        assert_eq!(tokens[2], Token::Dot);
        assert_eq!(tokens[3], Token::Ident("prop".to_string()));
    }

    #[test]
    fn test_symbol_literal() {
        let tokens = lex("#name");
        assert_eq!(tokens[0], Token::Symbol("name".to_string()));
    }

    #[test]
    fn test_continuation_joins_lines() {
        let tokens = lex("put 1 + ¬\n  2");
        assert!(!tokens.contains(&Token::Newline));
        assert_eq!(tokens[3], Token::Integer(2));
    }

    #[test]
    fn test_carriage_return_is_newline() {
        let source = "put 1\rput 2\r\nput 3";
        let spanned = Lexer::new(source).tokenize().unwrap();
        let newlines = spanned
            .iter()
            .filter(|s| s.token == Token::Newline)
            .count();
        assert_eq!(newlines, 2);
        let last_put = spanned.iter().rev().find(|s| s.token == Token::Put).unwrap();
        assert_eq!(last_put.span, Span { line: 3, col: 1 });
    }

    #[test]
    fn test_spans_are_one_based() {
        let spanned = Lexer::new("put x\n  into").tokenize().unwrap();
        assert_eq!(spanned[0].span, Span { line: 1, col: 1 });
        assert_eq!(spanned[1].span, Span { line: 1, col: 5 });
        assert_eq!(spanned[3].span, Span { line: 2, col: 3 });
    }

    #[test]
    fn test_unterminated_string_error() {
        let err = Lexer::new("put \"abc\nput 1").tokenize().unwrap_err();
        assert!(err.message.contains("unterminated"));
        assert_eq!((err.line, err.col), (1, 5));
    }

    #[test]
    fn test_unexpected_character_error() {
        let err = Lexer::new("put 1 ? 2").tokenize().unwrap_err();
        assert!(err.message.contains("unexpected character"));
        assert_eq!(err.to_string(), "1:7: unexpected character: '?'");
    }
}
