use std::fmt::Write as _;

use crate::lexer::Spanned;
use crate::token::Token;

/// Prints a token stream one token per line, prefixed with its position.
pub struct TokenDumper {
    pub color: bool,
    /// `false` prints comments and newlines in a readable form instead of
    /// their debug representation.
    pub show_debug_repr: bool,
}

impl Default for TokenDumper {
    fn default() -> Self {
        Self {
            color: true,
            show_debug_repr: true,
        }
    }
}

impl TokenDumper {
    const RESET: &'static str = "\x1b[0m";
    const DIM: &'static str = "\x1b[2m";
    const GRN: &'static str = "\x1b[32m";
    const YEL: &'static str = "\x1b[33m";
    const CYN: &'static str = "\x1b[36m";
    const MAG: &'static str = "\x1b[35m";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_color(mut self) -> Self {
        self.color = false;
        self
    }

    pub fn pretty(mut self) -> Self {
        self.show_debug_repr = false;
        self
    }

    pub fn dump(&self, tokens: &[Spanned]) {
        print!("{}", self.render(tokens));
    }

    pub fn render(&self, tokens: &[Spanned]) -> String {
        let mut out = String::new();
        for s in tokens {
            self.render_one(&mut out, s);
        }
        out
    }

    fn render_one(&self, out: &mut String, s: &Spanned) {
        let (colr, reset) = if self.color {
            (Self::color(&s.token), Self::RESET)
        } else {
            ("", "")
        };
        let kind = Self::kind(&s.token);

        let text = match &s.token {
            Token::Comment(c) if !self.show_debug_repr => format!("-- {}", c.trim()),
            Token::Newline if !self.show_debug_repr => "\\n".to_string(),
            Token::String(v) if !self.show_debug_repr => format!("\"{}\"", v),
            Token::Symbol(v) if !self.show_debug_repr => format!("#{}", v),
            other => format!("{:?}", other),
        };

        // writing to a String cannot fail
        let _ = writeln!(
            out,
            "[{:02}:{:02}] {}{:<8} {}{}",
            s.span.line, s.span.col, colr, kind, text, reset
        );
    }

    fn kind(t: &Token) -> &'static str {
        use Token::*;
        match t {
            Newline => "NEWLINE",
            Comment(_) => "COMMENT",
            Eof => "EOF",

            Integer(_) => "INT",
            Float(_) => "FLOAT",
            String(_) => "STRING",
            Symbol(_) => "SYMBOL",
            Ident(_) => "IDENT",

            LParen | RParen | LBracket | RBracket | Comma | Colon | Dot => "PUNCT",

            Plus | Minus | Star | Slash | Mod | Ampersand | DoubleAmpersand => "OP",
            Eq | NotEq | Lt | Gt | LtEq | GtEq | Contains | Starts => "CMP",

            _ => "KEYWORD",
        }
    }

    fn color(t: &Token) -> &'static str {
        use Token::*;
        match t {
            Newline | Comment(_) | Eof => Self::DIM,
            String(_) | Symbol(_) => Self::GRN,
            Integer(_) | Float(_) => Self::YEL,
            Ident(_) => Self::CYN,
            _ => Self::MAG,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    #[test]
    fn test_render_plain() {
        let tokens = Lexer::new("put 1").tokenize().unwrap();
        let text = TokenDumper::new().no_color().render(&tokens);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "[01:01] KEYWORD  Put");
        assert_eq!(lines[1], "[01:05] INT      Integer(1)");
        assert!(lines.last().unwrap().contains("EOF"));
    }

    #[test]
    fn test_render_pretty_string() {
        let tokens = Lexer::new("put \"hi\"").tokenize().unwrap();
        let text = TokenDumper::new().no_color().pretty().render(&tokens);
        assert!(text.contains("STRING   \"hi\""));
    }

    #[test]
    fn test_render_color() {
        let tokens = Lexer::new("x").tokenize().unwrap();
        let text = TokenDumper::new().render(&tokens);
        assert!(text.contains("\x1b[36m"));
        assert!(text.contains("\x1b[0m"));
    }
}
