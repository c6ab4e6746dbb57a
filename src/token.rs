#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Integer(i64),
    Float(f64),
    String(std::string::String),
    Symbol(std::string::String),
    Ident(std::string::String),

    // Arithmetic
    Plus,
    Minus,
    Star,
    Slash,
    Mod,

    // Strings
    Ampersand,
    DoubleAmpersand,
    Contains,
    Starts,

    // Comparison
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,

    // Logic
    And,
    Or,
    Not,

    // Chunks
    Char,
    Word,
    Item,
    Line,

    // Sprites
    Sprite,
    Intersects,
    Within,

    // Statements
    Put,
    Into,
    After,
    Before,
    Set,
    To,
    The,
    Of,
    Global,
    Property,
    Instance,
    Exit,
    Next,
    Return,
    Go,
    Play,
    Tell,
    When,

    // Control flow
    If,
    Then,
    Else,
    Repeat,
    While,
    With,
    In,
    Down,

    // Definitions
    On,
    End,
    Macro,
    Factory,
    Method,

    // Delimiters
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Dot,

    Comment(std::string::String),
    Newline,
    Eof,
}

impl Token {
    /// Looks up a reserved word. Lingo keywords are case-insensitive.
    pub fn keyword(word: &str) -> Option<Token> {
        let token = match word.to_ascii_lowercase().as_str() {
            "mod" => Token::Mod,
            "contains" => Token::Contains,
            "starts" => Token::Starts,
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "char" => Token::Char,
            "word" => Token::Word,
            "item" => Token::Item,
            "line" => Token::Line,
            "sprite" => Token::Sprite,
            "intersects" => Token::Intersects,
            "within" => Token::Within,
            "put" => Token::Put,
            "into" => Token::Into,
            "after" => Token::After,
            "before" => Token::Before,
            "set" => Token::Set,
            "to" => Token::To,
            "the" => Token::The,
            "of" => Token::Of,
            "global" => Token::Global,
            "property" => Token::Property,
            "instance" => Token::Instance,
            "exit" => Token::Exit,
            "next" => Token::Next,
            "return" => Token::Return,
            "go" => Token::Go,
            "play" => Token::Play,
            "tell" => Token::Tell,
            "when" => Token::When,
            "if" => Token::If,
            "then" => Token::Then,
            "else" => Token::Else,
            "repeat" => Token::Repeat,
            "while" => Token::While,
            "with" => Token::With,
            "in" => Token::In,
            "down" => Token::Down,
            "on" => Token::On,
            "end" => Token::End,
            "macro" => Token::Macro,
            "factory" => Token::Factory,
            "method" => Token::Method,
            _ => return None,
        };
        Some(token)
    }

    /// The source spelling of a word-like token, used where Lingo accepts a
    /// reserved word as a name (`the frame`, `end repeat`, `on exit`).
    pub fn word_text(&self) -> Option<std::string::String> {
        match self {
            Token::Ident(name) => Some(name.clone()),
            Token::Integer(_)
            | Token::Float(_)
            | Token::String(_)
            | Token::Symbol(_)
            | Token::Plus
            | Token::Minus
            | Token::Star
            | Token::Slash
            | Token::Ampersand
            | Token::DoubleAmpersand
            | Token::Eq
            | Token::NotEq
            | Token::Lt
            | Token::Gt
            | Token::LtEq
            | Token::GtEq
            | Token::LParen
            | Token::RParen
            | Token::LBracket
            | Token::RBracket
            | Token::Comma
            | Token::Colon
            | Token::Dot
            | Token::Comment(_)
            | Token::Newline
            | Token::Eof => None,
            keyword => Some(keyword.to_string()),
        }
    }

    /// True for an identifier spelled `word`, ignoring case.
    pub fn is_word(&self, word: &str) -> bool {
        matches!(self, Token::Ident(name) if name.eq_ignore_ascii_case(word))
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Token::Integer(n) => return write!(f, "{}", n),
            Token::Float(n) => return write!(f, "{}", n),
            Token::String(s) => return write!(f, "\"{}\"", s),
            Token::Symbol(s) => return write!(f, "#{}", s),
            Token::Ident(s) => return write!(f, "{}", s),
            Token::Comment(_) => "comment",

            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Mod => "mod",
            Token::Ampersand => "&",
            Token::DoubleAmpersand => "&&",
            Token::Contains => "contains",
            Token::Starts => "starts",

            Token::Eq => "=",
            Token::NotEq => "<>",
            Token::Lt => "<",
            Token::Gt => ">",
            Token::LtEq => "<=",
            Token::GtEq => ">=",

            Token::And => "and",
            Token::Or => "or",
            Token::Not => "not",

            Token::Char => "char",
            Token::Word => "word",
            Token::Item => "item",
            Token::Line => "line",

            Token::Sprite => "sprite",
            Token::Intersects => "intersects",
            Token::Within => "within",

            Token::Put => "put",
            Token::Into => "into",
            Token::After => "after",
            Token::Before => "before",
            Token::Set => "set",
            Token::To => "to",
            Token::The => "the",
            Token::Of => "of",
            Token::Global => "global",
            Token::Property => "property",
            Token::Instance => "instance",
            Token::Exit => "exit",
            Token::Next => "next",
            Token::Return => "return",
            Token::Go => "go",
            Token::Play => "play",
            Token::Tell => "tell",
            Token::When => "when",

            Token::If => "if",
            Token::Then => "then",
            Token::Else => "else",
            Token::Repeat => "repeat",
            Token::While => "while",
            Token::With => "with",
            Token::In => "in",
            Token::Down => "down",

            Token::On => "on",
            Token::End => "end",
            Token::Macro => "macro",
            Token::Factory => "factory",
            Token::Method => "method",

            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Comma => ",",
            Token::Colon => ":",
            Token::Dot => ".",

            Token::Newline => "end of line",
            Token::Eof => "end of input",
        };
        write!(f, "{}", text)
    }
}
