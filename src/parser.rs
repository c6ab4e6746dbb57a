use tracing::{debug, warn};

use crate::bytecode::{
    CompileError, Op,
    assembler::{Assembler, DefState},
    ir::ScriptContext,
    op::{ChunkKind, GoTarget, PutMode},
    scope::VarKind,
};
use crate::lexer::{Span, Spanned};
use crate::parser_error::{Diagnostic, ParserError};
use crate::token::Token;

/// Longest list of alternatives quoted in a syntax error.
const MAX_EXPECTED: usize = 10;

/// `the <field> of <entity> <id>` entity words other than `sprite`.
const ENTITY_WORDS: &[&str] = &["cast", "castmember", "member", "field", "window", "menu"];

/// What a `put` or `set` writes to.
enum Target {
    Var(String),
    Chunk {
        kind: ChunkKind,
        name: String,
    },
    The {
        field: String,
    },
    TheOf {
        field: String,
        entity: Option<String>,
    },
    ObjectProp {
        object: String,
        prop: String,
    },
}

/// Recursive-descent parser for Lingo that emits bytecode as it goes.
///
/// Every recognized construct is lowered immediately through the
/// [`Assembler`]; there is no syntax tree. Syntax errors are recorded as
/// diagnostics and the parser resumes at the next line, so one pass reports
/// every broken statement.
///
/// Notes:
/// - Comments are filtered out in `Parser::new`; newlines are statement
///   terminators and are kept.
/// - With `lenient_parens`, a stray `)` at the end of a statement is dropped
///   with a warning instead of failing the line.
pub struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    /// Span of the most recently consumed token.
    last_span: Option<Span>,
    /// Source lines, for `when ... then <code>` which keeps raw text.
    lines: Vec<String>,
    lenient_parens: bool,
    asm: Assembler,
    diagnostics: Vec<Diagnostic>,
}

impl Parser {
    pub fn new(tokens: Vec<Spanned>, source: &str, lenient_parens: bool) -> Self {
        let tokens: Vec<Spanned> = tokens
            .into_iter()
            .filter(|t| !matches!(t.token, Token::Comment(_)))
            .collect();
        Parser {
            tokens,
            pos: 0,
            last_span: None,
            lines: source
                .replace("\r\n", "\n")
                .split(['\r', '\n'])
                .map(str::to_string)
                .collect(),
            lenient_parens,
            asm: Assembler::new(),
            diagnostics: Vec::new(),
        }
    }

    // -------------------------------------------------------------------------
    // Token access
    // -------------------------------------------------------------------------

    fn current(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .map(|s| &s.token)
            .unwrap_or(&Token::Eof)
    }

    fn peek_next(&self) -> &Token {
        self.tokens
            .get(self.pos + 1)
            .map(|s| &s.token)
            .unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        match self.tokens.get(self.pos) {
            Some(s) => {
                self.last_span = Some(s.span);
                self.pos += 1;
                s.token.clone()
            }
            None => Token::Eof,
        }
    }

    fn check(&self, token: &Token) -> bool {
        self.peek() == token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn at_line_end(&self) -> bool {
        matches!(self.peek(), Token::Newline | Token::Eof)
    }

    fn span(&self) -> Span {
        self.current()
            .map(|s| s.span)
            .or(self.last_span)
            .unwrap_or(Span { line: 1, col: 1 })
    }

    // -------------------------------------------------------------------------
    // Errors
    // -------------------------------------------------------------------------

    fn error(&self, message: &str) -> ParserError {
        let span = self.span();
        ParserError {
            message: message.to_string(),
            line: span.line,
            col: span.col,
        }
    }

    /// `syntax error, unexpected X: expected A or B ...`
    fn unexpected(&self, expected: &[&str]) -> ParserError {
        let mut message = format!("syntax error, unexpected {}", self.peek());
        for (i, alt) in expected.iter().take(MAX_EXPECTED).enumerate() {
            message.push_str(if i == 0 { ": expected " } else { " or " });
            message.push_str(alt);
        }
        self.error(&message)
    }

    fn internal(&self, err: CompileError) -> ParserError {
        self.error(&err.to_string())
    }

    fn warn(&mut self, message: String) {
        let span = self.span();
        warn!(line = span.line, col = span.col, "{}", message);
        self.diagnostics
            .push(Diagnostic::warning(message, span.line, span.col));
    }

    fn report(&mut self, err: ParserError) {
        debug!("syntax error at {}:{}: {}", err.line, err.col, err.message);
        self.diagnostics.push(err.into());
    }

    pub fn had_error(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    fn expect(&mut self, token: &Token) -> Result<(), ParserError> {
        if self.eat(token) {
            Ok(())
        } else {
            let expected = token.to_string();
            Err(self.unexpected(&[&expected]))
        }
    }

    fn expect_ident(&mut self) -> Result<String, ParserError> {
        match self.peek() {
            Token::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected(&["identifier"])),
        }
    }

    /// A name where reserved words are also accepted (`on exit`, `the frame`).
    fn expect_name(&mut self) -> Result<String, ParserError> {
        match self.peek().word_text() {
            Some(name) => {
                self.advance();
                Ok(name)
            }
            None => Err(self.unexpected(&["identifier"])),
        }
    }

    fn skip_newlines(&mut self) {
        while self.eat(&Token::Newline) {}
    }

    /// Error recovery: drop the rest of the current line.
    fn skip_line(&mut self) {
        while !self.at_line_end() {
            self.advance();
        }
        self.eat(&Token::Newline);
    }

    /// True when the `)` under the cursor has no opening `(` earlier on its
    /// line and only more `)` follow it.
    fn unmatched_close_paren(&self) -> bool {
        if !self.check(&Token::RParen) {
            return false;
        }
        let line = self.span().line;
        let mut depth = 0i32;
        for s in self.tokens[..self.pos].iter().rev() {
            if s.span.line != line || s.token == Token::Newline {
                break;
            }
            match s.token {
                Token::LParen => depth += 1,
                Token::RParen => depth -= 1,
                _ => {}
            }
        }
        if depth > 0 {
            return false;
        }
        self.tokens[self.pos..]
            .iter()
            .take_while(|s| !matches!(s.token, Token::Newline | Token::Eof))
            .all(|s| s.token == Token::RParen)
    }

    /// Every statement ends at a newline or the end of input.
    fn expect_line_end(&mut self) -> Result<(), ParserError> {
        if self.lenient_parens && self.unmatched_close_paren() {
            self.warn("ignoring unmatched ')' at end of line".to_string());
            while self.eat(&Token::RParen) {}
        }
        match self.peek() {
            Token::Newline => {
                self.advance();
                Ok(())
            }
            Token::Eof => Ok(()),
            _ => Err(self.unexpected(&["end of line"])),
        }
    }

    // -------------------------------------------------------------------------
    // Script
    // -------------------------------------------------------------------------

    /// Parses the whole token stream. Returns the compiled script and every
    /// diagnostic; the script is only meaningful when no error was recorded.
    pub fn parse(mut self) -> (ScriptContext, Vec<Diagnostic>) {
        loop {
            self.skip_newlines();
            let result = match self.peek() {
                Token::Eof => break,
                Token::On => self.parse_handler(),
                Token::Macro => self.parse_macro(),
                Token::Factory => self.parse_factory(),
                Token::Method => self.parse_method(),
                _ => self.parse_statement_line(),
            };
            if let Err(err) = result {
                self.report(err);
                if self.asm.state() != DefState::None {
                    self.asm.end_def();
                }
                self.asm.abandon_repeats();
                self.skip_line();
            }
        }

        if !self.had_error() {
            if let Err(err) = self.asm.check_complete() {
                let err = self.internal(err);
                self.report(err);
            }
        }
        (self.asm.finish(), self.diagnostics)
    }

    fn parse_statement_line(&mut self) -> Result<(), ParserError> {
        self.parse_statement()?;
        self.expect_line_end()
    }

    /// Parses statements until a token that closes a block. The caller
    /// checks which closer it got.
    fn parse_block(&mut self) -> Result<(), ParserError> {
        loop {
            self.skip_newlines();
            match self.peek() {
                Token::Eof
                | Token::End
                | Token::Else
                | Token::On
                | Token::Macro
                | Token::Factory
                | Token::Method => return Ok(()),
                _ => {}
            }
            if let Err(err) = self.parse_statement_line() {
                self.report(err);
                self.skip_line();
            }
        }
    }

    /// `end [word]`. A word other than `expected` is only a warning.
    fn parse_end(&mut self, expected: &str) -> Result<(), ParserError> {
        self.expect(&Token::End)?;
        if !self.at_line_end() {
            let word = self.expect_name()?;
            if !word.eq_ignore_ascii_case(expected) {
                self.warn(format!(
                    "end mismatch. Expected {} but got {}",
                    expected, word
                ));
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Definitions
    // -------------------------------------------------------------------------

    /// Parameter names after a handler name, with optional parentheses.
    fn parse_params(&mut self) -> Result<Vec<String>, ParserError> {
        let mut params = Vec::new();
        let parens = self.eat(&Token::LParen);
        if !(self.at_line_end() || (parens && self.check(&Token::RParen))) {
            loop {
                let name = self.expect_ident()?;
                self.asm.classify(&name, VarKind::Argument);
                params.push(name);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        if parens {
            self.expect(&Token::RParen)?;
        }
        Ok(params)
    }

    /// Body after the header line, closed by `end [name]` or, without an
    /// `end` clause, by the next definition or the end of input.
    fn parse_def_body(&mut self, name: &str) -> Result<usize, ParserError> {
        self.asm.in_def();
        self.expect_line_end()?;
        let start = self.asm.pos();
        self.parse_block()?;
        match self.peek() {
            Token::End => {
                self.parse_end(name)?;
                self.expect_line_end()?;
            }
            Token::Eof | Token::On | Token::Macro | Token::Factory | Token::Method => {}
            _ => return Err(self.unexpected(&["end", "on", "end of input"])),
        }
        Ok(start)
    }

    fn finish_def(
        &mut self,
        name: &str,
        start: usize,
        args: Vec<String>,
        is_method: bool,
    ) -> Result<(), ParserError> {
        let defined = self.asm.define_handler(name, start, args, is_method);
        self.asm.end_def();
        match defined {
            Ok(()) => Ok(()),
            // leftovers of an earlier syntax error; the script is discarded anyway
            Err(_) if self.had_error() => Ok(()),
            Err(err) => Err(self.internal(err)),
        }
    }

    /// `on name [args] ... [end [name]]`
    fn parse_handler(&mut self) -> Result<(), ParserError> {
        self.expect(&Token::On)?;
        let name = self.expect_name()?;
        self.asm.end_factory();
        self.asm.start_def();
        let args = self.parse_params()?;
        let start = self.parse_def_body(&name)?;
        debug!("defined handler {} ({} args)", name, args.len());
        self.finish_def(&name, start, args, false)
    }

    /// `macro name [args]`, body runs to the next definition.
    fn parse_macro(&mut self) -> Result<(), ParserError> {
        self.expect(&Token::Macro)?;
        let name = self.expect_name()?;
        self.asm.end_factory();
        self.asm.start_def();
        let args = self.parse_params()?;
        let start = self.parse_def_body(&name)?;
        self.finish_def(&name, start, args, false)
    }

    /// `factory Name`
    fn parse_factory(&mut self) -> Result<(), ParserError> {
        self.expect(&Token::Factory)?;
        let name = self.expect_ident()?;
        self.asm.define_factory(&name);
        self.expect_line_end()
    }

    /// `method name [args]`: a factory method with an implicit `me`.
    fn parse_method(&mut self) -> Result<(), ParserError> {
        self.expect(&Token::Method)?;
        let name = self.expect_name()?;
        if !self.asm.in_factory() {
            self.warn(format!("method {} outside of a factory", name));
        }
        self.asm.start_method();
        let mut args = vec!["me".to_string()];
        args.extend(self.parse_params()?);
        let start = self.parse_def_body(&name)?;
        let is_method = self.asm.in_factory();
        self.finish_def(&name, start, args, is_method)
    }

    // -------------------------------------------------------------------------
    // Statements
    // -------------------------------------------------------------------------

    fn parse_statement(&mut self) -> Result<(), ParserError> {
        match self.peek() {
            Token::Put => self.parse_put(),
            Token::Set => self.parse_set(),
            Token::Global => self.parse_declaration(VarKind::Global),
            Token::Property => self.parse_declaration(VarKind::Property),
            Token::Instance => self.parse_declaration(VarKind::Instance),
            Token::If => self.parse_if(),
            Token::Repeat => self.parse_repeat(),
            Token::Exit => self.parse_exit(),
            Token::Next => self.parse_next(),
            Token::Return => self.parse_return(),
            Token::Go => self.parse_go(),
            Token::Play => self.parse_play(),
            Token::Tell => self.parse_tell(),
            Token::When => self.parse_when(),
            Token::Ident(_) => {
                if self.peek_next() == &Token::Eq {
                    self.parse_assignment()
                } else {
                    self.parse_call_statement()
                }
            }
            _ => Err(self.unexpected(&[
                "put", "set", "if", "repeat", "global", "return", "exit", "go", "identifier",
            ])),
        }
    }

    /// `global a, b` / `property a` / `instance a`
    fn parse_declaration(&mut self, kind: VarKind) -> Result<(), ParserError> {
        self.advance();
        loop {
            let name = self.expect_ident()?;
            self.asm.classify(&name, kind);
            if !self.eat(&Token::Comma) {
                return Ok(());
            }
        }
    }

    /// `x = expr`
    fn parse_assignment(&mut self) -> Result<(), ParserError> {
        let name = self.expect_ident()?;
        self.expect(&Token::Eq)?;
        self.parse_expr()?;
        self.emit_assign(&name, PutMode::Into);
        Ok(())
    }

    fn emit_assign(&mut self, name: &str, mode: PutMode) {
        let kind = self.asm.global_check();
        self.asm.classify(name, kind);
        self.asm.emit(Op::Assign {
            name: name.to_string(),
            mode,
        });
    }

    /// `put expr [into|after|before target]`
    fn parse_put(&mut self) -> Result<(), ParserError> {
        self.expect(&Token::Put)?;
        self.parse_expr()?;
        let mode = match self.peek() {
            Token::Into => PutMode::Into,
            Token::After => PutMode::After,
            Token::Before => PutMode::Before,
            _ => {
                self.asm.emit(Op::PrintTop);
                return Ok(());
            }
        };
        self.advance();

        // target operands go above the value
        let target = self.parse_target()?;
        match target {
            Target::Var(name) => self.emit_assign(&name, mode),
            Target::Chunk { kind, name } => {
                let var_kind = self.asm.global_check();
                self.asm.classify(&name, var_kind);
                self.asm.emit(Op::ChunkAssign { kind, name, mode });
            }
            Target::The { field } if mode == PutMode::Into => {
                self.asm.emit(Op::TheEntityAssign { field });
            }
            Target::TheOf { field, entity } if mode == PutMode::Into => {
                self.asm.emit(Op::TheEntityOfAssign { field, entity });
            }
            Target::ObjectProp { object, prop } if mode == PutMode::Into => {
                self.asm.emit(Op::ObjectPropAssign { object, prop });
            }
            _ => return Err(self.error("put after/before needs a variable or chunk")),
        }
        Ok(())
    }

    /// Parses an assignment target, emitting any operand expressions.
    fn parse_target(&mut self) -> Result<Target, ParserError> {
        match self.peek() {
            Token::Ident(_) => {
                let name = self.expect_ident()?;
                if self.eat(&Token::Dot) {
                    let prop = self.expect_name()?;
                    return Ok(Target::ObjectProp { object: name, prop });
                }
                Ok(Target::Var(name))
            }
            Token::Char | Token::Word | Token::Item | Token::Line => {
                let kind = self.parse_chunk_kind()?;
                self.parse_chunk_range()?;
                self.expect(&Token::Of)?;
                let name = self.expect_ident()?;
                Ok(Target::Chunk { kind, name })
            }
            Token::The => {
                self.advance();
                let field = self.expect_name()?;
                if self.eat(&Token::Of) {
                    let entity = self.parse_entity_word();
                    self.parse_unary()?;
                    Ok(Target::TheOf { field, entity })
                } else {
                    Ok(Target::The { field })
                }
            }
            _ => Err(self.unexpected(&["identifier", "the", "char", "word", "item", "line"])),
        }
    }

    /// `set target to expr` / `set target = expr`
    fn parse_set(&mut self) -> Result<(), ParserError> {
        self.expect(&Token::Set)?;
        let target = self.parse_target()?;
        if !(self.eat(&Token::To) || self.eat(&Token::Eq)) {
            return Err(self.unexpected(&["to", "="]));
        }
        self.parse_expr()?;
        match target {
            Target::Var(name) => self.emit_assign(&name, PutMode::Into),
            Target::The { field } => {
                self.asm.emit(Op::TheEntityAssign { field });
            }
            Target::TheOf { field, entity } => {
                // entity id was emitted first; the value must sit below it
                self.asm.emit(Op::Swap);
                self.asm.emit(Op::TheEntityOfAssign { field, entity });
            }
            Target::ObjectProp { object, prop } => {
                self.asm.emit(Op::ObjectPropAssign { object, prop });
            }
            Target::Chunk { .. } => {
                return Err(self.error("chunks can only be changed with put"));
            }
        }
        Ok(())
    }

    /// `name args` or `name(args)` as a statement.
    fn parse_call_statement(&mut self) -> Result<(), ParserError> {
        let name = self.expect_ident()?;
        let argc = if self.check(&Token::LParen) {
            self.parse_call_args()?
        } else {
            let mut argc = 0;
            if !self.at_line_end() && !self.check(&Token::Else) {
                loop {
                    self.parse_expr()?;
                    argc += 1;
                    if !self.eat(&Token::Comma) {
                        break;
                    }
                }
            }
            argc
        };
        self.asm.emit(Op::Call { name, argc });
        Ok(())
    }

    fn parse_return(&mut self) -> Result<(), ParserError> {
        self.expect(&Token::Return)?;
        if self.at_line_end() || self.check(&Token::Else) {
            self.asm.emit(Op::Exit);
        } else {
            self.parse_expr()?;
            self.asm.emit(Op::Return);
        }
        Ok(())
    }

    /// `exit` leaves the handler; `exit repeat` leaves the innermost loop.
    fn parse_exit(&mut self) -> Result<(), ParserError> {
        self.expect(&Token::Exit)?;
        if self.eat(&Token::Repeat) {
            if self.asm.add_exit().is_none() {
                self.warn("exit repeat not inside repeat block".to_string());
            }
        } else {
            self.asm.emit(Op::Exit);
        }
        Ok(())
    }

    fn parse_next(&mut self) -> Result<(), ParserError> {
        self.expect(&Token::Next)?;
        self.expect(&Token::Repeat)?;
        if self.asm.add_next().is_none() {
            self.warn("next repeat not inside repeat block".to_string());
        }
        Ok(())
    }

    /// `go [to] [frame] expr`, `go [to] loop|next|previous`
    fn parse_go(&mut self) -> Result<(), ParserError> {
        self.expect(&Token::Go)?;
        self.eat(&Token::To);
        if self.eat(&Token::Next) {
            self.asm.emit(Op::Go(GoTarget::Next));
            return Ok(());
        }
        if self.peek().is_word("loop") {
            self.advance();
            self.asm.emit(Op::Go(GoTarget::Loop));
            return Ok(());
        }
        if self.peek().is_word("previous") {
            self.advance();
            self.asm.emit(Op::Go(GoTarget::Previous));
            return Ok(());
        }
        if self.peek().is_word("frame") {
            self.advance();
        }
        self.parse_expr()?;
        self.asm.emit(Op::Goto);
        Ok(())
    }

    /// `play [frame] expr`, `play done`
    fn parse_play(&mut self) -> Result<(), ParserError> {
        self.expect(&Token::Play)?;
        if self.peek().is_word("done") {
            self.advance();
            self.asm.emit(Op::PlayDone);
            return Ok(());
        }
        if self.peek().is_word("frame") {
            self.advance();
        }
        self.parse_expr()?;
        self.asm.emit(Op::Play);
        Ok(())
    }

    /// `tell expr to stmt` or a `tell expr ... end tell` block.
    fn parse_tell(&mut self) -> Result<(), ParserError> {
        self.expect(&Token::Tell)?;
        self.parse_expr()?;
        self.asm.emit(Op::Tell);
        if self.eat(&Token::To) {
            self.parse_statement()?;
        } else {
            self.expect_line_end()?;
            self.parse_block()?;
            self.parse_end("tell")?;
        }
        self.asm.emit(Op::TellDone);
        Ok(())
    }

    /// `when event then code`: the rest of the line is kept as source text.
    fn parse_when(&mut self) -> Result<(), ParserError> {
        self.expect(&Token::When)?;
        let event = self.expect_name()?;
        self.expect(&Token::Then)?;
        let span = self.span();
        let code = if self.at_line_end() {
            String::new()
        } else {
            self.lines
                .get(span.line - 1)
                .map(|line| line.chars().skip(span.col - 1).collect::<String>())
                .unwrap_or_default()
                .trim()
                .to_string()
        };
        while !self.at_line_end() {
            self.advance();
        }
        self.asm.emit(Op::WhenCode { event, code });
        Ok(())
    }

    // -------------------------------------------------------------------------
    // if
    // -------------------------------------------------------------------------

    /// `if cond then stmt [else stmt]` on one line, or the block form
    /// with any number of `else if` clauses and an optional `else`.
    ///
    /// Each false condition jumps to the next clause; each finished clause
    /// jumps to the end of the whole chain.
    fn parse_if(&mut self) -> Result<(), ParserError> {
        self.expect(&Token::If)?;
        self.parse_expr()?;
        self.skip_newlines();
        self.expect(&Token::Then)?;
        let jz = self.asm.emit_forward_jump_if_z();

        if !self.at_line_end() {
            return self.parse_if_single_line(jz);
        }

        let mut next_clause = Some(jz);
        let mut end_jumps = Vec::new();
        self.parse_block()?;

        while self.check(&Token::Else) {
            self.advance();
            let end_jump = self.asm.emit_forward_jump();
            end_jumps.push(end_jump);
            if let Some(site) = next_clause.take() {
                self.asm.patch_here(site).map_err(|e| self.internal(e))?;
            }

            if self.eat(&Token::If) {
                self.parse_expr()?;
                self.skip_newlines();
                self.expect(&Token::Then)?;
                next_clause = Some(self.asm.emit_forward_jump_if_z());
                if self.at_line_end() {
                    self.parse_block()?;
                } else {
                    self.parse_statement()?;
                    self.expect_line_end()?;
                    self.skip_newlines();
                }
            } else {
                if self.at_line_end() {
                    self.parse_block()?;
                } else {
                    self.parse_statement()?;
                    self.expect_line_end()?;
                    self.skip_newlines();
                }
                break;
            }
        }

        if !self.check(&Token::End) {
            return Err(self.unexpected(&["else", "end"]));
        }
        self.parse_end("if")?;

        if let Some(site) = next_clause {
            self.asm.patch_here(site).map_err(|e| self.internal(e))?;
        }
        for site in end_jumps {
            self.asm.patch_here(site).map_err(|e| self.internal(e))?;
        }
        Ok(())
    }

    fn parse_if_single_line(&mut self, jz: usize) -> Result<(), ParserError> {
        self.parse_statement()?;
        // `else` may also open the following line
        if self.check(&Token::Newline) && *self.peek_next() == Token::Else {
            self.advance();
        }
        if self.eat(&Token::Else) {
            let end_jump = self.asm.emit_forward_jump();
            self.asm.patch_here(jz).map_err(|e| self.internal(e))?;
            self.parse_statement()?;
            self.asm.patch_here(end_jump).map_err(|e| self.internal(e))?;
        } else {
            self.asm.patch_here(jz).map_err(|e| self.internal(e))?;
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // repeat
    // -------------------------------------------------------------------------

    fn parse_repeat(&mut self) -> Result<(), ParserError> {
        self.expect(&Token::Repeat)?;
        match self.peek() {
            Token::While => self.parse_repeat_while(),
            Token::With => {
                self.advance();
                let name = self.expect_ident()?;
                if self.eat(&Token::In) {
                    self.parse_repeat_in(name)
                } else {
                    self.expect(&Token::Eq)?;
                    self.parse_repeat_counted(name)
                }
            }
            _ => Err(self.unexpected(&["while", "with"])),
        }
    }

    /// ```text
    /// top:  cond
    ///       JUMPIFZ end
    ///       body
    ///       JUMP top
    /// end:
    /// ```
    fn parse_repeat_while(&mut self) -> Result<(), ParserError> {
        self.expect(&Token::While)?;
        let top = self.asm.pos();
        self.parse_expr()?;
        self.expect_line_end()?;
        let jz = self.asm.emit_forward_jump_if_z();

        self.asm.start_repeat();
        self.parse_block()?;
        self.parse_end("repeat")?;

        self.asm.emit_jump_to(top);
        self.asm.patch_here(jz).map_err(|e| self.internal(e))?;
        let end = self.asm.pos();
        self.asm.end_repeat(end, top).map_err(|e| self.internal(e))
    }

    /// ```text
    ///       a; ASSIGN i
    /// top:  EVAL i; b; LE (GE for down to)
    ///       JUMPIFZ end
    ///       body
    /// next: EVAL i; INTPUSH 1; ADD (SUB); ASSIGN i
    ///       JUMP top
    /// end:
    /// ```
    fn parse_repeat_counted(&mut self, name: String) -> Result<(), ParserError> {
        self.parse_expr()?;
        self.emit_assign(&name, PutMode::Into);

        let down = self.eat(&Token::Down);
        self.expect(&Token::To)?;

        let top = self.asm.emit(Op::Eval(name.clone()));
        self.parse_expr()?;
        self.asm.emit(if down { Op::Ge } else { Op::Le });
        self.expect_line_end()?;
        let jz = self.asm.emit_forward_jump_if_z();

        self.asm.start_repeat();
        self.parse_block()?;
        self.parse_end("repeat")?;

        let next = self.asm.emit(Op::Eval(name.clone()));
        self.asm.emit(Op::IntPush(1));
        self.asm.emit(if down { Op::Sub } else { Op::Add });
        self.asm.emit(Op::Assign {
            name,
            mode: PutMode::Into,
        });
        self.asm.emit_jump_to(top);
        self.asm.patch_here(jz).map_err(|e| self.internal(e))?;
        let end = self.asm.pos();
        self.asm.end_repeat(end, next).map_err(|e| self.internal(e))
    }

    /// Keeps (list, size, counter) on the stack for the whole loop and drops
    /// all three on every way out.
    ///
    /// ```text
    ///       list; STACKPEEK 0; CALLFUNC count 1; INTPUSH 1
    /// top:  STACKPEEK 0; STACKPEEK 2; LE
    ///       JUMPIFZ end
    ///       STACKPEEK 2; STACKPEEK 1; CALLFUNC getAt 2; ASSIGN v
    ///       body
    /// next: INTPUSH 1; ADD
    ///       JUMP top
    /// end:  STACKDROP 3
    /// ```
    fn parse_repeat_in(&mut self, name: String) -> Result<(), ParserError> {
        self.parse_expr()?;
        self.expect_line_end()?;
        self.asm.emit(Op::StackPeek(0));
        self.asm.emit(Op::CallFunc {
            name: "count".to_string(),
            argc: 1,
        });
        self.asm.emit(Op::IntPush(1));

        let top = self.asm.emit(Op::StackPeek(0));
        self.asm.emit(Op::StackPeek(2));
        self.asm.emit(Op::Le);
        let jz = self.asm.emit_forward_jump_if_z();

        self.asm.emit(Op::StackPeek(2));
        self.asm.emit(Op::StackPeek(1));
        self.asm.emit(Op::CallFunc {
            name: "getAt".to_string(),
            argc: 2,
        });
        self.emit_assign(&name, PutMode::Into);

        self.asm.start_repeat();
        self.parse_block()?;
        self.parse_end("repeat")?;

        let next = self.asm.emit(Op::IntPush(1));
        self.asm.emit(Op::Add);
        self.asm.emit_jump_to(top);
        self.asm.patch_here(jz).map_err(|e| self.internal(e))?;
        let end = self.asm.emit(Op::StackDrop(3));
        self.asm.end_repeat(end, next).map_err(|e| self.internal(e))
    }

    // -------------------------------------------------------------------------
    // Expressions, lowest precedence first:
    //   and or < not < relational < & && < + - < * / mod < unary -
    // -------------------------------------------------------------------------

    pub fn parse_expr(&mut self) -> Result<(), ParserError> {
        self.parse_not()?;
        loop {
            let op = match self.peek() {
                Token::And => Op::And,
                Token::Or => Op::Or,
                _ => return Ok(()),
            };
            self.advance();
            self.parse_not()?;
            self.asm.emit(op);
        }
    }

    fn parse_not(&mut self) -> Result<(), ParserError> {
        if self.eat(&Token::Not) {
            self.parse_not()?;
            self.asm.emit(Op::Not);
            return Ok(());
        }
        self.parse_relational()
    }

    fn parse_relational(&mut self) -> Result<(), ParserError> {
        self.parse_concat()?;
        loop {
            let op = match self.peek() {
                Token::Eq => Op::Eq,
                Token::NotEq => Op::Neq,
                Token::Lt => Op::Lt,
                Token::Gt => Op::Gt,
                Token::LtEq => Op::Le,
                Token::GtEq => Op::Ge,
                Token::Contains => Op::Contains,
                Token::Starts => Op::Starts,
                _ => return Ok(()),
            };
            self.advance();
            self.parse_concat()?;
            self.asm.emit(op);
        }
    }

    fn parse_concat(&mut self) -> Result<(), ParserError> {
        self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Token::Ampersand => Op::Ampersand,
                Token::DoubleAmpersand => Op::Concat,
                _ => return Ok(()),
            };
            self.advance();
            self.parse_additive()?;
            self.asm.emit(op);
        }
    }

    fn parse_additive(&mut self) -> Result<(), ParserError> {
        self.parse_term()?;
        loop {
            let op = match self.peek() {
                Token::Plus => Op::Add,
                Token::Minus => Op::Sub,
                _ => return Ok(()),
            };
            self.advance();
            self.parse_term()?;
            self.asm.emit(op);
        }
    }

    fn parse_term(&mut self) -> Result<(), ParserError> {
        self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => Op::Mul,
                Token::Slash => Op::Div,
                Token::Mod => Op::Mod,
                _ => return Ok(()),
            };
            self.advance();
            self.parse_unary()?;
            self.asm.emit(op);
        }
    }

    fn parse_unary(&mut self) -> Result<(), ParserError> {
        match self.peek() {
            Token::Minus => {
                self.advance();
                self.parse_unary()?;
                self.asm.emit(Op::Negate);
                Ok(())
            }
            Token::Plus => {
                self.advance();
                self.parse_unary()
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<(), ParserError> {
        match self.peek().clone() {
            Token::Integer(n) => {
                self.advance();
                self.asm.emit(Op::IntPush(n));
            }
            Token::Float(n) => {
                self.advance();
                self.asm.emit(Op::FloatPush(n));
            }
            Token::String(s) => {
                self.advance();
                self.asm.emit(Op::StringPush(s));
            }
            Token::Symbol(s) => {
                self.advance();
                self.asm.emit(Op::SymbolPush(s));
            }
            Token::LParen => {
                self.advance();
                self.parse_expr()?;
                self.expect(&Token::RParen)?;
            }
            Token::LBracket => self.parse_list()?,
            Token::The => self.parse_the()?,
            Token::Char | Token::Word | Token::Item | Token::Line => self.parse_chunk()?,
            Token::Sprite => self.parse_sprite_test()?,
            Token::Ident(name) => {
                self.advance();
                self.parse_name_expr(name)?;
            }
            _ => {
                return Err(self.unexpected(&[
                    "integer",
                    "float",
                    "string",
                    "symbol",
                    "identifier",
                    "(",
                    "[",
                    "the",
                    "-",
                    "not",
                ]));
            }
        }
        Ok(())
    }

    /// Identifier in an expression: constant, call, `obj.prop` or variable.
    fn parse_name_expr(&mut self, name: String) -> Result<(), ParserError> {
        if self.check(&Token::LParen) {
            let argc = self.parse_call_args()?;
            self.asm.emit(Op::CallFunc { name, argc });
            return Ok(());
        }
        if self.eat(&Token::Dot) {
            let prop = self.expect_name()?;
            self.asm.emit(Op::ObjectPropPush { object: name, prop });
            return Ok(());
        }
        let op = match name.to_ascii_lowercase().as_str() {
            "true" => Op::IntPush(1),
            "false" => Op::IntPush(0),
            "empty" => Op::StringPush(String::new()),
            _ => Op::Eval(name),
        };
        self.asm.emit(op);
        Ok(())
    }

    /// `( [expr {, expr}] )`, returns the argument count.
    fn parse_call_args(&mut self) -> Result<u32, ParserError> {
        self.expect(&Token::LParen)?;
        let mut argc = 0;
        if !self.check(&Token::RParen) {
            loop {
                self.parse_expr()?;
                argc += 1;
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(&Token::RParen)?;
        Ok(argc)
    }

    /// `[]`, `[:]`, `[a, b]` or `[#k: v, ...]`
    fn parse_list(&mut self) -> Result<(), ParserError> {
        self.expect(&Token::LBracket)?;
        if self.eat(&Token::RBracket) {
            self.asm.emit(Op::ArrayPush(0));
            return Ok(());
        }
        if self.eat(&Token::Colon) {
            self.expect(&Token::RBracket)?;
            self.asm.emit(Op::PropArrayPush(0));
            return Ok(());
        }

        self.parse_expr()?;
        if self.eat(&Token::Colon) {
            self.parse_expr()?;
            let mut pairs = 1;
            while self.eat(&Token::Comma) {
                self.parse_expr()?;
                self.expect(&Token::Colon)?;
                self.parse_expr()?;
                pairs += 1;
            }
            self.expect(&Token::RBracket)?;
            self.asm.emit(Op::PropArrayPush(pairs));
        } else {
            let mut count = 1;
            while self.eat(&Token::Comma) {
                self.parse_expr()?;
                count += 1;
            }
            self.expect(&Token::RBracket)?;
            self.asm.emit(Op::ArrayPush(count));
        }
        Ok(())
    }

    /// Optional entity word after `of` in `the field of sprite 1`.
    fn parse_entity_word(&mut self) -> Option<String> {
        if self.eat(&Token::Sprite) {
            return Some("sprite".to_string());
        }
        let word = match self.peek() {
            Token::Ident(w) => w.to_ascii_lowercase(),
            _ => return None,
        };
        if ENTITY_WORDS.contains(&word.as_str()) {
            self.advance();
            return Some(word);
        }
        None
    }

    /// `the field` or `the field of [entity] expr`
    fn parse_the(&mut self) -> Result<(), ParserError> {
        self.expect(&Token::The)?;
        let field = self.expect_name()?;
        if self.eat(&Token::Of) {
            let entity = self.parse_entity_word();
            self.parse_unary()?;
            self.asm.emit(Op::TheEntityOfPush { field, entity });
        } else {
            self.asm.emit(Op::TheEntityPush { field });
        }
        Ok(())
    }

    fn parse_chunk_kind(&mut self) -> Result<ChunkKind, ParserError> {
        let kind = match self.peek() {
            Token::Char => ChunkKind::Char,
            Token::Word => ChunkKind::Word,
            Token::Item => ChunkKind::Item,
            Token::Line => ChunkKind::Line,
            _ => return Err(self.unexpected(&["char", "word", "item", "line"])),
        };
        self.advance();
        Ok(kind)
    }

    /// `from [to to]`; a missing `to` is pushed as 0.
    fn parse_chunk_range(&mut self) -> Result<(), ParserError> {
        self.parse_additive()?;
        if self.eat(&Token::To) {
            self.parse_additive()?;
        } else {
            self.asm.emit(Op::IntPush(0));
        }
        Ok(())
    }

    /// `char|word|item|line from [to to] of operand`
    fn parse_chunk(&mut self) -> Result<(), ParserError> {
        let kind = self.parse_chunk_kind()?;
        self.parse_chunk_range()?;
        self.expect(&Token::Of)?;
        self.parse_unary()?;
        self.asm.emit(Op::ChunkOf(kind));
        Ok(())
    }

    /// `sprite a intersects b` / `sprite a within b`
    fn parse_sprite_test(&mut self) -> Result<(), ParserError> {
        self.expect(&Token::Sprite)?;
        self.parse_unary()?;
        let op = match self.peek() {
            Token::Intersects => Op::Intersects,
            Token::Within => Op::Within,
            _ => return Err(self.unexpected(&["intersects", "within"])),
        };
        self.advance();
        self.parse_unary()?;
        self.asm.emit(op);
        Ok(())
    }
}
