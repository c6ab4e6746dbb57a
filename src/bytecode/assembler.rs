use std::collections::BTreeSet;

use crate::bytecode::{
    CompileError, Op,
    ir::{Factory, Handler, ScriptContext, ScriptType},
    scope::{ScopeTable, VarKind},
};

/// Where the parser is relative to a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefState {
    None,
    InArgs,
    InDef,
}

/// Pending `exit repeat` / `next repeat` jumps of one loop.
#[derive(Debug, Default)]
struct RepeatBlock {
    exits: Vec<usize>,
    nexts: Vec<usize>,
}

/// Code buffer and compile-time state for one script.
///
/// The parser calls into this as it recognizes each construct. Instructions
/// are addressed by index; indices never move until a finished definition is
/// split off the end of the buffer.
pub struct Assembler {
    code: Vec<Op>,
    /// Forward jumps still holding a placeholder offset.
    pending: BTreeSet<usize>,
    /// Innermost definition is last.
    scopes: Vec<ScopeTable>,
    repeats: Vec<RepeatBlock>,
    state: DefState,
    factory: Option<String>,
    context: ScriptContext,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembler {
    pub fn new() -> Self {
        Self {
            code: Vec::new(),
            pending: BTreeSet::new(),
            scopes: vec![ScopeTable::new()],
            repeats: Vec::new(),
            state: DefState::None,
            factory: None,
            context: ScriptContext::new(ScriptType::Movie, 0),
        }
    }

    // -------------------------------------------------------------------------
    // Emission
    // -------------------------------------------------------------------------

    /// Index the next instruction will get.
    pub fn pos(&self) -> usize {
        self.code.len()
    }

    pub fn code(&self) -> &[Op] {
        &self.code
    }

    pub fn emit(&mut self, op: Op) -> usize {
        self.code.push(op);
        self.code.len() - 1
    }

    /// Emits `Jump(0)` to be patched later.
    pub fn emit_forward_jump(&mut self) -> usize {
        let site = self.emit(Op::Jump(0));
        self.pending.insert(site);
        site
    }

    /// Emits `JumpIfZ(0)` to be patched later.
    pub fn emit_forward_jump_if_z(&mut self) -> usize {
        let site = self.emit(Op::JumpIfZ(0));
        self.pending.insert(site);
        site
    }

    /// Emits a jump to an already known position.
    pub fn emit_jump_to(&mut self, target: usize) -> usize {
        let site = self.pos();
        self.emit(Op::Jump(target as i32 - site as i32))
    }

    /// Resolves the forward jump at `site` to `target`.
    ///
    /// Each site may be patched exactly once.
    pub fn patch(&mut self, site: usize, target: usize) -> Result<(), CompileError> {
        if !self.pending.remove(&site) {
            return match self.code.get(site) {
                None => Err(CompileError::SiteOutOfRange { site }),
                Some(op) if !op.is_jump() => Err(CompileError::NotAJump {
                    site,
                    op: op.clone(),
                }),
                Some(_) => Err(CompileError::DoublePatch { site }),
            };
        }
        let offset = target as i32 - site as i32;
        match &mut self.code[site] {
            Op::Jump(o) | Op::JumpIfZ(o) => *o = offset,
            op => {
                return Err(CompileError::NotAJump {
                    site,
                    op: op.clone(),
                });
            }
        }
        Ok(())
    }

    /// Patches `site` to the current end of the buffer.
    pub fn patch_here(&mut self, site: usize) -> Result<(), CompileError> {
        let here = self.pos();
        self.patch(site, here)
    }

    pub fn unresolved(&self) -> Vec<usize> {
        self.pending.iter().copied().collect()
    }

    pub fn check_complete(&self) -> Result<(), CompileError> {
        if !self.pending.is_empty() {
            return Err(CompileError::UnresolvedJumps {
                sites: self.unresolved(),
            });
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Variables
    // -------------------------------------------------------------------------

    fn scope_mut(&mut self) -> &mut ScopeTable {
        if self.scopes.is_empty() {
            self.scopes.push(ScopeTable::new());
        }
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    pub fn scope(&self) -> Option<&ScopeTable> {
        self.scopes.last()
    }

    pub fn state(&self) -> DefState {
        self.state
    }

    /// Kind for a name assigned without a declaration.
    pub fn global_check(&self) -> VarKind {
        if self.state == DefState::InDef {
            VarKind::Local
        } else {
            VarKind::Global
        }
    }

    /// Classifies `name` in the current scope. First classification wins.
    ///
    /// A new property or instance name is added to the script's property
    /// list; a new global gets a slot in the script's global list.
    pub fn classify(&mut self, name: &str, kind: VarKind) {
        if !self.scope_mut().classify(name, kind) {
            return;
        }
        match kind {
            VarKind::Property | VarKind::Instance => {
                push_unique(&mut self.context.properties, name);
            }
            VarKind::Global => {
                push_unique(&mut self.context.globals, name);
            }
            VarKind::Local | VarKind::Argument => {}
        }
    }

    // -------------------------------------------------------------------------
    // Definitions
    // -------------------------------------------------------------------------

    /// Opens a definition scope. The parser is now reading arguments.
    pub fn start_def(&mut self) {
        self.state = DefState::InArgs;
        let parent = self.scopes.last().cloned().unwrap_or_default();
        let instances: &[String] = if self.factory.is_some() {
            &self.context.properties
        } else {
            &[]
        };
        let table = ScopeTable::seeded_from(&parent, instances);
        self.scopes.push(table);
    }

    /// Starts a factory method: like `start_def`, with `me` as first argument.
    pub fn start_method(&mut self) {
        self.start_def();
        self.scope_mut().force("me", VarKind::Argument);
    }

    /// Argument list is done; the body follows.
    pub fn in_def(&mut self) {
        self.state = DefState::InDef;
    }

    pub fn end_def(&mut self) {
        self.state = DefState::None;
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Moves `code[start..]` into a named handler, terminated by `Exit`.
    pub fn define_handler(
        &mut self,
        name: &str,
        start: usize,
        args: Vec<String>,
        is_method: bool,
    ) -> Result<(), CompileError> {
        if start > self.code.len() {
            return Err(CompileError::internal(format!(
                "handler '{}' starts past the end of the buffer",
                name
            )));
        }
        let open: Vec<usize> = self.pending.range(start..).copied().collect();
        if !open.is_empty() {
            return Err(CompileError::UnresolvedJumps { sites: open });
        }

        self.emit(Op::Exit);
        let code = self.code.split_off(start);
        let handler = Handler {
            name: name.to_string(),
            nargs: args.len() as u32,
            args,
            code,
            vars: self.scopes.last().cloned().unwrap_or_default(),
        };

        match (&self.factory, is_method) {
            (Some(factory), true) => {
                let entry = self
                    .context
                    .factories
                    .entry(factory.to_ascii_lowercase())
                    .or_insert_with(|| Factory {
                        name: factory.clone(),
                        methods: Default::default(),
                    });
                entry
                    .methods
                    .insert(handler.name.to_ascii_lowercase(), handler);
            }
            _ => self.context.add_handler(handler),
        }
        Ok(())
    }

    /// `factory Name`: following methods belong to `name`.
    pub fn define_factory(&mut self, name: &str) {
        self.context.factories.insert(
            name.to_ascii_lowercase(),
            Factory {
                name: name.to_string(),
                methods: Default::default(),
            },
        );
        self.factory = Some(name.to_string());
    }

    pub fn in_factory(&self) -> bool {
        self.factory.is_some()
    }

    /// An `on` or `macro` definition closes the open factory.
    pub fn end_factory(&mut self) {
        self.factory = None;
    }

    // -------------------------------------------------------------------------
    // Loops
    // -------------------------------------------------------------------------

    pub fn start_repeat(&mut self) {
        self.repeats.push(RepeatBlock::default());
    }

    /// Closes the innermost loop, resolving its `exit repeat` jumps to
    /// `exit_pos` and `next repeat` jumps to `next_pos`.
    pub fn end_repeat(&mut self, exit_pos: usize, next_pos: usize) -> Result<(), CompileError> {
        let block = self.repeats.pop().ok_or(CompileError::NoOpenRepeat)?;
        for site in block.exits {
            self.patch(site, exit_pos)?;
        }
        for site in block.nexts {
            self.patch(site, next_pos)?;
        }
        Ok(())
    }

    pub fn repeat_depth(&self) -> usize {
        self.repeats.len()
    }

    /// `exit repeat`. Returns `None` when no loop is open.
    pub fn add_exit(&mut self) -> Option<usize> {
        if self.repeats.is_empty() {
            return None;
        }
        let site = self.emit_forward_jump();
        self.repeats.last_mut().map(|block| {
            block.exits.push(site);
            site
        })
    }

    /// `next repeat`. Returns `None` when no loop is open.
    pub fn add_next(&mut self) -> Option<usize> {
        if self.repeats.is_empty() {
            return None;
        }
        let site = self.emit_forward_jump();
        self.repeats.last_mut().map(|block| {
            block.nexts.push(site);
            site
        })
    }

    /// Drops open loops left behind by error recovery.
    pub fn abandon_repeats(&mut self) {
        self.repeats.clear();
    }

    // -------------------------------------------------------------------------
    // Output
    // -------------------------------------------------------------------------

    /// Finishes the script. Remaining top-level code becomes the script body.
    pub fn finish(mut self) -> ScriptContext {
        if !self.code.is_empty() {
            self.code.push(Op::Exit);
        }
        self.context.script = self.code;
        self.context
    }
}

fn push_unique(names: &mut Vec<String>, name: &str) {
    if !names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
        names.push(name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_sets_relative_offset() {
        let mut asm = Assembler::new();
        asm.emit(Op::IntPush(1));
        let site = asm.emit_forward_jump_if_z();
        asm.emit(Op::IntPush(2));
        asm.emit(Op::PrintTop);
        asm.patch_here(site).unwrap();
        assert_eq!(asm.code()[site], Op::JumpIfZ(3));
        assert!(asm.check_complete().is_ok());
    }

    #[test]
    fn test_backward_jump() {
        let mut asm = Assembler::new();
        let top = asm.emit(Op::IntPush(1));
        asm.emit(Op::PrintTop);
        let site = asm.emit_jump_to(top);
        assert_eq!(asm.code()[site], Op::Jump(-2));
        assert!(asm.unresolved().is_empty());
    }

    #[test]
    fn test_double_patch_is_rejected() {
        let mut asm = Assembler::new();
        let site = asm.emit_forward_jump();
        asm.patch(site, 1).unwrap();
        assert_eq!(
            asm.patch(site, 1),
            Err(CompileError::DoublePatch { site })
        );
    }

    #[test]
    fn test_patch_non_jump_is_rejected() {
        let mut asm = Assembler::new();
        let site = asm.emit(Op::Add);
        assert!(matches!(
            asm.patch(site, 0),
            Err(CompileError::NotAJump { .. })
        ));
        assert!(matches!(
            asm.patch(10, 0),
            Err(CompileError::SiteOutOfRange { site: 10 })
        ));
    }

    #[test]
    fn test_unpatched_jump_is_reported() {
        let mut asm = Assembler::new();
        let site = asm.emit_forward_jump();
        assert_eq!(
            asm.check_complete(),
            Err(CompileError::UnresolvedJumps { sites: vec![site] })
        );
    }

    #[test]
    fn test_global_check_depends_on_state() {
        let mut asm = Assembler::new();
        assert_eq!(asm.global_check(), VarKind::Global);
        asm.start_def();
        assert_eq!(asm.global_check(), VarKind::Global);
        asm.in_def();
        assert_eq!(asm.global_check(), VarKind::Local);
        asm.end_def();
        assert_eq!(asm.global_check(), VarKind::Global);
    }

    #[test]
    fn test_classify_global_creates_slot_once() {
        let mut asm = Assembler::new();
        asm.classify("score", VarKind::Global);
        asm.classify("Score", VarKind::Global);
        let ctx = asm.finish();
        assert_eq!(ctx.globals, vec!["score".to_string()]);
    }

    #[test]
    fn test_classify_first_wins_inside_def() {
        let mut asm = Assembler::new();
        asm.start_def();
        asm.classify("x", VarKind::Argument);
        asm.in_def();
        asm.classify("x", VarKind::Global);
        assert_eq!(asm.scope().unwrap().kind("x"), Some(VarKind::Argument));
        let ctx = asm.finish();
        assert!(ctx.globals.is_empty());
    }

    #[test]
    fn test_def_scope_is_discarded() {
        let mut asm = Assembler::new();
        asm.classify("g", VarKind::Global);
        asm.start_def();
        asm.in_def();
        asm.classify("tmp", VarKind::Local);
        assert_eq!(asm.scope().unwrap().kind("g"), Some(VarKind::Global));
        asm.end_def();
        assert_eq!(asm.scope().unwrap().kind("tmp"), None);
    }

    #[test]
    fn test_define_handler_moves_code() {
        let mut asm = Assembler::new();
        asm.emit(Op::IntPush(7));
        asm.emit(Op::PrintTop);
        asm.start_def();
        asm.classify("a", VarKind::Argument);
        asm.in_def();
        let start = asm.pos();
        asm.emit(Op::Eval("a".to_string()));
        asm.emit(Op::Return);
        asm.define_handler("foo", start, vec!["a".to_string()], false)
            .unwrap();
        asm.end_def();

        let ctx = asm.finish();
        let foo = ctx.handler("FOO").unwrap();
        assert_eq!(foo.nargs, 1);
        assert_eq!(
            foo.code,
            vec![Op::Eval("a".to_string()), Op::Return, Op::Exit]
        );
        assert_eq!(foo.var_kind("a"), Some(VarKind::Argument));
        assert_eq!(ctx.script, vec![Op::IntPush(7), Op::PrintTop, Op::Exit]);
    }

    #[test]
    fn test_define_handler_rejects_open_jump() {
        let mut asm = Assembler::new();
        asm.start_def();
        asm.in_def();
        let site = asm.emit_forward_jump();
        assert_eq!(
            asm.define_handler("bad", 0, vec![], false),
            Err(CompileError::UnresolvedJumps { sites: vec![site] })
        );
    }

    #[test]
    fn test_exit_outside_loop_is_none() {
        let mut asm = Assembler::new();
        assert_eq!(asm.add_exit(), None);
        assert_eq!(asm.add_next(), None);
        assert!(asm.code().is_empty());
    }

    #[test]
    fn test_exit_targets_innermost_loop() {
        let mut asm = Assembler::new();
        asm.start_repeat();
        let outer_exit = asm.add_exit().unwrap();
        asm.start_repeat();
        let inner_exit = asm.add_exit().unwrap();
        let inner_next = asm.add_next().unwrap();
        asm.end_repeat(10, 3).unwrap();
        asm.end_repeat(20, 0).unwrap();

        assert_eq!(asm.code()[inner_exit], Op::Jump(10 - inner_exit as i32));
        assert_eq!(asm.code()[inner_next], Op::Jump(3 - inner_next as i32));
        assert_eq!(asm.code()[outer_exit], Op::Jump(20 - outer_exit as i32));
        assert_eq!(asm.end_repeat(0, 0), Err(CompileError::NoOpenRepeat));
    }

    #[test]
    fn test_factory_methods_see_instances() {
        let mut asm = Assembler::new();
        asm.define_factory("Counter");
        asm.classify("total", VarKind::Instance);
        asm.start_method();
        assert_eq!(asm.scope().unwrap().kind("total"), Some(VarKind::Instance));
        assert_eq!(asm.scope().unwrap().kind("me"), Some(VarKind::Argument));
        asm.in_def();
        let start = asm.pos();
        asm.define_handler("mNew", start, vec!["me".to_string()], true)
            .unwrap();
        asm.end_def();

        let ctx = asm.finish();
        assert!(ctx.method("counter", "mnew").is_some());
        assert!(ctx.handler("mNew").is_none());
        assert_eq!(ctx.properties, vec!["total".to_string()]);
    }
}
