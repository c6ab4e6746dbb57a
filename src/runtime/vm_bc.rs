use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::{debug, warn};

use crate::bytecode::op::{ChunkKind, GoTarget, PutMode};
use crate::bytecode::scope::VarKind;
use crate::bytecode::{Handler, Op, ScriptContext, ScriptType};
use crate::events::{ArchiveKind, Archives, HandlerExecutor, HandlerRef, LEvent, Signals};
use crate::lang::value::Value;
use crate::runtime::runtime_error::{
    RuntimeError, division_by_zero, index_out_of_bounds, stack_underflow, type_error,
    undefined_handler,
};

#[derive(Debug, Clone)]
pub struct InterpreterConfig {
    pub max_steps: usize,
    pub max_call_depth: usize,
    pub max_stack_size: usize,
    /// Highest chunk number `put ... into` may create in a string.
    pub max_chunk_pieces: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        InterpreterConfig {
            max_steps: 1_000_000,
            max_call_depth: 256,
            max_stack_size: 10_000,
            max_chunk_pieces: 100_000,
        }
    }
}

/// Playback requests made by scripts. The score is not modelled here, so
/// they are only recorded.
#[derive(Debug, Clone, PartialEq)]
pub enum MovieCommand {
    Goto(Value),
    Go(GoTarget),
    Play(Value),
    PlayDone,
    Tell(Value),
    TellDone,
}

/// Code being run and its local variables.
struct Frame<'a> {
    ctx: &'a ScriptContext,
    /// `None` for a script's top-level code.
    handler: Option<&'a Handler>,
    locals: HashMap<String, Value>,
}

/// Stack interpreter for compiled scripts.
///
/// Globals live in a single table keyed by lowercased name; property and
/// instance variables are kept per script. `the` properties are a plain map
/// the host can fill (`the locH of sprite 1` is stored under that key).
pub struct Interpreter {
    config: InterpreterConfig,
    stack: Vec<Value>,
    globals: HashMap<String, Value>,
    the: HashMap<String, Value>,
    properties: HashMap<(ScriptType, i32), HashMap<String, Value>>,
    output: Vec<String>,
    commands: Vec<MovieCommand>,
    signals: Signals,
    call_depth: usize,
    steps: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_config(InterpreterConfig::default())
    }

    pub fn with_config(config: InterpreterConfig) -> Self {
        Self {
            config,
            stack: Vec::new(),
            globals: HashMap::new(),
            the: HashMap::new(),
            properties: HashMap::new(),
            output: Vec::new(),
            commands: Vec::new(),
            signals: Signals::default(),
            call_depth: 0,
            steps: 0,
        }
    }

    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(&name.to_ascii_lowercase())
    }

    pub fn set_global(&mut self, name: &str, value: Value) {
        self.globals.insert(name.to_ascii_lowercase(), value);
    }

    /// Creates a slot for every global the script's compilation created.
    pub fn declare_globals(&mut self, ctx: &ScriptContext) {
        for name in &ctx.globals {
            self.globals.entry(name.to_ascii_lowercase()).or_default();
        }
    }

    pub fn the_value(&self, field: &str) -> Option<&Value> {
        self.the.get(&the_key(field, None, None))
    }

    pub fn set_the(&mut self, field: &str, value: Value) {
        self.the.insert(the_key(field, None, None), value);
    }

    pub fn set_the_of(&mut self, field: &str, entity: Option<&str>, id: &Value, value: Value) {
        self.the.insert(the_key(field, entity, Some(id)), value);
    }

    /// Lines printed by `put` without a target.
    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    pub fn commands(&self) -> &[MovieCommand] {
        &self.commands
    }

    pub fn reset_execution_state(&mut self) {
        self.steps = 0;
        self.call_depth = 0;
        self.stack.clear();
    }

    // -------------------------------------------------------------------------
    // Entry points
    // -------------------------------------------------------------------------

    /// Calls handler `name` of a script stored in `archives`.
    pub fn call_handler(
        &mut self,
        archives: &Archives,
        archive: ArchiveKind,
        script_type: ScriptType,
        entity: i32,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let ctx = lookup_context(archives, archive, script_type, entity)?;
        let handler = ctx.handler(name).ok_or_else(|| undefined_handler(name))?;
        self.reset_execution_state();
        self.invoke(archives, ctx, handler, args)
    }

    /// Runs the top-level code of a stored script.
    pub fn run_script(
        &mut self,
        archives: &Archives,
        archive: ArchiveKind,
        script_type: ScriptType,
        entity: i32,
    ) -> Result<(), RuntimeError> {
        let ctx = lookup_context(archives, archive, script_type, entity)?;
        self.reset_execution_state();
        self.declare_globals(ctx);
        let mut frame = Frame {
            ctx,
            handler: None,
            locals: HashMap::new(),
        };
        self.exec_code(archives, &mut frame, &ctx.script)
            .map_err(|e| e.with_context("<script>"))?;
        Ok(())
    }

    fn invoke<'a>(
        &mut self,
        archives: &'a Archives,
        ctx: &'a ScriptContext,
        handler: &'a Handler,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        debug!("calling {} ({} args)", handler.name, args.len());
        self.declare_globals(ctx);
        let mut args = args.into_iter();
        let locals = handler
            .args
            .iter()
            .map(|name| (name.to_ascii_lowercase(), args.next().unwrap_or_default()))
            .collect();
        let mut frame = Frame {
            ctx,
            handler: Some(handler),
            locals,
        };
        self.exec_code(archives, &mut frame, &handler.code)
            .map_err(|e| e.with_context(&handler.name))
    }

    /// Same script first, then movie scripts of the current and the other
    /// archive.
    fn find_handler<'a>(
        archives: &'a Archives,
        ctx: &'a ScriptContext,
        name: &str,
    ) -> Option<(&'a ScriptContext, &'a Handler)> {
        if let Some(handler) = ctx.handler(name) {
            return Some((ctx, handler));
        }
        let current = archives.current_kind();
        let other = match current {
            ArchiveKind::Main => ArchiveKind::Shared,
            ArchiveKind::Shared => ArchiveKind::Main,
        };
        [current, other].into_iter().find_map(|kind| {
            archives
                .get(kind)
                .movie_scripts()
                .find_map(|movie| movie.handler(name).map(|h| (movie, h)))
        })
    }

    fn call<'a>(
        &mut self,
        archives: &'a Archives,
        ctx: &'a ScriptContext,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        if let Some((target_ctx, handler)) = Self::find_handler(archives, ctx, name) {
            return self.invoke(archives, target_ctx, handler, args);
        }
        match self.call_builtin(name, &args) {
            Some(result) => result,
            None => Err(undefined_handler(name)),
        }
    }

    // -------------------------------------------------------------------------
    // Execution
    // -------------------------------------------------------------------------

    fn check_limits(&mut self) -> Result<(), RuntimeError> {
        self.steps += 1;

        if self.steps > self.config.max_steps {
            return Err(RuntimeError::new(format!(
                "execution step limit exceeded ({})",
                self.config.max_steps
            )));
        }

        if self.stack.len() > self.config.max_stack_size {
            return Err(RuntimeError::new(format!(
                "stack size limit exceeded ({})",
                self.config.max_stack_size
            )));
        }

        Ok(())
    }

    fn exec_code<'a>(
        &mut self,
        archives: &'a Archives,
        frame: &mut Frame<'a>,
        ops: &[Op],
    ) -> Result<Value, RuntimeError> {
        self.call_depth += 1;

        if self.call_depth > self.config.max_call_depth {
            self.call_depth -= 1;
            return Err(RuntimeError::new(format!(
                "call depth limit exceeded ({}) - possible infinite recursion",
                self.config.max_call_depth
            )));
        }

        let base = self.stack.len();
        let result = self.exec_code_inner(archives, frame, ops);
        self.stack.truncate(base);

        self.call_depth -= 1;
        result
    }

    fn jump_target(ops: &[Op], ip: usize, offset: i32) -> Result<usize, RuntimeError> {
        let new_ip = (ip as i64) + offset as i64;
        if new_ip < 0 || new_ip as usize > ops.len() {
            return Err(RuntimeError::new(format!(
                "jump out of bounds: ip={}, offset={}, target={}",
                ip, offset, new_ip
            )));
        }
        Ok(new_ip as usize)
    }

    fn exec_code_inner<'a>(
        &mut self,
        archives: &'a Archives,
        frame: &mut Frame<'a>,
        ops: &[Op],
    ) -> Result<Value, RuntimeError> {
        let mut ip: usize = 0;

        while ip < ops.len() {
            self.check_limits()?;

            match &ops[ip] {
                // Literals
                Op::IntPush(n) => self.push(Value::Integer(*n)),
                Op::FloatPush(n) => self.push(Value::Float(*n)),
                Op::StringPush(s) => self.push(Value::String(s.clone())),
                Op::SymbolPush(s) => self.push(Value::Symbol(s.clone())),
                Op::ArrayPush(n) => {
                    let items = self.pop_n(*n as usize, "arraypush")?;
                    self.push(Value::List(items));
                }
                Op::PropArrayPush(n) => {
                    let flat = self.pop_n(2 * *n as usize, "proparraypush")?;
                    let mut pairs = Vec::with_capacity(*n as usize);
                    let mut flat = flat.into_iter();
                    while let (Some(key), Some(value)) = (flat.next(), flat.next()) {
                        pairs.push((key, value));
                    }
                    self.push(Value::PropList(pairs));
                }

                // Variables
                Op::Eval(name) => {
                    let value = self.read_var(frame, name);
                    self.push(value);
                }
                Op::Assign { name, mode } => {
                    let value = self.pop("assign")?;
                    let value = match mode {
                        PutMode::Into => value,
                        PutMode::After => {
                            let current = self.read_var(frame, name);
                            Value::String(format!("{}{}", text_of(&current), value))
                        }
                        PutMode::Before => {
                            let current = self.read_var(frame, name);
                            Value::String(format!("{}{}", value, text_of(&current)))
                        }
                    };
                    self.write_var(frame, name, value);
                }

                // the / object properties
                Op::TheEntityPush { field } => {
                    let value = self.the.get(&the_key(field, None, None)).cloned();
                    self.push(value.unwrap_or_default());
                }
                Op::TheEntityOfPush { field, entity } => {
                    let id = self.pop("thepush")?;
                    let key = the_key(field, entity.as_deref(), Some(&id));
                    let value = self.the.get(&key).cloned();
                    self.push(value.unwrap_or_default());
                }
                Op::TheEntityAssign { field } => {
                    let value = self.pop("theassign")?;
                    self.the.insert(the_key(field, None, None), value);
                }
                Op::TheEntityOfAssign { field, entity } => {
                    let id = self.pop("theassign")?;
                    let value = self.pop("theassign")?;
                    self.the
                        .insert(the_key(field, entity.as_deref(), Some(&id)), value);
                }
                Op::ObjectPropPush { object, prop } => {
                    let target = self.read_var(frame, object);
                    let value = match &target {
                        Value::PropList(pairs) => prop_get(pairs, prop).cloned(),
                        other => {
                            return Err(type_error("property access", "propList", other.type_name()));
                        }
                    };
                    self.push(value.unwrap_or_default());
                }
                Op::ObjectPropAssign { object, prop } => {
                    let value = self.pop("propassign")?;
                    let mut pairs = match self.read_var(frame, object) {
                        Value::PropList(pairs) => pairs,
                        Value::Void => Vec::new(),
                        other => {
                            return Err(type_error("property assignment", "propList", other.type_name()));
                        }
                    };
                    prop_set(&mut pairs, prop, value);
                    self.write_var(frame, object, Value::PropList(pairs));
                }

                // Chunks
                Op::ChunkOf(kind) => {
                    let source = self.pop("chunk")?;
                    let to = self.pop_int("chunk")?;
                    let from = self.pop_int("chunk")?;
                    let text = chunk_of(*kind, &text_of(&source), from, to);
                    self.push(Value::String(text));
                }
                Op::ChunkAssign { kind, name, mode } => {
                    let to = self.pop_int("chunkassign")?;
                    let from = self.pop_int("chunkassign")?;
                    let value = self.pop("chunkassign")?;
                    let current = text_of(&self.read_var(frame, name));
                    let limit = self.config.max_chunk_pieces;
                    let updated =
                        chunk_put(*kind, &current, from, to, &text_of(&value), *mode, limit)?;
                    self.write_var(frame, name, Value::String(updated));
                }

                // Stack
                Op::Swap => {
                    let b = self.pop("swap")?;
                    let a = self.pop("swap")?;
                    self.push(b);
                    self.push(a);
                }
                Op::StackPeek(n) => {
                    let depth = *n as usize;
                    if depth >= self.stack.len() {
                        return Err(stack_underflow("stackpeek"));
                    }
                    let value = self.stack[self.stack.len() - 1 - depth].clone();
                    self.push(value);
                }
                Op::StackDrop(n) => {
                    self.pop_n(*n as usize, "stackdrop")?;
                }

                // Arithmetic
                Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Mod => {
                    let b = self.pop("arithmetic")?;
                    let a = self.pop("arithmetic")?;
                    let result = arithmetic(&ops[ip], &a, &b)?;
                    self.push(result);
                }
                Op::Negate => {
                    let value = match self.pop("negate")? {
                        Value::Integer(n) => Value::Integer(n.wrapping_neg()),
                        Value::Float(n) => Value::Float(-n),
                        other => {
                            let n = other
                                .as_float()
                                .ok_or_else(|| type_error("negate", "number", other.type_name()))?;
                            Value::Float(-n)
                        }
                    };
                    self.push(value);
                }

                // Strings
                Op::Ampersand | Op::Concat => {
                    let b = self.pop("concat")?;
                    let a = self.pop("concat")?;
                    let sep = if matches!(ops[ip], Op::Concat) { " " } else { "" };
                    self.push(Value::String(format!("{}{}{}", text_of(&a), sep, text_of(&b))));
                }
                Op::Contains => {
                    let b = self.pop("contains")?;
                    let a = self.pop("contains")?;
                    let found = text_of(&a)
                        .to_lowercase()
                        .contains(&text_of(&b).to_lowercase());
                    self.push(Value::from_bool(found));
                }
                Op::Starts => {
                    let b = self.pop("starts")?;
                    let a = self.pop("starts")?;
                    let found = text_of(&a)
                        .to_lowercase()
                        .starts_with(&text_of(&b).to_lowercase());
                    self.push(Value::from_bool(found));
                }

                // Comparison
                Op::Eq => {
                    let b = self.pop("eq")?;
                    let a = self.pop("eq")?;
                    self.push(Value::from_bool(a.lingo_eq(&b)));
                }
                Op::Neq => {
                    let b = self.pop("neq")?;
                    let a = self.pop("neq")?;
                    self.push(Value::from_bool(!a.lingo_eq(&b)));
                }
                Op::Lt | Op::Gt | Op::Le | Op::Ge => {
                    let b = self.pop("compare")?;
                    let a = self.pop("compare")?;
                    let ord = compare(&a, &b)?;
                    let result = match ops[ip] {
                        Op::Lt => ord == Ordering::Less,
                        Op::Gt => ord == Ordering::Greater,
                        Op::Le => ord != Ordering::Greater,
                        _ => ord != Ordering::Less,
                    };
                    self.push(Value::from_bool(result));
                }

                // Logic
                Op::And => {
                    let b = self.pop("and")?;
                    let a = self.pop("and")?;
                    self.push(Value::from_bool(a.is_truthy() && b.is_truthy()));
                }
                Op::Or => {
                    let b = self.pop("or")?;
                    let a = self.pop("or")?;
                    self.push(Value::from_bool(a.is_truthy() || b.is_truthy()));
                }
                Op::Not => {
                    let a = self.pop("not")?;
                    self.push(Value::from_bool(!a.is_truthy()));
                }

                // Sprites
                Op::Intersects | Op::Within => {
                    let b = self.pop("sprite test")?;
                    let a = self.pop("sprite test")?;
                    let result = match (self.sprite_rect(&a), self.sprite_rect(&b)) {
                        (Some(ra), Some(rb)) => {
                            if matches!(ops[ip], Op::Intersects) {
                                ra[0] < rb[2] && rb[0] < ra[2] && ra[1] < rb[3] && rb[1] < ra[3]
                            } else {
                                ra[0] >= rb[0] && ra[1] >= rb[1] && ra[2] <= rb[2] && ra[3] <= rb[3]
                            }
                        }
                        _ => false,
                    };
                    self.push(Value::from_bool(result));
                }

                // Control flow
                Op::Jump(offset) => {
                    ip = Self::jump_target(ops, ip, *offset)?;
                    continue;
                }
                Op::JumpIfZ(offset) => {
                    if !self.pop("jumpifz")?.is_truthy() {
                        ip = Self::jump_target(ops, ip, *offset)?;
                        continue;
                    }
                }

                Op::Call { name, argc } => {
                    let args = self.pop_n(*argc as usize, name)?;
                    self.call(archives, frame.ctx, name, args)?;
                }
                Op::CallFunc { name, argc } => {
                    let args = self.pop_n(*argc as usize, name)?;
                    let result = self.call(archives, frame.ctx, name, args)?;
                    self.push(result);
                }
                Op::Return => return self.pop("return"),
                Op::Exit => return Ok(Value::Void),

                // Movie control
                Op::PrintTop => {
                    let value = self.pop("put")?;
                    debug!("put: {}", value);
                    self.output.push(value.to_string());
                }
                Op::Goto => {
                    let target = self.pop("go")?;
                    self.commands.push(MovieCommand::Goto(target));
                }
                Op::Go(target) => self.commands.push(MovieCommand::Go(*target)),
                Op::Play => {
                    let target = self.pop("play")?;
                    self.commands.push(MovieCommand::Play(target));
                }
                Op::PlayDone => self.commands.push(MovieCommand::PlayDone),
                Op::Tell => {
                    let target = self.pop("tell")?;
                    self.commands.push(MovieCommand::Tell(target));
                }
                Op::TellDone => self.commands.push(MovieCommand::TellDone),
                Op::WhenCode { event, code } => match LEvent::from_name(event) {
                    Some(event) => self.signals.primary_handlers.push((event, code.clone())),
                    None => warn!("when: unknown event {}", event),
                },
            }

            ip += 1;
        }

        Ok(Value::Void)
    }

    // -------------------------------------------------------------------------
    // Variables
    // -------------------------------------------------------------------------

    fn var_kind(frame: &Frame<'_>, name: &str) -> VarKind {
        if let Some(handler) = frame.handler {
            return handler.var_kind(name).unwrap_or(VarKind::Local);
        }
        if frame
            .ctx
            .globals
            .iter()
            .any(|g| g.eq_ignore_ascii_case(name))
        {
            VarKind::Global
        } else {
            VarKind::Local
        }
    }

    fn read_var(&self, frame: &Frame<'_>, name: &str) -> Value {
        let key = name.to_ascii_lowercase();
        let value = match Self::var_kind(frame, name) {
            VarKind::Global => self.globals.get(&key),
            VarKind::Property | VarKind::Instance => self
                .properties
                .get(&(frame.ctx.script_type, frame.ctx.id))
                .and_then(|props| props.get(&key)),
            VarKind::Local | VarKind::Argument => frame.locals.get(&key),
        };
        value.cloned().unwrap_or_default()
    }

    fn write_var(&mut self, frame: &mut Frame<'_>, name: &str, value: Value) {
        let key = name.to_ascii_lowercase();
        match Self::var_kind(frame, name) {
            VarKind::Global => {
                self.globals.insert(key, value);
            }
            VarKind::Property | VarKind::Instance => {
                self.properties
                    .entry((frame.ctx.script_type, frame.ctx.id))
                    .or_default()
                    .insert(key, value);
            }
            VarKind::Local | VarKind::Argument => {
                frame.locals.insert(key, value);
            }
        }
    }

    /// `the rect of sprite n` as left, top, right, bottom.
    fn sprite_rect(&self, sprite: &Value) -> Option<[f64; 4]> {
        let rect = self.the.get(&the_key("rect", Some("sprite"), Some(sprite)))?;
        match rect {
            Value::List(items) if items.len() == 4 => {
                let mut out = [0.0; 4];
                for (slot, item) in out.iter_mut().zip(items) {
                    *slot = item.as_float()?;
                }
                Some(out)
            }
            _ => None,
        }
    }

    // -------------------------------------------------------------------------
    // Builtins
    // -------------------------------------------------------------------------

    fn call_builtin(&mut self, name: &str, args: &[Value]) -> Option<Result<Value, RuntimeError>> {
        let arg = |i: usize| args.get(i).cloned().unwrap_or_default();
        let result = match name.to_ascii_lowercase().as_str() {
            "count" => match arg(0) {
                Value::List(items) => Ok(Value::Integer(items.len() as i64)),
                Value::PropList(pairs) => Ok(Value::Integer(pairs.len() as i64)),
                other => Err(type_error("count", "list", other.type_name())),
            },
            "getat" => {
                let index = arg(1).as_int().unwrap_or(0);
                match arg(0) {
                    Value::List(items) => list_index(index, items.len())
                        .map(|i| items[i].clone()),
                    Value::PropList(pairs) => list_index(index, pairs.len())
                        .map(|i| pairs[i].1.clone()),
                    other => Err(type_error("getAt", "list", other.type_name())),
                }
            }
            "getprop" => match (arg(0), arg(1)) {
                (Value::PropList(pairs), Value::Symbol(key) | Value::String(key)) => {
                    Ok(prop_get(&pairs, &key).cloned().unwrap_or_default())
                }
                (other, _) => Err(type_error("getProp", "propList", other.type_name())),
            },
            "length" => Ok(Value::Integer(text_of(&arg(0)).chars().count() as i64)),
            "abs" => match arg(0) {
                Value::Integer(n) => Ok(Value::Integer(n.wrapping_abs())),
                other => other
                    .as_float()
                    .map(|n| Value::Float(n.abs()))
                    .ok_or_else(|| type_error("abs", "number", other.type_name())),
            },
            "string" => Ok(Value::String(text_of(&arg(0)))),
            "integer" => {
                let value = arg(0);
                value
                    .as_float()
                    .map(|n| Value::Integer(n.round() as i64))
                    .ok_or_else(|| type_error("integer", "number", value.type_name()))
            }
            "float" => {
                let value = arg(0);
                value
                    .as_float()
                    .map(Value::Float)
                    .ok_or_else(|| type_error("float", "number", value.type_name()))
            }
            "dontpassevent" => {
                self.signals.dont_pass = true;
                Ok(Value::Void)
            }
            "pass" => {
                self.signals.dont_pass = false;
                Ok(Value::Void)
            }
            "nothing" => Ok(Value::Void),
            _ => return None,
        };
        Some(result)
    }

    // -------------------------------------------------------------------------
    // Stack helpers
    // -------------------------------------------------------------------------

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self, op: &str) -> Result<Value, RuntimeError> {
        self.stack.pop().ok_or_else(|| stack_underflow(op))
    }

    fn pop_int(&mut self, op: &str) -> Result<i64, RuntimeError> {
        let value = self.pop(op)?;
        value
            .as_int()
            .ok_or_else(|| type_error(op, "integer", value.type_name()))
    }

    /// Pops `n` values, returned in push order.
    fn pop_n(&mut self, n: usize, op: &str) -> Result<Vec<Value>, RuntimeError> {
        if n > self.stack.len() {
            return Err(stack_underflow(op));
        }
        let at = self.stack.len() - n;
        Ok(self.stack.split_off(at))
    }
}

impl HandlerExecutor for Interpreter {
    fn execute_handler(
        &mut self,
        archives: &Archives,
        handler: &HandlerRef,
        event: LEvent,
    ) -> Result<Signals, RuntimeError> {
        let entry = &handler.entry;
        debug!("{}: running {} of {:?} {}", event, entry.name, entry.script_type, entry.entity);
        self.signals = Signals::default();
        self.call_handler(
            archives,
            handler.archive,
            entry.script_type,
            entry.entity,
            &entry.name,
            Vec::new(),
        )?;
        Ok(std::mem::take(&mut self.signals))
    }

    fn execute_script(
        &mut self,
        archives: &Archives,
        archive: ArchiveKind,
        script_type: ScriptType,
        entity: i32,
    ) -> Result<Signals, RuntimeError> {
        self.signals = Signals::default();
        self.run_script(archives, archive, script_type, entity)?;
        Ok(std::mem::take(&mut self.signals))
    }
}

fn lookup_context(
    archives: &Archives,
    archive: ArchiveKind,
    script_type: ScriptType,
    entity: i32,
) -> Result<&ScriptContext, RuntimeError> {
    archives
        .get(archive)
        .script_context(script_type, entity)
        .ok_or_else(|| {
            RuntimeError::new(format!("no {:?} script with id {}", script_type, entity))
        })
}

/// `put` text of a value: strings without quotes, void as empty.
fn text_of(value: &Value) -> String {
    match value {
        Value::Void => String::new(),
        other => other.to_string(),
    }
}

fn the_key(field: &str, entity: Option<&str>, id: Option<&Value>) -> String {
    let mut key = field.to_ascii_lowercase();
    if let Some(id) = id {
        key.push_str(" of ");
        if let Some(entity) = entity {
            key.push_str(&entity.to_ascii_lowercase());
            key.push(' ');
        }
        key.push_str(&id.to_string());
    }
    key
}

fn prop_matches(key: &Value, name: &str) -> bool {
    match key {
        Value::Symbol(k) | Value::String(k) => k.eq_ignore_ascii_case(name),
        _ => false,
    }
}

fn prop_get<'a>(pairs: &'a [(Value, Value)], name: &str) -> Option<&'a Value> {
    pairs
        .iter()
        .find(|(key, _)| prop_matches(key, name))
        .map(|(_, value)| value)
}

fn prop_set(pairs: &mut Vec<(Value, Value)>, name: &str, value: Value) {
    match pairs.iter_mut().find(|(key, _)| prop_matches(key, name)) {
        Some((_, slot)) => *slot = value,
        None => pairs.push((Value::Symbol(name.to_string()), value)),
    }
}

/// 1-based list index to a slice index.
fn list_index(index: i64, len: usize) -> Result<usize, RuntimeError> {
    if index < 1 || index as usize > len {
        return Err(index_out_of_bounds(index, len));
    }
    Ok(index as usize - 1)
}

fn arithmetic(op: &Op, a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    if let (Value::Integer(x), Value::Integer(y)) = (a, b) {
        let result = match op {
            Op::Add => x.wrapping_add(*y),
            Op::Sub => x.wrapping_sub(*y),
            Op::Mul => x.wrapping_mul(*y),
            Op::Div if *y == 0 => return Err(division_by_zero()),
            Op::Div => x.wrapping_div(*y),
            Op::Mod if *y == 0 => return Err(division_by_zero()),
            _ => x.wrapping_rem(*y),
        };
        return Ok(Value::Integer(result));
    }

    let x = a
        .as_float()
        .ok_or_else(|| type_error("arithmetic", "number", a.type_name()))?;
    let y = b
        .as_float()
        .ok_or_else(|| type_error("arithmetic", "number", b.type_name()))?;
    let result = match op {
        Op::Add => x + y,
        Op::Sub => x - y,
        Op::Mul => x * y,
        Op::Div if y == 0.0 => return Err(division_by_zero()),
        Op::Div => x / y,
        Op::Mod if y == 0.0 => return Err(division_by_zero()),
        _ => x % y,
    };
    Ok(Value::Float(result))
}

/// Numbers compare by value, strings and symbols alphabetically ignoring case.
fn compare(a: &Value, b: &Value) -> Result<Ordering, RuntimeError> {
    let numeric = |v: &Value| matches!(v, Value::Integer(_) | Value::Float(_) | Value::Void);
    if numeric(a) && numeric(b) {
        let x = a.as_float().unwrap_or(0.0);
        let y = b.as_float().unwrap_or(0.0);
        return x
            .partial_cmp(&y)
            .ok_or_else(|| RuntimeError::new("cannot compare NaN"));
    }
    match (a, b) {
        (Value::String(x) | Value::Symbol(x), Value::String(y) | Value::Symbol(y)) => {
            Ok(x.to_lowercase().cmp(&y.to_lowercase()))
        }
        _ => Err(type_error("comparison", a.type_name(), b.type_name())),
    }
}

fn split_chunks(kind: ChunkKind, text: &str) -> (Vec<String>, &'static str) {
    match kind {
        ChunkKind::Char => (text.chars().map(String::from).collect(), ""),
        ChunkKind::Word => (text.split_whitespace().map(String::from).collect(), " "),
        ChunkKind::Item => (text.split(',').map(String::from).collect(), ","),
        ChunkKind::Line => (text.split(['\r', '\n']).map(String::from).collect(), "\n"),
    }
}

/// `from..=to`, 1-based; `to` of 0 means just `from`.
fn chunk_bounds(from: i64, to: i64) -> (usize, usize) {
    let from = from.max(1) as usize;
    let to = if to == 0 { from } else { (to.max(1) as usize).max(from) };
    (from, to)
}

fn chunk_of(kind: ChunkKind, text: &str, from: i64, to: i64) -> String {
    let (pieces, sep) = split_chunks(kind, text);
    let (from, to) = chunk_bounds(from, to);
    if from > pieces.len() {
        return String::new();
    }
    pieces[from - 1..to.min(pieces.len())].join(sep)
}

/// Missing chunks up to `to` are created empty, but never past `limit`.
fn chunk_put(
    kind: ChunkKind,
    text: &str,
    from: i64,
    to: i64,
    value: &str,
    mode: PutMode,
    limit: usize,
) -> Result<String, RuntimeError> {
    let (mut pieces, sep) = split_chunks(kind, text);
    let (from, to) = chunk_bounds(from, to);
    if to > pieces.len().max(limit) {
        return Err(RuntimeError::new(format!(
            "chunk {} is past the limit of {} pieces",
            to, limit
        )));
    }
    while pieces.len() < to {
        pieces.push(String::new());
    }
    let existing = pieces[from - 1..to].join(sep);
    let replacement = match mode {
        PutMode::Into => value.to_string(),
        PutMode::After => format!("{}{}", existing, value),
        PutMode::Before => format!("{}{}", value, existing),
    };
    pieces.splice(from - 1..to, std::iter::once(replacement));
    Ok(pieces.join(sep))
}
