use tracing::{debug, info};

use crate::{
    bytecode::ir::{ScriptContext, ScriptType},
    lexer::Lexer,
    parser::Parser,
    parser_error::{Diagnostic, Severity},
};

/// Knobs that change how source is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilerOptions {
    /// Director version the scripts were written for, e.g. 3, 4, 5.
    pub version: u16,
    /// Tolerate a stray `)` at the end of a statement.
    pub lenient_parens: bool,
}

impl CompilerOptions {
    /// Older scripts routinely carry unbalanced parentheses, so leniency is
    /// on below version 4.
    pub fn for_version(version: u16) -> Self {
        Self {
            version,
            lenient_parens: version < 4,
        }
    }
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self::for_version(4)
    }
}

/// Output of one compilation. The script is only usable when
/// [`had_error`](Self::had_error) is false.
#[derive(Debug, Clone)]
pub struct CompileResult {
    pub script: ScriptContext,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileResult {
    pub fn had_error(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    /// The compiled script, or every diagnostic when compilation failed.
    pub fn into_script(self) -> Result<ScriptContext, Vec<Diagnostic>> {
        if self.had_error() {
            Err(self.diagnostics)
        } else {
            Ok(self.script)
        }
    }
}

pub struct Compiler {
    options: CompilerOptions,
}

impl Compiler {
    pub fn new(options: CompilerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Compiles `source` as a script of the given type and id.
    pub fn compile_script(&self, source: &str, script_type: ScriptType, id: i32) -> CompileResult {
        let mut result = self.compile(source);
        result.script.script_type = script_type;
        result.script.id = id;
        result
    }

    pub fn compile(&self, source: &str) -> CompileResult {
        let tokens = match Lexer::new(source).tokenize() {
            Ok(tokens) => tokens,
            Err(err) => {
                debug!("lexer error: {}", err);
                return CompileResult {
                    script: ScriptContext::new(ScriptType::Movie, 0),
                    diagnostics: vec![Diagnostic {
                        severity: Severity::Error,
                        message: err.message,
                        line: err.line,
                        col: err.col,
                    }],
                };
            }
        };

        let (script, diagnostics) =
            Parser::new(tokens, source, self.options.lenient_parens).parse();
        let result = CompileResult {
            script,
            diagnostics,
        };
        info!(
            handlers = result.script.handlers.len(),
            errors = result.errors().count(),
            warnings = result.warnings().count(),
            "compiled script"
        );
        result
    }
}

/// Compiles one script source with `options`.
pub fn compile(source: &str, options: &CompilerOptions) -> CompileResult {
    Compiler::new(*options).compile(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::Op;

    #[test]
    fn test_options_follow_version() {
        assert!(CompilerOptions::for_version(3).lenient_parens);
        assert!(!CompilerOptions::for_version(4).lenient_parens);
        assert_eq!(CompilerOptions::default().version, 4);
    }

    #[test]
    fn test_compile_ok() {
        let result = compile("on hello\n  put \"hi\"\nend", &CompilerOptions::default());
        assert!(!result.had_error());
        let script = result.into_script().unwrap();
        assert_eq!(
            script.handler("hello").unwrap().code,
            vec![Op::StringPush("hi".to_string()), Op::PrintTop, Op::Exit]
        );
    }

    #[test]
    fn test_lexer_error_becomes_diagnostic() {
        let result = compile("put \"open", &CompilerOptions::default());
        assert!(result.had_error());
        let errors: Vec<_> = result.errors().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line, 1);
    }

    #[test]
    fn test_failed_compile_yields_diagnostics() {
        let result = compile("put 1 +", &CompilerOptions::default());
        let diagnostics = result.into_script().unwrap_err();
        assert!(diagnostics[0].message.starts_with("syntax error"));
    }

    #[test]
    fn test_lenient_by_version() {
        let src = "put foo(1))";
        assert!(compile(src, &CompilerOptions::for_version(3)).into_script().is_ok());
        assert!(compile(src, &CompilerOptions::for_version(5)).had_error());
    }

    #[test]
    fn test_compile_script_sets_identity() {
        let compiler = Compiler::new(CompilerOptions::default());
        let result = compiler.compile_script("on mouseUp\nend", ScriptType::Cast, 5);
        assert_eq!(result.script.script_type, ScriptType::Cast);
        assert_eq!(result.script.id, 5);
    }
}
