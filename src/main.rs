use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use lingo::bytecode::disasm::disassemble_script;
use lingo::bytecode::stack_check::check_handler_stack;
use lingo::bytecode::{CompileResult, Compiler, ScriptType};
use lingo::config::LingoConfig;
use lingo::events::{ArchiveKind, Archives};
use lingo::frontend::TokenDumper;
use lingo::lang::value::Value;
use lingo::lexer::Lexer;
use lingo::runtime::Interpreter;

#[derive(Parser)]
#[command(name = "lingo", about = "Lingo bytecode compiler")]
struct Cli {
    /// TOML settings file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides the configured Director version.
    #[arg(long, global = true)]
    version_override: Option<u16>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the token stream of a script.
    Tokens {
        file: PathBuf,
        #[arg(long)]
        no_color: bool,
        #[arg(long)]
        pretty: bool,
    },
    /// Compile a script and write the archive.
    Compile {
        file: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = ScriptKind::Movie)]
        script_type: ScriptKind,
        #[arg(long, default_value_t = 0)]
        id: i32,
    },
    /// Compile a script and print its bytecode.
    Disasm { file: PathBuf },
    /// Compile a movie script and call one of its handlers.
    Run {
        file: PathBuf,
        handler: String,
        args: Vec<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ScriptKind {
    Movie,
    Score,
    Cast,
}

impl From<ScriptKind> for ScriptType {
    fn from(kind: ScriptKind) -> Self {
        match kind {
            ScriptKind::Movie => ScriptType::Movie,
            ScriptKind::Score => ScriptType::Score,
            ScriptKind::Cast => ScriptType::Cast,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lingo=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => LingoConfig::load(path)?,
        None => LingoConfig::default(),
    };
    if let Some(version) = cli.version_override {
        config.version = version;
    }

    match cli.command {
        Command::Tokens {
            file,
            no_color,
            pretty,
        } => dump_tokens(&file, no_color, pretty),
        Command::Compile {
            file,
            output,
            script_type,
            id,
        } => compile_file(&config, &file, output.as_deref(), script_type.into(), id),
        Command::Disasm { file } => {
            let source = read_source(&file)?;
            let result = Compiler::new(config.compiler_options()).compile(&source);
            let script = finish(&file, result)?;
            print!("{}", disassemble_script(&script));
            Ok(())
        }
        Command::Run {
            file,
            handler,
            args,
        } => run_handler(&config, &file, &handler, &args),
    }
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read '{}'", path.display()))
}

/// Reports diagnostics and fails when any of them is an error.
fn finish(path: &Path, result: CompileResult) -> Result<lingo::bytecode::ScriptContext> {
    for diagnostic in &result.diagnostics {
        eprintln!("{}:{}", path.display(), diagnostic);
    }
    let errors = result.errors().count();
    result
        .into_script()
        .map_err(|_| anyhow::anyhow!("{}: {} error(s)", path.display(), errors))
}

fn dump_tokens(path: &Path, no_color: bool, pretty: bool) -> Result<()> {
    let source = read_source(path)?;
    let tokens = Lexer::new(&source)
        .tokenize()
        .with_context(|| format!("failed to tokenize '{}'", path.display()))?;

    let mut dumper = TokenDumper::new();
    if no_color {
        dumper = dumper.no_color();
    }
    if pretty {
        dumper = dumper.pretty();
    }
    dumper.dump(&tokens);
    Ok(())
}

fn compile_file(
    config: &LingoConfig,
    path: &Path,
    output: Option<&Path>,
    script_type: ScriptType,
    id: i32,
) -> Result<()> {
    let source = read_source(path)?;
    let compiler = Compiler::new(config.compiler_options());
    let mut archives = Archives::new();
    let result = archives.add_code(&compiler, &source, ArchiveKind::Main, script_type, id);
    let script = finish(path, result)?;

    for handler in script.handlers.values() {
        check_handler_stack(&handler.code)
            .with_context(|| format!("handler '{}'", handler.name))?;
    }

    let bytes = archives.get(ArchiveKind::Main).to_bytes()?;
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| path.with_extension("lgb"));
    fs::write(&output, &bytes)
        .with_context(|| format!("failed to write '{}'", output.display()))?;

    info!(
        "wrote {} ({} handlers, {} bytes)",
        output.display(),
        script.handlers.len(),
        bytes.len()
    );
    Ok(())
}

fn parse_arg(arg: &str) -> Value {
    if let Ok(n) = arg.parse::<i64>() {
        Value::Integer(n)
    } else if let Ok(n) = arg.parse::<f64>() {
        Value::Float(n)
    } else if let Some(symbol) = arg.strip_prefix('#') {
        Value::Symbol(symbol.to_string())
    } else {
        Value::String(arg.to_string())
    }
}

fn run_handler(config: &LingoConfig, path: &Path, handler: &str, args: &[String]) -> Result<()> {
    let source = read_source(path)?;
    let compiler = Compiler::new(config.compiler_options());
    let mut archives = Archives::new();
    let result = archives.add_code(&compiler, &source, ArchiveKind::Main, ScriptType::Movie, 0);
    finish(path, result)?;

    let mut interpreter = Interpreter::with_config(config.interpreter_config());
    let args = args.iter().map(|a| parse_arg(a)).collect();
    let value = interpreter.call_handler(
        &archives,
        ArchiveKind::Main,
        ScriptType::Movie,
        0,
        handler,
        args,
    );

    for line in interpreter.take_output() {
        println!("{}", line);
    }
    match value {
        Ok(Value::Void) => Ok(()),
        Ok(value) => {
            println!("{}", value);
            Ok(())
        }
        Err(e) => bail!("{}", e),
    }
}
