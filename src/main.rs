use clap::Parser;
use codespan_reporting::diagnostic::{Diagnostic, Label};
use codespan_reporting::files::SimpleFile;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use jtv::config::DEFAULT_MAX_CALL_DEPTH;
use jtv::error::DiagnosticCount;
use jtv::{Config, ErrorKind, Interpreter, LogTracer};
use log::Level;
use std::io::Read;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

mod toplevel;

#[derive(Debug, clap::Parser)]
#[clap(name = "jtv", version, about = "Harvard-architecture language runner")]
struct Args {
    #[clap(subcommand)]
    command: Command,

    /// Raise the log level (-v info, -vv debug, -vvv trace)
    #[clap(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Check and execute a program
    Run(RunArgs),
    /// Report totality and purity diagnostics without running
    Check(CheckArgs),
    /// Start an interactive session
    Repl,
}

#[derive(Debug, clap::Parser)]
struct RunArgs {
    /// Source file, or `-` for standard input
    file: PathBuf,

    #[clap(long)]
    max_steps: Option<u64>,

    #[clap(long)]
    timeout_ms: Option<u64>,

    #[clap(long, default_value_t = DEFAULT_MAX_CALL_DEPTH)]
    max_depth: usize,

    /// Log every interpreter event at trace level
    #[clap(long)]
    trace: bool,
}

#[derive(Debug, clap::Parser)]
struct CheckArgs {
    /// Source file, or `-` for standard input
    file: PathBuf,
}

struct Source {
    name: String,
    text: String,
}

fn read_source(path: &Path) -> std::io::Result<Source> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        return Ok(Source {
            name: "<stdin>".to_owned(),
            text,
        });
    }
    Ok(Source {
        name: path.display().to_string(),
        text: std::fs::read_to_string(path)?,
    })
}

fn point(text: &str, offset: usize) -> Range<usize> {
    let end = (offset + 1).min(text.len());
    offset.min(end)..end
}

/// Renders `error` against its source on stderr.
fn report(source: &Source, error: &jtv::Error) -> Result<(), failure::Error> {
    let file = SimpleFile::new(source.name.as_str(), source.text.as_str());
    let diagnostics: Vec<Diagnostic<()>> = match error.kind() {
        ErrorKind::Lex { offset, message } | ErrorKind::Parse {
            offset, message, ..
        } => vec![Diagnostic::error()
            .with_message(message)
            .with_labels(vec![Label::primary((), point(&source.text, *offset))])],
        ErrorKind::Rejected(_) => error
            .diagnostics()
            .iter()
            .map(|d| {
                Diagnostic::error()
                    .with_message(format!("{} in `{}`", d.kind, d.function))
                    .with_labels(vec![
                        Label::primary((), d.span.start..d.span.end).with_message(&d.message)
                    ])
            })
            .collect(),
        _ => vec![Diagnostic::error().with_message(error.to_string())],
    };

    let writer = StandardStream::stderr(ColorChoice::Auto);
    let config = term::Config::default();
    for diagnostic in &diagnostics {
        term::emit(&mut writer.lock(), &config, &file, diagnostic)?;
    }
    Ok(())
}

fn run(args: RunArgs) -> Result<bool, failure::Error> {
    let source = read_source(&args.file)?;
    let program = match jtv::parse(&source.text) {
        Ok(program) => program,
        Err(e) => {
            report(&source, &e)?;
            return Ok(false);
        }
    };

    let mut config = Config::default().with_max_call_depth(args.max_depth);
    if let Some(steps) = args.max_steps {
        config = config.with_max_steps(steps);
    }
    if let Some(ms) = args.timeout_ms {
        config = config.with_time_limit(Duration::from_millis(ms));
    }

    let outcome = Interpreter::new(&program).and_then(|interpreter| {
        let mut interpreter = interpreter.with_config(config);
        if args.trace {
            interpreter = interpreter.with_tracer(LogTracer);
        }
        interpreter.run()
    });

    match outcome {
        Ok(result) => {
            for line in &result.output {
                println!("{}", line);
            }
            if let Some(value) = result.return_value {
                println!("=> {}", value);
            }
            Ok(true)
        }
        Err(e) => {
            report(&source, &e)?;
            Ok(false)
        }
    }
}

fn check(args: CheckArgs) -> Result<bool, failure::Error> {
    let source = read_source(&args.file)?;
    let program = match jtv::parse(&source.text) {
        Ok(program) => program,
        Err(e) => {
            report(&source, &e)?;
            return Ok(false);
        }
    };

    let diagnostics = jtv::check_totality(&program);
    if diagnostics.is_empty() {
        println!(
            "{}: {} function(s), every @pure function is total",
            source.name,
            program.functions.len()
        );
        return Ok(true);
    }
    let rejected = jtv::Error::from(ErrorKind::Rejected(DiagnosticCount(diagnostics)));
    report(&source, &rejected)?;
    Ok(false)
}

fn main() -> Result<(), failure::Error> {
    let args = Args::parse();

    let trace = matches!(&args.command, Command::Run(r) if r.trace);
    let level = match args.verbose {
        _ if trace => Level::Trace,
        0 => Level::Warn,
        1 => Level::Info,
        2 => Level::Debug,
        _ => Level::Trace,
    };
    simple_logger::init_with_level(level)?;

    let ok = match args.command {
        Command::Run(args) => run(args)?,
        Command::Check(args) => check(args)?,
        Command::Repl => {
            toplevel::main_loop()?;
            true
        }
    };
    if !ok {
        process::exit(1);
    }
    Ok(())
}
