use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process;

use clap::Parser as ClapParser;
use log::{LevelFilter, debug};
use minicc::tokenizer::{self, TokenDump};
use minicc::{CompileError, codegen, parser};
use snafu::{ResultExt, Snafu};

/// Compile a small subset of C to x86-64 assembly.
#[derive(ClapParser, Debug)]
#[command(name = "minicc", version, about)]
struct Cli {
  /// The input C file, `-` for stdin
  input: String,

  /// Output file; assembly goes to stdout when absent
  #[arg(short, long)]
  output: Option<PathBuf>,

  /// Verbose output
  #[arg(short, long)]
  verbose: bool,

  /// Print the token stream and stop
  #[arg(long)]
  dump_tokens: bool,

  /// Print the parsed program and stop
  #[arg(long)]
  dump_ast: bool,
}

#[derive(Debug, Snafu)]
enum DriverError {
  #[snafu(display("cannot read {path}: {source}"))]
  ReadSource { path: String, source: io::Error },

  #[snafu(display("cannot write {}: {source}", path.display()))]
  WriteOutput { path: PathBuf, source: io::Error },

  #[snafu(display("{path}:{source}"))]
  Compile { path: String, source: CompileError },
}

fn main() {
  let cli = Cli::parse();

  let level = if cli.verbose {
    LevelFilter::Debug
  } else {
    LevelFilter::Warn
  };
  env_logger::Builder::new()
    .filter_level(level)
    .parse_default_env()
    .init();

  if let Err(err) = run(&cli) {
    eprintln!("{err}");
    process::exit(1);
  }
}

fn run(cli: &Cli) -> Result<(), DriverError> {
  let source = read_source(&cli.input)?;
  let output = render(cli, &source).context(CompileSnafu { path: &cli.input })?;

  match &cli.output {
    Some(path) => {
      debug!("writing {} bytes to {}", output.len(), path.display());
      fs::write(path, output).context(WriteOutputSnafu { path })
    }
    None => io::stdout()
      .write_all(output.as_bytes())
      .context(WriteOutputSnafu { path: "<stdout>" }),
  }
}

/// Run the pipeline as far as the flags ask for.
fn render(cli: &Cli, source: &str) -> Result<String, CompileError> {
  let tokens = tokenizer::tokenize(source)?;
  if cli.dump_tokens {
    return Ok(
      TokenDump {
        tokens: &tokens,
        source,
      }
      .to_string(),
    );
  }

  let program = parser::parse(tokens, source)?;
  if cli.dump_ast {
    return Ok(format!("{program:#?}\n"));
  }

  codegen::generate(&program, source)
}

fn read_source(path: &str) -> Result<String, DriverError> {
  if path == "-" {
    let mut source = String::new();
    io::stdin()
      .read_to_string(&mut source)
      .context(ReadSourceSnafu { path })?;
    return Ok(source);
  }
  fs::read_to_string(path).context(ReadSourceSnafu { path })
}
