use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    process,
};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use fmtc::{codegen, lexer, parser, util::fmt};
use log::{debug, info};

/// Compiles a binary layout description into a standalone Rust program.
#[derive(Parser)]
#[command(name = "fmtc", version, about, long_about = None)]
struct Cli {
    /// The `.fmt` file to compile.
    format: PathBuf,

    /// Where to write the output. `-` writes to stdout. Defaults to
    /// `out/<file name>.rs`.
    #[arg(short, long, value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// The pipeline stage to print.
    #[arg(long, value_enum, default_value_t = Emit::Rust)]
    emit: Emit,
}

#[derive(Copy, Clone, PartialEq, Eq, clap::ValueEnum)]
#[clap(rename_all = "snake_case")]
enum Emit {
    Tokens,
    Ast,
    Rust,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(error) = run(Cli::parse()) {
        eprintln!("{error:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let path = cli.format.display().to_string();
    let src = fs::read_to_string(&cli.format).with_context(|| format!("failed to read {path}"))?;

    let tokens = lexer::tokenize(&src);
    debug!("lexed {} tokens from {path}", tokens.len());
    if cli.emit == Emit::Tokens {
        let mut out = String::new();
        for token in &tokens {
            out.push_str(&format!("{}\t{}\n", token.span(), token.kind));
        }
        return write_output(cli.output.as_deref(), &out);
    }

    let root = parser::parse(&tokens)
        .map_err(|error| anyhow!(fmt::render_error(&path, &src, &error)))?;
    debug!(
        "parsed {} readers, {} maps, {} bitflags",
        root.readers.len(),
        root.tables.len(),
        root.bitflags.len(),
    );
    if cli.emit == Emit::Ast {
        return write_output(cli.output.as_deref(), &fmt::print_root_string(&root));
    }

    let code = codegen::generate(&root);
    debug!("generated {} bytes", code.len());
    let output = match cli.output {
        Some(output) => output,
        None => default_output(&cli.format),
    };
    write_output(Some(&output), &code)
}

/// `out/<file name>.rs`, relative to the working directory.
fn default_output(format: &Path) -> PathBuf {
    let stem = format.file_stem().unwrap_or(format.as_os_str());
    Path::new("out").join(format!("{}.rs", stem.to_string_lossy()))
}

fn write_output(output: Option<&Path>, text: &str) -> Result<()> {
    match output {
        None => io::stdout().write_all(text.as_bytes())?,
        Some(path) if path == Path::new("-") => io::stdout().write_all(text.as_bytes())?,
        Some(path) => {
            if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
                fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create {}", dir.display()))?;
            }
            fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
            info!("wrote {}", path.display());
        }
    }
    Ok(())
}
