//! Punto de entrada ("driver").
//!
//! Este módulo orquesta las diferentes fases del proceso de
//! compilación y expone una CLI.

use anyhow::{self, Context};
use clap::{self, crate_version, Arg, ArgAction, Command};
use minipar::{lex, parse, source::Source, Diagnostics, Error};
use tracing::{info, Level};

use std::{
    fs::{self, File},
    io::{self, Read, Write},
    process,
    rc::Rc,
};

/// Artefacto que se escribe a la salida.
#[derive(Copy, Clone)]
enum Artifact {
    Tokens,
    Ast,
    Ir,
}

fn main() -> anyhow::Result<()> {
    // Parsing de CLI
    let args = Command::new("minipar")
        .version(crate_version!())
        .about("Compiler front end for the minipar language")
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::Count)
                .help("Increase log verbosity (repeatable)"),
        )
        .arg(
            Arg::new("emit")
                .long("emit")
                .takes_value(true)
                .value_name("ARTIFACT")
                .default_value("ir")
                .value_parser(["tokens", "ast", "ir"])
                .help("Which compilation artifact to print"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .takes_value(true)
                .value_name("FILE")
                .default_value("-")
                .help("Output file ('-' for stdout)"),
        )
        .arg(
            Arg::new("input")
                .value_name("INPUT")
                .required(true)
                .help("Source file ('-' for stdin)"),
        )
        .get_matches();

    let level = match args.get_count("verbose") {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    // Se extraen argumentos necesarios
    let artifact = match args.get_one::<String>("emit").map(String::as_str) {
        Some("tokens") => Artifact::Tokens,
        Some("ast") => Artifact::Ast,
        _ => Artifact::Ir,
    };

    let input = args
        .get_one::<String>("input")
        .context("Missing input file")?;

    let output = args
        .get_one::<String>("output")
        .map(String::as_str)
        .unwrap_or("-");

    let text = match input.as_str() {
        "-" => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read from stdin")?;

            text
        }

        path => fs::read_to_string(path)
            .with_context(|| format!("Failed to open for reading: {}", path))?,
    };

    let name = match input.as_str() {
        "-" => "<stdin>",
        path => path,
    };

    let source = Source::new(name, &text);
    let listing = match build(&source, artifact) {
        Ok(listing) => listing,
        Err(error) => {
            eprint!("{}", Diagnostics::from(error));
            process::exit(1);
        }
    };

    match output {
        "-" => io::stdout()
            .write_all(listing.as_bytes())
            .context("Failed to write to stdout")?,

        path => {
            let mut file = File::create(path)
                .with_context(|| format!("Failed to open for writing: {}", path))?;

            file.write_all(listing.as_bytes())
                .with_context(|| format!("Failed to write to file: {}", path))?;
        }
    }

    Ok(())
}

/// Ejecuta el pipeline hasta el artefacto solicitado.
fn build(source: &Rc<Source>, artifact: Artifact) -> Result<String, Error> {
    let tokens = lex::tokenize(source)?;
    if let Artifact::Tokens = artifact {
        return Ok(format!("{:#?}\n", tokens));
    }

    let ast = parse::parse(&tokens)?;
    if let Artifact::Ast = artifact {
        return Ok(format!("{:#?}\n", ast));
    }

    let analysis = ast.analyze()?;
    info!(
        source = source.name(),
        globals = analysis.globals().len(),
        "program is well-formed"
    );

    Ok(ast.lower().to_string())
}
