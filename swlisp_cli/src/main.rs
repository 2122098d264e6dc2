use std::io::Read;
use std::process::ExitCode;

use clap::Parser;

use swlisp::{Interpreter, OptionsBuilder};

/// Raw command line arguments.
#[derive(Parser)]
#[command(about)]
pub struct Args {
    /// The live-object count at which allocation triggers a collection
    #[arg(long)]
    pub heap_limit: Option<usize>,

    /// Run a collection on every allocation
    #[arg(long, default_value_t = false)]
    pub gc_stress: bool,

    /// Program files to run, in order. With no files, reads stdin.
    pub files: Vec<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let mut builder = OptionsBuilder::new().gc_stress(args.gc_stress);
    if let Some(heap_limit) = args.heap_limit {
        builder = builder.heap_limit(heap_limit);
    }

    match run(&args, builder) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            // One-line diagnostic on stdout, then a non-zero exit
            println!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args, builder: OptionsBuilder) -> Result<(), String> {
    let mut interpreter = Interpreter::with_options(builder.build()).map_err(stringify)?;

    if args.files.is_empty() {
        let mut source = Vec::new();
        std::io::stdin()
            .read_to_end(&mut source)
            .map_err(stringify)?;
        interpreter.eval_source(&source).map_err(stringify)?;
    } else {
        for file in &args.files {
            let source = std::fs::read(file).map_err(|err| format!("{file}: {err}"))?;
            interpreter.eval_source(&source).map_err(stringify)?;
        }
    }

    Ok(())
}

fn stringify(err: impl std::fmt::Display) -> String {
    err.to_string()
}
