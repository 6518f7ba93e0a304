use drift_lang::diagnostics::{report_engine_error, report_io_error};
use drift_lang::engine::Engine;
use std::env;
use std::fs;
use std::path::Path;
use std::sync::Arc;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        eprintln!("Usage: ./drift [run|dis] <filename.drift> [--trace]");
        std::process::exit(1);
    }

    let command = &args[1];
    let filename = &args[2];
    let trace = args.iter().any(|arg| arg == "--trace");

    if !filename.ends_with(".drift") {
        eprintln!("Invalid file extension. Only .drift files are allowed.");
        std::process::exit(1);
    }

    let path = Path::new(filename);
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            report_io_error(path, &err);
            std::process::exit(1);
        }
    };

    let mut engine = if trace {
        Engine::with_trace(Arc::new(|line| eprintln!("{line}")))
    } else {
        Engine::new()
    };

    match command.as_str() {
        "run" => {
            if let Err(err) = engine.eval(&source) {
                report_engine_error(path, &source, &err);
                std::process::exit(1);
            }
        }
        "dis" => match engine.disassemble(&source) {
            Ok(listing) => print!("{listing}"),
            Err(err) => {
                report_engine_error(path, &source, &err);
                std::process::exit(1);
            }
        },
        _ => {
            eprintln!("Invalid command. Usage: ./drift [run|dis] <filename.drift> [--trace]");
            std::process::exit(1);
        }
    }
}
