mod cli;
mod exercise;

use std::process::ExitCode;

use clap::Parser;

fn main() -> ExitCode {
    env_logger::init();

    let args = cli::Args::parse();

    match cli::run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}
