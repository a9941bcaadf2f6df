//! omr-eval - Optical music recognition evaluation

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = omr_eval::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
