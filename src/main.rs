use std::process::ExitCode;

fn main() -> ExitCode {
    match mediashelf::runtime::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "mediashelf: error {}: {} ({})",
                e.code(),
                e.description(),
                e.detail()
            );
            ExitCode::FAILURE
        }
    }
}
