use std::process::ExitCode;

fn main() -> ExitCode {
    match wharfd::run_host() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("wharfd: {error}");
            ExitCode::FAILURE
        }
    }
}
