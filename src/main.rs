use std::process::ExitCode;

use labelport::LabelportError;

fn main() -> ExitCode {
    env_logger::init();

    match labelport::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let LabelportError::PlanRejected { report, .. } = &err {
                eprint!("{}", report);
            }
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}
