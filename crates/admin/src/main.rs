//! The main function for the biblio terminal front end
use std::process::ExitCode;

fn main() -> ExitCode {
    biblio_lib::run()
}
