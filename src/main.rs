use std::process::ExitCode;

fn main() -> ExitCode {
    maybe_f2_lib::run()
}
