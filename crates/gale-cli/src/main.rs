use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use gale_cli::driver;
use gale_cli::options::GaleOptions;
use gale_cli::GaleError;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_env("GALE_LOG"))
        .with_writer(std::io::stderr)
        .init();

    let options = match GaleOptions::parse_args(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(err) => return report(err),
    };

    match driver::run(&options) {
        Ok(summary) => {
            tracing::debug!(
                fell_back = summary.fell_back,
                reduced_classpath = summary.reduced_classpath,
                transitive_classpath = summary.transitive_classpath,
                "compilation finished"
            );
            ExitCode::SUCCESS
        }
        Err(err) => report(err),
    }
}

fn report(err: GaleError) -> ExitCode {
    match err {
        GaleError::Usage(message) => eprintln!("gale: {message}"),
        GaleError::Compile(diagnostics) => {
            for diagnostic in diagnostics.iter() {
                eprintln!("{diagnostic}");
            }
        }
        GaleError::Fatal(err) => eprintln!("gale: internal error: {err:?}"),
    }
    ExitCode::FAILURE
}
