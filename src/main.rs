use clap::Parser;
use tradetrigger::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    tradetrigger::logging::init(cli.log_level.as_deref());
    run(cli)
}
