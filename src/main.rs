mod config;
mod console;
mod report;
mod roster;
mod session;
mod student;

use clap::Parser;
use log::error;
use std::io;

fn main() {
    let config = config::Config::parse();
    init_logging(&config.log_level);

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut prompter = console::Prompter::new(stdin.lock(), stdout.lock());

    let mut session = session::Session::new(config);
    if let Err(e) = session.run(&mut prompter) {
        error!("session aborted: {:#}", e);
        std::process::exit(1);
    }
}

// Logs go to stderr so they never interleave with prompts on stdout.
fn init_logging(default_filter: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Stderr)
        .init();
}
