use clap::CommandFactory;
use toh264::cli::Cli;
use toh264::{EXIT_CONFIG, Error};
use tracing::error;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse_normalized(std::env::args_os());
    init_tracing(cli.verbose);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to start the async runtime: {}", e);
            std::process::exit(EXIT_CONFIG);
        }
    };

    let code = match runtime.block_on(cli.execute()) {
        Ok(()) => 0,
        Err(e) => {
            error!("{}", e);
            if let Error::Usage { .. } = e {
                eprintln!("{}", Cli::command().render_usage());
            }
            e.exit_code()
        }
    };

    drop(runtime);
    std::process::exit(code);
}
