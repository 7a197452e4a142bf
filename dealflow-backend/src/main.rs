use std::process::ExitCode;

use clap::Parser;

use dealflow_backend::cli::Cli;
use dealflow_backend::log_bridge;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match log_bridge::init(cli.log_file) {
        Ok(Some(path)) => log::debug!("[dealflow] Logging to {}", path.display()),
        Ok(None) => {}
        Err(e) => eprintln!("dealflow: failed to initialize logger: {}", e),
    }

    match dealflow_backend::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::debug!("[dealflow] Command failed: {:?}", e);
            eprintln!("dealflow: {}", e);
            ExitCode::FAILURE
        }
    }
}
