// src/main.rs

use taskweave::errors::TaskweaveError;
use taskweave::{cli, logging, run};

#[tokio::main]
async fn main() {
    if let Err(err) = run_main().await {
        eprintln!("taskweave error: {err}");
        std::process::exit(err.exit_code());
    }
}

async fn run_main() -> Result<(), TaskweaveError> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args).await
}
