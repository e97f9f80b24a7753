// src/main.rs

use buildrig::{cli, logging, run, types::Completion};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    match run_main().await {
        Ok(completion) => std::process::exit(completion.exit_code()),
        Err(err) => {
            eprintln!("buildrig error: {err:#}");
            std::process::exit(1);
        }
    }
}

async fn run_main() -> anyhow::Result<Completion> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    Ok(run(args).await?)
}
