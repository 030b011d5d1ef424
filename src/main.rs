// src/main.rs

use synthesize::{cli, logging, run};

#[tokio::main]
async fn main() {
    let args = cli::parse();

    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("synth: failed to initialise logging: {err}");
        std::process::exit(1);
    }

    match run(args).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(err) => {
            eprintln!("synth error: {err}");
            std::process::exit(1);
        }
    }
}
