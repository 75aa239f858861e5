//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = xyzhub_cli::run().await {
        eprintln!("xyzhub: {err}");
        std::process::exit(1);
    }
}
