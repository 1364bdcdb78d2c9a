//! Binary entrypoint for the sprig tool

#[tokio::main]
async fn main() {
    if let Err(e) = sprig::cli::run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
