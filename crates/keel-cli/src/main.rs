#[tokio::main]
async fn main() {
    if let Err(err) = keel_cli::run().await {
        keel_cli::output::print_error(&err.to_string());
        std::process::exit(1);
    }
}
