#[tokio::main]
async fn main() {
    match toolpilot_cli::run().await {
        Ok(code) => std::process::exit(code),
        Err(toolpilot_cli::CliError::Cleanup(_)) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
