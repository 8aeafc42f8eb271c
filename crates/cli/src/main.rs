use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    changegate_cli::run().await
}
