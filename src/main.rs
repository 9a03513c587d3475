use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match masld_intake::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("masld-intake: {e}");
            ExitCode::FAILURE
        }
    }
}
