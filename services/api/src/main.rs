use ptw_api::run;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("ptw-api: {err}");
        std::process::exit(1);
    }
}
