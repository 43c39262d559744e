#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    driving_school_console::run().await
}
