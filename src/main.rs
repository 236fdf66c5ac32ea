use solax_bridge::prelude::*;

#[tokio::main]
async fn main() {
    let options = Options::new();

    // logging isn't up until the config is loaded, so report config errors directly
    let config = match Config::load(&options) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Failed to load config: {:?}", err);
            std::process::exit(255);
        }
    };

    if let Err(err) = solax_bridge::init_logging(&config) {
        eprintln!("Failed to initialise logging: {:?}", err);
        std::process::exit(255);
    }

    if let Err(err) = solax_bridge::app(options, config).await {
        error!("{:?}", err);
        std::process::exit(1);
    }
}
