use creator_subscriptions::config::AppConfig;
use creator_subscriptions::startup;
use creator_subscriptions::telemetry::{get_subscriber, init_subscriber};

#[tokio::main]
async fn main() {
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let subscriber = get_subscriber(
        &config.server.log_level,
        config.server.json_logs(),
        std::io::stdout,
    );
    if let Err(e) = init_subscriber(subscriber) {
        eprintln!("Failed to install tracing subscriber: {}", e);
        std::process::exit(1);
    }

    if let Err(error) = startup::run(config).await {
        tracing::error!(error = %error, "Service exited with error");
        std::process::exit(1);
    }
}
