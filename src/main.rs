/// CampusConnect workflow service
use campus_connect::{config::LoggingConfig, server, AppConfig, AppContext};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = AppConfig::from_env()?;

    // Initialize logging
    init_tracing(&config.logging);

    print_banner();

    // Create application context
    let ctx = AppContext::new(config).await?;

    // Start server
    server::serve(ctx).await?;

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level)
        .unwrap_or_else(|_| "campus_connect=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn print_banner() {
    println!(
        r#"
   ______                                ______                            __
  / ____/___ _____ ___  ____  __  _______/ ____/___  ____  ____  ___  _____/ /_
 / /   / __ `/ __ `__ \/ __ \/ / / / ___/ /   / __ \/ __ \/ __ \/ _ \/ ___/ __/
/ /___/ /_/ / / / / / / /_/ / /_/ (__  ) /___/ /_/ / / / / / / /  __/ /__/ /_
\____/\__,_/_/ /_/ /_/ .___/\__,_/____/\____/\____/_/ /_/_/ /_/\___/\___/\__/
                    /_/
        Campus content workflow v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
