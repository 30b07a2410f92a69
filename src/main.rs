use formation_analyzer::{CoordinatorBuilder, config::Configuration, error::AppError};
use tracing::{Level, info};

fn init_logging(level: Level) {
    tracing_subscriber::fmt().with_max_level(level).init();
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let configuration = Configuration::load()?;
    init_logging(configuration.log_level());

    let mut coordinator = CoordinatorBuilder::new(configuration).build().await?;

    let interrupted = tokio::select! {
        result = coordinator.wait() => {
            result?;
            false
        }
        _ = tokio::signal::ctrl_c() => true,
    };
    if interrupted {
        info!("Shutting down");
        coordinator.stop();
        coordinator.wait().await?;
    }
    Ok(())
}
