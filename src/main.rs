use comedores::app;
use comedores::config::Settings;
use std::env;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logging comes up before the settings so their warnings are visible.
    let debug = env::var("DEBUG_MODE").is_ok_and(|v| v.trim().eq_ignore_ascii_case("true"));
    let default_level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let settings = Settings::from_env();
    log::info!(
        "starting {} (cache ttl {}s, debug {})",
        settings.title,
        settings.cache_ttl.as_secs(),
        settings.debug
    );

    // Start the web application
    app::run(settings).await?;

    Ok(())
}
