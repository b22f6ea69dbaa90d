mod domain;
mod infrastructure;

use anyhow::Context;
use btleplug::api::Manager as _;
use btleplug::platform::Manager;
use domain::settings::Settings;
use infrastructure::bluetooth::BlinkerService;
use std::path::PathBuf;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Optional sole argument: path to a JSON settings file.
    let settings_path = std::env::args().nth(1).map(PathBuf::from);
    let settings = Settings::load(settings_path.as_deref())
        .context("failed to load settings")?;

    let _logging = infrastructure::logging::init_logger(&settings.log_settings)?;
    info!("Starting BLE LED blinker");

    let manager = Manager::new().await?;
    let adapter = manager
        .adapters()
        .await?
        .into_iter()
        .next()
        .context("no Bluetooth adapter found")?;

    BlinkerService::new(adapter, &settings)?.run().await
}
