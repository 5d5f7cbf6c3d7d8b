use std::{env, error::Error, sync::Arc};

use lodestone::{
    config::{ConfigLoadError, ServerConfig},
    server::Server,
    telemetry::oltp::init_meter,
};
use tokio::sync::broadcast;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let _ = dotenvy::dotenv();
    #[cfg(debug_assertions)]
    env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .init();
    #[cfg(not(debug_assertions))]
    env_logger::init();

    let meter_provider = if dotenvy::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        match init_meter() {
            Ok(provider) => Some(provider),
            Err(e) => {
                log::error!("Metrics export disabled: {e}");
                None
            }
        }
    } else {
        None
    };

    let config_file = env::current_dir()?.join("settings.toml");

    let config = match ServerConfig::load(&config_file) {
        Ok(config) => {
            // Save config to fill missing fields
            let _ = config.save(&config_file);
            config
        }
        Err(ConfigLoadError::Io(_)) => {
            let default_config = ServerConfig::default();
            let _ = default_config.save(&config_file);
            default_config
        }
        Err(err @ ConfigLoadError::Parse(_)) => return Err(err.into()),
    };

    let (stop, _) = broadcast::channel(1);
    let server = Arc::new(Server::new(config, stop.clone()));
    let task = tokio::spawn(async move {
        if let Err(e) = server.start().await {
            log::error!("{e}");
        }
    });

    {
        use futures::future::{select_all, FutureExt};
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        let sigint_fut = sigint.recv().boxed();
        let sigterm_fut = sigterm.recv().boxed();

        let _ = select_all([sigint_fut, sigterm_fut]).await;
        log::info!("Received signal, stopping...");
        let _ = stop.send(());
    }

    let _ = task.await;
    if let Some(provider) = meter_provider {
        provider.shutdown()?;
    }
    Ok(())
}
