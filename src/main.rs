use chrono::Utc;
use clap::Parser;
use color_eyre::Result;
use eyre::Context as _;
use manticore_collector::{
    host::PluginWriter,
    init_errors,
    init_logging,
    Collector,
    Connector as _,
    MySqlConnector,
};
use manticore_collector_config::{
    Args,
    Config,
};
use tokio::time::{
    interval,
    MissedTickBehavior,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_errors()?;
    init_logging(args.verbose)?;

    let config = Config::new(&args).context("Failed to load configuration")?;
    config.validate()?;
    info!(
        daemon = %config.target(),
        update_every = config.update_every,
        config_dir = %config.config_dir().display(),
        "starting collector"
    );

    let mut collector = Collector::new(MySqlConnector::from_config(&config), config.update_every());
    if args.once {
        collect_once(&mut collector).await
    } else {
        run(&mut collector, &config).await
    }
}

/// One cycle, printed as JSON.
async fn collect_once(collector: &mut Collector<MySqlConnector>) -> Result<()> {
    let collected_at = Utc::now();
    let sample = collector.collect().await;
    let summary = serde_json::json!({
        "collected_at": collected_at,
        "daemon": collector.connector().describe(),
        "entities": collector.entities(),
        "charts": collector.charts().collect::<Vec<_>>(),
        "metrics": sample,
    });
    collector.shutdown().await;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Polls every `update_every` seconds until interrupted.
async fn run(collector: &mut Collector<MySqlConnector>, config: &Config) -> Result<()> {
    let stdout = std::io::stdout();
    let mut writer = PluginWriter::new(stdout.lock(), &config.name, config.update_every, config.priority);

    let mut ticker = interval(config.update_every());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut shutdown => {
                info!("interrupted, shutting down");
                break;
            }
        }

        let sample = collector.collect().await;
        writer
            .announce(collector.charts())
            .context("Failed to write chart definitions")?;
        if let Some(sample) = sample {
            writer
                .sample(collector.charts(), &sample)
                .context("Failed to write metrics")?;
        }
    }

    collector.shutdown().await;
    Ok(())
}
