use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{
    layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

use trafficlens::config::{Config, ConfigSource, FileOverrides, NoOverrides, Settings};
use trafficlens::demo::DemoDashboard;
use trafficlens::dom::Document;
use trafficlens::host::DashboardMarkup;
use trafficlens::logging::{self, LogSwitch};
use trafficlens::overlay::Overlay;
use trafficlens::usage::{FileSource, HttpSource, UsageSource};

/// How often the widget outline is printed
const OUTLINE_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Config::parse_args();

    // Load settings
    let mut settings = Settings::load(cli.config.as_ref())?;
    settings.merge_cli(&cli);
    settings.validate();

    // Setup logging
    let log_switch: Arc<dyn LogSwitch> = Arc::new(setup_logging(settings.overlay.log));

    let overrides: Arc<dyn ConfigSource> = match cli.overrides {
        Some(ref path) => Arc::new(FileOverrides::new(path.clone())),
        None => Arc::new(NoOverrides),
    };

    match cli.payload {
        Some(ref path) => {
            info!("Reading usage from {:?}", path);
            let source = Arc::new(FileSource::new(path.clone()));
            run(settings, source, overrides, log_switch, cli.duration).await
        }
        None => {
            info!("Fetching usage from {}", settings.base_url);
            let source = HttpSource::new(settings.base_url.clone())?;
            run(settings, Arc::new(source), overrides, log_switch, cli.duration).await
        }
    }
}

/// Run the demo dashboard with an overlay attached until Ctrl-C or the
/// deadline
async fn run<S: UsageSource>(
    settings: Settings,
    source: Arc<S>,
    overrides: Arc<dyn ConfigSource>,
    log_switch: Arc<dyn LogSwitch>,
    duration: Option<u64>,
) -> Result<()> {
    let document = Document::shared();
    let demo = Arc::new(DemoDashboard::new(
        document.clone(),
        settings.demo.nodes.clone(),
    ));
    demo.render();
    let rerender = demo
        .clone()
        .start(Duration::from_millis(settings.demo.rerender_interval_ms));

    let overlay = Overlay::new(
        document,
        source,
        Arc::new(DashboardMarkup::new()),
        settings.overlay.clone(),
        overrides,
    );
    overlay.set_log_switch(log_switch);
    overlay.start();

    let deadline = async {
        match duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let mut outline = tokio::time::interval(OUTLINE_INTERVAL);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            _ = &mut deadline => {
                info!("Duration elapsed");
                break;
            }
            _ = outline.tick() => {
                for line in demo.widget_summary() {
                    println!("{}", line);
                }
            }
        }
    }

    rerender.abort();
    overlay.shutdown();
    Ok(())
}

/// Install the subscriber; the returned handle switches the filter later
fn setup_logging(verbose: bool) -> reload::Handle<EnvFilter, Registry> {
    let (filter, handle) = reload::Layer::new(logging::filter_for(verbose));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    handle
}
