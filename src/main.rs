use predictdash::application::system::Application;
use predictdash::config::Config;
use predictdash::interfaces::DashboardApp;

use tracing::{error, info};
use tracing_subscriber::prelude::*;

// A writer that sends logs to the UI via a crossbeam channel
struct ChannelWriter {
    sender: crossbeam_channel::Sender<String>,
}

impl std::io::Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let msg = String::from_utf8_lossy(buf).trim_end().to_string();
        let _ = self.sender.try_send(msg);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[derive(Clone)]
struct ChannelWriterFactory {
    sender: crossbeam_channel::Sender<String>,
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for ChannelWriterFactory {
    type Writer = ChannelWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ChannelWriter {
            sender: self.sender.clone(),
        }
    }
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Config comes first: it carries the log filter.
    let config = Config::from_env()?;

    let (log_tx, log_rx) = crossbeam_channel::unbounded();

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);
    let ui_layer = config.observability.log_to_ui.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(ChannelWriterFactory { sender: log_tx })
            .with_ansi(false)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_new(&config.observability.log_filter)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(stdout_layer)
        .with(ui_layer)
        .init();

    info!("Initializing Prediction Dashboard...");
    let log_rx = config.observability.log_to_ui.then_some(log_rx);
    let app = Application::build(config)?;

    // Tokio runtime lives on a background thread; the UI owns the main thread.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("dashboard-io")
        .build()?;
    let handle = runtime.handle().clone();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let runtime_thread = std::thread::spawn(move || {
        runtime.block_on(async move {
            info!("Background runtime started.");
            let _ = shutdown_rx.await;
        });
        info!("Background runtime stopped.");
    });

    let system = app.start(&handle);
    info!("Query cache running. Launching UI.");

    let native_options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 860.0])
            .with_title("Prediction Dashboard"),
        ..Default::default()
    };

    let result = eframe::run_native(
        "Prediction Dashboard",
        native_options,
        Box::new(move |cc| Ok(Box::new(DashboardApp::new(cc, system, log_rx)))),
    );

    let _ = shutdown_tx.send(());
    if runtime_thread.join().is_err() {
        error!("Background runtime thread panicked");
    }

    result.map_err(|e| anyhow::anyhow!("Eframe error: {}", e))
}
