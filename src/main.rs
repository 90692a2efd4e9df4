use anyhow::Result;
use linespeed::{feedback, Engine, Settings, TestPhase, TestUpdate};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let engine = Engine::new(Settings::default());
    let (tx, mut rx) = mpsc::channel(32);
    let session = engine.start(tx);

    let token = session.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\ncancelling...");
            token.cancel();
        }
    });

    while let Some(update) = rx.recv().await {
        print_update(update);
    }

    match session.wait().await {
        Ok(result) => {
            println!(
                "\nDL {:.1} Mbps | UL {:.1} Mbps | latency {:.0} ms (jitter {:.1} ms)",
                result.download_mbps, result.upload_mbps, result.latency_ms, result.jitter_ms
            );
            println!("{}", feedback::describe(result.download_mbps));
        }
        Err(e) if e.is_cancelled() => println!("test cancelled"),
        Err(e) => println!("test failed: {e}"),
    }
    Ok(())
}

fn print_update(update: TestUpdate) {
    match update {
        TestUpdate::PhaseChanged(TestPhase::Downloading) => println!("Testing download..."),
        TestUpdate::PhaseChanged(TestPhase::MeasuringLatency) => println!("Measuring latency..."),
        TestUpdate::PhaseChanged(TestPhase::Uploading) => println!("Testing upload..."),
        TestUpdate::PhaseChanged(_) => {}
        TestUpdate::DownloadInstant(mbps) | TestUpdate::UploadInstant(mbps) => {
            print!("\r  {mbps:8.1} Mbps");
            use std::io::Write;
            let _ = std::io::stdout().flush();
        }
        TestUpdate::DownloadComplete(avg) => println!("\r  download: {avg:.1} Mbps"),
        TestUpdate::UploadComplete(avg) => println!("\r  upload: {avg:.1} Mbps"),
        TestUpdate::LatencyComplete { avg_ms, jitter_ms } => {
            println!("  latency: {avg_ms:.0} ms (jitter {jitter_ms:.1} ms)");
        }
        TestUpdate::PhaseFailed { phase, message } => {
            println!("\r  {phase:?} failed: {message}");
        }
        TestUpdate::SequenceComplete(_) => {}
    }
}
