use anyhow::{Context, Result};
use env_logger::Env;
use gyrodrive_core::behaviors::{parse_batch, BatchReport, EntryReport, MotionService};
use gyrodrive_core::config::GyroDriveConfig;
use gyrodrive_core::platform::sim::SimRobot;
use gyrodrive_core::GyroDriveCore;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Runs the motion service against the simulated robot, one JSON batch per
/// stdin line, e.g. `[{"command": "turn_left", "degrees": 90}, {"command": "drive_forward"}]`.
#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => GyroDriveConfig::from_file(&path)
            .with_context(|| format!("failed to load config from {}", path))?,
        None => GyroDriveConfig::default(),
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(config.logging.level.as_str()))
        .init();

    log::info!("Initializing GyroDrive node (simulated platform)...");
    let sim = SimRobot::new(&config.simulation);

    let mut core = GyroDriveCore::new();
    core.register(MotionService::new(config.clone(), sim.hardware()));
    core.init().context("failed to start motion service")?;

    let handle = core
        .motion_service_mut()
        .and_then(|service| service.handle())
        .context("motion service is not active")?;

    println!("GyroDrive node ready. Enter one JSON command batch per line, Ctrl-C to exit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let entries = match parse_batch(&line) {
                    Ok(entries) => entries,
                    Err(e) => {
                        log::warn!("Ignoring malformed batch: {}", e);
                        continue;
                    }
                };
                // Keep listening for Ctrl-C while the batch runs
                let mut interrupted = false;
                let batch = handle.execute_batch(entries);
                tokio::pin!(batch);
                let report = loop {
                    tokio::select! {
                        report = &mut batch => break report?,
                        _ = tokio::signal::ctrl_c(), if !interrupted => {
                            log::info!("Interrupted, cancelling the running batch");
                            handle.cancel();
                            interrupted = true;
                        }
                    }
                };
                print_report(&report, &sim);
                if interrupted {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted, stopping");
                handle.cancel();
                break;
            }
        }
    }

    // Joining the control thread blocks
    tokio::task::spawn_blocking(move || core.shutdown())
        .await
        .context("shutdown task failed")??;
    log::info!("GyroDrive node stopped");
    Ok(())
}

fn print_report(report: &BatchReport, sim: &SimRobot) {
    for entry in &report.entries {
        match entry {
            EntryReport::Executed { command, outcome } => println!("{}: {:?}", command, outcome),
            EntryReport::Rejected { command, reason } => {
                println!("{}: rejected ({})", command, reason)
            }
            EntryReport::Notice(message) => println!("notice: {}", message),
            EntryReport::Skipped(raw) => println!("skipped: {}", raw),
        }
    }
    if let Some(fault) = &report.fault {
        log::error!("Batch aborted by hardware fault: {}", fault);
    }
    let position = sim.position();
    println!(
        "pose: x={:.3} m y={:.3} m yaw={:.1}° t={:.2} s",
        position.x,
        position.y,
        sim.yaw_degrees(),
        sim.time().as_secs_f64()
    );
}
