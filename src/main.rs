use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, Sender};
use tokio::time::{interval, Duration};

use walk_tracker_rs::annotation::EventKind;
use walk_tracker_rs::api::ApiClient;
use walk_tracker_rs::error::TrackerError;
use walk_tracker_rs::gps_health::GpsHealth;
use walk_tracker_rs::live_status::LiveStatus;
use walk_tracker_rs::location::WatchOptions;
use walk_tracker_rs::payload::WalkPayload;
use walk_tracker_rs::session::{FixOutcome, WalkSession};
use walk_tracker_rs::storage::{create_gpx_track, SessionExport};
use walk_tracker_rs::tracker::Tracker;

#[derive(Parser, Debug)]
#[command(name = "walk_tracker")]
#[command(about = "Dog walk tracker - live GPS path, point events, walk submission", long_about = None)]
struct Args {
    /// Backend base URL
    #[arg(long, global = true, default_value = "http://localhost:8001/api")]
    api_url: String,

    /// Bearer token for the backend
    #[arg(long, global = true, env = "WALK_TRACKER_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Track a walk live (timer + GPS)
    Track {
        /// Dog to walk; defaults to the first dog on the account
        #[arg(long)]
        dog_id: Option<i64>,

        /// Stop automatically after this many seconds (0 = run until "stop")
        #[arg(long, default_value = "0")]
        duration: u64,

        /// Location poll period in seconds
        #[arg(long, default_value = "2")]
        poll_secs: u64,

        /// Emit synthetic fixes when no location source is available
        #[arg(long)]
        mock_gps: bool,

        /// Output directory for live status and session exports
        #[arg(long, default_value = "walk_sessions")]
        output_dir: PathBuf,

        /// Keep the local export only, skip the backend submit
        #[arg(long)]
        no_submit: bool,
    },

    /// Record a walk without GPS (direct distance/duration entry)
    Manual {
        #[arg(long)]
        dog_id: Option<i64>,

        /// Distance in km
        #[arg(long)]
        distance_km: Option<f64>,

        /// Duration in minutes
        #[arg(long)]
        duration_minutes: Option<u32>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Resubmit a saved session export after a failed submission
    Submit {
        /// Path to a walk_*.json export
        file: PathBuf,
    },

    /// List the account's dogs
    Dogs,

    /// Aggregate walk stats for a dog
    Stats {
        #[arg(long)]
        dog_id: Option<i64>,
    },

    /// Recent walks for a dog
    History {
        #[arg(long)]
        dog_id: Option<i64>,

        #[arg(long, default_value = "20")]
        limit: u32,
    },
}

/// Interactive commands read from stdin during a live track.
#[derive(Debug, Clone, PartialEq)]
enum UserCommand {
    Annotate(EventKind),
    Note(String),
    Stop,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let api = ApiClient::new(args.api_url.clone(), args.token.clone());

    match args.command {
        Command::Track {
            dog_id,
            duration,
            poll_secs,
            mock_gps,
            output_dir,
            no_submit,
        } => {
            run_track(
                &api,
                dog_id,
                duration,
                poll_secs,
                mock_gps,
                &output_dir,
                no_submit,
            )
            .await
        }
        Command::Manual {
            dog_id,
            distance_km,
            duration_minutes,
            notes,
        } => run_manual(&api, dog_id, distance_km, duration_minutes, notes).await,
        Command::Submit { file } => run_submit(&api, &file).await,
        Command::Dogs => run_dogs(&api).await,
        Command::Stats { dog_id } => run_stats(&api, dog_id).await,
        Command::History { dog_id, limit } => run_history(&api, dog_id, limit).await,
    }
}

/// Explicit id wins; otherwise the first dog on the account, as the walk
/// page does. No dog at all blocks the operation client-side.
async fn resolve_dog(api: &ApiClient, dog_id: Option<i64>) -> Result<i64> {
    if let Some(id) = dog_id {
        return Ok(id);
    }
    let dogs = api
        .list_dogs()
        .await
        .context("could not list dogs; pass --dog-id to skip the lookup")?;
    match dogs.first() {
        Some(dog) => {
            log::info!("tracking {} (dog {})", dog.name, dog.id);
            Ok(dog.id)
        }
        None => Err(TrackerError::NoDogSelected.into()),
    }
}

async fn run_track(
    api: &ApiClient,
    dog_id: Option<i64>,
    duration: u64,
    poll_secs: u64,
    mock_gps: bool,
    output_dir: &Path,
    no_submit: bool,
) -> Result<()> {
    let dog_id = resolve_dog(api, dog_id).await?;
    std::fs::create_dir_all(output_dir)?;
    let status_path = output_dir.join("live_status.json");

    let mut tracker = Tracker::new(WalkSession::new(dog_id));
    let mut channels = tracker.start(WatchOptions {
        interval: Duration::from_secs(poll_secs.max(1)),
        mock: mock_gps,
    })?;
    let mut health = GpsHealth::default();

    let (cmd_tx, mut cmd_rx) = mpsc::channel::<UserCommand>(16);
    let stdin_handle = tokio::spawn(stdin_loop(cmd_tx));

    println!("Tracking started for dog {}.", dog_id);
    println!("Commands: pee | poop | note <text> | stop");

    let mut status_ticker = interval(Duration::from_secs(2));
    let mut announced_searching = false;

    loop {
        if duration > 0 && tracker.session.elapsed_seconds >= duration {
            log::info!("duration reached, stopping");
            break;
        }

        tokio::select! {
            Some(fix) = channels.fixes.recv() => {
                match tracker.session.apply_fix(fix) {
                    FixOutcome::Appended { delta_km } => {
                        health.update();
                        log::debug!(
                            "path point {} (+{:.0} m, total {:.3} km)",
                            tracker.session.path.len(),
                            delta_km * 1000.0,
                            tracker.session.distance_km
                        );
                    }
                    FixOutcome::PositionOnly => health.update(),
                    FixOutcome::Rejected => {
                        log::debug!("fix dropped by accuracy gate ({} so far)",
                            tracker.session.rejected_fixes);
                    }
                }
            }
            Some(_) = channels.ticks.recv() => {
                tracker.session.tick_second();
            }
            Some(cmd) = cmd_rx.recv() => {
                match cmd {
                    UserCommand::Annotate(kind) => {
                        match tracker.session.annotate(kind) {
                            Some(event) => println!(
                                "{} recorded at ({:.5}, {:.5})",
                                kind.as_str(), event.lat, event.lng
                            ),
                            // No position yet: the action stays a no-op
                            None => println!("no position yet, event not recorded"),
                        }
                    }
                    UserCommand::Note(text) => {
                        tracker.session.set_notes(Some(text));
                        println!("note saved");
                    }
                    UserCommand::Stop => break,
                }
            }
            _ = status_ticker.tick() => {
                if health.is_searching() && !announced_searching {
                    println!("searching for GPS... (timer keeps running, manual entry stays available)");
                    announced_searching = true;
                }
                if let Err(err) = LiveStatus::from_session(&tracker.session, &health).save(&status_path) {
                    log::warn!("live status write failed: {}", err);
                }
            }
        }
    }

    stdin_handle.abort();
    tracker.stop()?;
    let session = &tracker.session;
    let _ = LiveStatus::from_session(session, &health).save(&status_path);

    println!("\n=== Walk summary ===");
    println!("Time:     {}", format_hms(session.elapsed_seconds));
    println!("Distance: {:.2} km ({} path points)", session.distance_km, session.path.len());
    println!(
        "Duration: {} min | Estimated: {} kcal",
        session.duration_minutes.unwrap_or(0),
        session.calories.unwrap_or(0)
    );
    if session.rejected_fixes > 0 {
        println!("Dropped {} low-accuracy fixes", session.rejected_fixes);
    }

    let payload = WalkPayload::from_session(session)?;
    let export_path = SessionExport::new(payload.clone()).save(output_dir)?;
    println!("Export:   {}", export_path.display());
    if !session.path.is_empty() {
        let gpx_path = create_gpx_track(dog_id, &session.path, &session.events).save(output_dir)?;
        println!("GPX:      {}", gpx_path.display());
    }

    if no_submit {
        return Ok(());
    }
    submit_payload(api, &payload, Some(&export_path)).await
}

async fn run_manual(
    api: &ApiClient,
    dog_id: Option<i64>,
    distance_km: Option<f64>,
    duration_minutes: Option<u32>,
    notes: Option<String>,
) -> Result<()> {
    let dog_id = resolve_dog(api, dog_id).await?;
    let payload = WalkPayload::manual(dog_id, distance_km, duration_minutes, notes)?;
    if let Some(kcal) = payload.calories {
        println!("Estimated: {} kcal", kcal);
    }
    submit_payload(api, &payload, None).await
}

async fn run_submit(api: &ApiClient, file: &Path) -> Result<()> {
    let export = SessionExport::load(file)?;
    log::info!("resubmitting export saved at {}", export.saved_at);
    submit_payload(api, &export.payload, Some(file)).await
}

/// One attempt, no automatic retry. On failure the export (when there is
/// one) is left untouched so the user can `submit` it again.
async fn submit_payload(
    api: &ApiClient,
    payload: &WalkPayload,
    export_path: Option<&Path>,
) -> Result<()> {
    match api.create_walk(payload).await {
        Ok(walk) => {
            println!("Walk saved (id {}).", walk.id);
            Ok(())
        }
        Err(err) => {
            if let Some(path) = export_path {
                println!(
                    "Submission failed. The walk is kept at {} - retry with: walk_tracker submit {}",
                    path.display(),
                    path.display()
                );
            }
            Err(err).context("walk submission failed")
        }
    }
}

async fn run_dogs(api: &ApiClient) -> Result<()> {
    let dogs = api.list_dogs().await?;
    if dogs.is_empty() {
        println!("No dogs on this account.");
        return Ok(());
    }
    for dog in dogs {
        println!(
            "{:>4}  {}  {}",
            dog.id,
            dog.name,
            dog.breed.unwrap_or_default()
        );
    }
    Ok(())
}

async fn run_stats(api: &ApiClient, dog_id: Option<i64>) -> Result<()> {
    let dog_id = resolve_dog(api, dog_id).await?;
    let stats = api.walk_stats(dog_id).await?;
    println!("Walks:          {}", stats.total_walks);
    println!("Total distance: {:.2} km", stats.total_distance_km);
    println!("Total duration: {} min", stats.total_duration_minutes);
    println!("Avg distance:   {:.2} km", stats.avg_distance_km);
    Ok(())
}

async fn run_history(api: &ApiClient, dog_id: Option<i64>, limit: u32) -> Result<()> {
    let dog_id = resolve_dog(api, dog_id).await?;
    let walks = api.recent_walks(dog_id, limit).await?;
    if walks.is_empty() {
        println!("No walks yet.");
        return Ok(());
    }
    for walk in walks {
        println!(
            "{}  {:>6}  {:>4} min  {:>4} kcal{}",
            walk.start_time,
            walk.distance_km
                .map(|d| format!("{:.2}km", d))
                .unwrap_or_else(|| "-".to_string()),
            walk.duration_minutes.unwrap_or(0),
            walk.calories.unwrap_or(0),
            walk.notes.map(|n| format!("  {}", n)).unwrap_or_default()
        );
    }
    Ok(())
}

async fn stdin_loop(tx: Sender<UserCommand>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let Some(cmd) = parse_command(&line) else {
            println!("commands: pee | poop | note <text> | stop");
            continue;
        };
        let is_stop = cmd == UserCommand::Stop;
        if tx.send(cmd).await.is_err() || is_stop {
            break;
        }
    }
}

fn parse_command(line: &str) -> Option<UserCommand> {
    let line = line.trim();
    match line.to_lowercase().as_str() {
        "pee" => return Some(UserCommand::Annotate(EventKind::Pee)),
        "poop" => return Some(UserCommand::Annotate(EventKind::Poop)),
        "stop" => return Some(UserCommand::Stop),
        _ => {}
    }
    line.strip_prefix("note ")
        .map(|text| UserCommand::Note(text.to_string()))
}

fn format_hms(total_seconds: u64) -> String {
    let h = total_seconds / 3600;
    let m = (total_seconds % 3600) / 60;
    let s = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", h, m, s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(
            parse_command("pee"),
            Some(UserCommand::Annotate(EventKind::Pee))
        );
        assert_eq!(
            parse_command("  POOP "),
            Some(UserCommand::Annotate(EventKind::Poop))
        );
        assert_eq!(parse_command("stop"), Some(UserCommand::Stop));
        assert_eq!(
            parse_command("note bon chien"),
            Some(UserCommand::Note("bon chien".to_string()))
        );
        assert_eq!(parse_command("jump"), None);
        assert_eq!(parse_command(""), None);
    }

    #[test]
    fn test_format_hms() {
        assert_eq!(format_hms(0), "00:00:00");
        assert_eq!(format_hms(125), "00:02:05");
        assert_eq!(format_hms(3661), "01:01:01");
    }
}
