use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use clap::Parser;
use futures::{sink::SinkExt, stream::StreamExt};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use tokio::net::TcpListener;
use tokio::time::sleep;

use walk_tracker_rs::live_status::LiveStatus;

#[derive(Parser, Debug)]
#[command(name = "dashboard")]
#[command(about = "Serves the live walk map/stats page from the tracker's status file")]
struct Args {
    /// Path to the walk tracker output directory
    #[arg(long, default_value = "walk_sessions")]
    data_dir: PathBuf,

    /// Port to serve on
    #[arg(long, default_value = "8081")]
    port: u16,
}

#[derive(Clone)]
struct AppState {
    data_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if !args.data_dir.exists() {
        log::warn!("data directory {:?} does not exist yet", args.data_dir);
    }

    let state = AppState {
        data_dir: args.data_dir.clone(),
    };

    let app = Router::new()
        .route("/", get(index_handler))
        .route("/ws", get(ws_handler))
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    println!("Walk dashboard listening on http://{}", addr);
    println!("Watching directory: {:?}", args.data_dir);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index_handler() -> Html<&'static str> {
    Html(include_str!("../dashboard_static.html"))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let status_file = state.data_dir.join("live_status.json");
    let mut last_mtime = std::time::SystemTime::UNIX_EPOCH;
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            incoming = receiver.next() => {
                match incoming {
                    None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                    _ => {}
                }
            }
            _ = sleep(Duration::from_millis(500)) => {
                // Push only when the tracker rewrote the file
                let Ok(metadata) = std::fs::metadata(&status_file) else { continue };
                let Ok(mtime) = metadata.modified() else { continue };
                if mtime <= last_mtime {
                    continue;
                }
                last_mtime = mtime;

                let Ok(content) = tokio::fs::read_to_string(&status_file).await else { continue };
                // Validate before forwarding; a torn write is skipped
                if serde_json::from_str::<LiveStatus>(&content).is_ok() {
                    if sender.send(Message::Text(content)).await.is_err() {
                        break;
                    }
                }
            }
        }
    }
}
