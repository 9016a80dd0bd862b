use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use layercut_core::config::EditorConfig;
use layercut_core::export::{CanvasSize, CompositionRequest};
use layercut_core::persistence::SessionSnapshot;
use layercut_core::store::ClipStore;
use layercut_engine::compositor::drawable_clips;
use layercut_engine::layout::{Rect, base_rect, overlay_rect};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "layercut")]
#[command(about = "Inspect saved layercut editing sessions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Editor config file. Defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the clips active at a timeline time, bottom layer first
    Active {
        /// Saved session file
        #[arg(short, long)]
        session: PathBuf,

        /// Timeline time in seconds
        #[arg(long)]
        at: f64,
    },

    /// Print where each drawable clip lands on the preview surface
    Layout {
        #[arg(short, long)]
        session: PathBuf,

        #[arg(long)]
        at: f64,

        /// Surface width, defaults to the configured canvas
        #[arg(long)]
        width: Option<u32>,

        /// Surface height, defaults to the configured canvas
        #[arg(long)]
        height: Option<u32>,
    },

    /// Print the composition request an export would submit
    ExportRequest {
        #[arg(short, long)]
        session: PathBuf,
    },

    /// Check a saved session for version and clip errors
    Validate {
        #[arg(short, long)]
        session: PathBuf,
    },
}

#[derive(Debug, Serialize)]
struct ActiveClip {
    id: Uuid,
    name: String,
    layer: u32,
    source_time: f64,
}

#[derive(Debug, Serialize)]
struct Placement {
    id: Uuid,
    layer: u32,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

impl Placement {
    fn new(id: Uuid, layer: u32, rect: Rect) -> Self {
        Self {
            id,
            layer,
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    layercut_engine::logging::init(if cli.verbose { "debug" } else { "info" });

    let config = match &cli.config {
        Some(path) => EditorConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EditorConfig::default(),
    };

    let output = match cli.command {
        Commands::Active { session, at } => {
            let (store, _) = load_session(&session)?;
            serde_json::to_string_pretty(&active_clips(&store, at))?
        }
        Commands::Layout {
            session,
            at,
            width,
            height,
        } => {
            let (store, _) = load_session(&session)?;
            let width = width.unwrap_or(config.canvas_width);
            let height = height.unwrap_or(config.canvas_height);
            anyhow::ensure!(width > 0 && height > 0, "surface size must be positive");
            serde_json::to_string_pretty(&layout(&store, at, width, height))?
        }
        Commands::ExportRequest { session } => {
            let (store, snapshot) = load_session(&session)?;
            let canvas = CanvasSize {
                width: config.canvas_width,
                height: config.canvas_height,
            };
            let request = CompositionRequest::build(&store, &snapshot.subtitles, canvas);
            info!(
                clips = request.clips.len(),
                subtitles = request.subtitles.len(),
                "Built composition request"
            );
            serde_json::to_string_pretty(&request)?
        }
        Commands::Validate { session } => {
            let (store, snapshot) = load_session(&session)?;
            if snapshot.primary_media.is_some() && snapshot.restorable_primary_media().is_none() {
                warn!("Primary media is a local blob and will not be restored");
            }
            format!(
                "ok: {} video clips, {} audio clips, {:.3}s of content",
                store.clips().len(),
                store.audio_clips().len(),
                store.content_end()
            )
        }
    };

    println!("{output}");
    Ok(())
}

/// Read a session file and rebuild its clip store.
fn load_session(path: &Path) -> Result<(ClipStore, SessionSnapshot)> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read session {}", path.display()))?;
    let snapshot = SessionSnapshot::from_json(&json)
        .with_context(|| format!("failed to parse session {}", path.display()))?;
    snapshot.check_version()?;
    let store = ClipStore::from_parts(snapshot.video_clips.clone(), snapshot.audio_clips.clone())
        .context("session contains invalid clips")?;
    Ok((store, snapshot))
}

fn active_clips(store: &ClipStore, t: f64) -> Vec<ActiveClip> {
    store
        .active_clips(t)
        .into_iter()
        .map(|clip| ActiveClip {
            id: clip.id,
            name: clip.name.clone(),
            layer: clip.layer,
            source_time: clip.source_time_at(t),
        })
        .collect()
}

/// Placement from stored ratios only. Without live media the measured ratio
/// is unknown.
fn layout(store: &ClipStore, t: f64, width: u32, height: u32) -> Vec<Placement> {
    let (w, h) = (f64::from(width), f64::from(height));
    drawable_clips(store, t)
        .into_iter()
        .map(|clip| {
            let ratio = clip.effective_aspect_ratio(None);
            let rect = if clip.is_base() {
                base_rect(w, h, ratio, clip.transform.as_ref())
            } else {
                overlay_rect(w, h, ratio, &clip.transform.unwrap_or_default())
            };
            Placement::new(clip.id, clip.layer, rect)
        })
        .collect()
}
