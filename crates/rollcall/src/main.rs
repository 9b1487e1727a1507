use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod attendance;
mod capture;
mod config;
mod display;
mod recognition;

use attendance::{Ledger, Session};
use capture::CaptureOptions;
use config::Config;
use rollcall_core::{load_gallery, OnnxEngine};
use rollcall_hw::Camera;

#[derive(Parser)]
#[command(name = "rollcall", about = "Mark attendance from a live camera feed")]
struct Cli {
    /// Directory of reference photos, one person per image (file stem =
    /// name).
    #[arg(value_name = "GALLERY_DIR")]
    gallery: Option<PathBuf>,

    /// List available capture devices and exit.
    #[arg(long)]
    list_cameras: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.list_cameras {
        for device in Camera::list_devices() {
            println!("{}\t{} ({})", device.path, device.name, device.driver);
        }
        return Ok(());
    }

    let Some(gallery_dir) = cli.gallery else {
        bail!("no gallery directory given; pass the folder of reference photos");
    };

    let config = Config::from_env();

    let mut engine = OnnxEngine::load(
        &config.detector_model_path(),
        &config.embedding_model_path(),
    )
    .context("failed to load face models")?;

    let gallery =
        load_gallery(&gallery_dir, &mut engine).context("failed to load the reference gallery")?;
    let names: Vec<String> = gallery.names().map(str::to_owned).collect();
    tracing::info!(people = names.len(), "gallery loaded");

    let ledger = Ledger::open(&config.log_dir).context("failed to open the attendance ledger")?;
    tracing::info!(path = %ledger.path().display(), "attendance ledger ready");
    let mut session = Session::new(names, ledger);

    let camera = Camera::open(&config.camera_device).context("failed to open the camera")?;
    let mut stream = camera.stream().context("failed to start the capture stream")?;

    // Let auto-exposure settle before the first recognition pass.
    for _ in 0..config.warmup_frames {
        let _ = stream.next_frame();
    }

    let recognizer = recognition::spawn(engine, gallery, config.match_threshold);

    let mut preview = display::Preview::open("Rollcall", camera.width, camera.height)
        .context("failed to open the preview window")?;

    tracing::info!("attendance session started; press 'q' in the preview window to quit");

    capture::run(
        &mut stream,
        &recognizer,
        &mut session,
        &mut preview,
        &CaptureOptions {
            frame_stride: config.frame_stride,
            detect_downsample: config.detect_downsample,
        },
    )?;

    tracing::info!(
        marked = session.marked_count(),
        unmarked = session.pending_count(),
        "attendance session ended"
    );
    Ok(())
}
