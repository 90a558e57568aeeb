//! zebra_guard - crossing guard daemon
//!
//! This daemon:
//! 1. Loads the label file and uploads the network firmware
//! 2. Starts the camera preview with the overlay callback installed
//! 3. Parses per-frame detections in the capture loop until Ctrl-C

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use zebra_guard::camera::open as open_camera;
use zebra_guard::ui::{Transfer, Ui};
use zebra_guard::{
    AudioNotifier, Args, CommandPlayer, DetectionParser, GuardConfig, LabelStore, OverlayRenderer,
    PreviewConfig, Session,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    args.validate()?;
    let config = GuardConfig::load()?;
    let ui = Ui::from_setting(config.ui.as_deref(), std::io::stderr().is_terminal());

    let label_store = LabelStore::new(&args.labels);
    let labels = {
        let _stage = ui.stage("Load labels");
        label_store.labels()?
    };
    log::info!(
        "loaded {} labels from {}",
        labels.len(),
        label_store.path().display()
    );

    let (mut camera, mut accelerator) = open_camera(&config.camera, config.network.clone())?;
    {
        let _stage = ui.stage("Upload network firmware");
        let mut transfer: Option<Transfer> = None;
        accelerator.load_network(&args.model, &mut |written: u64, total: u64| {
            transfer
                .get_or_insert_with(|| ui.transfer("firmware", total))
                .update(written, total);
        })?;
    }

    let renderer = match OverlayRenderer::load(&config.font_path) {
        Ok(renderer) => renderer,
        Err(e) => {
            log::warn!("banner text disabled: {:#}", e);
            OverlayRenderer::without_text()
        }
    };
    let notifier = AudioNotifier::new(
        CommandPlayer::new(config.audio.player.clone()),
        config.audio.cooldown,
    );
    let session = Arc::new(Session::new(
        labels,
        config.audio.cues.clone(),
        renderer,
        notifier,
    ));
    let mut parser = DetectionParser::new(args.threshold)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::Relaxed);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    let preview = PreviewConfig {
        fps: args.fps,
        buffer_count: config.buffer_count,
    };
    {
        let _stage = ui.stage("Start camera");
        camera.start(&preview, session.pre_callback())?;
    }

    log::info!(
        "zebra_guard running: source={} threshold={} fps={} cooldown={:.1}s",
        config.camera.url,
        parser.threshold(),
        args.fps,
        config.audio.cooldown.as_secs_f64()
    );
    if let Some(dir) = &config.camera.preview_dir {
        log::info!("preview written to {}", dir.join("preview.png").display());
    }

    let result = session.run(&mut *camera, &*accelerator, &mut parser, &shutdown);
    log::info!("shutdown requested, stopping camera...");
    camera.stop()?;
    let frames = result?;
    log::info!("processed {} frames", frames);
    Ok(())
}
