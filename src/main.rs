use dicom_roi::config::AppConfig;
use dicom_roi::storage::{FileStore, KeyValueStore, MemoryStore};
use dicom_roi::DicomViewerApp;
use eframe::egui;
use std::path::PathBuf;

// ── Main ────────────────────────────────────────────────────────────────────

/// One store per consumer; both point at the same directory when it is usable.
fn open_storage(config: &AppConfig) -> (Box<dyn KeyValueStore>, Box<dyn KeyValueStore>) {
    let opened = config
        .storage_dir()
        .ok_or_else(|| anyhow::anyhow!("no data directory on this platform"))
        .and_then(|dir| Ok((FileStore::new(&dir)?, FileStore::new(&dir)?)));
    match opened {
        Ok((annotations, viewport)) => {
            log::info!("Storing data in {}", annotations.dir().display());
            (Box::new(annotations), Box::new(viewport))
        }
        Err(e) => {
            log::warn!("Annotations will not be kept after exit: {:#}", e);
            let memory = MemoryStore::new();
            (Box::new(memory.clone()), Box::new(memory))
        }
    }
}

fn main() -> eframe::Result {
    let (config, config_error) = match AppConfig::load() {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.debug.log_level.as_str()),
    )
    .init();
    if let Some(e) = config_error {
        log::warn!("Using default configuration: {:#}", e);
    }

    let files: Vec<PathBuf> = std::env::args().skip(1).map(PathBuf::from).collect();
    if let Some(missing) = files.iter().find(|p| !p.exists()) {
        eprintln!("File not found: {}", missing.display());
        eprintln!("Usage: dicom-roi [FILE.dcm ...]");
        std::process::exit(1);
    }

    let (annotation_storage, viewport_storage) = open_storage(&config);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 900.0])
            .with_title("dicom-roi"),
        ..Default::default()
    };

    eframe::run_native(
        "dicom-roi",
        options,
        Box::new(move |cc| {
            Ok(Box::new(DicomViewerApp::new(
                &cc.egui_ctx,
                &config,
                annotation_storage,
                viewport_storage,
                files,
            )))
        }),
    )
}
