//! DICOM series loading and slice rendering.
//!
//! Parsing, pixel decoding and VOI windowing are done by dicom-rs; this module
//! only gathers files into an ordered slice list and hands the active
//! window/level to the decoder.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use crossbeam_channel::{Receiver, Sender};
use dicom_core::Tag;
use dicom_dictionary_std::tags;
use dicom_object::{open_file, DefaultDicomObject, InMemDicomObject};
use dicom_pixeldata::{ConvertOptions, PixelDecoder, VoiLutOption, WindowLevel};

use crate::consts::{DEFAULT_WINDOW_LEVEL, DEFAULT_WINDOW_WIDTH, INVALID_DICOM, LOAD_FAILED};
use crate::model::ViewportSettings;

// ── Data Model ──────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct DicomMetadata {
    pub study_instance_uid: String,
    pub series_instance_uid: String,
    pub sop_instance_uid: String,
    pub instance_number: i32,
    pub rows: u32,
    pub columns: u32,
    pub slice_thickness: Option<f64>,
    pub slice_location: Option<f64>,
    pub image_position: Option<Vec<f64>>,
    pub image_orientation: Option<Vec<f64>>,
    pub pixel_spacing: Option<Vec<f64>>,
    pub window_width: f64,
    pub window_center: f64,
    pub rescale_intercept: f64,
    pub rescale_slope: f64,
    /// Set for slices that come from a multi-frame object.
    pub frame_index: Option<u32>,
}

/// One slice: a single frame of one file.
#[derive(Clone, Debug)]
pub struct DicomImage {
    pub path: PathBuf,
    pub metadata: DicomMetadata,
    pub frame: u32,
    source: Arc<DefaultDicomObject>,
}

impl DicomImage {
    pub fn instance_number(&self) -> i32 {
        self.metadata.instance_number
    }

    pub fn size(&self) -> egui::Vec2 {
        egui::vec2(self.metadata.columns as f32, self.metadata.rows as f32)
    }
}

#[derive(Clone, Debug)]
pub struct DicomSeries {
    pub series_instance_uid: String,
    pub study_instance_uid: String,
    pub description: String,
    pub modality: String,
    pub images: Vec<DicomImage>,
}

impl DicomSeries {
    pub fn slice_count(&self) -> usize {
        self.images.len()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadingProgress {
    pub loaded: usize,
    pub total: usize,
    pub current_file: Option<String>,
}

impl LoadingProgress {
    pub fn percentage(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            self.loaded as f32 * 100.0 / self.total as f32
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum LoadState {
    #[default]
    Idle,
    Loading(LoadingProgress),
    Loaded,
    Error(String),
}

// ── Metadata ────────────────────────────────────────────────────────────────

fn string(obj: &InMemDicomObject, tag: Tag) -> Option<String> {
    let value = obj.get(tag)?.to_str().ok()?;
    let value = value.trim_end_matches('\0').trim();
    (!value.is_empty()).then(|| value.to_owned())
}

fn int(obj: &InMemDicomObject, tag: Tag) -> Option<i32> {
    obj.get(tag)?.to_int::<i32>().ok()
}

fn float(obj: &InMemDicomObject, tag: Tag) -> Option<f64> {
    obj.get(tag)?.to_float64().ok()
}

fn floats(obj: &InMemDicomObject, tag: Tag) -> Option<Vec<f64>> {
    obj.get(tag)?.to_multi_float64().ok()
}

/// Study, series and SOP instance UIDs must all be present.
pub fn is_valid(obj: &InMemDicomObject) -> bool {
    [
        tags::STUDY_INSTANCE_UID,
        tags::SERIES_INSTANCE_UID,
        tags::SOP_INSTANCE_UID,
    ]
    .into_iter()
    .all(|tag| string(obj, tag).is_some())
}

pub fn extract_metadata(obj: &InMemDicomObject) -> DicomMetadata {
    DicomMetadata {
        study_instance_uid: string(obj, tags::STUDY_INSTANCE_UID).unwrap_or_default(),
        series_instance_uid: string(obj, tags::SERIES_INSTANCE_UID).unwrap_or_default(),
        sop_instance_uid: string(obj, tags::SOP_INSTANCE_UID).unwrap_or_default(),
        instance_number: int(obj, tags::INSTANCE_NUMBER).unwrap_or(1),
        rows: int(obj, tags::ROWS).map_or(512, |v| v.max(0) as u32),
        columns: int(obj, tags::COLUMNS).map_or(512, |v| v.max(0) as u32),
        slice_thickness: float(obj, tags::SLICE_THICKNESS),
        slice_location: float(obj, tags::SLICE_LOCATION),
        image_position: floats(obj, tags::IMAGE_POSITION_PATIENT),
        image_orientation: floats(obj, tags::IMAGE_ORIENTATION_PATIENT),
        pixel_spacing: floats(obj, tags::PIXEL_SPACING),
        window_width: float(obj, tags::WINDOW_WIDTH).unwrap_or(DEFAULT_WINDOW_WIDTH),
        window_center: float(obj, tags::WINDOW_CENTER).unwrap_or(DEFAULT_WINDOW_LEVEL),
        rescale_intercept: float(obj, tags::RESCALE_INTERCEPT).unwrap_or(0.0),
        rescale_slope: float(obj, tags::RESCALE_SLOPE).unwrap_or(1.0),
        frame_index: None,
    }
}

// ── Loading ─────────────────────────────────────────────────────────────────

struct OpenedFile {
    path: PathBuf,
    object: Arc<DefaultDicomObject>,
    metadata: DicomMetadata,
}

fn open_dicom(path: &Path) -> Result<OpenedFile> {
    let object = open_file(path).with_context(|| format!("{LOAD_FAILED}: {}", path.display()))?;
    if !is_valid(&object) {
        bail!("{INVALID_DICOM}: {}", path.display());
    }
    let metadata = extract_metadata(&object);
    Ok(OpenedFile {
        path: path.to_owned(),
        object: Arc::new(object),
        metadata,
    })
}

/// Read `paths` into one series. Files that fail to open are skipped as long as
/// at least one succeeds; files from another series than the first are
/// skipped. Multi-frame objects become one slice per frame.
pub fn load_series(
    paths: &[PathBuf],
    mut progress: impl FnMut(LoadingProgress),
) -> Result<DicomSeries> {
    if paths.is_empty() {
        bail!("no files to load");
    }

    let mut opened: Vec<OpenedFile> = Vec::new();
    let mut first_error = None;
    for (i, path) in paths.iter().enumerate() {
        progress(LoadingProgress {
            loaded: i,
            total: paths.len(),
            current_file: path.file_name().map(|n| n.to_string_lossy().into_owned()),
        });
        match open_dicom(path) {
            Ok(file) => opened.push(file),
            Err(e) => {
                log::warn!("Skipping {}: {:#}", path.display(), e);
                first_error.get_or_insert(e);
            }
        }
    }
    progress(LoadingProgress {
        loaded: paths.len(),
        total: paths.len(),
        current_file: None,
    });

    let Some(first) = opened.first() else {
        return Err(first_error.unwrap_or_else(|| anyhow!(LOAD_FAILED)));
    };
    let series_uid = first.metadata.series_instance_uid.clone();
    let study_uid = first.metadata.study_instance_uid.clone();
    let description =
        string(&first.object, tags::SERIES_DESCRIPTION).unwrap_or_else(|| "Unknown Series".into());
    let modality = string(&first.object, tags::MODALITY).unwrap_or_else(|| "CT".into());

    let mut images = Vec::new();
    for file in opened {
        if file.metadata.series_instance_uid != series_uid {
            log::warn!(
                "Skipping {}: belongs to series {}",
                file.path.display(),
                file.metadata.series_instance_uid
            );
            continue;
        }
        let frames = int(&file.object, tags::NUMBER_OF_FRAMES)
            .unwrap_or(1)
            .max(1) as u32;
        for frame in 0..frames {
            let mut metadata = file.metadata.clone();
            if frames > 1 {
                metadata.instance_number += frame as i32;
                metadata.frame_index = Some(frame);
            }
            images.push(DicomImage {
                path: file.path.clone(),
                metadata,
                frame,
                source: Arc::clone(&file.object),
            });
        }
    }
    images.sort_by_key(DicomImage::instance_number);

    log::info!(
        "Loaded series {} ({}) with {} slices",
        series_uid,
        modality,
        images.len()
    );
    Ok(DicomSeries {
        series_instance_uid: series_uid,
        study_instance_uid: study_uid,
        description,
        modality,
        images,
    })
}

// ── Rendering ───────────────────────────────────────────────────────────────

/// Decode one slice with the viewport's window/level and invert flag.
/// Only the slice's own frame is decoded. Rotation and flips are applied when
/// the texture is drawn.
pub fn render_slice(image: &DicomImage, settings: &ViewportSettings) -> Result<egui::ColorImage> {
    let decoded = image
        .source
        .decode_pixel_data_frame(image.frame)
        .with_context(|| {
            format!(
                "decoding frame {} of {}",
                image.frame,
                image.path.display()
            )
        })?;
    let options = ConvertOptions::new()
        .with_voi_lut(VoiLutOption::Custom(WindowLevel {
            width: settings.window_width,
            center: settings.window_level,
        }))
        .force_8bit();
    let mut dynamic: image::DynamicImage = decoded
        .to_dynamic_image_with_options(0, &options)
        .with_context(|| format!("converting frame {} of {}", image.frame, image.path.display()))?;
    if settings.invert {
        dynamic.invert();
    }

    let rgba = dynamic.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    Ok(egui::ColorImage::from_rgba_unmultiplied(
        size,
        rgba.as_flat_samples().as_slice(),
    ))
}

// ── Background loader ───────────────────────────────────────────────────────

pub enum LoadUpdate {
    Progress(LoadingProgress),
    Finished(Result<DicomSeries>),
}

struct LoaderMessage {
    generation: u64,
    update: LoadUpdate,
}

/// Loads series on a worker thread. Only the most recent request is reported.
pub struct SeriesLoader {
    tx: Sender<LoaderMessage>,
    rx: Receiver<LoaderMessage>,
    generation: u64,
    repaint: Option<egui::Context>,
}

impl SeriesLoader {
    pub fn new(repaint: Option<egui::Context>) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            tx,
            rx,
            generation: 0,
            repaint,
        }
    }

    pub fn load(&mut self, paths: Vec<PathBuf>) {
        self.generation += 1;
        let generation = self.generation;
        let tx = self.tx.clone();
        let repaint = self.repaint.clone();
        log::info!("Loading {} file(s)", paths.len());

        let spawned = std::thread::Builder::new()
            .name("dicom-loader".into())
            .spawn(move || {
                let send = |update: LoadUpdate| {
                    let _ = tx.send(LoaderMessage { generation, update });
                    if let Some(ctx) = &repaint {
                        ctx.request_repaint();
                    }
                };
                let result = load_series(&paths, |p| send(LoadUpdate::Progress(p)));
                send(LoadUpdate::Finished(result));
            });
        if let Err(e) = spawned {
            let _ = self.tx.send(LoaderMessage {
                generation,
                update: LoadUpdate::Finished(Err(anyhow!(e).context("starting loader thread"))),
            });
        }
    }

    /// Drain pending updates for the latest request.
    pub fn poll(&self) -> Vec<LoadUpdate> {
        self.rx
            .try_iter()
            .filter(|m| m.generation == self.generation)
            .map(|m| m.update)
            .collect()
    }
}
