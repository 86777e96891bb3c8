//! Shared constants: storage keys, annotation geometry and colors, windowing presets.

use egui::Color32;

// ── Storage ─────────────────────────────────────────────────────────────────

pub const ANNOTATIONS_KEY: &str = "dicom_annotations";
pub const VIEWPORT_KEY: &str = "dicom_viewport";

/// Version string embedded in exported annotation files.
pub const EXPORT_VERSION: &str = "1.0";

// ── Annotation geometry ─────────────────────────────────────────────────────

/// Smallest drawable rectangle side, in image pixels.
pub const MIN_SIZE: f32 = 5.0;
/// Resize handle size, in screen pixels.
pub const HANDLE_SIZE: f32 = 8.0;
pub const BORDER_WIDTH: f32 = 2.0;
pub const SELECTION_BORDER_WIDTH: f32 = 3.0;

pub const DEFAULT_REFRESH_DEBOUNCE_MS: u64 = 50;
pub const DEFAULT_MAX_ANNOTATIONS_PER_SLICE: usize = 100;

// ── Colors ──────────────────────────────────────────────────────────────────

pub const COLOR_DEFAULT: Color32 = Color32::from_rgb(0x10, 0xb9, 0x81);
pub const COLOR_SELECTED: Color32 = Color32::from_rgb(0x3b, 0x82, 0xf6);
pub const COLOR_HOVER: Color32 = Color32::from_rgb(0xfb, 0xbf, 0x24);
pub const COLOR_DRAFT: Color32 = Color32::from_rgb(0x3b, 0x82, 0xf6);
pub const COLOR_HANDLE: Color32 = Color32::WHITE;

// ── Viewport ────────────────────────────────────────────────────────────────

pub const MIN_ZOOM: f32 = 0.1;
pub const MAX_ZOOM: f32 = 10.0;
pub const ZOOM_STEP: f32 = 1.2;

pub const DEFAULT_WINDOW_WIDTH: f64 = 400.0;
pub const DEFAULT_WINDOW_LEVEL: f64 = 40.0;

/// Named window/level pairs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowPreset {
    Chest,
    Lung,
    Bone,
    Brain,
}

impl WindowPreset {
    pub const ALL: [WindowPreset; 4] = [
        WindowPreset::Chest,
        WindowPreset::Lung,
        WindowPreset::Bone,
        WindowPreset::Brain,
    ];

    /// `(width, level)`
    pub fn values(self) -> (f64, f64) {
        match self {
            WindowPreset::Chest => (400.0, 40.0),
            WindowPreset::Lung => (1500.0, -600.0),
            WindowPreset::Bone => (1800.0, 400.0),
            WindowPreset::Brain => (100.0, 50.0),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            WindowPreset::Chest => "Chest",
            WindowPreset::Lung => "Lung",
            WindowPreset::Bone => "Bone",
            WindowPreset::Brain => "Brain",
        }
    }
}

// ── DICOM ───────────────────────────────────────────────────────────────────

pub const INVALID_DICOM: &str = "Invalid DICOM file format";
pub const LOAD_FAILED: &str = "Failed to load DICOM file";
