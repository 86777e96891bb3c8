//! Viewport state: slice position plus display settings.
//!
//! Only [`ViewportSettings`] is persisted; slice position is per session.

use anyhow::{Context, Result};

use crate::config::DicomConfig;
use crate::consts::{WindowPreset, MAX_ZOOM, MIN_ZOOM, VIEWPORT_KEY, ZOOM_STEP};
use crate::model::{Pan, ViewportSettings};
use crate::storage::KeyValueStore;

#[derive(Clone, Debug, PartialEq)]
pub struct ViewportState {
    pub settings: ViewportSettings,
    pub current_slice_index: usize,
    pub total_slices: usize,
    pub is_drawing_mode: bool,
    pub is_loaded: bool,
}

pub struct ViewportStore {
    state: ViewportState,
    defaults: ViewportSettings,
    revision: u64,
    storage: Box<dyn KeyValueStore>,
}

impl ViewportStore {
    pub fn new(storage: Box<dyn KeyValueStore>, config: &DicomConfig) -> Self {
        let defaults = ViewportSettings {
            window_width: config.default_window_width.max(1.0),
            window_level: config.default_window_level,
            ..Default::default()
        };
        let mut store = Self {
            state: ViewportState {
                settings: defaults.clone(),
                current_slice_index: 0,
                total_slices: 0,
                is_drawing_mode: false,
                is_loaded: false,
            },
            defaults,
            revision: 0,
            storage,
        };
        store.load();
        store
    }

    pub fn state(&self) -> &ViewportState {
        &self.state
    }

    pub fn settings(&self) -> &ViewportSettings {
        &self.state.settings
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    // ── Slices ──────────────────────────────────────────────────────────────

    pub fn current_slice(&self) -> usize {
        self.state.current_slice_index
    }

    pub fn total_slices(&self) -> usize {
        self.state.total_slices
    }

    /// Clamped into `[0, total - 1]`.
    pub fn set_current_slice(&mut self, index: usize) {
        let clamped = clamp_slice(index, self.state.total_slices);
        if clamped != self.state.current_slice_index {
            self.state.current_slice_index = clamped;
            self.touch();
        }
    }

    pub fn step_slice(&mut self, delta: isize) {
        let target = self.state.current_slice_index.saturating_add_signed(delta);
        self.set_current_slice(target);
    }

    pub fn set_total_slices(&mut self, total: usize) {
        self.state.total_slices = total;
        self.state.current_slice_index = clamp_slice(self.state.current_slice_index, total);
        self.touch();
    }

    pub fn next_slice(&mut self) -> bool {
        if self.state.current_slice_index + 1 < self.state.total_slices {
            self.set_current_slice(self.state.current_slice_index + 1);
            true
        } else {
            false
        }
    }

    pub fn previous_slice(&mut self) -> bool {
        if self.state.current_slice_index > 0 {
            self.set_current_slice(self.state.current_slice_index - 1);
            true
        } else {
            false
        }
    }

    pub fn first_slice(&mut self) {
        self.set_current_slice(0);
    }

    pub fn last_slice(&mut self) {
        self.set_current_slice(self.state.total_slices.saturating_sub(1));
    }

    // ── Zoom / pan ──────────────────────────────────────────────────────────

    pub fn set_zoom(&mut self, zoom: f32) {
        if !zoom.is_finite() {
            return;
        }
        self.update_settings(|s| s.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM));
    }

    pub fn zoom_in(&mut self, factor: f32) {
        self.set_zoom(self.state.settings.zoom * factor);
    }

    pub fn zoom_out(&mut self, factor: f32) {
        self.set_zoom(self.state.settings.zoom / factor);
    }

    pub fn zoom_step_in(&mut self) {
        self.zoom_in(ZOOM_STEP);
    }

    pub fn zoom_step_out(&mut self) {
        self.zoom_out(ZOOM_STEP);
    }

    pub fn reset_zoom(&mut self) {
        self.set_zoom(1.0);
    }

    pub fn set_pan(&mut self, pan: Pan) {
        self.update_settings(|s| s.pan = pan);
    }

    pub fn pan_by(&mut self, delta: egui::Vec2) {
        let pan = self.state.settings.pan.to_vec2() + delta;
        self.set_pan(pan.into());
    }

    pub fn reset_pan(&mut self) {
        self.set_pan(Pan::default());
    }

    // ── Windowing ───────────────────────────────────────────────────────────

    /// Width is kept at 1 or above.
    pub fn set_window_level(&mut self, width: f64, level: f64) {
        self.update_settings(|s| {
            s.window_width = width.max(1.0);
            s.window_level = level;
        });
    }

    pub fn adjust_window_width(&mut self, delta: f64) {
        let (width, level) = self.window();
        self.set_window_level(width + delta, level);
    }

    pub fn adjust_window_level(&mut self, delta: f64) {
        let (width, level) = self.window();
        self.set_window_level(width, level + delta);
    }

    /// `(width, level)`
    pub fn window(&self) -> (f64, f64) {
        (self.state.settings.window_width, self.state.settings.window_level)
    }

    pub fn reset_window_level(&mut self) {
        self.set_window_level(self.defaults.window_width, self.defaults.window_level);
    }

    pub fn apply_windowing(&mut self, width: f64, level: f64) {
        log::info!("Applying windowing W:{width} L:{level}");
        self.set_window_level(width, level);
    }

    pub fn apply_preset(&mut self, preset: WindowPreset) {
        let (width, level) = preset.values();
        log::info!("Applying {} preset", preset.name());
        self.set_window_level(width, level);
    }

    // ── Orientation ─────────────────────────────────────────────────────────

    pub fn set_invert(&mut self, invert: bool) {
        self.update_settings(|s| s.invert = invert);
    }

    pub fn toggle_invert(&mut self) -> bool {
        let invert = !self.state.settings.invert;
        self.set_invert(invert);
        invert
    }

    pub fn set_rotation(&mut self, degrees: i32) {
        self.update_settings(|s| s.rotation = degrees.rem_euclid(360));
    }

    pub fn rotate_clockwise(&mut self) {
        self.set_rotation(self.state.settings.rotation + 90);
    }

    pub fn rotate_counter_clockwise(&mut self) {
        self.set_rotation(self.state.settings.rotation - 90);
    }

    pub fn set_flip_horizontal(&mut self, flip: bool) {
        self.update_settings(|s| s.flip_horizontal = flip);
    }

    pub fn set_flip_vertical(&mut self, flip: bool) {
        self.update_settings(|s| s.flip_vertical = flip);
    }

    pub fn toggle_flip_horizontal(&mut self) -> bool {
        let flip = !self.state.settings.flip_horizontal;
        self.set_flip_horizontal(flip);
        flip
    }

    pub fn toggle_flip_vertical(&mut self) -> bool {
        let flip = !self.state.settings.flip_vertical;
        self.set_flip_vertical(flip);
        flip
    }

    /// Restore default display settings; the slice position is kept.
    pub fn reset(&mut self) {
        let defaults = self.defaults.clone();
        self.update_settings(|s| *s = defaults);
    }

    // ── Modes ───────────────────────────────────────────────────────────────

    pub fn is_drawing_mode(&self) -> bool {
        self.state.is_drawing_mode
    }

    pub fn set_drawing_mode(&mut self, drawing: bool) {
        if self.state.is_drawing_mode != drawing {
            self.state.is_drawing_mode = drawing;
            self.touch();
        }
    }

    pub fn toggle_drawing_mode(&mut self) -> bool {
        let drawing = !self.state.is_drawing_mode;
        self.set_drawing_mode(drawing);
        drawing
    }

    pub fn is_loaded(&self) -> bool {
        self.state.is_loaded
    }

    pub fn set_loaded(&mut self, loaded: bool) {
        self.state.is_loaded = loaded;
        self.touch();
    }

    // ── Persistence ─────────────────────────────────────────────────────────

    fn update_settings(&mut self, f: impl FnOnce(&mut ViewportSettings)) {
        f(&mut self.state.settings);
        self.touch();
        if let Err(e) = self.save() {
            log::error!("Error saving viewport settings: {:#}", e);
        }
    }

    fn save(&self) -> Result<()> {
        let data = serde_json::to_string(&self.state.settings)
            .context("serializing viewport settings")?;
        self.storage.set(VIEWPORT_KEY, &data)
    }

    fn load(&mut self) {
        let stored = match self.storage.get(VIEWPORT_KEY) {
            Ok(Some(data)) => data,
            Ok(None) => return,
            Err(e) => {
                log::error!("Error loading viewport settings: {:#}", e);
                return;
            }
        };
        match merge_settings(&self.defaults, &stored) {
            Ok(settings) => self.state.settings = settings,
            Err(e) => log::error!("Error loading viewport settings: {:#}", e),
        }
    }

    fn touch(&mut self) {
        self.revision += 1;
    }
}

fn clamp_slice(index: usize, total: usize) -> usize {
    index.min(total.saturating_sub(1))
}

/// Overlay the stored (possibly partial) settings onto `defaults`.
fn merge_settings(defaults: &ViewportSettings, stored: &str) -> Result<ViewportSettings> {
    let mut base = serde_json::to_value(defaults).context("serializing defaults")?;
    let overlay: serde_json::Value =
        serde_json::from_str(stored).context("parsing stored viewport settings")?;
    if let (Some(base), Some(overlay)) = (base.as_object_mut(), overlay.as_object()) {
        for (key, value) in overlay {
            base.insert(key.clone(), value.clone());
        }
    }
    let mut settings: ViewportSettings =
        serde_json::from_value(base).context("decoding stored viewport settings")?;
    settings.zoom = settings.zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    settings.window_width = settings.window_width.max(1.0);
    settings.rotation = settings.rotation.rem_euclid(360);
    Ok(settings)
}
