use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_WINDOW_LEVEL, DEFAULT_WINDOW_WIDTH};

// ── Annotations ─────────────────────────────────────────────────────────────

/// A rectangular ROI on one slice, in image pixel coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: String,
    pub slice_index: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_selected: bool,
    #[serde(default)]
    pub is_hovered: bool,
}

impl Annotation {
    pub fn rect(&self) -> egui::Rect {
        egui::Rect::from_min_size(
            egui::pos2(self.x, self.y),
            egui::vec2(self.width, self.height),
        )
    }

    /// Label shown above the rectangle; falls back to slice and id suffix.
    pub fn display_label(&self) -> String {
        match &self.label {
            Some(label) if !label.is_empty() => label.clone(),
            _ => format!("Annotation {}-{}", self.slice_index + 1, id_suffix(&self.id)),
        }
    }

    pub(crate) fn clear_transient(&mut self) {
        self.is_selected = false;
        self.is_hovered = false;
    }
}

fn id_suffix(id: &str) -> &str {
    let start = id
        .char_indices()
        .rev()
        .nth(3)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &id[start..]
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnnotationCreate {
    /// `None` places the annotation on the store's current slice.
    pub slice_index: Option<usize>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub label: Option<String>,
    pub description: Option<String>,
}

impl AnnotationCreate {
    pub fn from_rect(rect: egui::Rect) -> Self {
        Self {
            x: rect.min.x,
            y: rect.min.y,
            width: rect.width(),
            height: rect.height(),
            ..Default::default()
        }
    }
}

/// Partial update; `None` fields keep their current value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnnotationUpdate {
    pub id: String,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub label: Option<String>,
    pub description: Option<String>,
}

impl AnnotationUpdate {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_rect(mut self, rect: egui::Rect) -> Self {
        self.x = Some(rect.min.x);
        self.y = Some(rect.min.y);
        self.width = Some(rect.width());
        self.height = Some(rect.height());
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationAction {
    Create,
    Update,
    Delete,
    Select,
    Deselect,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnnotationEvent {
    pub action: AnnotationAction,
    pub annotation: Annotation,
    pub previous: Option<Annotation>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AnnotationStats {
    pub total_count: usize,
    pub slices_with_annotations: usize,
    pub average_per_slice: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SliceStats {
    pub count: usize,
    pub has_selected: bool,
}

/// On-disk shape of an exported annotation file.
#[derive(Debug, Serialize, Deserialize)]
pub struct AnnotationExport {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub annotations: Vec<Annotation>,
}

// ── Viewport ────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pan {
    pub x: f32,
    pub y: f32,
}

impl Pan {
    pub fn to_vec2(self) -> egui::Vec2 {
        egui::vec2(self.x, self.y)
    }
}

impl From<egui::Vec2> for Pan {
    fn from(v: egui::Vec2) -> Self {
        Self { x: v.x, y: v.y }
    }
}

/// Display settings; the only part of the viewport state that is persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewportSettings {
    pub zoom: f32,
    pub pan: Pan,
    pub window_width: f64,
    pub window_level: f64,
    pub invert: bool,
    /// Degrees, normalized into `[0, 360)`.
    pub rotation: i32,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
}

impl Default for ViewportSettings {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan: Pan::default(),
            window_width: DEFAULT_WINDOW_WIDTH,
            window_level: DEFAULT_WINDOW_LEVEL,
            invert: false,
            rotation: 0,
            flip_horizontal: false,
            flip_vertical: false,
        }
    }
}
