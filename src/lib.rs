//! DICOM slice viewer with per-slice rectangular ROI annotations.

pub mod annotations;
pub mod app;
pub mod config;
pub mod consts;
pub mod model;
pub mod overlay;
pub mod series;
pub mod storage;
pub mod view;
pub mod viewport;

pub use app::DicomViewerApp;
