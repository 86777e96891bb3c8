use anyhow::Context as _;
use eframe::egui;
use egui::{Align2, Color32, FontId, Stroke, StrokeKind};
use egui_extras::{Column, TableBuilder};
use std::path::PathBuf;
use std::time::Instant;

use crate::annotations::AnnotationStore;
use crate::config::AppConfig;
use crate::consts::{
    WindowPreset, BORDER_WIDTH, COLOR_DEFAULT, COLOR_DRAFT, COLOR_HANDLE, COLOR_HOVER,
    COLOR_SELECTED, HANDLE_SIZE, LOAD_FAILED, MAX_ZOOM, MIN_ZOOM, SELECTION_BORDER_WIDTH,
};
use crate::model::AnnotationUpdate;
use crate::overlay::{Handle, OverlayController, OverlayEvent, Tool};
use crate::series::{render_slice, DicomImage, DicomSeries, LoadState, LoadUpdate, SeriesLoader};
use crate::storage::KeyValueStore;
use crate::view::ViewTransform;
use crate::viewport::ViewportStore;

/// Window width/level change per dragged screen pixel.
const WINDOW_DRAG_SPEED: f64 = 2.0;
/// Scroll distance, in points, that moves one slice. One wheel notch.
const SCROLL_PER_SLICE: f32 = 40.0;

// ── UI state ────────────────────────────────────────────────────────────────

/// What the current slice texture was rendered with.
#[derive(Clone, Debug, PartialEq)]
struct TextureKey {
    slice: usize,
    window_width: f64,
    window_level: f64,
    invert: bool,
}

/// Sidebar text fields for the selected annotation.
struct LabelEdit {
    id: String,
    label: String,
    description: String,
}

enum Notice {
    Info(String),
    Error(String),
}

/// Turns wheel scrolling into whole slice steps. Trackpads send many small
/// deltas, so the remainder is carried over.
#[derive(Default)]
struct WheelStepper {
    accum: f32,
}

impl WheelStepper {
    /// Slices to move for a vertical scroll delta. Scrolling down is positive.
    fn feed(&mut self, scroll_y: f32) -> isize {
        let down = -scroll_y;
        if down == 0.0 {
            return 0;
        }
        if self.accum.signum() != down.signum() {
            self.accum = 0.0;
        }
        self.accum += down;
        let steps = (self.accum / SCROLL_PER_SLICE).trunc();
        self.accum -= steps * SCROLL_PER_SLICE;
        steps as isize
    }

    fn reset(&mut self) {
        self.accum = 0.0;
    }
}

// ── App ─────────────────────────────────────────────────────────────────────

pub struct DicomViewerApp {
    annotations: AnnotationStore,
    viewport: ViewportStore,
    overlay: OverlayController,

    loader: SeriesLoader,
    load_state: LoadState,
    series: Option<DicomSeries>,

    texture: Option<egui::TextureHandle>,
    texture_key: Option<TextureKey>,

    show_annotations: bool,
    edit: Option<LabelEdit>,
    confirm_clear_all: bool,
    notice: Option<Notice>,
    wheel: WheelStepper,
}

impl DicomViewerApp {
    pub fn new(
        ctx: &egui::Context,
        config: &AppConfig,
        annotation_storage: Box<dyn KeyValueStore>,
        viewport_storage: Box<dyn KeyValueStore>,
        files: Vec<PathBuf>,
    ) -> Self {
        let mut app = Self {
            annotations: AnnotationStore::new(annotation_storage, &config.annotations),
            viewport: ViewportStore::new(viewport_storage, &config.dicom),
            overlay: OverlayController::new(config.refresh_debounce()),
            loader: SeriesLoader::new(Some(ctx.clone())),
            load_state: LoadState::Idle,
            series: None,
            texture: None,
            texture_key: None,
            show_annotations: true,
            edit: None,
            confirm_clear_all: false,
            notice: None,
            wheel: WheelStepper::default(),
        };
        if !files.is_empty() {
            app.start_loading(files);
        }
        app
    }

    fn current_image(&self) -> Option<&DicomImage> {
        self.series
            .as_ref()
            .and_then(|s| s.images.get(self.viewport.current_slice()))
    }

    fn report(&mut self, what: &str, err: anyhow::Error) {
        log::error!("{what}: {err:#}");
        self.notice = Some(Notice::Error(format!("{what}: {err:#}")));
    }

    fn inform(&mut self, message: String) {
        log::info!("{message}");
        self.notice = Some(Notice::Info(message));
    }

    // ── Loading ─────────────────────────────────────────────────────────────

    fn open_files(&mut self) {
        let picked = rfd::FileDialog::new()
            .add_filter("DICOM", &["dcm", "dicom", "DCM"])
            .add_filter("All files", &["*"])
            .pick_files();
        if let Some(paths) = picked {
            self.start_loading(paths);
        }
    }

    fn start_loading(&mut self, paths: Vec<PathBuf>) {
        self.load_state = LoadState::Loading(Default::default());
        self.loader.load(paths);
    }

    fn poll_loader(&mut self, ctx: &egui::Context) {
        for update in self.loader.poll() {
            match update {
                LoadUpdate::Progress(progress) => self.load_state = LoadState::Loading(progress),
                LoadUpdate::Finished(Ok(series)) => self.install_series(ctx, series),
                LoadUpdate::Finished(Err(e)) => {
                    self.load_state = LoadState::Error(format!("{e:#}"));
                    self.report(LOAD_FAILED, e);
                }
            }
        }
    }

    fn install_series(&mut self, ctx: &egui::Context, series: DicomSeries) {
        ctx.send_viewport_cmd(egui::ViewportCommand::Title(format!(
            "dicom-roi - {} ({})",
            series.description, series.modality
        )));
        self.viewport.set_total_slices(series.slice_count());
        self.viewport.first_slice();
        self.viewport.set_loaded(true);
        self.texture_key = None;
        self.load_state = LoadState::Loaded;
        self.inform(format!(
            "Loaded {} slices of {}",
            series.slice_count(),
            series.description
        ));
        self.series = Some(series);
    }

    fn ensure_texture(&mut self, ctx: &egui::Context) {
        let slice = self.viewport.current_slice();
        let Some(image) = self.series.as_ref().and_then(|s| s.images.get(slice)) else {
            self.texture = None;
            self.texture_key = None;
            return;
        };
        let settings = self.viewport.settings();
        let key = TextureKey {
            slice,
            window_width: settings.window_width,
            window_level: settings.window_level,
            invert: settings.invert,
        };
        if self.texture_key.as_ref() == Some(&key) {
            return;
        }
        self.texture_key = Some(key);

        match render_slice(image, settings) {
            Ok(pixels) => match &mut self.texture {
                Some(texture) => texture.set(pixels, egui::TextureOptions::LINEAR),
                None => {
                    self.texture =
                        Some(ctx.load_texture("dicom-slice", pixels, egui::TextureOptions::LINEAR))
                }
            },
            Err(e) => {
                self.texture = None;
                self.report("Could not render slice", e);
            }
        }
    }

    // ── Annotation files ────────────────────────────────────────────────────

    fn save(&mut self) {
        match self.annotations.save() {
            Ok(()) => self.inform(format!("Saved {} annotations", self.annotations.all().len())),
            Err(e) => self.report("Save failed", e),
        }
    }

    fn export_annotations(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("JSON", &["json"])
            .set_file_name(format!(
                "dicom-annotations-{}.json",
                chrono::Local::now().format("%Y-%m-%d")
            ))
            .save_file()
        else {
            return;
        };
        let written = self.annotations.export_json().and_then(|json| {
            std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))
        });
        match written {
            Ok(()) => self.inform(format!(
                "Exported {} annotations to {}",
                self.annotations.all().len(),
                path.display()
            )),
            Err(e) => self.report("Export failed", e),
        }
    }

    fn import_annotations(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("JSON", &["json"])
            .pick_file()
        else {
            return;
        };
        let imported = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))
            .and_then(|json| self.annotations.import_json(&json));
        match imported {
            Ok(count) => self.inform(format!("Imported {count} annotations")),
            Err(e) => self.report("Import failed", e),
        }
    }

    fn on_overlay_event(&mut self, event: OverlayEvent) {
        match event {
            OverlayEvent::Created(ann) => log::info!(
                "Created {} on slice {} at {:.0},{:.0} {:.0}x{:.0}",
                ann.id,
                ann.slice_index + 1,
                ann.x,
                ann.y,
                ann.width,
                ann.height
            ),
            OverlayEvent::Updated(ann) => log::debug!("Updated {}", ann.id),
            OverlayEvent::Deleted(id) => log::info!("Deleted {id}"),
            OverlayEvent::Discarded => {}
        }
    }

    // ── Keyboard ────────────────────────────────────────────────────────────

    fn handle_keys(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }
        let (keys, save) = ctx.input(|i| {
            let plain = !i.modifiers.command;
            let keys: Vec<egui::Key> = [
                egui::Key::Delete,
                egui::Key::Backspace,
                egui::Key::Escape,
                egui::Key::ArrowDown,
                egui::Key::ArrowUp,
                egui::Key::Plus,
                egui::Key::Equals,
                egui::Key::Minus,
                egui::Key::R,
                egui::Key::A,
            ]
            .into_iter()
            .filter(|k| plain && i.key_pressed(*k))
            .collect();
            (keys, i.modifiers.command && i.key_pressed(egui::Key::S))
        });

        if save {
            self.save();
        }
        for key in keys {
            match key {
                egui::Key::ArrowDown => {
                    self.viewport.next_slice();
                }
                egui::Key::ArrowUp => {
                    self.viewport.previous_slice();
                }
                egui::Key::Plus | egui::Key::Equals => self.viewport.zoom_step_in(),
                egui::Key::Minus => self.viewport.zoom_step_out(),
                egui::Key::R => self.viewport.reset(),
                egui::Key::A => self.show_annotations = !self.show_annotations,
                other => {
                    if let Some(event) = self.overlay.handle_key(other, &mut self.annotations) {
                        self.on_overlay_event(event);
                    }
                }
            }
        }
    }

    // ── Panels ──────────────────────────────────────────────────────────────

    fn toolbar_ui(&mut self, ui: &mut egui::Ui) {
        let settings = self.viewport.settings().clone();
        ui.horizontal_wrapped(|ui| {
            if ui.button("Open…").clicked() {
                self.open_files();
            }
            ui.separator();

            let mut drawing = self.viewport.is_drawing_mode();
            ui.selectable_value(&mut drawing, false, "Select");
            ui.selectable_value(&mut drawing, true, "Rectangle ROI");
            if drawing != self.viewport.is_drawing_mode() {
                self.viewport.set_drawing_mode(drawing);
            }
            ui.separator();

            for preset in WindowPreset::ALL {
                let (width, level) = preset.values();
                if ui
                    .button(preset.name())
                    .on_hover_text(format!("W {width} / L {level}"))
                    .clicked()
                {
                    self.viewport.apply_preset(preset);
                }
            }
            ui.separator();

            if ui.button("−").on_hover_text("Zoom out").clicked() {
                self.viewport.zoom_step_out();
            }
            ui.label(format!("{:.0}%", settings.zoom * 100.0));
            if ui.button("+").on_hover_text("Zoom in").clicked() {
                self.viewport.zoom_step_in();
            }
            if ui.button("1:1").clicked() {
                self.viewport.reset_zoom();
                self.viewport.reset_pan();
            }
            ui.separator();

            if ui.selectable_label(settings.invert, "Invert").clicked() {
                self.viewport.toggle_invert();
            }
            if ui.button("⟲").on_hover_text("Rotate left").clicked() {
                self.viewport.rotate_counter_clockwise();
            }
            if ui.button("⟳").on_hover_text("Rotate right").clicked() {
                self.viewport.rotate_clockwise();
            }
            if ui.selectable_label(settings.flip_horizontal, "Flip H").clicked() {
                self.viewport.toggle_flip_horizontal();
            }
            if ui.selectable_label(settings.flip_vertical, "Flip V").clicked() {
                self.viewport.toggle_flip_vertical();
            }
            if ui.button("Reset").on_hover_text("Reset view (R)").clicked() {
                self.viewport.reset();
            }
            ui.separator();

            ui.checkbox(&mut self.show_annotations, "Annotations");
        });
    }

    fn sidebar_ui(&mut self, ui: &mut egui::Ui) {
        let slice = self.viewport.current_slice();
        ui.heading("Annotations");
        ui.label(format!(
            "Slice {}: {} annotation(s)",
            slice + 1,
            self.annotations.slice_count(slice)
        ));
        ui.separator();

        self.annotation_table(ui, slice);
        ui.separator();
        self.selection_editor(ui);
        ui.separator();

        let stats = self.annotations.stats();
        egui::CollapsingHeader::new("Statistics")
            .default_open(true)
            .show(ui, |ui| {
                ui.label(format!("Total: {}", stats.total_count));
                ui.label(format!("Annotated slices: {}", stats.slices_with_annotations));
                ui.label(format!("Average per slice: {:.1}", stats.average_per_slice));
            });

        let overview = self.annotations.slice_stats();
        let mut jump = None;
        egui::CollapsingHeader::new("Slices").show(ui, |ui| {
            if overview.is_empty() {
                ui.weak("No annotated slices");
            }
            for (index, stats) in &overview {
                let text = format!(
                    "Slice {}: {}{}",
                    index + 1,
                    stats.count,
                    if stats.has_selected { " ●" } else { "" }
                );
                if ui.selectable_label(*index == slice, text).clicked() {
                    jump = Some(*index);
                }
            }
        });
        if let Some(index) = jump {
            self.viewport.set_current_slice(index);
        }
        ui.separator();

        ui.horizontal(|ui| {
            if ui.button("Export…").clicked() {
                self.export_annotations();
            }
            if ui.button("Import…").clicked() {
                self.import_annotations();
            }
            if ui.button("Save").on_hover_text("Ctrl+S").clicked() {
                self.save();
            }
        });
        ui.horizontal(|ui| {
            if ui.button("Clear slice").clicked() {
                self.annotations.clear_current_slice();
            }
            if self.confirm_clear_all {
                ui.label("Delete everything?");
                if ui.button("Yes").clicked() {
                    self.annotations.clear_all();
                    self.confirm_clear_all = false;
                }
                if ui.button("No").clicked() {
                    self.confirm_clear_all = false;
                }
            } else if ui.button("Clear all").clicked() {
                self.confirm_clear_all = true;
            }
        });
    }

    fn annotation_table(&mut self, ui: &mut egui::Ui, slice: usize) {
        let rows: Vec<_> = self
            .annotations
            .for_slice(slice)
            .map(|a| (a.id.clone(), a.display_label(), a.rect(), a.is_selected))
            .collect();
        if rows.is_empty() {
            ui.weak("Nothing drawn on this slice");
            return;
        }

        let mut clicked = None;
        TableBuilder::new(ui)
            .striped(true)
            .sense(egui::Sense::click())
            .max_scroll_height(220.0)
            .column(Column::remainder())
            .column(Column::auto())
            .header(18.0, |mut header| {
                header.col(|ui| {
                    ui.strong("Label");
                });
                header.col(|ui| {
                    ui.strong("Rectangle");
                });
            })
            .body(|mut body| {
                for (id, label, rect, selected) in &rows {
                    body.row(20.0, |mut row| {
                        row.set_selected(*selected);
                        row.col(|ui| {
                            ui.label(label.as_str());
                        });
                        row.col(|ui| {
                            ui.label(format!(
                                "{:.0},{:.0} {:.0}×{:.0}",
                                rect.min.x,
                                rect.min.y,
                                rect.width(),
                                rect.height()
                            ));
                        });
                        if row.response().clicked() {
                            clicked = Some(id.clone());
                        }
                    });
                }
            });

        if let Some(id) = clicked {
            self.overlay.select(Some(&id), &mut self.annotations);
        }
    }

    fn selection_editor(&mut self, ui: &mut egui::Ui) {
        let Some(selected) = self.annotations.selected() else {
            self.edit = None;
            ui.weak("No annotation selected");
            return;
        };
        if self.edit.as_ref().map(|e| e.id.as_str()) != Some(selected.id.as_str()) {
            self.edit = Some(LabelEdit {
                id: selected.id.clone(),
                label: selected.label.clone().unwrap_or_default(),
                description: selected.description.clone().unwrap_or_default(),
            });
        }
        let modified = selected.timestamp.with_timezone(&chrono::Local);
        let Some(edit) = &mut self.edit else {
            return;
        };

        egui::Grid::new("selection_editor")
            .num_columns(2)
            .show(ui, |ui| {
                ui.label("Label");
                ui.text_edit_singleline(&mut edit.label);
                ui.end_row();
                ui.label("Description");
                ui.text_edit_multiline(&mut edit.description);
                ui.end_row();
            });
        ui.weak(format!("Modified {}", modified.format("%Y-%m-%d %H:%M:%S")));

        let mut apply = false;
        let mut delete = false;
        ui.horizontal(|ui| {
            apply = ui.button("Apply").clicked();
            delete = ui.button("Delete").on_hover_text("Del").clicked();
        });
        if apply {
            let update = AnnotationUpdate {
                label: Some(edit.label.trim().to_owned()),
                description: Some(edit.description.trim().to_owned()),
                ..AnnotationUpdate::new(edit.id.clone())
            };
            self.annotations.update(update);
        }
        if delete {
            if let Some(event) = self.overlay.delete_selected(&mut self.annotations) {
                self.on_overlay_event(event);
            }
        }
    }

    fn navigator_ui(&mut self, ui: &mut egui::Ui) {
        let total = self.viewport.total_slices();
        if total == 0 {
            return;
        }
        let current = self.viewport.current_slice();

        ui.horizontal(|ui| {
            if ui.button("|<").clicked() {
                self.viewport.first_slice();
            }
            if ui.add_enabled(current > 0, egui::Button::new("<")).clicked() {
                self.viewport.previous_slice();
            }
            let mut number = current + 1;
            if ui
                .add(egui::Slider::new(&mut number, 1..=total).show_value(false))
                .changed()
            {
                self.viewport.set_current_slice(number - 1);
            }
            if ui
                .add_enabled(current + 1 < total, egui::Button::new(">"))
                .clicked()
            {
                self.viewport.next_slice();
            }
            if ui.button(">|").clicked() {
                self.viewport.last_slice();
            }
            ui.label(format!("Slice {} / {}", current + 1, total));
            if let Some(image) = self.current_image() {
                ui.weak(format!("Instance {}", image.instance_number()));
            }
        });

        // One tick per annotated slice, across the full width.
        let (strip, _) =
            ui.allocate_exact_size(egui::vec2(ui.available_width(), 6.0), egui::Sense::hover());
        let painter = ui.painter_at(strip);
        for slice in self.annotations.slice_stats().keys() {
            let x = strip.left() + strip.width() * (*slice as f32 + 0.5) / total as f32;
            let color = if *slice == current {
                COLOR_SELECTED
            } else {
                COLOR_DEFAULT
            };
            painter.line_segment(
                [egui::pos2(x, strip.top()), egui::pos2(x, strip.bottom())],
                Stroke::new(2.0, color),
            );
        }
    }

    fn status_ui(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            match &self.load_state {
                LoadState::Loading(progress) => {
                    let text = match &progress.current_file {
                        Some(file) => format!("{}/{} {}", progress.loaded, progress.total, file),
                        None => format!("{}/{}", progress.loaded, progress.total),
                    };
                    ui.add(
                        egui::ProgressBar::new(progress.percentage() / 100.0)
                            .desired_width(240.0)
                            .text(text),
                    );
                }
                LoadState::Error(message) => {
                    ui.colored_label(Color32::LIGHT_RED, message);
                }
                LoadState::Idle | LoadState::Loaded => {}
            }

            match &self.notice {
                Some(Notice::Error(message)) => {
                    ui.colored_label(Color32::LIGHT_RED, message);
                }
                Some(Notice::Info(message)) => {
                    ui.label(message);
                }
                None => {}
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let s = self.viewport.settings();
                ui.monospace(format!(
                    "W {:.0}  L {:.0}  Zoom {:.0}%  Rot {}°",
                    s.window_width,
                    s.window_level,
                    s.zoom * 100.0,
                    s.rotation
                ));
            });
        });
    }

    // ── Canvas ──────────────────────────────────────────────────────────────

    fn canvas_ui(&mut self, ui: &mut egui::Ui) {
        let (response, painter) =
            ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
        let canvas = response.rect;
        painter.rect_filled(canvas, 0.0, Color32::BLACK);

        let Some(image_size) = self.current_image().map(DicomImage::size) else {
            let text = match self.load_state {
                LoadState::Loading(_) => "Loading…",
                _ => "Open DICOM files to begin",
            };
            painter.text(
                canvas.center(),
                Align2::CENTER_CENTER,
                text,
                FontId::proportional(18.0),
                Color32::GRAY,
            );
            return;
        };

        let transform = ViewTransform::new(canvas, image_size, self.viewport.settings());
        self.overlay.set_bounds(Some(transform.image_bounds()));

        if let Some(texture) = &self.texture {
            paint_texture(&painter, texture.id(), &transform);
        }
        if self.show_annotations {
            self.paint_overlay(&painter, &transform);
        }

        self.handle_view_input(ui.ctx(), &response, &transform);
        if self.show_annotations {
            self.handle_pointer(ui.ctx(), &response, &transform);
        }
    }

    fn paint_overlay(&self, painter: &egui::Painter, transform: &ViewTransform) {
        for shape in self.overlay.shapes() {
            let rect = transform.rect_to_screen(shape.rect);
            let (color, width) = if shape.selected {
                (COLOR_SELECTED, SELECTION_BORDER_WIDTH)
            } else if shape.hovered {
                (COLOR_HOVER, BORDER_WIDTH)
            } else {
                (COLOR_DEFAULT, BORDER_WIDTH)
            };
            painter.rect(
                rect,
                0.0,
                color.gamma_multiply(0.1),
                Stroke::new(width, color),
                StrokeKind::Middle,
            );
            painter.text(
                rect.left_top() - egui::vec2(0.0, 3.0),
                Align2::LEFT_BOTTOM,
                &shape.label,
                FontId::proportional(12.0),
                color,
            );

            if shape.selected {
                for handle in Handle::ALL {
                    let center = transform.image_to_screen(handle.position(shape.rect));
                    painter.rect(
                        egui::Rect::from_center_size(center, egui::Vec2::splat(HANDLE_SIZE)),
                        0.0,
                        COLOR_HANDLE,
                        Stroke::new(1.0, COLOR_SELECTED),
                        StrokeKind::Middle,
                    );
                }
            }
        }

        if let Some(draft) = self.overlay.draft_rect() {
            painter.rect(
                transform.rect_to_screen(draft),
                0.0,
                COLOR_DRAFT.gamma_multiply(0.15),
                Stroke::new(BORDER_WIDTH, COLOR_DRAFT),
                StrokeKind::Middle,
            );
        }
    }

    /// Middle-drag pans, right-drag adjusts window/level. With the Select tool the
    /// wheel steps through slices; Ctrl+wheel zooms about the cursor.
    fn handle_view_input(
        &mut self,
        ctx: &egui::Context,
        response: &egui::Response,
        transform: &ViewTransform,
    ) {
        let (middle, secondary, delta, scroll, zoom_delta) = ctx.input(|i| {
            (
                i.pointer.middle_down(),
                i.pointer.secondary_down(),
                i.pointer.delta(),
                i.raw_scroll_delta.y,
                i.zoom_delta(),
            )
        });
        let active = response.hovered() || response.dragged();

        if middle && active {
            self.viewport.pan_by(delta);
        }
        if secondary && active && delta != egui::Vec2::ZERO {
            self.viewport
                .adjust_window_width(delta.x as f64 * WINDOW_DRAG_SPEED);
            self.viewport
                .adjust_window_level(-(delta.y as f64) * WINDOW_DRAG_SPEED);
        }

        if !response.hovered() {
            self.wheel.reset();
            return;
        }

        // Ctrl+wheel and pinch arrive as zoom, never as scroll.
        if zoom_delta != 1.0 {
            let new_zoom = (transform.zoom * zoom_delta).clamp(MIN_ZOOM, MAX_ZOOM);
            if let Some(cursor) = response.hover_pos() {
                self.viewport
                    .set_pan(transform.pan_for_zoom_at(cursor, new_zoom).into());
            }
            self.viewport.set_zoom(new_zoom);
        }

        if self.viewport.is_drawing_mode() || self.viewport.total_slices() < 2 {
            self.wheel.reset();
            return;
        }
        let steps = self.wheel.feed(scroll);
        if steps != 0 {
            self.viewport.step_slice(steps);
        }
    }

    fn handle_pointer(
        &mut self,
        ctx: &egui::Context,
        response: &egui::Response,
        transform: &ViewTransform,
    ) {
        let (pressed, released, pos) = ctx.input(|i| {
            (
                i.pointer.primary_pressed(),
                i.pointer.primary_released(),
                i.pointer.interact_pos(),
            )
        });
        let Some(screen) = pos else {
            self.overlay.pointer_left(&mut self.annotations);
            return;
        };
        let at = transform.screen_to_image(screen);

        if pressed && response.hovered() {
            self.overlay
                .pointer_down(at, &mut self.annotations, transform.zoom);
        }
        if !self.overlay.gesture().is_idle() || response.hovered() {
            self.overlay.pointer_move(at, &mut self.annotations);
        } else {
            self.overlay.pointer_left(&mut self.annotations);
        }
        if released {
            if let Some(event) = self.overlay.pointer_up(at, &mut self.annotations) {
                self.on_overlay_event(event);
            }
        }

        if response.hovered() && self.overlay.tool() == Tool::RectangleRoi {
            ctx.set_cursor_icon(egui::CursorIcon::Crosshair);
        }
    }
}

/// Draw the slice as a textured quad so rotation and flips come for free.
fn paint_texture(painter: &egui::Painter, texture: egui::TextureId, transform: &ViewTransform) {
    let uvs = [
        egui::pos2(0.0, 0.0),
        egui::pos2(1.0, 0.0),
        egui::pos2(1.0, 1.0),
        egui::pos2(0.0, 1.0),
    ];
    let mut mesh = egui::Mesh::with_texture(texture);
    for (pos, uv) in transform.image_corners().into_iter().zip(uvs) {
        mesh.vertices.push(egui::epaint::Vertex {
            pos,
            uv,
            color: Color32::WHITE,
        });
    }
    mesh.add_triangle(0, 1, 2);
    mesh.add_triangle(0, 2, 3);
    painter.add(egui::Shape::mesh(mesh));
}

// ── eframe App impl ────────────────────────────────────────────────────────

impl eframe::App for DicomViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let revisions = (self.viewport.revision(), self.annotations.revision());

        self.poll_loader(ctx);
        self.handle_keys(ctx);

        let tool = if self.viewport.is_drawing_mode() {
            Tool::RectangleRoi
        } else {
            Tool::Select
        };
        self.overlay.set_tool(tool);

        let now = Instant::now();
        self.overlay.sync(&mut self.annotations, &self.viewport, now);
        if let Some(due) = self.overlay.pending_refresh() {
            ctx.request_repaint_after(due.saturating_duration_since(now));
        }
        self.ensure_texture(ctx);

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.toolbar_ui(ui));
        egui::TopBottomPanel::bottom("navigator").show(ctx, |ui| {
            self.navigator_ui(ui);
            self.status_ui(ui);
        });
        egui::SidePanel::right("annotations")
            .default_width(280.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| self.sidebar_ui(ui));
            });
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| self.canvas_ui(ui));

        // Changes made by this frame's widgets are picked up by the next sync.
        if revisions != (self.viewport.revision(), self.annotations.revision()) {
            ctx.request_repaint();
        }
    }
}
