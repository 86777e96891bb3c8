//! Overlay interaction: turns pointer and keyboard input into annotation store
//! mutations and keeps a per-slice shape cache in sync with both stores.
//!
//! All coordinates are image pixels. The caller converts pointer positions
//! with [`crate::view::ViewTransform::screen_to_image`] first.
//!
//! Gestures:
//!
//! ```text
//! Idle --down (draw tool)--> Drawing --up--> Idle        (commit if >= MIN_SIZE)
//! Idle --down on shape-----> Dragging --up--> Idle       (one update, stays selected)
//! Idle --down on handle----> Resizing --up--> Idle       (one update, stays selected)
//! Idle --down on empty-----> Idle                        (deselect)
//! ```

use std::time::{Duration, Instant};

use egui::{pos2, Pos2, Rect, Vec2};

use crate::annotations::AnnotationStore;
use crate::consts::{HANDLE_SIZE, MIN_SIZE};
use crate::model::{Annotation, AnnotationAction, AnnotationCreate, AnnotationUpdate};
use crate::viewport::ViewportStore;

// ── Tools / handles ─────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Tool {
    #[default]
    Select,
    RectangleRoi,
}

/// Resize handle on the selected rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handle {
    TopLeft,
    Top,
    TopRight,
    Right,
    BottomRight,
    Bottom,
    BottomLeft,
    Left,
}

impl Handle {
    pub const ALL: [Handle; 8] = [
        Handle::TopLeft,
        Handle::Top,
        Handle::TopRight,
        Handle::Right,
        Handle::BottomRight,
        Handle::Bottom,
        Handle::BottomLeft,
        Handle::Left,
    ];

    pub fn position(self, rect: Rect) -> Pos2 {
        let c = rect.center();
        match self {
            Handle::TopLeft => rect.left_top(),
            Handle::Top => pos2(c.x, rect.top()),
            Handle::TopRight => rect.right_top(),
            Handle::Right => pos2(rect.right(), c.y),
            Handle::BottomRight => rect.right_bottom(),
            Handle::Bottom => pos2(c.x, rect.bottom()),
            Handle::BottomLeft => rect.left_bottom(),
            Handle::Left => pos2(rect.left(), c.y),
        }
    }

    fn moves_left(self) -> bool {
        matches!(self, Handle::TopLeft | Handle::Left | Handle::BottomLeft)
    }

    fn moves_right(self) -> bool {
        matches!(self, Handle::TopRight | Handle::Right | Handle::BottomRight)
    }

    fn moves_top(self) -> bool {
        matches!(self, Handle::TopLeft | Handle::Top | Handle::TopRight)
    }

    fn moves_bottom(self) -> bool {
        matches!(self, Handle::BottomLeft | Handle::Bottom | Handle::BottomRight)
    }

    /// Move the edges this handle controls to `pos`. The rectangle never
    /// inverts and never shrinks below `MIN_SIZE`.
    pub fn apply(self, origin: Rect, pos: Pos2) -> Rect {
        let mut r = origin;
        if self.moves_left() {
            r.min.x = pos.x.min(origin.max.x - MIN_SIZE);
        }
        if self.moves_right() {
            r.max.x = pos.x.max(origin.min.x + MIN_SIZE);
        }
        if self.moves_top() {
            r.min.y = pos.y.min(origin.max.y - MIN_SIZE);
        }
        if self.moves_bottom() {
            r.max.y = pos.y.max(origin.min.y + MIN_SIZE);
        }
        r
    }
}

// ── Shape cache / gesture ───────────────────────────────────────────────────

/// What the canvas draws for one annotation of the current slice.
#[derive(Clone, Debug, PartialEq)]
pub struct ShapeView {
    pub id: String,
    pub rect: Rect,
    pub label: String,
    pub selected: bool,
    pub hovered: bool,
}

impl From<&Annotation> for ShapeView {
    fn from(ann: &Annotation) -> Self {
        Self {
            id: ann.id.clone(),
            rect: ann.rect(),
            label: ann.display_label(),
            selected: ann.is_selected,
            hovered: ann.is_hovered,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Gesture {
    #[default]
    Idle,
    Drawing {
        start: Pos2,
        current: Pos2,
    },
    Dragging {
        id: String,
        grab: Pos2,
        origin: Rect,
        current: Rect,
    },
    Resizing {
        id: String,
        handle: Handle,
        origin: Rect,
        current: Rect,
    },
}

impl Gesture {
    pub fn is_idle(&self) -> bool {
        matches!(self, Gesture::Idle)
    }
}

/// Result of a finished gesture or key command.
#[derive(Clone, Debug, PartialEq)]
pub enum OverlayEvent {
    Created(Annotation),
    Updated(Annotation),
    Deleted(String),
    /// A drawn rectangle was too small or rejected by the store.
    Discarded,
}

// ── Controller ──────────────────────────────────────────────────────────────

pub struct OverlayController {
    tool: Tool,
    gesture: Gesture,
    slice: Option<usize>,
    shapes: Vec<ShapeView>,
    seen_revision: u64,
    refresh_at: Option<Instant>,
    debounce: Duration,
    bounds: Option<Rect>,
}

impl OverlayController {
    pub fn new(debounce: Duration) -> Self {
        Self {
            tool: Tool::default(),
            gesture: Gesture::Idle,
            slice: None,
            shapes: Vec::new(),
            seen_revision: 0,
            refresh_at: None,
            debounce,
            bounds: None,
        }
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn set_tool(&mut self, tool: Tool) {
        if self.tool != tool {
            if matches!(self.gesture, Gesture::Drawing { .. }) {
                self.gesture = Gesture::Idle;
            }
            self.tool = tool;
        }
    }

    /// Image bounds that drawing and dragging stay within.
    pub fn set_bounds(&mut self, bounds: Option<Rect>) {
        self.bounds = bounds;
    }

    pub fn gesture(&self) -> &Gesture {
        &self.gesture
    }

    pub fn shapes(&self) -> &[ShapeView] {
        &self.shapes
    }

    pub fn slice(&self) -> Option<usize> {
        self.slice
    }

    /// Rectangle being drawn, normalized.
    pub fn draft_rect(&self) -> Option<Rect> {
        match self.gesture {
            Gesture::Drawing { start, current } => Some(Rect::from_two_pos(start, current)),
            _ => None,
        }
    }

    /// Live rectangle of the annotation being dragged or resized.
    pub fn active_rect(&self) -> Option<(&str, Rect)> {
        match &self.gesture {
            Gesture::Dragging { id, current, .. } | Gesture::Resizing { id, current, .. } => {
                Some((id.as_str(), *current))
            }
            _ => None,
        }
    }

    pub fn selected_shape(&self) -> Option<&ShapeView> {
        self.shapes.iter().find(|s| s.selected)
    }

    // ── Store synchronisation ───────────────────────────────────────────────

    /// Call once per frame. A slice change reloads that slice's shapes at once;
    /// any other store change reloads after the debounce delay, unless a
    /// gesture is in progress. Returns `true` when shapes were reloaded.
    pub fn sync(
        &mut self,
        annotations: &mut AnnotationStore,
        viewport: &ViewportStore,
        now: Instant,
    ) -> bool {
        for event in annotations.take_events() {
            if event.action == AnnotationAction::Delete {
                self.drop_shape(&event.annotation.id);
            }
        }

        annotations.set_total_slices(viewport.total_slices());
        let slice = viewport.current_slice();
        if self.slice != Some(slice) {
            log::debug!("Overlay switching to slice {}", slice + 1);
            self.slice = Some(slice);
            self.gesture = Gesture::Idle;
            annotations.set_current_slice(slice);
            self.reload(annotations);
            return true;
        }

        if annotations.revision() != self.seen_revision {
            self.seen_revision = annotations.revision();
            self.refresh_at = Some(now + self.debounce);
        }

        match self.refresh_at {
            Some(deadline) if now >= deadline && self.gesture.is_idle() => {
                self.reload(annotations);
                true
            }
            _ => false,
        }
    }

    /// When the next debounced reload is due, for scheduling a repaint.
    pub fn pending_refresh(&self) -> Option<Instant> {
        self.refresh_at
    }

    pub fn reload(&mut self, annotations: &AnnotationStore) {
        let slice = self.slice.unwrap_or_else(|| annotations.current_slice());
        self.shapes = annotations.for_slice(slice).map(ShapeView::from).collect();
        self.seen_revision = annotations.revision();
        self.refresh_at = None;
    }

    /// Jump to the slice holding `id` and select it.
    pub fn focus(
        &mut self,
        id: &str,
        annotations: &mut AnnotationStore,
        viewport: &mut ViewportStore,
        now: Instant,
    ) {
        let Some(slice) = annotations.get(id).map(|a| a.slice_index) else {
            return;
        };
        viewport.set_current_slice(slice);
        self.sync(annotations, viewport, now);
        if viewport.current_slice() == slice {
            self.select(Some(id), annotations);
        }
    }

    pub fn select(&mut self, id: Option<&str>, annotations: &mut AnnotationStore) {
        annotations.select(id);
        let selected = annotations.selected().map(|a| a.id.clone());
        for shape in &mut self.shapes {
            shape.selected = selected.as_deref() == Some(shape.id.as_str());
        }
    }

    // ── Pointer ─────────────────────────────────────────────────────────────

    /// `zoom` converts the on-screen handle size into image pixels.
    pub fn pointer_down(&mut self, pos: Pos2, annotations: &mut AnnotationStore, zoom: f32) {
        if !self.gesture.is_idle() {
            return;
        }

        if let Some((id, handle, rect)) = self.handle_at(pos, zoom) {
            self.gesture = Gesture::Resizing {
                id,
                handle,
                origin: rect,
                current: rect,
            };
            return;
        }

        match self.tool {
            Tool::RectangleRoi => {
                let start = self.clamp_point(pos);
                self.gesture = Gesture::Drawing {
                    start,
                    current: start,
                };
            }
            Tool::Select => match self.shape_at(pos).map(|s| (s.id.clone(), s.rect)) {
                Some((id, rect)) => {
                    self.select(Some(&id), annotations);
                    self.gesture = Gesture::Dragging {
                        id,
                        grab: pos,
                        origin: rect,
                        current: rect,
                    };
                }
                None => self.select(None, annotations),
            },
        }
    }

    pub fn pointer_move(&mut self, pos: Pos2, annotations: &mut AnnotationStore) {
        if self.gesture.is_idle() {
            self.update_hover(pos, annotations);
            return;
        }
        let bounds = self.bounds;
        match &mut self.gesture {
            Gesture::Idle => {}
            Gesture::Drawing { current, .. } => {
                *current = clamp_point(bounds, pos);
            }
            Gesture::Dragging {
                id,
                grab,
                origin,
                current,
            } => {
                let moved = origin.translate(pos - *grab);
                *current = keep_inside(bounds, moved);
                let (id, rect) = (id.clone(), *current);
                self.set_shape_rect(&id, rect);
            }
            Gesture::Resizing {
                id,
                handle,
                origin,
                current,
            } => {
                *current = handle.apply(*origin, clamp_point(bounds, pos));
                let (id, rect) = (id.clone(), *current);
                self.set_shape_rect(&id, rect);
            }
        }
    }

    pub fn pointer_up(
        &mut self,
        pos: Pos2,
        annotations: &mut AnnotationStore,
    ) -> Option<OverlayEvent> {
        if self.gesture.is_idle() {
            return None;
        }
        self.pointer_move(pos, annotations);

        match std::mem::take(&mut self.gesture) {
            Gesture::Idle => None,
            Gesture::Drawing { start, current } => {
                Some(self.commit_drawing(Rect::from_two_pos(start, current), annotations))
            }
            Gesture::Dragging {
                id,
                origin,
                current,
                ..
            }
            | Gesture::Resizing {
                id,
                origin,
                current,
                ..
            } => self.commit_transform(&id, origin, current, annotations),
        }
    }

    pub fn pointer_left(&mut self, annotations: &mut AnnotationStore) {
        if self.gesture.is_idle() {
            annotations.clear_hover();
            self.shapes.iter_mut().for_each(|s| s.hovered = false);
        }
    }

    // ── Keyboard ────────────────────────────────────────────────────────────

    pub fn handle_key(
        &mut self,
        key: egui::Key,
        annotations: &mut AnnotationStore,
    ) -> Option<OverlayEvent> {
        match key {
            egui::Key::Delete | egui::Key::Backspace => self.delete_selected(annotations),
            egui::Key::Escape => {
                self.cancel(annotations);
                None
            }
            _ => None,
        }
    }

    /// Abort the gesture in progress, restoring the original rectangle; with
    /// nothing in progress, clear the selection.
    pub fn cancel(&mut self, annotations: &mut AnnotationStore) {
        match std::mem::take(&mut self.gesture) {
            Gesture::Idle => self.select(None, annotations),
            Gesture::Drawing { .. } => {}
            Gesture::Dragging { id, origin, .. } | Gesture::Resizing { id, origin, .. } => {
                self.set_shape_rect(&id, origin);
            }
        }
    }

    pub fn delete_selected(&mut self, annotations: &mut AnnotationStore) -> Option<OverlayEvent> {
        if !self.gesture.is_idle() {
            self.cancel(annotations);
        }
        let id = annotations.selected()?.id.clone();
        if annotations.delete(&id) {
            self.drop_shape(&id);
            Some(OverlayEvent::Deleted(id))
        } else {
            None
        }
    }

    // ── Internals ───────────────────────────────────────────────────────────

    fn commit_drawing(&mut self, rect: Rect, annotations: &mut AnnotationStore) -> OverlayEvent {
        let rect = round_rect(rect);
        if rect.width() < MIN_SIZE || rect.height() < MIN_SIZE {
            log::debug!(
                "Discarding {}x{} rectangle below minimum size",
                rect.width(),
                rect.height()
            );
            return OverlayEvent::Discarded;
        }

        let slice = self.slice.unwrap_or_else(|| annotations.current_slice());
        let number = annotations.slice_count(slice) + 1;
        let data = AnnotationCreate {
            slice_index: Some(slice),
            label: Some(format!("{}-{}", slice + 1, number)),
            description: Some(format!("Bounding box annotation on slice {}", slice + 1)),
            ..AnnotationCreate::from_rect(rect)
        };
        match annotations.create(data) {
            Ok(annotation) => {
                self.shapes.push(ShapeView::from(&annotation));
                OverlayEvent::Created(annotation)
            }
            Err(e) => {
                log::warn!("Annotation not created: {:#}", e);
                OverlayEvent::Discarded
            }
        }
    }

    fn commit_transform(
        &mut self,
        id: &str,
        origin: Rect,
        current: Rect,
        annotations: &mut AnnotationStore,
    ) -> Option<OverlayEvent> {
        if current == origin {
            return None;
        }
        let rect = round_rect(current);
        if annotations.update(AnnotationUpdate::new(id).with_rect(rect)) {
            self.set_shape_rect(id, rect);
            annotations.get(id).cloned().map(OverlayEvent::Updated)
        } else {
            // Deleted while we were dragging it.
            self.reload(annotations);
            None
        }
    }

    fn update_hover(&mut self, pos: Pos2, annotations: &mut AnnotationStore) {
        let hit = self.shape_at(pos).map(|s| s.id.clone());
        for shape in &mut self.shapes {
            let hovered = hit.as_deref() == Some(shape.id.as_str());
            if shape.hovered != hovered {
                shape.hovered = hovered;
                annotations.set_hover(&shape.id, hovered);
            }
        }
    }

    /// Topmost shape containing `pos`.
    fn shape_at(&self, pos: Pos2) -> Option<&ShapeView> {
        self.shapes.iter().rev().find(|s| s.rect.contains(pos))
    }

    /// Nearest handle within half a handle of `pos`. Points closer to the
    /// rectangle's center than to any handle count as the body, so small
    /// rectangles can still be dragged.
    fn handle_at(&self, pos: Pos2, zoom: f32) -> Option<(String, Handle, Rect)> {
        let shape = self.selected_shape()?;
        let radius = HANDLE_SIZE / 2.0 / zoom.max(f32::EPSILON);
        let (handle, distance) = Handle::ALL
            .into_iter()
            .map(|h| (h, pos - h.position(shape.rect)))
            .filter(|(_, d)| d.x.abs() <= radius && d.y.abs() <= radius)
            .map(|(h, d)| (h, d.length()))
            .min_by(|a, b| a.1.total_cmp(&b.1))?;
        if distance >= pos.distance(shape.rect.center()) {
            return None;
        }
        Some((shape.id.clone(), handle, shape.rect))
    }

    fn set_shape_rect(&mut self, id: &str, rect: Rect) {
        if let Some(shape) = self.shapes.iter_mut().find(|s| s.id == id) {
            shape.rect = rect;
        }
    }

    fn drop_shape(&mut self, id: &str) {
        self.shapes.retain(|s| s.id != id);
        let targets_deleted = match &self.gesture {
            Gesture::Dragging { id: active, .. } | Gesture::Resizing { id: active, .. } => {
                active == id
            }
            _ => false,
        };
        if targets_deleted {
            self.gesture = Gesture::Idle;
        }
    }

    fn clamp_point(&self, pos: Pos2) -> Pos2 {
        clamp_point(self.bounds, pos)
    }
}

fn clamp_point(bounds: Option<Rect>, pos: Pos2) -> Pos2 {
    match bounds {
        Some(b) => pos.clamp(b.min, b.max),
        None => pos,
    }
}

/// Translate `rect` back inside `bounds` when it fits.
fn keep_inside(bounds: Option<Rect>, rect: Rect) -> Rect {
    let Some(b) = bounds else {
        return rect;
    };
    if rect.width() > b.width() || rect.height() > b.height() {
        return rect;
    }
    let mut shift = Vec2::ZERO;
    if rect.min.x < b.min.x {
        shift.x = b.min.x - rect.min.x;
    } else if rect.max.x > b.max.x {
        shift.x = b.max.x - rect.max.x;
    }
    if rect.min.y < b.min.y {
        shift.y = b.min.y - rect.min.y;
    } else if rect.max.y > b.max.y {
        shift.y = b.max.y - rect.max.y;
    }
    rect.translate(shift)
}

/// Committed rectangles sit on whole pixels.
fn round_rect(rect: Rect) -> Rect {
    Rect::from_min_size(
        pos2(rect.min.x.round(), rect.min.y.round()),
        egui::vec2(rect.width().round(), rect.height().round()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnnotationConfig, DicomConfig};
    use crate::storage::MemoryStore;
    use egui::vec2;

    const DEBOUNCE: Duration = Duration::from_millis(50);

    struct Fixture {
        annotations: AnnotationStore,
        viewport: ViewportStore,
        overlay: OverlayController,
        now: Instant,
    }

    impl Fixture {
        fn new(total_slices: usize) -> Self {
            let storage = MemoryStore::new();
            let mut viewport =
                ViewportStore::new(Box::new(storage.clone()), &DicomConfig::default());
            viewport.set_total_slices(total_slices);
            let mut f = Self {
                annotations: AnnotationStore::new(
                    Box::new(storage),
                    &AnnotationConfig::default(),
                ),
                viewport,
                overlay: OverlayController::new(DEBOUNCE),
                now: Instant::now(),
            };
            f.sync();
            f
        }

        fn sync(&mut self) -> bool {
            self.overlay
                .sync(&mut self.annotations, &self.viewport, self.now)
        }

        /// Let the debounce expire and sync.
        fn settle(&mut self) {
            self.sync();
            self.now += DEBOUNCE * 2;
            self.sync();
        }

        fn add(&mut self, slice: usize, x: f32, y: f32, w: f32, h: f32) -> String {
            let ann = self
                .annotations
                .create(AnnotationCreate {
                    slice_index: Some(slice),
                    x,
                    y,
                    width: w,
                    height: h,
                    ..Default::default()
                })
                .unwrap();
            self.settle();
            ann.id
        }

        fn down(&mut self, x: f32, y: f32) {
            self.overlay
                .pointer_down(pos2(x, y), &mut self.annotations, 1.0);
        }

        fn drag_to(&mut self, x: f32, y: f32) {
            self.overlay.pointer_move(pos2(x, y), &mut self.annotations);
        }

        fn up(&mut self, x: f32, y: f32) -> Option<OverlayEvent> {
            self.overlay.pointer_up(pos2(x, y), &mut self.annotations)
        }

        fn update_count(&mut self) -> usize {
            self.annotations
                .take_events()
                .iter()
                .filter(|e| e.action == AnnotationAction::Update)
                .count()
        }
    }

    #[test]
    fn drawing_commits_rectangle_on_current_slice() {
        let mut f = Fixture::new(5);
        f.viewport.set_current_slice(2);
        f.sync();
        f.overlay.set_tool(Tool::RectangleRoi);

        f.down(40.0, 30.0);
        f.drag_to(20.0, 25.0);
        assert_eq!(
            f.overlay.draft_rect(),
            Some(Rect::from_min_max(pos2(20.0, 25.0), pos2(40.0, 30.0)))
        );
        f.drag_to(10.0, 10.0);
        let ann = match f.up(10.0, 10.0) {
            Some(OverlayEvent::Created(ann)) => ann,
            other => panic!("expected a created annotation, got {other:?}"),
        };
        assert_eq!(ann.slice_index, 2);
        assert_eq!((ann.x, ann.y, ann.width, ann.height), (10.0, 10.0, 30.0, 20.0));
        assert_eq!(ann.label.as_deref(), Some("3-1"));
        assert_eq!(
            ann.description.as_deref(),
            Some("Bounding box annotation on slice 3")
        );
        assert_eq!(f.overlay.shapes().len(), 1);
        assert!(f.overlay.gesture().is_idle());
        assert!(f.overlay.draft_rect().is_none());
    }

    #[test]
    fn small_drawings_are_discarded() {
        let mut f = Fixture::new(1);
        f.overlay.set_tool(Tool::RectangleRoi);

        f.down(10.0, 10.0);
        assert_eq!(f.up(13.0, 40.0), Some(OverlayEvent::Discarded));
        assert!(f.annotations.all().is_empty());
        assert!(f.overlay.shapes().is_empty());
    }

    #[test]
    fn drawing_is_clamped_to_image_bounds() {
        let mut f = Fixture::new(1);
        f.overlay
            .set_bounds(Some(Rect::from_min_size(Pos2::ZERO, vec2(100.0, 100.0))));
        f.overlay.set_tool(Tool::RectangleRoi);

        f.down(-20.0, 50.0);
        let Some(OverlayEvent::Created(ann)) = f.up(150.0, 80.0) else {
            panic!("expected a created annotation");
        };
        assert_eq!((ann.x, ann.y, ann.width, ann.height), (0.0, 50.0, 100.0, 30.0));
    }

    #[test]
    fn drag_commits_exactly_one_update() {
        let mut f = Fixture::new(1);
        let id = f.add(0, 10.0, 10.0, 20.0, 20.0);
        f.annotations.take_events();

        f.down(15.0, 15.0);
        assert_eq!(f.annotations.selected().map(|a| a.id.clone()), Some(id.clone()));

        f.drag_to(25.0, 20.0);
        f.drag_to(35.0, 25.0);
        // Live feedback in the overlay only.
        assert_eq!(f.overlay.shapes()[0].rect.min, pos2(30.0, 20.0));
        assert_eq!(f.annotations.get(&id).unwrap().x, 10.0);
        assert_eq!(f.overlay.active_rect().map(|(_, r)| r.min), Some(pos2(30.0, 20.0)));

        let ann = match f.up(35.0, 25.0) {
            Some(OverlayEvent::Updated(ann)) => ann,
            other => panic!("expected an update, got {other:?}"),
        };
        assert_eq!((ann.x, ann.y, ann.width, ann.height), (30.0, 20.0, 20.0, 20.0));
        assert_eq!(f.update_count(), 1);
        assert!(f.annotations.selected().is_some());
    }

    #[test]
    fn click_without_movement_selects_without_update() {
        let mut f = Fixture::new(1);
        let id = f.add(0, 10.0, 10.0, 20.0, 20.0);
        f.annotations.take_events();

        f.down(12.0, 12.0);
        assert_eq!(f.up(12.0, 12.0), None);
        assert_eq!(f.update_count(), 0);
        assert!(f.overlay.shapes()[0].selected);
        assert_eq!(f.annotations.selected().unwrap().id, id);
    }

    #[test]
    fn resize_through_corner_handle() {
        let mut f = Fixture::new(1);
        let id = f.add(0, 10.0, 10.0, 20.0, 20.0);
        f.overlay.select(Some(&id), &mut f.annotations);

        // Bottom-right handle sits at (30, 30).
        f.down(31.0, 29.0);
        assert!(matches!(
            f.overlay.gesture(),
            Gesture::Resizing { handle: Handle::BottomRight, .. }
        ));
        f.drag_to(50.0, 60.0);
        let Some(OverlayEvent::Updated(ann)) = f.up(50.0, 60.0) else {
            panic!("expected an update");
        };
        assert_eq!((ann.x, ann.y, ann.width, ann.height), (10.0, 10.0, 40.0, 50.0));
    }

    #[test]
    fn resize_never_inverts_or_shrinks_below_minimum() {
        let origin = Rect::from_min_size(pos2(10.0, 10.0), vec2(20.0, 20.0));
        let r = Handle::Left.apply(origin, pos2(100.0, 0.0));
        assert_eq!(r.min.x, 30.0 - MIN_SIZE);
        assert_eq!(r.max.x, 30.0);
        assert_eq!((r.min.y, r.max.y), (10.0, 30.0));

        let r = Handle::TopRight.apply(origin, pos2(0.0, 100.0));
        assert_eq!(r.width(), MIN_SIZE);
        assert_eq!(r.height(), MIN_SIZE);
    }

    #[test]
    fn draw_tool_still_resizes_through_handles() {
        let mut f = Fixture::new(1);
        let id = f.add(0, 10.0, 10.0, 20.0, 20.0);
        f.overlay.select(Some(&id), &mut f.annotations);
        f.overlay.set_tool(Tool::RectangleRoi);

        f.down(20.0, 10.0);
        assert!(matches!(
            f.overlay.gesture(),
            Gesture::Resizing { handle: Handle::Top, .. }
        ));
    }

    #[test]
    fn small_selected_rectangle_can_still_be_dragged() {
        let mut f = Fixture::new(1);
        let id = f.add(0, 10.0, 10.0, 6.0, 6.0);
        f.overlay.select(Some(&id), &mut f.annotations);

        f.down(13.0, 13.0);
        assert!(matches!(f.overlay.gesture(), Gesture::Dragging { .. }));
        f.drag_to(23.0, 13.0);
        let Some(OverlayEvent::Updated(ann)) = f.up(23.0, 13.0) else {
            panic!("expected an update");
        };
        assert_eq!((ann.x, ann.y, ann.width, ann.height), (20.0, 10.0, 6.0, 6.0));

        // Its corner still resizes.
        f.settle();
        f.down(26.0, 16.0);
        assert!(matches!(
            f.overlay.gesture(),
            Gesture::Resizing { handle: Handle::BottomRight, .. }
        ));
    }

    #[test]
    fn handle_zone_is_half_a_handle_in_screen_pixels() {
        let mut f = Fixture::new(1);
        let id = f.add(0, 10.0, 10.0, 40.0, 40.0);
        f.overlay.select(Some(&id), &mut f.annotations);

        // 6 px off the corner is outside the 4 px zone at zoom 1.
        f.down(44.0, 44.0);
        assert!(matches!(f.overlay.gesture(), Gesture::Dragging { .. }));
        f.overlay.cancel(&mut f.annotations);

        // At zoom 0.5 the same zone covers 8 image pixels.
        f.overlay
            .pointer_down(pos2(44.0, 44.0), &mut f.annotations, 0.5);
        assert!(matches!(
            f.overlay.gesture(),
            Gesture::Resizing { handle: Handle::BottomRight, .. }
        ));
    }

    #[test]
    fn store_knows_slice_count_after_sync() {
        let mut f = Fixture::new(3);
        assert_eq!(f.annotations.total_slices(), 3);
        assert!(f
            .annotations
            .create(AnnotationCreate {
                slice_index: Some(5),
                width: 10.0,
                height: 10.0,
                ..Default::default()
            })
            .is_err());

        f.viewport.set_total_slices(6);
        f.sync();
        assert_eq!(f.annotations.total_slices(), 6);
    }

    #[test]
    fn clicking_empty_area_deselects() {
        let mut f = Fixture::new(1);
        let id = f.add(0, 10.0, 10.0, 20.0, 20.0);
        f.overlay.select(Some(&id), &mut f.annotations);

        f.down(200.0, 200.0);
        assert!(f.annotations.selected().is_none());
        assert!(f.overlay.selected_shape().is_none());
        assert_eq!(f.up(200.0, 200.0), None);
    }

    #[test]
    fn escape_restores_rectangle_then_deselects() {
        let mut f = Fixture::new(1);
        let id = f.add(0, 10.0, 10.0, 20.0, 20.0);

        f.down(15.0, 15.0);
        f.drag_to(60.0, 60.0);
        assert_eq!(f.overlay.handle_key(egui::Key::Escape, &mut f.annotations), None);
        assert!(f.overlay.gesture().is_idle());
        assert_eq!(f.overlay.shapes()[0].rect.min, pos2(10.0, 10.0));
        assert_eq!(f.annotations.get(&id).unwrap().x, 10.0);
        assert!(f.annotations.selected().is_some());

        f.overlay.handle_key(egui::Key::Escape, &mut f.annotations);
        assert!(f.annotations.selected().is_none());
    }

    #[test]
    fn delete_key_removes_selected() {
        let mut f = Fixture::new(1);
        let keep = f.add(0, 50.0, 50.0, 20.0, 20.0);
        let gone = f.add(0, 10.0, 10.0, 20.0, 20.0);

        assert_eq!(f.overlay.handle_key(egui::Key::Delete, &mut f.annotations), None);

        f.overlay.select(Some(&gone), &mut f.annotations);
        assert_eq!(
            f.overlay.handle_key(egui::Key::Backspace, &mut f.annotations),
            Some(OverlayEvent::Deleted(gone.clone()))
        );
        assert!(f.annotations.get(&gone).is_none());
        assert_eq!(f.overlay.shapes().len(), 1);
        assert_eq!(f.overlay.shapes()[0].id, keep);
    }

    #[test]
    fn slice_change_reloads_only_that_slice() {
        let mut f = Fixture::new(3);
        let on_zero = f.add(0, 10.0, 10.0, 20.0, 20.0);
        f.add(1, 10.0, 10.0, 20.0, 20.0);
        f.add(1, 40.0, 40.0, 20.0, 20.0);
        f.overlay.select(Some(&on_zero), &mut f.annotations);

        f.viewport.set_current_slice(1);
        assert!(f.sync());
        assert_eq!(f.overlay.slice(), Some(1));
        assert_eq!(f.overlay.shapes().len(), 2);
        assert!(f.overlay.shapes().iter().all(|s| !s.selected));
        assert_eq!(f.annotations.current_slice(), 1);
        assert!(f.annotations.selected().is_none());
    }

    #[test]
    fn store_changes_reload_after_debounce() {
        let mut f = Fixture::new(2);
        f.annotations
            .create(AnnotationCreate {
                slice_index: Some(0),
                width: 10.0,
                height: 10.0,
                ..Default::default()
            })
            .unwrap();

        assert!(!f.sync());
        assert!(f.overlay.shapes().is_empty());
        assert!(f.overlay.pending_refresh().is_some());

        f.now += DEBOUNCE / 2;
        assert!(!f.sync());

        f.now += DEBOUNCE;
        assert!(f.sync());
        assert_eq!(f.overlay.shapes().len(), 1);
        assert!(f.overlay.pending_refresh().is_none());
    }

    #[test]
    fn debounced_reload_waits_for_gesture_to_finish() {
        let mut f = Fixture::new(1);
        f.add(0, 10.0, 10.0, 20.0, 20.0);

        f.down(15.0, 15.0);
        f.drag_to(20.0, 20.0);
        // Selecting changed the store; the reload is now due but held back.
        f.sync();
        f.now += DEBOUNCE * 4;
        assert!(!f.sync());
        assert_eq!(f.overlay.shapes()[0].rect.min, pos2(15.0, 15.0));

        f.up(20.0, 20.0);
        f.settle();
        assert_eq!(f.overlay.shapes()[0].rect.min, pos2(15.0, 15.0));
        assert!(f.overlay.shapes()[0].selected);
    }

    #[test]
    fn hover_marks_topmost_shape() {
        let mut f = Fixture::new(1);
        let below = f.add(0, 0.0, 0.0, 50.0, 50.0);
        let above = f.add(0, 20.0, 20.0, 50.0, 50.0);

        f.drag_to(30.0, 30.0);
        assert!(f.annotations.get(&above).unwrap().is_hovered);
        assert!(!f.annotations.get(&below).unwrap().is_hovered);

        f.drag_to(5.0, 5.0);
        assert!(f.annotations.get(&below).unwrap().is_hovered);
        assert!(!f.annotations.get(&above).unwrap().is_hovered);

        f.overlay.pointer_left(&mut f.annotations);
        assert!(f.overlay.shapes().iter().all(|s| !s.hovered));
    }

    #[test]
    fn focus_jumps_to_slice_and_selects() {
        let mut f = Fixture::new(4);
        let id = f.add(3, 10.0, 10.0, 20.0, 20.0);

        f.overlay
            .focus(&id, &mut f.annotations, &mut f.viewport, f.now);
        assert_eq!(f.viewport.current_slice(), 3);
        assert_eq!(f.overlay.selected_shape().map(|s| s.id.clone()), Some(id));
    }
}
