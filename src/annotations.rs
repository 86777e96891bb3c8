//! Per-slice ROI annotation store.
//!
//! Holds every annotation of the loaded study, tracks the single selected
//! annotation and queues an [`AnnotationEvent`] for each mutation. The full
//! collection is written to the key/value store after every persistent change
//! when auto-save is on; transient flags (selected, hovered) never survive a
//! reload or an import.

use anyhow::{ensure, Context, Result};
use chrono::Utc;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::config::AnnotationConfig;
use crate::consts::{ANNOTATIONS_KEY, EXPORT_VERSION, MIN_SIZE};
use crate::model::{
    Annotation, AnnotationAction, AnnotationCreate, AnnotationEvent, AnnotationExport,
    AnnotationStats, AnnotationUpdate, SliceStats,
};
use crate::storage::KeyValueStore;

pub struct AnnotationStore {
    annotations: Vec<Annotation>,
    selected: Option<String>,
    current_slice: usize,
    total_slices: usize,
    events: Vec<AnnotationEvent>,
    revision: u64,
    next_seq: u64,
    storage: Box<dyn KeyValueStore>,
    auto_save: bool,
    max_per_slice: usize,
}

impl AnnotationStore {
    pub fn new(storage: Box<dyn KeyValueStore>, config: &AnnotationConfig) -> Self {
        let mut store = Self {
            annotations: Vec::new(),
            selected: None,
            current_slice: 0,
            total_slices: 0,
            events: Vec::new(),
            revision: 0,
            next_seq: 0,
            storage,
            auto_save: config.enable_auto_save,
            max_per_slice: config.max_annotations_per_slice,
        };
        store.load();
        store
    }

    // ── Mutations ───────────────────────────────────────────────────────────

    pub fn create(&mut self, data: AnnotationCreate) -> Result<Annotation> {
        ensure!(
            data.width.is_finite() && data.height.is_finite(),
            "annotation size must be finite"
        );
        ensure!(
            data.width >= MIN_SIZE && data.height >= MIN_SIZE,
            "annotation {}x{} is smaller than the minimum of {MIN_SIZE}px",
            data.width,
            data.height
        );
        let slice_index = data.slice_index.unwrap_or(self.current_slice);
        ensure!(
            slice_index < self.total_slices,
            "slice {} does not exist ({} loaded)",
            slice_index + 1,
            self.total_slices
        );
        ensure!(
            self.slice_count(slice_index) < self.max_per_slice,
            "slice {} already holds the maximum of {} annotations",
            slice_index + 1,
            self.max_per_slice
        );

        let annotation = Annotation {
            id: self.generate_id(),
            slice_index,
            x: data.x,
            y: data.y,
            width: data.width,
            height: data.height,
            label: data.label,
            description: data.description,
            timestamp: Utc::now(),
            is_selected: false,
            is_hovered: false,
        };
        log::debug!(
            "Created annotation {} on slice {}",
            annotation.id,
            slice_index
        );

        self.annotations.push(annotation.clone());
        self.emit(AnnotationAction::Create, annotation.clone(), None);
        self.persist();
        Ok(annotation)
    }

    /// Returns `false` when no annotation has `update.id`.
    pub fn update(&mut self, update: AnnotationUpdate) -> bool {
        let Some(index) = self.index_of(&update.id) else {
            return false;
        };

        let previous = self.annotations[index].clone();
        let ann = &mut self.annotations[index];
        if let Some(x) = update.x {
            ann.x = x;
        }
        if let Some(y) = update.y {
            ann.y = y;
        }
        if let Some(width) = update.width {
            ann.width = width.max(MIN_SIZE);
        }
        if let Some(height) = update.height {
            ann.height = height.max(MIN_SIZE);
        }
        if update.label.is_some() {
            ann.label = update.label;
        }
        if update.description.is_some() {
            ann.description = update.description;
        }
        ann.timestamp = Utc::now();
        let updated = ann.clone();

        log::debug!("Updated annotation {}", updated.id);
        self.emit(AnnotationAction::Update, updated, Some(previous));
        self.persist();
        true
    }

    pub fn delete(&mut self, id: &str) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };

        let removed = self.annotations.remove(index);
        if self.selected.as_deref() == Some(id) {
            self.selected = None;
        }
        log::debug!("Deleted annotation {}", removed.id);
        self.emit(AnnotationAction::Delete, removed, None);
        self.persist();
        true
    }

    /// Select `id`, or clear the selection with `None`. At most one annotation
    /// is selected at a time; an unknown id leaves nothing selected.
    pub fn select(&mut self, id: Option<&str>) {
        if let Some(previous) = self.selected.take() {
            if let Some(index) = self.index_of(&previous) {
                self.annotations[index].is_selected = false;
                let ann = self.annotations[index].clone();
                self.emit(AnnotationAction::Deselect, ann, None);
            }
        }

        if let Some(id) = id {
            if let Some(index) = self.index_of(id) {
                self.annotations[index].is_selected = true;
                self.selected = Some(id.to_owned());
                let ann = self.annotations[index].clone();
                self.emit(AnnotationAction::Select, ann, None);
            }
        }
        self.revision += 1;
    }

    pub fn set_hover(&mut self, id: &str, hovered: bool) {
        if let Some(index) = self.index_of(id) {
            if self.annotations[index].is_hovered != hovered {
                self.annotations[index].is_hovered = hovered;
                self.revision += 1;
            }
        }
    }

    pub fn clear_hover(&mut self) {
        let mut changed = false;
        for ann in self.annotations.iter_mut().filter(|a| a.is_hovered) {
            ann.is_hovered = false;
            changed = true;
        }
        if changed {
            self.revision += 1;
        }
    }

    pub fn clear_all(&mut self) {
        log::info!("Clearing all annotations across all slices");
        self.annotations.clear();
        self.selected = None;
        self.revision += 1;
        self.persist();
    }

    pub fn clear_slice(&mut self, slice_index: usize) {
        log::info!("Clearing annotations for slice {}", slice_index + 1);
        self.annotations.retain(|a| a.slice_index != slice_index);
        if self
            .selected
            .as_deref()
            .is_some_and(|id| self.index_of(id).is_none())
        {
            self.selected = None;
        }
        self.revision += 1;
        self.persist();
    }

    pub fn clear_current_slice(&mut self) {
        self.clear_slice(self.current_slice);
    }

    /// Moving to another slice drops the selection.
    pub fn set_current_slice(&mut self, slice_index: usize) {
        if self.current_slice != slice_index {
            self.current_slice = slice_index;
            self.select(None);
        }
    }

    /// Number of slices in the loaded series; new annotations must fall inside it.
    pub fn set_total_slices(&mut self, total: usize) {
        self.total_slices = total;
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    pub fn current_slice(&self) -> usize {
        self.current_slice
    }

    pub fn total_slices(&self) -> usize {
        self.total_slices
    }

    pub fn all(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn get(&self, id: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.id == id)
    }

    pub fn selected(&self) -> Option<&Annotation> {
        self.selected.as_deref().and_then(|id| self.get(id))
    }

    pub fn for_slice(&self, slice_index: usize) -> impl Iterator<Item = &Annotation> {
        self.annotations
            .iter()
            .filter(move |a| a.slice_index == slice_index)
    }

    pub fn current_slice_annotations(&self) -> Vec<&Annotation> {
        self.for_slice(self.current_slice).collect()
    }

    pub fn slice_count(&self, slice_index: usize) -> usize {
        self.for_slice(slice_index).count()
    }

    pub fn has_annotations_on_slice(&self, slice_index: usize) -> bool {
        self.for_slice(slice_index).next().is_some()
    }

    pub fn stats(&self) -> AnnotationStats {
        let slices: BTreeSet<usize> = self.annotations.iter().map(|a| a.slice_index).collect();
        let total_count = self.annotations.len();
        AnnotationStats {
            total_count,
            slices_with_annotations: slices.len(),
            average_per_slice: if slices.is_empty() {
                0.0
            } else {
                total_count as f32 / slices.len() as f32
            },
        }
    }

    pub fn slice_stats(&self) -> BTreeMap<usize, SliceStats> {
        let selected = self.selected.as_deref();
        let mut stats: BTreeMap<usize, SliceStats> = BTreeMap::new();
        for ann in &self.annotations {
            let entry = stats.entry(ann.slice_index).or_default();
            entry.count += 1;
            if selected == Some(ann.id.as_str()) {
                entry.has_selected = true;
            }
        }
        stats
    }

    /// Increases on every change, including selection and hover.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn take_events(&mut self) -> Vec<AnnotationEvent> {
        std::mem::take(&mut self.events)
    }

    // ── Import / export ─────────────────────────────────────────────────────

    pub fn export_json(&self) -> Result<String> {
        let export = AnnotationExport {
            version: EXPORT_VERSION.to_owned(),
            timestamp: Utc::now(),
            annotations: self.annotations.clone(),
        };
        serde_json::to_string_pretty(&export).context("serializing annotations")
    }

    /// Replaces the whole collection. On error nothing changes. Records below
    /// the minimum size and repeated ids are dropped with a warning.
    pub fn import_json(&mut self, json: &str) -> Result<usize> {
        #[derive(Deserialize)]
        struct ImportFile {
            annotations: Option<Vec<Annotation>>,
        }

        let file: ImportFile = serde_json::from_str(json).context("parsing annotation file")?;
        let mut annotations = file
            .annotations
            .context("Invalid annotation format: missing `annotations` array")?;
        annotations.iter_mut().for_each(Annotation::clear_transient);

        let mut seen = HashSet::new();
        let before = annotations.len();
        annotations.retain(|a| {
            let sized = a.width.is_finite()
                && a.height.is_finite()
                && a.width >= MIN_SIZE
                && a.height >= MIN_SIZE;
            if !sized {
                log::warn!(
                    "Skipping imported {}: {}x{} is below minimum size",
                    a.id,
                    a.width,
                    a.height
                );
                return false;
            }
            if !seen.insert(a.id.clone()) {
                log::warn!("Skipping imported {}: duplicate id", a.id);
                return false;
            }
            true
        });
        if annotations.len() < before {
            log::warn!("Dropped {} invalid imported annotations", before - annotations.len());
        }

        let count = annotations.len();
        self.annotations = annotations;
        self.selected = None;
        self.revision += 1;
        log::info!("Imported {count} annotations");
        self.persist();
        Ok(count)
    }

    // ── Persistence ─────────────────────────────────────────────────────────

    pub fn save(&self) -> Result<()> {
        let data =
            serde_json::to_string(&self.annotations).context("serializing annotations")?;
        self.storage.set(ANNOTATIONS_KEY, &data)
    }

    fn persist(&self) {
        if !self.auto_save {
            return;
        }
        if let Err(e) = self.save() {
            log::error!("Error saving annotations: {:#}", e);
        }
    }

    fn load(&mut self) {
        let loaded = self
            .storage
            .get(ANNOTATIONS_KEY)
            .and_then(|data| match data {
                Some(data) => serde_json::from_str::<Vec<Annotation>>(&data)
                    .map(Some)
                    .context("parsing stored annotations"),
                None => Ok(None),
            });
        match loaded {
            Ok(Some(mut annotations)) => {
                annotations.iter_mut().for_each(Annotation::clear_transient);
                log::info!("Loaded {} stored annotations", annotations.len());
                self.annotations = annotations;
            }
            Ok(None) => {}
            Err(e) => {
                log::error!("Error loading annotations: {:#}", e);
                self.annotations.clear();
            }
        }
    }

    // ── Internals ───────────────────────────────────────────────────────────

    fn index_of(&self, id: &str) -> Option<usize> {
        self.annotations.iter().position(|a| a.id == id)
    }

    fn emit(&mut self, action: AnnotationAction, annotation: Annotation, previous: Option<Annotation>) {
        self.revision += 1;
        self.events.push(AnnotationEvent {
            action,
            annotation,
            previous,
        });
    }

    fn generate_id(&mut self) -> String {
        let millis = Utc::now().timestamp_millis();
        loop {
            self.next_seq += 1;
            let id = format!("annotation_{}_{}", millis, to_base36(self.next_seq));
            if self.index_of(&id).is_none() {
                return id;
            }
        }
    }
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut out = Vec::new();
    loop {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
        if n == 0 {
            break;
        }
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn store_with(storage: &MemoryStore) -> AnnotationStore {
        let mut store =
            AnnotationStore::new(Box::new(storage.clone()), &AnnotationConfig::default());
        store.set_total_slices(10);
        store
    }

    fn rect(x: f32, y: f32, w: f32, h: f32) -> AnnotationCreate {
        AnnotationCreate {
            x,
            y,
            width: w,
            height: h,
            ..Default::default()
        }
    }

    #[test]
    fn create_assigns_unique_ids_and_current_slice() {
        let mut store = store_with(&MemoryStore::new());
        store.set_current_slice(4);

        let a = store.create(rect(0.0, 0.0, 10.0, 10.0)).unwrap();
        let b = store.create(rect(5.0, 5.0, 20.0, 20.0)).unwrap();
        let c = store
            .create(AnnotationCreate {
                slice_index: Some(1),
                ..rect(1.0, 1.0, 6.0, 6.0)
            })
            .unwrap();

        assert_ne!(a.id, b.id);
        assert_ne!(b.id, c.id);
        assert!(a.id.starts_with("annotation_"));
        assert_eq!(a.slice_index, 4);
        assert_eq!(b.slice_index, 4);
        assert_eq!(c.slice_index, 1);
        assert!(!a.is_selected && !a.is_hovered);
        assert_eq!(store.slice_count(4), 2);
        assert_eq!(store.current_slice_annotations().len(), 2);
    }

    #[test]
    fn create_rejects_tiny_rectangles_and_full_slices() {
        let storage = MemoryStore::new();
        let config = AnnotationConfig {
            max_annotations_per_slice: 2,
            ..Default::default()
        };
        let mut store = AnnotationStore::new(Box::new(storage), &config);
        store.set_total_slices(1);

        assert!(store.create(rect(0.0, 0.0, 4.0, 50.0)).is_err());
        assert!(store.create(rect(0.0, 0.0, 50.0, f32::NAN)).is_err());
        store.create(rect(0.0, 0.0, 5.0, 5.0)).unwrap();
        store.create(rect(0.0, 0.0, 5.0, 5.0)).unwrap();
        assert!(store.create(rect(0.0, 0.0, 5.0, 5.0)).is_err());
        assert_eq!(store.all().len(), 2);
    }

    #[test]
    fn update_unknown_id_fails_without_changes() {
        let mut store = store_with(&MemoryStore::new());
        store.create(rect(0.0, 0.0, 10.0, 10.0)).unwrap();
        let before = store.all().to_vec();
        let revision = store.revision();

        let ok = store.update(AnnotationUpdate {
            x: Some(99.0),
            ..AnnotationUpdate::new("nope")
        });

        assert!(!ok);
        assert_eq!(store.all(), before.as_slice());
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn update_merges_fields_and_keeps_label() {
        let mut store = store_with(&MemoryStore::new());
        let ann = store
            .create(AnnotationCreate {
                label: Some("1-1".into()),
                ..rect(0.0, 0.0, 10.0, 10.0)
            })
            .unwrap();
        store.take_events();

        let ok = store.update(AnnotationUpdate {
            x: Some(3.0),
            width: Some(2.0),
            ..AnnotationUpdate::new(ann.id.clone())
        });
        assert!(ok);

        let updated = store.get(&ann.id).unwrap();
        assert_eq!(updated.x, 3.0);
        assert_eq!(updated.y, 0.0);
        assert_eq!(updated.width, MIN_SIZE);
        assert_eq!(updated.label.as_deref(), Some("1-1"));
        assert!(updated.timestamp >= ann.timestamp);

        let events = store.take_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, AnnotationAction::Update);
        assert_eq!(events[0].previous.as_ref().unwrap().x, 0.0);
    }

    #[test]
    fn selecting_deselects_previous() {
        let mut store = store_with(&MemoryStore::new());
        let a = store.create(rect(0.0, 0.0, 10.0, 10.0)).unwrap();
        let b = store.create(rect(0.0, 0.0, 10.0, 10.0)).unwrap();
        store.take_events();

        store.select(Some(&a.id));
        store.select(Some(&b.id));

        let selected: Vec<_> = store.all().iter().filter(|a| a.is_selected).collect();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, b.id);
        assert_eq!(store.selected().map(|a| a.id.as_str()), Some(b.id.as_str()));

        let actions: Vec<_> = store.take_events().into_iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![
                AnnotationAction::Select,
                AnnotationAction::Deselect,
                AnnotationAction::Select
            ]
        );

        store.select(Some("missing"));
        assert!(store.selected().is_none());
        assert!(store.all().iter().all(|a| !a.is_selected));
    }

    #[test]
    fn delete_clears_selection() {
        let mut store = store_with(&MemoryStore::new());
        let a = store.create(rect(0.0, 0.0, 10.0, 10.0)).unwrap();
        store.select(Some(&a.id));

        assert!(store.delete(&a.id));
        assert!(store.selected().is_none());
        assert!(!store.delete(&a.id));
        assert!(store.all().is_empty());
    }

    #[test]
    fn changing_slice_drops_selection() {
        let mut store = store_with(&MemoryStore::new());
        let a = store.create(rect(0.0, 0.0, 10.0, 10.0)).unwrap();
        store.select(Some(&a.id));

        store.set_current_slice(0);
        assert!(store.selected().is_some());
        store.set_current_slice(1);
        assert!(store.selected().is_none());
    }

    #[test]
    fn clear_slice_only_touches_that_slice() {
        let mut store = store_with(&MemoryStore::new());
        let keep = store
            .create(AnnotationCreate {
                slice_index: Some(2),
                ..rect(0.0, 0.0, 10.0, 10.0)
            })
            .unwrap();
        let gone = store.create(rect(0.0, 0.0, 10.0, 10.0)).unwrap();
        store.select(Some(&gone.id));

        store.clear_current_slice();
        assert_eq!(store.all().len(), 1);
        assert_eq!(store.all()[0].id, keep.id);
        assert!(store.selected().is_none());

        store.clear_all();
        assert!(store.all().is_empty());
    }

    #[test]
    fn stats_count_annotated_slices() {
        let mut store = store_with(&MemoryStore::new());
        for slice in [0, 0, 0, 3] {
            store
                .create(AnnotationCreate {
                    slice_index: Some(slice),
                    ..rect(0.0, 0.0, 10.0, 10.0)
                })
                .unwrap();
        }
        let last = store.all()[3].id.clone();
        store.select(Some(&last));

        let stats = store.stats();
        assert_eq!(stats.total_count, 4);
        assert_eq!(stats.slices_with_annotations, 2);
        assert_eq!(stats.average_per_slice, 2.0);

        let per_slice = store.slice_stats();
        assert_eq!(per_slice[&0], SliceStats { count: 3, has_selected: false });
        assert_eq!(per_slice[&3], SliceStats { count: 1, has_selected: true });
        assert!(store.has_annotations_on_slice(3));
        assert!(!store.has_annotations_on_slice(1));
    }

    #[test]
    fn reload_restores_collection_without_transient_flags() {
        let storage = MemoryStore::new();
        let id = {
            let mut store = store_with(&storage);
            let ann = store.create(rect(1.0, 2.0, 30.0, 40.0)).unwrap();
            store.select(Some(&ann.id));
            store.set_hover(&ann.id, true);
            // Selection changes are not persisted on their own; force a write.
            store.save().unwrap();
            ann.id
        };

        let store = store_with(&storage);
        let ann = store.get(&id).unwrap();
        assert_eq!((ann.x, ann.y, ann.width, ann.height), (1.0, 2.0, 30.0, 40.0));
        assert!(!ann.is_selected);
        assert!(!ann.is_hovered);
        assert!(store.selected().is_none());
    }

    #[test]
    fn corrupt_storage_starts_empty() {
        let storage = MemoryStore::new();
        storage.set(ANNOTATIONS_KEY, "[{broken").unwrap();
        let store = store_with(&storage);
        assert!(store.all().is_empty());
    }

    #[test]
    fn auto_save_off_waits_for_explicit_save() {
        let storage = MemoryStore::new();
        let config = AnnotationConfig {
            enable_auto_save: false,
            ..Default::default()
        };
        let mut store = AnnotationStore::new(Box::new(storage.clone()), &config);
        store.set_total_slices(1);
        store.create(rect(0.0, 0.0, 10.0, 10.0)).unwrap();
        assert_eq!(storage.get(ANNOTATIONS_KEY).unwrap(), None);

        store.save().unwrap();
        assert!(storage.get(ANNOTATIONS_KEY).unwrap().is_some());
    }

    #[test]
    fn export_then_import_round_trips_persisted_fields() {
        let mut source = store_with(&MemoryStore::new());
        let a = source
            .create(AnnotationCreate {
                slice_index: Some(7),
                label: Some("8-1".into()),
                description: Some("Bounding box annotation on slice 8".into()),
                ..rect(10.5, 20.0, 30.0, 40.25)
            })
            .unwrap();
        source.create(rect(0.0, 0.0, 5.0, 5.0)).unwrap();
        source.select(Some(&a.id));
        source.set_hover(&a.id, true);

        let json = source.export_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["version"], EXPORT_VERSION);
        assert_eq!(value["annotations"][0]["isSelected"], true);

        let mut target = store_with(&MemoryStore::new());
        assert_eq!(target.import_json(&json).unwrap(), 2);

        for (orig, imported) in source.all().iter().zip(target.all()) {
            assert_eq!(imported.id, orig.id);
            assert_eq!(imported.slice_index, orig.slice_index);
            assert_eq!(
                (imported.x, imported.y, imported.width, imported.height),
                (orig.x, orig.y, orig.width, orig.height)
            );
            assert_eq!(imported.label, orig.label);
            assert_eq!(imported.description, orig.description);
            assert_eq!(imported.timestamp, orig.timestamp);
            assert!(!imported.is_selected);
            assert!(!imported.is_hovered);
        }
        assert!(target.selected().is_none());
    }

    #[test]
    fn invalid_import_leaves_collection_untouched() {
        let mut store = store_with(&MemoryStore::new());
        store.create(rect(0.0, 0.0, 10.0, 10.0)).unwrap();

        assert!(store.import_json("not json").is_err());
        assert!(store.import_json(r#"{"version":"1.0"}"#).is_err());
        assert!(store.import_json(r#"{"annotations":{}}"#).is_err());
        assert_eq!(store.all().len(), 1);
    }

    #[test]
    fn create_requires_an_existing_slice() {
        let mut store =
            AnnotationStore::new(Box::new(MemoryStore::new()), &AnnotationConfig::default());
        let on_999 = AnnotationCreate {
            slice_index: Some(999),
            ..rect(0.0, 0.0, 10.0, 10.0)
        };

        assert!(store.create(on_999.clone()).is_err());
        assert!(store.create(rect(0.0, 0.0, 10.0, 10.0)).is_err());

        store.set_total_slices(3);
        assert!(store.create(on_999).is_err());
        assert!(store
            .create(AnnotationCreate {
                slice_index: Some(3),
                ..rect(0.0, 0.0, 10.0, 10.0)
            })
            .is_err());
        assert_eq!(
            store
                .create(AnnotationCreate {
                    slice_index: Some(2),
                    ..rect(0.0, 0.0, 10.0, 10.0)
                })
                .unwrap()
                .slice_index,
            2
        );
        assert_eq!(store.all().len(), 1);
    }

    #[test]
    fn import_drops_undersized_and_duplicate_records() {
        let json = r#"{
            "version": "1.0",
            "annotations": [
                {"id": "a", "sliceIndex": 0, "x": 0, "y": 0, "width": 10, "height": 10,
                 "timestamp": "2024-05-01T10:00:00Z"},
                {"id": "tiny", "sliceIndex": 0, "x": 0, "y": 0, "width": 2, "height": 10,
                 "timestamp": "2024-05-01T10:00:00Z"},
                {"id": "a", "sliceIndex": 1, "x": 5, "y": 5, "width": 20, "height": 20,
                 "timestamp": "2024-05-01T10:00:00Z"},
                {"id": "b", "sliceIndex": 4, "x": 1, "y": 1, "width": 5, "height": 5,
                 "timestamp": "2024-05-01T10:00:00Z"}
            ]
        }"#;
        let mut store = store_with(&MemoryStore::new());

        assert_eq!(store.import_json(json).unwrap(), 2);
        let ids: Vec<_> = store.all().iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(store.get("a").unwrap().slice_index, 0);
    }

    #[test]
    fn base36_encoding() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }
}
