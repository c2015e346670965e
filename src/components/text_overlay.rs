//! Movable, editable text entities laid over the processed image.
//!
//! Positions are in overlay-container pixels (the on-screen result view);
//! the export renderer projects them into the native raster. All mutation
//! goes through [`TextOverlayStore`], which also owns the single active
//! selection and the one gesture (drag or in-place edit) in progress.

use std::fmt;

use uuid::Uuid;

use crate::canvas::{Point, Size};

/// Stable identifier of a text entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextId(Uuid);

impl TextId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "text-{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextEntity {
    pub id: TextId,
    /// May contain `\n` line breaks.
    pub content: String,
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
    pub font_family: String,
}

/// Placement and styling for a freshly added entity.
#[derive(Clone, Debug, PartialEq)]
pub struct TextDefaults {
    pub content: String,
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
    pub font_family: String,
}

impl Default for TextDefaults {
    fn default() -> Self {
        Self {
            content: "Edit me".to_string(),
            x: 20.0,
            y: 20.0,
            font_size: 48.0,
            font_family: "Inter".to_string(),
        }
    }
}

/// Partial update; `None` fields are left alone.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TextUpdate {
    pub content: Option<String>,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub font_size: Option<f32>,
    pub font_family: Option<String>,
}

impl TextUpdate {
    pub fn position(x: f32, y: f32) -> Self {
        Self { x: Some(x), y: Some(y), ..Self::default() }
    }

    pub fn content(content: impl Into<String>) -> Self {
        Self { content: Some(content.into()), ..Self::default() }
    }

    pub fn font_size(size: f32) -> Self {
        Self { font_size: Some(size), ..Self::default() }
    }

    pub fn font_family(family: impl Into<String>) -> Self {
        Self { font_family: Some(family.into()), ..Self::default() }
    }

    fn apply(self, entity: &mut TextEntity) {
        if let Some(content) = self.content {
            entity.content = content;
        }
        if let Some(x) = self.x {
            entity.x = x;
        }
        if let Some(y) = self.y {
            entity.y = y;
        }
        if let Some(size) = self.font_size {
            entity.font_size = size;
        }
        if let Some(family) = self.font_family {
            entity.font_family = family;
        }
    }
}

/// Keep a box of `entity` size fully inside `container`, per axis.
/// A box larger than the container pins to 0.
pub fn clamp_to_container(pos: Point, entity: Size, container: Size) -> Point {
    Point {
        x: pos.x.min(container.width - entity.width).max(0.0),
        y: pos.y.min(container.height - entity.height).max(0.0),
    }
}

// ============================================================================
// GESTURES
// ============================================================================

/// Drag in progress: `begin` once, `update` zero or more times, `end` once.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragGesture {
    pub id: TextId,
    /// Pointer position relative to the entity's top-left at pointer-down.
    grab_offset: Point,
    entity_size: Size,
    /// Latest resolved (clamped) top-left.
    pub position: Point,
}

impl DragGesture {
    pub fn begin(id: TextId, origin: Point, pointer: Point, entity_size: Size) -> Self {
        Self {
            id,
            grab_offset: Point::new(pointer.x - origin.x, pointer.y - origin.y),
            entity_size,
            position: origin,
        }
    }

    pub fn update(&mut self, pointer: Point, container: Size) -> Point {
        let raw = Point::new(pointer.x - self.grab_offset.x, pointer.y - self.grab_offset.y);
        self.position = clamp_to_container(raw, self.entity_size, container);
        self.position
    }

    pub fn end(mut self, pointer: Point, container: Size) -> Point {
        self.update(pointer, container)
    }
}

/// In-place edit in progress.
#[derive(Clone, Debug, PartialEq)]
pub struct EditSession {
    pub id: TextId,
    draft: String,
    /// Set when editing starts: the next input replaces all content.
    select_all: bool,
}

impl EditSession {
    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn is_all_selected(&self) -> bool {
        self.select_all
    }

    /// Typed input. Replaces the whole draft while everything is selected,
    /// otherwise appends.
    pub fn input(&mut self, text: &str) {
        if self.select_all {
            self.draft.clear();
            self.select_all = false;
        }
        self.draft.push_str(text);
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
        self.select_all = false;
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Gesture {
    #[default]
    Idle,
    Dragging(DragGesture),
    Editing(EditSession),
}

// ============================================================================
// STORE
// ============================================================================

#[derive(Debug, Default)]
pub struct TextOverlayStore {
    entities: Vec<TextEntity>,
    active: Option<TextId>,
    gesture: Gesture,
}

impl TextOverlayStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entity (drawn on top of earlier ones) and make it active.
    pub fn add(&mut self, defaults: &TextDefaults) -> TextId {
        let id = TextId::new();
        self.entities.push(TextEntity {
            id,
            content: defaults.content.clone(),
            x: defaults.x,
            y: defaults.y,
            font_size: defaults.font_size,
            font_family: defaults.font_family.clone(),
        });
        self.active = Some(id);
        id
    }

    pub fn entities(&self) -> &[TextEntity] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, id: TextId) -> Option<&TextEntity> {
        self.entities.iter().find(|t| t.id == id)
    }

    pub fn update(&mut self, id: TextId, update: TextUpdate) -> bool {
        match self.entities.iter_mut().find(|t| t.id == id) {
            Some(entity) => {
                update.apply(entity);
                true
            }
            None => false,
        }
    }

    /// Remove an entity. Deleting the active one clears the selection;
    /// a gesture on it is dropped.
    pub fn delete(&mut self, id: TextId) -> Option<TextEntity> {
        let idx = self.entities.iter().position(|t| t.id == id)?;
        if self.active == Some(id) {
            self.active = None;
        }
        if self.gesture_target() == Some(id) {
            self.gesture = Gesture::Idle;
        }
        Some(self.entities.remove(idx))
    }

    /// Drop every entity, the selection and any gesture.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.active = None;
        self.gesture = Gesture::Idle;
    }

    pub fn active_id(&self) -> Option<TextId> {
        self.active
    }

    pub fn active(&self) -> Option<&TextEntity> {
        self.active.and_then(|id| self.get(id))
    }

    /// Activating one entity deactivates the previous one.
    pub fn set_active(&mut self, id: TextId) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.active = Some(id);
        true
    }

    pub fn gesture(&self) -> &Gesture {
        &self.gesture
    }

    pub fn is_editing(&self, id: TextId) -> bool {
        matches!(&self.gesture, Gesture::Editing(e) if e.id == id)
    }

    fn gesture_target(&self) -> Option<TextId> {
        match &self.gesture {
            Gesture::Idle => None,
            Gesture::Dragging(d) => Some(d.id),
            Gesture::Editing(e) => Some(e.id),
        }
    }

    // -- Drag ---------------------------------------------------------------

    /// Pointer-down on an entity. Ignored while that entity is being edited;
    /// an edit on another entity is committed first (it lost focus).
    pub fn begin_drag(&mut self, id: TextId, pointer: Point, entity_size: Size) -> bool {
        if self.is_editing(id) {
            return false;
        }
        let Some(origin) = self.get(id).map(|t| Point::new(t.x, t.y)) else {
            return false;
        };
        if matches!(self.gesture, Gesture::Editing(_)) {
            self.commit_edit();
        }
        self.active = Some(id);
        self.gesture = Gesture::Dragging(DragGesture::begin(id, origin, pointer, entity_size));
        true
    }

    /// Pointer-move during a drag; returns the clamped live position.
    pub fn update_drag(&mut self, pointer: Point, container: Size) -> Option<Point> {
        match &mut self.gesture {
            Gesture::Dragging(drag) => Some(drag.update(pointer, container)),
            _ => None,
        }
    }

    /// Pointer-up: commit the clamped position and return to idle.
    pub fn end_drag(&mut self, pointer: Point, container: Size) -> Option<Point> {
        let Gesture::Dragging(drag) = std::mem::take(&mut self.gesture) else {
            return None;
        };
        let id = drag.id;
        let pos = drag.end(pointer, container);
        self.update(id, TextUpdate::position(pos.x, pos.y));
        Some(pos)
    }

    // -- Edit ---------------------------------------------------------------

    /// Double-activation: enter in-place editing with all content selected.
    pub fn begin_edit(&mut self, id: TextId) -> Option<&mut EditSession> {
        if matches!(self.gesture, Gesture::Dragging(_)) {
            return None;
        }
        if matches!(&self.gesture, Gesture::Editing(e) if e.id != id) {
            self.commit_edit();
        }
        if !self.is_editing(id) {
            let draft = self.get(id)?.content.clone();
            self.gesture = Gesture::Editing(EditSession { id, draft, select_all: true });
        }
        self.active = Some(id);
        self.edit_mut()
    }

    pub fn edit_mut(&mut self) -> Option<&mut EditSession> {
        match &mut self.gesture {
            Gesture::Editing(edit) => Some(edit),
            _ => None,
        }
    }

    /// Blur: the draft becomes the entity's content.
    pub fn commit_edit(&mut self) -> bool {
        let Gesture::Editing(edit) = std::mem::take(&mut self.gesture) else {
            return false;
        };
        self.update(edit.id, TextUpdate::content(edit.draft))
    }

    /// Delete/backspace key: removes the active entity unless it is being
    /// edited (the key then belongs to the text).
    pub fn delete_key(&mut self) -> Option<TextEntity> {
        let id = self.active?;
        if self.is_editing(id) {
            return None;
        }
        self.delete(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_one() -> (TextOverlayStore, TextId) {
        let mut store = TextOverlayStore::new();
        let id = store.add(&TextDefaults::default());
        (store, id)
    }

    #[test]
    fn add_uses_defaults_and_activates() {
        let (store, id) = store_with_one();
        let t = store.get(id).unwrap();
        assert_eq!(t.content, "Edit me");
        assert_eq!((t.x, t.y, t.font_size), (20.0, 20.0, 48.0));
        assert_eq!(t.font_family, "Inter");
        assert_eq!(store.active_id(), Some(id));
    }

    #[test]
    fn ids_are_unique_and_order_is_creation_order() {
        let mut store = TextOverlayStore::new();
        let a = store.add(&TextDefaults::default());
        let b = store.add(&TextDefaults::default());
        assert_ne!(a, b);
        let ids: Vec<_> = store.entities().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![a, b]);
        assert_eq!(store.active_id(), Some(b));
    }

    #[test]
    fn partial_update_leaves_other_fields() {
        let (mut store, id) = store_with_one();
        assert!(store.update(id, TextUpdate::font_size(72.0)));
        assert!(store.update(id, TextUpdate::font_family("Georgia")));
        let t = store.get(id).unwrap();
        assert_eq!(t.font_size, 72.0);
        assert_eq!(t.font_family, "Georgia");
        assert_eq!(t.content, "Edit me");
        assert_eq!((t.x, t.y), (20.0, 20.0));
    }

    #[test]
    fn drag_outside_container_is_clamped() {
        let (mut store, id) = store_with_one();
        let container = Size::new(500.0, 400.0);
        // Grab at the entity's own corner so the pointer is the target position.
        assert!(store.begin_drag(id, Point::new(20.0, 20.0), Size::new(100.0, 40.0)));
        store.update_drag(Point::new(300.0, 100.0), container);
        let end = store.end_drag(Point::new(550.0, 390.0), container).unwrap();
        assert_eq!(end, Point::new(400.0, 360.0));
        let t = store.get(id).unwrap();
        assert_eq!((t.x, t.y), (400.0, 360.0));
        assert_eq!(store.gesture(), &Gesture::Idle);
    }

    #[test]
    fn drag_keeps_grab_offset_and_clamps_at_origin() {
        let (mut store, id) = store_with_one();
        let container = Size::new(500.0, 400.0);
        store.begin_drag(id, Point::new(30.0, 25.0), Size::new(100.0, 40.0));
        let live = store.update_drag(Point::new(110.0, 65.0), container).unwrap();
        assert_eq!(live, Point::new(100.0, 60.0));
        let end = store.end_drag(Point::new(-40.0, -5.0), container).unwrap();
        assert_eq!(end, Point::new(0.0, 0.0));
    }

    #[test]
    fn end_without_drag_is_none() {
        let (mut store, _) = store_with_one();
        assert!(store.end_drag(Point::new(1.0, 1.0), Size::new(10.0, 10.0)).is_none());
        assert!(store.update_drag(Point::new(1.0, 1.0), Size::new(10.0, 10.0)).is_none());
    }

    #[test]
    fn drag_activates_entity() {
        let mut store = TextOverlayStore::new();
        let a = store.add(&TextDefaults::default());
        let _b = store.add(&TextDefaults::default());
        store.begin_drag(a, Point::new(20.0, 20.0), Size::new(10.0, 10.0));
        assert_eq!(store.active_id(), Some(a));
    }

    #[test]
    fn edit_selects_all_then_commits_on_blur() {
        let (mut store, id) = store_with_one();
        let edit = store.begin_edit(id).unwrap();
        assert!(edit.is_all_selected());
        assert_eq!(edit.draft(), "Edit me");
        edit.input("Hello");
        edit.input("\nWorld");
        assert_eq!(store.get(id).unwrap().content, "Edit me");
        assert!(store.commit_edit());
        assert_eq!(store.get(id).unwrap().content, "Hello\nWorld");
        assert_eq!(store.gesture(), &Gesture::Idle);
    }

    #[test]
    fn pointer_down_while_editing_is_ignored() {
        let (mut store, id) = store_with_one();
        store.begin_edit(id);
        assert!(!store.begin_drag(id, Point::new(20.0, 20.0), Size::new(10.0, 10.0)));
        assert!(store.is_editing(id));
    }

    #[test]
    fn dragging_another_entity_commits_pending_edit() {
        let mut store = TextOverlayStore::new();
        let a = store.add(&TextDefaults::default());
        let b = store.add(&TextDefaults::default());
        store.begin_edit(a).unwrap().set_draft("changed");
        assert!(store.begin_drag(b, Point::new(20.0, 20.0), Size::new(10.0, 10.0)));
        assert_eq!(store.get(a).unwrap().content, "changed");
        assert_eq!(store.active_id(), Some(b));
    }

    #[test]
    fn delete_key_removes_active_unless_editing() {
        let (mut store, id) = store_with_one();
        store.begin_edit(id);
        assert!(store.delete_key().is_none());
        store.commit_edit();

        let removed = store.delete_key().unwrap();
        assert_eq!(removed.id, id);
        assert!(store.is_empty());
        assert_eq!(store.active_id(), None);
        assert!(store.delete_key().is_none());
    }

    #[test]
    fn deleting_inactive_entity_keeps_selection() {
        let mut store = TextOverlayStore::new();
        let a = store.add(&TextDefaults::default());
        let b = store.add(&TextDefaults::default());
        store.delete(a);
        assert_eq!(store.active_id(), Some(b));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn clear_drops_everything() {
        let (mut store, id) = store_with_one();
        store.begin_edit(id);
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.active_id(), None);
        assert_eq!(store.gesture(), &Gesture::Idle);
    }

    #[test]
    fn clamp_pins_oversized_box_to_origin() {
        let p = clamp_to_container(Point::new(30.0, 30.0), Size::new(600.0, 10.0), Size::new(500.0, 400.0));
        assert_eq!(p, Point::new(0.0, 30.0));
    }
}
