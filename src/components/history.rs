use crate::canvas::{MaskSnapshot, MaskSurface};

// ============================================================================
// HISTORY STACK - Full-buffer snapshots of one mask, newest last
// ============================================================================

/// Undo history for a single mask surface.
///
/// A snapshot is pushed immediately before each stroke begins; undo pops the
/// newest one and makes it the whole buffer again. Growth is unbounded unless
/// limits are configured, in which case the oldest snapshots go first.
#[derive(Debug, Default)]
pub struct HistoryStack {
    entries: Vec<MaskSnapshot>,
    /// `0` = unbounded.
    max_steps: usize,
    /// Optional memory cap in bytes.
    max_memory_bytes: Option<usize>,
    /// Running memory total across all entries.
    total_memory: usize,
}

impl HistoryStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// History that keeps at most `max_steps` entries (`0` = unbounded) and
    /// roughly `max_memory_bytes` of snapshot data.
    pub fn with_limits(max_steps: usize, max_memory_bytes: Option<usize>) -> Self {
        Self {
            max_steps,
            max_memory_bytes,
            ..Self::default()
        }
    }

    pub fn push(&mut self, snapshot: MaskSnapshot) {
        self.total_memory += snapshot.memory_size();
        self.entries.push(snapshot);
        self.prune();
    }

    /// Restore the newest snapshot into `mask`. Returns `false` (and leaves
    /// `mask` untouched) when there is nothing to undo.
    pub fn undo(&mut self, mask: &mut MaskSurface) -> bool {
        let Some(snapshot) = self.entries.pop() else {
            return false;
        };
        self.total_memory = self.total_memory.saturating_sub(snapshot.memory_size());
        mask.restore(snapshot)
    }

    pub fn reset(&mut self) {
        self.entries.clear();
        self.total_memory = 0;
    }

    pub fn can_undo(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bytes held by all snapshots (O(1) via cached total).
    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    fn prune(&mut self) {
        if self.max_steps > 0 {
            while self.entries.len() > self.max_steps {
                let removed = self.entries.remove(0);
                self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
            }
        }

        // Keep at least the newest entry, so the last stroke is always undoable.
        if let Some(max_bytes) = self.max_memory_bytes {
            while self.total_memory > max_bytes && self.entries.len() > 1 {
                let removed = self.entries.remove(0);
                self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Point;

    fn stroke(mask: &mut MaskSurface, history: &mut HistoryStack, from: Point, to: Point) {
        history.push(mask.snapshot());
        mask.begin_stroke(from, 4.0, [0, 255, 0]);
        mask.extend_stroke(to);
        mask.end_stroke();
    }

    #[test]
    fn undo_on_empty_history_is_a_no_op() {
        let mut mask = MaskSurface::new(8, 8);
        let mut history = HistoryStack::new();
        assert!(!history.undo(&mut mask));
        assert!(mask.is_empty());
    }

    #[test]
    fn undo_restores_state_before_latest_stroke() {
        let mut mask = MaskSurface::new(32, 32);
        let mut history = HistoryStack::new();

        stroke(&mut mask, &mut history, Point::new(2.0, 2.0), Point::new(10.0, 2.0));
        let after_a = mask.snapshot();
        stroke(&mut mask, &mut history, Point::new(2.0, 20.0), Point::new(30.0, 20.0));
        assert_ne!(mask.snapshot(), after_a);

        assert!(history.undo(&mut mask));
        assert_eq!(mask.snapshot(), after_a);
        assert_eq!(history.len(), 1);

        assert!(history.undo(&mut mask));
        assert!(mask.is_empty());
        assert!(!history.can_undo());
    }

    #[test]
    fn reset_empties_the_stack() {
        let mut mask = MaskSurface::new(8, 8);
        let mut history = HistoryStack::new();
        stroke(&mut mask, &mut history, Point::new(1.0, 1.0), Point::new(6.0, 6.0));
        history.reset();
        assert!(history.is_empty());
        assert_eq!(history.memory_usage(), 0);
    }

    #[test]
    fn step_limit_drops_oldest() {
        let mut mask = MaskSurface::new(8, 8);
        let mut history = HistoryStack::with_limits(2, None);
        for i in 0..5 {
            let y = i as f32;
            stroke(&mut mask, &mut history, Point::new(0.0, y), Point::new(7.0, y));
        }
        assert_eq!(history.len(), 2);
        assert_eq!(history.memory_usage(), 2 * 8 * 8 * 4);
    }

    #[test]
    fn memory_limit_keeps_newest_entry() {
        let mut mask = MaskSurface::new(8, 8);
        let mut history = HistoryStack::with_limits(0, Some(10));
        stroke(&mut mask, &mut history, Point::new(0.0, 0.0), Point::new(7.0, 7.0));
        stroke(&mut mask, &mut history, Point::new(7.0, 0.0), Point::new(0.0, 7.0));
        assert_eq!(history.len(), 1);
        assert!(history.can_undo());
    }
}
