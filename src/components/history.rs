use eframe::egui;

use crate::canvas::MaskGrid;

// ============================================================================
// HISTORY MANAGER – two-stack undo/redo over full mask snapshots
// ============================================================================

/// Linear undo/redo history holding full-grid snapshots.
///
/// Every user-initiated mutating gesture (stroke start, fill, clear, mask
/// load) pushes exactly one snapshot of the pre-edit grid *before* mutating,
/// once per gesture, not once per drag event. Pushing invalidates the redo
/// branch, giving standard linear history with no branching.
///
/// Stacks are unbounded: snapshots are bounded by image size and the history
/// lives only as long as one image's editing session.
#[derive(Default)]
pub struct HistoryManager {
    undo_stack: Vec<MaskGrid>,
    redo_stack: Vec<MaskGrid>,
}

impl HistoryManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `current` as the state to restore on the next undo. Clears the
    /// redo stack: a new edit always invalidates redone-away states.
    pub fn push_undo(&mut self, current: &MaskGrid) {
        self.redo_stack.clear();
        self.undo_stack.push(current.clone());
    }

    /// Pop the most recent pre-edit snapshot. `current` is cloned onto the
    /// redo stack so the step can be replayed. Returns `None` (and changes
    /// nothing) when there is nothing to undo.
    pub fn undo(&mut self, current: &MaskGrid) -> Option<MaskGrid> {
        let restored = self.undo_stack.pop()?;
        self.redo_stack.push(current.clone());
        Some(restored)
    }

    /// Symmetric to [`HistoryManager::undo`], replaying a previously undone
    /// state.
    pub fn redo(&mut self, current: &MaskGrid) -> Option<MaskGrid> {
        let restored = self.redo_stack.pop()?;
        self.undo_stack.push(current.clone());
        Some(restored)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    /// Drop both stacks. Called when the active image changes; each image's
    /// editing session is independent.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

// ============================================================================
// HISTORY PANEL – stack-depth readout for the side panel
// ============================================================================

#[derive(Default)]
pub struct HistoryPanel;

impl HistoryPanel {
    pub fn show(&self, ui: &mut egui::Ui, history: &HistoryManager) {
        ui.label(format!(
            "Undo: {} | Redo: {}",
            history.undo_count(),
            history.redo_count()
        ));
        if !history.can_undo() && !history.can_redo() {
            ui.weak("No history yet");
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::brush::stamp_disk;

    #[test]
    fn undo_on_empty_stack_is_a_no_op() {
        let mut history = HistoryManager::new();
        let grid = MaskGrid::new(4, 4);
        assert!(history.undo(&grid).is_none());
        assert!(history.redo(&grid).is_none());
        assert_eq!(history.undo_count(), 0);
        assert_eq!(history.redo_count(), 0);
    }

    #[test]
    fn undo_restores_the_pre_edit_state() {
        let mut history = HistoryManager::new();
        let mut grid = MaskGrid::new(20, 20);

        history.push_undo(&grid);
        stamp_disk(&mut grid, (10, 10), 3, 255);
        assert_eq!(grid.get(10, 10).unwrap(), 255);

        let restored = history.undo(&grid).unwrap();
        assert_eq!(restored.get(10, 10).unwrap(), 0);
        assert!(history.can_redo());
    }

    #[test]
    fn n_edits_then_n_undos_restores_the_original_exactly() {
        let mut history = HistoryManager::new();
        let original = MaskGrid::new(30, 30);
        let mut grid = original.clone();

        for i in 0..5u32 {
            history.push_undo(&grid);
            stamp_disk(&mut grid, (5 + i * 4, 15), 2, 255);
        }
        assert_eq!(history.undo_count(), 5);

        for _ in 0..5 {
            grid = history.undo(&grid).unwrap();
        }
        assert_eq!(grid, original);
        assert_eq!(history.undo_count(), 0);
        assert_eq!(history.redo_count(), 5);
    }

    #[test]
    fn redo_replays_an_undone_edit() {
        let mut history = HistoryManager::new();
        let mut grid = MaskGrid::new(10, 10);

        history.push_undo(&grid);
        stamp_disk(&mut grid, (5, 5), 2, 255);
        let edited = grid.clone();

        grid = history.undo(&grid).unwrap();
        grid = history.redo(&grid).unwrap();
        assert_eq!(grid, edited);
    }

    #[test]
    fn new_edit_empties_the_redo_stack() {
        let mut history = HistoryManager::new();
        let mut grid = MaskGrid::new(10, 10);

        history.push_undo(&grid);
        stamp_disk(&mut grid, (3, 3), 1, 255);
        grid = history.undo(&grid).unwrap();
        assert!(history.can_redo());

        // A fresh edit invalidates the redo branch.
        history.push_undo(&grid);
        stamp_disk(&mut grid, (7, 7), 1, 255);
        assert!(!history.can_redo());

        let before = grid.clone();
        assert!(history.redo(&grid).is_none());
        assert_eq!(grid, before);
    }

    #[test]
    fn snapshots_are_immune_to_later_mutation() {
        let mut history = HistoryManager::new();
        let mut grid = MaskGrid::new(8, 8);
        history.push_undo(&grid);

        // Mutate the live grid heavily after the push.
        grid.fill_all(255);

        let restored = history.undo(&grid).unwrap();
        assert!(restored.as_bytes().iter().all(|&v| v == 0));
    }

    #[test]
    fn clear_drops_both_stacks() {
        let mut history = HistoryManager::new();
        let mut grid = MaskGrid::new(4, 4);
        history.push_undo(&grid);
        stamp_disk(&mut grid, (2, 2), 1, 255);
        let restored = history.undo(&grid).unwrap();
        assert!(history.can_redo());
        history.clear();
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        // Clearing the stacks does not touch grids already handed back.
        assert_eq!(restored.get(2, 2).unwrap(), 0);
    }
}
