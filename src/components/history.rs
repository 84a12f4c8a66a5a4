use std::collections::VecDeque;

use crate::canvas::SelectionMask;
use crate::components::effect_stack::EffectNode;
use crate::ops::adjustments::FilterState;
use crate::ops::selection::MagicWandSettings;
use crate::session::SessionState;

/// Undo depth when none is configured.
pub const DEFAULT_MAX_DEPTH: usize = 100;

// ============================================================================
// COMMAND TRAIT
// ============================================================================

/// Trait for undoable/redoable session edits.
pub trait Command: Send + Sync {
    /// Apply the edit. Called on `run` and again on `redo`.
    fn execute(&self, state: &mut SessionState);
    fn undo(&self, state: &mut SessionState);
    fn description(&self) -> String;
    fn memory_size(&self) -> usize;
}

// ============================================================================
// SESSION COMMAND - Before/after snapshots of one part of the session
// ============================================================================

/// The kinds of session edits that can be undone/redone.
#[derive(Clone, Debug)]
pub enum SessionOperation {
    /// The selection mask changed (wand click, clear, invert).
    Selection {
        label: String,
        before: Option<SelectionMask>,
        after: Option<SelectionMask>,
    },
    /// The base filter state changed.
    Filters { before: FilterState, after: FilterState },
    /// Magic wand settings changed.
    Wand {
        before: MagicWandSettings,
        after: MagicWandSettings,
    },
    /// The effect stack was edited.
    Stack {
        label: String,
        before: Vec<EffectNode>,
        after: Vec<EffectNode>,
    },
    /// A preset replaced both the stack and the filter controls.
    Preset {
        name: String,
        filters_before: FilterState,
        filters_after: FilterState,
        stack_before: Vec<EffectNode>,
        stack_after: Vec<EffectNode>,
    },
}

/// Command wrapping one `SessionOperation`.
pub struct SessionCommand {
    operation: SessionOperation,
}

impl SessionCommand {
    pub fn new(operation: SessionOperation) -> Self {
        Self { operation }
    }
}

fn mask_bytes(mask: &Option<SelectionMask>) -> usize {
    mask.as_ref()
        .map_or(0, |m| m.as_raw().len() + m.border_indices.len() * std::mem::size_of::<u32>())
}

fn stack_bytes(nodes: &[EffectNode]) -> usize {
    nodes.iter().map(EffectNode::memory_size).sum()
}

impl Command for SessionCommand {
    fn execute(&self, state: &mut SessionState) {
        match &self.operation {
            SessionOperation::Selection { after, .. } => state.selection = after.clone(),
            SessionOperation::Filters { after, .. } => state.filters = *after,
            SessionOperation::Wand { after, .. } => {
                state.wand.set_settings(*after);
            }
            SessionOperation::Stack { after, .. } => {
                state.stack.set_stack(after.clone());
            }
            SessionOperation::Preset { filters_after, stack_after, .. } => {
                state.filters = *filters_after;
                state.stack.set_stack(stack_after.clone());
            }
        }
    }

    fn undo(&self, state: &mut SessionState) {
        match &self.operation {
            SessionOperation::Selection { before, .. } => state.selection = before.clone(),
            SessionOperation::Filters { before, .. } => state.filters = *before,
            SessionOperation::Wand { before, .. } => {
                state.wand.set_settings(*before);
            }
            SessionOperation::Stack { before, .. } => {
                state.stack.set_stack(before.clone());
            }
            SessionOperation::Preset { filters_before, stack_before, .. } => {
                state.filters = *filters_before;
                state.stack.set_stack(stack_before.clone());
            }
        }
    }

    fn description(&self) -> String {
        match &self.operation {
            SessionOperation::Selection { label, .. } => label.clone(),
            SessionOperation::Filters { .. } => "Adjust Filters".to_string(),
            SessionOperation::Wand { .. } => "Magic Wand Settings".to_string(),
            SessionOperation::Stack { label, .. } => label.clone(),
            SessionOperation::Preset { name, .. } => format!("Apply Preset: {}", name),
        }
    }

    fn memory_size(&self) -> usize {
        match &self.operation {
            SessionOperation::Selection { label, before, after } => {
                label.len() + mask_bytes(before) + mask_bytes(after)
            }
            SessionOperation::Stack { label, before, after } => {
                label.len() + stack_bytes(before) + stack_bytes(after)
            }
            SessionOperation::Preset { name, stack_before, stack_after, .. } => {
                name.len() + stack_bytes(stack_before) + stack_bytes(stack_after)
            }
            _ => std::mem::size_of::<SessionOperation>(),
        }
    }
}

// ============================================================================
// COMMAND HISTORY - Undo/redo stacks with depth and memory limits
// ============================================================================

/// Undo/redo history. Oldest entries are dropped past `max_depth` or when
/// the snapshots exceed the memory cap.
pub struct CommandHistory {
    undo_stack: VecDeque<Box<dyn Command>>,
    redo_stack: VecDeque<Box<dyn Command>>,
    max_depth: usize,
    /// Optional memory cap in bytes.
    max_memory_bytes: Option<usize>,
    /// Running memory total across both stacks.
    total_memory: usize,
}

impl Default for CommandHistory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl CommandHistory {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_depth,
            max_memory_bytes: Some(100 * 1024 * 1024), // 100 MB of snapshots
            total_memory: 0,
        }
    }

    pub fn with_memory_limit(mut self, max_bytes: Option<usize>) -> Self {
        self.max_memory_bytes = max_bytes;
        self.prune();
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Execute `command`, record it, and drop the redo stack.
    pub fn run(&mut self, command: Box<dyn Command>, state: &mut SessionState) {
        command.execute(state);
        crate::log_info!("history: {}", command.description());

        for cmd in self.redo_stack.drain(..) {
            self.total_memory = self.total_memory.saturating_sub(cmd.memory_size());
        }

        self.total_memory += command.memory_size();
        self.undo_stack.push_back(command);
        self.prune();
    }

    pub fn undo(&mut self, state: &mut SessionState) -> Option<String> {
        let command = self.undo_stack.pop_back()?;
        let description = command.description();
        command.undo(state);
        crate::log_info!("history: undo {}", description);
        self.redo_stack.push_back(command);
        Some(description)
    }

    pub fn redo(&mut self, state: &mut SessionState) -> Option<String> {
        let command = self.redo_stack.pop_back()?;
        let description = command.description();
        command.execute(state);
        crate::log_info!("history: redo {}", description);
        self.undo_stack.push_back(command);
        Some(description)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_description(&self) -> Option<String> {
        self.undo_stack.back().map(|c| c.description())
    }

    pub fn redo_description(&self) -> Option<String> {
        self.redo_stack.back().map(|c| c.description())
    }

    /// All undo descriptions, most recent first.
    pub fn undo_history(&self) -> Vec<String> {
        self.undo_stack.iter().rev().map(|c| c.description()).collect()
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.total_memory = 0;
    }

    fn prune(&mut self) {
        while self.undo_stack.len() > self.max_depth {
            if let Some(removed) = self.undo_stack.pop_front() {
                self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
            }
        }

        if let Some(max_bytes) = self.max_memory_bytes {
            while self.total_memory > max_bytes && self.undo_stack.len() > 1 {
                if let Some(removed) = self.undo_stack.pop_front() {
                    self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn state() -> SessionState {
        SessionState::new(RgbaImage::new(4, 4))
    }

    fn filters(brightness: f32) -> FilterState {
        FilterState { brightness, ..Default::default() }
    }

    fn set_brightness(state: &SessionState, value: f32) -> Box<dyn Command> {
        Box::new(SessionCommand::new(SessionOperation::Filters {
            before: state.filters,
            after: filters(value),
        }))
    }

    #[test]
    fn run_undo_redo_round_trip() {
        let mut st = state();
        let mut history = CommandHistory::default();
        assert_eq!(history.undo(&mut st), None);

        let cmd = set_brightness(&st, 0.5);
        history.run(cmd, &mut st);
        assert_eq!(st.filters.brightness, 0.5);
        assert!(history.can_undo());

        assert_eq!(history.undo(&mut st).as_deref(), Some("Adjust Filters"));
        assert_eq!(st.filters.brightness, 0.0);
        assert!(history.can_redo());

        assert_eq!(history.redo(&mut st).as_deref(), Some("Adjust Filters"));
        assert_eq!(st.filters.brightness, 0.5);
        assert!(!history.can_redo());
    }

    #[test]
    fn new_command_clears_redo() {
        let mut st = state();
        let mut history = CommandHistory::default();
        let a = set_brightness(&st, 0.1);
        history.run(a, &mut st);
        history.undo(&mut st);
        let b = set_brightness(&st, 0.2);
        history.run(b, &mut st);
        assert!(!history.can_redo());
        assert_eq!(history.redo(&mut st), None);
    }

    #[test]
    fn depth_limit_drops_oldest() {
        let mut st = state();
        let mut history = CommandHistory::new(3);
        for i in 0..5 {
            let label = format!("edit {}", i);
            let cmd = Box::new(SessionCommand::new(SessionOperation::Stack {
                label,
                before: Vec::new(),
                after: Vec::new(),
            }));
            history.run(cmd, &mut st);
        }
        assert_eq!(history.max_depth(), 3);
        assert_eq!(history.undo_count(), 3);
        assert_eq!(history.undo_history(), vec!["edit 4", "edit 3", "edit 2"]);
    }

    fn select_8x8(label: &str) -> Box<dyn Command> {
        Box::new(SessionCommand::new(SessionOperation::Selection {
            label: label.to_string(),
            before: None,
            after: Some(SelectionMask::empty(8, 8)),
        }))
    }

    #[test]
    fn memory_cap_drops_oldest_snapshots() {
        let mut st = state();
        // Each entry: 6-byte label + 64-byte mask = 70 bytes.
        let mut history = CommandHistory::default().with_memory_limit(Some(200));
        for i in 0..5 {
            history.run(select_8x8(&format!("mask {}", i)), &mut st);
        }
        assert_eq!(history.undo_count(), 2);
        assert_eq!(history.undo_history(), vec!["mask 4", "mask 3"]);
        assert!(history.memory_usage() <= 200);
        assert_eq!(history.memory_usage(), 140);
    }

    #[test]
    fn memory_cap_keeps_the_newest_entry() {
        let mut st = state();
        let mut history = CommandHistory::default().with_memory_limit(Some(10));
        history.run(select_8x8("first"), &mut st);
        history.run(select_8x8("second"), &mut st);
        assert_eq!(history.undo_count(), 1);
        assert_eq!(history.undo_description().as_deref(), Some("second"));
        assert_eq!(history.undo(&mut st).as_deref(), Some("second"));
        assert!(st.selection.is_none());
    }

    #[test]
    fn lifting_the_cap_keeps_everything_up_to_depth() {
        let mut st = state();
        let mut history = CommandHistory::new(4).with_memory_limit(None);
        for i in 0..6 {
            history.run(select_8x8(&format!("mask {}", i)), &mut st);
        }
        assert_eq!(history.undo_count(), 4);
        assert_eq!(history.memory_usage(), 4 * 70);
    }

    #[test]
    fn memory_usage_tracks_both_stacks() {
        let mut st = state();
        let mut history = CommandHistory::default();
        let mask = SelectionMask::empty(4, 4);
        let cmd = Box::new(SessionCommand::new(SessionOperation::Selection {
            label: "Select".to_string(),
            before: None,
            after: Some(mask),
        }));
        history.run(cmd, &mut st);
        let used = history.memory_usage();
        assert!(used >= 16);
        history.undo(&mut st);
        assert_eq!(history.memory_usage(), used);
        history.clear();
        assert_eq!(history.memory_usage(), 0);
    }
}
