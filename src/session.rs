use image::{GrayImage, RgbaImage};
use uuid::Uuid;

use crate::canvas::{EngineError, PixelBuffer, SelectionMask};
use crate::components::effect_stack::EffectStack;
use crate::components::history::{CommandHistory, SessionCommand, SessionOperation, DEFAULT_MAX_DEPTH};
use crate::components::presets::Preset;
use crate::components::render_graph::execute_schedule;
use crate::gpu::FilterUniforms;
use crate::ops::adjustments::{apply_filters, FilterState};
use crate::ops::crop::{crop_buffer, CropRect};
use crate::ops::selection::{MagicWandSettings, SelectionEngine};

/// Everything an undoable edit can touch.
#[derive(Clone, Debug)]
pub struct SessionState {
    /// Pristine input. Rendering never writes to it.
    pub source: PixelBuffer,
    pub selection: Option<SelectionMask>,
    /// Base filter values, before the stack's channel amounts are merged in.
    pub filters: FilterState,
    pub wand: SelectionEngine,
    pub stack: EffectStack,
}

impl SessionState {
    pub fn new(source: PixelBuffer) -> Self {
        Self {
            source,
            selection: None,
            filters: FilterState::default(),
            wand: SelectionEngine::default(),
            stack: EffectStack::new(),
        }
    }

    fn mask_pixels(&self) -> Option<&GrayImage> {
        self.selection.as_ref().map(|m| &m.pixels)
    }
}

/// One open image and its edit history. The only writer of its state.
pub struct EditSession {
    pub id: Uuid,
    /// Display name (file name or "Untitled").
    pub name: String,
    state: SessionState,
    history: CommandHistory,
    is_dirty: bool,
}

impl EditSession {
    pub fn new(source: PixelBuffer) -> Self {
        Self::with_history_depth(source, DEFAULT_MAX_DEPTH)
    }

    pub fn with_history_depth(source: PixelBuffer, max_depth: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: "Untitled".to_string(),
            state: SessionState::new(source),
            history: CommandHistory::new(max_depth),
            is_dirty: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn source(&self) -> &PixelBuffer {
        &self.state.source
    }

    pub fn selection(&self) -> Option<&SelectionMask> {
        self.state.selection.as_ref()
    }

    pub fn filters(&self) -> &FilterState {
        &self.state.filters
    }

    pub fn wand_settings(&self) -> &MagicWandSettings {
        self.state.wand.settings()
    }

    pub fn stack(&self) -> &EffectStack {
        &self.state.stack
    }

    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    fn record(&mut self, operation: SessionOperation) {
        self.history.run(Box::new(SessionCommand::new(operation)), &mut self.state);
        self.is_dirty = true;
    }

    // ------------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------------

    /// Magic wand click at (x, y) using the current wand settings and mode.
    pub fn magic_wand(&mut self, x: u32, y: u32) -> Result<&SelectionMask, EngineError> {
        let mask = self.state.wand.select_with_mode(&self.state.source, x, y, self.state.selection.as_ref())?;
        let label = format!("Magic Wand ({})", self.state.wand.settings().mode.label());
        self.record(SessionOperation::Selection {
            label,
            before: self.state.selection.clone(),
            after: Some(mask),
        });
        // `record` has just stored `Some(mask)`, so the error arm is never taken.
        self.state.selection.as_ref().ok_or(EngineError::EmptySelection)
    }

    pub fn clear_selection(&mut self) {
        if self.state.selection.is_none() {
            return;
        }
        self.record(SessionOperation::Selection {
            label: "Deselect".to_string(),
            before: self.state.selection.clone(),
            after: None,
        });
    }

    pub fn invert_selection(&mut self) {
        let Some(current) = self.state.selection.as_ref() else {
            return;
        };
        let inverted = current.inverted();
        self.record(SessionOperation::Selection {
            label: "Invert Selection".to_string(),
            before: self.state.selection.clone(),
            after: Some(inverted),
        });
    }

    /// Raw 0/255 bitmap of the selection; all zeros when nothing is selected.
    pub fn export_mask(&self) -> Vec<u8> {
        match &self.state.selection {
            Some(mask) => mask.as_raw().to_vec(),
            None => vec![0; self.state.source.width() as usize * self.state.source.height() as usize],
        }
    }

    // ------------------------------------------------------------------------
    // Settings, filters, stack
    // ------------------------------------------------------------------------

    pub fn set_wand(&mut self, settings: MagicWandSettings) {
        let before = *self.state.wand.settings();
        if before == settings {
            return;
        }
        self.record(SessionOperation::Wand { before, after: settings });
    }

    /// Replace the base filter values (clamped to their ranges).
    pub fn set_filters(&mut self, filters: FilterState) {
        let after = filters.clamped();
        let before = self.state.filters;
        if before == after {
            return;
        }
        self.record(SessionOperation::Filters { before, after });
    }

    /// Load `preset`'s stack and apply its controls over the base filters.
    pub fn apply_preset(&mut self, preset: &Preset) {
        self.record(SessionOperation::Preset {
            name: preset.name.clone(),
            filters_before: self.state.filters,
            filters_after: preset.controls.apply_to(&self.state.filters),
            stack_before: self.state.stack.nodes().to_vec(),
            stack_after: preset.stack.clone(),
        });
    }

    /// Run `edit` on a copy of the stack and record it as one undo step.
    /// Edits that leave the stack unchanged are not recorded.
    pub fn edit_stack<F>(&mut self, label: &str, edit: F)
    where
        F: FnOnce(&mut EffectStack),
    {
        let mut next = self.state.stack.clone();
        edit(&mut next);
        if next == self.state.stack {
            return;
        }
        self.record(SessionOperation::Stack {
            label: label.to_string(),
            before: self.state.stack.nodes().to_vec(),
            after: next.nodes().to_vec(),
        });
    }

    /// Base filters with the stack's channel amounts merged in.
    pub fn effective_filters(&self) -> FilterState {
        self.state.filters.merged_with(&self.state.stack.to_uniform_map())
    }

    pub fn filter_uniforms(&self, time: f32) -> FilterUniforms {
        FilterUniforms::from_filter_state(
            &self.effective_filters(),
            &self.state.stack.to_uniform_map(),
            time,
            self.state.selection.is_some(),
        )
    }

    // ------------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------------

    /// Filter the source, then run the stack's pass schedule. Both steps are
    /// restricted to the selection when there is one.
    pub fn render(&self, frame: u32) -> Result<RgbaImage, EngineError> {
        let mask = self.state.mask_pixels();
        let filtered = apply_filters(&self.state.source, &self.effective_filters(), mask)?;
        let passes = self.state.stack.render_passes();
        execute_schedule(&passes, &filtered, mask, frame)
    }

    /// Crop the source image. Selection and history are reset since they
    /// refer to the old pixel grid.
    pub fn crop_source(&mut self, rect: CropRect) -> Result<(), EngineError> {
        let cropped = crop_buffer(&self.state.source, rect)?;
        self.state.source = cropped;
        self.state.selection = None;
        self.history.clear();
        self.is_dirty = true;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------------

    pub fn undo(&mut self) -> Option<String> {
        self.history.undo(&mut self.state)
    }

    pub fn redo(&mut self) -> Option<String> {
        self.history.redo(&mut self.state)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }
}
