//! Input snapshot handed to the core once per tick
//!
//! The window layer owns the keyboard; the core only ever reads an
//! `InputState` built from it.

use crate::rasterizer::DrawMode;

/// Continuous actions, active while held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    MoveForward = 0,
    MoveBack,
    MoveLeft,
    MoveRight,
    MoveUp,
    MoveDown,
    YawLeft,
    YawRight,
    PitchUp,
    PitchDown,
    RollLeft,
    RollRight,
    FovIncrease,
    FovDecrease,
}

impl Action {
    pub const COUNT: usize = 14;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// One-shot events, applied once per tick they arrive in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Wireframe,
    PreviewRows,
    NextMesh,
    RotateWorld(Axis),
    SetDrawMode(DrawMode),
}

/// Immutable per-tick snapshot of the controls
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputState {
    held: [bool; Action::COUNT],
    toggles: Vec<Toggle>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder used by the window layer and tests
    pub fn with_held(mut self, action: Action) -> Self {
        self.set_held(action, true);
        self
    }

    pub fn with_toggle(mut self, toggle: Toggle) -> Self {
        self.toggles.push(toggle);
        self
    }

    pub fn set_held(&mut self, action: Action, down: bool) {
        self.held[action as usize] = down;
    }

    pub fn push_toggle(&mut self, toggle: Toggle) {
        self.toggles.push(toggle);
    }

    pub fn is_held(&self, action: Action) -> bool {
        self.held[action as usize]
    }

    pub fn toggles(&self) -> &[Toggle] {
        &self.toggles
    }

    /// Fold a newer snapshot in: held state is replaced, toggles accumulate
    pub fn merge(&mut self, newer: InputState) {
        self.held = newer.held;
        self.toggles.extend(newer.toggles);
    }

    /// Same held state with the one-shot events consumed
    pub fn clear_toggles(&mut self) {
        self.toggles.clear();
    }
}
