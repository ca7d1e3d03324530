// ── Drag/reorder controller ──
//
// Turns a drag gesture into at most one move intent. There is one
// controller per scope kind; a gesture is bound to the scope it started in
// and events for any other scope are ignored.

use tracing::debug;

use crate::model::{ScopeId, ScopeKind};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        scope: ScopeId,
        from: u32,
        /// Hover hint for visual feedback only.
        over: Option<u32>,
    },
}

/// A move the owning store should send to the remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveIntent {
    pub scope: ScopeId,
    pub from: u32,
    pub to: u32,
}

#[derive(Debug, Clone)]
pub struct DragController {
    kind: ScopeKind,
    state: DragState,
}

impl DragController {
    pub fn new(kind: ScopeKind) -> Self {
        Self {
            kind,
            state: DragState::Idle,
        }
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    /// Current hover hint, if a same-scope `drag_over` set one.
    pub fn over(&self) -> Option<u32> {
        match &self.state {
            DragState::Dragging { over, .. } => *over,
            DragState::Idle => None,
        }
    }

    /// Begin dragging the rule at `position`. A scope of another kind is
    /// ignored; a drag already in progress is replaced.
    pub fn drag_start(&mut self, scope: ScopeId, position: u32) {
        if scope.kind() != self.kind {
            debug!(%scope, kind = %self.kind, "drag start for another scope kind ignored");
            return;
        }
        self.state = DragState::Dragging {
            scope,
            from: position,
            over: None,
        };
    }

    /// Update the hover hint. Returns the hint, or `None` when the event
    /// belongs to another scope.
    pub fn drag_over(&mut self, scope: &ScopeId, position: u32) -> Option<u32> {
        match &mut self.state {
            DragState::Dragging {
                scope: dragged,
                over,
                ..
            } if dragged == scope => {
                *over = Some(position);
                Some(position)
            }
            _ => None,
        }
    }

    /// Finish the gesture. Always returns to idle; yields an intent only for
    /// a drop in the same scope at a different position.
    pub fn drop(&mut self, scope: &ScopeId, position: u32) -> Option<MoveIntent> {
        match std::mem::take(&mut self.state) {
            DragState::Dragging {
                scope: dragged,
                from,
                ..
            } if dragged == *scope && from != position => Some(MoveIntent {
                scope: dragged,
                from,
                to: position,
            }),
            DragState::Dragging { scope: dragged, .. } => {
                debug!(scope = %dragged, position, "drop without effect");
                None
            }
            DragState::Idle => None,
        }
    }

    /// Cancel the gesture without moving anything.
    pub fn drag_end(&mut self) {
        self.state = DragState::Idle;
    }
}
