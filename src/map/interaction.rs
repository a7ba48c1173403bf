// Marker hover/detail state machine - pure, explicit transitions
use serde::Serialize;

use super::{ScreenPoint, Viewport};
use crate::domain::PostId;

/// Horizontal gap between the pointer and the hover popup.
pub const POPUP_GAP_PX: f64 = 20.0;
/// The popup's top edge sits this far above the marker's screen point.
pub const POPUP_LIFT_PX: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PopupSide {
    /// Popup extends to the right; `offset` is its CSS `left`.
    Left,
    /// Popup extends to the left; `offset` is its CSS `right`.
    Right,
}

/// Where the hover popup is pinned on screen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PopupPlacement {
    pub side: PopupSide,
    pub offset: f64,
    pub top: f64,
}

impl PopupPlacement {
    /// Pick the side with room so the popup never runs off screen.
    pub fn for_marker(marker: ScreenPoint, viewport: Viewport) -> Self {
        let (side, offset) = if marker.x < viewport.center_x() {
            (PopupSide::Left, marker.x + POPUP_GAP_PX)
        } else {
            (PopupSide::Right, viewport.width - marker.x + POPUP_GAP_PX)
        };
        Self {
            side,
            offset,
            top: marker.y - POPUP_LIFT_PX,
        }
    }

    pub fn css(&self) -> String {
        let edge = match self.side {
            PopupSide::Left => "left",
            PopupSide::Right => "right",
        };
        format!("top:{}px;{}:{}px", self.top, edge, self.offset)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Interaction {
    Idle,
    Hovering {
        post: PostId,
        placement: PopupPlacement,
    },
    DetailOpen {
        post: PostId,
        /// Close requested, waiting on the panel teardown.
        closing: bool,
    },
}

/// What the live pointer watcher currently sees.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointerWatch {
    pub over_marker: Option<PostId>,
    pub over_popup: bool,
}

/// Governs which single post is hovered or shown in detail.
#[derive(Debug, Clone)]
pub struct InteractionMachine {
    state: Interaction,
    creation_mode: bool,
}

impl Default for InteractionMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractionMachine {
    pub fn new() -> Self {
        Self {
            state: Interaction::Idle,
            creation_mode: false,
        }
    }

    pub fn state(&self) -> &Interaction {
        &self.state
    }

    pub fn creation_mode(&self) -> bool {
        self.creation_mode
    }

    pub fn hovered(&self) -> Option<&PostId> {
        match &self.state {
            Interaction::Hovering { post, .. } => Some(post),
            _ => None,
        }
    }

    pub fn detail(&self) -> Option<&PostId> {
        match &self.state {
            Interaction::DetailOpen { post, .. } => Some(post),
            _ => None,
        }
    }

    /// Pointer entered a marker. Returns the new placement when a hover starts.
    pub fn pointer_entered(
        &mut self,
        post: PostId,
        marker: ScreenPoint,
        viewport: Viewport,
    ) -> Option<PopupPlacement> {
        if self.creation_mode {
            return None;
        }
        match self.state {
            Interaction::DetailOpen { .. } => None,
            Interaction::Idle | Interaction::Hovering { .. } => {
                let placement = PopupPlacement::for_marker(marker, viewport);
                self.state = Interaction::Hovering { post, placement };
                Some(placement)
            }
        }
    }

    /// Feed from the live pointer watcher. Returns true when the hover ended.
    pub fn pointer_moved(&mut self, watch: &PointerWatch) -> bool {
        let Interaction::Hovering { post, .. } = &self.state else {
            return false;
        };
        let still_on_marker = watch.over_marker.as_ref() == Some(post);
        if still_on_marker || watch.over_popup {
            return false;
        }
        self.state = Interaction::Idle;
        true
    }

    /// Marker click opens detail and drops any hover. Returns false when ignored.
    pub fn marker_clicked(&mut self, post: PostId) -> bool {
        if self.creation_mode {
            return false;
        }
        if let Interaction::DetailOpen { closing: true, .. } = self.state {
            return false;
        }
        self.state = Interaction::DetailOpen {
            post,
            closing: false,
        };
        true
    }

    /// Start closing the detail view. Returns the post being closed.
    pub fn close_requested(&mut self) -> Option<PostId> {
        match &mut self.state {
            Interaction::DetailOpen { post, closing } if !*closing => {
                *closing = true;
                Some(post.clone())
            }
            _ => None,
        }
    }

    /// The detail panel finished its close animation.
    pub fn close_finished(&mut self, post: &PostId) -> bool {
        let done = matches!(
            &self.state,
            Interaction::DetailOpen { post: p, closing: true } if p == post
        );
        if done {
            self.state = Interaction::Idle;
        }
        done
    }

    /// Entering creation mode forces Idle.
    pub fn set_creation_mode(&mut self, on: bool) {
        self.creation_mode = on;
        if on {
            self.state = Interaction::Idle;
        }
    }
}
