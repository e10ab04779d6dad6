//! Point-in-time snapshot of a cover, as reported to a host.

use shutter_traits::CoverAttributes;

use crate::travel::Direction;

/// Whether the poll loop is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionState {
    Idle,
    Moving,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoverState {
    pub id: String,
    /// Rounded live position; `None` until a reference is established.
    pub position: Option<u8>,
    pub direction: Direction,
    pub motion: MotionState,
    pub is_closed: bool,
    /// Target of the current travel segment, if moving.
    pub target: Option<u8>,
    pub attributes: CoverAttributes,
    /// Always true: the state is estimated, never read back from the device.
    pub assumed_state: bool,
}

impl CoverState {
    pub fn is_moving(&self) -> bool {
        self.motion == MotionState::Moving
    }
}
