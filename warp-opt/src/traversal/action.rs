use warp_utils::WarpResult;

/// Outcome of one visitor step.
pub enum Action {
    /// Keep traversing.
    Continue,
    /// Stop visiting the current method.
    Stop,
}

/// Result of a visitor hook.
pub type VisResult = WarpResult<Action>;
