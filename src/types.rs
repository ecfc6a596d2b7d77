#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddStatus {
    Added,
    AlreadyExists,
}

impl AddStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AddStatus::Added => "added",
            AddStatus::AlreadyExists => "already_exists",
        }
    }
}

/// Result of asking the record store to keep a plate. A duplicate is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddOutcome {
    pub status: AddStatus,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Occupied,
    Free,
}

/// One detection in pixel coordinates of the submitted image.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    pub class: u64,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: Option<f32>,
}

impl BoundingBox {
    /// Class 0 is an occupied slot, anything else is free.
    pub fn slot_state(&self) -> SlotState {
        if self.class == 0 {
            SlotState::Occupied
        } else {
            SlotState::Free
        }
    }
}
