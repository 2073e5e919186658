use crate::resource::FeedingHandle;
use glam::Vec3;

/// What an agent touched, classified once by the harness.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContactSubject {
    /// A nectar source's feeding collider.
    Feeding(FeedingHandle),
    /// The outer boundary of a field or arena.
    Boundary,
    /// A goal trigger.
    Goal,
    /// A wall or obstacle.
    Wall,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContactPhase {
    Enter,
    Stay,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Contact {
    pub subject: ContactSubject,
    pub phase: ContactPhase,
    /// Point on the touched collider relevant to the contact (closest point to the
    /// agent's feeding point for feeding contacts).
    pub point: Vec3,
}

impl Contact {
    pub fn new(subject: ContactSubject, phase: ContactPhase, point: Vec3) -> Self {
        Self {
            subject,
            phase,
            point,
        }
    }

    pub fn feeding(handle: FeedingHandle, phase: ContactPhase, point: Vec3) -> Self {
        Self::new(ContactSubject::Feeding(handle), phase, point)
    }

    pub fn phase_for(was_touching: bool) -> ContactPhase {
        if was_touching {
            ContactPhase::Stay
        } else {
            ContactPhase::Enter
        }
    }
}
