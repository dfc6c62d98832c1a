// libs/video-conferencing-cell/src/models.rs
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MeetingProvider {
    Jitsi,
    GoogleMeet,
}

/// The room an appointment is bound to, as returned to participants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MeetingLink {
    pub appointment_id: String,
    pub meet_link: String,
    pub provider: Option<MeetingProvider>,
}

impl MeetingLink {
    pub fn new(appointment_id: &str, meet_link: &str) -> Self {
        Self {
            appointment_id: appointment_id.to_string(),
            meet_link: meet_link.to_string(),
            provider: MeetingProvider::detect(meet_link),
        }
    }
}
