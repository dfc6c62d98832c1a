use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::debug;

use shared_config::AppConfig;

use crate::models::MeetingProvider;

/// Join without the lobby, with audio and video on and no name prompt.
const ROOM_FRAGMENT: &str = "config.prejoinPageEnabled=false&config.startWithAudioMuted=false&config.startWithVideoMuted=false&config.requireDisplayName=false";

fn jitsi_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^https://meet\.jit\.si/[\w-]+(#[\w.=&-]*)?$").expect("valid Jitsi pattern")
    })
}

fn google_meet_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^https://meet\.google\.com/[a-z]{3}-[a-z]{4}-[a-z]{3}$")
            .expect("valid Google Meet pattern")
    })
}

impl MeetingProvider {
    pub fn detect(link: &str) -> Option<Self> {
        if jitsi_pattern().is_match(link) {
            Some(Self::Jitsi)
        } else if google_meet_pattern().is_match(link) {
            Some(Self::GoogleMeet)
        } else {
            None
        }
    }
}

/// True for public Jitsi rooms and Google Meet codes.
pub fn is_valid_meet_link(link: &str) -> bool {
    MeetingProvider::detect(link).is_some()
}

pub struct MeetingRoomBinder {
    base_url: String,
    namespace: String,
}

impl MeetingRoomBinder {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            base_url: config.meeting_base_url.trim_end_matches('/').to_string(),
            namespace: config.meeting_namespace.clone(),
        }
    }

    /// Room URL for `appointment_id`. The timestamp keeps rebooked ids from
    /// sharing a room; callers store the result and never bind twice.
    pub fn bind(&self, appointment_id: &str, at: DateTime<Utc>) -> String {
        let link = format!(
            "{}/{}-{}-{}#{}",
            self.base_url,
            self.namespace,
            appointment_id,
            at.timestamp_micros(),
            ROOM_FRAGMENT
        );
        debug!("Bound appointment {} to {}", appointment_id, link);
        link
    }
}
