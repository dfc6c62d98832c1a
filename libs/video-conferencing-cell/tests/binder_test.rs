use chrono::{TimeZone, Utc};

use shared_utils::test_utils::TestConfig;
use video_conferencing_cell::{is_valid_meet_link, MeetingLink, MeetingProvider, MeetingRoomBinder};

#[test]
fn binds_room_from_namespace_id_and_micros() {
    let config = TestConfig::default().to_app_config();
    let binder = MeetingRoomBinder::new(&config);
    let at = Utc.timestamp_micros(1_718_000_000_123_456).unwrap();

    let link = binder.bind("APT1718000000000042", at);

    assert_eq!(
        link,
        "https://meet.jit.si/ongogenesis-APT1718000000000042-1718000000123456\
         #config.prejoinPageEnabled=false&config.startWithAudioMuted=false\
         &config.startWithVideoMuted=false&config.requireDisplayName=false"
    );
    assert!(is_valid_meet_link(&link));
}

#[test]
fn distinct_instants_give_distinct_rooms() {
    let config = TestConfig::default().to_app_config();
    let binder = MeetingRoomBinder::new(&config);
    let first = Utc.timestamp_micros(1_718_000_000_000_000).unwrap();
    let second = Utc.timestamp_micros(1_718_000_000_000_001).unwrap();

    assert_ne!(binder.bind("APT1", first), binder.bind("APT1", second));
}

#[test]
fn honours_configured_base_url() {
    let mut config = TestConfig::default().to_app_config();
    config.meeting_base_url = "https://video.example.org/".to_string();
    config.meeting_namespace = "clinic".to_string();
    let binder = MeetingRoomBinder::new(&config);
    let at = Utc.timestamp_micros(5).unwrap();

    let link = binder.bind("APT9", at);

    assert!(link.starts_with("https://video.example.org/clinic-APT9-5#"));
    // Self-hosted rooms are not one of the public providers.
    assert_eq!(MeetingLink::new("APT9", &link).provider, None);
}

#[test]
fn meeting_link_serializes_provider() {
    let link = MeetingLink::new("APT1", "https://meet.jit.si/ongogenesis-APT1-1");
    assert_eq!(link.provider, Some(MeetingProvider::Jitsi));

    let value = serde_json::to_value(&link).unwrap();
    assert_eq!(value["provider"], "jitsi");
    assert_eq!(value["appointment_id"], "APT1");
}
