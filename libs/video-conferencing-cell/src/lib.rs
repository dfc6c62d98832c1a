// libs/video-conferencing-cell/src/lib.rs
//! # Video Conferencing Cell
//!
//! Binds appointments to Jitsi Meet rooms. There is no provider API: a room
//! exists as soon as someone opens its URL, so binding is a naming
//! convention evaluated once when the appointment is created.
//!
//! ```rust
//! use chrono::Utc;
//! use video_conferencing_cell::MeetingRoomBinder;
//! # use shared_config::AppConfig;
//! # fn example(config: &AppConfig) {
//! let binder = MeetingRoomBinder::new(config);
//! let link = binder.bind("APT1718000000000123", Utc::now());
//! assert!(video_conferencing_cell::is_valid_meet_link(&link));
//! # }
//! ```

pub mod models;
pub mod services;

pub use models::{MeetingLink, MeetingProvider};
pub use services::binder::{is_valid_meet_link, MeetingRoomBinder};
