pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{CancerType, ClassificationError, ClassificationResult, ImageUpload};
pub use router::{classification_routes, ClassificationState};
pub use services::{gateway::ClassificationGateway, history::ClassificationHistory};
