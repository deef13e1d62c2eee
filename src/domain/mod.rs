//! Domain layer - Pure business logic.

pub mod analysis;
pub mod clips;
pub mod credentials;
pub mod jobs;
pub mod layout;
pub mod planner;
pub mod segments;
