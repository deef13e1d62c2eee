//! Ports - Trait definitions for every external collaborator.

pub mod inference;
pub mod media;
pub mod queue;
pub mod repository;
pub mod speech;
pub mod storage;
