pub mod annotations;
pub mod extraction;
pub mod frames;
pub mod videos;
