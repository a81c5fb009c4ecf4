pub mod conversation;
pub mod extraction;
pub mod sessions;
