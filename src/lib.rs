pub mod error;
pub mod extract;
pub mod handlers;
pub mod media;
pub mod poll;
pub mod providers;
pub mod quality;
pub mod resolve;
