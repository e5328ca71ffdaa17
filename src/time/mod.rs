//! Module for resolving the capture time of a photo.
mod logic;
mod parsing;
pub mod structs;
pub use logic::resolve_capture_time;
pub use parsing::parse_capture_time;
