pub mod classify;
pub mod error;
pub mod gps;
pub mod kml;
pub mod normalize;
pub mod ordering;
pub mod package;
pub mod reader;
pub mod report;
