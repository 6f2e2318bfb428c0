//! Core types for the diff engine.

pub mod rater;
pub mod position;
pub mod label;
pub mod configuration;

pub use rater::RaterId;
pub use position::{Extent, LinkKey, Position};
pub use label::{Label, Labels};
pub use configuration::{AnnotationUnit, ConfigurationSet, Tag};
