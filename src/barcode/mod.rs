//! Barcode reading: decoder backends, classification, enhancement and the
//! region-candidate heuristic.

mod backend;
pub mod classify;
pub mod enhance;
pub mod regions;
pub mod tools;
mod zbar;

pub use backend::{DecodeError, MarkerDecoder};
pub use classify::{classify, is_blank, MarkerClass};
pub use enhance::{stage_for_attempt, EnhancementStage, STAGES};
pub use regions::{ContourRegionDetector, Region, RegionDetector};
pub use zbar::ZbarBackend;
