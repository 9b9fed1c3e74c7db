//! Carrier table and carrier classification.

pub mod classifier;
pub mod registry;

pub use classifier::CarrierClassifier;
pub use registry::{
    Anchor, CarrierKey, CarrierProfile, CarrierRegistry, CropGeometry, CropRule, Point, Rotation,
};
