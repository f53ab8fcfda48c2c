pub mod analysis;
pub mod container;
pub mod egrn;
pub mod export;
pub mod fields;
pub mod geometry;
pub mod kpt;
pub mod layers;
pub mod matcher;
pub mod ordinates;
pub mod resolver;

pub use crate::domain::model::{AnalysisReport, Parcel, RestrictionRecord, ZoneRecord, ZoneResolution};
pub use crate::domain::ports::LayerStorage;
pub use crate::utils::error::Result;
