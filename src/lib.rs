pub mod band;
pub mod bands;
pub mod batch;
pub mod catalog;
pub mod constants;
pub mod fits;
pub mod frames;
pub mod galaxy;
pub mod geometry;
pub mod gmag_errors;
pub mod http;
pub mod logging;
pub mod params;
pub mod preview;
pub mod progress;
pub mod resolver;
pub mod wcs;

pub use band::{Band, BandSelection};
pub use batch::{BatchInput, BatchOrchestrator, BatchResult, RowOutcome};
pub use galaxy::{GalaxyFetcher, GalaxyRecord, Target};
pub use gmag_errors::GalaxyError;
pub use params::GalaxyParams;
