//! External tool clients for the TrailTag backend.
//!
//! The YouTube metadata service and the geocoding API are external
//! collaborators; only their contracts live here. Both degrade gracefully:
//! probe failures read as "no subtitles", geocoding failures and
//! rate-limit denials read as "no coordinates".

pub mod error;
pub mod geocode;
pub mod metadata;

pub use error::{ToolError, ToolResult};
pub use geocode::{GeocodeClient, GeocodeConfig};
pub use metadata::{
    HttpMetadataProvider, MetadataClientConfig, MetadataProvider, StaticMetadataProvider,
};
