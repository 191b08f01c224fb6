//! Resource resolution: mapping genome/kit names to file-path bundles.
//!
//! The resolver is a pure function of the configuration tables and the
//! explicitly supplied overrides; it runs once at startup and the run is
//! rejected before any stage executes if the bundle cannot be completed.

mod bundle;
mod resolver;
mod tables;

pub use bundle::{ResourceBundle, ToolPaths};
pub use resolver::{resolve_bundle, Overrides};
pub use tables::{GenomeEntry, KitEntry, ResourceTables};
