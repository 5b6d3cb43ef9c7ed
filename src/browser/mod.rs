//! Browser discovery
//!
//! Static catalogue of supported browsers, installation detection and the
//! per-OS default-browser query.

pub mod default_browser;
pub mod registry;

pub use default_browser::{DefaultBrowserProbe, FixedProbe, NoProbe, probe_for};
pub use registry::{BrowserRegistry, SUPPORTED_BROWSERS, find_descriptor, sort_by_priority};
