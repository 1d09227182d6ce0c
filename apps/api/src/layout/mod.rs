// Adaptive page fit: converges a preview's font size so its content fills one page.
// policy → calculator are pure; controller + adapter are tokio tasks around them.

pub mod adapter;
pub mod calculator;
pub mod controller;
pub mod font_metrics;
pub mod policy;
pub mod surface;

// Re-export the public API consumed by the preview service.
pub use adapter::{ChangeSignal, NotificationAdapter};
pub use controller::{FitController, FitObserver, FitSnapshot, OverflowWarning};
pub use font_metrics::{default_page_config, FontFamily, PageConfig, PaperSize};
pub use policy::{ContentKind, FitPolicy, PolicyError};
pub use surface::{MetricSurface, PageId, RenderSurface};
