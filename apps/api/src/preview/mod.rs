// Preview service: mounted document previews, each driven by its own fit controller.

pub mod handlers;
pub mod session;

pub use session::{PreviewSession, SessionRegistry, SessionSpec};
