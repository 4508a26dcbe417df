//! Held-out evaluation of a trained model, as text and as an HTML page.
pub mod html;
pub mod plots;
#[allow(clippy::module_inception)]
mod report;

pub use report::*;
