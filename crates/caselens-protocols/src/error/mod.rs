//! Error types for the CaseLens protocol layer.

mod dom;
mod export;
mod feature;
mod messaging;
mod store;

pub use dom::*;
pub use export::*;
pub use feature::*;
pub use messaging::*;
pub use store::*;
