//! Identity and per-connection session state for wardbook.
//! Keep the public surface thin and split implementation across sub-modules.

mod role;
mod session;

pub use role::{Operation, Role};
pub use session::Session;
