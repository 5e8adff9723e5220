pub mod identity;

pub use identity::{require_identity, AuthUser};
