pub mod profiles;
pub mod types;

pub use profiles::{ProfileError, PROFILE_NAMES, profile_scripts};
pub use types::*;
