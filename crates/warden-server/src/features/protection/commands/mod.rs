pub mod toggle;

pub use toggle::{ToggleProtectionCommand, ToggleProtectionError, ToggleProtectionResponse};
