pub mod enums;
pub mod document;

pub use enums::*;
pub use document::*;
