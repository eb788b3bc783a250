pub mod document;
pub mod ids;
pub mod revision;
