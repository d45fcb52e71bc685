pub mod directory;
pub mod download;
pub mod validate;
