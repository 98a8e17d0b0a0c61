pub mod download;
pub mod reduce;
pub mod source;
