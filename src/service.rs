pub mod archive;
pub mod payload;
pub mod photo;
