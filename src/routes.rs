pub mod attachment;
pub mod auth;
pub mod configuration;
pub mod devices;
pub mod emergency;
pub mod error;
pub mod health;
pub mod location;
pub mod pdf;
pub mod socket;
