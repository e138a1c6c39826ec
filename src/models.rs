pub mod configuration;
pub mod device;
pub mod emergency;
pub mod events;
pub mod location;
pub mod pdf_history;
pub mod session;
