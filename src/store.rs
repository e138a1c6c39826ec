pub mod configurations;
pub mod credentials;
pub mod files;
pub mod ledger;
pub mod locations;
pub mod sessions;
