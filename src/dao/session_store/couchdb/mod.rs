mod config;
mod error;
mod models;
mod store;

#[allow(unused_imports)]
pub use config::CouchConfig;
#[allow(unused_imports)]
pub use store::CouchSessionStore;
