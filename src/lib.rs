pub mod config;
pub mod error;
pub mod models;
pub mod monitor;
pub mod notify;
pub mod scheduler;
pub mod scrapers;
pub mod store;

pub use config::MonitorConfig;
pub use error::{MonitorError, MonitorResult};
pub use models::{Listing, StoredListing};
pub use monitor::{Monitor, NotificationFilter, RunReport};
pub use store::ListingStore;
