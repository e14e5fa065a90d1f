pub mod browser;
pub mod challenge;
pub mod debug;
pub mod details;
pub mod dom;
pub mod http;
pub mod locator;
pub mod traits;

pub use browser::ChromeFetcher;
pub use debug::DirectorySink;
pub use http::HttpFetcher;
pub use locator::{ListingFragment, ListingLocator};
pub use traits::{DebugSink, NoopSink, Notifier, PageContent, PageFetcher};
