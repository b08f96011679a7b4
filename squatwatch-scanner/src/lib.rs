pub mod driver;
pub mod error;
pub mod parser;
pub mod proxy;
pub mod radar;
pub mod result;
pub mod retry;
pub mod webdriver;

pub use driver::DriverBackend;
pub use error::ScanError;
pub use proxy::ProxyConfig;
pub use radar::{RadarSearcher, SearchTimings};
pub use result::{SearchResult, SquatKind, SquatRecord};
pub use retry::RetryPolicy;
