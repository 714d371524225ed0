pub mod ipapi;
pub mod resolver;

pub use ipapi::{IpApiConfig, IpApiLookup};
pub use resolver::{DisabledLookup, GeoLookup, LocationResolver, LookupError};
