//! Service registry: publish, find and unregister shared objects.

pub mod filter;
pub mod reference;
pub mod registry;

pub use filter::ServiceFilter;
pub use reference::{ServiceObject, ServiceReference, ServiceRegistration};
pub use registry::Services;
