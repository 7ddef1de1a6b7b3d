//! Command and query handlers.

pub mod discovery;

pub use discovery::{
    DiscoveryService, DiscoveryStream, ProcessResponseCommand, StartDiscoveryCommand, StreamEvent,
};
