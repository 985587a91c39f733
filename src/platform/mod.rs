/// Platform Client
///
/// Answers a single question for the cleanup engine: does a platform space
/// still exist? The answer is three-valued so that infrastructure failures
/// are never mistaken for a deleted space.

use async_trait::async_trait;

// Cloud controller HTTP adapter (reqwest)
pub mod http;

pub use http::CloudControllerSpaceClient;

/// Outcome of looking up a space by guid
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpaceLookup {
    Exists,
    /// The platform answered "not found"
    Absent,
    /// Any other failure; the space must be treated as possibly existing
    Unknown(String),
}

#[async_trait]
pub trait SpaceClient: Send + Sync {
    async fn get_space(&self, space_guid: &str) -> SpaceLookup;
}
