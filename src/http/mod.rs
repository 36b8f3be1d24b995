/// HTTP transport for the service under test.
pub mod client;
pub mod endpoint;
pub mod transport;

pub use client::{ApiClient, ApiRequest, ApiResponse, ClientConfig, HttpMethod};
pub use endpoint::{Credential, Endpoint};
pub use transport::HttpApiClient;
