// meterbridge-api: async clients for the iONA meter box and the n2g cloud API

pub mod auth;
pub mod error;
pub mod local;
pub mod models;
pub mod reading;
pub mod transport;
pub mod web;

pub use auth::{TokenGrant, TokenKind};
pub use error::{Error, FailureKind};
pub use local::LocalClient;
pub use reading::Reading;
pub use transport::{TlsMode, TransportConfig};
pub use web::{DEFAULT_API_URL, DEFAULT_AUTH_URL, WebClient};
