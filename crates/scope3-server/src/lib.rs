pub mod config;
pub mod error;
pub mod protocol;
pub mod server;
mod transport;

pub use config::ServerConfig;
pub use error::ServerError;
pub use server::DashboardServer;
pub use transport::MAX_BODY_BYTES;
