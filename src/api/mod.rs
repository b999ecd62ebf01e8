// API module
//
// HTTP surface over an in-process blockchain

pub mod handlers;
pub mod routes;
pub mod schema;

// Re-export main components for easier access
pub use handlers::BlockchainData;
pub use routes::configure_routes;
pub use schema::ApiDoc;
