pub mod rest;
pub mod state;

// Re-export the router builder so the binary can mount every REST endpoint.
pub use rest::routes;
