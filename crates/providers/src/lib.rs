//! Provider wire layer: request building, response extraction, and the
//! HTTP transport for the three protocol families.

pub mod adapter;
pub mod transport;

pub use adapter::{build_request, extract_error, parse_history, parse_response};
pub use transport::{probe_health, probe_models, send, test_connection, Endpoint};
