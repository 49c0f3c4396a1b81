//! # Vending machine payment server
//!
//! The HTTP front end of the vending engine. It is responsible for:
//! * Serving the web payment flow: opening, paying, cancelling and querying payment sessions.
//! * Ingesting machine events (orders, payments, dispense results, inventory and fault reports) and answering each
//!   one with a confirmation.
//! * Running the session expiry worker.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/create-session`, `/api/process-payment`, `/api/cancel-session`, `/api/session-status/{id}` and
//!   `/api/product-info`: the web payment flow.
//! * `/products`, `/sales`, `/reports`: read-only views of the inventory and the journals.
//! * `/events/{category}`: machine event ingestion.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod expiry_worker;
pub mod machine_link;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
