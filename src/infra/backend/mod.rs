//! REST implementation of the attendance collaborators.

mod client;

pub use client::BackendClient;
