pub mod client;

pub use client::{FetchPolicy, GraphqlClient, Operation};
