//! saltree-client: verified record retrieval over HTTP
//!
//! Pins the server's published commitment, then checks every record it
//! receives against that root. Nothing that fails verification is returned.

pub mod client;
pub mod error;

pub use client::{ClientBuilder, InsertResponse, RetrievalClient, RetrievalMode, TombstoneResponse};
pub use error::{ClientError, Result};
