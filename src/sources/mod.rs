pub mod fetch;

pub use fetch::{compute_expires_at, FetchToken, HttpTokenFetcher};
