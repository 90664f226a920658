pub mod response;

pub use response::{parse_credential_response, FetchedCredential};
