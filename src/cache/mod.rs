pub mod token;
pub mod token_store;

pub use token::{mask_token, Token};
pub use token_store::TokenStore;
