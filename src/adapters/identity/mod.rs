pub mod hmac_token;

pub use hmac_token::{IdentityService as HmacTokenService, LibrarianAccount};
