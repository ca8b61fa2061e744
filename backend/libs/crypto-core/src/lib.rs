pub mod jwt;

pub use jwt::{bearer_token, Claims, JwtIssuer, JwtVerifier, TokenError};
