//! Authentication and authorization module
//!
//! - Token issuance, validation and revocation
//! - Password hashing with Argon2
//! - Middleware for request authentication and the route-group role guard
//! - Authentication service for registration, login, refresh and logout

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod service;

pub use jwt::{Claims, JwtError, TokenKind, TokenPair, TokenService};
pub use middleware::{
    auth_middleware, refresh_token_middleware, require_role, AuthError, AuthenticatedUser,
};
pub use password::{hash_password, validate_password_strength, verify_password, PasswordConfig};
pub use service::{
    AccessTokenResponse, AuthResponse, AuthService, LoginRequest, LogoutRequest, RegisterRequest,
    UserInfo,
};
