/// Credential hashing behind a swappable trait
pub mod password;
/// Bearer tokens and the credential gate
pub mod token;
/// Signup, login and user provisioning
pub mod users;

pub use password::{Argon2Hasher, CredentialHasher};
pub use token::{Claims, Credential, TokenService};
pub use users::{Session, Signup};
