// gsauth - Grand Slam authentication engine
//
// Client for the identity service behind the developer-tools sign-in:
// SRP-6a key exchange, secure-payload decryption, optional second
// factor, and per-application token issuance. Fingerprint headers and
// the HTTP stack are pluggable collaborators; the engine holds no
// state between attempts.

pub mod anisette;
pub mod auth_flow;
pub mod channel;
pub mod error;
pub mod protocol;
pub mod token;
pub mod transport;

pub use anisette::{AnisetteData, AnisetteProvider, RemoteAnisette, StaticAnisette};
pub use auth_flow::{
    AuthOutcome, AuthSession, Authenticator, Credential, SecondFactorChallenge,
    SecondFactorFailure, SecondFactorMethod,
};
pub use channel::AuthChannel;
pub use error::{AuthError, TransportError};
pub use protocol::SecurePayload;
pub use token::{AppToken, TokenIssuer, XCODE_APP_ID};
pub use transport::{ReqwestTransport, Transport};
