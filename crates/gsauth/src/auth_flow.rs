// AuthFlow - the authentication state machine
//
// Drives one attempt through init -> challenge -> complete and the
// optional second-factor branch. Each attempt owns its own SRP state;
// nothing is shared between concurrent attempts, and an abandoned
// attempt wipes its ephemeral secrets on drop. The interactive
// second-factor step is a suspension point: authenticate() hands back
// a challenge value and the caller resumes with submit_second_factor.

use std::fmt;

use data_encoding::BASE64;
use zeroize::Zeroizing;

use grandslam_shared::auth::Srp6Client;
use grandslam_shared::auth::payload_crypto::decrypt_secure_payload;

use crate::anisette::AnisetteProvider;
use crate::channel::AuthChannel;
use crate::error::AuthError;
use crate::protocol::{
    AUTH_TYPE_SECONDARY, AUTH_TYPE_TRUSTED_DEVICE, SCHEME_S2K, SecurePayload, decode_base64,
    require,
};
use crate::transport::Transport;

/// Username and password for one authentication attempt.
/// The password is wiped from memory when the credential is dropped
/// and never appears in logs or serialized output.
pub struct Credential {
    username: String,
    password: Zeroizing<String>,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credential {
            username: username.into(),
            password: Zeroizing::new(password.into()),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// How the second factor must be satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecondFactorMethod {
    TrustedDevice,
    Sms,
}

/// A fully trusted, authenticated session
#[derive(Debug)]
pub struct AuthSession {
    payload: SecurePayload,
}

impl AuthSession {
    pub fn payload(&self) -> &SecurePayload {
        &self.payload
    }
}

/// A pending second factor. Owns the secure payload until the code is
/// verified, so an unresolved challenge cannot be used for token
/// issuance. Consumed by a successful submit.
#[derive(Debug)]
pub struct SecondFactorChallenge {
    method: SecondFactorMethod,
    identity_token: String,
    payload: SecurePayload,
}

impl SecondFactorChallenge {
    pub fn method(&self) -> SecondFactorMethod {
        self.method
    }
}

/// Result of a primary authentication attempt
#[derive(Debug)]
pub enum AuthOutcome {
    Authenticated(AuthSession),
    SecondFactorRequired(SecondFactorChallenge),
}

/// A failed submit hands the challenge back so the caller can retry
/// with a new code; the error says whether that is worthwhile.
#[derive(Debug)]
pub struct SecondFactorFailure {
    pub challenge: SecondFactorChallenge,
    pub error: AuthError,
}

pub struct Authenticator<P: AnisetteProvider, T: Transport> {
    channel: AuthChannel<P, T>,
}

impl<P: AnisetteProvider, T: Transport> Authenticator<P, T> {
    pub fn new(channel: AuthChannel<P, T>) -> Self {
        Authenticator { channel }
    }

    pub fn channel(&self) -> &AuthChannel<P, T> {
        &self.channel
    }

    /// Run the handshake. Suspends at each network round-trip; returns
    /// either a trusted session or a pending second-factor challenge.
    pub async fn authenticate(&self, credential: &Credential) -> Result<AuthOutcome, AuthError> {
        let username = credential.username();

        // Init -> ChallengeSent
        let srp = Srp6Client::generate()?;
        let a2k = BASE64.encode(&srp.public_ephemeral());
        let init = self.channel.init(username, a2k).await?;

        let scheme = require(init.sp, "sp")?;
        if scheme != SCHEME_S2K {
            return Err(AuthError::UnsupportedProtocolFlavor(scheme));
        }

        let salt = decode_base64(&require(init.s, "s")?, "s")?;
        let iterations = require(init.i, "i")?;
        let b_pub = decode_base64(&require(init.b, "B")?, "B")?;
        let cookie = require(init.c, "c")?;

        tracing::debug!(
            "Challenge received for '{}': {} PBKDF2 iterations, {}-byte salt",
            username,
            iterations,
            salt.len()
        );

        // ChallengeSent -> ProofVerified
        let session = srp.derive_session_key(
            &b_pub,
            &salt,
            iterations,
            username,
            credential.password(),
        )?;

        let m1 = BASE64.encode(session.client_proof());
        let complete = self.channel.complete(username, &cookie, m1).await?;

        let m2 = decode_base64(&require(complete.m2, "M2")?, "M2")?;
        session.verify_server_proof(&m2)?;

        let spd = decode_base64(&require(complete.spd, "spd")?, "spd")?;
        let plaintext = decrypt_secure_payload(session.session_key(), &spd)?;
        let payload = SecurePayload::decode(&plaintext)?;

        tracing::info!("Server proof verified for '{}'", username);

        // ProofVerified -> Authenticated | AwaitingSecondFactor
        let auth_type = complete
            .status
            .and_then(|status| status.au)
            .unwrap_or_default();

        let method = match auth_type.as_str() {
            "" => {
                tracing::debug!("No second factor required for '{}'", username);
                return Ok(AuthOutcome::Authenticated(AuthSession { payload }));
            }
            AUTH_TYPE_TRUSTED_DEVICE => SecondFactorMethod::TrustedDevice,
            AUTH_TYPE_SECONDARY => SecondFactorMethod::Sms,
            other => {
                return Err(AuthError::UnsupportedSecondFactorMethod(other.to_string()));
            }
        };

        let identity_token = identity_token(&payload);

        // Kick off the prompt/text before suspending for code entry
        match method {
            SecondFactorMethod::TrustedDevice => {
                self.channel.trigger_trusted_device(&identity_token).await?;
            }
            SecondFactorMethod::Sms => {
                self.channel.trigger_sms(&identity_token).await?;
            }
        }

        tracing::info!("Second factor required for '{}': {:?}", username, method);
        Ok(AuthOutcome::SecondFactorRequired(SecondFactorChallenge {
            method,
            identity_token,
            payload,
        }))
    }

    /// Resume a suspended attempt with a verification code.
    /// Success consumes the challenge; a rejected or malformed code
    /// hands it back for another try.
    pub async fn submit_second_factor(
        &self,
        challenge: SecondFactorChallenge,
        code: &str,
    ) -> Result<AuthSession, SecondFactorFailure> {
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(SecondFactorFailure {
                challenge,
                error: AuthError::InvalidInput(
                    "second-factor code must be numeric".to_string(),
                ),
            });
        }

        let result = match challenge.method {
            SecondFactorMethod::TrustedDevice => {
                self.channel
                    .submit_trusted_code(&challenge.identity_token, code)
                    .await
            }
            SecondFactorMethod::Sms => {
                self.channel
                    .submit_sms_code(&challenge.identity_token, code)
                    .await
            }
        };

        match result {
            Ok(()) => {
                tracing::info!("Second factor verified");
                Ok(AuthSession {
                    payload: challenge.payload,
                })
            }
            Err(error) => Err(SecondFactorFailure { challenge, error }),
        }
    }
}

/// Identity token: base64 of "{adsid}:{idms token}"
pub(crate) fn identity_token(payload: &SecurePayload) -> String {
    BASE64.encode(format!("{}:{}", payload.adsid, payload.gs_idms_token).as_bytes())
}
