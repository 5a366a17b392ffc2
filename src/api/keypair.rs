use base64::{
    Engine,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use chrono::{DateTime, Duration, Utc};
use rsa::{
    RsaPrivateKey,
    pkcs1::DecodeRsaPrivateKey,
    pkcs1v15::SigningKey,
    pkcs8::{DecodePrivateKey, EncodePublicKey},
    signature::{SignatureEncoding, Signer},
};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::DemoError;
use crate::types::SessionConfig;

/// Snowflake rejects key-pair tokens that live longer than an hour.
const TOKEN_LIFETIME_MINUTES: i64 = 59;

#[derive(Serialize)]
struct JwtHeader {
    alg: &'static str,
    typ: &'static str,
}

#[derive(Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    sub: &'a str,
    iat: i64,
    exp: i64,
}

/// Key-pair credentials for the SQL API.
pub struct KeyPairAuth {
    signing_key: SigningKey<Sha256>,
    /// `ACCOUNT.USER`
    subject: String,
    /// `ACCOUNT.USER.SHA256:<fingerprint>`
    issuer: String,
}

impl KeyPairAuth {
    pub fn from_config(cfg: &SessionConfig) -> Result<Self, DemoError> {
        let account = account_identifier(cfg.account()?);
        let user = cfg.user()?.to_uppercase();
        let key = parse_private_key(&cfg.private_key)?;
        let fingerprint = public_key_fingerprint(&key)?;

        let subject = format!("{account}.{user}");
        let issuer = format!("{subject}.{fingerprint}");
        Ok(Self {
            signing_key: SigningKey::<Sha256>::new(key),
            subject,
            issuer,
        })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Sign an RS256 token valid from `now`.
    pub fn issue(&self, now: DateTime<Utc>) -> Result<String, DemoError> {
        let header = JwtHeader {
            alg: "RS256",
            typ: "JWT",
        };
        let claims = JwtClaims {
            iss: &self.issuer,
            sub: &self.subject,
            iat: now.timestamp(),
            exp: (now + Duration::minutes(TOKEN_LIFETIME_MINUTES)).timestamp(),
        };
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?),
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?)
        );
        let signature = self.signing_key.sign(signing_input.as_bytes()).to_bytes();
        Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature)))
    }
}

/// Account locator without region or cloud suffix, uppercased.
pub fn account_identifier(account: &str) -> String {
    account
        .split('.')
        .next()
        .unwrap_or(account)
        .to_uppercase()
}

/// Accepts unencrypted PKCS#8 (`BEGIN PRIVATE KEY`) or PKCS#1
/// (`BEGIN RSA PRIVATE KEY`) PEM.
pub fn parse_private_key(pem: &[u8]) -> Result<RsaPrivateKey, DemoError> {
    let pem = std::str::from_utf8(pem)
        .map_err(|_| DemoError::InvalidPrivateKey("key file is not PEM text".to_string()))?;
    if pem.contains("ENCRYPTED PRIVATE KEY") {
        return Err(DemoError::InvalidPrivateKey(
            "encrypted private keys are not supported".to_string(),
        ));
    }
    RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
        .map_err(|e| DemoError::InvalidPrivateKey(e.to_string()))
}

/// `SHA256:` + base64 of the SHA-256 digest of the DER public key.
pub fn public_key_fingerprint(key: &RsaPrivateKey) -> Result<String, DemoError> {
    let der = key
        .to_public_key()
        .to_public_key_der()
        .map_err(|e| DemoError::InvalidPrivateKey(e.to_string()))?;
    let digest = Sha256::digest(der.as_bytes());
    Ok(format!("SHA256:{}", STANDARD.encode(digest)))
}
