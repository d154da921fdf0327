use anyhow::{bail, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;

// Fixed claim set version tag; bump when the claim layout changes.
const CLAIMS_VERSION: &str = "v1";

#[derive(Clone)]
pub struct JwtService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    expiry: Duration,
    refresh_grace: Duration,
}

impl JwtService {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            issuer: config.jwt_issuer.clone(),
            audience: config.jwt_audience.clone(),
            expiry: Duration::hours(config.jwt_expiry_hours),
            refresh_grace: Duration::days(config.jwt_refresh_grace_days),
        })
    }

    pub fn issue(&self, id: &str, email: &str, role: &str, name: &str) -> Result<String> {
        let now = Utc::now();
        let exp = now + self.expiry;
        let claims = Claims {
            sub: id.to_owned(),
            email: email.to_owned(),
            role: role.to_owned(),
            name: name.to_owned(),
            version: CLAIMS_VERSION.to_owned(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn verify(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(&[self.audience.clone()]);
        validation.set_issuer(&[self.issuer.clone()]);
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }

    /// Re-signs the claims of a presented token with a fresh expiry.
    ///
    /// The signature is always verified; the old token may be expired, but
    /// by no more than the configured grace window. There is no server-side
    /// revocation list.
    pub fn refresh(&self, token: &str) -> Result<String> {
        let mut validation = Validation::default();
        validation.set_audience(&[self.audience.clone()]);
        validation.set_issuer(&[self.issuer.clone()]);
        validation.validate_exp = false;
        let data = decode::<Claims>(token, &self.decoding, &validation)?;

        let claims = data.claims;
        let expired_at = claims.exp;
        if expired_at + self.refresh_grace.num_seconds() < Utc::now().timestamp() {
            bail!("token expired beyond the refresh grace window");
        }

        self.issue(&claims.sub, &claims.email, &claims.role, &claims.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub name: String,
    pub version: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}
