// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Token and certificate issuance.

use std::sync::Arc;

use chrono::Utc;
use md5::{Digest, Md5};
use rcgen::{CertificateParams, DnType, ExtendedKeyUsagePurpose, KeyPair};
use rsa::RsaPrivateKey;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use kato_store::repo::{AuthStore, Store};
use kato_store::types::RegionUserInfoRecord;

use crate::auth::{SERVER_SOURCE, TokenCache};
use crate::error::{ApiError, Result};

/// Token issuance request.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenDispatchRequest {
    /// Enterprise the token is issued for.
    pub eid: String,
    /// Expiry as unix seconds.
    pub validity_period: i64,
    /// Scope class; defaults to `server_source`.
    #[serde(default)]
    pub api_range: Option<String>,
}

/// Issues and rotates region tokens. Replacing a token evicts the old
/// one from the cache so it stops working immediately.
pub struct TokenDispatcher {
    store: Arc<dyn Store>,
    cache: Arc<TokenCache>,
    region_name: String,
}

impl TokenDispatcher {
    /// Create a dispatcher.
    pub fn new(store: Arc<dyn Store>, cache: Arc<TokenCache>, region_name: String) -> Self {
        Self {
            store,
            cache,
            region_name,
        }
    }

    /// Issue a token for an enterprise, replacing any earlier one.
    #[instrument(skip(self, request), fields(eid = %request.eid))]
    pub async fn dispatch(&self, request: TokenDispatchRequest) -> Result<RegionUserInfoRecord> {
        if request.eid.is_empty() {
            return Err(ApiError::Validation("eid is required".to_string()));
        }
        if request.validity_period <= Utc::now().timestamp() {
            return Err(ApiError::Validation(
                "validity_period must be in the future".to_string(),
            ));
        }
        let api_range = request
            .api_range
            .clone()
            .unwrap_or_else(|| SERVER_SOURCE.to_string());

        let now = Utc::now().timestamp();
        let token = derive_token(
            &request.eid,
            &self.region_name,
            &api_range,
            request.validity_period,
            now,
        );

        let old = self.store.get_token_by_eid(&request.eid).await?;
        let record = RegionUserInfoRecord {
            eid: request.eid.clone(),
            token,
            api_range,
            ca: old.as_ref().and_then(|o| o.ca.clone()),
            key: old.as_ref().and_then(|o| o.key.clone()),
            validity_period: request.validity_period,
        };
        self.store.save_token(&record).await?;

        if let Some(old) = old {
            self.cache.evict(&old.token);
        }
        self.cache.insert(record.clone());

        info!(api_range = %record.api_range, "Token dispatched");
        Ok(record)
    }
}

/// Token derivation: md5 hex over the issuance tuple.
fn derive_token(eid: &str, region: &str, api_range: &str, validity: i64, now: i64) -> String {
    let mut hasher = Md5::new();
    hasher.update(format!("{eid}-{region}-{api_range}-{validity}-{now}"));
    hex::encode(hasher.finalize())
}

/// Certificate issuance request.
#[derive(Debug, Clone, Deserialize)]
pub struct CertDispatchRequest {
    /// Enterprise the certificate is issued for (becomes the CN).
    pub eid: String,
    /// Expiry as unix seconds.
    pub validity_period: i64,
    /// Issuance reference time as unix seconds; the certificate lives
    /// for `validity_period - before_time` seconds.
    pub before_time: i64,
}

/// An issued certificate pair.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedCert {
    /// PEM certificate, signed by the region CA.
    pub ca: String,
    /// PEM private key (PKCS#8).
    pub key: String,
}

/// Issues client+server certificates signed by the region CA.
pub struct CertDispatcher {
    ca_pem: String,
    ca_key_pem: String,
}

impl CertDispatcher {
    /// Create a dispatcher over the region CA material.
    pub fn new(ca_pem: String, ca_key_pem: String) -> Self {
        Self { ca_pem, ca_key_pem }
    }

    /// Generate a 2048-bit RSA key and an X.509 certificate usable for
    /// both client and server auth, valid for
    /// `validity_period - before_time` seconds.
    #[instrument(skip(self, request), fields(eid = %request.eid))]
    pub fn issue(&self, request: &CertDispatchRequest) -> Result<IssuedCert> {
        let lifetime_secs = request.validity_period - request.before_time;
        if lifetime_secs <= 0 {
            return Err(ApiError::Validation(
                "validity_period must be after before_time".to_string(),
            ));
        }

        let mut rng = rand::thread_rng();
        let rsa_key = RsaPrivateKey::new(&mut rng, 2048)
            .map_err(|e| ApiError::Internal(format!("rsa keygen: {e}")))?;
        let key_pem = rsa_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| ApiError::Internal(format!("rsa pem: {e}")))?;
        let key_pem = key_pem.as_str().to_owned();
        let key_pair = KeyPair::from_pem(&key_pem)
            .map_err(|e| ApiError::Internal(format!("key pair: {e}")))?;

        let mut params = CertificateParams::new(Vec::new())
            .map_err(|e| ApiError::Internal(format!("cert params: {e}")))?;
        params
            .distinguished_name
            .push(DnType::CommonName, request.eid.clone());
        params.extended_key_usages = vec![
            ExtendedKeyUsagePurpose::ClientAuth,
            ExtendedKeyUsagePurpose::ServerAuth,
        ];
        let now = time::OffsetDateTime::now_utc();
        params.not_before = now;
        params.not_after = now + time::Duration::seconds(lifetime_secs);

        let issuer_key = KeyPair::from_pem(&self.ca_key_pem)
            .map_err(|e| ApiError::Internal(format!("ca key: {e}")))?;
        let issuer_params = CertificateParams::from_ca_cert_pem(&self.ca_pem)
            .map_err(|e| ApiError::Internal(format!("ca cert: {e}")))?;
        let issuer_cert = issuer_params
            .self_signed(&issuer_key)
            .map_err(|e| ApiError::Internal(format!("ca rebuild: {e}")))?;

        let cert = params
            .signed_by(&key_pair, &issuer_cert, &issuer_key)
            .map_err(|e| ApiError::Internal(format!("cert sign: {e}")))?;

        Ok(IssuedCert {
            ca: cert.pem(),
            key: key_pem,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kato_store::memory::MemoryStore;

    #[test]
    fn test_derive_token_is_stable_hex() {
        let a = derive_token("e1", "kato", "server_source", 1900000000, 1750000000);
        let b = derive_token("e1", "kato", "server_source", 1900000000, 1750000000);
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));

        // Any tuple change moves the token.
        let c = derive_token("e2", "kato", "server_source", 1900000000, 1750000000);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_dispatch_rotates_and_evicts() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(TokenCache::new(store.clone()));
        let dispatcher = TokenDispatcher::new(store.clone(), cache.clone(), "kato".to_string());

        let in_an_hour = Utc::now().timestamp() + 3600;
        let first = dispatcher
            .dispatch(TokenDispatchRequest {
                eid: "e1".to_string(),
                validity_period: in_an_hour,
                api_range: None,
            })
            .await
            .unwrap();
        assert!(cache.check_token(&first.token, "/does/not/matter").await.is_ok());

        let second = dispatcher
            .dispatch(TokenDispatchRequest {
                eid: "e1".to_string(),
                validity_period: in_an_hour + 60,
                api_range: None,
            })
            .await
            .unwrap();
        assert_ne!(first.token, second.token);

        // The old token is gone from both cache and repository.
        assert!(!cache.check_token(&first.token, "/v2/show/x").await.unwrap());
    }

    #[tokio::test]
    async fn test_dispatch_rejects_past_validity() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(TokenCache::new(store.clone()));
        let dispatcher = TokenDispatcher::new(store, cache, "kato".to_string());

        let err = dispatcher
            .dispatch(TokenDispatchRequest {
                eid: "e1".to_string(),
                validity_period: Utc::now().timestamp() - 10,
                api_range: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn test_cert_lifetime_validation() {
        let dispatcher = CertDispatcher::new(String::new(), String::new());
        let err = dispatcher
            .issue(&CertDispatchRequest {
                eid: "e1".to_string(),
                validity_period: 100,
                before_time: 200,
            })
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
