use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;

use super::{content_type_for_key, ObjectMeta, ObjectStore, ObjectStoreError, ObjectStream};

/// Tokens are refreshed this long before their reported expiry so
/// in-flight requests never carry one that lapses mid-call.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// Google Cloud Storage backend (the hosted-storage option).
pub struct GcsStore {
    bucket: String,
    client: Client,
    access_token: tokio::sync::RwLock<CachedToken>,
    /// Service account key, when one was provided. Needed both for the
    /// OAuth token grant and for V4 URL signing; without it tokens come
    /// from the metadata server and signed URLs are unavailable.
    key: Option<ServiceAccountKey>,
}

struct CachedToken {
    value: String,
    expires_at: chrono::DateTime<chrono::Utc>,
}

fn token_is_fresh(
    expires_at: chrono::DateTime<chrono::Utc>,
    now: chrono::DateTime<chrono::Utc>,
) -> bool {
    now + chrono::Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) < expires_at
}

#[derive(Clone, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    token_uri: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_ttl")]
    expires_in: i64,
}

fn default_token_ttl() -> i64 {
    3600
}

#[derive(Deserialize)]
struct ObjectMetadataResponse {
    size: String,
    updated: Option<chrono::DateTime<chrono::Utc>>,
}

impl GcsStore {
    pub async fn new(bucket: &str, credentials_file: Option<&str>) -> Result<Self, anyhow::Error> {
        let client = Client::builder().build()?;

        let key = match credentials_file {
            Some(path) => {
                let key_json = tokio::fs::read_to_string(path).await?;
                Some(serde_json::from_str::<ServiceAccountKey>(&key_json)?)
            }
            None => None,
        };

        let store = Self {
            bucket: bucket.to_string(),
            client,
            access_token: tokio::sync::RwLock::new(CachedToken {
                value: String::new(),
                expires_at: chrono::DateTime::<chrono::Utc>::MIN_UTC,
            }),
            key,
        };

        store.refresh_token().await?;
        Ok(store)
    }

    /// The cached access token, refreshed when it is at or near expiry.
    /// OAuth grants live about an hour, so long-lived processes refresh
    /// many times.
    async fn current_token(&self) -> Result<String, anyhow::Error> {
        {
            let cached = self.access_token.read().await;
            if token_is_fresh(cached.expires_at, chrono::Utc::now()) {
                return Ok(cached.value.clone());
            }
        }
        self.refresh_token().await?;
        Ok(self.access_token.read().await.value.clone())
    }

    async fn refresh_token(&self) -> Result<(), anyhow::Error> {
        let token = match &self.key {
            Some(key) => self.token_from_service_account(key).await?,
            None => self.token_from_metadata_server().await?,
        };

        let mut lock = self.access_token.write().await;
        *lock = CachedToken {
            expires_at: chrono::Utc::now() + chrono::Duration::seconds(token.expires_in),
            value: token.access_token,
        };
        Ok(())
    }

    async fn token_from_service_account(
        &self,
        key: &ServiceAccountKey,
    ) -> Result<TokenResponse, anyhow::Error> {
        let now = chrono::Utc::now().timestamp();
        let claims = serde_json::json!({
            "iss": key.client_email,
            "scope": "https://www.googleapis.com/auth/devstorage.read_write",
            "aud": key.token_uri,
            "iat": now,
            "exp": now + 3600,
        });

        // Build JWT (header.claims.signature)
        let header = base64_url_encode(&serde_json::to_vec(&serde_json::json!({
            "alg": "RS256",
            "typ": "JWT"
        }))?);
        let payload = base64_url_encode(&serde_json::to_vec(&claims)?);
        let unsigned = format!("{header}.{payload}");

        let signature = sign_rs256(unsigned.as_bytes(), &key.private_key)?;
        let jwt = format!("{unsigned}.{}", base64_url_encode(&signature));

        let resp: TokenResponse = self
            .client
            .post(&key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", &jwt),
            ])
            .send()
            .await?
            .json()
            .await?;

        Ok(resp)
    }

    async fn token_from_metadata_server(&self) -> Result<TokenResponse, anyhow::Error> {
        let resp: TokenResponse = self
            .client
            .get("http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token")
            .header("Metadata-Flavor", "Google")
            .send()
            .await?
            .json()
            .await?;

        Ok(resp)
    }

    fn upload_url(&self, key: &str) -> String {
        format!(
            "https://storage.googleapis.com/upload/storage/v1/b/{}/o?uploadType=media&name={}",
            self.bucket,
            urlencoding::encode(key)
        )
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "https://storage.googleapis.com/storage/v1/b/{}/o/{}?alt=media",
            self.bucket,
            urlencoding::encode(key)
        )
    }

    fn metadata_url(&self, key: &str) -> String {
        format!(
            "https://storage.googleapis.com/storage/v1/b/{}/o/{}",
            self.bucket,
            urlencoding::encode(key)
        )
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        let token = self
            .current_token()
            .await
            .map_err(|e| ObjectStoreError::Write(e.to_string()))?;

        let resp = self
            .client
            .post(self.upload_url(key))
            .bearer_auth(&token)
            .header("Content-Type", content_type)
            .body(data)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Write(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ObjectStoreError::Write(format!(
                "GCS upload failed ({status}): {body}"
            )));
        }

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        let token = self
            .current_token()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        let resp = self
            .client
            .delete(self.metadata_url(key))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::warn!(key, "Delete of nonexistent object");
            return Ok(());
        }

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ObjectStoreError::Backend(format!(
                "GCS delete failed ({status}): {body}"
            )));
        }

        Ok(())
    }

    async fn get_stream(&self, key: &str) -> Result<ObjectStream, ObjectStoreError> {
        let token = self
            .current_token()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        let resp = self
            .client
            .get(self.object_url(key))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ObjectStoreError::NotFound(key.to_string()));
        }

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ObjectStoreError::Backend(format!(
                "GCS download failed ({status}): {body}"
            )));
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.to_string())
            .unwrap_or_else(|| content_type_for_key(key));
        let content_length = resp.content_length();

        let stream = resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(std::io::Error::other))
            .boxed();

        Ok(ObjectStream {
            stream,
            content_type,
            content_length,
        })
    }

    async fn head(&self, key: &str) -> Result<ObjectMeta, ObjectStoreError> {
        let token = self
            .current_token()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        let resp = self
            .client
            .get(self.metadata_url(key))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ObjectStoreError::NotFound(key.to_string()));
        }

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ObjectStoreError::Backend(format!(
                "GCS head failed ({status}): {body}"
            )));
        }

        let meta: ObjectMetadataResponse = resp
            .json()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        Ok(ObjectMeta {
            size: meta.size.parse().unwrap_or(0),
            last_modified: meta.updated,
        })
    }

    /// V4 signed URL (GOOG4-RSA-SHA256 query signing). Requires the
    /// service account key; metadata-server deployments cannot sign and
    /// the caller falls back to proxying.
    async fn signed_url(
        &self,
        key: &str,
        _content_type: &str,
        expires_in: Duration,
    ) -> Result<String, ObjectStoreError> {
        let sa = self.key.as_ref().ok_or_else(|| {
            ObjectStoreError::SigningUnavailable(
                "GCS signed URLs require a service account key".to_string(),
            )
        })?;

        let now = chrono::Utc::now();
        let datetime = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let scope = format!("{date}/auto/storage/goog4_request");
        let credential = format!("{}/{scope}", sa.client_email);

        let canonical_uri = format!(
            "/{}/{}",
            self.bucket,
            key.split('/')
                .map(|seg| urlencoding::encode(seg).into_owned())
                .collect::<Vec<_>>()
                .join("/")
        );

        // Sorted by parameter name, values percent-encoded
        let canonical_query = format!(
            "X-Goog-Algorithm=GOOG4-RSA-SHA256\
             &X-Goog-Credential={}\
             &X-Goog-Date={datetime}\
             &X-Goog-Expires={}\
             &X-Goog-SignedHeaders=host",
            urlencoding::encode(&credential),
            expires_in.as_secs(),
        );

        let canonical_request = format!(
            "GET\n{canonical_uri}\n{canonical_query}\nhost:storage.googleapis.com\n\nhost\nUNSIGNED-PAYLOAD"
        );
        let request_hash = hex_encode(
            ring::digest::digest(&ring::digest::SHA256, canonical_request.as_bytes()).as_ref(),
        );

        let string_to_sign =
            format!("GOOG4-RSA-SHA256\n{datetime}\n{scope}\n{request_hash}");

        let signature = sign_rs256(string_to_sign.as_bytes(), &sa.private_key)
            .map_err(|e| ObjectStoreError::SigningUnavailable(e.to_string()))?;

        Ok(format!(
            "https://storage.googleapis.com{canonical_uri}?{canonical_query}&X-Goog-Signature={}",
            hex_encode(&signature)
        ))
    }
}

fn base64_url_encode(data: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(data)
}

fn hex_encode(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}

fn sign_rs256(data: &[u8], private_key_pem: &str) -> Result<Vec<u8>, anyhow::Error> {
    // Strip PEM headers and decode base64 to DER
    let der_b64: String = private_key_pem
        .lines()
        .filter(|line| !line.starts_with("-----"))
        .collect();
    let der = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &der_b64)?;

    let key_pair = ring::signature::RsaKeyPair::from_pkcs8(&der)
        .map_err(|e| anyhow::anyhow!("Failed to parse RSA key: {e}"))?;

    let mut signature = vec![0u8; key_pair.public().modulus_len()];
    key_pair
        .sign(
            &ring::signature::RSA_PKCS1_SHA256,
            &ring::rand::SystemRandom::new(),
            data,
            &mut signature,
        )
        .map_err(|e| anyhow::anyhow!("Failed to sign: {e}"))?;

    Ok(signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn token_freshness_respects_refresh_margin() {
        let now = Utc::now();

        // Comfortably inside the lifetime
        assert!(token_is_fresh(now + Duration::seconds(3600), now));

        // Inside the refresh margin, at expiry, and past it all trigger
        // a refresh
        assert!(!token_is_fresh(
            now + Duration::seconds(TOKEN_REFRESH_MARGIN_SECS),
            now
        ));
        assert!(!token_is_fresh(now, now));
        assert!(!token_is_fresh(now - Duration::seconds(1), now));

        // Just outside the margin is still fresh
        assert!(token_is_fresh(
            now + Duration::seconds(TOKEN_REFRESH_MARGIN_SECS + 1),
            now
        ));
    }

    #[test]
    fn token_response_defaults_ttl() {
        let resp: TokenResponse =
            serde_json::from_str(r#"{"access_token": "abc"}"#).unwrap();
        assert_eq!(resp.expires_in, 3600);

        let resp: TokenResponse =
            serde_json::from_str(r#"{"access_token": "abc", "expires_in": 1799}"#).unwrap();
        assert_eq!(resp.expires_in, 1799);
    }
}
