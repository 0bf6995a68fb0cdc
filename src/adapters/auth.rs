use crate::utils::error::{EtlError, Result};
use base64::prelude::BASE64_URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use reqwest::{Client, Response};
use ring::signature::RsaKeyPair;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::sync::OnceCell;
use url::Url;

pub const SPREADSHEETS_FEED_SCOPE: &str = "https://spreadsheets.google.com/feeds";
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

#[derive(Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    token_uri: String,
    #[serde(default)]
    private_key_id: Option<String>,
}

#[derive(Serialize)]
struct JwtHeader<'a> {
    alg: &'static str,
    typ: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    kid: Option<&'a str>,
}

#[derive(Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    exp: i64,
    iat: i64,
}

#[derive(Debug, Deserialize)]
struct AccessToken {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Service account identity loaded from a key file.
///
/// The private key is parsed eagerly, so a key file that loads here will not
/// fail later for key-format reasons.
pub struct ServiceAccountCredentials {
    client_email: String,
    token_uri: String,
    private_key_id: Option<String>,
    key_pair: RsaKeyPair,
    scopes: Vec<String>,
}

impl fmt::Debug for ServiceAccountCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountCredentials")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountCredentials {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            EtlError::credential(format!("cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(input: &str) -> Result<Self> {
        let key: ServiceAccountKey = serde_json::from_str(input)
            .map_err(|e| EtlError::credential(format!("invalid service account json: {}", e)))?;
        let key_pair = parse_private_key(&key.private_key)?;

        Ok(Self {
            client_email: key.client_email,
            token_uri: key.token_uri,
            private_key_id: key.private_key_id,
            key_pair,
            scopes: Vec::new(),
        })
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Self-signed RS256 JWT, valid for one hour, to exchange at `token_uri`.
    pub fn signed_assertion(&self) -> Result<String> {
        let now = Utc::now();
        let scope = self.scopes.join(" ");
        let claims = JwtClaims {
            iss: &self.client_email,
            scope: &scope,
            aud: &self.token_uri,
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
        };
        let header = JwtHeader {
            alg: "RS256",
            typ: "JWT",
            kid: self.private_key_id.as_deref(),
        };

        let header_b64 = BASE64_URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
        let claims_b64 = BASE64_URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
        let signing_input = format!("{}.{}", header_b64, claims_b64);

        let mut signature = vec![0; self.key_pair.public().modulus_len()];
        self.key_pair
            .sign(
                &ring::signature::RSA_PKCS1_SHA256,
                &ring::rand::SystemRandom::new(),
                signing_input.as_bytes(),
                &mut signature,
            )
            .map_err(|_| EtlError::credential("failed to sign jwt assertion"))?;

        Ok(format!(
            "{}.{}",
            signing_input,
            BASE64_URL_SAFE_NO_PAD.encode(&signature)
        ))
    }
}

fn parse_private_key(pem: &str) -> Result<RsaKeyPair> {
    let mut reader = std::io::Cursor::new(pem.as_bytes());
    let item = rustls_pemfile::read_one(&mut reader)
        .map_err(|e| EtlError::credential(format!("invalid PEM private key: {}", e)))?;

    match item {
        Some(rustls_pemfile::Item::Pkcs8Key(der)) => RsaKeyPair::from_pkcs8(der.secret_pkcs8_der())
            .map_err(|e| EtlError::credential(format!("rejected pkcs8 key: {}", e))),
        Some(rustls_pemfile::Item::Pkcs1Key(der)) => RsaKeyPair::from_der(der.secret_pkcs1_der())
            .map_err(|e| EtlError::credential(format!("rejected pkcs1 key: {}", e))),
        _ => Err(EtlError::credential("no RSA private key in credential file")),
    }
}

/// HTTP session bound to one set of credentials.
///
/// No network traffic happens until the first request; the access token is
/// then fetched once and reused for the rest of the session.
#[derive(Debug)]
pub struct AuthorizedSession {
    credentials: ServiceAccountCredentials,
    client: Client,
    token: OnceCell<String>,
}

impl AuthorizedSession {
    pub fn new(credentials: ServiceAccountCredentials) -> Self {
        Self {
            credentials,
            client: Client::new(),
            token: OnceCell::new(),
        }
    }

    pub async fn access_token(&self) -> Result<&str> {
        let token = self
            .token
            .get_or_try_init(|| self.fetch_access_token())
            .await?;
        Ok(token.as_str())
    }

    async fn fetch_access_token(&self) -> Result<String> {
        let assertion = self.credentials.signed_assertion()?;
        tracing::debug!(
            "Requesting access token for {} from {}",
            self.credentials.client_email,
            self.credentials.token_uri
        );

        let response = self
            .client
            .post(&self.credentials.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EtlError::credential(format!(
                "token exchange rejected ({}): {}",
                status, body
            )));
        }

        let token: AccessToken = response.json().await?;
        tracing::debug!("Access token granted, expires in {:?}s", token.expires_in);
        Ok(token.access_token)
    }

    pub async fn get(&self, url: Url) -> Result<Response> {
        let token = self.access_token().await?;
        tracing::debug!("GET {}", url);
        let response = self.client.get(url).bearer_auth(token).send().await?;
        tracing::debug!("Response status: {}", response.status());
        Ok(response)
    }
}

/// Loads the credential file and scopes it for the spreadsheet service.
#[derive(Debug, Clone)]
pub struct Authenticator {
    credentials_path: PathBuf,
    scopes: Vec<String>,
}

impl Authenticator {
    pub fn new(credentials_path: impl Into<PathBuf>) -> Self {
        Self {
            credentials_path: credentials_path.into(),
            scopes: vec![SPREADSHEETS_FEED_SCOPE.to_string(), DRIVE_SCOPE.to_string()],
        }
    }

    pub fn authorize(&self) -> Result<AuthorizedSession> {
        tracing::info!(
            "🔑 Loading credentials from: {}",
            self.credentials_path.display()
        );
        let credentials = ServiceAccountCredentials::from_file(&self.credentials_path)?
            .with_scopes(self.scopes.iter().cloned());
        tracing::debug!("Credentials loaded for {}", credentials.client_email());
        Ok(AuthorizedSession::new(credentials))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    const KEY_FILE: &str = include_str!("../../tests/fixtures/service_account.json");

    fn key_file_with_token_uri(token_uri: &str) -> String {
        let mut value: serde_json::Value = serde_json::from_str(KEY_FILE).unwrap();
        value["token_uri"] = serde_json::Value::from(token_uri);
        value.to_string()
    }

    fn decode_segment(segment: &str) -> serde_json::Value {
        let bytes = BASE64_URL_SAFE_NO_PAD.decode(segment).unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_load_fixture_credentials() {
        let creds = ServiceAccountCredentials::from_json_str(KEY_FILE).unwrap();
        assert_eq!(
            creds.client_email(),
            "loader@sheet-etl-test.iam.gserviceaccount.com"
        );
        assert!(creds.scopes().is_empty());
    }

    #[test]
    fn test_malformed_private_key_is_credential_error() {
        let mut value: serde_json::Value = serde_json::from_str(KEY_FILE).unwrap();
        value["private_key"] = serde_json::Value::from("not a pem");
        let err = ServiceAccountCredentials::from_json_str(&value.to_string()).unwrap_err();
        assert!(matches!(err, EtlError::CredentialError { .. }));
    }

    #[test]
    fn test_missing_fields_is_credential_error() {
        let err = ServiceAccountCredentials::from_json_str(r#"{"client_email": "a@b"}"#)
            .unwrap_err();
        assert!(matches!(err, EtlError::CredentialError { .. }));
    }

    #[test]
    fn test_missing_file_fails_before_session() {
        let auth = Authenticator::new("/definitely/not/here.json");
        let err = auth.authorize().unwrap_err();
        assert!(matches!(err, EtlError::CredentialError { .. }));
    }

    #[test]
    fn test_signed_assertion_carries_both_scopes() {
        let creds = ServiceAccountCredentials::from_json_str(KEY_FILE)
            .unwrap()
            .with_scopes([SPREADSHEETS_FEED_SCOPE, DRIVE_SCOPE]);
        let jwt = creds.signed_assertion().unwrap();
        let parts: Vec<&str> = jwt.split('.').collect();
        assert_eq!(parts.len(), 3);

        let header = decode_segment(parts[0]);
        assert_eq!(header["alg"], "RS256");
        assert_eq!(header["kid"], "0123456789abcdef");

        let claims = decode_segment(parts[1]);
        assert_eq!(
            claims["scope"],
            "https://spreadsheets.google.com/feeds https://www.googleapis.com/auth/drive"
        );
        assert_eq!(claims["aud"], "https://oauth2.googleapis.com/token");
        assert_eq!(
            claims["exp"].as_i64().unwrap() - claims["iat"].as_i64().unwrap(),
            3600
        );
    }

    #[tokio::test]
    async fn test_access_token_is_fetched_once() {
        let server = MockServer::start();
        let token_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/token")
                .body_contains("grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({
                    "access_token": "ya29.test",
                    "expires_in": 3599,
                    "token_type": "Bearer"
                }));
        });

        let creds =
            ServiceAccountCredentials::from_json_str(&key_file_with_token_uri(&server.url("/token")))
                .unwrap();
        let session = AuthorizedSession::new(creds);

        assert_eq!(session.access_token().await.unwrap(), "ya29.test");
        assert_eq!(session.access_token().await.unwrap(), "ya29.test");
        token_mock.assert_hits(1);
    }

    #[tokio::test]
    async fn test_rejected_token_exchange_is_credential_error() {
        let server = MockServer::start();
        let token_mock = server.mock(|when, then| {
            when.method(POST).path("/token");
            then.status(400)
                .json_body(serde_json::json!({"error": "invalid_grant"}));
        });

        let creds =
            ServiceAccountCredentials::from_json_str(&key_file_with_token_uri(&server.url("/token")))
                .unwrap();
        let session = AuthorizedSession::new(creds);

        let err = session.access_token().await.unwrap_err();
        token_mock.assert();
        assert!(matches!(err, EtlError::CredentialError { .. }));
    }
}
