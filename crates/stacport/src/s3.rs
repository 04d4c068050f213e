//! Presigned S3 URLs (AWS Signature Version 4, query authentication).
//!
//! Objects are addressed virtual-hosted style on AWS and path style on a
//! custom endpoint. Only the `host` header is signed and the payload is left
//! unsigned, so the URL works for any body.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use url::Url;

use crate::http::HttpMethod;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";
const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct S3Settings {
    pub bucket: String,
    /// Custom endpoint, e.g. a MinIO server; AWS when absent.
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    /// Lifetime of presigned URLs in seconds.
    #[serde(default = "default_expiration")]
    pub presigned_expiration: u64,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_expiration() -> u64 {
    3600
}

#[derive(Debug, Error)]
pub enum S3Error {
    #[error("invalid S3 endpoint '{0}'")]
    InvalidEndpoint(String),

    #[error("failed to initialize request signer")]
    Signer,
}

fn uri_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

fn hmac(key: &[u8], data: &str) -> Result<Vec<u8>, S3Error> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| S3Error::Signer)?;
    mac.update(data.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Scheme, host (with non-default port) and path prefix of the bucket.
fn bucket_location(settings: &S3Settings) -> Result<(String, String, String), S3Error> {
    let Some(endpoint) = settings.endpoint_url.as_deref().filter(|e| !e.is_empty()) else {
        let host = if settings.region == DEFAULT_REGION {
            format!("{}.s3.amazonaws.com", settings.bucket)
        } else {
            format!("{}.s3.{}.amazonaws.com", settings.bucket, settings.region)
        };
        return Ok(("https".to_string(), host, String::new()));
    };

    let url = Url::parse(endpoint).map_err(|_| S3Error::InvalidEndpoint(endpoint.to_string()))?;
    let host = url
        .host_str()
        .ok_or_else(|| S3Error::InvalidEndpoint(endpoint.to_string()))?;
    let host = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    let prefix = format!(
        "{}/{}",
        url.path().trim_end_matches('/'),
        uri_encode(&settings.bucket)
    );
    Ok((url.scheme().to_string(), host, prefix))
}

/// Presigned URL for `method` on object `key`, valid from `now`.
pub fn presign(
    settings: &S3Settings,
    method: HttpMethod,
    key: &str,
    now: DateTime<Utc>,
) -> Result<String, S3Error> {
    let (scheme, host, prefix) = bucket_location(settings)?;
    let path = format!(
        "{prefix}/{}",
        key.trim_start_matches('/')
            .split('/')
            .map(uri_encode)
            .collect::<Vec<_>>()
            .join("/")
    );

    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();
    let scope = format!("{date}/{}/{SERVICE}/aws4_request", settings.region);

    let mut query = [
        ("X-Amz-Algorithm", ALGORITHM.to_string()),
        (
            "X-Amz-Credential",
            format!("{}/{scope}", settings.access_key),
        ),
        ("X-Amz-Date", amz_date.clone()),
        ("X-Amz-Expires", settings.presigned_expiration.to_string()),
        ("X-Amz-SignedHeaders", "host".to_string()),
    ]
    .iter()
    .map(|(k, v)| (uri_encode(k), uri_encode(v)))
    .collect::<Vec<_>>();
    query.sort();
    let canonical_query = query
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let canonical_request = format!(
        "{}\n{path}\n{canonical_query}\nhost:{host}\n\nhost\nUNSIGNED-PAYLOAD",
        method.as_str()
    );
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let key_date = hmac(format!("AWS4{}", settings.secret_key).as_bytes(), &date)?;
    let key_region = hmac(&key_date, &settings.region)?;
    let key_service = hmac(&key_region, SERVICE)?;
    let key_signing = hmac(&key_service, "aws4_request")?;
    let signature = hex::encode(hmac(&key_signing, &string_to_sign)?);

    tracing::debug!(method = method.as_str(), key, "presigned S3 URL");
    Ok(format!(
        "{scheme}://{host}{path}?{canonical_query}&X-Amz-Signature={signature}"
    ))
}
