//! AWS Signature Version 4 for unauthenticated-body `GET` requests.
//!
//! Enough of the scheme to download an object from S3 or MinIO with static
//! credentials. Path segments are re-encoded the way S3 canonicalizes them.
//! Query strings are signed as given, so they must already be in canonical
//! (sorted, encoded) form.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Url;
use sha2::{Digest, Sha256};
use std::borrow::Cow;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";
const SIGNED_HEADERS: &str = "host;x-amz-content-sha256;x-amz-date";

/// Static access credentials for one object storage endpoint.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

/// Headers to attach to a signed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub authorization: String,
    pub amz_date: String,
    pub content_sha256: String,
}

impl Credentials {
    /// Signs a `GET` of `url` with an empty body at time `now`.
    pub fn sign_get(&self, url: &Url, now: DateTime<Utc>) -> SignedHeaders {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let content_sha256 = hex::encode(Sha256::digest(b""));

        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => String::new(),
        };
        let canonical_request = format!(
            "GET\n{}\n{}\nhost:{}\nx-amz-content-sha256:{}\nx-amz-date:{}\n\n{}\n{}",
            canonical_uri(url),
            url.query().unwrap_or_default(),
            host,
            content_sha256,
            amz_date,
            SIGNED_HEADERS,
            content_sha256,
        );

        let scope = format!("{}/{}/{}/aws4_request", date, self.region, SERVICE);
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            amz_date,
            scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let key = [self.region.as_str(), SERVICE, "aws4_request"]
            .iter()
            .fold(
                hmac_sha256(format!("AWS4{}", self.secret_key).as_bytes(), date.as_bytes()),
                |key, part| hmac_sha256(&key, part.as_bytes()),
            );
        let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));

        SignedHeaders {
            authorization: format!(
                "{} Credential={}/{}, SignedHeaders={}, Signature={}",
                ALGORITHM, self.access_key, scope, SIGNED_HEADERS, signature
            ),
            amz_date,
            content_sha256,
        }
    }
}

/// The URL path with each segment percent-encoded per RFC 3986.
fn canonical_uri(url: &Url) -> String {
    let path = url.path();
    if path.is_empty() {
        return "/".to_string();
    }
    path.split('/')
        .map(|segment| {
            let raw = urlencoding::decode(segment).unwrap_or(Cow::Borrowed(segment));
            urlencoding::encode(&raw).into_owned()
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length, so `new_from_slice` cannot fail here.
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => return Vec::new(),
    };
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
