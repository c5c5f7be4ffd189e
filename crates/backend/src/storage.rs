//! Object storage API.

use chrono::{DateTime, Utc};
use reqwest::Method;
use tracing::instrument;

use crate::{Backend, BackendError};

/// Object path for an uploaded file: `<unix millis>_<sanitized name>`.
///
/// Anything other than ASCII letters, digits, `.`, `-` and `_` becomes `_`,
/// so the path is safe to use unescaped in a URL.
#[must_use]
pub fn object_path(file_name: &str, now: DateTime<Utc>) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name)
        .trim();
    let sanitized: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let sanitized = if sanitized.trim_matches(['.', '_']).is_empty() {
        "upload".to_string()
    } else {
        sanitized
    };
    format!("{}_{sanitized}", now.timestamp_millis())
}

impl Backend {
    /// Public URL of an object in a public bucket.
    #[must_use]
    pub fn public_url(&self, bucket: &str, path: &str) -> String {
        self.endpoint(&format!("storage/v1/object/public/{bucket}/{path}"))
    }

    /// Upload an object and return its public URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the upload (for example when
    /// the path already exists).
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, BackendError> {
        let request = self
            .request(Method::POST, &format!("storage/v1/object/{bucket}/{path}"))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes);
        self.send(request).await?;
        Ok(self.public_url(bucket, path))
    }
}
