//! Object store for invoice PDFs
//!
//! Uploads rendered PDFs under `invoice_<number>.pdf` and issues
//! short-TTL read-only signed URLs. The public API never exposes the
//! direct blob URL: downloads go through the authenticated proxy route,
//! which calls [`ObjectStore::presign_download`] after verifying
//! ownership.

pub mod pdf;

use std::time::Duration;

use aws_sdk_s3::presigning::PresigningConfig;
use shared::error::{AppError, ErrorCode};

use crate::config::Config;

/// Signed URL lifetime
const SIGNED_URL_TTL: Duration = Duration::from_secs(300);

#[derive(Clone)]
pub struct ObjectStore {
    s3: aws_sdk_s3::Client,
    bucket: String,
}

/// Blob key for one invoice
pub fn object_key(invoice_number: &str) -> String {
    format!("invoice_{invoice_number}.pdf")
}

impl ObjectStore {
    pub async fn new(config: &Config) -> Self {
        let base = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .load()
            .await;
        let credentials = aws_sdk_s3::config::Credentials::new(
            config.storage_account.clone(),
            config.storage_access_key.clone(),
            None,
            None,
            "kirana-config",
        );
        let mut builder =
            aws_sdk_s3::config::Builder::from(&base).credentials_provider(credentials);
        if let Some(endpoint) = &config.storage_endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            s3: aws_sdk_s3::Client::from_conf(builder.build()),
            bucket: config.storage_container.clone(),
        }
    }

    /// Upload an invoice PDF; overwrites any previous render
    pub async fn upload_invoice_pdf(
        &self,
        invoice_number: &str,
        bytes: Vec<u8>,
    ) -> Result<String, AppError> {
        let key = object_key(invoice_number);
        self.s3
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type("application/pdf")
            .body(bytes.into())
            .send()
            .await
            .map_err(|e| {
                tracing::error!(key = %key, "Invoice PDF upload failed: {e}");
                AppError::new(ErrorCode::StorageError)
            })?;
        Ok(key)
    }

    /// Five-minute read-only signed URL for an uploaded invoice
    pub async fn presign_download(&self, invoice_number: &str) -> Result<String, AppError> {
        let key = object_key(invoice_number);
        let presigning = PresigningConfig::expires_in(SIGNED_URL_TTL).map_err(|e| {
            tracing::error!("Presigning config rejected: {e}");
            AppError::new(ErrorCode::StorageError)
        })?;

        let request = self
            .s3
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .presigned(presigning)
            .await
            .map_err(|e| {
                tracing::error!(key = %key, "Presign failed: {e}");
                AppError::new(ErrorCode::StorageError)
            })?;

        Ok(request.uri().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_shape() {
        assert_eq!(object_key("INV-2026-042"), "invoice_INV-2026-042.pdf");
    }
}
