//! Thin client for the report listing and file retrieval collaborators.

use anyhow::{ensure, Context, Result};
use bytes::Bytes;

use crate::common::config::AppConfig;
use crate::common::errors::UploadError;
use crate::reports::types::{Report, ReportPage};

pub struct ReportsClient {
    http: reqwest::Client,
    base: String,
}

impl ReportsClient {
    pub fn new(config: &AppConfig) -> Result<Self, UploadError> {
        Ok(Self {
            http: reqwest::Client::new(),
            base: config.http_base()?,
        })
    }

    /// Fetches every report record.
    pub async fn list(&self) -> Result<Vec<Report>> {
        let url = format!("{}/api/reports", self.base);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;
        ensure!(
            resp.status().is_success(),
            "GET {} returned {}",
            url,
            resp.status()
        );
        let page: ReportPage = resp
            .json()
            .await
            .context("invalid report listing payload")?;
        Ok(page.items)
    }

    /// URL of a stored report image.
    pub fn report_image_url(&self, report_id: &str, filename: &str) -> String {
        format!("{}/api/files/{}/report/{}", self.base, report_id, filename)
    }

    /// URL of a report's segmentation mask.
    pub fn mask_image_url(&self, report_id: &str) -> String {
        format!("{}/api/files/{}/mask", self.base, report_id)
    }

    /// Downloads a stored file.
    pub async fn fetch(&self, url: &str) -> Result<Bytes> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;
        ensure!(
            resp.status().is_success(),
            "GET {} returned {}",
            url,
            resp.status()
        );
        resp.bytes().await.context("failed to read file body")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_for(base: &str) -> ReportsClient {
        let mut config = AppConfig::default();
        config.api.url = base.to_string();
        ReportsClient::new(&config).unwrap()
    }

    #[test]
    fn builds_file_urls_from_base() {
        let client = client_for("http://localhost:8000/");

        assert_eq!(
            client.report_image_url("abc123", "scan.png"),
            "http://localhost:8000/api/files/abc123/report/scan.png"
        );
        assert_eq!(
            client.mask_image_url("abc123"),
            "http://localhost:8000/api/files/abc123/mask"
        );
    }

    #[test]
    fn rejects_unset_base() {
        assert!(matches!(
            ReportsClient::new(&AppConfig::default()),
            Err(UploadError::Config(_))
        ));
    }

    #[test]
    fn report_image_filename_strips_directories() {
        let report = Report {
            report_id: "abc123".to_string(),
            report_image_path: Some("reports/abc123/scan.png".to_string()),
            mask_image_path: None,
            created_at: "2024-01-01T00:00:00Z".to_string(),
            updated_at: "2024-01-01T00:00:00Z".to_string(),
        };

        assert_eq!(report.report_image_filename(), Some("scan.png"));
    }
}
