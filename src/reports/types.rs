use serde::{Deserialize, Serialize};

/// One report record from the listing collaborator. Image paths are null
/// until the analysis pipeline has written them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub report_id: String,
    pub report_image_path: Option<String>,
    pub mask_image_path: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Report {
    /// Filename component of the stored report image, used to address the
    /// file retrieval endpoint.
    pub fn report_image_filename(&self) -> Option<&str> {
        self.report_image_path
            .as_deref()
            .and_then(|path| path.rsplit('/').next())
    }
}

/// Envelope returned by `GET /api/reports`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportPage {
    pub items: Vec<Report>,
}
