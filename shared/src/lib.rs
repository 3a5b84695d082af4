use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DefectAnalysisResponse {
    pub total_log_area: u64,
    pub defect_area: u64,
    pub defect_ratio: f64,
    /// Base64 encoded PNG of the side-by-side figure.
    pub image_blob: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BoxplotSummary {
    #[serde(rename = "Q1")]
    pub q1: f64,
    #[serde(rename = "Median")]
    pub median: f64,
    #[serde(rename = "Q3")]
    pub q3: f64,
    #[serde(rename = "IQR")]
    pub iqr: f64,
    #[serde(rename = "Outliers")]
    pub outliers: Vec<u32>,
    #[serde(rename = "Q1_Q3_range")]
    pub q1_q3_range: (i64, i64),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RingCountResponse {
    pub pith_center: (i32, i32),
    pub ring_counts: Vec<u32>,
    pub mean_ring_count: f64,
    pub img_canny: String,
    pub img_polar: String,
    pub img_boxplot: String,
    pub boxplot_summary: BoxplotSummary,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ChatRequest {
    pub question: String,
    #[serde(default = "default_session_id")]
    pub session_id: String,
}

pub fn default_session_id() -> String {
    "default".to_string()
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SourceDocument {
    pub source_id: usize,
    pub metadata: serde_json::Value,
    pub content_preview: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ChatResponse {
    pub answer: String,
    pub session_id: String,
    pub sources: Vec<SourceDocument>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SessionsResponse {
    pub active_sessions: Vec<String>,
    pub total_sessions: usize,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UserCreate {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UserRead {
    pub name: String,
    pub email: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Message {
    pub message: String,
}
