use std::env;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub app_name: String,
    pub port: u16,
    pub frontend_url: Option<String>,

    pub jwt_secret_key: String,
    pub jwt_expiration_minutes: i64,

    pub roboflow_api_key: String,
    pub roboflow_segment_url: String,
    pub roboflow_detect_url: String,
    pub surface_model_id: String,
    pub defect_model_id: String,
    pub pith_model_id: String,

    pub gemini_api_key: Option<String>,
    pub gemini_api_url: String,
    pub llm_model: String,
    pub llm_temperature: f32,
    pub embedding_model: String,

    pub dataset_path: String,
    pub index_path: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub retrieval_doc_k: usize,
    pub memory_window_k: usize,
    pub session_ttl_minutes: i64,

    pub analysis_config_path: String,
    pub font_path: Option<String>,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn or_default(name: &str, default: &str) -> String {
    optional(name).unwrap_or_else(|| default.to_string())
}

fn parsed<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(name) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

impl Settings {
    /// Reads settings from the process environment. Call `dotenv::dotenv()`
    /// first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        let settings = Self {
            app_name: or_default("APP_NAME", "Timber-GPT"),
            port: parsed("PORT", 8000)?,
            frontend_url: optional("FRONTEND_URL"),

            jwt_secret_key: required("JWT_SECRET_KEY")?,
            jwt_expiration_minutes: parsed("JWT_EXPIRATION_MINUTES", 60)?,

            roboflow_api_key: required("ROBOFLOW_API_KEY")?,
            roboflow_segment_url: or_default(
                "ROBOFLOW_SEGMENT_URL",
                "https://serverless.roboflow.com",
            ),
            roboflow_detect_url: or_default("ROBOFLOW_DETECT_URL", "https://detect.roboflow.com"),
            surface_model_id: or_default("SURFACE_MODEL_ID", "wood_segment/17"),
            defect_model_id: or_default("DEFECT_MODEL_ID", "complete_knot-wi27y/1"),
            pith_model_id: or_default("PITH_MODEL_ID", "pith-annotation-of-timber/1"),

            gemini_api_key: optional("GOOGLE_API_KEY").or_else(|| optional("GEMINI_API_KEY")),
            gemini_api_url: or_default(
                "GEMINI_API_URL",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
            llm_model: or_default("LLM_MODEL", "gemini-1.5-flash"),
            llm_temperature: parsed("LLM_TEMPERATURE", 0.0)?,
            embedding_model: or_default("EMBEDDING_MODEL", "models/embedding-001"),

            dataset_path: or_default("DATASET_PATH", "data/timber.txt"),
            index_path: or_default("INDEX_PATH", "data/index.json"),
            chunk_size: parsed("CHUNK_SIZE", 800)?,
            chunk_overlap: parsed("CHUNK_OVERLAP", 150)?,
            retrieval_doc_k: parsed("RETRIEVAL_DOC_K", 8)?,
            memory_window_k: parsed("MEMORY_WINDOW_K", 5)?,
            session_ttl_minutes: parsed("SESSION_TTL_MINUTES", 60)?,

            analysis_config_path: or_default("ANALYSIS_CONFIG", "config/analysis.yaml"),
            font_path: optional("FONT_PATH"),
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("ROBOFLOW_SEGMENT_URL", &self.roboflow_segment_url),
            ("ROBOFLOW_DETECT_URL", &self.roboflow_detect_url),
            ("GEMINI_API_URL", &self.gemini_api_url),
        ] {
            if url::Url::parse(value).is_err() {
                return Err(ConfigError::Invalid {
                    name,
                    value: value.clone(),
                });
            }
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::Invalid {
                name: "CHUNK_OVERLAP",
                value: self.chunk_overlap.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
impl Settings {
    pub fn for_tests() -> Self {
        Self {
            app_name: "Timber-GPT".into(),
            port: 8000,
            frontend_url: None,
            jwt_secret_key: "test-secret".into(),
            jwt_expiration_minutes: 60,
            roboflow_api_key: "key".into(),
            roboflow_segment_url: "http://127.0.0.1:9".into(),
            roboflow_detect_url: "http://127.0.0.1:9".into(),
            surface_model_id: "wood_segment/17".into(),
            defect_model_id: "complete_knot-wi27y/1".into(),
            pith_model_id: "pith-annotation-of-timber/1".into(),
            gemini_api_key: None,
            gemini_api_url: "http://127.0.0.1:9".into(),
            llm_model: "gemini-1.5-flash".into(),
            llm_temperature: 0.0,
            embedding_model: "models/embedding-001".into(),
            dataset_path: "data/timber.txt".into(),
            index_path: "data/index.json".into(),
            chunk_size: 800,
            chunk_overlap: 150,
            retrieval_doc_k: 8,
            memory_window_k: 5,
            session_ttl_minutes: 60,
            analysis_config_path: "config/analysis.yaml".into(),
            font_path: None,
        }
    }
}
