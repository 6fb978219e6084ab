// ============================================
// analysis.rs - Diagnosis pipeline
// ============================================
// Image -> diagnostic report -> follow-up
// recommendations, against any backend that
// implements Diagnostician.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::{debug, info, warn};

use crate::chat::ChatReply;
use crate::error::LeafError;
use crate::fields::{extract_fields, ParsedReportFields};
use crate::forecast::ForecastRequest;

/// A text-generation backend able to produce each kind of report.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Diagnostician: Send + Sync {
    /// Diagnostic report (sections 1-2) for a leaf image.
    async fn identify_disease(&self, image: &[u8], mime_type: &str) -> Result<String>;

    /// Recommendations (sections 3-5) tied to the weather at `location`.
    async fn weather_recommendations(
        &self,
        plant_type: &str,
        disease: &str,
        location: &str,
    ) -> Result<String>;

    /// Recommendations (sections 3-5) without a location.
    async fn generic_recommendations(&self, plant_type: &str, disease: &str) -> Result<String>;

    /// Information sheet for a single disease.
    async fn disease_info(&self, disease: &str) -> Result<String>;

    async fn disease_forecast(&self, request: &ForecastRequest) -> Result<String>;

    async fn chat(&self, prompt: &str) -> Result<ChatReply>;
}

/// An image loaded for analysis.
#[derive(Debug, Clone)]
pub struct LeafImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl LeafImage {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mime_type = mime_type_for(path)?;
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read image: {:?}", path))?;
        debug!("Loaded {} ({} bytes, {})", path.display(), bytes.len(), mime_type);
        Ok(Self::new(bytes, mime_type))
    }

    /// `data:<mime>;base64,<...>`, used as thumbnail and printable image.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }
}

/// MIME type from a file extension.
pub fn mime_type_for(path: &Path) -> std::result::Result<&'static str, LeafError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "png" => Ok("image/png"),
        "webp" => Ok("image/webp"),
        "gif" => Ok("image/gif"),
        "heic" => Ok("image/heic"),
        "heif" => Ok("image/heif"),
        _ => Err(LeafError::UnsupportedImage(path.display().to_string())),
    }
}

/// Result of the first, image-based step.
#[derive(Debug, Clone)]
pub struct Diagnosis {
    pub report: String,
    pub fields: ParsedReportFields,
}

/// Recommendations plus any notice the user should see about how they
/// were produced (e.g. fallback to general advice).
#[derive(Debug, Clone, Default)]
pub struct Recommendations {
    pub markdown: String,
    pub notice: Option<String>,
}

pub struct Analyzer<D: Diagnostician> {
    backend: D,
}

impl<D: Diagnostician> Analyzer<D> {
    pub fn new(backend: D) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &D {
        &self.backend
    }

    pub async fn diagnose(&self, image: &LeafImage) -> Result<Diagnosis> {
        let report = self
            .backend
            .identify_disease(&image.bytes, &image.mime_type)
            .await
            .context("Failed to analyze image")?;
        let fields = extract_fields(&report);

        info!(
            "Diagnosis: plant={}, disease={}, confidence={}",
            fields.plant_type, fields.detected_disease, fields.confidence_score
        );

        Ok(Diagnosis { report, fields })
    }

    /// Weather-based advice when a location is known, otherwise (or when
    /// that fails) general advice with a notice explaining the fallback.
    pub async fn recommend(
        &self,
        fields: &ParsedReportFields,
        location: Option<&str>,
    ) -> Result<Recommendations> {
        if !fields.has_diagnosis() {
            anyhow::bail!("Plant type and disease name must be identified before recommendations");
        }

        let plant = fields.plant_type.as_str();
        let disease = fields.detected_disease.as_str();

        let notice = match location.map(str::trim).filter(|l| !l.is_empty()) {
            Some(location) => {
                match self.backend.weather_recommendations(plant, disease, location).await {
                    Ok(markdown) => {
                        return Ok(Recommendations {
                            markdown,
                            notice: None,
                        })
                    }
                    Err(e) => {
                        warn!("Weather-based recommendations failed: {:#}", e);
                        format!("{:#}. Showing general advice instead.", e)
                    }
                }
            }
            None => "No location was provided. Showing general advice instead.".to_string(),
        };

        match self.backend.generic_recommendations(plant, disease).await {
            Ok(markdown) => Ok(Recommendations {
                markdown,
                notice: Some(notice),
            }),
            Err(e) => Err(e.context(notice)),
        }
    }

    pub async fn disease_info(&self, disease: &str) -> Result<String> {
        self.backend
            .disease_info(disease)
            .await
            .context("Failed to get disease information")
    }

    pub async fn forecast(&self, request: &ForecastRequest) -> Result<String> {
        self.backend
            .disease_forecast(request)
            .await
            .context("Failed to generate disease forecast")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::CropStage;

    const DIAGNOSIS: &str = "**1. Diagnostic Summary**\n\n\
        - **Plant Type:** Tomato Plant\n\
        - **Detected Disease:** Late Blight\n\
        - **Confidence Score:** 91%";

    fn tomato_fields() -> ParsedReportFields {
        extract_fields(DIAGNOSIS)
    }

    #[test]
    fn test_mime_type_for() {
        assert_eq!(mime_type_for(Path::new("leaf.JPG")).unwrap(), "image/jpeg");
        assert_eq!(mime_type_for(Path::new("a/b/leaf.png")).unwrap(), "image/png");
        assert!(matches!(
            mime_type_for(Path::new("notes.txt")),
            Err(LeafError::UnsupportedImage(_))
        ));
        assert!(mime_type_for(Path::new("noext")).is_err());
    }

    #[test]
    fn test_data_url() {
        let image = LeafImage::new(vec![0x89, 0x50, 0x4e, 0x47], "image/png");
        assert_eq!(image.data_url(), "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn test_from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leaf.jpeg");
        std::fs::write(&path, b"jpegbytes").unwrap();

        let image = LeafImage::from_path(&path).unwrap();
        assert_eq!(image.mime_type, "image/jpeg");
        assert_eq!(image.bytes, b"jpegbytes");
    }

    #[tokio::test]
    async fn test_diagnose_extracts_fields() {
        let mut backend = MockDiagnostician::new();
        backend
            .expect_identify_disease()
            .withf(|bytes, mime| bytes == b"img" && mime == "image/png")
            .times(1)
            .returning(|_, _| Ok(DIAGNOSIS.to_string()));

        let analyzer = Analyzer::new(backend);
        let diagnosis = analyzer
            .diagnose(&LeafImage::new(b"img".to_vec(), "image/png"))
            .await
            .unwrap();

        assert_eq!(diagnosis.report, DIAGNOSIS);
        assert_eq!(diagnosis.fields.detected_disease, "Late Blight");
        assert_eq!(diagnosis.fields.confidence_score, "91%");
    }

    #[tokio::test]
    async fn test_diagnose_error_has_context() {
        let mut backend = MockDiagnostician::new();
        backend
            .expect_identify_disease()
            .returning(|_, _| Err(anyhow::anyhow!("quota exceeded")));

        let err = Analyzer::new(backend)
            .diagnose(&LeafImage::new(vec![], "image/png"))
            .await
            .unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("Failed to analyze image"));
        assert!(message.contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_recommend_with_location() {
        let mut backend = MockDiagnostician::new();
        backend
            .expect_weather_recommendations()
            .withf(|plant, disease, location| {
                plant == "Tomato Plant" && disease == "Late Blight" && location == "51.5,-0.1"
            })
            .times(1)
            .returning(|_, _, _| Ok("**3. Weather plan**".to_string()));
        backend.expect_generic_recommendations().never();

        let recs = Analyzer::new(backend)
            .recommend(&tomato_fields(), Some("51.5,-0.1"))
            .await
            .unwrap();
        assert_eq!(recs.markdown, "**3. Weather plan**");
        assert!(recs.notice.is_none());
    }

    #[tokio::test]
    async fn test_recommend_falls_back_to_generic() {
        let mut backend = MockDiagnostician::new();
        backend
            .expect_weather_recommendations()
            .returning(|_, _, _| Err(anyhow::anyhow!("timeout")));
        backend
            .expect_generic_recommendations()
            .times(1)
            .returning(|_, _| Ok("**3. General plan**".to_string()));

        let recs = Analyzer::new(backend)
            .recommend(&tomato_fields(), Some("1,2"))
            .await
            .unwrap();
        assert_eq!(recs.markdown, "**3. General plan**");
        assert_eq!(
            recs.notice.as_deref(),
            Some("timeout. Showing general advice instead.")
        );
    }

    #[tokio::test]
    async fn test_recommend_without_location() {
        let mut backend = MockDiagnostician::new();
        backend.expect_weather_recommendations().never();
        backend
            .expect_generic_recommendations()
            .times(1)
            .returning(|_, _| Ok("general".to_string()));

        let recs = Analyzer::new(backend)
            .recommend(&tomato_fields(), Some("   "))
            .await
            .unwrap();
        assert!(recs.notice.unwrap().contains("No location"));
    }

    #[tokio::test]
    async fn test_recommend_both_fail() {
        let mut backend = MockDiagnostician::new();
        backend
            .expect_weather_recommendations()
            .returning(|_, _, _| Err(anyhow::anyhow!("weather down")));
        backend
            .expect_generic_recommendations()
            .returning(|_, _| Err(anyhow::anyhow!("generic down")));

        let err = Analyzer::new(backend)
            .recommend(&tomato_fields(), Some("1,2"))
            .await
            .unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("weather down"));
        assert!(message.contains("generic down"));
    }

    #[tokio::test]
    async fn test_recommend_requires_diagnosis() {
        let mut backend = MockDiagnostician::new();
        backend.expect_generic_recommendations().never();

        let fields = extract_fields("**Plant Type:** Tomato");
        assert!(Analyzer::new(backend).recommend(&fields, None).await.is_err());
    }

    #[tokio::test]
    async fn test_forecast_delegates() {
        let mut backend = MockDiagnostician::new();
        backend
            .expect_disease_forecast()
            .withf(|req| req.stage == CropStage::Harvest && req.crops == vec!["Wheat".to_string()])
            .returning(|_| Ok("**1. Outlook**".to_string()));

        let request =
            ForecastRequest::new("1,2", CropStage::Harvest, vec!["Wheat".to_string()]).unwrap();
        let forecast = Analyzer::new(backend).forecast(&request).await.unwrap();
        assert_eq!(forecast, "**1. Outlook**");
    }
}
