// ============================================
// report.rs - Active Report
// ============================================
// A diagnosis plus any follow-up recommendations,
// and the exports built from their concatenation.

use chrono::{DateTime, Utc};

use crate::error::LeafResult;
use crate::export;
use crate::fields::{extract_fields, ParsedReportFields};
use crate::markdown::render_to_html;
use crate::share;

/// Join a diagnosis with a later recommendations section.
///
/// Field extraction works over the joined text, which is why the two are
/// merged by plain concatenation.
pub fn merge_report(diagnosis: &str, recommendations: Option<&str>) -> String {
    match recommendations {
        Some(recs) if !recs.trim().is_empty() => format!("{}\n\n{}", diagnosis, recs),
        _ => diagnosis.to_string(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct ActiveReport {
    pub diagnosis: String,
    pub recommendations: Option<String>,
    /// `data:` URL of the analysed image; shared links never carry one.
    pub image_data_url: Option<String>,
}

impl ActiveReport {
    pub fn new(diagnosis: impl Into<String>, image_data_url: Option<String>) -> Self {
        Self {
            diagnosis: diagnosis.into(),
            recommendations: None,
            image_data_url,
        }
    }

    pub fn with_recommendations(mut self, recommendations: impl Into<String>) -> Self {
        self.recommendations = Some(recommendations.into());
        self
    }

    pub fn full_markdown(&self) -> String {
        merge_report(&self.diagnosis, self.recommendations.as_deref())
    }

    pub fn fields(&self) -> ParsedReportFields {
        extract_fields(&self.full_markdown())
    }

    /// Diagnosis and recommendations render as separate fragments so a late
    /// recommendations section can be appended without re-rendering.
    pub fn html(&self) -> String {
        let mut html = render_to_html(&self.diagnosis);
        if let Some(ref recs) = self.recommendations {
            html.push_str(&render_to_html(recs));
        }
        html
    }

    pub fn csv_at(&self, analysed_at: DateTime<Utc>) -> String {
        export::report_to_csv_at(&self.full_markdown(), analysed_at)
    }

    pub fn printable_document(&self) -> String {
        export::build_printable_document(&self.full_markdown(), self.image_data_url.as_deref())
    }

    pub fn share_url(&self, base: &str) -> LeafResult<String> {
        let payload = share::encode_share_payload(&self.full_markdown())?;
        Ok(share::share_url(base, &payload))
    }

    /// Rebuild a report from a share link.
    pub fn from_share_link(url_or_payload: &str) -> LeafResult<Self> {
        Ok(Self::new(share::open_shared(url_or_payload)?, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIAGNOSIS: &str = "**Plant Type:** Apple Tree\n**Detected Disease:** Apple Scab";
    const RECS: &str = "**4. Environmental Impact Estimate**\n\n- **Estimated CO2e:** Less than 0.2g CO2e";

    #[test]
    fn test_merge_report() {
        assert_eq!(merge_report("a", None), "a");
        assert_eq!(merge_report("a", Some("  ")), "a");
        assert_eq!(merge_report("a", Some("b")), "a\n\nb");
    }

    #[test]
    fn test_fields_span_both_sections() {
        let report = ActiveReport::new(DIAGNOSIS, None).with_recommendations(RECS);
        let fields = report.fields();
        assert_eq!(fields.plant_type, "Apple Tree");
        assert_eq!(fields.estimated_co2e, "Less than 0.2g CO2e");
    }

    #[test]
    fn test_html_appends_recommendations() {
        let report = ActiveReport::new(DIAGNOSIS, None).with_recommendations(RECS);
        let html = report.html();
        assert!(html.contains("data-disease-name=\"Apple Scab\""));
        assert!(html.ends_with("<h2>4. Environmental Impact Estimate</h2><ul><li><strong>Estimated CO2e:</strong> Less than 0.2g CO2e</li></ul>"));
    }

    #[test]
    fn test_share_link_round_trip_drops_image() {
        let report = ActiveReport::new(DIAGNOSIS, Some("data:image/png;base64,AA==".to_string()))
            .with_recommendations(RECS);
        let url = report.share_url("https://leafdoc.app/").unwrap();

        let opened = ActiveReport::from_share_link(&url).unwrap();
        assert_eq!(opened.diagnosis, report.full_markdown());
        assert!(opened.image_data_url.is_none());
    }
}
