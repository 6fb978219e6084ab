// ============================================
// fields.rs - Report Field Extraction
// ============================================
// Pulls the `**Field Name:** value` lines out of a
// diagnostic report. Absence is data: a missing
// field falls back to "N/A", nothing here can fail.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Value used for any field missing from a report.
pub const NOT_AVAILABLE: &str = "N/A";

pub const PLANT_TYPE: &str = "Plant Type";
pub const DETECTED_DISEASE: &str = "Detected Disease";
pub const CONFIDENCE_SCORE: &str = "Confidence Score";
pub const ESTIMATED_CO2E: &str = "Estimated CO2e";
pub const ESTIMATED_INPUT_TOKENS: &str = "Estimated Total Input Tokens";
pub const ESTIMATED_OUTPUT_TOKENS: &str = "Estimated Total Output Tokens";

fn field_pattern(name: &str) -> Regex {
    // Only horizontal whitespace may follow the label, so an empty
    // value never swallows the next line.
    let pattern = format!(r"\*\*{}:\*\*[ \t]*([^\r\n]*)", regex::escape(name));
    Regex::new(&pattern).expect("field pattern is a valid regex")
}

lazy_static! {
    static ref PLANT_TYPE_RE: Regex = field_pattern(PLANT_TYPE);
    static ref DETECTED_DISEASE_RE: Regex = field_pattern(DETECTED_DISEASE);
    static ref CONFIDENCE_SCORE_RE: Regex = field_pattern(CONFIDENCE_SCORE);
    static ref ESTIMATED_CO2E_RE: Regex = field_pattern(ESTIMATED_CO2E);
    static ref ESTIMATED_INPUT_TOKENS_RE: Regex = field_pattern(ESTIMATED_INPUT_TOKENS);
    static ref ESTIMATED_OUTPUT_TOKENS_RE: Regex = field_pattern(ESTIMATED_OUTPUT_TOKENS);
}

/// Scalar values extracted from a report.
///
/// Values are kept as display text ("95.21%", "Less than 0.2g CO2e");
/// nothing is parsed into numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedReportFields {
    pub plant_type: String,
    pub detected_disease: String,
    pub confidence_score: String,
    #[serde(rename = "estimatedCO2e")]
    pub estimated_co2e: String,
    pub estimated_input_tokens: String,
    pub estimated_output_tokens: String,
}

impl Default for ParsedReportFields {
    fn default() -> Self {
        Self {
            plant_type: NOT_AVAILABLE.to_string(),
            detected_disease: NOT_AVAILABLE.to_string(),
            confidence_score: NOT_AVAILABLE.to_string(),
            estimated_co2e: NOT_AVAILABLE.to_string(),
            estimated_input_tokens: NOT_AVAILABLE.to_string(),
            estimated_output_tokens: NOT_AVAILABLE.to_string(),
        }
    }
}

impl ParsedReportFields {
    /// True when both the plant and the disease were identified.
    pub fn has_diagnosis(&self) -> bool {
        is_present(&self.plant_type) && is_present(&self.detected_disease)
    }
}

/// Whether a field value carries data. A label with an empty value is
/// extracted as "" and counts as absent here, like "N/A".
pub fn is_present(value: &str) -> bool {
    !value.is_empty() && value != NOT_AVAILABLE
}

fn capture(re: &Regex, report: &str) -> String {
    re.captures(report)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or(NOT_AVAILABLE)
        .to_string()
}

/// Extract the six report fields.
///
/// Each field is matched independently and the first occurrence wins, so a
/// diagnosis concatenated with a later recommendations section yields the
/// union of both.
pub fn extract_fields(report: &str) -> ParsedReportFields {
    ParsedReportFields {
        plant_type: capture(&PLANT_TYPE_RE, report),
        detected_disease: capture(&DETECTED_DISEASE_RE, report),
        confidence_score: capture(&CONFIDENCE_SCORE_RE, report),
        estimated_co2e: capture(&ESTIMATED_CO2E_RE, report),
        estimated_input_tokens: capture(&ESTIMATED_INPUT_TOKENS_RE, report),
        estimated_output_tokens: capture(&ESTIMATED_OUTPUT_TOKENS_RE, report),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = "**Plant Type:** Tomato Plant\n\
        **Detected Disease:** Late Blight\n\
        **Confidence Score:** 95.21%\n\
        **Estimated CO2e:** Less than 0.2g CO2e\n\
        **Estimated Total Input Tokens:** Around 3000 tokens\n\
        **Estimated Total Output Tokens:** Around 800 tokens";

    #[test]
    fn test_extracts_all_fields() {
        let fields = extract_fields(FULL);
        assert_eq!(
            fields,
            ParsedReportFields {
                plant_type: "Tomato Plant".to_string(),
                detected_disease: "Late Blight".to_string(),
                confidence_score: "95.21%".to_string(),
                estimated_co2e: "Less than 0.2g CO2e".to_string(),
                estimated_input_tokens: "Around 3000 tokens".to_string(),
                estimated_output_tokens: "Around 800 tokens".to_string(),
            }
        );
    }

    #[test]
    fn test_missing_fields_default() {
        let fields = extract_fields("Nothing structured here.");
        assert_eq!(fields, ParsedReportFields::default());
        assert_eq!(fields.plant_type, "N/A");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(extract_fields(""), ParsedReportFields::default());
    }

    #[test]
    fn test_fields_inside_list_items() {
        let report = "**1. Diagnostic Summary**\n   - **Plant Type:** Rose Bush\n   - **Detected Disease:**   Black Spot  \n";
        let fields = extract_fields(report);
        assert_eq!(fields.plant_type, "Rose Bush");
        assert_eq!(fields.detected_disease, "Black Spot");
    }

    #[test]
    fn test_merged_report_order_independent() {
        let diagnosis = "**Detected Disease:** Powdery Mildew\n**Plant Type:** Squash";
        let recommendations = "**4. Environmental Impact Estimate**\n   - **Estimated CO2e:** 0.1g CO2e";
        let merged = format!("{}\n\n{}", diagnosis, recommendations);

        let fields = extract_fields(&merged);
        assert_eq!(fields.plant_type, "Squash");
        assert_eq!(fields.detected_disease, "Powdery Mildew");
        assert_eq!(fields.estimated_co2e, "0.1g CO2e");
        assert_eq!(fields.confidence_score, "N/A");
    }

    #[test]
    fn test_first_occurrence_wins() {
        let fields = extract_fields("**Plant Type:** Apple Tree\n**Plant Type:** Pear Tree");
        assert_eq!(fields.plant_type, "Apple Tree");
    }

    #[test]
    fn test_case_sensitive_labels() {
        let fields = extract_fields("**plant type:** Tomato");
        assert_eq!(fields.plant_type, "N/A");
    }

    #[test]
    fn test_empty_value_does_not_swallow_next_line() {
        let fields = extract_fields("**Plant Type:**\n**Detected Disease:** Rust");
        assert_eq!(fields.plant_type, "");
        assert_eq!(fields.detected_disease, "Rust");
    }

    #[test]
    fn test_blank_value_is_empty_not_sentinel() {
        let fields = extract_fields("**Plant Type:**   \nother");
        assert_eq!(fields.plant_type, "");
        assert_eq!(fields.detected_disease, "N/A");
        assert!(!is_present(&fields.plant_type));
        assert!(!fields.has_diagnosis());
    }

    #[test]
    fn test_crlf_line_endings() {
        let fields = extract_fields("**Plant Type:** Grape\r\n**Confidence Score:** 80%\r\n");
        assert_eq!(fields.plant_type, "Grape");
        assert_eq!(fields.confidence_score, "80%");
    }

    #[test]
    fn test_has_diagnosis() {
        assert!(extract_fields(FULL).has_diagnosis());
        assert!(!extract_fields("**Plant Type:** Tomato").has_diagnosis());
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(extract_fields(FULL)).unwrap();
        assert_eq!(json["plantType"], "Tomato Plant");
        assert_eq!(json["estimatedCO2e"], "Less than 0.2g CO2e");
        assert_eq!(json["estimatedOutputTokens"], "Around 800 tokens");
    }
}
