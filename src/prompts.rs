// ============================================
// prompts.rs - Gemini prompt builders
// ============================================
// These prompts define the markdown layout that
// fields.rs and markdown.rs parse. Field labels
// here must match the extractor's labels exactly.

use crate::error::{LeafError, LeafResult};
use crate::fields::{
    CONFIDENCE_SCORE, DETECTED_DISEASE, ESTIMATED_CO2E, ESTIMATED_INPUT_TOKENS,
    ESTIMATED_OUTPUT_TOKENS, PLANT_TYPE,
};
use crate::forecast::ForecastRequest;

fn require<'a>(value: &'a str, what: &'static str) -> LeafResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        Err(LeafError::MissingInput(what))
    } else {
        Ok(value)
    }
}

/// Sections 4 and 5, shared by both recommendation prompts.
fn impact_and_usage_sections() -> String {
    format!(
        "**4. Environmental Impact Estimate**\n\n\
         - **{co2e}:** <A very rough estimate in grams of CO2 equivalent for the whole analysis \
         (image upload and this recommendation step), e.g. \"Less than 0.2g CO2e\".>\n\
         - **Note:** <One sentence noting that the model runs in data centers committed to carbon \
         neutrality.>\n\n\
         **5. API Usage Estimate**\n\n\
         - **{input}:** <Rough estimate of input tokens across both analysis steps, e.g. \"Around 3000 tokens\".>\n\
         - **{output}:** <Rough estimate of output tokens in the full report, e.g. \"Around 800 tokens\".>\n\n\
         ---\n",
        co2e = ESTIMATED_CO2E,
        input = ESTIMATED_INPUT_TOKENS,
        output = ESTIMATED_OUTPUT_TOKENS,
    )
}

/// Prompt sent alongside the leaf image.
pub fn diagnosis_prompt() -> String {
    format!(
        "You are an agricultural diagnostic assistant.\n\
         Write a Plant Disease Diagnostic Report for the attached leaf image in simple, clear English \
         for a beginner gardener. Avoid jargon.\n\n\
         Use exactly this markdown layout. Keep the field lines directly under the summary \
         heading, with no blank line in between:\n\n\
         **1. Diagnostic Summary**\n\
         - **{plant}:** <The plant in the image, e.g. \"Tomato Plant\", \"Rose Bush\".>\n\
         - **{disease}:** <The disease, e.g. \"Late Blight\". Write \"Healthy\" if healthy, \
         \"Indeterminate\" if unsure.>\n\
         - **{confidence}:** <A confidence percentage, e.g. \"95.21%\".>\n\
         - **Description:** <Two to four lines on the cause (fungus, bacteria, virus), the affected \
         plant parts and how it spreads.>\n\n\
         **2. Symptoms Observed**\n\n\
         - <One line per visible symptom that led to the diagnosis. If healthy, say no symptoms were seen.>\n\n\
         ---\n\n\
         Output ONLY this report. Do not add treatment, environmental impact or API usage sections.",
        plant = PLANT_TYPE,
        disease = DETECTED_DISEASE,
        confidence = CONFIDENCE_SCORE,
    )
}

/// Follow-up advice tied to the 30-day weather outlook at `location`.
pub fn weather_recommendations_prompt(
    plant_type: &str,
    disease: &str,
    location: &str,
) -> LeafResult<String> {
    let plant_type = require(plant_type, "Plant type")?;
    let disease = require(disease, "Disease name")?;
    let location = require(location, "Location")?;
    let query = plant_type.replace(' ', "+");

    Ok(format!(
        "You are an agricultural meteorologist and plant pathologist.\n\
         A plant has already been diagnosed; continue the report with advice based on the weather.\n\n\
         **Diagnosis Details:**\n\n\
         - **{plant_label}:** {plant}\n\
         - **{disease_label}:** {disease}\n\
         - **Location for Weather Forecast:** {location} (city/region or latitude,longitude)\n\n\
         Base every recommendation STRICTLY on the projected 30-day weather for this location. Use \
         simple English and step-by-step instructions a non-expert can follow. No generic advice.\n\n\
         Use exactly this markdown layout, with a blank line between blocks:\n\n\
         **3. Recommended Treatments & Management (for your location)**\n\n\
         - **Weather-Based Risk Assessment:** <Low, Medium or High for the next 30 days, and why.>\n\
         - **Cultural & Organic Control:** <Methods tied to the upcoming weather.>\n\
         - **Fertilization & Soil Health:** <Soil and nutrient advice, with a YouTube search link such as \
         [YouTube: How to fertilize {plant}](https://www.youtube.com/results?search_query=how+to+fertilize+{query})>\n\
         - **Weather-Based Spray Plan:** <Active ingredients, timing relative to forecast rain, safety \
         precautions, and a Google Shopping search link in markdown link format.>\n\n\
         {impact}\n\
         Output ONLY sections 3 to 5, starting with the \"**3. Recommended Treatments & Management**\" heading.",
        plant_label = PLANT_TYPE,
        disease_label = DETECTED_DISEASE,
        plant = plant_type,
        disease = disease,
        location = location,
        query = query,
        impact = impact_and_usage_sections(),
    ))
}

/// Follow-up advice when no location is available.
pub fn generic_recommendations_prompt(plant_type: &str, disease: &str) -> LeafResult<String> {
    let plant_type = require(plant_type, "Plant type")?;
    let disease = require(disease, "Disease name")?;
    let query = format!("{}+with+{}", plant_type, disease).replace(' ', "+");

    Ok(format!(
        "You are a plant pathologist.\n\
         A plant has already been diagnosed; continue the report with general, location-independent advice.\n\n\
         **Diagnosis Details:**\n\n\
         - **{plant_label}:** {plant}\n\
         - **{disease_label}:** {disease}\n\n\
         Use simple English and step-by-step instructions a non-expert can follow.\n\n\
         Use exactly this markdown layout, with a blank line between blocks:\n\n\
         **3. Recommended Treatments & Management (General Advice)**\n\n\
         - **Risk Assessment:** <The conditions this disease thrives in.>\n\
         - **Cultural & Organic Control:** <Common cultural, biological and organic methods.>\n\
         - **Fertilization & Soil Health:** <Soil and nutrient advice, with a YouTube search link such as \
         [YouTube: How to fertilize {plant} with {disease}](https://www.youtube.com/results?search_query=how+to+fertilize+{query})>\n\
         - **Chemical Control Guide:** <Active ingredients, application timing, safety precautions, and \
         a Google Shopping search link in markdown link format.>\n\n\
         {impact}\n\
         Output ONLY sections 3 to 5, starting with the \"**3. Recommended Treatments & Management**\" heading.",
        plant_label = PLANT_TYPE,
        disease_label = DETECTED_DISEASE,
        plant = plant_type,
        disease = disease,
        query = query,
        impact = impact_and_usage_sections(),
    ))
}

/// Information sheet shown for a clicked disease marker.
pub fn disease_info_prompt(disease: &str) -> LeafResult<String> {
    let disease = require(disease, "Disease name")?;

    Ok(format!(
        "You are a plant pathologist. Write an easy-to-understand information sheet for this \
         plant disease, for a reader with no background in botany.\n\n\
         **Disease Name:** {disease}\n\n\
         Use exactly these sections, with a blank line between blocks:\n\n\
         ### Overview of {disease}\n\n\
         <Two or three sentences: what it is, what causes it, which plants it affects.>\n\n\
         ### Common Causes & Conditions\n\n\
         - <Environmental factors and plant conditions that help it spread.>\n\n\
         ### Key Symptoms to Identify\n\n\
         - <How it looks on leaves, stems, fruit or roots.>\n\n\
         ### General Prevention & Management Strategies\n\n\
         - **Cultural Practices:** <Crop rotation, sanitation, spacing, resistant varieties.>\n\
         - **Organic Control:** <Neem oil, copper fungicides, biological controls.>\n\n\
         ---\n\n\
         Output ONLY this markdown content.",
        disease = disease,
    ))
}

/// 30-day disease risk forecast for a set of crops.
pub fn forecast_prompt(request: &ForecastRequest) -> LeafResult<String> {
    let location = require(&request.location, "Location")?;
    if request.crops.is_empty() {
        return Err(LeafError::MissingInput("At least one crop"));
    }

    Ok(format!(
        "You are an agricultural forecasting assistant specialising in plant disease prediction \
         from weather data.\n\n\
         **Forecasting Parameters:**\n\n\
         - **Location:** {location} (Latitude, Longitude)\n\
         - **Crops of Interest:** {crops}\n\
         - **Current Crop Stage:** {stage}\n\n\
         Write a **30-Day Disease Risk Forecast** based strictly on the projected weather for the \
         location, in language a farmer can act on. Use exactly this layout, with a blank line \
         between blocks:\n\n\
         **1. 30-Day Weather Outlook & Risk Summary**\n\n\
         - **Overall Risk Level:** <High, Medium or Low>\n\
         - **Key Weather Factors:** <Rain, humidity and temperature patterns that drive risk.>\n\
         - **Critical Risk Periods:** <The weeks or dates with the highest risk.>\n\n\
         **2. Crop-Specific Disease Forecast**\n\n\
         - <For each crop: **Crop Name:** high-, medium- and low-risk diseases.>\n\n\
         **3. Proactive Management Plan**\n\n\
         - <For each high-risk disease: symptoms to watch for and weather-tied preventative actions.>\n\n\
         **4. General Recommendations**\n\n\
         - **Irrigation:** <Watering advice based on the rain forecast.>\n\
         - **Scouting:** <How often to check plants during high-risk periods.>\n\n\
         ---\n\n\
         Output ONLY the markdown report.",
        location = location,
        crops = request.crops.join(", "),
        stage = request.stage,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::CropStage;

    #[test]
    fn test_diagnosis_prompt_uses_field_labels() {
        let prompt = diagnosis_prompt();
        assert!(prompt.contains("**Plant Type:**"));
        assert!(prompt.contains("**Detected Disease:**"));
        assert!(prompt.contains("**Confidence Score:**"));
    }

    #[test]
    fn test_diagnosis_fields_follow_summary_heading() {
        let prompt = diagnosis_prompt();
        assert!(prompt.contains("**1. Diagnostic Summary**\n- **Plant Type:**"));
    }

    #[test]
    fn test_recommendation_prompts_request_usage_fields() {
        let weather = weather_recommendations_prompt("Tomato Plant", "Late Blight", "51.5,-0.1").unwrap();
        let generic = generic_recommendations_prompt("Tomato Plant", "Late Blight").unwrap();
        for prompt in [&weather, &generic] {
            assert!(prompt.contains("**Estimated CO2e:**"));
            assert!(prompt.contains("**Estimated Total Input Tokens:**"));
            assert!(prompt.contains("**Estimated Total Output Tokens:**"));
        }
        assert!(weather.contains("51.5,-0.1"));
        assert!(weather.contains("search_query=how+to+fertilize+Tomato+Plant"));
        assert!(generic.contains("search_query=how+to+fertilize+Tomato+Plant+with+Late+Blight"));
    }

    #[test]
    fn test_missing_inputs_rejected() {
        assert!(matches!(
            weather_recommendations_prompt("Tomato", "Blight", " "),
            Err(LeafError::MissingInput("Location"))
        ));
        assert!(matches!(
            generic_recommendations_prompt("", "Blight"),
            Err(LeafError::MissingInput("Plant type"))
        ));
        assert!(disease_info_prompt("").is_err());
    }

    #[test]
    fn test_disease_info_prompt_headings() {
        let prompt = disease_info_prompt("Powdery Mildew").unwrap();
        assert!(prompt.contains("### Overview of Powdery Mildew"));
        assert!(prompt.contains("**Disease Name:** Powdery Mildew"));
    }

    #[test]
    fn test_forecast_prompt() {
        let request = ForecastRequest::new(
            "12.9,77.6",
            CropStage::Flowering,
            vec!["Tomato".to_string(), "Rice".to_string()],
        )
        .unwrap();
        let prompt = forecast_prompt(&request).unwrap();
        assert!(prompt.contains("**Crops of Interest:** Tomato, Rice"));
        assert!(prompt.contains("**Current Crop Stage:** Flowering"));
    }
}
