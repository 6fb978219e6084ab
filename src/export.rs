// ============================================
// export.rs - CSV and printable HTML exports
// ============================================

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use lazy_static::lazy_static;
use regex::Regex;

use crate::fields::{extract_fields, ParsedReportFields};
use crate::markdown::{html_escape, render_to_html};

/// Column order of the report CSV.
pub const CSV_HEADERS: [&str; 7] = [
    "Analysis Date",
    "Plant Type",
    "Detected Disease",
    "Confidence Score",
    "Estimated CO2e (g)",
    "Estimated Input Tokens",
    "Estimated Output Tokens",
];

pub const DOCUMENT_TITLE: &str = "Plant Disease Diagnostic Report";

lazy_static! {
    static ref CO2E_UNIT: Regex = Regex::new(r"(?i)g CO2e").expect("valid regex");
    static ref LESS_THAN: Regex = Regex::new(r"(?i)less than").expect("valid regex");
}

/// Quote a CSV field when it holds a comma, quote or line break.
pub fn escape_csv_field(value: &str) -> String {
    let needs_quotes = value.contains(',')
        || value.contains('"')
        || value.contains('\n')
        || value.contains('\r');
    if needs_quotes {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_line<S: AsRef<str>>(fields: &[S]) -> String {
    fields
        .iter()
        .map(|f| escape_csv_field(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

/// "Less than 0.2g CO2e" -> "< 0.2"
pub fn clean_co2e(value: &str) -> String {
    let without_unit = CO2E_UNIT.replace_all(value, "");
    LESS_THAN.replace_all(&without_unit, "<").trim().to_string()
}

/// ISO-8601 in UTC with millisecond precision, e.g. `2024-05-01T09:30:00.000Z`.
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Header plus one data row for already-extracted fields.
pub fn fields_to_csv(fields: &ParsedReportFields, analysed_at: DateTime<Utc>) -> String {
    let row = [
        iso_timestamp(analysed_at),
        fields.plant_type.clone(),
        fields.detected_disease.clone(),
        fields.confidence_score.clone(),
        clean_co2e(&fields.estimated_co2e),
        fields.estimated_input_tokens.clone(),
        fields.estimated_output_tokens.clone(),
    ];
    format!("{}\n{}", csv_line(&CSV_HEADERS), csv_line(&row))
}

/// CSV export of a report, stamped with the given analysis time.
pub fn report_to_csv_at(report: &str, analysed_at: DateTime<Utc>) -> String {
    fields_to_csv(&extract_fields(report), analysed_at)
}

/// CSV export of a report, stamped with the current time.
pub fn report_to_csv(report: &str) -> String {
    report_to_csv_at(report, Utc::now())
}

/// `plant-report-<YYYY-MM-DD>.csv`
pub fn csv_filename(date: NaiveDate) -> String {
    format!("plant-report-{}.csv", date.format("%Y-%m-%d"))
}

pub fn printable_filename(date: NaiveDate) -> String {
    format!("plant-report-{}.html", date.format("%Y-%m-%d"))
}

const DOCUMENT_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Plant Disease Diagnostic Report</title>
  <script src="https://cdnjs.cloudflare.com/ajax/libs/html2pdf.js/0.10.1/html2pdf.bundle.min.js" crossorigin="anonymous" referrerpolicy="no-referrer"></script>
  <style>
    body { font-family: 'Inter', sans-serif; background-color: #f3f4f6; color: #1f2937; margin: 0; padding: 2rem; }
    .report { max-width: 64rem; margin: 0 auto; background: #fff; border-radius: 0.5rem; padding: 2rem; box-shadow: 0 10px 25px rgba(0,0,0,0.1); }
    header { display: flex; justify-content: space-between; align-items: flex-start; gap: 1.5rem; border-bottom: 1px solid #e5e7eb; padding-bottom: 1.5rem; margin-bottom: 1.5rem; }
    header h1 { color: #16a34a; font-size: 1.875rem; margin: 0; }
    header img { width: 10rem; height: 10rem; object-fit: cover; border-radius: 0.375rem; border: 2px solid #d1d5db; }
    main { font-size: 1.125rem; line-height: 1.75; }
    main p, main ul { margin-bottom: 1rem; }
    main a { color: #16a34a; font-weight: 600; }
    .disease-info-link { text-decoration: underline dotted; cursor: pointer; }
    .toolbar { display: flex; justify-content: flex-end; max-width: 64rem; margin: 0 auto 1rem; }
    .toolbar button { background: #16a34a; color: #fff; font-weight: 700; border: 0; border-radius: 0.5rem; padding: 0.5rem 1rem; cursor: pointer; }
    @media print {
      .no-print { display: none !important; }
      body { background-color: #fff; padding: 0; }
      .report { box-shadow: none; margin: 0; max-width: 100%; border-radius: 0; }
    }
  </style>
</head>
<body>
  <div class="toolbar no-print">
    <button id="download-btn">Download Report (PDF)</button>
  </div>
  <div id="report-container" class="report">
    <header>
      <h1>Plant Disease Diagnostic Report</h1>
"#;

const DOCUMENT_TAIL: &str = r#"
    </main>
  </div>
  <script>
    document.getElementById('download-btn').addEventListener('click', function () {
      const button = this;
      const opt = {
        margin: [0.5, 0.5, 0.5, 0.5],
        filename: 'plant-disease-diagnostic-report.pdf',
        image: { type: 'jpeg', quality: 0.98 },
        html2canvas: { scale: 2, useCORS: true, letterRendering: true },
        jsPDF: { unit: 'in', format: 'letter', orientation: 'portrait' }
      };
      button.style.display = 'none';
      html2pdf().from(document.getElementById('report-container')).set(opt).save()
        .catch(function (err) { console.error('PDF generation failed:', err); })
        .then(function () { button.style.display = 'inline-flex'; });
    });
  </script>
</body>
</html>
"#;

/// Standalone printable page: title header, optional thumbnail, then the
/// rendered report, with a client-side "Download as PDF" button.
pub fn build_printable_document(report: &str, image_data_url: Option<&str>) -> String {
    let content = render_to_html(report);
    let mut doc = String::with_capacity(DOCUMENT_HEAD.len() + DOCUMENT_TAIL.len() + content.len() + 256);

    doc.push_str(DOCUMENT_HEAD);
    if let Some(url) = image_data_url.filter(|u| !u.trim().is_empty()) {
        doc.push_str("      <img src=\"");
        doc.push_str(&html_escape(url));
        doc.push_str("\" alt=\"Uploaded Leaf Image\" title=\"Uploaded Leaf\">\n");
    }
    doc.push_str("    </header>\n    <main>\n");
    doc.push_str(&content);
    doc.push_str(DOCUMENT_TAIL);
    doc
}
