// ============================================
// lib.rs - Library Root
// ============================================

pub mod analysis;
pub mod chat;
pub mod config;
pub mod error;
pub mod export;
pub mod fields;
pub mod forecast;
pub mod logger;
pub mod markdown;
pub mod prompts;
pub mod report;
pub mod share;

#[cfg(feature = "gemini")]
pub mod gemini;
#[cfg(feature = "history")]
pub mod history;

pub use analysis::{Analyzer, Diagnosis, Diagnostician, LeafImage, Recommendations};
pub use chat::{chat_result_to_csv, ChatMessage, ChatReply, ChatResult, ChatSession, Role};
pub use config::Config;
pub use error::{LeafError, LeafResult};
pub use export::{build_printable_document, report_to_csv};
pub use fields::{extract_fields, ParsedReportFields};
pub use forecast::{Coordinates, CropStage, ForecastRequest};
pub use markdown::{format_inline, render_to_html};
pub use report::{merge_report, ActiveReport};
pub use share::{decode_share_payload, encode_share_payload};

#[cfg(feature = "gemini")]
pub use gemini::GeminiClient;
#[cfg(feature = "history")]
pub use history::{HistoryEntry, HistoryStore};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

pub fn version() -> String {
    format!("{} v{}", NAME, VERSION)
}
