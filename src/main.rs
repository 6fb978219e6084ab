// ============================================
// main.rs - leafdoc command line
// ============================================

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use leafdoc::chat::{chat_csv_filename, chat_result_to_csv, ChatSession};
use leafdoc::config::Config;
use leafdoc::error::LeafError;
use leafdoc::export::{csv_filename, report_to_csv};
use leafdoc::fields::{self, extract_fields, ParsedReportFields};
use leafdoc::forecast::{find_crop, Coordinates, CropStage, ForecastRequest};
use leafdoc::gemini::GeminiClient;
use leafdoc::history::{HistoryEntry, HistoryStore};
use leafdoc::logger::{self, LoggerConfig};
use leafdoc::markdown::render_to_html;
use leafdoc::report::ActiveReport;
use leafdoc::{build_printable_document, Analyzer, LeafImage};

#[derive(Parser, Debug)]
#[command(name = "leafdoc")]
#[command(about = "Diagnose plant leaf diseases and render, export and share the reports")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/leafdoc/config.yaml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Diagnose a leaf image and print the report
    Analyze {
        image: PathBuf,

        /// LAT,LON for weather-based recommendations
        #[arg(long, value_name = "LAT,LON")]
        location: Option<Coordinates>,

        /// Stop after the diagnostic summary
        #[arg(long)]
        no_recommendations: bool,

        /// Also write a printable HTML document
        #[arg(long, value_name = "FILE")]
        html: Option<PathBuf>,

        /// Also write the CSV summary
        #[arg(long, value_name = "FILE")]
        csv: Option<PathBuf>,
    },

    /// Render a markdown report to HTML (`-` reads stdin)
    Render {
        input: String,

        /// Emit the complete printable document
        #[arg(long)]
        document: bool,

        /// Image to embed in the printable document
        #[arg(long, value_name = "PATH", requires = "document")]
        image: Option<PathBuf>,
    },

    /// Show the fields extracted from a report
    Fields {
        input: String,

        #[arg(long)]
        json: bool,
    },

    /// Export a report's fields as CSV
    Csv {
        input: String,

        /// Default: <output_dir>/plant-report-<date>.csv
        #[arg(long, short = 'o', value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Print a shareable link for a report
    Share { input: String },

    /// Open a shared link (or bare payload)
    Open {
        link: String,

        /// Print the markdown instead of HTML
        #[arg(long)]
        raw: bool,
    },

    /// Information sheet for a disease
    Info {
        disease: String,

        /// Print the markdown instead of HTML
        #[arg(long)]
        raw: bool,
    },

    /// 30-day disease risk forecast
    Forecast {
        #[arg(long, value_name = "LAT,LON")]
        location: Option<Coordinates>,

        #[arg(long = "crop", value_name = "NAME", required = true)]
        crops: Vec<String>,

        #[arg(long, default_value = "Vegetative")]
        stage: CropStage,
    },

    /// Past analyses
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Interactive assistant (`/csv` exports the last answer, `exit` quits)
    Chat,
}

#[derive(Subcommand, Debug)]
enum HistoryAction {
    List,
    Show { id: String },
    Clear,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load_or_default(cli.config.as_deref())?;

    let mut logger_config = LoggerConfig::from_config(&config.logging, config.log_file_path());
    if cli.verbose {
        logger_config.level = "debug".to_string();
    }
    let _guard = logger::init(logger_config)?;

    match cli.command {
        Command::Analyze {
            image,
            location,
            no_recommendations,
            html,
            csv,
        } => {
            let location = location.map(|c| c.to_string()).or_else(|| config.location.clone());
            analyze(&config, &image, location.as_deref(), no_recommendations, html, csv).await
        }
        Command::Render {
            input,
            document,
            image,
        } => {
            let report = read_input(&input)?;
            if document {
                let image_url = image
                    .map(|p| LeafImage::from_path(p).map(|i| i.data_url()))
                    .transpose()?;
                println!("{}", build_printable_document(&report, image_url.as_deref()));
            } else {
                println!("{}", render_to_html(&report));
            }
            Ok(())
        }
        Command::Fields { input, json } => {
            let fields = extract_fields(&read_input(&input)?);
            if json {
                println!("{}", serde_json::to_string_pretty(&fields)?);
            } else {
                print_fields(&fields);
            }
            Ok(())
        }
        Command::Csv { input, output } => {
            let report = read_input(&input)?;
            let path = output.unwrap_or_else(|| {
                config.output_dir().join(csv_filename(Utc::now().date_naive()))
            });
            write_output(&path, &report_to_csv(&report))?;
            println!("{} {}", "CSV written to".green(), path.display());
            Ok(())
        }
        Command::Share { input } => {
            let report = ActiveReport::new(read_input(&input)?, None);
            println!("{}", report.share_url(&config.export.share_base_url)?);
            Ok(())
        }
        Command::Open { link, raw } => {
            let report = ActiveReport::from_share_link(&link)?;
            if raw {
                println!("{}", report.diagnosis);
            } else {
                println!("{}", report.html());
            }
            Ok(())
        }
        Command::Info { disease, raw } => {
            let analyzer = Analyzer::new(GeminiClient::from_config(&config)?);
            let pb = spinner(&format!("Looking up {}...", disease));
            let result = analyzer.disease_info(&disease).await;
            pb.finish_and_clear();

            let markdown = result?;
            if raw {
                println!("{}", markdown);
            } else {
                println!("{}", render_to_html(&markdown));
            }
            Ok(())
        }
        Command::Forecast {
            location,
            crops,
            stage,
        } => forecast(&config, location, crops, stage).await,
        Command::History { action } => history(&config, action),
        Command::Chat => chat(&config).await,
    }
}

async fn analyze(
    config: &Config,
    image_path: &Path,
    location: Option<&str>,
    no_recommendations: bool,
    html: Option<PathBuf>,
    csv: Option<PathBuf>,
) -> Result<()> {
    let analyzer = Analyzer::new(GeminiClient::from_config(config)?);
    let image = LeafImage::from_path(image_path)?;
    let image_url = image.data_url();

    let pb = spinner("Analyzing leaf image...");
    let diagnosis = analyzer.diagnose(&image).await;
    pb.finish_and_clear();
    let diagnosis = diagnosis?;

    let mut report = ActiveReport::new(diagnosis.report, Some(image_url.clone()));

    if no_recommendations {
        info!("Skipping recommendations");
    } else if !diagnosis.fields.has_diagnosis() {
        eprintln!(
            "{}",
            "Plant or disease could not be identified; skipping recommendations.".yellow()
        );
    } else {
        let pb = spinner("Preparing recommendations...");
        let recommendations = analyzer.recommend(&diagnosis.fields, location).await;
        pb.finish_and_clear();

        match recommendations {
            Ok(recs) => {
                if let Some(notice) = recs.notice {
                    eprintln!("{}", notice.yellow());
                }
                report = report.with_recommendations(recs.markdown);
            }
            Err(e) => eprintln!("{} {:#}", "Recommendations unavailable:".red(), e),
        }
    }

    let markdown = report.full_markdown();
    println!("{}", markdown);

    if let Some(path) = html {
        write_output(&path, &report.printable_document())?;
        eprintln!("{} {}", "Printable report written to".green(), path.display());
    }
    if let Some(path) = csv {
        write_output(&path, &report.csv_at(Utc::now()))?;
        eprintln!("{} {}", "CSV written to".green(), path.display());
    }

    let saved = HistoryStore::open(config.history_path(), config.history.max_entries)
        .and_then(|store| store.add(&HistoryEntry::new(markdown, Some(image_url))));
    if let Err(e) = saved {
        warn!("Could not save analysis to history: {:#}", e);
    }

    Ok(())
}

async fn forecast(
    config: &Config,
    location: Option<Coordinates>,
    crops: Vec<String>,
    stage: CropStage,
) -> Result<()> {
    let location = match location {
        Some(coords) => coords,
        None => config
            .location
            .as_deref()
            .ok_or(LeafError::MissingInput("Location"))?
            .parse::<Coordinates>()
            .map_err(anyhow::Error::msg)
            .context("Invalid location in config")?,
    };

    let crops = crops
        .into_iter()
        .map(|crop| match find_crop(&crop) {
            Some(known) => known.to_string(),
            None => {
                warn!("{} is not in the crop catalogue", crop);
                crop
            }
        })
        .collect();

    let request = ForecastRequest::new(location.to_string(), stage, crops)?;
    let analyzer = Analyzer::new(GeminiClient::from_config(config)?);

    let pb = spinner("Generating 30-day forecast...");
    let result = analyzer.forecast(&request).await;
    pb.finish_and_clear();

    println!("{}", result?);
    Ok(())
}

fn history(config: &Config, action: HistoryAction) -> Result<()> {
    let store = HistoryStore::open(config.history_path(), config.history.max_entries)?;

    match action {
        HistoryAction::List => {
            let entries = store.list()?;
            if entries.is_empty() {
                println!("{}", "No analyses yet.".dimmed());
            }
            for entry in entries {
                println!("{}  {}", entry.id.cyan(), entry.plant_name.bold());
            }
        }
        HistoryAction::Show { id } => match store.get(&id)? {
            Some(entry) => println!("{}", entry.report_markdown),
            None => anyhow::bail!("No history entry with id {}", id),
        },
        HistoryAction::Clear => {
            let deleted = store.clear()?;
            println!("{} {} entries", "Cleared".green(), deleted);
        }
    }

    Ok(())
}

async fn chat(config: &Config) -> Result<()> {
    let client = GeminiClient::from_config(config)?;
    let mut session = ChatSession::new();

    println!("{}", "leafdoc assistant is ready. Type 'exit' to quit, '/csv' to export the last answer.".bright_green());

    loop {
        print!("{}", "you > ".bright_blue());
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let prompt = input.trim();

        if prompt == "exit" || prompt == "quit" {
            break;
        }

        if prompt == "/csv" {
            match session.last_result() {
                Some(result) => {
                    let path = config.output_dir().join(chat_csv_filename(Utc::now()));
                    write_output(&path, &chat_result_to_csv(result))?;
                    println!("{} {}", "CSV written to".green(), path.display());
                }
                None => println!("{}", "Nothing to export yet.".yellow()),
            }
            continue;
        }

        let pb = spinner("Thinking...");
        let reply = session.send(&client, prompt).await;
        pb.finish_and_clear();

        match reply {
            Ok(Some(reply)) => println!("\n{}\n", reply.answer.white()),
            Ok(None) => {}
            Err(e) => println!("{} {:#}", "Could not get a response:".red(), e),
        }
    }

    Ok(())
}

fn print_fields(fields: &ParsedReportFields) {
    let rows = [
        (fields::PLANT_TYPE, &fields.plant_type),
        (fields::DETECTED_DISEASE, &fields.detected_disease),
        (fields::CONFIDENCE_SCORE, &fields.confidence_score),
        (fields::ESTIMATED_CO2E, &fields.estimated_co2e),
        (fields::ESTIMATED_INPUT_TOKENS, &fields.estimated_input_tokens),
        (fields::ESTIMATED_OUTPUT_TOKENS, &fields.estimated_output_tokens),
    ];
    for (label, value) in rows {
        let value = if fields::is_present(value) {
            value.normal()
        } else {
            value.dimmed()
        };
        println!("{:>30}: {}", label.bold(), value);
    }
}

/// Report text from a file, or stdin for `-`.
fn read_input(source: &str) -> Result<String> {
    if source == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read report from stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(source).with_context(|| format!("Failed to read report: {}", source))
}

fn write_output(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }
    std::fs::write(path, contents).with_context(|| format!("Failed to write {:?}", path))
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
