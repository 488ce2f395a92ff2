//! Grade Predictor CLI Module
//!
//! Command-line interface for importing data, training artifacts and
//! serving predictions.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::export::read_manifest;
use crate::preprocessing::{EncodingStrategy, Profile};
use crate::storage::{JsonFileStore, Repository};
use crate::training::{TrainEngine, TrainingConfig};
use crate::utils::DataLoader;

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "grade-predictor")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "k-NN student grade prediction service")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve predictions over HTTP
    Serve {
        /// Host to bind to [env: API_HOST]
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on [env: API_PORT]
        #[arg(short, long)]
        port: Option<u16>,

        /// Artifact directory [env: ARTIFACT_DIR]
        #[arg(short, long)]
        artifacts: Option<PathBuf>,

        /// Document store directory [env: STORE_DIR]
        #[arg(long)]
        store_dir: Option<PathBuf>,
    },

    /// Train models and write an artifact directory
    Train {
        /// CSV file with historical grades; defaults to the `grades` collection
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Pipeline profile (fixed, multi)
        #[arg(long, default_value = "fixed")]
        profile: Profile,

        /// Output artifact directory
        #[arg(short, long, default_value = "./artifacts")]
        output: PathBuf,

        /// Override the profile's categorical encoding (label, one-hot)
        #[arg(long)]
        encoding: Option<EncodingStrategy>,

        /// Override whether features are standardized
        #[arg(long)]
        scale: Option<bool>,

        /// Number of neighbors
        #[arg(short, long, default_value = "5")]
        k: usize,

        /// Held-out fraction for evaluation
        #[arg(long, default_value = "0.2")]
        test_size: f64,

        /// Shuffle seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Document store directory, used when --data is not given
        #[arg(long, env = "STORE_DIR")]
        store_dir: Option<PathBuf>,
    },

    /// Import a CSV file into the `grades` collection
    Import {
        /// CSV file to import
        csv: PathBuf,

        /// Document store directory
        #[arg(long, env = "STORE_DIR")]
        store_dir: PathBuf,
    },

    /// Show a summary of an artifact directory
    Info {
        /// Artifact directory
        #[arg(short, long, default_value = "./artifacts")]
        artifacts: PathBuf,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub async fn cmd_serve(
    host: Option<String>,
    port: Option<u16>,
    artifacts: Option<PathBuf>,
    store_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    use crate::server::{run_server, ServerConfig};

    let defaults = ServerConfig::default();
    let config = ServerConfig {
        host: host.unwrap_or(defaults.host.clone()),
        port: port.unwrap_or(defaults.port),
        artifact_dir: artifacts.unwrap_or(defaults.artifact_dir.clone()),
        store_dir: store_dir.or(defaults.store_dir.clone()),
        ..defaults
    };

    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", "Grade Predictor".white().bold()));
    line_box_center(&format!("{}", dim(&format!("v{}", env!("CARGO_PKG_VERSION")))));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("Predict  ", &format!("http://{}:{}/api/predict", config.host, config.port)));
    line_box(&kv("Health   ", &format!("http://{}:{}/health", config.host, config.port)));
    line_box(&kv("Artifacts", &config.artifact_dir.display().to_string()));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box_center(&format!("{}", dim("ctrl+c to stop")));
    line_box_empty();
    line_box_bottom();
    println!();

    run_server(config).await
}

pub struct TrainArgs {
    pub data: Option<PathBuf>,
    pub profile: Profile,
    pub output: PathBuf,
    pub encoding: Option<EncodingStrategy>,
    pub scale: Option<bool>,
    pub k: usize,
    pub test_size: f64,
    pub seed: u64,
    pub store_dir: Option<PathBuf>,
}

impl TrainArgs {
    /// Profile defaults with the command-line overrides applied
    pub fn training_config(&self) -> TrainingConfig {
        let base = TrainingConfig::for_profile(self.profile);
        let mut spec = base.spec.clone();
        if let Some(encoding) = self.encoding {
            spec = spec.with_encoding(encoding);
        }
        if let Some(scale) = self.scale {
            spec = spec.with_scaling(scale);
        }
        base.with_spec(spec)
            .with_n_neighbors(self.k)
            .with_test_size(self.test_size)
            .with_random_state(self.seed)
    }
}

pub fn cmd_train(args: TrainArgs) -> anyhow::Result<()> {
    section("Train");

    step_run("Loading data");
    let start = Instant::now();
    let docs = match (&args.data, &args.store_dir) {
        (Some(path), _) => DataLoader::new().load_documents(path)?,
        (None, Some(dir)) => {
            let repo = Repository::new(Arc::new(JsonFileStore::new(dir.clone())?));
            repo.grade_rows()?
        }
        (None, None) => anyhow::bail!("Pass --data <csv> or --store-dir with imported grades"),
    };
    step_done(&format!("{} rows in {:?}", docs.len(), start.elapsed()));

    let config = args.training_config();

    step_run(&format!("Training {} profile", args.profile.to_string().cyan()));
    let start = Instant::now();
    let bundle = TrainEngine::new(config).fit_documents(&docs)?;
    step_done(&format!("{:?}", start.elapsed()));

    step_run("Saving artifacts");
    bundle.save(&args.output)?;
    step_done(&args.output.display().to_string());

    println!();
    println!("  {:<16} {}", muted("Records"), bundle.n_records.to_string().white());
    for head in &bundle.heads {
        for m in &head.metrics {
            println!(
                "  {:<16} {}  {}",
                muted(&m.target),
                format!("MAE {:.3}", m.mae).white().bold(),
                format!("R² {:.3}", m.r2).white()
            );
        }
    }
    println!();

    Ok(())
}

pub fn cmd_import(csv: &Path, store_dir: &Path) -> anyhow::Result<()> {
    section("Import");

    step_run("Reading CSV");
    let docs = DataLoader::new().load_documents(csv)?;
    step_done(&format!("{} rows", docs.len()));

    let repo = Repository::new(Arc::new(JsonFileStore::new(store_dir.to_path_buf())?));
    step_run("Inserting into grades");
    let inserted = repo.insert_grades(docs)?;
    step_done(&format!("{} inserted", inserted));

    step_ok(&format!("Collection now holds {} documents", repo.count_grades()?));
    println!();
    Ok(())
}

pub fn cmd_info(artifacts: &Path) -> anyhow::Result<()> {
    section("Artifacts");

    let manifest = read_manifest(artifacts)?;
    println!("  {:<16} {}", muted("Profile"), manifest.spec.profile.to_string().white());
    println!("  {:<16} {}", muted("Encoding"), format!("{:?}", manifest.spec.encoding).white());
    println!("  {:<16} {}", muted("Scaled"), manifest.spec.scale.to_string().white());
    println!("  {:<16} {}", muted("Records"), manifest.n_records.to_string().white());
    println!("  {:<16} {}", muted("Created"), manifest.created_at.to_rfc3339().white());
    println!("  {:<16} {}", muted("Schema"), manifest.schema_version.to_string().white());

    section("Models");
    for head in &manifest.heads {
        println!(
            "  {} {}",
            accent("›"),
            head.targets.join(", ").white().bold()
        );
        println!(
            "    {}",
            dim(&format!(
                "{} features · {} samples · k={} · {}",
                head.n_features, head.n_samples, head.n_neighbors, head.model_file
            ))
        );
        for m in &head.metrics {
            println!("    {:<20} MAE {:.3}  R² {:.3}", muted(&m.target), m.mae, m.r2);
        }
    }
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(encoding: Option<EncodingStrategy>, scale: Option<bool>) -> TrainArgs {
        TrainArgs {
            data: None,
            profile: Profile::Fixed,
            output: PathBuf::from("./artifacts"),
            encoding,
            scale,
            k: 7,
            test_size: 0.25,
            seed: 3,
            store_dir: None,
        }
    }

    #[test]
    fn test_training_config_overrides() {
        let config = args(Some(EncodingStrategy::OneHot), Some(true)).training_config();
        assert_eq!(config.spec.profile, Profile::Fixed);
        assert_eq!(config.spec.encoding, EncodingStrategy::OneHot);
        assert!(config.spec.scale);
        assert_eq!(config.n_neighbors, 7);
        assert_eq!(config.test_size, 0.25);
        assert_eq!(config.random_state, 3);

        let defaults = args(None, None).training_config();
        assert_eq!(defaults.spec.encoding, EncodingStrategy::Label);
        assert!(!defaults.spec.scale);
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[1mbold\x1b[0m"), "bold");
    }
}
