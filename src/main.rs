use crate::AppError::ConfigError;
use clap::{Parser, Subcommand};
use config::Config;
use std::io;
use std::path::{Path, PathBuf};
use tefdecode::{
    describe_event, parse_tef_file, Document, ExpandOptions, ParsedDocument, TefError,
};

mod config;

fn main() {
    let result = main_result();
    std::process::exit(match result {
        Ok(()) => 0,
        Err(err) => {
            // use Display instead of Debug for user friendly error messages
            log::error!("{err}");
            1
        }
    });
}

pub fn main_result() -> Result<(), AppError> {
    // setup logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("tefdecode=info"))
        .init();

    // args
    let args = CliArgs::parse();
    let tab_file_path = PathBuf::from(&args.tab_file_path);
    if !tab_file_path.exists() {
        let err = ConfigError(format!("Tab file not found {tab_file_path:?}"));
        return Err(err);
    }

    // read local config
    let local_config = Config::read_config()?;

    match args.command {
        Command::Version => {
            // only the signature is needed
            let data = std::fs::read(&tab_file_path)?;
            let (header, _info) = tefdecode::parser::header_parser::parse_header(&data)?;
            println!("{} ({:?})", header.version_string(), header.version);
        }
        Command::Info => {
            let parsed = load(&tab_file_path)?;
            println!("{}", parsed.document);
        }
        Command::Tracks => {
            let parsed = load(&tab_file_path)?;
            print_tracks(&parsed.document);
        }
        Command::Timeline {
            track,
            ignore_reading_list,
            ticks_per_quarter,
        } => {
            let parsed = load(&tab_file_path)?;
            let options = ExpandOptions {
                ticks_per_quarter: ticks_per_quarter.unwrap_or(local_config.ticks_per_quarter()),
                use_reading_list: !ignore_reading_list,
            };
            let track = track.unwrap_or(local_config.default_track());
            print_timeline(&parsed.document, track, &options)?;
        }
    }
    Ok(())
}

fn load(path: &Path) -> Result<ParsedDocument, AppError> {
    log::info!("Parsing {path:?}");
    let parsed = parse_tef_file(path)?;
    if !parsed.diagnostics.is_empty() {
        log::info!("Parsed with {} warnings", parsed.diagnostics.len());
    }
    Ok(parsed)
}

fn print_tracks(document: &Document) {
    for track in &document.tracks {
        let (notes, unrecognized) = document
            .events(track.index)
            .map_or((0, 0), |m| (m.note_count(), m.unrecognized_count()));
        println!(
            "{}\t{}\t{}\t{} strings\t{}\t{notes} notes\t{unrecognized} unrecognized",
            track.index,
            track.name,
            track.role,
            track.string_count,
            track.tuning_names().join(" ")
        );
    }
}

fn print_timeline(
    document: &Document,
    track: usize,
    options: &ExpandOptions,
) -> Result<(), AppError> {
    // expansion warnings are logged as they are collected
    let expansion = document.timeline(track, options)?;
    for timed in &expansion.timeline.events {
        println!("{}\t{}", timed.tick, describe_event(timed.event));
    }
    log::info!(
        "{} events over {} measures",
        expansion.timeline.len(),
        expansion.timeline.measure_span()
    );
    Ok(())
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct CliArgs {
    /// Path to the TEF file.
    tab_file_path: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the detected format version.
    Version,
    /// Print the document structure.
    Info,
    /// List tracks with tunings and event counts.
    Tracks,
    /// Print the expanded timeline of one track.
    Timeline {
        /// Track index, defaults to the configured track.
        #[arg(long)]
        track: Option<usize>,
        /// Play measures in stored order.
        #[arg(long, default_value_t = false)]
        ignore_reading_list: bool,
        /// Output resolution, defaults to the configured value.
        #[arg(long)]
        ticks_per_quarter: Option<u32>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    ConfigError(String),
    #[error("parsing error: {0}")]
    ParsingError(String),
    #[error("other error: {0}")]
    OtherError(String),
}

impl From<TefError> for AppError {
    fn from(error: TefError) -> Self {
        match error {
            TefError::IoError(s) => Self::OtherError(s),
            other => Self::ParsingError(other.to_string()),
        }
    }
}

impl From<io::Error> for AppError {
    fn from(error: io::Error) -> Self {
        Self::OtherError(error.to_string())
    }
}
