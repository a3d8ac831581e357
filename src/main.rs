mod analyser;
mod ui;

use analyser::cleaner::CleaningPlan;
use analyser::core::ExtractionConfig;
use analyser::flows::DirectionPolicy;
use clap::{ArgAction, Parser};
use std::fs;
use std::path::Path;
use std::process::ExitCode;
use ui::output;

/// flowsniff turns a packet capture into a per-packet flow feature table
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// pcap/pcapng file to analyze
    #[arg(short = 'f', long, value_parser)]
    file: String,

    /// Directory to write the feature table and summary to
    #[arg(short = 'o', long, value_parser)]
    output_dir: Option<String>,

    /// Write the feature table as CSV instead of JSON
    #[arg(short = 'c', long, action = ArgAction::SetTrue)]
    csv: bool,

    /// tshark display filter applied before extraction
    #[arg(short = 'F', long, value_parser)]
    filter: Option<String>,

    /// Track both directions of a conversation as one flow
    #[arg(short = 'b', long, action = ArgAction::SetTrue)]
    bidirectional: bool,

    /// Skip payload entropy computation
    #[arg(long, action = ArgAction::SetTrue)]
    no_entropy: bool,

    /// Only print the capture summary
    #[arg(short = 's', long, action = ArgAction::SetTrue)]
    summary_only: bool,

    /// Keep the table as extracted, without imputation or row dropping
    #[arg(long, action = ArgAction::SetTrue)]
    raw: bool,

    /// Application name written into the label column of every row
    #[arg(short = 'a', long, value_parser)]
    app: Option<String>,
}

impl Args {
    fn extraction_config(&self) -> ExtractionConfig {
        ExtractionConfig {
            direction: if self.bidirectional {
                DirectionPolicy::Bidirectional
            } else {
                DirectionPolicy::Directional
            },
            entropy: !self.no_entropy,
            display_filter: self.filter.clone(),
            label: self.app.clone(),
        }
    }
}

fn main() -> ExitCode {
    if let Err(e) = simple_logger::init_with_env() {
        eprintln!("Unable to initialise logger: {e}");
    }

    let args = Args::parse();

    if let Some(out_dir) = args.output_dir.as_deref() {
        log::info!("Output directory {out_dir}");
        if let Err(e) = fs::create_dir_all(out_dir) {
            log::error!("Unable to create output directory {out_dir}: {e}");
            return ExitCode::FAILURE;
        }
    } else {
        log::warn!("No output directory specified.");
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), output::OutputError> {
    let config = args.extraction_config();
    let table = analyser::core::analyse_file(&args.file, &config);
    let summary = analyser::summary::summarize(&table, config.direction);

    if table.is_empty() {
        log::warn!("No data available for analysis.");
    }

    // ---- Output ----
    output::print_summary(&args.file, &summary);
    if args.summary_only {
        return Ok(());
    }

    let table = if args.raw {
        table
    } else {
        CleaningPlan::default().apply(table)
    };

    match args.output_dir.as_deref() {
        Some(out_dir) => {
            let out = Path::new(out_dir);
            let stem = Path::new(&args.file)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("capture");
            if args.csv {
                output::csv_to_file(&table, &out.join(format!("{stem}_features.csv")))?;
            } else {
                output::data_to_file(&output::data_as_json(&table)?, &out.join(format!("{stem}_features.json")))?;
            }
            output::data_to_file(&output::summary_as_json(&summary)?, &out.join(format!("{stem}_summary.json")))?;
        }
        None if args.csv => output::write_csv(&table, std::io::stdout().lock())?,
        None => println!("{}", output::data_as_json(&table)?),
    }

    Ok(())
}
