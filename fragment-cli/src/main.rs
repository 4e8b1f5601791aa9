use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use fragment_core::patch::Padding;
use fragment_core::{run_extract, run_patch, ExtractSettings, PatchSettings};

#[derive(Debug, Parser)]
#[command(
    name = "fragment-tl",
    version,
    about = "Extract Shift-JIS text from game data and patch translations back in place"
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scan game files and write gamelines.csv and tllines.csv.
    Extract {
        output_folder: PathBuf,

        /// Files to scan. Directories are scanned recursively.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Write translations from a table into a copy of the game files.
    Patch {
        /// Translated occurrence table: a path or an http(s) URL.
        translated_table: String,

        /// Directory of game files, or a disc image.
        input: PathBuf,

        /// Output directory (for a directory input) or image path.
        output: PathBuf,

        /// Translation-unit table used to fill rows without a translation.
        #[arg(long, value_name = "TABLE")]
        units: Option<String>,

        /// Byte written after a translation shorter than its slot.
        #[arg(long, default_value = "null", value_parser = parse_padding)]
        padding: Padding,

        /// Padding override for a single file, as FILE=null or FILE=space.
        #[arg(long = "pad-file", value_name = "FILE=PADDING", value_parser = parse_file_padding)]
        pad_file: Vec<(String, Padding)>,

        /// Directory inside a disc image that holds the table's files.
        #[arg(long, default_value = "DATA")]
        image_dir: String,

        /// Stop at the first translation that cannot be written.
        #[arg(long, default_value_t = false)]
        strict: bool,

        /// Write a JSON summary of the run here.
        #[arg(long, value_name = "PATH")]
        report: Option<PathBuf>,
    },
}

fn parse_padding(s: &str) -> Result<Padding, String> {
    s.parse()
}

fn parse_file_padding(s: &str) -> Result<(String, Padding), String> {
    let (file, padding) = s
        .split_once('=')
        .ok_or_else(|| format!("expected FILE=PADDING, got '{s}'"))?;
    if file.is_empty() {
        return Err(format!("missing file name in '{s}'"));
    }
    Ok((file.to_string(), padding.parse()?))
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let args = Args::parse();
    init_logging();

    let result = match args.command {
        Command::Extract {
            output_folder,
            inputs,
        } => run_extract(&ExtractSettings {
            output_path: output_folder,
            inputs,
        })
        .map(|summary| {
            println!(
                "extracted {} lines ({} unique) from {} files",
                summary.lines, summary.units, summary.files
            );
            println!("  {}", summary.game_lines_path.display());
            println!("  {}", summary.tl_lines_path.display());
        }),

        Command::Patch {
            translated_table,
            input,
            output,
            units,
            padding,
            pad_file,
            image_dir,
            strict,
            report,
        } => {
            let settings = PatchSettings {
                table: translated_table,
                units_table: units,
                input_path: input,
                output_path: output,
                padding,
                file_padding: pad_file.into_iter().collect::<BTreeMap<_, _>>(),
                image_dir,
                strict,
                report_path: report,
            };
            run_patch(&settings).map(|summary| {
                println!(
                    "patched {} lines in {} files, {} untranslated, {} skipped",
                    summary.applied,
                    summary.files,
                    summary.untranslated,
                    summary.skipped.len()
                );
                for skipped in &summary.skipped {
                    tracing::warn!(
                        file = %skipped.file,
                        offset = skipped.offset,
                        length = skipped.length,
                        issue = %skipped.issue,
                        "line not patched"
                    );
                }
            })
        }
    };

    if let Err(err) = result {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
