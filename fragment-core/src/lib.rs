use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

pub mod container;
pub mod extract;
pub mod filters;
pub mod iso;
pub mod lines;
pub mod patch;
pub mod scan;
pub mod sjis;
pub mod table;
pub mod tables;

use filters::Filters;
use iso::IsoError;
use lines::{ExtractedLine, TranslationUnit};
use patch::{Padding, PatchIssue, PatchSummary};

pub const GAME_LINES_FILE: &str = "gamelines.csv";
pub const TL_LINES_FILE: &str = "tllines.csv";

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{}: {source}", .path.display())]
    File {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("table error: {0}")]
    Csv(#[from] csv::Error),

    #[error("table {source_name}: {source}")]
    Table {
        source_name: String,
        source: csv::Error,
    },

    #[error("failed to fetch table: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("failed to write report: {0}")]
    Json(#[from] serde_json::Error),

    #[error("disc image: {0}")]
    Iso(#[from] IsoError),

    #[error("'{file}' not found in {target}")]
    MissingEntry { file: String, target: String },

    #[error("{file} at offset {offset}: {issue}")]
    LineRejected {
        file: String,
        offset: usize,
        issue: PatchIssue,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ToolError>;

/// Read a whole file, keeping the path in the error.
pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|source| ToolError::File {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractSettings {
    pub output_path: PathBuf,
    /// Files to scan, or directories to scan recursively.
    pub inputs: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractSummary {
    pub files: usize,
    pub lines: usize,
    pub units: usize,
    pub game_lines_path: PathBuf,
    pub tl_lines_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchSettings {
    /// Occurrence table: local path or URL.
    pub table: String,
    /// Optional translation-unit table whose translations fill rows of
    /// `table` that have none of their own.
    pub units_table: Option<String>,
    /// Directory tree or disc image.
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub padding: Padding,
    /// Per-file padding, keyed by the table's `FILE` value.
    pub file_padding: BTreeMap<String, Padding>,
    /// Directory inside a disc image holding the table's files.
    pub image_dir: String,
    /// Halt on the first line that cannot be written instead of skipping it.
    pub strict: bool,
    pub report_path: Option<PathBuf>,
}

impl PatchSettings {
    pub fn padding_for(&self, file: &str) -> Padding {
        self.file_padding.get(file).copied().unwrap_or(self.padding)
    }
}

fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if !input.exists() {
            return Err(ToolError::Config(format!(
                "Input path does not exist: {}",
                input.display()
            )));
        }
        if input.is_dir() {
            for entry in WalkDir::new(input).sort_by_file_name() {
                let entry = entry?;
                if entry.file_type().is_file() {
                    files.push(entry.into_path());
                }
            }
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn run_extract(settings: &ExtractSettings) -> Result<ExtractSummary> {
    let inputs = collect_inputs(&settings.inputs)?;
    let filters = Filters::default();

    let mut labels = HashSet::new();
    let mut game_lines: Vec<ExtractedLine> = Vec::new();
    for path in &inputs {
        let label = file_label(path);
        if !labels.insert(label.clone()) {
            tracing::warn!(file = %path.display(), "another input has the same file name; rows will be ambiguous");
        }

        let data = read_file(path)?;
        let lines = extract::extract_lines(&label, &data, &filters);
        tracing::info!(file = %label, bytes = data.len(), lines = lines.len(), "extracted");
        game_lines.extend(lines);
    }

    lines::assign_keys(&mut game_lines);
    let units = lines::translation_units(&game_lines);

    fs::create_dir_all(&settings.output_path)?;
    let game_lines_path = settings.output_path.join(GAME_LINES_FILE);
    let tl_lines_path = settings.output_path.join(TL_LINES_FILE);
    table::write_rows(&game_lines_path, &game_lines)?;
    table::write_rows(&tl_lines_path, &units)?;

    tracing::info!(
        files = inputs.len(),
        lines = game_lines.len(),
        units = units.len(),
        "wrote tables"
    );

    Ok(ExtractSummary {
        files: inputs.len(),
        lines: game_lines.len(),
        units: units.len(),
        game_lines_path,
        tl_lines_path,
    })
}

fn load_units(source: &str) -> Result<Vec<TranslationUnit>> {
    let mut units: Vec<TranslationUnit> = table::load_rows(source)?;
    for unit in &mut units {
        unit.refresh_counts();
        if unit.line_status == lines::LINE_STATUS_MISMATCH {
            tracing::warn!(
                key = %unit.key(),
                original = ?unit.orig_lines,
                translated = ?unit.tl_lines,
                "translation changes the number of lines"
            );
        }
    }
    Ok(units)
}

pub fn run_patch(settings: &PatchSettings) -> Result<PatchSummary> {
    if !settings.input_path.exists() {
        return Err(ToolError::Config(format!(
            "Input path does not exist: {}",
            settings.input_path.display()
        )));
    }

    let mut rows: Vec<ExtractedLine> = table::load_rows(&settings.table)?;
    tracing::info!(rows = rows.len(), "loaded translation table");

    if let Some(source) = &settings.units_table {
        let units = load_units(source)?;
        let filled = lines::fill_from_units(&mut rows, &units);
        tracing::info!(units = units.len(), filled, "applied translation units");
    }

    let plan = patch::build_instructions(&rows, settings.strict)?;
    tracing::info!(
        files = plan.groups.len(),
        lines = plan.instruction_count(),
        untranslated = plan.untranslated,
        "built patch plan"
    );

    let mut summary = PatchSummary {
        untranslated: plan.untranslated,
        skipped: plan.skipped,
        ..PatchSummary::default()
    };

    let mut container =
        container::open(&settings.input_path, &settings.output_path, &settings.image_dir)?;
    for (file, group) in &plan.groups {
        let padding = settings.padding_for(file).byte();
        tracing::debug!(file = %file, lines = group.len(), "patching");
        container.patch_file(file, &mut |region: &mut [u8]| {
            patch::apply_group(region, group, padding, settings.strict, &mut summary)
        })?;
    }
    container.finish()?;

    if let Some(path) = &settings.report_path {
        fs::write(path, serde_json::to_vec_pretty(&summary)?)?;
    }

    tracing::info!(
        files = summary.files,
        applied = summary.applied,
        untranslated = summary.untranslated,
        skipped = summary.skipped.len(),
        "patch complete"
    );
    Ok(summary)
}
