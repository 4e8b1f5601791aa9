use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::iso::{self, Extent};
use crate::{read_file, Result, ToolError};

/// Nothing reaches the output before `finish`.
pub trait Container {
    fn patch_file(
        &mut self,
        logical: &str,
        apply: &mut dyn FnMut(&mut [u8]) -> Result<()>,
    ) -> Result<()>;

    fn finish(&mut self) -> Result<()>;
}

fn join_candidate(base: &Path, candidate: &str) -> PathBuf {
    let mut path = base.to_path_buf();
    for part in candidate.split(['/', '\\']) {
        if !part.is_empty() {
            path.push(part);
        }
    }
    path
}

fn normalize(logical: &str) -> String {
    logical
        .split(['/', '\\'])
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// A directory of extracted game files. Patched files stay in memory until
/// `finish`, which writes a full copy of the input tree.
pub struct FileTree {
    input: PathBuf,
    output: PathBuf,
    files: BTreeSet<String>,
    by_name: HashMap<String, Vec<String>>,
    patched: BTreeMap<String, Vec<u8>>,
}

fn absolute(path: &Path) -> Result<PathBuf> {
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut existing = path.as_path();
    let mut missing = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => break,
        }
    }

    let mut resolved = fs::canonicalize(existing)?;
    for name in missing.into_iter().rev() {
        resolved.push(name);
    }
    Ok(resolved)
}

impl FileTree {
    pub fn open(input: &Path, output: &Path) -> Result<Self> {
        if absolute(output)?.starts_with(absolute(input)?) {
            return Err(ToolError::Config(format!(
                "output directory {} must not be inside the input tree {}",
                output.display(),
                input.display()
            )));
        }

        let mut files = BTreeSet::new();
        let mut by_name: HashMap<String, Vec<String>> = HashMap::new();
        for entry in WalkDir::new(input).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(input) else {
                continue;
            };
            let rel = normalize(&rel.to_string_lossy());
            by_name
                .entry(entry.file_name().to_string_lossy().into_owned())
                .or_default()
                .push(rel.clone());
            files.insert(rel);
        }

        tracing::debug!(root = %input.display(), files = files.len(), "indexed input tree");
        Ok(Self {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            files,
            by_name,
            patched: BTreeMap::new(),
        })
    }

    // Relative path first, then a unique file name anywhere in the tree.
    fn resolve(&self, logical: &str) -> Result<String> {
        let wanted = normalize(logical);
        if self.files.contains(&wanted) {
            return Ok(wanted);
        }

        match self.by_name.get(&wanted).map(Vec::as_slice) {
            Some([single]) => Ok(single.clone()),
            Some(many) if !many.is_empty() => Err(ToolError::Config(format!(
                "'{logical}' matches several files under {}: {}",
                self.input.display(),
                many.join(", ")
            ))),
            _ => Err(ToolError::MissingEntry {
                file: logical.to_string(),
                target: self.input.display().to_string(),
            }),
        }
    }

    fn write_output(&self, rel: &str, data: &[u8]) -> Result<()> {
        let dest = join_candidate(&self.output, rel);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&dest, data)?;
        Ok(())
    }
}

impl Container for FileTree {
    fn patch_file(
        &mut self,
        logical: &str,
        apply: &mut dyn FnMut(&mut [u8]) -> Result<()>,
    ) -> Result<()> {
        let rel = self.resolve(logical)?;
        let mut data = match self.patched.remove(&rel) {
            Some(data) => data,
            None => read_file(&join_candidate(&self.input, &rel))?,
        };
        apply(data.as_mut_slice())?;
        tracing::debug!(file = %rel, "patched file");
        self.patched.insert(rel, data);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        for rel in &self.files {
            match self.patched.get(rel) {
                Some(data) => self.write_output(rel, data)?,
                None => {
                    let data = read_file(&join_candidate(&self.input, rel))?;
                    self.write_output(rel, &data)?;
                }
            }
        }
        tracing::info!(
            output = %self.output.display(),
            files = self.files.len(),
            patched = self.patched.len(),
            "wrote output tree"
        );
        Ok(())
    }
}

/// A disc image held in memory. Table file names are looked up as
/// `<image_dir>/<FILE>`.
pub struct IsoImage {
    data: Vec<u8>,
    extents: BTreeMap<String, Extent>,
    image_dir: String,
    source: PathBuf,
    output: PathBuf,
}

impl IsoImage {
    pub fn open(input: &Path, output: &Path, image_dir: &str) -> Result<Self> {
        let data = read_file(input)?;
        let extents = iso::list_files(&data)?;
        tracing::debug!(image = %input.display(), files = extents.len(), "read disc image");
        for (path, extent) in &extents {
            tracing::trace!(path = %path, start = extent.start, length = extent.length, "extent");
        }

        Ok(Self {
            data,
            extents,
            image_dir: normalize(image_dir),
            source: input.to_path_buf(),
            output: output.to_path_buf(),
        })
    }

    fn logical_path(&self, file: &str) -> String {
        let file = normalize(file);
        if self.image_dir.is_empty() {
            file
        } else {
            format!("{}/{}", self.image_dir, file)
        }
    }

    fn resolve(&self, file: &str) -> Result<Extent> {
        let wanted = self.logical_path(file);
        if let Some(extent) = self.extents.get(&wanted) {
            return Ok(*extent);
        }
        self.extents
            .iter()
            .find(|(path, _)| path.eq_ignore_ascii_case(&wanted))
            .map(|(_, extent)| *extent)
            .ok_or_else(|| ToolError::MissingEntry {
                file: wanted,
                target: self.source.display().to_string(),
            })
    }
}

impl Container for IsoImage {
    fn patch_file(
        &mut self,
        logical: &str,
        apply: &mut dyn FnMut(&mut [u8]) -> Result<()>,
    ) -> Result<()> {
        let extent = self.resolve(logical)?;
        tracing::debug!(file = logical, start = extent.start, length = extent.length, "patching extent");
        // The resolver only returns extents inside the image.
        apply(&mut self.data[extent.start..extent.end()])
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(parent) = self.output.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.output, &self.data)?;
        tracing::info!(output = %self.output.display(), bytes = self.data.len(), "wrote disc image");
        Ok(())
    }
}

pub fn open(input: &Path, output: &Path, image_dir: &str) -> Result<Box<dyn Container>> {
    if input.is_dir() {
        Ok(Box::new(FileTree::open(input, output)?))
    } else {
        Ok(Box::new(IsoImage::open(input, output, image_dir)?))
    }
}
