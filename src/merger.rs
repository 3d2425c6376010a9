use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::{Map, Value};

/// Where fragments are read from and where the merged tag set goes.
#[derive(Debug, Clone)]
pub struct MergeConfig {
    pub input_dir: PathBuf,
    pub output_file: PathBuf,
    pub publish_file: PathBuf,
    pub report_collisions: bool,
    pub collisions_out: Option<PathBuf>,
}

impl MergeConfig {
    /// Default layout: fragments in `extracted_data/`, merged file next to it,
    /// client copy under `../client_v3/public/data/`.
    pub fn from_root(root: &Path) -> Self {
        Self {
            input_dir: root.join("extracted_data"),
            output_file: root.join("extra_tags.json"),
            publish_file: root
                .join("..")
                .join("client_v3")
                .join("public")
                .join("data")
                .join("extra_tags.json"),
            report_collisions: false,
            collisions_out: None,
        }
    }
}

// A key supplied by more than one fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collision {
    pub key: String,
    pub previous: PathBuf,
    pub replaced_by: PathBuf,
}

#[derive(Debug)]
pub struct MergeReport {
    pub tags: Map<String, Value>,
    pub fragments: Vec<PathBuf>,
    pub collisions: Vec<Collision>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum RunOutcome {
    InputDirCreated(PathBuf),
    NoFragments(PathBuf),
    Published {
        fragments: usize,
        keys: usize,
        collisions: usize,
    },
}

/// Returns `true` if the directory was already there.
pub fn ensure_input_dir(path: &Path) -> Result<bool> {
    if path.is_dir() {
        return Ok(true);
    }
    fs::create_dir_all(path)
        .with_context(|| format!("creating input directory {}", path.display()))?;
    info!("Created directory: {}", path.display());
    info!("Put the JSON tag files into it and run again");
    Ok(false)
}

/// Regular files directly inside `dir` named `*.json`, sorted by file name.
pub fn list_json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("reading directory {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("listing {}", dir.display()))?;
        let path = entry.path();

        let name = entry.file_name();
        if name.to_str().is_none() {
            debug!("Non-UTF-8 file name: {:?}", name);
        }
        // byte suffix so non-UTF-8 names still match
        let is_json = name.as_encoded_bytes().ends_with(b".json");
        // follows symlinks
        if is_json && path.is_file() {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Shallow-merge the top-level objects of `files` in order; later files win.
pub fn merge_fragments(files: &[PathBuf]) -> Result<MergeReport> {
    let mut tags = Map::new();
    // which fragment supplied each key last
    let mut owners: HashMap<String, &PathBuf> = HashMap::new();
    let mut collisions = Vec::new();

    for path in files {
        info!("Processing file: {}", path.display());

        let content = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let json: Value = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;

        let fragment = match json {
            Value::Object(obj) => obj,
            other => bail!(
                "File {} is not a JSON object (found {})",
                path.display(),
                kind_of(&other)
            ),
        };
        debug!("{}: {} key(s)", path.display(), fragment.len());

        for (key, value) in fragment {
            tags.insert(key.clone(), value);
            if let Some(prev) = owners.insert(key.clone(), path) {
                collisions.push(Collision {
                    key,
                    previous: prev.clone(),
                    replaced_by: path.clone(),
                });
            }
        }
    }

    Ok(MergeReport {
        tags,
        fragments: files.to_vec(),
        collisions,
    })
}

/// Write `merged` as indented JSON to `output`, then copy the bytes to `dest`.
pub fn publish(merged: &Map<String, Value>, output: &Path, dest: &Path) -> Result<()> {
    write_json(output, merged)?;
    info!("Merged JSON saved to {}", output.display());

    create_parent(dest)?;
    fs::copy(output, dest)
        .with_context(|| format!("copying {} to {}", output.display(), dest.display()))?;
    info!("Copied {} to {}", output.display(), dest.display());
    Ok(())
}

pub fn write_collisions(collisions: &[Collision], path: &Path) -> Result<()> {
    write_json(path, collisions)?;
    info!("Wrote {} collision(s) to {}", collisions.len(), path.display());
    Ok(())
}

pub fn run(config: &MergeConfig) -> Result<RunOutcome> {
    if !ensure_input_dir(&config.input_dir)? {
        return Ok(RunOutcome::InputDirCreated(config.input_dir.clone()));
    }

    info!("Merging JSON files from {}", config.input_dir.display());
    let files = list_json_files(&config.input_dir)?;
    if files.is_empty() {
        warn!("No JSON files found in {}", config.input_dir.display());
        return Ok(RunOutcome::NoFragments(config.input_dir.clone()));
    }

    let report = merge_fragments(&files)?;

    if config.report_collisions {
        for c in &report.collisions {
            warn!(
                "Key '{}' from {} overwritten by {}",
                c.key,
                c.previous.display(),
                c.replaced_by.display()
            );
        }
    }

    // before publishing, so a failed report leaves the data files untouched
    if let Some(path) = &config.collisions_out {
        write_collisions(&report.collisions, path)?;
    }

    publish(&report.tags, &config.output_file, &config.publish_file)?;

    info!("Merge and copy finished");
    Ok(RunOutcome::Published {
        fragments: report.fragments.len(),
        keys: report.tags.len(),
        collisions: report.collisions.len(),
    })
}

// serde_json's pretty printer: 2-space indent, non-ASCII left as is
fn write_json<T: Serialize + ?Sized>(path: &Path, data: &T) -> Result<()> {
    create_parent(path)?;
    let file = File::create(path).with_context(|| format!("writing {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, data)
        .with_context(|| format!("writing {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    Ok(())
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
