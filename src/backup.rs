use anyhow::{anyhow, Context};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
pub const BUNDLE_FORMAT_V1: &str = "examwatch-data-v1";

// Every collection file the workspace may hold, in bundle order.
const DATA_FILES: &[&str] = &[
    "students_database.json",
    "batches.json",
    "teachers.json",
    "subjects.json",
    "cameras.json",
    "timetable.json",
    "camera_schedule.json",
    "attendance.json",
    "exam_violations.json",
];

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub file_count: usize,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
    pub file_count: usize,
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

pub fn export_data_bundle(
    workspace_path: &Path,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    if !workspace_path.is_dir() {
        return Err(anyhow!(
            "workspace not found: {}",
            workspace_path.to_string_lossy()
        ));
    }

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let mut entries: Vec<(String, Vec<u8>)> = Vec::new();
    for file in DATA_FILES {
        let path = workspace_path.join(file);
        if !path.is_file() {
            continue;
        }
        let bytes = std::fs::read(&path)
            .with_context(|| format!("failed to read {}", path.to_string_lossy()))?;
        entries.push((format!("data/{}", file), bytes));
    }

    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let exported_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let mut checksums = serde_json::Map::new();
    for (entry, bytes) in &entries {
        checksums.insert(entry.clone(), json!(sha256_hex(bytes)));
    }
    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": exported_at,
        "checksums": checksums,
    });

    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    for (entry, bytes) in &entries {
        zip.start_file(entry.as_str(), opts)
            .with_context(|| format!("failed to start entry {}", entry))?;
        zip.write_all(bytes)
            .with_context(|| format!("failed to write entry {}", entry))?;
    }

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        file_count: entries.len(),
    })
}

pub fn import_data_bundle(
    in_path: &Path,
    workspace_path: &Path,
) -> anyhow::Result<ImportSummary> {
    std::fs::create_dir_all(workspace_path).with_context(|| {
        format!(
            "failed to create workspace {}",
            workspace_path.to_string_lossy()
        )
    })?;

    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }
    let checksums = manifest
        .get("checksums")
        .and_then(|v| v.as_object())
        .cloned()
        .unwrap_or_default();

    let mut imported = 0usize;
    for file in DATA_FILES {
        let entry_name = format!("data/{}", file);
        let mut bytes = Vec::new();
        match archive.by_name(&entry_name) {
            Ok(mut entry) => {
                entry
                    .read_to_end(&mut bytes)
                    .with_context(|| format!("failed to read entry {}", entry_name))?;
            }
            Err(_) => continue,
        }

        if let Some(expected) = checksums.get(&entry_name).and_then(|v| v.as_str()) {
            let actual = sha256_hex(&bytes);
            if !expected.trim().eq_ignore_ascii_case(&actual) {
                return Err(anyhow!("checksum mismatch for {}", entry_name));
            }
        }

        let dst = workspace_path.join(file);
        let tmp = workspace_path.join(format!("{}.importing", file));
        std::fs::write(&tmp, &bytes)
            .with_context(|| format!("failed to write {}", tmp.to_string_lossy()))?;
        std::fs::rename(&tmp, &dst)
            .with_context(|| format!("failed to replace {}", dst.to_string_lossy()))?;
        imported += 1;
    }

    Ok(ImportSummary {
        bundle_format_detected: BUNDLE_FORMAT_V1.to_string(),
        file_count: imported,
    })
}
