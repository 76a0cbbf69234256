use crate::error::{AppError, AppResult};
use crate::store::{Store, StorePath};
use anyhow::Context;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const TREE_ENTRY: &str = "data/tree.json";
pub const BUNDLE_FORMAT: &str = "reportcard-store-v1";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub sha256: String,
    pub leaf_count: usize,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
    pub leaf_count: usize,
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Every object key in an imported tree must be a legal path segment.
fn check_keys(value: &Value) -> AppResult<()> {
    if let Value::Object(map) = value {
        for (k, v) in map {
            StorePath::root().child(k)?;
            check_keys(v)?;
        }
    }
    Ok(())
}

fn leaf_count(tree: &Value) -> usize {
    let mut leaves = Vec::new();
    crate::store::flatten("", tree, &mut leaves);
    leaves.len()
}

/// Writes the whole document tree to a zip bundle at `out_path`.
pub fn export_store_bundle(store: &dyn Store, out_path: &Path) -> AppResult<ExportSummary> {
    let tree = store.get(&StorePath::root())?.unwrap_or_else(|| json!({}));
    let tree_bytes = serde_json::to_vec_pretty(&tree).context("failed to serialize tree")?;
    let sha256 = sha256_hex(&tree_bytes);

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let manifest = json!({
        "format": BUNDLE_FORMAT,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": chrono::Utc::now().to_rfc3339(),
        "treeSha256": sha256,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(TREE_ENTRY, opts)
        .context("failed to start tree entry")?;
    zip.write_all(&tree_bytes)
        .context("failed to write tree entry")?;
    zip.finish().context("failed to finalize zip bundle")?;

    let leaf_count = leaf_count(&tree);
    tracing::info!(out = %out_path.display(), leaf_count, "store exported");
    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT.to_string(),
        sha256,
        leaf_count,
    })
}

/// Replaces the whole document tree with the bundle's. Nothing is written
/// unless the format and checksum both verify.
pub fn import_store_bundle(store: &mut dyn Store, in_path: &Path) -> AppResult<ImportSummary> {
    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file)
        .map_err(|e| AppError::validation(format!("invalid zip archive: {}", e)))?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .map_err(|_| AppError::validation("bundle missing manifest.json"))?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: Value = serde_json::from_str(&manifest_text)
        .map_err(|_| AppError::validation("manifest.json is invalid JSON"))?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT {
        return Err(AppError::validation(format!(
            "unsupported bundle format: {}",
            format
        )));
    }
    let expected = manifest
        .get("treeSha256")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let mut tree_bytes = Vec::new();
    archive
        .by_name(TREE_ENTRY)
        .map_err(|_| AppError::validation("bundle missing data/tree.json"))?
        .read_to_end(&mut tree_bytes)
        .context("failed to read tree entry")?;
    if sha256_hex(&tree_bytes) != expected {
        return Err(AppError::validation("bundle checksum mismatch"));
    }
    let tree: Value = serde_json::from_slice(&tree_bytes)
        .map_err(|_| AppError::validation("data/tree.json is invalid JSON"))?;
    if !tree.is_object() {
        return Err(AppError::validation("data/tree.json must be an object"));
    }
    check_keys(&tree)?;

    store.set(&StorePath::root(), &tree)?;
    let leaf_count = leaf_count(&tree);
    tracing::info!(input = %in_path.display(), leaf_count, "store imported");
    Ok(ImportSummary {
        bundle_format_detected: BUNDLE_FORMAT.to_string(),
        leaf_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let p = std::env::temp_dir().join(format!(
            "{}-{}",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        std::fs::create_dir_all(&p).expect("create temp dir");
        p
    }

    fn write_bundle(path: &Path, manifest: &Value, tree: &[u8]) {
        let f = File::create(path).expect("create bundle");
        let mut zip = ZipWriter::new(f);
        let opts = FileOptions::default();
        zip.start_file(MANIFEST_ENTRY, opts).expect("manifest");
        zip.write_all(manifest.to_string().as_bytes()).expect("write");
        zip.start_file(TREE_ENTRY, opts).expect("tree");
        zip.write_all(tree).expect("write");
        zip.finish().expect("finish");
    }

    #[test]
    fn export_then_import_replaces_tree() {
        let dir = temp_dir("reportcard-backup");
        let bundle = dir.join("store.zip");

        let mut src = SqliteStore::open_in_memory().expect("store");
        let p = StorePath::new(&["students", "class1", "k1"]).expect("path");
        src.set(&p, &json!({ "name": "Asha", "roll": 1 })).expect("set");
        let export = export_store_bundle(&src, &bundle).expect("export");
        assert_eq!(export.bundle_format, BUNDLE_FORMAT);
        assert_eq!(export.leaf_count, 2);

        let mut dst = SqliteStore::open_in_memory().expect("store");
        let stale = StorePath::new(&["subjects", "class9"]).expect("path");
        dst.set(&stale, &json!({ "gk": "GK" })).expect("set");
        let import = import_store_bundle(&mut dst, &bundle).expect("import");
        assert_eq!(import.leaf_count, 2);
        assert_eq!(
            dst.get(&p).expect("get"),
            Some(json!({ "name": "Asha", "roll": 1 }))
        );
        assert_eq!(dst.get(&stale).expect("get"), None);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn checksum_mismatch_leaves_store_untouched() {
        let dir = temp_dir("reportcard-backup-bad");
        let bundle = dir.join("tampered.zip");
        write_bundle(
            &bundle,
            &json!({ "format": BUNDLE_FORMAT, "treeSha256": sha256_hex(b"{}") }),
            br#"{"students":{}}"#,
        );

        let mut s = SqliteStore::open_in_memory().expect("store");
        let p = StorePath::new(&["subjects", "class1", "gk"]).expect("path");
        s.set(&p, &json!("GK")).expect("set");
        let res = import_store_bundle(&mut s, &bundle);
        assert!(matches!(res, Err(AppError::Validation(_))));
        assert_eq!(s.get(&p).expect("get"), Some(json!("GK")));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn keys_that_are_not_path_segments_are_rejected() {
        let dir = temp_dir("reportcard-backup-keys");
        let bundle = dir.join("keys.zip");
        let tree = br#"{"students":{"class1":{"a.b":{"name":"X","roll":1}}}}"#;
        write_bundle(
            &bundle,
            &json!({ "format": BUNDLE_FORMAT, "treeSha256": sha256_hex(tree) }),
            tree,
        );
        let mut s = SqliteStore::open_in_memory().expect("store");
        assert!(matches!(
            import_store_bundle(&mut s, &bundle),
            Err(AppError::Validation(_))
        ));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn foreign_format_is_rejected() {
        let dir = temp_dir("reportcard-backup-format");
        let bundle = dir.join("other.zip");
        let tree = b"{}";
        write_bundle(
            &bundle,
            &json!({ "format": "gradebook-archive-v2", "treeSha256": sha256_hex(tree) }),
            tree,
        );
        let mut s = SqliteStore::open_in_memory().expect("store");
        let res = import_store_bundle(&mut s, &bundle);
        assert!(matches!(res, Err(AppError::Validation(m)) if m.contains("unsupported")));

        let _ = std::fs::remove_dir_all(dir);
    }
}
