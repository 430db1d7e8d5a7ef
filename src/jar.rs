use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;
use zip::ZipArchive;

use crate::index::{Index, Indexer};

/// Index every class entry of a JAR file.
///
/// Entries are visited in sorted name order so repeated runs over the same
/// archive produce identical indexes. A class entry that fails to parse is
/// logged and skipped; a malformed archive member never aborts the session.
pub fn index_jar(path: &Path) -> Result<Index> {
    let file =
        fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut archive =
        ZipArchive::new(file).with_context(|| format!("failed to read {}", path.display()))?;

    let mut entry_names = Vec::new();
    for index in 0..archive.len() {
        let entry = archive
            .by_index(index)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        // Multi-release variants under META-INF/versions/ would shadow the
        // base entries they duplicate.
        let file_name = name.rsplit('/').next().unwrap_or(&name);
        if name.ends_with(".class")
            && file_name != "module-info.class"
            && !name.starts_with("META-INF/versions/")
        {
            entry_names.push(name);
        }
    }

    entry_names.sort();

    let mut indexer = Indexer::new();
    for name in entry_names {
        let mut entry = archive
            .by_name(&name)
            .with_context(|| format!("failed to read {}:{}", path.display(), name))?;
        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .with_context(|| format!("failed to read {}:{}", path.display(), name))?;
        if let Err(error) = indexer.index(&data) {
            warn!(entry = %name, %error, "skipping unparseable class entry");
        }
    }

    Ok(indexer.complete())
}
