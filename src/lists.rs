//! File lists for downstream verification toolkits, one tree per protocol:
//!
//! ```text
//! <output>/<protocol>/norm/train_world.lst   <path> <client>
//! <output>/<protocol>/dev/for_models.lst     <path> <model> <client>
//! <output>/<protocol>/dev/for_probes.lst     <path> <client>
//! ```
//!
//! `eval` mirrors `dev`. Models are named after the client they enroll.

use anyhow::{bail, Context, Result};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::catalog::FileRecord;
use crate::db::{Database, PurposeFilter};
use crate::metadata::{Group, Purpose};

/// Space-separated writer without quoting: list readers split on whitespace.
pub(crate) fn list_writer(path: &Path) -> Result<csv::Writer<File>> {
    csv::WriterBuilder::new()
        .delimiter(b' ')
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Never)
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))
}

/// Writes one list line. A field holding whitespace would shift every
/// column after it, so it is refused.
pub(crate) fn write_line(wtr: &mut csv::Writer<File>, path: &Path, fields: &[&str]) -> Result<()> {
    if let Some(field) = fields.iter().find(|f| f.is_empty() || f.contains(char::is_whitespace)) {
        bail!("{}: cannot write list field {:?}", path.display(), field);
    }
    wtr.write_record(fields)?;
    Ok(())
}

fn write_list(path: &Path, files: &[FileRecord], with_model: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut wtr = list_writer(path)?;

    for file in files {
        let client = file.client.key().to_string();
        if with_model {
            write_line(&mut wtr, path, &[file.path.as_str(), client.as_str(), client.as_str()])?;
        } else {
            write_line(&mut wtr, path, &[file.path.as_str(), client.as_str()])?;
        }
    }
    wtr.flush()?;
    Ok(())
}

/// Writes the list tree of every stored protocol and returns the files written.
pub fn export_bio_lists(db: &Database, output: &Path) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    let everything = PurposeFilter::default();

    for protocol in db.protocols()? {
        let base = output.join(&protocol.name);
        let mut list = |path: PathBuf, group: Group, purpose: Purpose, with_model: bool| -> Result<()> {
            let mut files = db.purpose_files(&protocol.name, group, purpose, &everything)?;
            crate::protocol::sort_dedup(&mut files);
            write_list(&path, &files, with_model)?;
            written.push(path);
            Ok(())
        };

        list(base.join("norm").join("train_world.lst"), Group::World, Purpose::Train, false)?;
        for group in [Group::Dev, Group::Eval] {
            let dir = base.join(group.as_str());
            list(dir.join("for_models.lst"), group, Purpose::Enroll, true)?;
            list(dir.join("for_probes.lst"), group, Purpose::Probe, false)?;
        }
        tracing::info!(protocol = %protocol.name, "Exported file lists");
    }

    Ok(written)
}
