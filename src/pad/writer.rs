use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

use super::sampler::{PadEntry, PadSplit};
use crate::lists::{list_writer, write_line};

/// Directory of repetition `k`: `<output>/lists/<protocol>-<k>`.
pub fn repetition_dir(output: &Path, protocol: &str, k: usize) -> PathBuf {
    output.join("lists").join(format!("{}-{}", protocol, k))
}

fn write_list(path: &Path, entries: &[PadEntry]) -> Result<()> {
    let mut wtr = list_writer(path)?;

    for entry in entries {
        match &entry.attack_type {
            Some(attack_type) => write_line(
                &mut wtr,
                path,
                &[entry.path.as_str(), entry.client.as_str(), attack_type.as_str()],
            )?,
            None => write_line(&mut wtr, path, &[entry.path.as_str(), entry.client.as_str()])?,
        }
    }

    wtr.flush()?;
    Ok(())
}

/// Writes `for_real.lst` and `for_attack.lst` for every group of one repetition.
pub fn write_split(output: &Path, protocol: &str, k: usize, split: &PadSplit) -> Result<()> {
    let base = repetition_dir(output, protocol, k);
    for (group, real) in split.real.iter() {
        let dir = base.join(group);
        fs::create_dir_all(&dir)?;
        write_list(&dir.join("for_real.lst"), real)?;
    }
    for (group, attack) in split.attack.iter() {
        write_list(&base.join(group).join("for_attack.lst"), attack)?;
    }
    Ok(())
}
