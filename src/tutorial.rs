//! Tutorial progress persistence: the newline `name 0|1` progress file of
//! spec.md §6, seeded from a template when absent. Out of core per spec.md
//! §1 — the engine never reads or writes this file; only the guided-tutorial
//! CLI path touches it (mirrors `qchess/tutorial_progress.py`'s
//! `TutorialProgress`).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Ordered `tutorial_name -> completed` table backed by a progress file,
/// seeded from a template the first time the file is missing.
#[derive(Debug, Clone)]
pub struct Progress {
    config_path: PathBuf,
    template_path: PathBuf,
    table: BTreeMap<String, bool>,
}

impl Progress {
    /// Open (or seed from template) the progress file at `dir/progress`,
    /// falling back to `dir/progress_template` exactly once if it is
    /// missing. `dir` is typically `tutorials/`.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let config_path = dir.join("progress");
        let template_path = dir.join("progress_template");

        if !config_path.exists() {
            let template = fs::read_to_string(&template_path).with_context(|| {
                format!(
                    "progress file {} is missing and template {} could not be read",
                    config_path.display(),
                    template_path.display()
                )
            })?;
            fs::write(&config_path, template)
                .with_context(|| format!("failed to seed {}", config_path.display()))?;
        }

        let mut progress = Progress {
            config_path,
            template_path,
            table: BTreeMap::new(),
        };
        progress.reload()?;
        Ok(progress)
    }

    fn reload(&mut self) -> Result<()> {
        let text = fs::read_to_string(&self.config_path)
            .with_context(|| format!("failed to read {}", self.config_path.display()))?;
        self.table = parse_progress(&text)?;
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        fs::write(&self.config_path, render_progress(&self.table))
            .with_context(|| format!("failed to write {}", self.config_path.display()))
    }

    /// Copy the template back over the progress file and reload it,
    /// resetting every tutorial to its template state.
    pub fn start_over(&mut self) -> Result<()> {
        let template = fs::read_to_string(&self.template_path)
            .with_context(|| format!("failed to read {}", self.template_path.display()))?;
        fs::write(&self.config_path, template)
            .with_context(|| format!("failed to write {}", self.config_path.display()))?;
        self.reload()
    }

    pub fn is_completed(&self, tutorial_name: &str) -> Option<bool> {
        self.table.get(tutorial_name).copied()
    }

    pub fn mark_completed(&mut self, tutorial_name: &str, completed: bool) {
        self.table.insert(tutorial_name.to_string(), completed);
    }

    pub fn all_completed(&self) -> bool {
        !self.table.is_empty() && self.table.values().all(|&c| c)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, bool)> {
        self.table.iter().map(|(k, &v)| (k.as_str(), v))
    }
}

fn parse_progress(text: &str) -> Result<BTreeMap<String, bool>> {
    let mut table = BTreeMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.splitn(2, ' ');
        let name = parts
            .next()
            .ok_or_else(|| anyhow::anyhow!("malformed progress line: {line:?}"))?;
        let flag = parts
            .next()
            .ok_or_else(|| anyhow::anyhow!("malformed progress line: {line:?}"))?;
        let completed = match flag.trim() {
            "0" => false,
            "1" => true,
            other => anyhow::bail!("progress flag must be 0 or 1, got {other:?}"),
        };
        table.insert(name.to_string(), completed);
    }
    Ok(table)
}

fn render_progress(table: &BTreeMap<String, bool>) -> String {
    let mut out = String::new();
    for (name, completed) in table {
        out.push_str(name);
        out.push(' ');
        out.push(if *completed { '1' } else { '0' });
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_renders_round_trip() {
        let text = "splitting 0\nmerging 1\n";
        let table = parse_progress(text).unwrap();
        assert_eq!(table.get("splitting"), Some(&false));
        assert_eq!(table.get("merging"), Some(&true));
        assert_eq!(render_progress(&table), "merging 1\nsplitting 0\n");
    }

    #[test]
    fn rejects_malformed_flag() {
        assert!(parse_progress("splitting 2\n").is_err());
        assert!(parse_progress("splitting\n").is_err());
    }

    #[test]
    fn seeds_from_template_when_progress_file_absent() {
        let dir = std::env::temp_dir().join(format!(
            "qchess_progress_test_{}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("progress_template"), "splitting 0\nmerging 0\n").unwrap();
        let _ = fs::remove_file(dir.join("progress"));

        let progress = Progress::load(&dir).unwrap();
        assert_eq!(progress.is_completed("splitting"), Some(false));
        assert!(!progress.all_completed());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn mark_completed_then_save_persists() {
        let dir = std::env::temp_dir().join(format!(
            "qchess_progress_test_save_{}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("progress_template"), "splitting 0\n").unwrap();
        let _ = fs::remove_file(dir.join("progress"));

        let mut progress = Progress::load(&dir).unwrap();
        progress.mark_completed("splitting", true);
        progress.save().unwrap();

        let reloaded = Progress::load(&dir).unwrap();
        assert_eq!(reloaded.is_completed("splitting"), Some(true));
        assert!(reloaded.all_completed());

        fs::remove_dir_all(&dir).ok();
    }
}
