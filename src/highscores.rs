//! Top-ten high scores, persisted one per line (XDG config or ~/.config/hexspin).

use crate::ports::HighScoreStore;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

const FILENAME: &str = "highscores";
pub const MAX_ENTRIES: usize = 10;

#[derive(Debug, Error)]
pub enum HighScoreError {
    #[error("high-score file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Returns the path to the high scores file (config dir / hexspin / highscores).
pub fn config_path() -> PathBuf {
    let home_config = || {
        std::env::var("HOME")
            .map(|h| PathBuf::from(h).join(".config"))
            .unwrap_or_else(|_| PathBuf::from("."))
    };
    let base = match std::env::var("XDG_CONFIG_HOME") {
        Ok(xdg) if !xdg.is_empty() => PathBuf::from(xdg),
        _ => home_config(),
    };
    base.join("hexspin").join(FILENAME)
}

/// Scores from file contents: one per line, unparsable lines skipped, best first.
fn parse(content: &str) -> Vec<u64> {
    let mut entries: Vec<u64> = content
        .lines()
        .filter_map(|l| l.trim().parse().ok())
        .collect();
    entries.sort_unstable_by(|a, b| b.cmp(a));
    entries.truncate(MAX_ENTRIES);
    entries
}

#[derive(Debug, Default)]
pub struct HighScores {
    entries: Vec<u64>,
    /// Backing file; `None` keeps the list in memory only.
    path: Option<PathBuf>,
}

impl HighScores {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load from `path`. A missing or unreadable file gives an empty list.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(content) => parse(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read high scores");
                Vec::new()
            }
        };
        Self {
            entries,
            path: Some(path),
        }
    }

    pub fn entries(&self) -> &[u64] {
        &self.entries
    }

    pub fn best(&self) -> Option<u64> {
        self.entries.first().copied()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Insert keeping the list sorted and at most ten long. Returns the 0-based rank,
    /// or `None` when the score did not make the list.
    pub fn insert(&mut self, score: u64) -> Option<usize> {
        let rank = self.entries.partition_point(|&e| e >= score);
        if rank >= MAX_ENTRIES {
            return None;
        }
        self.entries.insert(rank, score);
        self.entries.truncate(MAX_ENTRIES);
        Some(rank)
    }

    /// Write the list to disk. Creates config directory if needed.
    pub fn save(&self) -> Result<(), HighScoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let io = |source| HighScoreError::Io {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io)?;
        }
        let mut f = fs::File::create(path).map_err(io)?;
        for score in &self.entries {
            writeln!(f, "{score}").map_err(io)?;
        }
        Ok(())
    }

    /// Forget every entry, on disk too.
    pub fn clear(&mut self) -> Result<(), HighScoreError> {
        self.entries.clear();
        info!("high scores cleared");
        self.save()
    }
}

impl HighScoreStore for HighScores {
    fn game_started(&mut self) {
        info!(best = ?self.best(), "game started");
    }

    fn enter(&mut self, score: u64) {
        match self.insert(score) {
            Some(rank) => info!(score, rank = rank + 1, "new high score"),
            None => info!(score, "score did not make the list"),
        }
        if let Err(e) = self.save() {
            warn!(error = %e, "could not save high scores");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("hexspin-test-{}-{name}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir.join(FILENAME)
    }

    #[test]
    fn test_parse_sorts_and_skips_garbage() {
        assert_eq!(parse("5\nabc\n\n 12 \n7\n"), vec![12, 7, 5]);
    }

    #[test]
    fn test_insert_keeps_descending_top_ten() {
        let mut hs = HighScores::in_memory();
        for s in [30, 10, 50, 20, 40, 60, 5, 70, 80, 90, 100] {
            hs.insert(s);
        }
        assert_eq!(hs.entries().len(), MAX_ENTRIES);
        assert_eq!(hs.best(), Some(100));
        assert_eq!(hs.entries().last(), Some(&10));
        assert!(hs.entries().windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(hs.insert(1), None);
        assert_eq!(hs.insert(55), Some(5));
        assert_eq!(hs.entries().last(), Some(&20));
    }

    #[test]
    fn test_equal_score_ranks_after_existing() {
        let mut hs = HighScores::in_memory();
        hs.insert(10);
        assert_eq!(hs.insert(10), Some(1));
    }

    #[test]
    fn test_enter_saves_and_reloads() {
        let path = temp_file("reload");
        let mut hs = HighScores::open(&path);
        assert!(hs.entries().is_empty());
        hs.enter(28);
        hs.enter(2);
        let reloaded = HighScores::open(&path);
        assert_eq!(reloaded.entries(), &[28, 2]);
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_clear_empties_file() {
        let path = temp_file("clear");
        let mut hs = HighScores::open(&path);
        hs.enter(5);
        hs.clear().unwrap();
        assert!(hs.entries().is_empty());
        assert!(HighScores::open(&path).entries().is_empty());
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_in_memory_save_is_noop() {
        let mut hs = HighScores::in_memory();
        hs.enter(3);
        assert!(hs.path().is_none());
        assert_eq!(hs.entries(), &[3]);
    }
}
