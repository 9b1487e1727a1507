//! Daily attendance ledger and the one-shot marking rule.

use chrono::Local;
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const HEADER: &str = "Name,Time";

/// Append-only CSV ledger, one file per calendar day.
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    /// Open today's ledger in `dir`, creating the file with its header row
    /// when absent. Existing rows are left untouched; marks append after
    /// them. The date is resolved once — a run that crosses midnight keeps
    /// writing to the day it started on.
    pub fn open(dir: &Path) -> io::Result<Self> {
        Self::open_dated(dir, &Local::now().format("%Y-%m-%d").to_string())
    }

    fn open_dated(dir: &Path, date: &str) -> io::Result<Self> {
        let path = dir.join(format!("{date}.csv"));
        if !path.exists() {
            let mut file = std::fs::File::create(&path)?;
            writeln!(file, "{HEADER}")?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one attendance row; the file is opened and closed per write.
    fn append(&self, name: &str, time: &str) -> io::Result<()> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        writeln!(file, "{name},{time}")?;
        Ok(())
    }
}

/// One run's marking state: who is enrolled, who is still unmarked.
pub struct Session {
    pending: HashSet<String>,
    enrolled: usize,
    ledger: Ledger,
}

impl Session {
    pub fn new(names: Vec<String>, ledger: Ledger) -> Self {
        let pending: HashSet<String> = names.into_iter().collect();
        let enrolled = pending.len();
        Self { pending, enrolled, ledger }
    }

    /// Mark `name` present if it is enrolled and not yet marked.
    ///
    /// The first sighting appends a `name,HH:MM:SS` row and returns true;
    /// re-sightings and unfamiliar names are silent no-ops.
    pub fn mark(&mut self, name: &str) -> io::Result<bool> {
        if !self.pending.remove(name) {
            return Ok(false);
        }

        let time = Local::now().format("%H:%M:%S").to_string();
        if let Err(error) = self.ledger.append(name, &time) {
            // Put the name back so a failed write is not a lost record.
            self.pending.insert(name.to_owned());
            return Err(error);
        }

        tracing::info!(name, %time, "marked present");
        Ok(true)
    }

    pub fn is_pending(&self, name: &str) -> bool {
        self.pending.contains(name)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn marked_count(&self) -> usize {
        self.enrolled - self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Unique per-test directory, removed on drop.
    struct TempDir {
        path: PathBuf,
    }

    impl TempDir {
        fn new(tag: &str) -> Self {
            let path = std::env::temp_dir()
                .join(format!("rollcall_ledger_{tag}_{}", std::process::id()));
            let _ = std::fs::remove_dir_all(&path);
            std::fs::create_dir_all(&path).unwrap();
            Self { path }
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.path);
        }
    }

    const DATE: &str = "2026-08-04";

    fn read(ledger: &Ledger) -> String {
        std::fs::read_to_string(ledger.path()).unwrap()
    }

    #[test]
    fn creates_the_header_exactly_once() {
        let tmp = TempDir::new("header");
        let ledger = Ledger::open_dated(&tmp.path, DATE).unwrap();
        assert_eq!(read(&ledger), "Name,Time\n");

        // Reopening must neither truncate nor duplicate the header.
        let ledger = Ledger::open_dated(&tmp.path, DATE).unwrap();
        assert_eq!(read(&ledger), "Name,Time\n");
    }

    #[test]
    fn first_sighting_writes_one_row() {
        let tmp = TempDir::new("first");
        let ledger = Ledger::open_dated(&tmp.path, DATE).unwrap();
        let mut session = Session::new(vec!["alice".into()], ledger);

        assert!(session.mark("alice").unwrap());

        let content = read(&session.ledger);
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "Name,Time");
        assert!(lines[1].starts_with("alice,"));
    }

    #[test]
    fn remarking_is_a_silent_no_op() {
        let tmp = TempDir::new("remark");
        let ledger = Ledger::open_dated(&tmp.path, DATE).unwrap();
        let mut session = Session::new(vec!["alice".into()], ledger);

        assert!(session.mark("alice").unwrap());
        assert!(!session.mark("alice").unwrap());

        assert_eq!(read(&session.ledger).lines().count(), 2);
    }

    #[test]
    fn unfamiliar_names_are_ignored() {
        let tmp = TempDir::new("stranger");
        let ledger = Ledger::open_dated(&tmp.path, DATE).unwrap();
        let mut session = Session::new(vec!["alice".into()], ledger);

        assert!(!session.mark("mallory").unwrap());
        assert_eq!(read(&session.ledger), "Name,Time\n");
    }

    #[test]
    fn a_run_with_no_marks_leaves_header_only() {
        // The end state of a run whose camera fails on the first frame.
        let tmp = TempDir::new("nomarks");
        let ledger = Ledger::open_dated(&tmp.path, DATE).unwrap();
        let session = Session::new(vec!["alice".into(), "bob".into()], ledger);

        assert_eq!(read(&session.ledger), "Name,Time\n");
        assert_eq!(session.pending_count(), 2);
    }

    #[test]
    fn marking_shrinks_the_pending_set() {
        let tmp = TempDir::new("pending");
        let ledger = Ledger::open_dated(&tmp.path, DATE).unwrap();
        let mut session = Session::new(vec!["alice".into(), "bob".into()], ledger);

        assert!(session.mark("alice").unwrap());

        assert!(!session.is_pending("alice"));
        assert!(session.is_pending("bob"));
        assert_eq!(session.marked_count(), 1);
        assert_eq!(session.pending_count(), 1);
    }

    #[test]
    fn existing_rows_survive_and_new_rows_append() {
        let tmp = TempDir::new("existing");
        let path = tmp.path.join(format!("{DATE}.csv"));
        std::fs::write(&path, "Name,Time\ncarol,08:55:00\n").unwrap();

        let ledger = Ledger::open_dated(&tmp.path, DATE).unwrap();
        let mut session = Session::new(vec!["alice".into()], ledger);
        assert!(session.mark("alice").unwrap());

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Name,Time");
        assert_eq!(lines[1], "carol,08:55:00");
        assert!(lines[2].starts_with("alice,"));
    }
}
