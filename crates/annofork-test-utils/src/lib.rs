//! Testing utilities for annofork
//!
//! Builds throwaway dataset trees on disk:
//!
//! ```text
//! <tmp>/Data/users.csv
//! <tmp>/Data/TrajectoriesToAnalyse/<author>.csv
//! ```

#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const USERS_CSV: &str = "Data/users.csv";

/// Path of an author's shared trajectory file
pub fn trajectory(author: &str) -> String {
    format!("Data/TrajectoriesToAnalyse/{author}.csv")
}

/// Path of a reviewer's copy of a shared file
pub fn in_workspace(reviewer: &str, shared: &str) -> String {
    format!("Users/{reviewer}/{shared}")
}

/// A dataset tree that is deleted on drop
#[derive(Debug)]
pub struct Dataset {
    dir: TempDir,
}

impl Dataset {
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.path(relative))
            .unwrap_or_else(|e| panic!("reading {relative}: {e}"))
    }

    pub fn write(&self, relative: &str, contents: &str) {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.path(relative).exists()
    }
}

/// Builder for [`Dataset`]
#[derive(Debug, Default)]
pub struct DatasetBuilder {
    files: Vec<(String, String)>,
}

impl DatasetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn users(self, csv: &str) -> Self {
        self.file(USERS_CSV, csv)
    }

    pub fn trajectory(self, author: &str, csv: &str) -> Self {
        self.file(&trajectory(author), csv)
    }

    pub fn file(mut self, relative: &str, contents: &str) -> Self {
        self.files.push((relative.to_string(), contents.to_string()));
        self
    }

    pub fn build(self) -> Dataset {
        let dataset = Dataset {
            dir: tempfile::tempdir().unwrap(),
        };
        fs::create_dir_all(dataset.path("Data")).unwrap();
        for (relative, contents) in &self.files {
            dataset.write(relative, contents);
        }
        dataset
    }
}

/// One author with ten posts in total and a two-post trajectory
pub fn alice_dataset() -> Dataset {
    DatasetBuilder::new()
        .users("Author,TotalPosts\nalice,10")
        .trajectory(
            "alice",
            "year,day_month,title,score,permalink,selftext\n\
             2020,03-Jan,First post,12,/r/x/1,\"hello, world\"\n\
             2021,15-Feb,Second post,4,/r/x/2,\"multi\nline\"",
        )
        .build()
}
