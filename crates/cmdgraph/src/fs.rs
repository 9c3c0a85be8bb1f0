//! File-system abstraction for validators.
//!
//! Path and file validation rules never touch the OS directly; they go
//! through [`FileSystem`] so tests can run against [`MockFileSystem`].

use std::collections::HashSet;
use std::path::Path;

/// File-system checks the built-in validation rules need.
pub trait FileSystem: Send + Sync {
    /// Check whether a regular file exists at `path`.
    fn file_exists(&self, path: &str) -> bool;

    /// Check whether a directory exists at `path`.
    fn directory_exists(&self, path: &str) -> bool;

    /// Characters that may not appear anywhere in a path.
    fn invalid_path_chars(&self) -> &[char];

    /// Characters that may not appear in a single file name.
    fn invalid_file_name_chars(&self) -> &[char];
}

// === Real implementation ===

#[cfg(windows)]
const INVALID_PATH_CHARS: &[char] = &['\0', '"', '<', '>', '|'];
#[cfg(windows)]
const INVALID_FILE_NAME_CHARS: &[char] = &['\0', '"', '<', '>', '|', ':', '*', '?', '\\', '/'];

#[cfg(not(windows))]
const INVALID_PATH_CHARS: &[char] = &['\0'];
#[cfg(not(windows))]
const INVALID_FILE_NAME_CHARS: &[char] = &['\0', '/'];

/// File system backed by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn file_exists(&self, path: &str) -> bool {
        Path::new(path).is_file()
    }

    fn directory_exists(&self, path: &str) -> bool {
        Path::new(path).is_dir()
    }

    fn invalid_path_chars(&self) -> &[char] {
        INVALID_PATH_CHARS
    }

    fn invalid_file_name_chars(&self) -> &[char] {
        INVALID_FILE_NAME_CHARS
    }
}

// === Mock implementation for testing ===

/// In-memory file system for tests.
#[derive(Debug, Clone)]
pub struct MockFileSystem {
    files: HashSet<String>,
    directories: HashSet<String>,
    invalid_path_chars: Vec<char>,
    invalid_file_name_chars: Vec<char>,
}

impl Default for MockFileSystem {
    fn default() -> Self {
        Self {
            files: HashSet::new(),
            directories: HashSet::new(),
            invalid_path_chars: vec!['\0', '|'],
            invalid_file_name_chars: vec!['\0', '|', '/', '*', '?'],
        }
    }
}

impl MockFileSystem {
    /// Create an empty mock file system.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file.
    pub fn with_file(mut self, path: impl Into<String>) -> Self {
        self.files.insert(path.into());
        self
    }

    /// Add a directory.
    pub fn with_directory(mut self, path: impl Into<String>) -> Self {
        self.directories.insert(path.into());
        self
    }

    pub fn with_invalid_path_chars(mut self, chars: impl IntoIterator<Item = char>) -> Self {
        self.invalid_path_chars = chars.into_iter().collect();
        self
    }

    pub fn with_invalid_file_name_chars(mut self, chars: impl IntoIterator<Item = char>) -> Self {
        self.invalid_file_name_chars = chars.into_iter().collect();
        self
    }
}

impl FileSystem for MockFileSystem {
    fn file_exists(&self, path: &str) -> bool {
        self.files.contains(path)
    }

    fn directory_exists(&self, path: &str) -> bool {
        self.directories.contains(path)
    }

    fn invalid_path_chars(&self) -> &[char] {
        &self.invalid_path_chars
    }

    fn invalid_file_name_chars(&self) -> &[char] {
        &self.invalid_file_name_chars
    }
}
