//! Container abstraction.
//!
//! The engine does not do zip I/O; it reads and writes named parts through
//! this trait. Callers bridging to an actual archive implement it over their
//! zip library of choice; [`MemoryContainer`] serves tests and callers that
//! hold the parts in memory anyway.

use std::collections::HashMap;

/// A container of named document parts.
pub trait Container {
    /// Read a part's bytes, if present.
    fn get_file(&self, path: &str) -> Option<Vec<u8>>;

    /// Create or replace a part.
    fn set_file(&mut self, path: &str, data: Vec<u8>);

    /// All part names, sorted.
    fn file_names(&self) -> Vec<String>;
}

/// An in-memory container.
#[derive(Debug, Clone, Default)]
pub struct MemoryContainer {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryContainer {
    /// Create an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a part, builder style.
    pub fn with_file(mut self, path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.files.insert(path.into(), data.into());
        self
    }
}

impl Container for MemoryContainer {
    fn get_file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.get(path).cloned()
    }

    fn set_file(&mut self, path: &str, data: Vec<u8>) {
        self.files.insert(path.to_string(), data);
    }

    fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.files.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_container_roundtrip() {
        let mut container = MemoryContainer::new().with_file("a.xml", b"<a/>".to_vec());
        assert_eq!(container.get_file("a.xml"), Some(b"<a/>".to_vec()));
        assert_eq!(container.get_file("missing"), None);

        container.set_file("b.bin", vec![1, 2]);
        assert_eq!(container.file_names(), vec!["a.xml", "b.bin"]);

        container.set_file("a.xml", b"<b/>".to_vec());
        assert_eq!(container.get_file("a.xml"), Some(b"<b/>".to_vec()));
    }
}
