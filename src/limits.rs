//! Limits and constraints for schema loading
//!
//! This module defines limits that keep a load bounded when it is fed
//! hostile or runaway input (huge documents, unbounded directive chains).

use crate::error::{Error, ErrorKind, Result};

/// Global limits configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum schema document size in bytes
    pub max_document_size: usize,

    /// Maximum number of documents a single loader may hold
    pub max_documents: usize,

    /// Maximum include/import nesting depth
    pub max_directive_depth: usize,

    /// Maximum number of top-level components in one assembled schema
    pub max_schema_components: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_document_size: 100 * 1024 * 1024, // 100 MB
            max_documents: 10000,
            max_directive_depth: 100,
            max_schema_components: 100000,
        }
    }
}

impl Limits {
    /// Create a new Limits with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create strict limits (more restrictive)
    pub fn strict() -> Self {
        Self {
            max_document_size: 10 * 1024 * 1024, // 10 MB
            max_documents: 500,
            max_directive_depth: 20,
            max_schema_components: 10000,
        }
    }

    /// Create permissive limits (less restrictive, use with caution)
    pub fn permissive() -> Self {
        Self {
            max_document_size: 1024 * 1024 * 1024, // 1 GB
            max_documents: 1000000,
            max_directive_depth: 1000,
            max_schema_components: 10000000,
        }
    }

    /// Check if a document size is within limits
    pub fn check_document_size(&self, size: usize) -> Result<()> {
        if size > self.max_document_size {
            Err(exceeded(format!(
                "document size {} bytes exceeds maximum {} bytes",
                size, self.max_document_size
            )))
        } else {
            Ok(())
        }
    }

    /// Check if the number of loaded documents is within limits
    pub fn check_document_count(&self, count: usize) -> Result<()> {
        if count > self.max_documents {
            Err(exceeded(format!(
                "document count {} exceeds maximum {}",
                count, self.max_documents
            )))
        } else {
            Ok(())
        }
    }

    /// Check if a directive nesting depth is within limits
    pub fn check_directive_depth(&self, depth: usize) -> Result<()> {
        if depth > self.max_directive_depth {
            Err(exceeded(format!(
                "directive depth {} exceeds maximum {}",
                depth, self.max_directive_depth
            )))
        } else {
            Ok(())
        }
    }

    /// Check if the number of schema components is within limits
    pub fn check_component_count(&self, count: usize) -> Result<()> {
        if count > self.max_schema_components {
            Err(exceeded(format!(
                "schema component count {} exceeds maximum {}",
                count, self.max_schema_components
            )))
        } else {
            Ok(())
        }
    }
}

fn exceeded(message: String) -> Error {
    Error::schema(ErrorKind::LimitExceeded, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = Limits::default();
        assert_eq!(limits.max_directive_depth, 100);
        assert_eq!(limits.max_document_size, 100 * 1024 * 1024);
    }

    #[test]
    fn test_strict_limits() {
        let limits = Limits::strict();
        assert!(limits.max_directive_depth < Limits::default().max_directive_depth);
        assert!(limits.max_document_size < Limits::default().max_document_size);
    }

    #[test]
    fn test_check_document_size() {
        let limits = Limits::strict();
        assert!(limits.check_document_size(1024).is_ok());

        let err = limits.check_document_size(11 * 1024 * 1024).unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::LimitExceeded));
    }

    #[test]
    fn test_check_directive_depth() {
        let limits = Limits::default();
        assert!(limits.check_directive_depth(100).is_ok());
        assert!(limits.check_directive_depth(101).is_err());
    }

    #[test]
    fn test_check_component_count() {
        let limits = Limits::strict();
        assert!(limits.check_component_count(10).is_ok());
        assert!(limits.check_component_count(10001).is_err());
    }
}
