// src/versioning/chain.rs
//! A document's history as an append-only log plus a "current" pointer
//!
//! The chain is rebuilt from the repository for every operation and is the
//! single place where the version invariants are decided.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::Utc;

use super::model::{Document, DocumentVersion};
use crate::consts::{INITIAL_VERSION_NOTE, SYSTEM_ACTOR};
use crate::error::{CoreError, Result};
use crate::util::new_record_id;

#[derive(Debug, Clone)]
pub struct VersionChain {
    document_id: String,
    entries: BTreeMap<u32, DocumentVersion>,
    current: u32,
}

impl VersionChain {
    pub fn new(document: &Document, versions: impl IntoIterator<Item = DocumentVersion>) -> Self {
        let entries = versions
            .into_iter()
            .filter(|v| v.document_id == document.id)
            .map(|v| (v.version_number, v))
            .collect();
        Self {
            document_id: document.id.clone(),
            entries,
            current: document.current_version_number,
        }
    }

    /// Version 1 synthesised from a document that predates versioning
    pub fn initial_version(document: &Document) -> DocumentVersion {
        DocumentVersion {
            id: new_record_id(),
            document_id: document.id.clone(),
            version_number: 1,
            created_at: document.created_at,
            created_by: SYSTEM_ACTOR.to_string(),
            changes: Some(INITIAL_VERSION_NOTE.to_string()),
            file_size: document.size,
            path: document.path.clone(),
        }
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn current_number(&self) -> u32 {
        self.current
    }

    /// Highest stored version number, 0 for an empty chain
    pub fn latest_number(&self) -> u32 {
        self.entries.keys().next_back().copied().unwrap_or(0)
    }

    /// Never reuses a number: the current pointer counts even if its row is gone
    pub fn next_number(&self) -> u32 {
        self.latest_number().max(self.current) + 1
    }

    pub fn current(&self) -> Option<&DocumentVersion> {
        self.entries.get(&self.current)
    }

    pub fn get(&self, version_number: u32) -> Option<&DocumentVersion> {
        self.entries.get(&version_number)
    }

    pub fn find(&self, version_id: &str) -> Option<&DocumentVersion> {
        self.entries.values().find(|v| v.id == version_id)
    }

    /// Ascending by version number
    pub fn versions(&self) -> impl Iterator<Item = &DocumentVersion> {
        self.entries.values()
    }

    pub fn into_versions(self) -> Vec<DocumentVersion> {
        self.entries.into_values().collect()
    }

    /// Build the next version of this chain (not yet appended)
    pub fn next_version(
        &self,
        path: PathBuf,
        file_size: u64,
        created_by: &str,
        changes: Option<String>,
    ) -> DocumentVersion {
        DocumentVersion {
            id: new_record_id(),
            document_id: self.document_id.clone(),
            version_number: self.next_number(),
            created_at: Utc::now(),
            created_by: created_by.to_string(),
            changes,
            file_size,
            path,
        }
    }

    /// Append and move the current pointer to the new entry
    pub fn append(&mut self, version: DocumentVersion) -> Result<()> {
        if version.document_id != self.document_id {
            return Err(CoreError::VersionInvariant(format!(
                "version {} belongs to document {}, not {}",
                version.id, version.document_id, self.document_id
            )));
        }
        if version.version_number <= self.latest_number() {
            return Err(CoreError::VersionInvariant(format!(
                "version number {} is not above {}",
                version.version_number,
                self.latest_number()
            )));
        }
        self.current = version.version_number;
        self.entries.insert(version.version_number, version);
        Ok(())
    }

    /// Resolve a version id of this document, rejecting foreign ids
    pub fn require(&self, version_id: &str) -> Result<&DocumentVersion> {
        self.find(version_id).ok_or_else(|| {
            CoreError::VersionInvariant(format!(
                "version {version_id} does not belong to document {}",
                self.document_id
            ))
        })
    }

    /// Check the delete invariants: never the only version, never the current one
    pub fn check_deletable(&self, version_id: &str) -> Result<&DocumentVersion> {
        let version = self.require(version_id)?;
        if self.entries.len() <= 1 {
            return Err(CoreError::VersionInvariant(format!(
                "cannot delete the only version of document {}",
                self.document_id
            )));
        }
        if version.version_number == self.current {
            return Err(CoreError::VersionInvariant(format!(
                "cannot delete current version {} of document {}",
                version.version_number, self.document_id
            )));
        }
        Ok(version)
    }

    pub fn remove(&mut self, version_number: u32) -> Option<DocumentVersion> {
        self.entries.remove(&version_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(current: u32) -> Document {
        Document {
            id: "doc-1".into(),
            name: "report.pdf".into(),
            size: 42,
            path: PathBuf::from("/vault/doc-1/a.enc"),
            current_version_number: current,
            is_encrypted: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn chain_with(numbers: &[u32], current: u32) -> VersionChain {
        let doc = document(current);
        let base = VersionChain::new(&doc, Vec::new());
        let versions = numbers
            .iter()
            .map(|&n| {
                let mut v = base.next_version(PathBuf::from(format!("/v{n}")), 1, "tester", None);
                v.version_number = n;
                v
            })
            .collect::<Vec<_>>();
        VersionChain::new(&doc, versions)
    }

    #[test]
    fn test_empty_chain_reports_zero_latest() {
        let chain = VersionChain::new(&document(1), Vec::new());
        assert!(chain.is_empty());
        assert_eq!(chain.latest_number(), 0);
    }

    #[test]
    fn test_initial_version_mirrors_document() {
        let doc = document(1);
        let v1 = VersionChain::initial_version(&doc);
        assert_eq!(v1.version_number, 1);
        assert_eq!(v1.path, doc.path);
        assert_eq!(v1.file_size, doc.size);
        assert_eq!(v1.created_at, doc.created_at);
        assert_eq!(v1.changes.as_deref(), Some(INITIAL_VERSION_NOTE));
    }

    #[test]
    fn test_next_number_skips_deleted_numbers() {
        let chain = chain_with(&[1, 3], 3);
        assert_eq!(chain.next_number(), 4);
    }

    #[test]
    fn test_only_and_current_versions_are_not_deletable() {
        let single = chain_with(&[1], 1);
        let v1 = single.get(1).unwrap().id.clone();
        assert!(matches!(
            single.check_deletable(&v1),
            Err(CoreError::VersionInvariant(_))
        ));

        let chain = chain_with(&[1, 2, 3], 3);
        let v3 = chain.get(3).unwrap().id.clone();
        let v2 = chain.get(2).unwrap().id.clone();
        assert!(chain.check_deletable(&v3).is_err());
        assert_eq!(chain.check_deletable(&v2).unwrap().version_number, 2);
    }

    #[test]
    fn test_append_moves_current_pointer() {
        let mut chain = chain_with(&[1], 1);
        let next = chain.next_version(PathBuf::from("/v2"), 7, "tester", None);
        chain.append(next).unwrap();
        assert_eq!(chain.current_number(), 2);
        assert_eq!(chain.current().unwrap().file_size, 7);
    }

    #[test]
    fn test_append_rejects_stale_number() {
        let mut chain = chain_with(&[1, 2], 2);
        let mut stale = chain.next_version(PathBuf::from("/x"), 1, "tester", None);
        stale.version_number = 2;
        assert!(chain.append(stale).is_err());
    }
}
