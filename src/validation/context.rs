//! The state that is shared by the validators of one run.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::issues::{IssueType, ValidationIssue, ValidationResult};
use super::options::ValidationOptions;
use crate::io::{join_uri, uri_directory, ResourceResolver};

/// Collects issues and gives access to resources and options.
///
/// A context is forked with [`derive_from_resource_resolver`] when
/// validation recurses into a document that lives in a different
/// directory, e.g. an external tileset. The issues of the derived
/// context are then usually attached as causes of one issue in the
/// parent context.
///
/// Every context knows the URI of the document it validates, relative to
/// the directory of the root resolver, and the tilesets that enclose it.
///
/// [`derive_from_resource_resolver`]: ValidationContext::derive_from_resource_resolver
pub struct ValidationContext {
    issues: Vec<ValidationIssue>,
    resolver: Arc<dyn ResourceResolver>,
    extensions_found: BTreeSet<String>,
    options: Arc<ValidationOptions>,
    document_uri: String,
    active_tilesets: Vec<String>,
}

impl ValidationContext {
    pub fn new(resolver: Arc<dyn ResourceResolver>, options: ValidationOptions) -> Self {
        Self {
            issues: Vec::new(),
            resolver,
            extensions_found: BTreeSet::new(),
            options: Arc::new(options),
            document_uri: String::new(),
            active_tilesets: Vec::new(),
        }
    }

    /// Set the URI of the validated document.
    pub fn with_document_uri(mut self, uri: impl Into<String>) -> Self {
        self.document_uri = uri.into();
        self
    }

    pub fn document_uri(&self) -> &str {
        &self.document_uri
    }

    pub fn add_issue(&mut self, issue: ValidationIssue) {
        tracing::trace!("{}", issue);
        self.issues.push(issue);
    }

    /// Shorthand for adding an issue with the default severity of its type.
    pub fn report(&mut self, issue_type: IssueType, path: impl Into<String>, message: impl Into<String>) {
        self.add_issue(ValidationIssue::new(issue_type, path, message));
    }

    pub fn resource_resolver(&self) -> &Arc<dyn ResourceResolver> {
        &self.resolver
    }

    /// A fresh context (no issues, no extensions) with the same options
    /// and the same enclosing tilesets.
    pub fn derive_from_resource_resolver(&self, resolver: Arc<dyn ResourceResolver>) -> Self {
        Self {
            issues: Vec::new(),
            resolver,
            extensions_found: BTreeSet::new(),
            options: Arc::clone(&self.options),
            document_uri: self.document_uri.clone(),
            active_tilesets: self.active_tilesets.clone(),
        }
    }

    /// A fresh context for the document at `uri`, which is relative to the
    /// current document. Resources are resolved relative to its directory.
    pub fn derive_for_document(&self, uri: &str) -> Self {
        let mut derived = self.derive_from_resource_resolver(self.resolver.derive(uri_directory(uri)));
        derived.document_uri = join_uri(uri_directory(&self.document_uri), uri);
        derived
    }

    /// Mark the current document as a tileset that is being validated.
    ///
    /// Returns `false` when an enclosing context already validates the
    /// same tileset.
    pub fn enter_tileset(&mut self) -> bool {
        if self.active_tilesets.contains(&self.document_uri) {
            return false;
        }
        self.active_tilesets.push(self.document_uri.clone());
        true
    }

    /// Undo the last [`enter_tileset`](Self::enter_tileset).
    pub fn leave_tileset(&mut self) {
        self.active_tilesets.pop();
    }

    pub fn options(&self) -> &ValidationOptions {
        &self.options
    }

    /// Names of the extensions that have been encountered so far.
    pub fn extensions_found(&self) -> &BTreeSet<String> {
        &self.extensions_found
    }

    pub fn add_extension_found(&mut self, name: &str) {
        if !self.extensions_found.contains(name) {
            self.extensions_found.insert(name.to_string());
        }
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    pub fn num_issues(&self) -> usize {
        self.issues.len()
    }

    /// Whether an issue with severity ERROR was added after the first
    /// `since` issues.
    pub fn has_errors_since(&self, since: usize) -> bool {
        self.issues[since.min(self.issues.len())..]
            .iter()
            .any(|i| i.severity == super::Severity::Error)
    }

    pub fn into_issues(self) -> Vec<ValidationIssue> {
        self.issues
    }

    pub fn into_result(self) -> ValidationResult {
        ValidationResult::from_issues(self.issues)
    }
}
