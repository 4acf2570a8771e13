//! Validation issues and the aggregated validation result.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a validation issue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warning => "WARNING",
            Self::Info => "INFO",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The type of a validation issue.
///
/// Each type has a stable upper-snake-case name and a default severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IssueType {
    // IO and parsing
    IoError,
    JsonParseError,
    InternalError,
    // Structure
    PropertyMissing,
    TypeMismatch,
    ValueNotInRange,
    ValueNotInList,
    ArrayLengthMismatch,
    OneOfError,
    IdentifierNotFound,
    BoundingVolumeInvalid,
    BinaryInvalid,
    // Semantics
    TileGeometricErrorInconsistent,
    ImplicitTilingError,
    AssetVersionUnknown,
    ExtensionRequiredButNotUsed,
    ExtensionFoundButNotUsed,
    ExtensionUsedButNotFound,
    ExtensionNotSupported,
    TraversalLimitReached,
    ExternalTilesetCycle,
    // Metadata
    MetadataValueNotInRange,
    MetadataValueMismatch,
    MetadataValueRequiredButMissing,
    MetadataSemanticInvalid,
    // Content
    ContentValidationError,
    ContentValidationWarning,
    ContentValidationSkipped,
}

impl IssueType {
    /// Returns the stable name of this type, as used in reports.
    pub const fn name(self) -> &'static str {
        match self {
            Self::IoError => "IO_ERROR",
            Self::JsonParseError => "JSON_PARSE_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
            Self::PropertyMissing => "PROPERTY_MISSING",
            Self::TypeMismatch => "TYPE_MISMATCH",
            Self::ValueNotInRange => "VALUE_NOT_IN_RANGE",
            Self::ValueNotInList => "VALUE_NOT_IN_LIST",
            Self::ArrayLengthMismatch => "ARRAY_LENGTH_MISMATCH",
            Self::OneOfError => "ONE_OF_ERROR",
            Self::IdentifierNotFound => "IDENTIFIER_NOT_FOUND",
            Self::BoundingVolumeInvalid => "BOUNDING_VOLUME_INVALID",
            Self::BinaryInvalid => "BINARY_INVALID",
            Self::TileGeometricErrorInconsistent => "TILE_GEOMETRIC_ERROR_INCONSISTENT",
            Self::ImplicitTilingError => "IMPLICIT_TILING_ERROR",
            Self::AssetVersionUnknown => "ASSET_VERSION_UNKNOWN",
            Self::ExtensionRequiredButNotUsed => "EXTENSION_REQUIRED_BUT_NOT_USED",
            Self::ExtensionFoundButNotUsed => "EXTENSION_FOUND_BUT_NOT_USED",
            Self::ExtensionUsedButNotFound => "EXTENSION_USED_BUT_NOT_FOUND",
            Self::ExtensionNotSupported => "EXTENSION_NOT_SUPPORTED",
            Self::TraversalLimitReached => "TRAVERSAL_LIMIT_REACHED",
            Self::ExternalTilesetCycle => "EXTERNAL_TILESET_CYCLE",
            Self::MetadataValueNotInRange => "METADATA_VALUE_NOT_IN_RANGE",
            Self::MetadataValueMismatch => "METADATA_VALUE_MISMATCH",
            Self::MetadataValueRequiredButMissing => "METADATA_VALUE_REQUIRED_BUT_MISSING",
            Self::MetadataSemanticInvalid => "METADATA_SEMANTIC_INVALID",
            Self::ContentValidationError => "CONTENT_VALIDATION_ERROR",
            Self::ContentValidationWarning => "CONTENT_VALIDATION_WARNING",
            Self::ContentValidationSkipped => "CONTENT_VALIDATION_SKIPPED",
        }
    }

    /// Returns the severity that issues of this type have by default.
    pub const fn severity(self) -> Severity {
        match self {
            Self::TileGeometricErrorInconsistent
            | Self::AssetVersionUnknown
            | Self::ExtensionUsedButNotFound
            | Self::ExtensionNotSupported
            | Self::TraversalLimitReached
            | Self::ContentValidationWarning => Severity::Warning,
            Self::ContentValidationSkipped => Severity::Info,
            _ => Severity::Error,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.name() == name)
    }

    pub const ALL: [IssueType; 28] = [
        Self::IoError,
        Self::JsonParseError,
        Self::InternalError,
        Self::PropertyMissing,
        Self::TypeMismatch,
        Self::ValueNotInRange,
        Self::ValueNotInList,
        Self::ArrayLengthMismatch,
        Self::OneOfError,
        Self::IdentifierNotFound,
        Self::BoundingVolumeInvalid,
        Self::BinaryInvalid,
        Self::TileGeometricErrorInconsistent,
        Self::ImplicitTilingError,
        Self::AssetVersionUnknown,
        Self::ExtensionRequiredButNotUsed,
        Self::ExtensionFoundButNotUsed,
        Self::ExtensionUsedButNotFound,
        Self::ExtensionNotSupported,
        Self::TraversalLimitReached,
        Self::ExternalTilesetCycle,
        Self::MetadataValueNotInRange,
        Self::MetadataValueMismatch,
        Self::MetadataValueRequiredButMissing,
        Self::MetadataSemanticInvalid,
        Self::ContentValidationError,
        Self::ContentValidationWarning,
        Self::ContentValidationSkipped,
    ];
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Serialize for IssueType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for IssueType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Self::from_name(&name)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown issue type '{}'", name)))
    }
}

/// One problem found during validation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    /// Locator of the offending element, e.g. `/root/children/0/content`
    pub path: String,
    pub message: String,
    pub severity: Severity,
    /// Issues of a nested document (external tileset, tile content)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<ValidationIssue>,
}

impl ValidationIssue {
    pub fn new(issue_type: IssueType, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            issue_type,
            path: path.into(),
            message: message.into(),
            severity: issue_type.severity(),
            causes: Vec::new(),
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_causes(mut self, causes: Vec<ValidationIssue>) -> Self {
        self.causes = causes;
        self
    }

    pub fn internal_error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(IssueType::InternalError, path, message)
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}: {}", self.severity, self.issue_type, self.path, self.message)
    }
}

/// The issues of one validation run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub num_errors: usize,
    pub num_warnings: usize,
    pub num_infos: usize,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn from_issues(issues: Vec<ValidationIssue>) -> Self {
        let count = |s: Severity| issues.iter().filter(|i| i.severity == s).count();
        Self {
            num_errors: count(Severity::Error),
            num_warnings: count(Severity::Warning),
            num_infos: count(Severity::Info),
            issues,
        }
    }

    /// Whether no issue has severity ERROR.
    pub fn is_valid(&self) -> bool {
        self.num_errors == 0
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn issues_of_type(&self, issue_type: IssueType) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |i| i.issue_type == issue_type)
    }

    pub fn to_json_string(&self) -> crate::util::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
