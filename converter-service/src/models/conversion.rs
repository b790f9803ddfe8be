use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use utoipa::ToSchema;

/// Legacy binary Office formats the service upgrades to their OOXML successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum ConversionKind {
    #[serde(rename = "doc-to-docx")]
    DocToDocx,
    #[serde(rename = "xls-to-xlsx")]
    XlsToXlsx,
    #[serde(rename = "ppt-to-pptx")]
    PptToPptx,
}

impl ConversionKind {
    pub const ALL: [ConversionKind; 3] = [
        ConversionKind::DocToDocx,
        ConversionKind::XlsToXlsx,
        ConversionKind::PptToPptx,
    ];

    /// Picks the conversion from the uploaded file's extension, ignoring case.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let extension = Path::new(filename).extension()?.to_str()?.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.source_extension() == extension)
    }

    pub fn source_extension(self) -> &'static str {
        match self {
            ConversionKind::DocToDocx => "doc",
            ConversionKind::XlsToXlsx => "xls",
            ConversionKind::PptToPptx => "ppt",
        }
    }

    /// Value passed to `--convert-to`; also the extension of the result.
    pub fn target_format(self) -> &'static str {
        match self {
            ConversionKind::DocToDocx => "docx",
            ConversionKind::XlsToXlsx => "xlsx",
            ConversionKind::PptToPptx => "pptx",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConversionKind::DocToDocx => "doc-to-docx",
            ConversionKind::XlsToXlsx => "xls-to-xlsx",
            ConversionKind::PptToPptx => "ppt-to-pptx",
        }
    }

    pub fn supported_extensions() -> String {
        Self::ALL
            .iter()
            .map(|kind| format!(".{}", kind.source_extension()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for ConversionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_kind_from_extension() {
        assert_eq!(
            ConversionKind::from_filename("report.doc"),
            Some(ConversionKind::DocToDocx)
        );
        assert_eq!(
            ConversionKind::from_filename("budget.xls"),
            Some(ConversionKind::XlsToXlsx)
        );
        assert_eq!(
            ConversionKind::from_filename("deck.ppt"),
            Some(ConversionKind::PptToPptx)
        );
    }

    #[test]
    fn extension_match_ignores_case() {
        assert_eq!(
            ConversionKind::from_filename("LEGACY.DOC"),
            Some(ConversionKind::DocToDocx)
        );
        assert_eq!(
            ConversionKind::from_filename("Q3.Xls"),
            Some(ConversionKind::XlsToXlsx)
        );
    }

    #[test]
    fn only_last_extension_counts() {
        assert_eq!(
            ConversionKind::from_filename("archive.tar.ppt"),
            Some(ConversionKind::PptToPptx)
        );
        assert_eq!(ConversionKind::from_filename("report.doc.pdf"), None);
    }

    #[test]
    fn rejects_unsupported_or_missing_extensions() {
        assert_eq!(ConversionKind::from_filename("report.docx"), None);
        assert_eq!(ConversionKind::from_filename("notes.txt"), None);
        assert_eq!(ConversionKind::from_filename("README"), None);
        assert_eq!(ConversionKind::from_filename(".doc"), None);
    }

    #[test]
    fn serializes_with_kebab_case_ids() {
        let json = serde_json::to_string(&ConversionKind::XlsToXlsx).unwrap();
        assert_eq!(json, "\"xls-to-xlsx\"");
        assert_eq!(ConversionKind::PptToPptx.to_string(), "ppt-to-pptx");
    }

    #[test]
    fn lists_supported_extensions() {
        assert_eq!(ConversionKind::supported_extensions(), ".doc, .xls, .ppt");
    }
}
