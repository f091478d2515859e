//! Generated artifact models
//!
//! The generator hands us finished documents and requirement analyses; the
//! cache never inspects their content beyond serializing it for encryption.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of generated acquisition document. Closed set: the cache never
/// stores open-ended payload kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    StatementOfWork,
    PerformanceWorkStatement,
    RequestForQuote,
    RequestForProposal,
    MarketResearch,
    CostEstimate,
    AcquisitionPlan,
    Contract,
}

impl DocumentKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::StatementOfWork => "Statement of Work",
            Self::PerformanceWorkStatement => "Performance Work Statement",
            Self::RequestForQuote => "Request for Quote",
            Self::RequestForProposal => "Request for Proposal",
            Self::MarketResearch => "Market Research Report",
            Self::CostEstimate => "Cost Estimate",
            Self::AcquisitionPlan => "Acquisition Plan",
            Self::Contract => "Contract",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A finished document as produced by the generator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedDocument {
    pub kind: DocumentKind,
    /// The requirement text the document was generated from
    pub request_text: String,
    pub content: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

impl GeneratedDocument {
    pub fn new(kind: DocumentKind, request_text: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            kind,
            request_text: request_text.into(),
            content,
            created_at: Utc::now(),
        }
    }
}

/// A requirement-analysis result: the model's response plus the document
/// kinds it recommends generating
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub response: String,
    pub recommended_kinds: Vec<DocumentKind>,
}
