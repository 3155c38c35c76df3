// Report - Outcome of auditing one height
use super::settlement::SettlementOutcome;
use crate::types::{AccountId, Balance, BlockNumber, TermId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role under which an account was audited
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    Author,
    Validator,
    Stakeholder,
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SubjectKind::Author => f.write_str("author"),
            SubjectKind::Validator => f.write_str("validator"),
            SubjectKind::Stakeholder => f.write_str("stakeholder"),
        }
    }
}

/// Expected and reported balance disagree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub subject: SubjectKind,
    pub account: AccountId,
    pub expected: Balance,
    pub actual: Balance,
    pub height: BlockNumber,
    pub term: TermId,
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} at #{} (term {}): expected {}, chain reports {}",
            self.subject, self.account, self.height, self.term, self.expected, self.actual
        )
    }
}

/// Summary of one audited height
#[derive(Debug, Clone, Default)]
pub struct AuditReport {
    pub height: BlockNumber,
    pub term: TermId,

    /// Number of accounts whose balance was compared
    pub audited: usize,

    pub discrepancies: Vec<Discrepancy>,

    /// Present when the block closed a term
    pub settlement: Option<SettlementOutcome>,

    /// True for the cold-start block and for boundaries settling a partial term
    pub skipped: bool,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.discrepancies.is_empty()
    }

    pub fn is_term_boundary(&self) -> bool {
        self.settlement.is_some()
    }
}
