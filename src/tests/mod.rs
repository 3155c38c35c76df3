// Tests module
// Mock chain: in-memory ChainQuery with carry-forward state per height
// Reconciliation: per-height audits, discrepancies, retries and atomic commits
// Term settlement: boundaries, penalties, redistribution and deposit refunds
// Runner: range audits, notifiers and checkpoint resume

pub mod mock;
pub mod term_settlement;
