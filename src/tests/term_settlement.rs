// Term Settlement Tests - Boundaries over an in-memory chain
//
// Timeline (term length 100s, roster [A, B], no stakeholders):
//   #1  ts  50  cold start
//   #2  ts 100  boundary, settles the cold generation (skipped)
//   #3-#4       P pays fees of 1000 each, authors A then B
//   #5  ts 200  boundary, settles the #2 generation (skipped); A authors with fee 1000
//               and seals it without B's precommit
//   #6          B signs nothing from here on
//   #7  ts 300  boundary, settles #3..#5: A 2000, B 1000 accrued

use super::mock::{account, block, pay, settings, MockChain, StateTable};
use crate::audit::{
    AuditError, Auditor, AuditorState, NominationDeposits, SubjectKind, TermData, TermRing, VoteTally,
};
use crate::types::{AccountId, Weight};

fn a() -> AccountId {
    account(1)
}
fn b() -> AccountId {
    account(2)
}
fn c() -> AccountId {
    account(3)
}
fn d() -> AccountId {
    account(4)
}
fn p() -> AccountId {
    account(20)
}
fn q() -> AccountId {
    account(21)
}

fn three_terms() -> MockChain {
    let mut chain = MockChain::new();
    chain.set_states(
        0,
        StateTable {
            candidates: vec![c()],
            validators: vec![a(), b()],
            jailed: vec![d()],
            ..StateTable::default()
        },
    );
    // C withdraws its candidacy, D is caught double voting
    chain.set_states(
        7,
        StateTable {
            validators: vec![a(), b()],
            banned: vec![d()],
            ..StateTable::default()
        },
    );
    chain.set_deposits(0, vec![(a(), 1_000), (b(), 1_000), (c(), 500), (d(), 300)]);

    chain.add_block(block(1, a(), 50, &[], 2, vec![]));
    chain.add_block(block(2, b(), 100, &[0, 1], 2, vec![]));
    chain.add_block(block(3, a(), 110, &[0, 1], 2, vec![pay(p(), 1_000, q(), 1)]));
    chain.add_block(block(4, b(), 120, &[0, 1], 2, vec![pay(p(), 1_000, q(), 1)]));
    chain.add_block(block(5, a(), 200, &[0], 2, vec![pay(p(), 1_000, q(), 1)]));
    chain.add_block(block(6, b(), 210, &[0], 2, vec![]));
    chain.add_block(block(7, a(), 300, &[0, 1], 2, vec![]));

    chain.set_balance(a(), 0, 10_000);
    chain.set_balance(b(), 0, 10_000);
    chain.set_balance(c(), 0, 5_000);
    chain.set_balance(p(), 0, 1_000_000);

    // A: 2000 + 250, B: 1000 - 1000 + 500, C: deposit refund
    chain.set_balance(a(), 7, 12_250);
    chain.set_balance(b(), 7, 10_500);
    chain.set_balance(c(), 7, 5_500);
    chain
}

async fn audit_until(auditor: &mut Auditor<MockChain>, last: u64) -> Vec<crate::audit::AuditReport> {
    let mut reports = Vec::new();
    for height in 1..=last {
        reports.push(auditor.audit_height(height).await.unwrap());
    }
    reports
}

#[tokio::test]
async fn test_partial_terms_are_not_audited() {
    let mut auditor = Auditor::new(three_terms(), settings(100)).unwrap();
    let reports = audit_until(&mut auditor, 6).await;

    let boundaries: Vec<u64> = reports
        .iter()
        .filter(|r| r.is_term_boundary())
        .map(|r| r.height)
        .collect();
    assert_eq!(boundaries, vec![2, 5]);

    for report in &reports {
        let skipped = matches!(report.height, 1 | 2 | 5);
        assert_eq!(report.skipped, skipped, "#{}", report.height);
        assert!(report.is_clean(), "#{}: {:?}", report.height, report.discrepancies);
        if report.is_term_boundary() {
            assert!(report.settlement.as_ref().unwrap().partial);
        }
    }

    let state = auditor.state().unwrap();
    let window = state.previous_window.as_ref().unwrap();
    assert_eq!((window.first_block, window.last_block), (3, 5));
    assert_eq!(state.current_window_start, 6);

    let settling = state.terms.previous();
    assert!(settling.complete);
    assert_eq!(settling.reward_ledger.deposited(&a()), 2_000);
    assert_eq!(settling.reward_ledger.deposited(&b()), 1_000);
    // precommits for #3..#5 arrive in #4..#6
    assert_eq!(settling.committed(&a()), 3);
    assert_eq!(settling.committed(&b()), 1);
    assert_eq!(settling.tally(&a()), VoteTally { missed: 1, proposed: 2 });
    assert_eq!(settling.tally(&b()), VoteTally { missed: 0, proposed: 1 });
}

#[tokio::test]
async fn test_settlement_with_penalties_and_refunds() {
    let mut auditor = Auditor::new(three_terms(), settings(100)).unwrap();
    let reports = audit_until(&mut auditor, 7).await;
    let report = reports.last().unwrap();

    assert!(report.is_term_boundary());
    assert!(!report.skipped);
    assert_eq!(report.term, 3);
    assert!(report.is_clean(), "{:?}", report.discrepancies);
    // author A, outgoing validator B, released nominee C
    assert_eq!(report.audited, 3);

    let outcome = report.settlement.as_ref().unwrap();
    assert!(!outcome.partial);
    assert_eq!(outcome.released, vec![(c(), 500)]);
    assert_eq!(outcome.confiscated_deposits, vec![(d(), 300)]);
    assert!(outcome.banned_rewards.is_empty());

    // B missed 2 of 3 precommits: 6 <= 2*3, last bracket, (12 - 12)/30
    let penalty_b = outcome.penalties.iter().find(|p| p.validator == b()).unwrap();
    assert_eq!((penalty_b.missed, penalty_b.reward, penalty_b.paid), (2, 1_000, 0));
    let penalty_a = outcome.penalties.iter().find(|p| p.validator == a()).unwrap();
    assert_eq!((penalty_a.missed, penalty_a.paid), (0, 2_000));

    // B sealed #4 in full, A sealed #5 one precommit short: B 1000/2, then A 500/2
    assert_eq!(outcome.reclaimed, 1_000);
    assert_eq!(outcome.redistributed, 750);
    assert_eq!(outcome.undistributed(), 250);

    let state = auditor.state().unwrap();
    assert_eq!(state.current_window_start, 8);
    assert_eq!(state.nominations.len(), 2);
    assert!(!state.nominations.contains(&c()));
    assert!(!state.nominations.contains(&d()));
}

#[tokio::test]
async fn test_unpenalised_payout_is_reported() {
    let mut chain = three_terms();
    // the chain pays B its full reward
    chain.set_balance(b(), 7, 11_500);

    let mut auditor = Auditor::new(chain, settings(100)).unwrap();
    let reports = audit_until(&mut auditor, 7).await;
    let report = reports.last().unwrap();

    assert_eq!(report.discrepancies.len(), 1);
    let d = &report.discrepancies[0];
    assert_eq!(d.subject, SubjectKind::Validator);
    assert_eq!(d.account, b());
    assert_eq!(d.expected, 10_500);
    assert_eq!(d.actual, 11_500);
    assert_eq!(d.height, 7);
}

#[tokio::test]
async fn test_complete_term_without_window_is_fatal() {
    let state = AuditorState {
        parent_height: 1,
        parent_timestamp: 50,
        terms: TermRing::new(TermData::new(), TermData::new()),
        previous_window: None,
        current_window_start: 1,
        current_validators: vec![a(), b()],
        nominations: NominationDeposits::new(),
    };
    let mut auditor = Auditor::new(three_terms(), settings(100))
        .unwrap()
        .with_state(state.clone());

    let err = auditor.audit_height(2).await.unwrap_err();
    assert!(matches!(err, AuditError::Invariant { height: 2, .. }));
    assert_eq!(auditor.state(), Some(&state));
}

// Timeline (term length 100s, roster [A, B, E], stakeholders S1:S2 = 3:1):
//   #1  ts  50  cold start
//   #2  ts 100  boundary, settles the cold generation (skipped)
//   #3-#5       A, E, B author one 1000-fee block each: S1 +75, S2 +25, author 900
//   #5  ts 200  boundary, settles the #2 generation (skipped)
//   #7  ts 300  boundary, settles #3..#5 with E banned; the block itself pays S1 and S2

fn e() -> AccountId {
    account(5)
}
fn s1() -> AccountId {
    account(10)
}
fn s2() -> AccountId {
    account(11)
}

fn weighted_terms() -> MockChain {
    let mut chain = MockChain::new();
    chain.set_states(
        0,
        StateTable {
            validators: vec![a(), b(), e()],
            ..StateTable::default()
        },
    );
    chain.set_states(
        7,
        StateTable {
            validators: vec![a(), b()],
            banned: vec![e()],
            ..StateTable::default()
        },
    );
    chain.set_weights(0, vec![Weight::new(s1(), 3), Weight::new(s2(), 1)]);
    chain.set_deposits(0, vec![(a(), 1_000), (b(), 1_000), (e(), 300)]);

    let all = [0, 1, 2];
    chain.add_block(block(1, a(), 50, &[], 3, vec![]));
    chain.add_block(block(2, b(), 100, &all, 3, vec![]));
    chain.add_block(block(3, a(), 110, &all, 3, vec![pay(p(), 1_000, q(), 1)]));
    chain.add_block(block(4, e(), 120, &all, 3, vec![pay(p(), 1_000, q(), 1)]));
    chain.add_block(block(5, b(), 200, &all, 3, vec![pay(p(), 1_000, q(), 1)]));
    chain.add_block(block(6, a(), 210, &all, 3, vec![]));
    chain.add_block(block(7, a(), 300, &all, 3, vec![pay(p(), 1_000, q(), 1)]));

    for validator in [a(), b(), e()] {
        chain.set_balance(validator, 0, 10_000);
    }
    chain.set_balance(p(), 0, 1_000_000);
    chain.set_balance(s1(), 0, 1_000);
    chain.set_balance(s2(), 0, 1_000);
    for (height, paid_blocks) in [(3, 1), (4, 2), (5, 3), (7, 4)] {
        chain.set_balance(s1(), height, 1_000 + 75 * paid_blocks);
        chain.set_balance(s2(), height, 1_000 + 25 * paid_blocks);
    }

    // A and B: 900 accrued + 300 from E's forfeited reward; E keeps nothing
    chain.set_balance(a(), 7, 11_200);
    chain.set_balance(b(), 7, 11_200);
    chain
}

#[tokio::test]
async fn test_boundary_pays_stakeholders_and_reclaims_banned_reward() {
    let mut auditor = Auditor::new(weighted_terms(), settings(100)).unwrap();
    let reports = audit_until(&mut auditor, 7).await;
    for report in &reports {
        assert!(report.is_clean(), "#{}: {:?}", report.height, report.discrepancies);
    }

    let report = reports.last().unwrap();
    assert!(report.is_term_boundary());
    assert!(!report.skipped);
    // author A, outgoing validators B and E, stakeholders S1 and S2
    assert_eq!(report.audited, 5);

    let outcome = report.settlement.as_ref().unwrap();
    assert_eq!(outcome.banned_rewards, vec![(e(), 900)]);
    assert_eq!(outcome.confiscated_deposits, vec![(e(), 300)]);
    assert!(outcome.released.is_empty());
    assert!(outcome.penalties.iter().all(|p| p.paid == p.reward));
    assert!(outcome.penalties.iter().all(|p| p.validator != e()));

    // A and B tie: 900/3 each
    assert_eq!(outcome.reclaimed, 900);
    assert_eq!(outcome.redistributed, 600);
    assert_eq!(outcome.undistributed(), 300);

    let state = auditor.state().unwrap();
    assert_eq!(state.current_validators, vec![a(), b()]);
    assert!(!state.nominations.contains(&e()));
    // #7's author reward waits for the next boundary
    assert_eq!(state.terms.previous().reward_ledger.deposited(&a()), 900);
}

#[tokio::test]
async fn test_banned_reward_paid_out_is_reported() {
    let mut chain = weighted_terms();
    chain.set_balance(e(), 7, 10_900);
    chain.set_balance(s1(), 7, 1_299);

    let mut auditor = Auditor::new(chain, settings(100)).unwrap();
    let reports = audit_until(&mut auditor, 7).await;
    let report = reports.last().unwrap();

    let found: Vec<(SubjectKind, AccountId, u128, u128)> = report
        .discrepancies
        .iter()
        .map(|d| (d.subject, d.account, d.expected, d.actual))
        .collect();
    assert_eq!(
        found,
        vec![
            (SubjectKind::Validator, e(), 10_000, 10_900),
            (SubjectKind::Stakeholder, s1(), 1_300, 1_299),
        ]
    );
}
