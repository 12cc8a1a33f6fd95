//! Property-based tests for ledger invariants
//!
//! These tests use proptest to verify critical invariants:
//! - Share cap: Σ(share percentages) <= 100 per project
//! - Revenue conservation: total_revenue == Σ(distributed amounts)
//! - Floor crediting: earnings == Σ floor(amount * pct / 100)
//! - No retroactive credit: a share only earns from later distributions
//! - Atomicity: a rejected operation leaves the store unchanged
//! - Dense event log: sequences run 1..=n without gaps

use proptest::prelude::*;
use revshare_ledger::{
    distribution::credit_for, CallContext, Ledger, MemoryStore, Operation, Principal,
    MAX_TOTAL_SHARE,
};

const PRINCIPALS: [&str; 4] = ["owner", "alice", "bob", "carol"];

/// Strategy for picking a caller or collaborator
fn principal_strategy() -> impl Strategy<Value = Principal> {
    prop::sample::select(PRINCIPALS.to_vec()).prop_map(Principal::new)
}

/// Strategy for generating any operation, valid or not
fn operation_strategy() -> impl Strategy<Value = Operation> {
    prop_oneof![
        (prop::bool::ANY, prop::bool::ANY).prop_map(|(titled, full_hash)| {
            Operation::CreateProject {
                title: if titled { "Project".to_string() } else { String::new() },
                content_hash: vec![9u8; if full_hash { 32 } else { 16 }],
                license_type: "MIT".to_string(),
            }
        }),
        (0u64..4).prop_map(|project_id| Operation::DeactivateProject { project_id }),
        (0u64..4, principal_strategy(), 0u32..120).prop_map(
            |(project_id, collaborator, share_percentage)| Operation::AddCollaborator {
                project_id,
                collaborator,
                share_percentage,
                role: "Contributor".to_string(),
            }
        ),
        (0u64..4).prop_map(|project_id| Operation::VerifyCollaborator { project_id }),
        (0u64..4, 0u128..1_000_000).prop_map(|(project_id, amount)| {
            Operation::DistributeRevenue { project_id, amount }
        }),
        (0u64..4).prop_map(|project_id| Operation::WithdrawEarnings { project_id }),
    ]
}

/// One step of an interleaved share/revenue history
#[derive(Debug, Clone)]
enum Step {
    Add(Principal, u32),
    Distribute(u128),
}

/// Strategy for interleaving collaborator additions with distributions
fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        (principal_strategy(), 1u32..=40).prop_map(|(who, pct)| Step::Add(who, pct)),
        (1u128..10_000_000).prop_map(Step::Distribute),
    ]
}

/// Create test ledger with one project owned by "owner"
fn create_test_ledger() -> Ledger<MemoryStore> {
    let ledger = Ledger::in_memory().unwrap();
    ledger
        .create_project(&CallContext::new("owner", 0), "Project", &[9u8; 32], "MIT")
        .unwrap();
    ledger
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: allocated shares never exceed 100%
    #[test]
    fn prop_share_cap_holds(
        requests in prop::collection::vec((principal_strategy(), 0u32..120), 1..20)
    ) {
        let ledger = create_test_ledger();
        let owner = CallContext::new("owner", 1);

        for (collaborator, pct) in requests {
            let before = ledger.allocated_share(1).unwrap();
            let result = ledger.add_collaborator(&owner, 1, &collaborator, pct, "");
            let after = ledger.allocated_share(1).unwrap();

            prop_assert!(after <= MAX_TOTAL_SHARE);
            match result {
                Ok(()) => prop_assert_eq!(after, before + pct),
                Err(_) => prop_assert_eq!(after, before),
            }
        }
    }

    /// Property: revenue totals and floor credits add up
    #[test]
    fn prop_revenue_conservation(
        pcts in prop::collection::vec(1u32..=50, 1..3),
        amounts in prop::collection::vec(1u128..10_000_000, 1..20)
    ) {
        let ledger = create_test_ledger();
        let owner = CallContext::new("owner", 1);

        let collaborators: Vec<_> = pcts
            .iter()
            .zip(PRINCIPALS.iter().skip(1))
            .map(|(pct, name)| {
                let collaborator = Principal::new(*name);
                ledger.add_collaborator(&owner, 1, &collaborator, *pct, "").unwrap();
                (collaborator, *pct)
            })
            .collect();

        for amount in &amounts {
            ledger.distribute_revenue(&owner, 1, *amount).unwrap();
        }

        let project = ledger.get_project_details(1).unwrap().unwrap();
        prop_assert_eq!(project.total_revenue, amounts.iter().sum::<u128>());
        prop_assert_eq!(project.distribution_count, amounts.len() as u64);

        for (collaborator, pct) in &collaborators {
            let expected: u128 = amounts
                .iter()
                .map(|amount| credit_for(*amount, *pct).unwrap())
                .sum();
            let pending = ledger.get_pending_earnings(1, collaborator).unwrap();
            prop_assert_eq!(pending, Some(expected));
        }
    }

    /// Property: rejected operations leave the store byte-for-byte unchanged
    #[test]
    fn prop_failed_operations_are_atomic(
        steps in prop::collection::vec((principal_strategy(), operation_strategy()), 1..40)
    ) {
        let ledger = create_test_ledger();

        for (height, (caller, operation)) in steps.into_iter().enumerate() {
            let ctx = CallContext::new(caller, height as u64 + 1);
            let before = ledger.store().snapshot();

            match ledger.execute(&ctx, &operation) {
                Ok(committed) => {
                    prop_assert!(!committed.events.is_empty());
                }
                Err(_) => {
                    prop_assert_eq!(&ledger.store().snapshot(), &before);
                }
            }
        }
    }

    /// Property: event sequences are dense and ordered
    #[test]
    fn prop_event_log_is_dense(
        steps in prop::collection::vec((principal_strategy(), operation_strategy()), 1..40)
    ) {
        let ledger = create_test_ledger();
        let mut committed_events = 1;

        for (caller, operation) in steps {
            if let Ok(committed) = ledger.execute(&CallContext::new(caller, 1), &operation) {
                committed_events += committed.events.len();
            }
        }

        let events = ledger.events_since(1, usize::MAX).unwrap();
        prop_assert_eq!(events.len(), committed_events);
        for (index, event) in events.iter().enumerate() {
            prop_assert_eq!(event.sequence, index as u64 + 1);
        }
    }

    /// Property: a share earns only from distributions made after it was added
    #[test]
    fn prop_no_retroactive_credit(steps in prop::collection::vec(step_strategy(), 1..30)) {
        let ledger = create_test_ledger();
        let owner = CallContext::new("owner", 1);

        // (collaborator, pct, expected earnings)
        let mut expected: Vec<(Principal, u32, u128)> = Vec::new();
        let mut total: u128 = 0;

        for step in steps {
            match step {
                Step::Add(collaborator, pct) => {
                    if ledger.add_collaborator(&owner, 1, &collaborator, pct, "").is_ok() {
                        expected.push((collaborator, pct, 0));
                    }
                }
                Step::Distribute(amount) => {
                    ledger.distribute_revenue(&owner, 1, amount).unwrap();
                    total += amount;
                    for (_, pct, earned) in expected.iter_mut() {
                        *earned += credit_for(amount, *pct).unwrap();
                    }
                }
            }
        }

        let project = ledger.get_project_details(1).unwrap().unwrap();
        prop_assert_eq!(project.total_revenue, total);

        for (collaborator, _, earned) in &expected {
            let pending = ledger.get_pending_earnings(1, collaborator).unwrap();
            prop_assert_eq!(pending, Some(*earned));
        }
        prop_assert_eq!(ledger.list_collaborators(1).unwrap().len(), expected.len());
    }
}
