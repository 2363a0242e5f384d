//! Tests for the allocation engine.

#[cfg(test)]
mod tests {
    use super::super::engine::*;
    use crate::error::{SinkError, SubmitError, ValidationError};
    use crate::roster::{PeerRef, Roster};
    use crate::test_support::{alice_and_bob, FakeBackend};
    use chrono::Utc;
    use proptest::prelude::*;

    fn engine_with(peers: Vec<PeerRef>) -> AllocationEngine {
        AllocationEngine::new(Roster::new(peers), true)
    }

    /// Scenario A: Alice gets 30.
    fn scenario_a() -> AllocationEngine {
        let mut engine = engine_with(alice_and_bob());
        engine.set_row_peer(0, Some("1")).unwrap();
        engine.set_row_points(0, Some(30.0)).unwrap();
        engine
    }

    /// Scenario B: Bob gets the remaining 70.
    fn scenario_b() -> AllocationEngine {
        let mut engine = scenario_a();
        engine.set_row_peer(1, Some("2")).unwrap();
        engine.set_row_points(1, Some(70.0)).unwrap();
        engine
    }

    #[test]
    fn starts_with_one_blank_row() {
        let engine = engine_with(alice_and_bob());
        assert_eq!(engine.rows(), &[AllocationRow::default()]);
        assert_eq!(engine.phase(), AllocationPhase::Empty);
        assert_eq!(engine.total(), 0.0);
    }

    #[test]
    fn scenario_a_grows_after_first_complete_row() {
        let engine = scenario_a();
        assert_eq!(engine.rows().len(), 2);
        assert!(engine.rows()[1].is_blank());
        assert_eq!(engine.total(), 30.0);
        assert!(!engine.can_submit());
        assert_eq!(engine.phase(), AllocationPhase::Partial);
    }

    #[test]
    fn scenario_b_completes_without_extra_row() {
        let engine = scenario_b();
        assert_eq!(engine.total(), 100.0);
        assert!(engine.can_submit());
        assert_eq!(engine.rows().len(), 2);
        assert_eq!(engine.phase(), AllocationPhase::Complete);
    }

    #[test]
    fn scenario_c_clearing_points_reopens_the_form() {
        let mut engine = scenario_b();
        engine.set_row_points(1, None).unwrap();
        assert_eq!(engine.total(), 30.0);
        assert!(!engine.can_submit());
        assert_eq!(engine.phase(), AllocationPhase::Partial);
        assert!(engine
            .blockers()
            .contains(&Blocker::MissingPoints { row: 1 }));
    }

    #[test]
    fn scenario_d_empty_roster_never_completes() {
        let mut engine = engine_with(Vec::new());
        assert_eq!(engine.rows().len(), 1);
        assert!(!engine.can_submit());
        assert_eq!(
            engine.set_row_peer(0, Some("1")),
            Err(ValidationError::UnknownPeer("1".into()))
        );
        engine.set_row_points(0, Some(100.0)).unwrap();
        assert!(!engine.can_submit());
        assert_eq!(engine.rows().len(), 1);
    }

    #[test]
    fn no_growth_for_incomplete_last_row() {
        let mut engine = engine_with(alice_and_bob());
        engine.set_row_peer(0, Some("1")).unwrap();
        assert_eq!(engine.rows().len(), 1);

        let mut engine = engine_with(alice_and_bob());
        engine.set_row_points(0, Some(40.0)).unwrap();
        assert_eq!(engine.rows().len(), 1);
    }

    #[test]
    fn zero_points_do_not_grow() {
        let mut engine = engine_with(alice_and_bob());
        engine.set_row_peer(0, Some("1")).unwrap();
        engine.set_row_points(0, Some(0.0)).unwrap();
        assert_eq!(engine.rows().len(), 1);
    }

    #[test]
    fn no_growth_when_budget_is_spent_in_one_row() {
        let mut engine = engine_with(alice_and_bob());
        engine.set_row_peer(0, Some("1")).unwrap();
        engine.set_row_points(0, Some(100.0)).unwrap();
        assert_eq!(engine.rows().len(), 1);
        assert!(engine.can_submit());

        let mut engine = engine_with(alice_and_bob());
        engine.set_row_peer(0, Some("1")).unwrap();
        engine.set_row_points(0, Some(120.0)).unwrap();
        assert_eq!(engine.rows().len(), 1);
        assert!(!engine.can_submit());
    }

    #[test]
    fn editing_an_earlier_row_never_grows() {
        let mut engine = scenario_b();
        engine.set_row_points(0, Some(10.0)).unwrap();
        assert_eq!(engine.rows().len(), 2);
        assert_eq!(engine.total(), 80.0);

        // Editing the last row re-evaluates growth.
        engine.set_row_points(1, Some(70.0)).unwrap();
        assert_eq!(engine.rows().len(), 3);
    }

    #[test]
    fn growth_rule_is_idempotent() {
        let mut engine = scenario_a();
        assert_eq!(engine.rows().len(), 2);
        assert!(!engine.apply_growth_rule());
        assert!(!engine.apply_growth_rule());
        assert_eq!(engine.rows().len(), 2);
    }

    #[test]
    fn duplicate_peers_block_submission() {
        let mut engine = scenario_a();
        engine.set_row_peer(1, Some("1")).unwrap();
        engine.set_row_points(1, Some(70.0)).unwrap();
        assert_eq!(engine.total(), 100.0);
        assert_eq!(engine.duplicate_peers(), vec!["1".to_string()]);
        assert!(!engine.is_complete());
        assert!(!engine.can_submit());

        engine.set_row_peer(1, Some("2")).unwrap();
        assert!(engine.can_submit());
    }

    #[test]
    fn points_without_peer_block_submission() {
        let mut engine = scenario_a();
        engine.set_row_points(1, Some(70.0)).unwrap();
        assert_eq!(engine.total(), 100.0);
        assert!(engine
            .blockers()
            .contains(&Blocker::PointsWithoutPeer { row: 1 }));
        assert!(!engine.can_submit());
    }

    #[test]
    fn decimal_points_reach_the_budget() {
        let peers = vec![
            PeerRef::new("1", "Alice"),
            PeerRef::new("2", "Bob"),
            PeerRef::new("3", "Charlie"),
        ];
        let mut engine = engine_with(peers);
        for (row, (peer, points)) in [("1", 33.3), ("2", 33.3), ("3", 33.4)].into_iter().enumerate() {
            engine.set_row_peer(row, Some(peer)).unwrap();
            engine.set_row_points(row, Some(points)).unwrap();
        }
        assert!(engine.can_submit());
        assert_eq!(engine.rows().len(), 3);
    }

    #[test]
    fn closed_window_blocks_complete_allocation() {
        let mut engine = scenario_b();
        engine.set_submissions_open(false);
        assert!(engine.is_complete());
        assert!(!engine.can_submit());
        assert_eq!(engine.blockers(), vec![Blocker::WindowClosed]);
    }

    #[test]
    fn rejects_out_of_bounds_rows_and_bad_points() {
        let mut engine = engine_with(alice_and_bob());
        assert!(matches!(
            engine.set_row_peer(3, Some("1")),
            Err(ValidationError::OutOfBounds { index: 3, len: 1, .. })
        ));
        assert!(matches!(
            engine.set_row_points(0, Some(-1.0)),
            Err(ValidationError::InvalidPoints { .. })
        ));
        assert!(matches!(
            engine.set_row_points(0, Some(f64::NAN)),
            Err(ValidationError::InvalidPoints { .. })
        ));
        assert_eq!(engine.rows()[0], AllocationRow::default());
    }

    #[test]
    fn initialize_resets_rows() {
        let mut engine = scenario_b();
        engine
            .initialize(Roster::new(vec![PeerRef::new("9", "Zoe")]))
            .unwrap();
        assert_eq!(engine.rows().len(), 1);
        assert_eq!(engine.phase(), AllocationPhase::Empty);
        assert_eq!(engine.available_peers(), vec!["9"]);
    }

    #[tokio::test]
    async fn initialize_cannot_leave_submitted() {
        let backend = FakeBackend::open(Utc::now(), alice_and_bob());
        let mut engine = scenario_b();
        engine.submit("me", &backend).await.unwrap();

        assert_eq!(
            engine.initialize(Roster::new(vec![PeerRef::new("9", "Zoe")])),
            Err(ValidationError::AlreadySubmitted)
        );
        assert_eq!(engine.phase(), AllocationPhase::Submitted);
        assert_eq!(engine.rows().len(), 2);
        assert!(engine.roster().contains("2"));
    }

    #[test]
    fn available_peers_excludes_selected() {
        let engine = scenario_a();
        assert_eq!(engine.available_peers(), vec!["2"]);
    }

    #[tokio::test]
    async fn submit_hands_allocation_to_sink() {
        let backend = FakeBackend::open(Utc::now(), alice_and_bob());
        let mut engine = scenario_b();

        let allocation = engine.submit("me", &backend).await.unwrap();
        assert_eq!(allocation.get("1"), Some(&30.0));
        assert_eq!(allocation.get("2"), Some(&70.0));
        assert_eq!(engine.phase(), AllocationPhase::Submitted);

        let submissions = backend.submissions.borrow();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].0, "me");
        assert_eq!(submissions[0].1, allocation);
    }

    #[tokio::test]
    async fn submit_refuses_invalid_allocation_without_calling_sink() {
        let backend = FakeBackend::open(Utc::now(), alice_and_bob());
        let mut engine = scenario_a();

        let err = engine.submit("me", &backend).await.unwrap_err();
        assert!(matches!(
            err,
            SubmitError::Validation(ValidationError::NotSubmittable(_))
        ));
        assert_eq!(backend.submission_count(), 0);
        assert_eq!(engine.phase(), AllocationPhase::Partial);
    }

    #[tokio::test]
    async fn sink_failure_preserves_rows_for_retry() {
        let backend = FakeBackend::open(Utc::now(), alice_and_bob());
        backend.fail_submissions(Some(SinkError::Rejected {
            status: 500,
            message: "boom".into(),
        }));
        let mut engine = scenario_b();
        let before = engine.rows().to_vec();

        let err = engine.submit("me", &backend).await.unwrap_err();
        assert!(matches!(err, SubmitError::Sink(SinkError::Rejected { status: 500, .. })));
        assert_eq!(engine.rows(), before.as_slice());
        assert_eq!(engine.phase(), AllocationPhase::Complete);

        backend.fail_submissions(None);
        engine.submit("me", &backend).await.unwrap();
        assert_eq!(backend.submission_count(), 1);
    }

    #[tokio::test]
    async fn submitted_form_is_terminal() {
        let backend = FakeBackend::open(Utc::now(), alice_and_bob());
        let mut engine = scenario_b();
        engine.submit("me", &backend).await.unwrap();

        assert_eq!(
            engine.set_row_points(0, Some(10.0)),
            Err(ValidationError::AlreadySubmitted)
        );
        assert_eq!(
            engine.set_row_peer(0, None),
            Err(ValidationError::AlreadySubmitted)
        );
        let err = engine.submit("me", &backend).await.unwrap_err();
        assert_eq!(err, SubmitError::Validation(ValidationError::AlreadySubmitted));
        assert_eq!(backend.submission_count(), 1);
        assert!(!engine.can_submit());
    }

    #[derive(Debug, Clone)]
    enum Edit {
        Peer(usize, Option<usize>),
        Points(usize, Option<u8>),
    }

    fn edit_strategy() -> impl Strategy<Value = Edit> {
        prop_oneof![
            (0usize..6, proptest::option::of(0usize..4)).prop_map(|(r, p)| Edit::Peer(r, p)),
            (0usize..6, proptest::option::of(0u8..=60)).prop_map(|(r, p)| Edit::Points(r, p)),
        ]
    }

    fn four_peers() -> Vec<PeerRef> {
        (0..4)
            .map(|i| PeerRef::new(i.to_string(), format!("Peer {i}")))
            .collect()
    }

    proptest! {
        #[test]
        fn total_always_matches_row_sum(edits in proptest::collection::vec(edit_strategy(), 0..40)) {
            let mut engine = engine_with(four_peers());
            for edit in edits {
                let _ = match edit {
                    Edit::Peer(row, peer) => {
                        let id = peer.map(|p| p.to_string());
                        engine.set_row_peer(row, id.as_deref())
                    }
                    Edit::Points(row, points) => engine.set_row_points(row, points.map(f64::from)),
                };
                let expected: f64 = engine.rows().iter().filter_map(|r| r.points).sum();
                prop_assert_eq!(engine.total(), expected);
            }
        }

        #[test]
        fn rows_grow_by_one_only_after_filling_the_last_row(
            edits in proptest::collection::vec(edit_strategy(), 0..40)
        ) {
            let mut engine = engine_with(four_peers());
            for edit in edits {
                let before = engine.rows().len();
                let (row, result) = match edit {
                    Edit::Peer(row, peer) => {
                        let id = peer.map(|p| p.to_string());
                        (row, engine.set_row_peer(row, id.as_deref()))
                    }
                    Edit::Points(row, points) => {
                        (row, engine.set_row_points(row, points.map(f64::from)))
                    }
                };
                let after = engine.rows().len();
                prop_assert!(after == before || after == before + 1);

                let grew = after == before + 1;
                let edited_last = result.is_ok() && row + 1 == before;
                let should_grow = edited_last
                    && engine.rows()[before - 1].is_filled()
                    && engine.total() < 100.0;
                prop_assert_eq!(grew, should_grow);
                if grew {
                    prop_assert!(engine.rows()[after - 1].is_blank());
                }
            }
        }

        #[test]
        fn can_submit_matches_definition(
            edits in proptest::collection::vec(edit_strategy(), 0..40)
        ) {
            let mut engine = engine_with(four_peers());
            for edit in edits {
                let _ = match edit {
                    Edit::Peer(row, peer) => {
                        let id = peer.map(|p| p.to_string());
                        engine.set_row_peer(row, id.as_deref())
                    }
                    Edit::Points(row, points) => engine.set_row_points(row, points.map(f64::from)),
                };
            }
            let rows = engine.rows();
            let all_selected_have_points = rows
                .iter()
                .all(|r| r.peer_id.is_none() || r.points.is_some());
            let no_orphan_points = rows
                .iter()
                .all(|r| r.peer_id.is_some() || r.points.map_or(true, |p| p == 0.0));
            let expected = engine.total() == 100.0
                && all_selected_have_points
                && no_orphan_points
                && engine.duplicate_peers().is_empty();
            prop_assert_eq!(engine.can_submit(), expected);
        }
    }
}
