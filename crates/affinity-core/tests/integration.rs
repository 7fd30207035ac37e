//! Integration tests exercising the full engine surface:
//! record events → score → rank → recommend, plus the blob round trip.

use std::collections::HashSet;

use affinity_core::{
    CandidateItem, Event, RankingEngine, UserProfile, decode_profile, encode_profile,
};
use approx::assert_relative_eq;
use proptest::prelude::*;

fn engine() -> RankingEngine {
    RankingEngine::default()
}

fn view(item_id: i64, category_id: i64) -> Event {
    Event::View {
        item_id,
        category_id,
    }
}

/// Empty profile: no affinity term, unseen bonus, every popularity term capped.
#[test]
fn popular_item_on_empty_profile_scores_23() {
    let item = CandidateItem::new(1, 1).with_counts(1000, 100, 50);
    assert_relative_eq!(engine().score(&UserProfile::new(), &item), 23.0);
}

#[test]
fn two_likes_in_one_category_accumulate() {
    let e = engine();
    let mut p = UserProfile::new();
    e.record_event(&mut p, &Event::like(1, 1, true)).unwrap();
    e.record_event(&mut p, &Event::like(2, 1, true)).unwrap();

    assert_eq!(p.category_affinity.len(), 1);
    assert_eq!(p.category_affinity[0].category_id, 1);
    assert_relative_eq!(p.category_affinity[0].score, 4.0);
}

#[test]
fn fifty_one_views_evict_the_first() {
    let e = engine();
    let mut p = UserProfile::new();
    for i in 1..=51 {
        e.record_event_at(&mut p, &view(i, i % 7), 1_000 + i).unwrap();
    }

    assert_eq!(p.view_history.len(), 50);
    let ids: HashSet<i64> = p.view_history.iter().map(|h| h.item_id).collect();
    assert_eq!(ids, (2..=51).collect::<HashSet<_>>());
    assert_eq!(p.view_history[0].item_id, 51);
    assert_eq!(p.view_history[49].item_id, 2);
}

#[test]
fn collect_then_uncollect_keeps_affinity() {
    let e = engine();
    let mut p = UserProfile::new();
    e.record_event(&mut p, &Event::collect(10, 4, true)).unwrap();
    e.record_event(&mut p, &Event::collect(10, 4, false)).unwrap();

    assert!(!p.has_collected(10));
    assert_eq!(p.affinity_for(4), Some(3.0));
}

#[test]
fn personalization_outranks_popularity() {
    let e = engine();
    let mut p = UserProfile::new();
    e.record_event(&mut p, &Event::collect(100, 3, true)).unwrap();

    let niche = CandidateItem::new(1, 3);
    let viral = CandidateItem::new(2, 9).with_counts(1_000_000, 1_000_000, 1_000_000);
    let ranked = e.rank(&p, &[viral, niche]);
    assert_eq!(ranked[0].item.id, 1);
    assert_relative_eq!(ranked[0].score, 35.0);
    assert_relative_eq!(ranked[1].score, 23.0);
}

#[test]
fn empty_profile_degrades_to_popularity_order() {
    let e = engine();
    let candidates = vec![
        CandidateItem::new(1, 1).with_counts(10, 0, 0),
        CandidateItem::new(2, 1).with_counts(900, 40, 10),
        CandidateItem::new(3, 1).with_counts(300, 0, 0),
    ];
    let ids: Vec<i64> = e
        .rank(&UserProfile::new(), &candidates)
        .iter()
        .map(|s| s.item.id)
        .collect();
    assert_eq!(ids, vec![2, 3, 1]);
}

#[test]
fn profile_survives_blob_roundtrip() {
    let e = engine();
    let mut p = UserProfile::new();
    e.record_event(&mut p, &view(1, 1)).unwrap();
    e.record_event(&mut p, &Event::like(1, 1, true)).unwrap();
    e.record_event(&mut p, &Event::search("lanterns").unwrap()).unwrap();

    let blob = encode_profile(&p).unwrap();
    let loaded = decode_profile(&blob, &e.config().caps).unwrap();
    assert_eq!(loaded, p);

    let item = CandidateItem::new(2, 1).with_counts(5, 5, 5);
    assert_eq!(e.score(&p, &item).to_bits(), e.score(&loaded, &item).to_bits());
}

fn arb_event() -> impl Strategy<Value = Event> {
    let item = 0i64..40;
    let cat = 0i64..9;
    prop_oneof![
        (item.clone(), cat.clone()).prop_map(|(i, c)| Event::View {
            item_id: i,
            category_id: c
        }),
        (item.clone(), cat.clone()).prop_map(|(i, c)| Event::Like {
            item_id: i,
            category_id: c
        }),
        item.clone().prop_map(|i| Event::Unlike { item_id: i }),
        (item.clone(), cat).prop_map(|(i, c)| Event::Collect {
            item_id: i,
            category_id: c
        }),
        item.prop_map(|i| Event::Uncollect { item_id: i }),
        "[a-e]{1,2}".prop_map(|k| Event::Search { keyword: k }),
    ]
}

fn arb_candidate() -> impl Strategy<Value = CandidateItem> {
    (0i64..40, 0i64..9, 0u64..5000, 0u64..500, 0u64..100)
        .prop_map(|(id, cat, v, l, c)| CandidateItem::new(id, cat).with_counts(v, l, c))
}

proptest! {
    #[test]
    fn invariants_hold_after_any_event_sequence(events in prop::collection::vec(arb_event(), 0..300)) {
        let e = engine();
        let mut p = UserProfile::new();
        for (ts, ev) in events.iter().enumerate() {
            e.record_event_at(&mut p, ev, ts as i64).unwrap();

            prop_assert!(p.category_affinity.len() <= 5);
            prop_assert!(p
                .category_affinity
                .windows(2)
                .all(|w| w[0].score >= w[1].score));
            prop_assert!(p.category_affinity.iter().all(|a| a.score >= 0.0));
            prop_assert!(p.view_history.len() <= 50);
            prop_assert!(p.search_keywords.len() <= 20);

            for history in [&p.view_history, &p.like_history, &p.collect_history] {
                let ids: HashSet<i64> = history.iter().map(|h| h.item_id).collect();
                prop_assert_eq!(ids.len(), history.len());
            }
            let kws: HashSet<&String> = p.search_keywords.iter().collect();
            prop_assert_eq!(kws.len(), p.search_keywords.len());
        }
    }

    #[test]
    fn rank_is_a_sorted_permutation(
        events in prop::collection::vec(arb_event(), 0..60),
        candidates in prop::collection::vec(arb_candidate(), 0..40),
    ) {
        let e = engine();
        let mut p = UserProfile::new();
        for ev in &events {
            e.record_event_at(&mut p, ev, 0).unwrap();
        }
        let before = p.clone();

        let ranked = e.rank(&p, &candidates);
        prop_assert_eq!(&p, &before);
        prop_assert_eq!(ranked.len(), candidates.len());

        let mut in_ids: Vec<i64> = candidates.iter().map(|c| c.id).collect();
        let mut out_ids: Vec<i64> = ranked.iter().map(|s| s.item.id).collect();
        in_ids.sort_unstable();
        out_ids.sort_unstable();
        prop_assert_eq!(in_ids, out_ids);

        prop_assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
        for s in &ranked {
            prop_assert_eq!(s.score.to_bits(), e.score(&p, &s.item).to_bits());
        }
    }

    #[test]
    fn score_popularity_is_bounded(candidate in arb_candidate()) {
        let s = engine().score(&UserProfile::new(), &candidate);
        prop_assert!(s >= 5.0);
        prop_assert!(s <= 5.0 + 18.0);
    }
}
