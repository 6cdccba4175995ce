//! Property-based tests для топиков и маршрутизации
//!
//! Генерируют случайные пути и наборы подписок и сверяют таблицу
//! маршрутизации с прямым перебором по правилу префикса.

use std::collections::BTreeSet;

use proptest::prelude::*;
use zbroker::{from_string, to_string, Mailbox, SubscriptionTable, Topic};

const PROPTEST_CASES: u32 = 256;

// ============================================================================
// ГЕНЕРАТОРЫ
// ============================================================================

/// Сегмент из маленького алфавита, чтобы пути часто пересекались.
fn segment_strategy() -> impl Strategy<Value = String> {
    "[abc]{1,2}"
}

fn segments_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(segment_strategy(), 0..5)
}

/// Запись пути с лишними разделителями в произвольных местах.
fn noisy_path_strategy() -> impl Strategy<Value = (Vec<String>, String)> {
    segments_strategy().prop_flat_map(|segs| {
        let n = segs.len() + 1;
        (Just(segs), prop::collection::vec(0usize..3, n))
    })
    .prop_map(|(segs, slashes)| {
        let mut raw = String::new();
        for (i, seg) in segs.iter().enumerate() {
            raw.push_str(&"/".repeat(slashes[i] + usize::from(i > 0)));
            raw.push_str(seg);
        }
        raw.push_str(&"/".repeat(slashes[segs.len()]));
        (segs, raw)
    })
}

/// Набор подписок: (номер подписчика, сегменты топика).
fn subscriptions_strategy() -> impl Strategy<Value = Vec<(usize, Vec<String>)>> {
    prop::collection::vec((0usize..4, segments_strategy()), 0..20)
}

fn is_segment_prefix(
    prefix: &[String],
    full: &[String],
) -> bool {
    prefix.len() <= full.len() && prefix.iter().zip(full).all(|(a, b)| a == b)
}

// ============================================================================
// PROPERTY TESTS
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig {
        cases: PROPTEST_CASES,
        .. ProptestConfig::default()
    })]

    /// Лишние разделители не влияют на топик.
    #[test]
    fn canonicalization_ignores_empty_segments((segs, raw) in noisy_path_strategy()) {
        let topic = Topic::new(&raw);
        prop_assert_eq!(topic.as_str(), segs.join("/"));
        prop_assert_eq!(topic.depth(), segs.len());
        prop_assert_eq!(&topic, &Topic::new(segs.join("/")));
    }

    /// Правило совпадения равно посегментному префиксу.
    #[test]
    fn matches_is_segment_prefix(a in segments_strategy(), b in segments_strategy()) {
        let ta = Topic::new(a.join("/"));
        let tb = Topic::new(b.join("/"));
        prop_assert_eq!(ta.matches(&tb), is_segment_prefix(&a, &b));
    }

    /// prefixes() перечисляет ровно те топики, что совпадают с исходным.
    #[test]
    fn prefixes_are_all_matching_ancestors(segs in segments_strategy()) {
        let topic = Topic::new(segs.join("/"));
        let prefixes: Vec<Topic> = topic.prefixes().collect();
        prop_assert_eq!(prefixes.len(), segs.len() + 1);
        for p in &prefixes {
            prop_assert!(p.matches(&topic));
        }
        prop_assert_eq!(prefixes.last(), Some(&topic));
    }

    /// route() совпадает с перебором, без повторов и по возрастанию id.
    #[test]
    fn route_equals_brute_force(
        subs in subscriptions_strategy(),
        published in segments_strategy(),
    ) {
        let mailboxes: Vec<_> = (0..4).map(|_| Mailbox::blocking()).collect();
        let mut table = SubscriptionTable::new();
        for (who, segs) in &subs {
            let mb = &mailboxes[*who];
            table.subscribe(Topic::new(segs.join("/")), mb.id(), &std::sync::Arc::downgrade(mb));
        }

        let expected: BTreeSet<_> = subs
            .iter()
            .filter(|(_, segs)| is_segment_prefix(segs, &published))
            .map(|(who, _)| mailboxes[*who].id())
            .collect();

        let routed: Vec<_> = table
            .route(&Topic::new(published.join("/")))
            .into_iter()
            .map(|(id, _)| id)
            .collect();

        prop_assert_eq!(routed, expected.into_iter().collect::<Vec<_>>());
    }

    /// Конвертация целых в строку и обратно.
    #[test]
    fn integer_string_conversion(n in any::<i64>()) {
        prop_assert_eq!(from_string::<i64>(&to_string(&n)), Some(n));
    }
}
