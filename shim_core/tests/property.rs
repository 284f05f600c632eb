use proptest::prelude::*;
use shim_core::{
    ChannelRouter, Cube, FilterCoefficients, PreemphasisEngine, channel_count, quantize,
};

prop_compose! {
    fn filter_strategy()(
        n in 1usize..5,
        order in 1usize..4,
    )(
        taps in prop::collection::vec(-1.0f32..1.0, n * n * 2 * order),
        n in Just(n),
        order in Just(order),
    ) -> FilterCoefficients {
        FilterCoefficients::new(Cube::from_flat([n, n, 2 * order], taps).unwrap()).unwrap()
    }
}

proptest! {
    #[test]
    fn quantize_is_monotonic(a in -10.0f32..10.0, b in -10.0f32..10.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(quantize(lo) <= quantize(hi));
    }

    #[test]
    fn channel_count_stays_in_range(n in 0usize..1000) {
        let c = channel_count(n);
        prop_assert!((1..=16).contains(&c));
    }

    #[test]
    fn unconfigured_engine_is_identity(sp in prop::collection::vec(-5.0f32..5.0, 1..20)) {
        let mut e = PreemphasisEngine::new(sp.len().min(16), sp.len());
        prop_assert_eq!(e.apply(&sp), sp.as_slice());
    }

    #[test]
    fn same_inputs_give_same_outputs(
        filter in filter_strategy(),
        inputs in prop::collection::vec(prop::collection::vec(-2.0f32..2.0, 4), 1..30),
    ) {
        let n = filter.channels();
        let mut a = PreemphasisEngine::new(n, 4);
        let mut b = PreemphasisEngine::new(n, 4);
        a.configure(&filter);
        b.configure(&filter);
        for sp in &inputs {
            let ya = a.apply(sp).to_vec();
            let yb = b.apply(sp);
            prop_assert_eq!(ya.as_slice(), yb);
        }
    }

    #[test]
    fn cursor_visits_every_slot(filter in filter_strategy()) {
        let n = filter.channels();
        let order = filter.order();
        let mut e = PreemphasisEngine::new(n, n);
        e.configure(&filter);
        let zeros = vec![0.0; n];
        let mut seen = vec![false; order];
        for _ in 0..order {
            seen[e.cursor()] = true;
            e.apply(&zeros);
        }
        prop_assert!(seen.iter().all(|s| *s));
        prop_assert_eq!(e.cursor(), 0);
    }

    #[test]
    fn route_is_pure(order in Just((0..16usize).rev().collect::<Vec<_>>()), ch in 0usize..16) {
        let r = ChannelRouter::new(&order, 16, 16).unwrap();
        prop_assert_eq!(r.route(ch), r.route(ch));
        prop_assert_eq!(r.route(ch), Some(15 - ch));
    }
}
