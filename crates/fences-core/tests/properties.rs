//! Property-based tests for percentiles, fences and predicates.

use fences_core::distribution::{percentile_distribution, Distribution, DistributionQuery, Quartiles};
use fences_core::model::CodeModel;
use fences_core::predicate::{CmpOp, Predicate};
use fences_core::stats::{percentile_cont, sort_values};
use fences_core::store::ModelStore;
use fences_core::threshold::{compute_thresholds, fences_for, Fences};
use fences_core::types::{Direction, EntityVariant};
use proptest::prelude::*;

fn sorted(values: &[u32]) -> Vec<f64> {
    let mut v: Vec<f64> = values.iter().map(|&x| f64::from(x)).collect();
    sort_values(&mut v);
    v
}

fn quartiles_strategy() -> impl Strategy<Value = Quartiles> {
    (0u32..10_000, 0u32..10_000, 0u32..10_000).prop_map(|(a, b, c)| {
        let mut v = [f64::from(a) / 4.0, f64::from(b) / 4.0, f64::from(c) / 4.0];
        v.sort_by(f64::total_cmp);
        Quartiles::new(v[0], v[1], v[2])
    })
}

fn op_strategy() -> impl Strategy<Value = CmpOp> {
    prop_oneof![
        Just(CmpOp::Eq),
        Just(CmpOp::Ne),
        Just(CmpOp::Lt),
        Just(CmpOp::Le),
        Just(CmpOp::Gt),
        Just(CmpOp::Ge),
    ]
}

proptest! {
    // ========================
    // Percentile Properties
    // ========================

    #[test]
    fn percentile_within_range(values in prop::collection::vec(0u32..10_000, 1..60), pct in 0.0f64..=1.0) {
        let v = sorted(&values);
        let p = percentile_cont(&v, pct).unwrap();
        prop_assert!(p >= v[0] && p <= v[v.len() - 1], "{} outside [{}, {}]", p, v[0], v[v.len() - 1]);
    }

    #[test]
    fn quartiles_are_ordered(values in prop::collection::vec(0u32..10_000, 1..60)) {
        let v = sorted(&values);
        let q1 = percentile_cont(&v, 0.25).unwrap();
        let med = percentile_cont(&v, 0.5).unwrap();
        let q3 = percentile_cont(&v, 0.75).unwrap();
        prop_assert!(q1 <= med && med <= q3);
    }

    #[test]
    fn constant_sample_has_constant_quartiles(value in 0u32..10_000, n in 1usize..40) {
        let v = sorted(&vec![value; n]);
        for pct in [0.25, 0.5, 0.75] {
            prop_assert_eq!(percentile_cont(&v, pct), Some(f64::from(value)));
        }
    }

    // ========================
    // Fence Properties
    // ========================

    #[test]
    fn high_fences_above_q3(q in quartiles_strategy()) {
        let set = fences_for(&q, Direction::HighIsBad);
        let Fences::High { high, very_high } = set.fences else {
            return Err(TestCaseError::fail("expected high fences"));
        };
        prop_assert!(q.q3 <= high && high <= very_high);
        prop_assert_eq!(high, q.q3 + 1.5 * q.iqr());
        prop_assert_eq!(very_high, q.q3 + 3.0 * q.iqr());
    }

    #[test]
    fn low_fences_clamped_and_ordered(q in quartiles_strategy()) {
        let set = fences_for(&q, Direction::LowIsBad);
        let Fences::Low { low, very_low } = set.fences else {
            return Err(TestCaseError::fail("expected low fences"));
        };
        prop_assert!(very_low >= 0.0);
        prop_assert!(very_low <= low && low <= q.q1);
        prop_assert_eq!(low, (q.q1 - 1.5 * q.iqr()).max(0.0));
    }

    #[test]
    fn engine_is_deterministic(q in quartiles_strategy(), low in any::<bool>()) {
        let direction = if low { Direction::LowIsBad } else { Direction::HighIsBad };
        let d = Distribution::Quartiles(q);
        let a = compute_thresholds(&d, direction);
        let b = compute_thresholds(&d, direction);
        let bits = |o: &fences_core::threshold::ThresholdOutcome| {
            o.thresholds().map(|s| s.columns().map(|(_, v)| v.to_bits()))
        };
        prop_assert_eq!(bits(&a), bits(&b));
        prop_assert_eq!(a.direction(), direction);
    }

    // ========================
    // Store Properties
    // ========================

    #[test]
    fn store_matches_direct_percentiles(values in prop::collection::vec(0u32..500, 0..40)) {
        let mut model = CodeModel::new();
        let app = model.create_application("app");
        for (i, v) in values.iter().enumerate() {
            let c = model.create_class(&format!("C{i}"), app).unwrap();
            model.attach_metric(c, "number_of_methods", *v).unwrap();
        }
        let store = ModelStore::new(&model);
        let query = DistributionQuery::new(EntityVariant::Class, "number_of_methods", Predicate::Always);

        let d = percentile_distribution(&store, &query).unwrap();
        prop_assert_eq!(store.open_sessions(), 0);
        if values.is_empty() {
            prop_assert_eq!(d, Distribution::NoData);
        } else {
            let v = sorted(&values);
            let expected = Quartiles::new(
                percentile_cont(&v, 0.25).unwrap(),
                percentile_cont(&v, 0.5).unwrap(),
                percentile_cont(&v, 0.75).unwrap(),
            );
            prop_assert_eq!(d, Distribution::Quartiles(expected));
        }
    }

    // ========================
    // Predicate Properties
    // ========================

    #[test]
    fn comparison_renders_and_reparses(op in op_strategy(), value in 0u32..1000, negate in any::<bool>()) {
        let mut p = Predicate::compare("number_of_lines", op, f64::from(value));
        if negate {
            p = p.negate();
        }
        let reparsed = Predicate::parse(&p.to_string()).unwrap();
        prop_assert_eq!(reparsed, p);
    }
}
