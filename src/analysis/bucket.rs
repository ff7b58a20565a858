use super::frequency::CategoryCount;
use std::collections::HashSet;

/// Label of the synthetic remainder bucket.
pub const OTHER_LABEL: &str = "Otros";
/// Remainder label used when the data already has a category called [`OTHER_LABEL`].
pub const OTHER_LABEL_GROUPED: &str = "Otros (agrupados)";

/// Keeps the `n` largest categories and folds the rest into one remainder entry.
///
/// Categories are kept in their existing order. The total count is preserved.
/// `n == 0` behaves like `n == 1`.
pub fn bucket(counts: &CategoryCount, n: usize) -> CategoryCount {
    let n = n.max(1);
    if counts.len() <= n {
        return counts.clone();
    }

    let entries = counts.entries();
    let (kept, rest) = entries.split_at(n);
    let remainder: usize = rest.iter().map(|(_, c)| c).sum();

    let mut bucketed = kept.to_vec();
    bucketed.push((other_label(counts), remainder));
    CategoryCount::from_entries(bucketed)
}

/// Name of the remainder bucket for `counts`.
///
/// The first of `Otros`, `Otros (agrupados)`, `Otros (agrupados 2)`, ... that is
/// not already a source category.
pub fn other_label(counts: &CategoryCount) -> String {
    let taken = |label: &str| counts.labels().any(|l| l == label);
    if !taken(OTHER_LABEL) {
        return OTHER_LABEL.to_string();
    }
    if !taken(OTHER_LABEL_GROUPED) {
        return OTHER_LABEL_GROUPED.to_string();
    }
    (2..)
        .map(|i| format!("Otros (agrupados {})", i))
        .find(|label| !taken(label.as_str()))
        .unwrap_or_default()
}

/// Maps every value of a series to itself when it is among the `n` most frequent
/// values, or to the remainder label otherwise.
///
/// Uses the same ordering and collision rule as [`bucket`], so the mapped series
/// aggregates to exactly `bucket(aggregate(values), n)` in mass.
pub fn bucket_labels(values: &[String], counts: &CategoryCount, n: usize) -> Vec<String> {
    let n = n.max(1);
    if counts.len() <= n {
        return values.to_vec();
    }
    let kept: HashSet<&str> = counts.labels().take(n).collect();
    let other = other_label(counts);
    values
        .iter()
        .map(|v| {
            if kept.contains(v.as_str()) {
                v.clone()
            } else {
                other.clone()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::frequency::aggregate;

    fn counts(entries: &[(&str, usize)]) -> CategoryCount {
        CategoryCount::from_entries(entries.iter().map(|(l, c)| (l.to_string(), *c)).collect())
    }

    #[test]
    fn test_small_input_is_unchanged() {
        let c = counts(&[("a", 3), ("b", 1)]);
        assert_eq!(bucket(&c, 2), c);
        assert_eq!(bucket(&c, 5), c);
        assert!(bucket(&CategoryCount::default(), 3).is_empty());
    }

    #[test]
    fn test_bucket_folds_tail_into_otros() {
        let c = counts(&[("a", 5), ("b", 4), ("c", 2), ("d", 1)]);
        let b = bucket(&c, 2);
        assert_eq!(
            b.entries(),
            &[
                ("a".to_string(), 5),
                ("b".to_string(), 4),
                ("Otros".to_string(), 3)
            ]
        );
    }

    #[test]
    fn test_bucket_preserves_mass_for_every_n() {
        let c = counts(&[("a", 9), ("b", 7), ("c", 7), ("d", 3), ("e", 1)]);
        for n in 0..8 {
            let b = bucket(&c, n);
            assert_eq!(b.total(), c.total(), "n = {}", n);
            assert!(b.len() <= n.max(1) + 1);
        }
        assert_eq!(bucket(&c, 0).len(), 2);
    }

    #[test]
    fn test_existing_otros_category_is_not_merged() {
        let c = counts(&[("a", 5), ("Otros", 4), ("c", 2), ("d", 1)]);
        let b = bucket(&c, 2);
        assert_eq!(b.get("Otros"), Some(4));
        assert_eq!(b.get(OTHER_LABEL_GROUPED), Some(3));

        let tail = counts(&[("a", 5), ("b", 4), ("Otros", 1)]);
        assert_eq!(bucket(&tail, 2).get(OTHER_LABEL_GROUPED), Some(1));
    }

    #[test]
    fn test_bucket_labels_matches_bucket() {
        let values: Vec<String> = ["x", "y", "x", "z", "w", "x", "y"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let c = aggregate(&values);
        let mapped = bucket_labels(&values, &c, 2);
        assert_eq!(aggregate(&mapped), bucket(&c, 2));
        assert_eq!(mapped[3], "Otros");
    }

    #[test]
    fn test_remainder_label_skips_every_existing_label() {
        let c = counts(&[("Otros (agrupados)", 5), ("Otros", 4), ("c", 2), ("d", 1)]);
        let b = bucket(&c, 2);
        assert_eq!(
            b.entries(),
            &[
                ("Otros (agrupados)".to_string(), 5),
                ("Otros".to_string(), 4),
                ("Otros (agrupados 2)".to_string(), 3)
            ]
        );
        assert_eq!(b.total(), c.total());

        let values: Vec<String> = ["Otros", "Otros (agrupados)", "c"].iter().map(|s| s.to_string()).collect();
        let c = aggregate(&values);
        let mapped = bucket_labels(&values, &c, 1);
        assert_eq!(mapped.iter().filter(|v| *v == "Otros (agrupados 2)").count(), 2);
    }
}
