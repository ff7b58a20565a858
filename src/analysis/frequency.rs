use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Ordered `(label, count)` list: descending count, ties in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryCount {
    entries: Vec<(String, usize)>,
}

impl CategoryCount {
    /// Wraps entries that are already in the order they should be reported.
    pub fn from_entries(entries: Vec<(String, usize)>) -> Self {
        CategoryCount { entries }
    }

    pub fn entries(&self) -> &[(String, usize)] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<(String, usize)> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> usize {
        self.entries.iter().map(|(_, c)| c).sum()
    }

    pub fn get(&self, label: &str) -> Option<usize> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, c)| *c)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(l, _)| l.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(l, c)| (l.as_str(), *c))
    }
}

/// Counts tokens exactly (case-sensitive) and orders them by frequency.
pub fn aggregate<I, S>(tokens: I) -> CategoryCount
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut entries: Vec<(String, usize)> = Vec::new();

    for token in tokens {
        let token = token.as_ref();
        match index.get(token) {
            Some(&pos) => entries[pos].1 += 1,
            None => {
                index.insert(token.to_string(), entries.len());
                entries.push((token.to_string(), 1));
            }
        }
    }

    // Stable sort keeps first-seen order among equal counts.
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    CategoryCount { entries }
}

/// Share of `count` in `total`, in percent. Zero when `total` is zero.
pub fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * count as f64 / total as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    Critical,
    High,
    Medium,
    Low,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Critical, Tier::High, Tier::Medium, Tier::Low];

    /// Label for severity-style profiles (problems).
    pub fn severity_label(&self) -> &'static str {
        match self {
            Tier::Critical => "Crítico",
            Tier::High => "Alto",
            Tier::Medium => "Medio",
            Tier::Low => "Bajo",
        }
    }

    /// Label for priority-style profiles (needs).
    pub fn priority_label(&self) -> &'static str {
        match self {
            Tier::Critical => "Crítica",
            Tier::High => "Alta",
            Tier::Medium => "Media",
            Tier::Low => "Baja",
        }
    }

    /// CSS class used by the report tables.
    pub fn css_class(&self) -> &'static str {
        match self {
            Tier::Critical => "tier-critical",
            Tier::High => "tier-high",
            Tier::Medium => "tier-medium",
            Tier::Low => "tier-low",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.severity_label())
    }
}

/// Whether a profile's tiers read as severities or as priorities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TierScale {
    Severity,
    Priority,
}

/// Ordered list of `(minimum percentage, tier)` pairs.
///
/// Always kept sorted from the highest minimum to the lowest, so classification
/// is a first-match scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    scale: TierScale,
    levels: Vec<(f64, Tier)>,
}

impl Thresholds {
    pub fn new(scale: TierScale, mut levels: Vec<(f64, Tier)>) -> Self {
        levels.sort_by(|a, b| b.0.total_cmp(&a.0));
        Thresholds { scale, levels }
    }

    /// Problem severity: 15 % critical, 8 % high, 3 % medium, otherwise low.
    pub fn severity() -> Self {
        Thresholds::new(
            TierScale::Severity,
            vec![
                (15.0, Tier::Critical),
                (8.0, Tier::High),
                (3.0, Tier::Medium),
                (0.0, Tier::Low),
            ],
        )
    }

    /// Need priority: 10 % high, 3 % medium, otherwise low.
    pub fn priority() -> Self {
        Thresholds::new(
            TierScale::Priority,
            vec![(10.0, Tier::High), (3.0, Tier::Medium), (0.0, Tier::Low)],
        )
    }

    pub fn scale(&self) -> TierScale {
        self.scale
    }

    pub fn levels(&self) -> &[(f64, Tier)] {
        &self.levels
    }

    /// Tiers this profile can produce, highest first.
    pub fn tiers(&self) -> Vec<Tier> {
        self.levels.iter().map(|(_, t)| *t).collect()
    }

    pub fn label(&self, tier: Tier) -> &'static str {
        match self.scale {
            TierScale::Severity => tier.severity_label(),
            TierScale::Priority => tier.priority_label(),
        }
    }
}

/// Classifies a category by its share of the total.
///
/// `total` must be positive; a zero total has no meaningful share and yields
/// `None`. A share below every minimum also yields `None`.
pub fn classify(count: usize, total: usize, thresholds: &Thresholds) -> Option<Tier> {
    debug_assert!(total > 0, "classify called with an empty total");
    if total == 0 {
        return None;
    }
    let pct = percentage(count, total);
    thresholds
        .levels
        .iter()
        .find(|(min, _)| pct >= *min)
        .map(|(_, tier)| *tier)
}

/// Number of categories falling in each tier of `thresholds`, highest tier first.
pub fn tier_summary(counts: &CategoryCount, thresholds: &Thresholds) -> Vec<(Tier, usize)> {
    let total = counts.total();
    let mut summary: Vec<(Tier, usize)> = thresholds.tiers().into_iter().map(|t| (t, 0)).collect();
    if total == 0 {
        return summary;
    }
    for (_, count) in counts.iter() {
        if let Some(tier) = classify(count, total, thresholds) {
            if let Some(slot) = summary.iter_mut().find(|(t, _)| *t == tier) {
                slot.1 += 1;
            }
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_aggregate_orders_by_count_then_first_seen() {
        let counts = aggregate(["b", "a", "c", "a", "c", "d"]);
        assert_eq!(
            counts.entries(),
            &[
                ("a".to_string(), 2),
                ("c".to_string(), 2),
                ("b".to_string(), 1),
                ("d".to_string(), 1)
            ]
        );
        assert_eq!(counts.total(), 6);
    }

    #[test]
    fn test_aggregate_is_case_sensitive() {
        let counts = aggregate(["Agua", "agua"]);
        assert_eq!(counts.len(), 2);
        assert!(aggregate(Vec::<String>::new()).is_empty());
    }

    #[rstest]
    #[case(20, 100, Some(Tier::Critical))]
    #[case(15, 100, Some(Tier::Critical))]
    #[case(10, 100, Some(Tier::High))]
    #[case(3, 100, Some(Tier::Medium))]
    #[case(1, 100, Some(Tier::Low))]
    #[case(0, 100, Some(Tier::Low))]
    fn test_classify_severity(
        #[case] count: usize,
        #[case] total: usize,
        #[case] expected: Option<Tier>,
    ) {
        assert_eq!(classify(count, total, &Thresholds::severity()), expected);
    }

    #[rstest]
    #[case(10, 100, Some(Tier::High))]
    #[case(9, 100, Some(Tier::Medium))]
    #[case(2, 100, Some(Tier::Low))]
    fn test_classify_priority(
        #[case] count: usize,
        #[case] total: usize,
        #[case] expected: Option<Tier>,
    ) {
        assert_eq!(classify(count, total, &Thresholds::priority()), expected);
    }

    #[test]
    fn test_thresholds_are_sorted_on_construction() {
        let t = Thresholds::new(
            TierScale::Severity,
            vec![(0.0, Tier::Low), (50.0, Tier::Critical), (5.0, Tier::Medium)],
        );
        assert_eq!(t.tiers(), vec![Tier::Critical, Tier::Medium, Tier::Low]);
        assert_eq!(classify(6, 100, &t), Some(Tier::Medium));
    }

    #[test]
    fn test_share_below_every_minimum_is_unclassified() {
        let t = Thresholds::new(TierScale::Priority, vec![(10.0, Tier::High)]);
        assert_eq!(classify(1, 100, &t), None);
    }

    #[test]
    fn test_tier_summary() {
        let counts = CategoryCount::from_entries(vec![
            ("a".into(), 20),
            ("b".into(), 70),
            ("c".into(), 8),
            ("d".into(), 2),
        ]);
        let summary = tier_summary(&counts, &Thresholds::severity());
        assert_eq!(
            summary,
            vec![
                (Tier::Critical, 2),
                (Tier::High, 1),
                (Tier::Medium, 0),
                (Tier::Low, 1)
            ]
        );
        assert_eq!(Thresholds::priority().label(Tier::High), "Alta");
    }

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(1, 4), 25.0);
        assert_eq!(percentage(3, 0), 0.0);
    }
}
