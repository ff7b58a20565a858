use super::bucket::{bucket, bucket_labels, other_label};
use super::frequency::{aggregate, percentage};
use serde::Serialize;

/// Dense contingency table between two bucketed categorical variables.
///
/// Row and column order follow the bucketed frequency order of each side. Every
/// cell is present, zeros included, and the cells sum to the number of complete
/// pairs that went in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossTab {
    rows: Vec<String>,
    cols: Vec<String>,
    cells: Vec<Vec<usize>>,
    source_rows: usize,
    source_cols: usize,
    row_other: Option<String>,
    col_other: Option<String>,
}

/// One joint cell of a [`CrossTab`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cell {
    pub row: String,
    pub col: String,
    pub count: usize,
}

/// Collapses the spellings of yes/no answers the form produced over time.
pub fn normalize_answer(answer: &str) -> String {
    match answer.trim() {
        "si" | "Si" | "SI" | "sí" | "SÍ" => "Sí".to_string(),
        "no" | "NO" => "No".to_string(),
        other => other.to_string(),
    }
}

/// Builds a cross-tabulation from paired answers.
///
/// Pairs with either side missing are dropped first. Each side is then bucketed
/// on its own: `n_a` categories for rows and `n_b` for columns, the remainder
/// going to the synthetic "Otros" bucket.
pub fn cross_tab<I>(pairs: I, n_a: usize, n_b: usize) -> CrossTab
where
    I: IntoIterator<Item = (Option<String>, Option<String>)>,
{
    let (left, right): (Vec<String>, Vec<String>) = pairs
        .into_iter()
        .filter_map(|(a, b)| Some((a?, b?)))
        .unzip();

    let counts_a = aggregate(&left);
    let counts_b = aggregate(&right);
    let bucketed_a = bucket(&counts_a, n_a);
    let bucketed_b = bucket(&counts_b, n_b);

    let rows: Vec<String> = bucketed_a.labels().map(str::to_string).collect();
    let cols: Vec<String> = bucketed_b.labels().map(str::to_string).collect();
    let mut cells = vec![vec![0usize; cols.len()]; rows.len()];

    let mapped_a = bucket_labels(&left, &counts_a, n_a);
    let mapped_b = bucket_labels(&right, &counts_b, n_b);
    for (a, b) in mapped_a.iter().zip(mapped_b.iter()) {
        let r = rows.iter().position(|x| x == a);
        let c = cols.iter().position(|x| x == b);
        if let (Some(r), Some(c)) = (r, c) {
            cells[r][c] += 1;
        }
    }

    let row_other = (bucketed_a.len() < counts_a.len()).then(|| other_label(&counts_a));
    let col_other = (bucketed_b.len() < counts_b.len()).then(|| other_label(&counts_b));

    CrossTab {
        rows,
        cols,
        cells,
        source_rows: counts_a.len(),
        source_cols: counts_b.len(),
        row_other,
        col_other,
    }
}

impl CrossTab {
    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    pub fn cols(&self) -> &[String] {
        &self.cols
    }

    pub fn cells(&self) -> &[Vec<usize>] {
        &self.cells
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn count(&self, row: &str, col: &str) -> usize {
        let r = self.rows.iter().position(|x| x == row);
        let c = self.cols.iter().position(|x| x == col);
        match (r, c) {
            (Some(r), Some(c)) => self.cells[r][c],
            _ => 0,
        }
    }

    /// Number of complete pairs tabulated.
    pub fn total(&self) -> usize {
        self.cells.iter().flatten().sum()
    }

    pub fn row_totals(&self) -> Vec<usize> {
        self.cells.iter().map(|row| row.iter().sum()).collect()
    }

    pub fn col_totals(&self) -> Vec<usize> {
        (0..self.cols.len())
            .map(|c| self.cells.iter().map(|row| row[c]).sum())
            .collect()
    }

    /// Joint cells with a non-zero count.
    pub fn non_zero(&self) -> usize {
        self.cells.iter().flatten().filter(|c| **c > 0).count()
    }

    /// The `k` largest non-zero cells, largest first. Ties keep row-major order.
    pub fn top_cells(&self, k: usize) -> Vec<Cell> {
        let mut all: Vec<Cell> = Vec::new();
        for (r, row) in self.cells.iter().enumerate() {
            for (c, &count) in row.iter().enumerate() {
                if count > 0 {
                    all.push(Cell {
                        row: self.rows[r].clone(),
                        col: self.cols[c].clone(),
                        count,
                    });
                }
            }
        }
        all.sort_by(|a, b| b.count.cmp(&a.count));
        all.truncate(k);
        all
    }

    /// Summary of the strongest association and of the grouping applied.
    pub fn insights(&self) -> Option<Insights> {
        let total = self.total();
        let top = self.top_cells(1).into_iter().next()?;
        let row_totals = self.row_totals();
        let col_totals = self.col_totals();

        let grouped_rows = self.row_other.as_ref().and_then(|label| {
            let idx = self.rows.iter().position(|r| r == label)?;
            Some(Grouping {
                categories: self.source_rows + 1 - self.rows.len(),
                cases: row_totals[idx],
            })
        });
        let grouped_cols = self.col_other.as_ref().and_then(|label| {
            let idx = self.cols.iter().position(|c| c == label)?;
            Some(Grouping {
                categories: self.source_cols + 1 - self.cols.len(),
                cases: col_totals[idx],
            })
        });

        Some(Insights {
            share: percentage(top.count, total),
            top,
            total,
            combinations: self.non_zero(),
            shown_rows: self.rows.len(),
            source_rows: self.source_rows,
            shown_cols: self.cols.len(),
            source_cols: self.source_cols,
            grouped_rows,
            grouped_cols,
        })
    }
}

/// How many source categories of one side ended up in the remainder bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Grouping {
    pub categories: usize,
    pub cases: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insights {
    pub top: Cell,
    pub share: f64,
    pub total: usize,
    pub combinations: usize,
    pub shown_rows: usize,
    pub source_rows: usize,
    pub shown_cols: usize,
    pub source_cols: usize,
    pub grouped_rows: Option<Grouping>,
    pub grouped_cols: Option<Grouping>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(a: Option<&str>, b: Option<&str>) -> (Option<String>, Option<String>) {
        (a.map(String::from), b.map(String::from))
    }

    #[test]
    fn test_incomplete_pairs_are_dropped() {
        let tab = cross_tab(
            vec![
                pair(Some("A"), Some("Sí")),
                pair(None, Some("No")),
                pair(Some("B"), None),
                pair(Some("A"), Some("No")),
            ],
            6,
            6,
        );
        assert_eq!(tab.total(), 2);
        assert_eq!(tab.rows(), &["A".to_string()]);
        assert_eq!(tab.cols(), &["Sí".to_string(), "No".to_string()]);
        assert_eq!(tab.count("A", "No"), 1);
        assert_eq!(tab.count("B", "No"), 0);
    }

    #[test]
    fn test_dense_table_sums_to_complete_pairs() {
        let data = [
            ("x", "1"),
            ("x", "1"),
            ("y", "2"),
            ("z", "3"),
            ("w", "1"),
            ("x", "2"),
        ];
        let tab = cross_tab(
            data.iter().map(|(a, b)| pair(Some(a), Some(b))),
            2,
            6,
        );
        assert_eq!(tab.rows(), &["x", "y", "Otros"].map(String::from));
        assert_eq!(tab.cells().len(), 3);
        assert!(tab.cells().iter().all(|r| r.len() == 3));
        assert_eq!(tab.total(), data.len());
        assert_eq!(tab.count("Otros", "1"), 1);
        assert_eq!(tab.count("Otros", "3"), 1);
    }

    #[test]
    fn test_top_cells_and_insights() {
        let data = [("a", "s"), ("a", "s"), ("a", "n"), ("b", "n"), ("c", "s"), ("d", "s")];
        let tab = cross_tab(data.iter().map(|(a, b)| pair(Some(a), Some(b))), 2, 6);

        let top = tab.top_cells(2);
        assert_eq!(top[0], Cell { row: "a".into(), col: "s".into(), count: 2 });
        assert_eq!(top.len(), 2);

        let insights = tab.insights().unwrap();
        assert_eq!(insights.total, 6);
        assert!((insights.share - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(insights.source_rows, 4);
        assert_eq!(insights.shown_rows, 3);
        assert_eq!(insights.grouped_rows, Some(Grouping { categories: 2, cases: 2 }));
        assert_eq!(insights.grouped_cols, None);
    }

    #[test]
    fn test_empty_input() {
        let tab = cross_tab(vec![pair(None, Some("x"))], 6, 6);
        assert!(tab.is_empty());
        assert!(tab.top_cells(8).is_empty());
        assert!(tab.insights().is_none());
    }

    #[test]
    fn test_normalize_answer() {
        assert_eq!(normalize_answer("si"), "Sí");
        assert_eq!(normalize_answer(" SI "), "Sí");
        assert_eq!(normalize_answer("NO"), "No");
        assert_eq!(normalize_answer("Tal vez"), "Tal vez");
    }
}
