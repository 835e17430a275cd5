//! Vertical placement of significance brackets above grouped data.

/// Fraction of the value range between a group maximum and its bracket.
pub const BRACKET_PAD: f64 = 0.05;
/// Fraction of the value range between two stacked brackets.
pub const BRACKET_STEP: f64 = 0.12;

/// A pair of group positions plus the largest value either group holds.
#[derive(Debug, Clone, Copy)]
pub struct BracketSpan {
    pub a: usize,
    pub b: usize,
    pub local_max: f64,
}

/// Y position for every span, returned in input order.
///
/// Spans are placed narrowest first; each sits `BRACKET_PAD` above its own
/// groups and at least `BRACKET_STEP` above the bracket placed before it.
/// Heights follow the data, so all-negative values give negative brackets.
pub fn bracket_positions(spans: &[BracketSpan], data_min: f64, data_max: f64) -> Vec<f64> {
    let mut range = data_max - data_min;
    if !(range.is_finite() && range > 0.0) {
        range = data_max.abs().max(1.0);
    }
    let pad = range * BRACKET_PAD;
    let step = range * BRACKET_STEP;

    let mut order: Vec<usize> = (0..spans.len()).collect();
    order.sort_by_key(|&i| {
        let s = spans[i];
        (s.b.abs_diff(s.a), s.a.min(s.b))
    });

    let mut ys = vec![0.0; spans.len()];
    let mut prev: Option<f64> = None;
    for i in order {
        let base = spans[i].local_max + pad;
        let y = match prev {
            Some(p) => base.max(p + step),
            None => base,
        };
        ys[i] = y;
        prev = Some(y);
    }
    ys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brackets_clear_their_groups_and_each_other() {
        let spans = [
            BracketSpan { a: 0, b: 1, local_max: 5.0 },
            BracketSpan { a: 0, b: 2, local_max: 9.0 },
            BracketSpan { a: 1, b: 2, local_max: 9.0 },
        ];
        let ys = bracket_positions(&spans, 0.0, 10.0);
        // range 10: pad 0.5, step 1.2; order (0,1), (1,2), (0,2)
        assert!((ys[0] - 5.5).abs() < 1e-12);
        assert!((ys[2] - 9.5).abs() < 1e-12);
        assert!((ys[1] - 10.7).abs() < 1e-12);
        for (s, y) in spans.iter().zip(&ys) {
            assert!(*y > s.local_max);
        }
    }

    #[test]
    fn flat_data_still_gets_a_gap() {
        let spans = [BracketSpan { a: 0, b: 1, local_max: 0.0 }];
        let ys = bracket_positions(&spans, 0.0, 0.0);
        assert!(ys[0] > 0.0);
    }

    #[test]
    fn negative_data_keeps_brackets_above_groups() {
        let spans = [
            BracketSpan { a: 0, b: 1, local_max: -6.5 },
            BracketSpan { a: 0, b: 2, local_max: -4.0 },
            BracketSpan { a: 1, b: 2, local_max: -4.0 },
        ];
        let ys = bracket_positions(&spans, -9.0, -4.0);
        // range 5: pad 0.25, step 0.6
        assert!((ys[0] + 6.25).abs() < 1e-12);
        assert!((ys[2] + 3.75).abs() < 1e-12);
        assert!((ys[1] + 3.15).abs() < 1e-12);
        for (s, y) in spans.iter().zip(&ys) {
            assert!(*y > s.local_max);
            assert!(*y < 0.0);
        }
    }

    #[test]
    fn empty_input() {
        assert!(bracket_positions(&[], 0.0, 1.0).is_empty());
    }
}
