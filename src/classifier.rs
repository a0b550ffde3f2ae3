use crate::category::{Category, NUM_CATEGORIES};
use crate::error::{Error, Result};
use crate::session::{Axis, Session};

/// Result of reducing a session to its dominant motion axis
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub category: Category,
    /// Mean absolute values in category order:
    /// [x, y-, y+, z-, z+, rate x, rate y, rate z]
    pub averages: [f64; NUM_CATEGORIES],
}

/// Pick the category whose motion component dominated the session.
///
/// Ties go to the first (lowest index) category.
pub fn classify(session: &Session) -> Result<Classification> {
    let averages = category_averages(session)?;

    let mut best = 0;
    for (i, avg) in averages.iter().enumerate().skip(1) {
        if *avg > averages[best] {
            best = i;
        }
    }

    let category = Category::ALL[best];
    Ok(Classification { category, averages })
}

/// Eight mean-absolute averages of the session.
///
/// The y and z linear sequences are split into strictly negative and
/// strictly positive halves; an empty half averages to 0. A session with no
/// samples at all is an error rather than a zero.
pub fn category_averages(session: &Session) -> Result<[f64; NUM_CATEGORIES]> {
    if session.is_empty() {
        return Err(Error::EmptySession);
    }

    let y = session.linear(Axis::Y);
    let z = session.linear(Axis::Z);

    Ok([
        mean_abs(session.linear(Axis::X).iter().copied()),
        mean_abs(y.iter().copied().filter(|v| *v < 0.0)),
        mean_abs(y.iter().copied().filter(|v| *v > 0.0)),
        mean_abs(z.iter().copied().filter(|v| *v < 0.0)),
        mean_abs(z.iter().copied().filter(|v| *v > 0.0)),
        mean_abs(session.angular(Axis::X).iter().copied()),
        mean_abs(session.angular(Axis::Y).iter().copied()),
        mean_abs(session.angular(Axis::Z).iter().copied()),
    ])
}

fn mean_abs(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v.abs(), count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_from(linear: [Vec<f64>; 3], angular: [Vec<f64>; 3]) -> Session {
        Session::from_sequences(linear, angular).unwrap()
    }

    #[test]
    fn test_empty_session_is_an_error() {
        assert_eq!(classify(&Session::new()), Err(Error::EmptySession));
        assert_eq!(category_averages(&Session::new()), Err(Error::EmptySession));
    }

    #[test]
    fn test_averages_split_signed_halves() {
        let session = session_from(
            [
                vec![1.0, -3.0],
                vec![-2.0, 4.0],
                vec![0.0, -6.0],
            ],
            [vec![0.5, 0.5], vec![-1.0, 1.0], vec![0.0, 0.2]],
        );
        let averages = category_averages(&session).unwrap();
        assert_eq!(averages, [2.0, 2.0, 4.0, 6.0, 0.0, 0.5, 1.0, 0.1]);
    }

    #[test]
    fn test_zero_values_belong_to_neither_half() {
        let session = session_from(
            [vec![0.0], vec![0.0], vec![0.0]],
            [vec![0.0], vec![0.0], vec![0.0]],
        );
        let classification = classify(&session).unwrap();
        assert_eq!(classification.averages, [0.0; NUM_CATEGORIES]);
        // All equal: first category wins
        assert_eq!(classification.category, Category::Environmental);
    }

    #[test]
    fn test_picks_dominant_axis() {
        let session = session_from(
            [vec![0.1, 0.1], vec![0.2, -0.2], vec![5.0, 7.0]],
            [vec![0.3, 0.3], vec![0.0, 0.0], vec![0.1, 0.1]],
        );
        let classification = classify(&session).unwrap();
        assert_eq!(classification.category, Category::Spiritual);
        assert_eq!(classification.averages[4], 6.0);
    }

    #[test]
    fn test_every_category_can_win() {
        // One dominant component per category, in category order
        let components: [([f64; 3], [f64; 3]); NUM_CATEGORIES] = [
            ([9.0, 0.0, 0.0], [0.0; 3]),
            ([0.0, -9.0, 0.0], [0.0; 3]),
            ([0.0, 9.0, 0.0], [0.0; 3]),
            ([0.0, 0.0, -9.0], [0.0; 3]),
            ([0.0, 0.0, 9.0], [0.0; 3]),
            ([0.0; 3], [9.0, 0.0, 0.0]),
            ([0.0; 3], [0.0, 9.0, 0.0]),
            ([0.0; 3], [0.0, 0.0, 9.0]),
        ];
        for (expected, (linear, angular)) in Category::ALL.iter().zip(components) {
            let mut session = Session::new();
            session.push(linear, angular);
            assert_eq!(classify(&session).unwrap().category, *expected);
        }
    }

    #[test]
    fn test_ties_resolve_to_first() {
        let session = session_from(
            [vec![1.0], vec![-1.0], vec![1.0]],
            [vec![1.0], vec![1.0], vec![1.0]],
        );
        assert_eq!(classify(&session).unwrap().category, Category::Environmental);
    }

    #[test]
    fn test_large_rotation_never_selects_acceleration_category() {
        for seed in 0..20 {
            let n = 5 + seed;
            let small = |k: usize| ((k * 7 + seed) % 11) as f64 / 10.0 - 0.5;
            let large = |k: usize| {
                let sign = if (k + seed) % 3 == 0 { -1.0 } else { 1.0 };
                sign * (50.0 + ((k * 13 + seed) % 17) as f64)
            };

            let linear = [
                (0..n).map(small).collect(),
                (0..n).map(|k| small(k + 1)).collect(),
                (0..n).map(|k| small(k + 2)).collect(),
            ];
            let angular = [
                (0..n).map(large).collect(),
                (0..n).map(|k| large(k + 3)).collect(),
                (0..n).map(|k| large(k + 5)).collect(),
            ];

            let classification = classify(&session_from(linear, angular)).unwrap();
            assert!(
                classification.category.index() >= 5,
                "seed {} selected {:?}",
                seed,
                classification.category
            );
        }
    }
}
