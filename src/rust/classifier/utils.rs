use ndarray::{Array1, Array2, ArrayView1, Axis};

/// Index of the largest score. NaN scores never win; ties keep the first index.
pub(crate) fn argmax(scores: ArrayView1<f32>) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((i, score)),
        }
    }
    best.map(|(i, _)| i)
}

/// Per-column mean and population standard deviation.
pub(crate) fn column_statistics(data: &Array2<f32>) -> (Array1<f32>, Array1<f32>) {
    let rows = data.nrows().max(1) as f32;
    let mean = data.sum_axis(Axis(0)) / rows;
    let centered = data - &mean;
    let var = centered.mapv(|x| x * x).sum_axis(Axis(0)) / rows;
    (mean, var.mapv(f32::sqrt))
}

/// Standardizes columns in place. Zero deviations scale by one so constant columns become zero.
pub(crate) fn standardize(data: &mut Array2<f32>, mean: &Array1<f32>, std: &Array1<f32>) {
    let scale = std.mapv(|s| if s.abs() < 1e-12 { 1.0 } else { s });
    *data -= mean;
    *data /= &scale;
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_argmax_picks_first_maximum() {
        assert_eq!(argmax(array![0.1, 0.7, 0.7, 0.2].view()), Some(1));
        assert_eq!(argmax(array![f32::NAN, -1.0].view()), Some(1));
        assert_eq!(argmax(Array1::<f32>::zeros(0).view()), None);
    }

    #[test]
    fn test_standardize_matches_population_statistics() {
        let mut data = array![[1.0f32, 5.0], [3.0, 5.0]];
        let (mean, std) = column_statistics(&data);
        assert_eq!(mean, array![2.0, 5.0]);
        assert_eq!(std, array![1.0, 0.0]);

        standardize(&mut data, &mean, &std);
        assert_eq!(data, array![[-1.0, 0.0], [1.0, 0.0]]);
    }
}
