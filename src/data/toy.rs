use rand::Rng;

/// One `(input, target)` pair.
pub type Sample = (Vec<f64>, Vec<f64>);

/// Noisy samples of `y = x·weights + bias` with inputs uniform in [-1, 1).
///
/// `noise` is the half-width of the uniform noise added to each target.
pub fn linear_samples(n: usize, weights: &[f64], bias: f64, noise: f64) -> Vec<Sample> {
    let mut rng = rand::thread_rng();
    (0..n)
        .map(|_| {
            let x: Vec<f64> = weights.iter().map(|_| rng.gen::<f64>() * 2.0 - 1.0).collect();
            let clean: f64 = x.iter().zip(weights).map(|(xi, wi)| xi * wi).sum::<f64>() + bias;
            let jitter = if noise > 0.0 { rng.gen_range(-noise..noise) } else { 0.0 };
            (x, vec![clean + jitter])
        })
        .collect()
}

/// Splits samples in order into train / valid / test parts.
///
/// Percentages are of the total and rounded down; everything not claimed
/// by valid or test goes to train.
pub fn split_samples(
    samples: Vec<Sample>,
    valid_pct: u8,
    test_pct: u8,
) -> (Vec<Sample>, Vec<Sample>, Vec<Sample>) {
    let total = samples.len();
    let valid_n = total * valid_pct as usize / 100;
    let test_n = total * test_pct as usize / 100;
    let train_n = total.saturating_sub(valid_n + test_n);

    let mut train = samples;
    let mut valid = train.split_off(train_n);
    let test = valid.split_off(valid_n.min(valid.len()));
    (train, valid, test)
}
