use anyhow::{Result, bail};
use machine_learning::dataset::Dataset;
use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};

/// Generates a classification dataset of gaussian blobs, one per class, with one-hot targets.
///
/// # Arguments
/// * `rows` - The amount of samples.
/// * `features` - The dimension of every sample.
/// * `classes` - The amount of blobs.
/// * `rng` - The source of randomness.
///
/// # Returns
/// A dataset of `features + classes` columns per row.
pub fn blobs<R: Rng + ?Sized>(
    rows: usize,
    features: usize,
    classes: usize,
    rng: &mut R,
) -> Result<Dataset> {
    if classes == 0 {
        bail!("at least one class is required");
    }

    let centers_dist = Uniform::new(-2.0f32, 2.0)?;
    let noise = Normal::new(0.0f32, 0.5)?;

    let centers: Vec<Vec<f32>> = (0..classes)
        .map(|_| (0..features).map(|_| centers_dist.sample(rng)).collect())
        .collect();

    let mut data = Vec::with_capacity(rows * (features + classes));
    for i in 0..rows {
        let class = i % classes;

        data.extend(centers[class].iter().map(|c| c + noise.sample(rng)));
        data.extend((0..classes).map(|k| if k == class { 1. } else { 0. }));
    }

    Ok(Dataset::new(data, features, classes)?)
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn test_shape_and_one_hot_targets() {
        let dataset = blobs(10, 3, 2, &mut StdRng::seed_from_u64(1)).unwrap();

        assert_eq!(dataset.len(), 10);
        for (_, y) in dataset.batches(1) {
            assert_eq!(y.sum(), 1.0);
        }
    }
}
