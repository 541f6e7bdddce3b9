use crate::types::{Band, FetchError, FetchResult};
use ndarray::{Array2, Zip};
use num_traits::Float;

/// Per-pixel normalized difference `(a - b) / (a + b)`.
///
/// NaN is produced wherever the denominator is zero and propagates
/// from either input. Inputs are not mutated.
pub fn normalized_difference<F: Float>(a: &Array2<F>, b: &Array2<F>) -> FetchResult<Array2<F>> {
    if a.dim() != b.dim() {
        return Err(FetchError::Processing(format!(
            "band shapes differ: {:?} vs {:?}",
            a.dim(),
            b.dim()
        )));
    }

    log::debug!("Computing normalized difference over {:?} pixels", a.dim());

    let mut out = Array2::from_elem(a.dim(), F::zero());
    Zip::from(&mut out).and(a).and(b).for_each(|o, &x, &y| {
        let sum = x + y;
        *o = if sum == F::zero() {
            F::nan()
        } else {
            (x - y) / sum
        };
    });

    Ok(out)
}

/// Normalized difference vegetation index from near-infrared and red
/// reflectance bands
pub fn ndvi(nir: &Band, red: &Band) -> FetchResult<Band> {
    normalized_difference(nir, red)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_normalized_difference_values() {
        let a = array![[3.0_f32, 1.0], [0.5, 2.0]];
        let b = array![[1.0_f32, 3.0], [0.5, 0.0]];
        let out = normalized_difference(&a, &b).unwrap();

        assert_relative_eq!(out[[0, 0]], 0.5);
        assert_relative_eq!(out[[0, 1]], -0.5);
        assert_relative_eq!(out[[1, 0]], 0.0);
        assert_relative_eq!(out[[1, 1]], 1.0);
    }

    #[test]
    fn test_zero_denominator_is_nan() {
        let a = array![[0.0_f32, 2.0]];
        let b = array![[0.0_f32, -2.0]];
        let out = normalized_difference(&a, &b).unwrap();
        assert!(out[[0, 0]].is_nan());
        assert!(out[[0, 1]].is_nan());
    }

    #[test]
    fn test_nan_propagates_from_inputs() {
        let a = array![[f32::NAN, 1.0]];
        let b = array![[1.0_f32, 1.0]];
        let out = normalized_difference(&a, &b).unwrap();
        assert!(out[[0, 0]].is_nan());
        assert!(!out[[0, 1]].is_nan());
    }

    #[test]
    fn test_antisymmetry() {
        let a = array![[3.0_f32, 1.0, 8.0], [0.25, 2.0, 5.0]];
        let b = array![[1.0_f32, 3.0, 2.0], [0.75, 6.0, 5.0]];

        let ab = normalized_difference(&a, &b).unwrap();
        let ba = normalized_difference(&b, &a).unwrap();

        for (x, y) in ab.iter().zip(ba.iter()) {
            assert_relative_eq!(*x, -y);
        }
    }

    #[test]
    fn test_shape_mismatch_is_error() {
        let a = Band::zeros((2, 2));
        let b = Band::zeros((2, 3));
        assert!(normalized_difference(&a, &b).is_err());
    }

    #[test]
    fn test_inputs_not_mutated() {
        let a = array![[3.0_f32, 1.0]];
        let b = array![[1.0_f32, 3.0]];
        let (a0, b0) = (a.clone(), b.clone());
        let _ = normalized_difference(&a, &b).unwrap();
        assert_eq!(a, a0);
        assert_eq!(b, b0);
    }

    #[test]
    fn test_ndvi_range() {
        // NDVI of non-negative reflectances stays within [-1, 1]
        let nir = array![[0.8_f32, 0.1, 0.4]];
        let red = array![[0.1_f32, 0.8, 0.4]];
        let out = ndvi(&nir, &red).unwrap();
        for v in out.iter() {
            assert!(*v >= -1.0 && *v <= 1.0);
        }
    }
}
