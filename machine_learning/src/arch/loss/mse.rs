use ndarray::{Array2, ArrayView2};

use super::LossFn;

/// Mean squared error loss function.
///
/// Participants only hold some rows of a mini-batch, so the mean is taken by the caller
/// once the sums of every participant are reduced.
#[derive(Default, Clone, Copy, Debug)]
pub struct Mse;

impl Mse {
    /// Returns a new `Mse`.
    pub fn new() -> Self {
        Self
    }
}

impl LossFn for Mse {
    fn loss(&self, y_pred: ArrayView2<f64>, y: ArrayView2<f64>) -> f64 {
        (&y_pred - &y).mapv(|x| x.powi(2)).sum()
    }

    fn loss_prime(&self, y_pred: ArrayView2<f64>, y: ArrayView2<f64>, normalizer: f64) -> Array2<f64> {
        if normalizer == 0. {
            return Array2::zeros(y_pred.dim());
        }

        (&y_pred - &y) * (2.0 / normalizer)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn loss_and_prime() {
        let y_pred = array![[1., 2.], [0., 0.]];
        let y = array![[0., 2.], [0., 3.]];

        assert_eq!(Mse.loss(y_pred.view(), y.view()), 10.);
        assert_eq!(
            Mse.loss_prime(y_pred.view(), y.view(), 4.),
            array![[0.5, 0.], [0., -1.5]]
        );
    }
}
