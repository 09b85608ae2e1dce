use ndarray::{Array2, ArrayView2};

pub trait LossFn {
    /// Returns the unnormalized loss of the local rows.
    fn loss(&self, y_pred: ArrayView2<f64>, y: ArrayView2<f64>) -> f64;

    /// Returns the gradient of `loss / normalizer` with respect to `y_pred`.
    fn loss_prime(&self, y_pred: ArrayView2<f64>, y: ArrayView2<f64>, normalizer: f64) -> Array2<f64>;
}
