#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sigmoid {
    amp: f64,
}

impl Sigmoid {
    pub fn new(amp: f64) -> Self {
        Self { amp }
    }

    pub fn f(&self, z: f64) -> f64 {
        self.amp / (1. + (-z).exp())
    }

    pub fn df(&self, z: f64) -> f64 {
        let amp = self.amp;

        (amp * (-z).exp()) / ((-z).exp() + 1.).powi(2)
    }
}

impl Default for Sigmoid {
    fn default() -> Self {
        Self::new(1.)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivative_matches_the_closed_form() {
        let s = Sigmoid::default();

        for z in [-3., -0.5, 0., 0.7, 4.] {
            let expected = s.f(z) * (1. - s.f(z));
            assert!((s.df(z) - expected).abs() < 1e-12);
        }
    }
}
