use std::{fmt, sync::Arc};

/// The element-wise nonlinearity applied to the hidden layer.
#[derive(Clone, Default)]
pub enum ActFn {
    #[default]
    Tanh,
    Identity,
    /// `amp / (1 + e^-z)`.
    Sigmoid { amp: f64 },
    /// `top` where the logistic of `z` reaches `thresh`, `bottom` elsewhere.
    Step { top: f64, bottom: f64, thresh: f64 },
    Custom(Arc<dyn Fn(f64) -> f64 + Send + Sync>),
}
use ActFn::*;

impl ActFn {
    pub fn sigmoid(amp: f64) -> Self {
        Sigmoid { amp }
    }

    pub fn step(top: f64, bottom: f64, thresh: f64) -> Self {
        Step { top, bottom, thresh }
    }

    /// Wraps any scalar function as an activation.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        Custom(Arc::new(f))
    }

    pub fn f(&self, z: f64) -> f64 {
        match *self {
            Tanh => z.tanh(),
            Identity => z,
            Sigmoid { amp } => amp * logistic(z),
            Step { top, bottom, thresh } => {
                if logistic(z) >= thresh {
                    top
                } else {
                    bottom
                }
            }
            Custom(ref f) => f(z),
        }
    }
}

fn logistic(z: f64) -> f64 {
    1. / (1. + (-z).exp())
}

impl fmt::Debug for ActFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tanh => f.write_str("Tanh"),
            Identity => f.write_str("Identity"),
            Sigmoid { amp } => f.debug_struct("Sigmoid").field("amp", amp).finish(),
            Step { top, bottom, thresh } => f
                .debug_struct("Step")
                .field("top", top)
                .field("bottom", bottom)
                .field("thresh", thresh)
                .finish(),
            Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_tanh() {
        let act_fn = ActFn::default();
        assert_eq!(act_fn.f(0.5), 0.5_f64.tanh());
        assert_eq!(act_fn.f(-2.0), (-2.0_f64).tanh());
    }

    #[test]
    fn sigmoid_is_scaled() {
        let act_fn = ActFn::sigmoid(2.0);
        assert!((act_fn.f(0.0) - 1.0).abs() < 1e-12);
        assert!(act_fn.f(50.0) <= 2.0);
    }

    #[test]
    fn step_snaps_to_levels() {
        let act_fn = ActFn::step(1.0, -1.0, 0.5);
        assert_eq!(act_fn.f(3.0), 1.0);
        assert_eq!(act_fn.f(0.0), 1.0);
        assert_eq!(act_fn.f(-3.0), -1.0);
    }

    #[test]
    fn custom_is_called() {
        let act_fn = ActFn::custom(|x| 3.0 * x);
        assert_eq!(act_fn.f(2.0), 6.0);
        assert_eq!(format!("{act_fn:?}"), "Custom(..)");
        assert_eq!(format!("{:?}", ActFn::sigmoid(1.)), "Sigmoid { amp: 1.0 }");
    }
}
