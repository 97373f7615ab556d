use nalgebra::DVector;

/// Everything the driver knows between two iterations.
///
/// Each iterate is an owned value. An update moves the current value into
/// the matching `previous_*` slot and then installs a freshly computed one,
/// so at the start of iteration `k > 0` every `previous_*` field holds what
/// was current at the end of iteration `k - 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationState {
    /// Completed iterations.
    pub iteration: usize,
    pub current_point: DVector<f64>,
    pub previous_point: Option<DVector<f64>>,
    pub current_gradient: DVector<f64>,
    pub previous_gradient: Option<DVector<f64>>,
    /// `None` when the value was not refreshed after the last step.
    pub current_value: Option<f64>,
    pub previous_value: Option<f64>,
    pub current_direction: Option<DVector<f64>>,
    pub previous_direction: Option<DVector<f64>>,
    pub current_step_size: f64,
    pub previous_step_size: f64,
}

impl IterationState {
    /// State before the first iteration.
    pub fn new(point: DVector<f64>, gradient: DVector<f64>, value: f64) -> Self {
        IterationState {
            iteration: 0,
            current_point: point,
            previous_point: None,
            current_gradient: gradient,
            previous_gradient: None,
            current_value: Some(value),
            previous_value: None,
            current_direction: None,
            previous_direction: None,
            current_step_size: 0.0,
            previous_step_size: 0.0,
        }
    }

    pub fn gradient_norm(&self) -> f64 {
        self.current_gradient.norm()
    }
}
