pub mod conjugate_gradient;
pub mod gauss_newton;
