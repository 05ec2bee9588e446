//! Cross-checking optimized results against the reference kernels.
//!
//! When `Flag::Cosim` is on, every function applied to host arrays also runs on a
//! duplicate with `Flag::UseOptimized` off. Structural disagreement is an error;
//! numeric disagreement beyond tolerance is logged and kept as a [`CosimReport`].

use linkgrad_core::{
    array::NdArray,
    error::{Error, Result},
};
use std::{cell::RefCell, fmt};

pub const ATOL: f64 = 0.5;
pub const RTOL: f64 = 0.5;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CosimPhase {
    Forward,
    Backward,
}

impl CosimPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Backward => "backward",
        }
    }
}

/// Numeric divergence of one output (or one gradient) position.
#[derive(Clone, Debug, PartialEq)]
pub struct CosimReport {
    pub function: String,
    pub phase: CosimPhase,
    pub position: usize,
    pub mismatched: usize,
    pub total: usize,
    pub max_abs_diff: f64,
}

impl fmt::Display for CosimReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} output {}: {}/{} elements beyond tolerance (max abs diff {})",
            self.function,
            self.phase.as_str(),
            self.position,
            self.mismatched,
            self.total,
            self.max_abs_diff
        )
    }
}

thread_local! {
    static REPORTS: RefCell<Vec<CosimReport>> = const { RefCell::new(Vec::new()) };
}

/// Drains the reports collected on the current thread.
pub fn take_reports() -> Vec<CosimReport> {
    REPORTS.with(|r| std::mem::take(&mut *r.borrow_mut()))
}

#[inline]
pub fn is_close(actual: f64, expected: f64, atol: f64, rtol: f64) -> bool {
    if actual.is_nan() || expected.is_nan() {
        return actual.is_nan() && expected.is_nan();
    }
    (actual - expected).abs() <= atol + rtol * expected.abs()
}

/// Compares `primary` against `reference` position by position.
pub fn verify(function: &str, phase: CosimPhase, primary: &[Option<NdArray>], reference: &[Option<NdArray>]) -> Result<()> {
    let positions = primary.len().max(reference.len());
    for position in 0..positions {
        let a = primary.get(position).and_then(Option::as_ref);
        let b = reference.get(position).and_then(Option::as_ref);
        let (a, b) = match (a, b) {
            (None, None) => continue,
            (Some(a), Some(b)) => (a, b),
            (a, _) => {
                return Err(Error::CosimMismatch {
                    function: function.to_string(),
                    position,
                    msg: format!(
                        "{} {} a value where the reference {}",
                        phase.as_str(),
                        if a.is_some() { "produced" } else { "is missing" },
                        if a.is_some() { "has none" } else { "has one" }
                    ),
                })
            }
        };

        if a.shape() != b.shape() {
            return Err(Error::CosimMismatch {
                function: function.to_string(),
                position,
                msg: format!("shape {:?} differs from reference shape {:?}", a.shape(), b.shape()),
            });
        }

        let (a, b) = (a.to_f64_vec(), b.to_f64_vec());
        let mut mismatched = 0;
        let mut max_abs_diff = 0.0f64;
        for (&x, &y) in a.iter().zip(&b) {
            if !is_close(x, y, ATOL, RTOL) {
                mismatched += 1;
            }
            let diff = (x - y).abs();
            if diff.is_finite() {
                max_abs_diff = max_abs_diff.max(diff);
            }
        }

        if mismatched > 0 {
            let report = CosimReport {
                function: function.to_string(),
                phase,
                position,
                mismatched,
                total: a.len(),
                max_abs_diff,
            };
            log::warn!("cosim divergence: {}", report);
            REPORTS.with(|r| r.borrow_mut().push(report));
        }
    }
    Ok(())
}
