use linkgrad_core::{
    array::NdArray,
    error::{Error, Result},
};
use linkgrad_graph::{apply, Function, Input, TypeInfoTuple, Variable};
use rand::Rng;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Zeroes each element with probability `ratio` and scales the survivors by
/// `1 / (1 - ratio)`.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Dropout {
    ratio: f64,

    #[cfg_attr(feature = "serde", serde(skip))]
    mask: Option<NdArray>,
}

impl Dropout {
    pub fn new(ratio: f64) -> Result<Self> {
        if !(0.0..1.0).contains(&ratio) {
            return Err(Error::InvalidArgument(format!(
                "dropout ratio must be in [0, 1), got {}",
                ratio
            )));
        }
        Ok(Self { ratio, mask: None })
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    fn make_mask(&self, x: &NdArray) -> Result<NdArray> {
        let scale = 1.0 / (1.0 - self.ratio);
        let mut rng = rand::thread_rng();
        let values: Vec<f64> = (0..x.size())
            .map(|_| if rng.gen::<f64>() < self.ratio { 0.0 } else { scale })
            .collect();
        Ok(NdArray::from_f64_vec(&values, x.shape(), x.dtype())?.with_device(x.device()))
    }
}

impl Function for Dropout {
    fn check_type_forward(&self, in_types: &TypeInfoTuple) -> Result<()> {
        in_types.expect_size(1)?;
        in_types.arg(0)?.expect_float()
    }

    fn forward_cpu(&mut self, inputs: &[NdArray]) -> Result<Vec<NdArray>> {
        let x = inputs
            .first()
            .ok_or_else(|| Error::InvalidArgument("Dropout expects one input".into()))?;
        let mask = self.make_mask(x)?;
        let y = x.mul(&mask)?;
        self.mask = Some(mask);
        Ok(vec![y])
    }

    fn forward_accel(&mut self, inputs: &[NdArray]) -> Result<Vec<NdArray>> {
        self.forward_cpu(inputs)
    }

    fn backward_cpu(&mut self, _inputs: &[NdArray], grad_outputs: &[Option<NdArray>]) -> Result<Vec<Option<NdArray>>> {
        let Some(gy) = &grad_outputs[0] else {
            return Ok(vec![None]);
        };
        let mask = self
            .mask
            .as_ref()
            .ok_or_else(|| Error::InvalidState("Dropout: backward before forward".into()))?;
        Ok(vec![Some(gy.mul(mask)?)])
    }

    fn backward_accel(&mut self, inputs: &[NdArray], grad_outputs: &[Option<NdArray>]) -> Result<Vec<Option<NdArray>>> {
        self.backward_cpu(inputs, grad_outputs)
    }

    fn in_cosim_skip_list(&self) -> bool {
        true
    }
}

pub fn dropout(x: impl Into<Input>, ratio: f64) -> Result<Variable> {
    apply(Dropout::new(ratio)?, [x])?.one()
}
