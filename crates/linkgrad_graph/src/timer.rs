use crate::{function::Function, hook::FunctionHook};
use linkgrad_core::{
    array::NdArray,
    error::{Error, Result},
};
use std::{
    sync::Mutex,
    time::{Duration, Instant},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimerRecord {
    pub label: String,
    pub backward: bool,
    pub elapsed: Duration,
}

/// Measures the elapsed time of every forward and backward computation.
#[derive(Debug, Default)]
pub struct TimerHook {
    starts: Mutex<Vec<Instant>>,
    records: Mutex<Vec<TimerRecord>>,
}

impl TimerHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<TimerRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn total_time(&self) -> Duration {
        self.records().iter().map(|r| r.elapsed).sum()
    }

    fn start(&self) -> Result<()> {
        self.starts.lock().map_err(|_| Error::Lock)?.push(Instant::now());
        Ok(())
    }

    fn stop(&self, function: &dyn Function, backward: bool) -> Result<()> {
        let start = self
            .starts
            .lock()
            .map_err(|_| Error::Lock)?
            .pop()
            .ok_or_else(|| Error::InvalidState("timer stopped without a start".into()))?;
        self.records.lock().map_err(|_| Error::Lock)?.push(TimerRecord {
            label: function.label().to_string(),
            backward,
            elapsed: start.elapsed(),
        });
        Ok(())
    }
}

impl FunctionHook for TimerHook {
    fn name(&self) -> &str {
        "TimerHook"
    }

    fn forward_preprocess(&self, _function: &dyn Function, _in_data: &[NdArray]) -> Result<()> {
        self.start()
    }

    fn forward_postprocess(&self, function: &dyn Function, _in_data: &[NdArray]) -> Result<()> {
        self.stop(function, false)
    }

    fn backward_preprocess(&self, _function: &dyn Function, _in_data: &[NdArray], _out_grad: &[Option<NdArray>]) -> Result<()> {
        self.start()
    }

    fn backward_postprocess(&self, function: &dyn Function, _in_data: &[NdArray], _out_grad: &[Option<NdArray>]) -> Result<()> {
        self.stop(function, true)
    }
}
