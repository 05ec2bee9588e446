use linkgrad_core::{
    array::NdArray,
    dtype::DType,
    error::{Error, Result},
};

/// Type view of one input array.
#[derive(Debug, Clone)]
pub struct TypeInfo {
    function: String,
    index: usize,
    dtype: DType,
    shape: Vec<usize>,
}

impl TypeInfo {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn dim(&self, dim: usize) -> Option<usize> {
        self.shape.get(dim).copied()
    }

    fn fail(&self, constraint: String, actual: String) -> Error {
        Error::TypeMismatch {
            function: self.function.clone(),
            argument: Some(self.index),
            constraint,
            actual,
        }
    }

    pub fn expect_float(&self) -> Result<()> {
        if self.dtype.is_float() {
            return Ok(());
        }
        Err(self.fail(
            format!("in_types[{}].dtype is floating", self.index),
            format!("{} is not floating", self.dtype.as_str()),
        ))
    }

    pub fn expect_dtype(&self, dtype: DType) -> Result<()> {
        if self.dtype == dtype {
            return Ok(());
        }
        Err(self.fail(
            format!("in_types[{}].dtype == {}", self.index, dtype.as_str()),
            format!("{} != {}", self.dtype.as_str(), dtype.as_str()),
        ))
    }

    pub fn expect_ndim(&self, ndim: usize) -> Result<()> {
        if self.ndim() == ndim {
            return Ok(());
        }
        Err(self.fail(
            format!("in_types[{}].ndim == {}", self.index, ndim),
            format!("{} != {}", self.ndim(), ndim),
        ))
    }

    pub fn expect_dim(&self, dim: usize, size: usize) -> Result<()> {
        match self.dim(dim) {
            Some(actual) if actual == size => Ok(()),
            actual => Err(self.fail(
                format!("in_types[{}].shape[{}] == {}", self.index, dim, size),
                format!("{:?} != {}", actual, size),
            )),
        }
    }

    /// `self.shape[dim] == other.shape[other_dim]`
    pub fn expect_dim_eq(&self, dim: usize, other: &TypeInfo, other_dim: usize) -> Result<()> {
        match (self.dim(dim), other.dim(other_dim)) {
            (Some(a), Some(b)) if a == b => Ok(()),
            (a, b) => Err(self.fail(
                format!(
                    "in_types[{}].shape[{}] == in_types[{}].shape[{}]",
                    self.index, dim, other.index, other_dim
                ),
                format!("{:?} != {:?}", a, b),
            )),
        }
    }
}

/// Type view of a function's inputs, handed to `check_type_forward`.
#[derive(Debug, Clone)]
pub struct TypeInfoTuple {
    function: String,
    infos: Vec<TypeInfo>,
}

impl TypeInfoTuple {
    pub fn new(function: &str, arrays: &[NdArray]) -> Self {
        Self {
            function: function.to_string(),
            infos: arrays
                .iter()
                .enumerate()
                .map(|(index, array)| TypeInfo {
                    function: function.to_string(),
                    index,
                    dtype: array.dtype(),
                    shape: array.shape().to_vec(),
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TypeInfo> {
        self.infos.iter()
    }

    pub fn get(&self, index: usize) -> Option<&TypeInfo> {
        self.infos.get(index)
    }

    /// Like [`get`](Self::get) but reports a missing argument as a type error.
    pub fn arg(&self, index: usize) -> Result<&TypeInfo> {
        self.infos.get(index).ok_or_else(|| Error::TypeMismatch {
            function: self.function.clone(),
            argument: Some(index),
            constraint: format!("in_types.size() > {}", index),
            actual: format!("{}", self.infos.len()),
        })
    }

    pub fn expect_size(&self, size: usize) -> Result<()> {
        self.expect(
            None,
            self.len() == size,
            &format!("in_types.size() == {}", size),
            &format!("{}", self.len()),
        )
    }

    /// Inclusive on both ends.
    pub fn expect_size_between(&self, lo: usize, hi: usize) -> Result<()> {
        self.expect(
            None,
            (lo..=hi).contains(&self.len()),
            &format!("{} <= in_types.size() <= {}", lo, hi),
            &format!("{}", self.len()),
        )
    }

    pub fn expect(&self, argument: Option<usize>, ok: bool, constraint: &str, actual: &str) -> Result<()> {
        if ok {
            return Ok(());
        }
        Err(Error::TypeMismatch {
            function: self.function.clone(),
            argument,
            constraint: constraint.to_string(),
            actual: actual.to_string(),
        })
    }
}

impl<'a> IntoIterator for &'a TypeInfoTuple {
    type Item = &'a TypeInfo;
    type IntoIter = std::slice::Iter<'a, TypeInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.infos.iter()
    }
}
