use thiserror::Error;

#[derive(Debug, Error)]
pub enum MultiArrayError {
    #[error("Rank mismatch for {name}: expected {expected} indices, got {got}")]
    RankMismatch {
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("Index out of range for {name}: index {index} along axis {axis} (size {size})")]
    IndexOutOfRange {
        name: String,
        axis: usize,
        index: usize,
        size: usize,
    },
}

/// A named N-dimensional array of scalars with row-major strides.
///
/// Used only for I/O-shaped collections: groups of variables or constraints
/// created under one user name, accessed flat (`[i]`) or by multi-index
/// (`(i1, .., in)`). The reverse flat-to-multi mapping produces the display
/// names such as `y[ 3, 7]`.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiArray<T> {
    name: String,
    shape: Vec<usize>,
    strides: Vec<usize>,
    values: Vec<T>,
}

impl<T: Clone> MultiArray<T> {
    pub fn new(name: &str, shape: &[usize], initial: T) -> Self {
        let mut strides = vec![1usize; shape.len()];
        for axis in (0..shape.len().saturating_sub(1)).rev() {
            strides[axis] = strides[axis + 1] * shape[axis + 1];
        }
        let size = shape.iter().product::<usize>().max(1);
        Self {
            name: name.to_string(),
            shape: shape.to_vec(),
            strides,
            values: vec![initial; size],
        }
    }

    /// A rank-0 array holding a single value.
    pub fn scalar(name: &str, value: T) -> Self {
        Self {
            name: name.to_string(),
            shape: Vec::new(),
            strides: Vec::new(),
            values: vec![value],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn fill(&mut self, value: T) {
        self.values.fill(value);
    }

    pub fn flat(&self, index: usize) -> &T {
        &self.values[index]
    }

    pub fn flat_mut(&mut self, index: usize) -> &mut T {
        &mut self.values[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.values.iter()
    }

    /// Flat index of a multi-index, rank- and range-checked.
    pub fn flat_index(&self, indices: &[usize]) -> Result<usize, MultiArrayError> {
        if indices.len() != self.shape.len() {
            return Err(MultiArrayError::RankMismatch {
                name: self.name.clone(),
                expected: self.shape.len(),
                got: indices.len(),
            });
        }
        let mut flat = 0;
        for (axis, (&index, &size)) in indices.iter().zip(&self.shape).enumerate() {
            if index >= size {
                return Err(MultiArrayError::IndexOutOfRange {
                    name: self.name.clone(),
                    axis,
                    index,
                    size,
                });
            }
            flat += index * self.strides[axis];
        }
        Ok(flat)
    }

    pub fn get(&self, indices: &[usize]) -> Result<&T, MultiArrayError> {
        Ok(&self.values[self.flat_index(indices)?])
    }

    pub fn get_mut(&mut self, indices: &[usize]) -> Result<&mut T, MultiArrayError> {
        let flat = self.flat_index(indices)?;
        Ok(&mut self.values[flat])
    }

    /// Inverse of [`Self::flat_index`].
    pub fn multi_index(&self, mut flat: usize) -> Vec<usize> {
        let mut indices = vec![0usize; self.shape.len()];
        for (axis, &stride) in self.strides.iter().enumerate() {
            indices[axis] = flat / stride;
            flat %= stride;
        }
        indices
    }

    /// Display name of the element at `flat`, e.g. `y[ 3, 7]` for rank >= 1
    /// and the plain array name for rank 0.
    pub fn element_name(&self, flat: usize) -> String {
        if self.shape.is_empty() {
            return self.name.clone();
        }
        let indices = self.multi_index(flat);
        let joined = indices
            .iter()
            .map(|i| format!("{i:2}"))
            .collect::<Vec<_>>()
            .join(",");
        format!("{}[{}]", self.name, joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strides_are_row_major() {
        let array = MultiArray::new("a", &[2, 3, 4], 0.0);
        assert_eq!(array.len(), 24);
        assert_eq!(array.flat_index(&[0, 0, 1]).unwrap(), 1);
        assert_eq!(array.flat_index(&[0, 1, 0]).unwrap(), 4);
        assert_eq!(array.flat_index(&[1, 0, 0]).unwrap(), 12);
    }

    #[test]
    fn multi_index_inverts_flat_index() {
        let array = MultiArray::new("a", &[3, 5], 0);
        for flat in 0..array.len() {
            let indices = array.multi_index(flat);
            assert_eq!(array.flat_index(&indices).unwrap(), flat);
        }
    }

    #[test]
    fn rank_and_range_are_checked() {
        let array = MultiArray::new("a", &[2, 2], false);
        assert!(matches!(
            array.flat_index(&[0]),
            Err(MultiArrayError::RankMismatch { .. })
        ));
        assert!(matches!(
            array.flat_index(&[0, 2]),
            Err(MultiArrayError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn element_names() {
        let array = MultiArray::new("y", &[4, 8], 0);
        assert_eq!(array.element_name(25), "y[ 3, 1]");
        let scalar = MultiArray::scalar("z", 0);
        assert_eq!(scalar.element_name(0), "z");
    }

    #[test]
    fn fill() {
        let mut array = MultiArray::new("a", &[2, 2], 0);
        array.fill(7);
        assert!(array.iter().all(|&v| v == 7));
    }
}
