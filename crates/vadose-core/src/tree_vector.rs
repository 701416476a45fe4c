//! Nested, named aggregate of composite vectors used as the solution vector.

use crate::composite::CompositeVector;
use crate::error::FieldError;

/// A tree of [`CompositeVector`] leaves.
///
/// A node either carries data, has children, or both. Vector algebra
/// recurses over the tree and requires both operands to have the same
/// structure.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TreeVector {
    name: String,
    data: Option<CompositeVector>,
    children: Vec<TreeVector>,
}

impl TreeVector {
    /// A leaf holding `data`.
    pub fn leaf(name: impl Into<String>, data: CompositeVector) -> Self {
        Self {
            name: name.into(),
            data: Some(data),
            children: Vec::new(),
        }
    }

    /// An interior node over `children`.
    pub fn node(name: impl Into<String>, children: Vec<TreeVector>) -> Self {
        Self {
            name: name.into(),
            data: None,
            children,
        }
    }

    /// Node name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Data at this node, if any.
    pub fn data(&self) -> Option<&CompositeVector> {
        self.data.as_ref()
    }

    /// Mutable data at this node, if any.
    pub fn data_mut(&mut self) -> Option<&mut CompositeVector> {
        self.data.as_mut()
    }

    /// Replace the data at this node.
    pub fn set_data(&mut self, data: CompositeVector) {
        self.data = Some(data);
    }

    /// Direct children.
    pub fn children(&self) -> &[TreeVector] {
        &self.children
    }

    /// Depth-first search for a node by name (including `self`).
    pub fn sub_vector(&self, name: &str) -> Option<&TreeVector> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.sub_vector(name))
    }

    /// Mutable depth-first search for a node by name (including `self`).
    pub fn sub_vector_mut(&mut self, name: &str) -> Option<&mut TreeVector> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.sub_vector_mut(name))
    }

    /// All data-carrying nodes, depth first.
    pub fn leaves(&self) -> Vec<&CompositeVector> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a CompositeVector>) {
        if let Some(d) = &self.data {
            out.push(d);
        }
        for c in &self.children {
            c.collect_leaves(out);
        }
    }

    fn zip_mut(
        &mut self,
        other: &TreeVector,
        f: &mut dyn FnMut(&mut CompositeVector, &CompositeVector) -> Result<(), FieldError>,
    ) -> Result<(), FieldError> {
        if self.children.len() != other.children.len() || self.data.is_some() != other.data.is_some()
        {
            return Err(FieldError::ShapeMismatch {
                reason: format!(
                    "tree vectors '{}' and '{}' differ in structure",
                    self.name, other.name
                ),
            });
        }
        if let (Some(a), Some(b)) = (self.data.as_mut(), other.data.as_ref()) {
            f(a, b)?;
        }
        for (a, b) in self.children.iter_mut().zip(&other.children) {
            a.zip_mut(b, f)?;
        }
        Ok(())
    }

    fn for_each_mut(&mut self, f: &mut dyn FnMut(&mut CompositeVector)) {
        if let Some(d) = self.data.as_mut() {
            f(d);
        }
        for c in &mut self.children {
            c.for_each_mut(f);
        }
    }

    /// Set every entry.
    pub fn put_scalar(&mut self, value: f64) {
        self.for_each_mut(&mut |d| d.put_scalar(value));
    }

    /// Multiply every entry by `a`.
    pub fn scale(&mut self, a: f64) {
        self.for_each_mut(&mut |d| d.scale(a));
    }

    /// `self = a * x + b * self`.
    pub fn update(&mut self, a: f64, x: &TreeVector, b: f64) -> Result<(), FieldError> {
        self.zip_mut(x, &mut |s, x| s.update(a, x, b))
    }

    /// Overwrite with the values of `x`.
    pub fn copy_from(&mut self, x: &TreeVector) -> Result<(), FieldError> {
        self.zip_mut(x, &mut |s, x| s.copy_from(x))
    }

    /// Dot product over owned entries.
    pub fn dot(&self, x: &TreeVector) -> Result<f64, FieldError> {
        let mine = self.leaves();
        let theirs = x.leaves();
        if mine.len() != theirs.len() {
            return Err(FieldError::ShapeMismatch {
                reason: format!("tree vectors '{}' and '{}' differ in structure", self.name, x.name),
            });
        }
        mine.iter().zip(theirs).map(|(a, b)| a.dot(b)).sum()
    }

    /// Euclidean norm over owned entries.
    pub fn norm2(&self) -> f64 {
        self.leaves()
            .iter()
            .map(|d| d.norm2().powi(2))
            .sum::<f64>()
            .sqrt()
    }

    /// Maximum absolute owned entry.
    pub fn norm_inf(&self) -> f64 {
        self.leaves()
            .iter()
            .fold(0.0_f64, |m, d| m.max(d.norm_inf()))
    }

    /// First non-finite entry as `(component, entity index, value)`.
    pub fn first_non_finite(&self) -> Option<(String, usize, f64)> {
        self.leaves().iter().find_map(|d| d.first_non_finite())
    }
}
