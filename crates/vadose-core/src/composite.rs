//! The composite field value: named components over mesh entities.
//!
//! A [`CompositeVector`] holds one or more components (conventionally
//! `"cell"` and `"face"`), each an array of `num_dofs` scalars per entity
//! laid out entity-major over owned entities followed by ghost entities.
//! Its shape is declared up front with a [`CompositeVectorSpace`].
//!
//! Ghost entries are only valid after an explicit
//! [`scatter_master_to_ghosted`](CompositeVector::scatter_master_to_ghosted).
//! Any mutable access to owned data marks the component's ghosts stale,
//! and ghosted reads of a stale component fail with
//! [`FieldError::StaleGhosts`].

use indexmap::IndexMap;

use crate::comm::Communicator;
use crate::error::FieldError;
use crate::id::{EntityCounts, EntityKind, Ownership};

// ── Space (shape declaration) ──────────────────────────────────────

/// Declaration of one component: its name, entity kind and dofs per entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentSpec {
    /// Component name, e.g. `"cell"`.
    pub name: String,
    /// Entity kind the component lives on.
    pub location: EntityKind,
    /// Scalars per entity.
    pub num_dofs: usize,
}

/// Shape declaration for a [`CompositeVector`].
///
/// Built incrementally as evaluators and process kernels declare what they
/// need; conflicting declarations are rejected.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompositeVectorSpace {
    components: Vec<ComponentSpec>,
    ghosted: bool,
}

impl CompositeVectorSpace {
    /// An empty space with no components.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a component, or confirm an identical earlier declaration.
    ///
    /// Returns [`FieldError::ShapeMismatch`] if `name` was already declared
    /// with a different location or dof count, or if `num_dofs` is zero.
    pub fn add_component(
        &mut self,
        name: &str,
        location: EntityKind,
        num_dofs: usize,
    ) -> Result<&mut Self, FieldError> {
        if num_dofs == 0 {
            return Err(FieldError::ShapeMismatch {
                reason: format!("component '{name}' declared with zero dofs"),
            });
        }
        match self.components.iter().find(|c| c.name == name) {
            Some(existing) if existing.location == location && existing.num_dofs == num_dofs => {}
            Some(existing) => {
                return Err(FieldError::ShapeMismatch {
                    reason: format!(
                        "component '{name}' declared as {}x{} and as {}x{}",
                        existing.location, existing.num_dofs, location, num_dofs
                    ),
                });
            }
            None => self.components.push(ComponentSpec {
                name: name.to_string(),
                location,
                num_dofs,
            }),
        }
        Ok(self)
    }

    /// Request ghost entries for every component.
    pub fn set_ghosted(&mut self) -> &mut Self {
        self.ghosted = true;
        self
    }

    /// Whether ghost entries are allocated.
    pub fn is_ghosted(&self) -> bool {
        self.ghosted
    }

    /// Declared components in declaration order.
    pub fn components(&self) -> &[ComponentSpec] {
        &self.components
    }

    /// Whether a component with this name is declared.
    pub fn has_component(&self, name: &str) -> bool {
        self.components.iter().any(|c| c.name == name)
    }

    /// Whether nothing has been declared yet.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Fold another declaration into this one.
    pub fn merge(&mut self, other: &CompositeVectorSpace) -> Result<(), FieldError> {
        for c in &other.components {
            self.add_component(&c.name, c.location, c.num_dofs)?;
        }
        self.ghosted |= other.ghosted;
        Ok(())
    }

    /// Allocate a zero-filled vector of this shape.
    pub fn create<C: EntityCounts + ?Sized>(&self, counts: &C) -> CompositeVector {
        let mut cv = CompositeVector::new();
        for spec in &self.components {
            let owned = counts.entity_count(spec.location, Ownership::Owned);
            let ghost = if self.ghosted {
                counts.entity_count(spec.location, Ownership::Ghost)
            } else {
                0
            };
            cv.components.insert(
                spec.name.clone(),
                Component::zeros(spec.location, spec.num_dofs, owned, ghost),
            );
        }
        cv
    }
}

// ── Vector ─────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
struct Component {
    location: EntityKind,
    num_dofs: usize,
    owned: usize,
    ghost: usize,
    data: Vec<f64>,
    ghosts_stale: bool,
}

impl Component {
    fn zeros(location: EntityKind, num_dofs: usize, owned: usize, ghost: usize) -> Self {
        Self {
            location,
            num_dofs,
            owned,
            ghost,
            data: vec![0.0; (owned + ghost) * num_dofs],
            ghosts_stale: false,
        }
    }

    fn owned_len(&self) -> usize {
        self.owned * self.num_dofs
    }

    fn same_shape(&self, other: &Component) -> bool {
        self.location == other.location
            && self.num_dofs == other.num_dofs
            && self.owned == other.owned
            && self.ghost == other.ghost
    }
}

/// A distributed array over mesh entities, split into named components.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompositeVector {
    components: IndexMap<String, Component>,
}

impl CompositeVector {
    /// A vector with no components.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a single-component vector from owned values.
    ///
    /// `values.len()` must be a multiple of `num_dofs`.
    pub fn from_values(
        name: &str,
        location: EntityKind,
        num_dofs: usize,
        values: Vec<f64>,
    ) -> Result<Self, FieldError> {
        let mut cv = Self::new();
        cv.push_values(name, location, num_dofs, values)?;
        Ok(cv)
    }

    /// Append a component initialized from owned values.
    pub fn push_values(
        &mut self,
        name: &str,
        location: EntityKind,
        num_dofs: usize,
        values: Vec<f64>,
    ) -> Result<&mut Self, FieldError> {
        if num_dofs == 0 || values.len() % num_dofs != 0 {
            return Err(FieldError::ShapeMismatch {
                reason: format!(
                    "{} values do not divide into {num_dofs} dofs for component '{name}'",
                    values.len()
                ),
            });
        }
        if self.components.contains_key(name) {
            return Err(FieldError::ShapeMismatch {
                reason: format!("component '{name}' already present"),
            });
        }
        let owned = values.len() / num_dofs;
        self.components.insert(
            name.to_string(),
            Component {
                location,
                num_dofs,
                owned,
                ghost: 0,
                data: values,
                ghosts_stale: false,
            },
        );
        Ok(self)
    }

    fn component(&self, name: &str) -> Result<&Component, FieldError> {
        self.components
            .get(name)
            .ok_or_else(|| FieldError::UnknownComponent {
                component: name.to_string(),
            })
    }

    fn component_mut(&mut self, name: &str) -> Result<&mut Component, FieldError> {
        self.components
            .get_mut(name)
            .ok_or_else(|| FieldError::UnknownComponent {
                component: name.to_string(),
            })
    }

    /// Component names in declaration order.
    pub fn component_names(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    /// Whether a component with this name exists.
    pub fn has_component(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    /// Entity kind of a component.
    pub fn location(&self, name: &str) -> Result<EntityKind, FieldError> {
        Ok(self.component(name)?.location)
    }

    /// Scalars per entity of a component.
    pub fn num_dofs(&self, name: &str) -> Result<usize, FieldError> {
        Ok(self.component(name)?.num_dofs)
    }

    /// Number of entities of a component in an ownership class.
    pub fn size(&self, name: &str, ownership: Ownership) -> Result<usize, FieldError> {
        let c = self.component(name)?;
        Ok(match ownership {
            Ownership::Owned => c.owned,
            Ownership::Ghost => c.ghost,
            Ownership::Used => c.owned + c.ghost,
        })
    }

    /// Read-only view of the owned entries of a component.
    pub fn view(&self, name: &str) -> Result<&[f64], FieldError> {
        let c = self.component(name)?;
        Ok(&c.data[..c.owned_len()])
    }

    /// Mutable view of the owned entries of a component.
    ///
    /// Marks the component's ghost entries stale.
    pub fn view_mut(&mut self, name: &str) -> Result<&mut [f64], FieldError> {
        let c = self.component_mut(name)?;
        if c.ghost > 0 {
            c.ghosts_stale = true;
        }
        let n = c.owned_len();
        Ok(&mut c.data[..n])
    }

    /// Read-only view of owned followed by ghost entries.
    ///
    /// Fails with [`FieldError::StaleGhosts`] if owned data changed since
    /// the last scatter.
    pub fn view_ghosted(&self, name: &str) -> Result<&[f64], FieldError> {
        let c = self.component(name)?;
        if c.ghosts_stale {
            return Err(FieldError::StaleGhosts {
                component: name.to_string(),
            });
        }
        Ok(&c.data)
    }

    /// Whether any component has stale ghosts.
    pub fn has_stale_ghosts(&self) -> bool {
        self.components.values().any(|c| c.ghosts_stale)
    }

    /// Refresh the ghost entries of one component from their owners.
    pub fn scatter_master_to_ghosted(
        &mut self,
        name: &str,
        comm: &dyn Communicator,
    ) -> Result<(), FieldError> {
        let c = self.component_mut(name)?;
        comm.scatter_master_to_ghosted(c.location, c.num_dofs, c.owned, &mut c.data);
        c.ghosts_stale = false;
        Ok(())
    }

    /// Refresh the ghost entries of every component.
    pub fn scatter_all(&mut self, comm: &dyn Communicator) {
        for c in self.components.values_mut() {
            comm.scatter_master_to_ghosted(c.location, c.num_dofs, c.owned, &mut c.data);
            c.ghosts_stale = false;
        }
    }

    /// Whether both vectors have the same components with the same sizes.
    pub fn same_shape(&self, other: &CompositeVector) -> bool {
        self.components.len() == other.components.len()
            && self
                .components
                .iter()
                .all(|(name, c)| other.components.get(name).is_some_and(|o| c.same_shape(o)))
    }

    fn check_shape(&self, other: &CompositeVector) -> Result<(), FieldError> {
        if self.same_shape(other) {
            Ok(())
        } else {
            Err(FieldError::ShapeMismatch {
                reason: format!(
                    "operands have components [{}] and [{}]",
                    self.component_names().collect::<Vec<_>>().join(", "),
                    other.component_names().collect::<Vec<_>>().join(", ")
                ),
            })
        }
    }

    /// Set every entry, ghosts included.
    pub fn put_scalar(&mut self, value: f64) {
        for c in self.components.values_mut() {
            c.data.fill(value);
            c.ghosts_stale = false;
        }
    }

    /// Multiply every entry by `a`.
    pub fn scale(&mut self, a: f64) {
        for c in self.components.values_mut() {
            c.data.iter_mut().for_each(|v| *v *= a);
        }
    }

    /// `self = a * x + b * self`.
    pub fn update(&mut self, a: f64, x: &CompositeVector, b: f64) -> Result<(), FieldError> {
        self.check_shape(x)?;
        for (name, c) in self.components.iter_mut() {
            let xc = &x.components[name];
            for (s, xv) in c.data.iter_mut().zip(&xc.data) {
                *s = a * xv + b * *s;
            }
            c.ghosts_stale |= xc.ghosts_stale;
        }
        Ok(())
    }

    /// `self = alpha * a .* b + beta * self` over the components of `self`.
    ///
    /// `a` and `b` must carry every component of `self` with the same size;
    /// extra components in `a` or `b` are ignored.
    pub fn multiply(
        &mut self,
        alpha: f64,
        a: &CompositeVector,
        b: &CompositeVector,
        beta: f64,
    ) -> Result<(), FieldError> {
        for (name, c) in self.components.iter_mut() {
            let (ac, bc) = (a.component(name)?, b.component(name)?);
            if !c.same_shape(ac) || !c.same_shape(bc) {
                return Err(FieldError::ShapeMismatch {
                    reason: format!("component '{name}' differs in size between operands"),
                });
            }
            for ((s, x), y) in c.data.iter_mut().zip(&ac.data).zip(&bc.data) {
                *s = alpha * x * y + beta * *s;
            }
        }
        Ok(())
    }

    /// Overwrite with the values of `x`.
    pub fn copy_from(&mut self, x: &CompositeVector) -> Result<(), FieldError> {
        self.check_shape(x)?;
        for (name, c) in self.components.iter_mut() {
            let xc = &x.components[name];
            c.data.copy_from_slice(&xc.data);
            c.ghosts_stale = xc.ghosts_stale;
        }
        Ok(())
    }

    /// Dot product over owned entries.
    pub fn dot(&self, x: &CompositeVector) -> Result<f64, FieldError> {
        self.check_shape(x)?;
        Ok(self
            .components
            .iter()
            .map(|(name, c)| {
                let n = c.owned_len();
                c.data[..n]
                    .iter()
                    .zip(&x.components[name].data[..n])
                    .map(|(a, b)| a * b)
                    .sum::<f64>()
            })
            .sum())
    }

    /// Euclidean norm over owned entries.
    pub fn norm2(&self) -> f64 {
        self.components
            .values()
            .flat_map(|c| c.data[..c.owned_len()].iter())
            .map(|v| v * v)
            .sum::<f64>()
            .sqrt()
    }

    /// Maximum absolute owned entry (0 for an empty vector).
    pub fn norm_inf(&self) -> f64 {
        self.components
            .values()
            .flat_map(|c| c.data[..c.owned_len()].iter())
            .fold(0.0_f64, |m, v| m.max(v.abs()))
    }

    /// First non-finite owned entry as `(component, entity index, value)`.
    pub fn first_non_finite(&self) -> Option<(String, usize, f64)> {
        self.components.iter().find_map(|(name, c)| {
            c.data[..c.owned_len()]
                .iter()
                .position(|v| !v.is_finite())
                .map(|i| (name.clone(), i / c.num_dofs, c.data[i]))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::SerialComm;
    use crate::id::{CELL, FACE};
    use proptest::prelude::*;

    struct Counts {
        cells: usize,
        faces: usize,
        ghost_cells: usize,
    }

    impl EntityCounts for Counts {
        fn entity_count(&self, kind: EntityKind, ownership: Ownership) -> usize {
            let (owned, ghost) = match kind {
                EntityKind::Cell => (self.cells, self.ghost_cells),
                EntityKind::Face => (self.faces, 0),
            };
            match ownership {
                Ownership::Owned => owned,
                Ownership::Ghost => ghost,
                Ownership::Used => owned + ghost,
            }
        }
    }

    fn cell_face_space() -> CompositeVectorSpace {
        let mut space = CompositeVectorSpace::new();
        space
            .add_component(CELL, EntityKind::Cell, 1)
            .unwrap()
            .add_component(FACE, EntityKind::Face, 1)
            .unwrap();
        space
    }

    #[test]
    fn conflicting_declaration_rejected() {
        let mut space = cell_face_space();
        assert!(space.add_component(CELL, EntityKind::Cell, 1).is_ok());
        let err = space.add_component(CELL, EntityKind::Cell, 3).unwrap_err();
        assert!(matches!(err, FieldError::ShapeMismatch { .. }));
        assert!(space.add_component("x", EntityKind::Cell, 0).is_err());
    }

    #[test]
    fn create_allocates_owned_and_ghost() {
        let mut space = cell_face_space();
        space.set_ghosted();
        let counts = Counts {
            cells: 3,
            faces: 4,
            ghost_cells: 2,
        };
        let cv = space.create(&counts);
        assert_eq!(cv.size(CELL, Ownership::Owned).unwrap(), 3);
        assert_eq!(cv.size(CELL, Ownership::Used).unwrap(), 5);
        assert_eq!(cv.view(CELL).unwrap().len(), 3);
        assert_eq!(cv.view_ghosted(CELL).unwrap().len(), 5);
        assert_eq!(cv.view(FACE).unwrap().len(), 4);
    }

    #[test]
    fn mutation_marks_ghosts_stale_until_scatter() {
        let mut space = cell_face_space();
        space.set_ghosted();
        let mut cv = space.create(&Counts {
            cells: 2,
            faces: 3,
            ghost_cells: 1,
        });
        cv.view_mut(CELL).unwrap()[0] = 1.0;
        assert!(matches!(
            cv.view_ghosted(CELL),
            Err(FieldError::StaleGhosts { .. })
        ));
        // Faces have no ghosts, so writing them never goes stale.
        cv.view_mut(FACE).unwrap()[0] = 1.0;
        assert!(cv.view_ghosted(FACE).is_ok());

        cv.scatter_master_to_ghosted(CELL, &SerialComm).unwrap();
        assert!(cv.view_ghosted(CELL).is_ok());
        assert!(!cv.has_stale_ghosts());
    }

    #[test]
    fn unknown_component_is_an_error() {
        let cv = CompositeVector::from_values(CELL, EntityKind::Cell, 1, vec![1.0]).unwrap();
        assert_eq!(
            cv.view("boundary_face").unwrap_err(),
            FieldError::UnknownComponent {
                component: "boundary_face".into()
            }
        );
    }

    #[test]
    fn update_requires_same_shape() {
        let mut a = CompositeVector::from_values(CELL, EntityKind::Cell, 1, vec![1.0, 2.0]).unwrap();
        let b = CompositeVector::from_values(CELL, EntityKind::Cell, 1, vec![1.0]).unwrap();
        assert!(a.update(1.0, &b, 1.0).is_err());
    }

    #[test]
    fn multiply_is_elementwise() {
        let a = CompositeVector::from_values(CELL, EntityKind::Cell, 1, vec![1.0, 2.0]).unwrap();
        let b = CompositeVector::from_values(CELL, EntityKind::Cell, 1, vec![3.0, 4.0]).unwrap();
        let mut c = CompositeVector::from_values(CELL, EntityKind::Cell, 1, vec![1.0, 1.0]).unwrap();
        c.multiply(2.0, &a, &b, 1.0).unwrap();
        assert_eq!(c.view(CELL).unwrap(), &[7.0, 17.0]);
    }

    #[test]
    fn first_non_finite_reports_entity_not_slot() {
        let cv =
            CompositeVector::from_values("v", EntityKind::Cell, 2, vec![0.0, 1.0, 2.0, f64::NAN])
                .unwrap();
        assert_eq!(cv.first_non_finite().map(|(c, i, _)| (c, i)), Some(("v".into(), 1)));
    }

    proptest! {
        #[test]
        fn update_is_axpby(
            xs in prop::collection::vec(-1e3f64..1e3, 1..20),
            a in -10.0f64..10.0,
            b in -10.0f64..10.0,
        ) {
            let ys: Vec<f64> = xs.iter().map(|v| v * 0.5 + 1.0).collect();
            let x = CompositeVector::from_values(CELL, EntityKind::Cell, 1, xs.clone()).unwrap();
            let mut y = CompositeVector::from_values(CELL, EntityKind::Cell, 1, ys.clone()).unwrap();
            y.update(a, &x, b).unwrap();
            for (i, v) in y.view(CELL).unwrap().iter().enumerate() {
                let expected = a * xs[i] + b * ys[i];
                prop_assert!((v - expected).abs() <= 1e-9 * (1.0 + expected.abs()));
            }
        }

        #[test]
        fn norms_are_consistent(xs in prop::collection::vec(-1e3f64..1e3, 1..20)) {
            let x = CompositeVector::from_values(CELL, EntityKind::Cell, 1, xs).unwrap();
            let n2 = x.norm2();
            prop_assert!((x.dot(&x).unwrap() - n2 * n2).abs() <= 1e-9 * (1.0 + n2 * n2));
            prop_assert!(x.norm_inf() <= n2 + 1e-12);
        }
    }
}
