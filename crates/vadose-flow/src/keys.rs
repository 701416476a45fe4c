//! Field keys and the owner name used by the Richards kernel.

/// Owner of the fields the kernel writes.
pub const FLOW_OWNER: &str = "flow";

/// Store scalar holding the atmospheric (reference) pressure.
pub const ATMOSPHERIC_PRESSURE: &str = "atmospheric_pressure";

/// Liquid pressure, the primary variable (cell and face components).
pub const PRESSURE: &str = "pressure";
/// Face fluxes along face normals.
pub const DARCY_FLUX: &str = "darcy_flux";
/// Reconstructed cell velocities.
pub const DARCY_VELOCITY: &str = "darcy_velocity";
/// Upwinded, density/viscosity-scaled relative permeability.
pub const NUMERICAL_REL_PERM: &str = "numerical_rel_perm";

/// Absolute permeability (1 or `dim` dofs per cell).
pub const PERMEABILITY: &str = "permeability";
/// Porosity.
pub const POROSITY: &str = "porosity";
/// Cell volume.
pub const CELL_VOLUME: &str = "cell_volume";
/// Liquid saturation.
pub const SATURATION_LIQUID: &str = "saturation_liquid";
/// Gas saturation.
pub const SATURATION_GAS: &str = "saturation_gas";
/// Relative permeability at cells.
pub const RELATIVE_PERMEABILITY: &str = "relative_permeability";
/// Water content `φ n s`, moles per unit volume.
pub const WATER_CONTENT: &str = "water_content";
/// Liquid molar density.
pub const MOLAR_DENSITY_LIQUID: &str = "molar_density_liquid";
/// Liquid mass density.
pub const MASS_DENSITY_LIQUID: &str = "mass_density_liquid";
/// Liquid dynamic viscosity.
pub const VISCOSITY_LIQUID: &str = "viscosity_liquid";
