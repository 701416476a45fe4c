//! Water retention models: saturation and relative permeability as
//! functions of capillary pressure.
//!
//! Capillary pressure is `pc = p_atm - p`. Every model is fully saturated
//! (`s = 1`, `kr = 1`) for `pc <= 0`.

use std::fmt;
use std::sync::Arc;

use vadose_core::ConfigError;
use vadose_state::EvaluatorSpec;

/// Model names accepted by [`create_wrm`].
pub const WRM_MODELS: [&str; 2] = ["van Genuchten", "Brooks-Corey"];

/// A capillary-pressure/saturation/permeability relation.
pub trait WaterRetentionModel: fmt::Debug + Send + Sync {
    /// Configuration name.
    fn name(&self) -> &'static str;

    /// Liquid saturation at capillary pressure `pc`.
    fn saturation(&self, pc: f64) -> f64;

    /// `ds/dpc`.
    fn d_saturation(&self, pc: f64) -> f64;

    /// Relative permeability at capillary pressure `pc`.
    fn k_relative(&self, pc: f64) -> f64;

    /// `dkr/dpc`.
    fn d_k_relative(&self, pc: f64) -> f64;

    /// Residual liquid saturation.
    fn residual_saturation(&self) -> f64;
}

/// Build the model named by `spec.kind`.
///
/// | model           | parameters                                                   |
/// |-----------------|--------------------------------------------------------------|
/// | `van Genuchten` | `alpha`, `n` or `m`, `residual_saturation` (0), `mualem_l` (0.5) |
/// | `Brooks-Corey`  | `alpha`, `lambda`, `residual_saturation` (0)                 |
pub fn create_wrm(spec: &EvaluatorSpec) -> Result<Arc<dyn WaterRetentionModel>, ConfigError> {
    match spec.kind.as_str() {
        "van Genuchten" => Ok(Arc::new(VanGenuchten::from_spec(spec)?)),
        "Brooks-Corey" => Ok(Arc::new(BrooksCorey::from_spec(spec)?)),
        other => Err(ConfigError::UnknownStrategy {
            kind: "water retention model",
            name: other.to_string(),
            known: WRM_MODELS.iter().map(|s| s.to_string()).collect(),
        }),
    }
}

fn invalid(model: &str, name: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidParameter {
        context: format!("water retention model '{model}'"),
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

fn check_residual(model: &str, sr: f64) -> Result<(), ConfigError> {
    if (0.0..1.0).contains(&sr) {
        Ok(())
    } else {
        Err(invalid(model, "residual_saturation", "must lie in [0, 1)"))
    }
}

// ── van Genuchten / Mualem ─────────────────────────────────────────

/// van Genuchten saturation with Mualem relative permeability.
///
/// ```text
/// se = (1 + (α pc)^n)^(-m),   m = 1 - 1/n
/// kr = se^l (1 - (1 - se^(1/m))^m)^2
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct VanGenuchten {
    alpha: f64,
    n: f64,
    m: f64,
    sr: f64,
    l: f64,
}

impl VanGenuchten {
    /// A model with inverse air-entry pressure `alpha`, shape `n > 1`,
    /// residual saturation `sr` and Mualem pore-connectivity `l`.
    pub fn new(alpha: f64, n: f64, sr: f64, l: f64) -> Result<Self, ConfigError> {
        let name = "van Genuchten";
        if alpha.is_nan() || alpha <= 0.0 {
            return Err(invalid(name, "alpha", "must be positive"));
        }
        if n.is_nan() || n <= 1.0 {
            return Err(invalid(name, "n", "must exceed 1"));
        }
        check_residual(name, sr)?;
        Ok(Self {
            alpha,
            n,
            m: 1.0 - 1.0 / n,
            sr,
            l,
        })
    }

    fn from_spec(spec: &EvaluatorSpec) -> Result<Self, ConfigError> {
        let alpha = spec.f64_param("alpha")?;
        let n = if spec.params.contains_key("m") {
            let m = spec.f64_param("m")?;
            if m.is_nan() || m <= 0.0 || m >= 1.0 {
                return Err(invalid("van Genuchten", "m", "must lie in (0, 1)"));
            }
            1.0 / (1.0 - m)
        } else {
            spec.f64_param("n")?
        };
        let sr = spec.f64_param_or("residual_saturation", 0.0)?;
        let l = spec.f64_param_or("mualem_l", 0.5)?;
        Self::new(alpha, n, sr, l)
    }

    /// `1 - se^(1/m)` written as `x / (1 + x)`, `x = (α pc)^n`, so it keeps
    /// its precision near saturation.
    fn mualem_base(x: f64) -> f64 {
        1.0 / (1.0 + x.recip())
    }

    fn effective(&self, pc: f64) -> f64 {
        if pc <= 0.0 {
            1.0
        } else {
            (1.0 + (self.alpha * pc).powf(self.n)).powf(-self.m)
        }
    }

    fn d_effective(&self, pc: f64) -> f64 {
        if pc <= 0.0 {
            return 0.0;
        }
        let x = (self.alpha * pc).powf(self.n);
        -self.m * self.n * self.alpha * (self.alpha * pc).powf(self.n - 1.0)
            * (1.0 + x).powf(-self.m - 1.0)
    }
}

impl WaterRetentionModel for VanGenuchten {
    fn name(&self) -> &'static str {
        "van Genuchten"
    }

    fn saturation(&self, pc: f64) -> f64 {
        self.sr + (1.0 - self.sr) * self.effective(pc)
    }

    fn d_saturation(&self, pc: f64) -> f64 {
        (1.0 - self.sr) * self.d_effective(pc)
    }

    fn k_relative(&self, pc: f64) -> f64 {
        if pc <= 0.0 {
            return 1.0;
        }
        let x = (self.alpha * pc).powf(self.n);
        let f = 1.0 - Self::mualem_base(x).powf(self.m);
        (1.0 + x).powf(-self.m * self.l) * f * f
    }

    fn d_k_relative(&self, pc: f64) -> f64 {
        if pc <= 0.0 {
            return 0.0;
        }
        let g = self.alpha * pc;
        let x = g.powf(self.n);
        let se = (1.0 + x).powf(-self.m);
        let f = 1.0 - Self::mualem_base(x).powf(self.m);
        // -m b^(m-1) db/dpc with b^(m-1) folded in; finite as b -> 0 for n >= 2.
        let df = -self.m * self.n * self.alpha * g.powf(self.n - 2.0)
            * (1.0 + x).powf(-1.0 - self.m);
        self.l * se.powf(self.l - 1.0) * self.d_effective(pc) * f * f
            + 2.0 * se.powf(self.l) * f * df
    }

    fn residual_saturation(&self) -> f64 {
        self.sr
    }
}

// ── Brooks-Corey / Burdine ─────────────────────────────────────────

/// Brooks-Corey saturation with Burdine relative permeability.
///
/// ```text
/// se = (α pc)^(-λ)  for α pc > 1, else 1
/// kr = se^(3 + 2/λ)
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct BrooksCorey {
    alpha: f64,
    lambda: f64,
    sr: f64,
}

impl BrooksCorey {
    /// A model with inverse bubbling pressure `alpha`, pore-size index
    /// `lambda` and residual saturation `sr`.
    pub fn new(alpha: f64, lambda: f64, sr: f64) -> Result<Self, ConfigError> {
        let name = "Brooks-Corey";
        if alpha.is_nan() || alpha <= 0.0 {
            return Err(invalid(name, "alpha", "must be positive"));
        }
        if lambda.is_nan() || lambda <= 0.0 {
            return Err(invalid(name, "lambda", "must be positive"));
        }
        check_residual(name, sr)?;
        Ok(Self { alpha, lambda, sr })
    }

    fn from_spec(spec: &EvaluatorSpec) -> Result<Self, ConfigError> {
        Self::new(
            spec.f64_param("alpha")?,
            spec.f64_param("lambda")?,
            spec.f64_param_or("residual_saturation", 0.0)?,
        )
    }

    fn exponent(&self) -> f64 {
        3.0 + 2.0 / self.lambda
    }

    fn effective(&self, pc: f64) -> f64 {
        let x = self.alpha * pc;
        if x <= 1.0 {
            1.0
        } else {
            x.powf(-self.lambda)
        }
    }

    fn d_effective(&self, pc: f64) -> f64 {
        let x = self.alpha * pc;
        if x <= 1.0 {
            0.0
        } else {
            -self.lambda * self.alpha * x.powf(-self.lambda - 1.0)
        }
    }
}

impl WaterRetentionModel for BrooksCorey {
    fn name(&self) -> &'static str {
        "Brooks-Corey"
    }

    fn saturation(&self, pc: f64) -> f64 {
        self.sr + (1.0 - self.sr) * self.effective(pc)
    }

    fn d_saturation(&self, pc: f64) -> f64 {
        (1.0 - self.sr) * self.d_effective(pc)
    }

    fn k_relative(&self, pc: f64) -> f64 {
        self.effective(pc).powf(self.exponent())
    }

    fn d_k_relative(&self, pc: f64) -> f64 {
        let e = self.exponent();
        e * self.effective(pc).powf(e - 1.0) * self.d_effective(pc)
    }

    fn residual_saturation(&self) -> f64 {
        self.sr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn van_genuchten() -> VanGenuchten {
        VanGenuchten::new(1e-4, 2.0, 0.1, 0.5).unwrap()
    }

    fn brooks_corey() -> BrooksCorey {
        BrooksCorey::new(1e-4, 1.5, 0.05).unwrap()
    }

    fn fd(f: impl Fn(f64) -> f64, x: f64) -> f64 {
        let h = 1e-6 * x.abs().max(1.0);
        (f(x + h) - f(x - h)) / (2.0 * h)
    }

    #[test]
    fn saturated_below_zero_capillary_pressure() {
        let models: [Box<dyn WaterRetentionModel>; 2] =
            [Box::new(van_genuchten()), Box::new(brooks_corey())];
        for m in &models {
            for pc in [-1e4, 0.0] {
                assert_eq!(m.saturation(pc), 1.0, "{}", m.name());
                assert_eq!(m.k_relative(pc), 1.0, "{}", m.name());
                assert_eq!(m.d_saturation(pc), 0.0, "{}", m.name());
            }
        }
    }

    #[test]
    fn drying_lowers_saturation_toward_residual() {
        let m = van_genuchten();
        let s1 = m.saturation(1e4);
        let s2 = m.saturation(1e5);
        assert!(s1 < 1.0 && s2 < s1 && s2 > m.residual_saturation());
        assert!(m.k_relative(1e5) < m.k_relative(1e4));
    }

    #[test]
    fn van_genuchten_known_value() {
        // alpha pc = 1, n = 2: se = 2^(-1/2)
        let m = VanGenuchten::new(1e-4, 2.0, 0.0, 0.5).unwrap();
        assert!((m.saturation(1e4) - 0.5f64.sqrt()).abs() < 1e-14);
    }

    #[test]
    fn brooks_corey_known_value() {
        // alpha pc = 4, lambda = 0.5: se = 1/2, kr = (1/2)^7
        let m = BrooksCorey::new(1.0, 0.5, 0.0).unwrap();
        assert!((m.saturation(4.0) - 0.5).abs() < 1e-14);
        assert!((m.k_relative(4.0) - 0.5f64.powi(7)).abs() < 1e-14);
    }

    #[test]
    fn analytic_derivatives_match_differences() {
        let models: [Box<dyn WaterRetentionModel>; 2] =
            [Box::new(van_genuchten()), Box::new(brooks_corey())];
        for m in &models {
            for pc in [2.0e4, 5.0e4, 2.0e5] {
                let ds = fd(|x| m.saturation(x), pc);
                let dk = fd(|x| m.k_relative(x), pc);
                assert!(
                    (m.d_saturation(pc) - ds).abs() <= 1e-6 * ds.abs().max(1e-12),
                    "{} ds/dpc at {pc}",
                    m.name()
                );
                assert!(
                    (m.d_k_relative(pc) - dk).abs() <= 1e-6 * dk.abs().max(1e-12),
                    "{} dkr/dpc at {pc}",
                    m.name()
                );
            }
        }
    }

    #[test]
    fn van_genuchten_kr_slope_is_finite_near_saturation() {
        // n = 2: kr ~ (1 - α pc)^2, so dkr/dpc -> -2α as pc -> 0.
        let m = van_genuchten();
        for pc in [1e-6, 1e-4, 1e-2, 1.0] {
            let h = 0.5 * pc;
            let dk = (m.k_relative(pc + h) - m.k_relative(pc - h)) / (2.0 * h);
            let analytic = m.d_k_relative(pc);
            assert!(analytic.is_finite(), "dkr/dpc at {pc} is {analytic}");
            assert!(dk < 0.0, "kr must fall as pc grows, fd {dk} at {pc}");
            assert!(
                (analytic - dk).abs() <= 1e-4 * dk.abs(),
                "dkr/dpc at {pc}: analytic {analytic}, fd {dk}"
            );
        }
        assert!((m.d_k_relative(1e-5) + 2e-4).abs() < 1e-7);
        assert!(m.k_relative(1e-3) < 1.0);
    }

    #[test]
    fn factory_resolves_names_and_rejects_unknown() {
        let spec = EvaluatorSpec::new("van Genuchten")
            .with("alpha", json!(2e-4))
            .with("m", json!(0.5));
        let m = create_wrm(&spec).unwrap();
        assert_eq!(m.name(), "van Genuchten");

        let err = create_wrm(&EvaluatorSpec::new("Gardner")).unwrap_err();
        match err {
            ConfigError::UnknownStrategy { kind, name, known } => {
                assert_eq!(kind, "water retention model");
                assert_eq!(name, "Gardner");
                assert_eq!(known, vec!["van Genuchten", "Brooks-Corey"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parameters_are_validated() {
        assert!(VanGenuchten::new(1e-4, 1.0, 0.0, 0.5).is_err());
        assert!(VanGenuchten::new(0.0, 2.0, 0.0, 0.5).is_err());
        assert!(BrooksCorey::new(1.0, 0.5, 1.0).is_err());
        let missing = EvaluatorSpec::new("Brooks-Corey").with("alpha", json!(1.0));
        assert!(matches!(
            create_wrm(&missing),
            Err(ConfigError::MissingParameter { .. })
        ));
    }
}
