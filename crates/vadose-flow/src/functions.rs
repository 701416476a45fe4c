//! Scalar functions of time used by boundary conditions.

use serde::{Deserialize, Serialize};
use vadose_core::ConfigError;

/// A function `f(t)`.
///
/// ```json
/// { "type": "tabular", "times": [0.0, 10.0], "values": [1.0, 2.0] }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimeFunction {
    /// `f(t) = value`.
    Constant {
        /// The value.
        value: f64,
    },
    /// `f(t) = value + slope · (t - t0)`.
    Linear {
        /// Value at `t0`.
        value: f64,
        /// Rate of change.
        slope: f64,
        /// Reference time.
        #[serde(default)]
        t0: f64,
    },
    /// Piecewise linear through `(times[i], values[i])`, constant outside
    /// the table.
    Tabular {
        /// Strictly increasing breakpoints.
        times: Vec<f64>,
        /// Values at the breakpoints.
        values: Vec<f64>,
    },
}

impl TimeFunction {
    /// Check the table shape of a tabular function.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let Self::Tabular { times, values } = self else {
            return Ok(());
        };
        let invalid = |reason: String| ConfigError::InvalidParameter {
            context: "tabular function".into(),
            name: "times".into(),
            reason,
        };
        if times.is_empty() {
            return Err(invalid("table is empty".into()));
        }
        if times.len() != values.len() {
            return Err(invalid(format!(
                "{} times for {} values",
                times.len(),
                values.len()
            )));
        }
        if let Some(w) = times.windows(2).position(|w| w[1] <= w[0]) {
            return Err(invalid(format!(
                "times must increase strictly, found {} after {}",
                times[w + 1],
                times[w]
            )));
        }
        Ok(())
    }

    /// `f(t)`.
    pub fn value(&self, t: f64) -> f64 {
        match self {
            Self::Constant { value } => *value,
            Self::Linear { value, slope, t0 } => value + slope * (t - t0),
            Self::Tabular { times, values } => tabulated(times, values, t),
        }
    }
}

fn tabulated(times: &[f64], values: &[f64], t: f64) -> f64 {
    let (Some(&first), Some(&last)) = (times.first(), times.last()) else {
        return 0.0;
    };
    if t <= first {
        return values[0];
    }
    if t >= last {
        return values[values.len() - 1];
    }
    // First breakpoint strictly after t; t lies in [times[i-1], times[i]).
    let i = times.partition_point(|&x| x <= t);
    let (t0, t1) = (times[i - 1], times[i]);
    let (v0, v1) = (values[i - 1], values[i]);
    v0 + (v1 - v0) * (t - t0) / (t1 - t0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TimeFunction {
        TimeFunction::Tabular {
            times: vec![0.0, 10.0, 20.0],
            values: vec![1.0, 3.0, 2.0],
        }
    }

    #[test]
    fn tabular_interpolates_and_holds_ends() {
        let f = table();
        assert_eq!(f.value(-5.0), 1.0);
        assert_eq!(f.value(0.0), 1.0);
        assert_eq!(f.value(5.0), 2.0);
        assert_eq!(f.value(10.0), 3.0);
        assert_eq!(f.value(15.0), 2.5);
        assert_eq!(f.value(99.0), 2.0);
    }

    #[test]
    fn linear_uses_reference_time() {
        let f = TimeFunction::Linear {
            value: 2.0,
            slope: 0.5,
            t0: 4.0,
        };
        assert_eq!(f.value(4.0), 2.0);
        assert_eq!(f.value(8.0), 4.0);
    }

    #[test]
    fn parses_tagged_json() {
        let f: TimeFunction =
            serde_json::from_str(r#"{"type": "constant", "value": 7.5}"#).unwrap();
        assert_eq!(f, TimeFunction::Constant { value: 7.5 });
        let f: TimeFunction =
            serde_json::from_str(r#"{"type": "linear", "value": 1.0, "slope": 2.0}"#).unwrap();
        assert_eq!(f.value(1.0), 3.0);
    }

    #[test]
    fn tabular_validation() {
        assert!(table().validate().is_ok());
        let unsorted = TimeFunction::Tabular {
            times: vec![0.0, 0.0],
            values: vec![1.0, 2.0],
        };
        assert!(unsorted.validate().is_err());
        let ragged = TimeFunction::Tabular {
            times: vec![0.0, 1.0],
            values: vec![1.0],
        };
        assert!(ragged.validate().is_err());
        let empty = TimeFunction::Tabular {
            times: vec![],
            values: vec![],
        };
        assert!(empty.validate().is_err());
    }
}
