//! Fault schedule, load variation profile and run configuration.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use super::sim_time::{DeltaTime, MAX_STEPS, Time, TimeAxis, interval_count};
use crate::error::ConfigError;
use crate::io::pandapower::Network;

/// The load a fault acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultTarget {
    /// Position in the load table.
    Load(usize),
    /// The first in-service load connected to this bus.
    Bus(i64),
}

impl FaultTarget {
    /// Resolves the target to a position in `net.load`.
    pub fn resolve(&self, net: &Network) -> Result<usize, ConfigError> {
        match *self {
            FaultTarget::Load(index) => {
                let load = net.load.get(index).ok_or(ConfigError::FaultLoadOutOfRange {
                    index,
                    count: net.load.len(),
                })?;
                if !load.in_service {
                    return Err(ConfigError::FaultLoadOutOfService(index));
                }
                Ok(index)
            }
            FaultTarget::Bus(bus) => net
                .load
                .iter()
                .position(|l| l.bus == bus && l.in_service)
                .ok_or(ConfigError::NoLoadAtBus(bus)),
        }
    }
}

/// A single fault window: the target load's `p_mw` is multiplied by
/// `multiplier` while `onset <= t < onset + duration`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaultSchedule {
    pub target: FaultTarget,
    /// Seconds.
    pub onset: f64,
    /// Seconds.
    pub duration: f64,
    pub multiplier: f64,
}

impl FaultSchedule {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.onset >= 0.0) || !self.onset.is_finite() {
            return Err(ConfigError::NegativeFaultOnset(self.onset));
        }
        if !(self.duration >= 0.0) || !self.duration.is_finite() {
            return Err(ConfigError::NegativeFaultDuration(self.duration));
        }
        if !(self.multiplier > 0.0) || !self.multiplier.is_finite() {
            return Err(ConfigError::InvalidMultiplier(self.multiplier));
        }
        Ok(())
    }

    /// Whether the fault is applied at `t`.
    ///
    /// Both window edges are shifted down by `1e-6 * dt`, so an edge that
    /// lies on the step grid is decided the same way despite rounding in `t`.
    pub fn is_active(&self, t: Time, dt: DeltaTime) -> bool {
        let eps = 1e-6 * dt.0;
        let start = self.onset - eps;
        let end = self.onset + self.duration - eps;
        t.0 >= start && t.0 < end
    }

    /// End of the window (seconds).
    pub fn end(&self) -> f64 {
        self.onset + self.duration
    }
}

/// Sinusoidal scaling `1 + amplitude * sin(2 pi f t)` of every in-service load.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadVariation {
    pub amplitude: f64,
    pub frequency_hz: f64,
}

impl LoadVariation {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..1.0).contains(&self.amplitude) {
            return Err(ConfigError::InvalidVariation {
                what: "amplitude must lie in [0, 1)",
            });
        }
        if !(self.frequency_hz >= 0.0) || !self.frequency_hz.is_finite() {
            return Err(ConfigError::InvalidVariation {
                what: "frequency must be non-negative and finite",
            });
        }
        Ok(())
    }

    pub fn factor(&self, t: Time) -> f64 {
        1.0 + self.amplitude * (2.0 * PI * self.frequency_hz * t.0).sin()
    }
}

/// Everything a quasi-steady-state run needs besides the network and the solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QssConfig {
    /// Simulated time span (seconds).
    pub duration: f64,
    /// Step between solves (seconds).
    pub time_step: f64,
    pub fault: FaultSchedule,
    #[serde(default)]
    pub load_variation: Option<LoadVariation>,
}

impl QssConfig {
    /// 10 s at 10 ms with a threefold load increase from 1.0 s to 1.1 s.
    pub fn reference(target: FaultTarget) -> Self {
        Self {
            duration: 10.0,
            time_step: 0.01,
            fault: FaultSchedule {
                target,
                onset: 1.0,
                duration: 0.1,
                multiplier: 3.0,
            },
            load_variation: None,
        }
    }

    /// Checks the configuration against `net` and resolves the fault load.
    ///
    /// Nothing is mutated; on success the run's time axis and fault load
    /// position are returned.
    pub fn validate(&self, net: &Network) -> Result<(TimeAxis, usize), ConfigError> {
        if !(self.duration > 0.0) || !self.duration.is_finite() {
            return Err(ConfigError::NonPositiveDuration(self.duration));
        }
        if !(self.time_step > 0.0) || !self.time_step.is_finite() {
            return Err(ConfigError::NonPositiveTimeStep(self.time_step));
        }
        if self.time_step > self.duration {
            return Err(ConfigError::TimeStepExceedsDuration {
                time_step: self.time_step,
                duration: self.duration,
            });
        }
        let steps = interval_count(self.duration, self.time_step) + 1.0;
        if !(steps <= MAX_STEPS as f64) {
            return Err(ConfigError::TooManySteps {
                steps,
                max: MAX_STEPS,
            });
        }
        self.fault.validate()?;
        if let Some(v) = &self.load_variation {
            v.validate()?;
        }
        let load = self.fault.target.resolve(net)?;
        Ok((TimeAxis::new(self.duration, self.time_step), load))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testcases::ieee9;

    #[test]
    fn test_window_on_step_grid() {
        let f = QssConfig::reference(FaultTarget::Load(0)).fault;
        let axis = TimeAxis::new(10.0, 0.01);
        let active: Vec<_> = axis
            .iter()
            .filter(|(_, t)| f.is_active(*t, axis.dt))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(active, (100..110).collect::<Vec<_>>());
    }

    #[test]
    fn test_zero_duration_never_active() {
        let f = FaultSchedule {
            target: FaultTarget::Load(0),
            onset: 1.0,
            duration: 0.0,
            multiplier: 3.0,
        };
        assert!(!f.is_active(Time(1.0), DeltaTime(0.01)));
    }

    #[test]
    fn test_target_resolution() {
        let mut net = ieee9();
        assert_eq!(FaultTarget::Bus(4).resolve(&net), Ok(0));
        assert_eq!(FaultTarget::Bus(7).resolve(&net), Ok(2));
        assert_eq!(
            FaultTarget::Bus(3).resolve(&net),
            Err(ConfigError::NoLoadAtBus(3))
        );
        assert_eq!(
            FaultTarget::Load(3).resolve(&net),
            Err(ConfigError::FaultLoadOutOfRange { index: 3, count: 3 })
        );
        net.load[1].in_service = false;
        assert_eq!(
            FaultTarget::Load(1).resolve(&net),
            Err(ConfigError::FaultLoadOutOfService(1))
        );
        assert_eq!(
            FaultTarget::Bus(5).resolve(&net),
            Err(ConfigError::NoLoadAtBus(5))
        );
    }

    #[test]
    fn test_config_validation() {
        let net = ieee9();
        let base = QssConfig::reference(FaultTarget::Load(0));
        assert!(base.validate(&net).is_ok());

        let mut c = base;
        c.duration = 0.0;
        assert_eq!(c.validate(&net), Err(ConfigError::NonPositiveDuration(0.0)));

        let mut c = base;
        c.time_step = -0.1;
        assert_eq!(c.validate(&net), Err(ConfigError::NonPositiveTimeStep(-0.1)));

        let mut c = base;
        c.time_step = 20.0;
        assert!(matches!(
            c.validate(&net),
            Err(ConfigError::TimeStepExceedsDuration { .. })
        ));

        let mut c = base;
        c.fault.onset = -1.0;
        assert_eq!(c.validate(&net), Err(ConfigError::NegativeFaultOnset(-1.0)));

        let mut c = base;
        c.fault.duration = -0.5;
        assert_eq!(
            c.validate(&net),
            Err(ConfigError::NegativeFaultDuration(-0.5))
        );

        let mut c = base;
        c.fault.multiplier = 0.0;
        assert_eq!(c.validate(&net), Err(ConfigError::InvalidMultiplier(0.0)));

        let mut c = base;
        c.load_variation = Some(LoadVariation {
            amplitude: 1.5,
            frequency_hz: 0.5,
        });
        assert!(matches!(
            c.validate(&net),
            Err(ConfigError::InvalidVariation { .. })
        ));
    }

    #[test]
    fn test_nan_inputs_rejected() {
        let net = ieee9();
        let mut c = QssConfig::reference(FaultTarget::Load(0));
        c.fault.multiplier = f64::NAN;
        assert!(matches!(
            c.validate(&net),
            Err(ConfigError::InvalidMultiplier(_))
        ));
    }

    #[test]
    fn test_step_count_limit() {
        let net = ieee9();
        let mut c = QssConfig::reference(FaultTarget::Load(0));
        c.duration = 1e20;
        c.time_step = 1.0;
        assert!(matches!(
            c.validate(&net),
            Err(ConfigError::TooManySteps { max: MAX_STEPS, .. })
        ));

        c.duration = (MAX_STEPS - 1) as f64;
        let (axis, _) = c.validate(&net).unwrap();
        assert_eq!(axis.len, MAX_STEPS);
        c.duration = MAX_STEPS as f64;
        assert!(c.validate(&net).is_err());
    }

    #[test]
    fn test_config_json() {
        let json = r#"{
            "duration": 2.0,
            "time_step": 0.1,
            "fault": {"target": {"bus": 4}, "onset": 0.5, "duration": 0.2, "multiplier": 2.0}
        }"#;
        let c: QssConfig = serde_json::from_str(json).unwrap();
        assert_eq!(c.fault.target, FaultTarget::Bus(4));
        assert!(c.load_variation.is_none());
    }

    #[test]
    fn test_variation_factor() {
        let v = LoadVariation {
            amplitude: 0.05,
            frequency_hz: 0.5,
        };
        assert!((v.factor(Time(0.0)) - 1.0).abs() < 1e-12);
        assert!((v.factor(Time(0.5)) - 1.05).abs() < 1e-12);
    }
}
