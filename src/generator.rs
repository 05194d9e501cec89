use crate::config::SimulationConfig;
use crate::db::models::NewWaterQualityLog;
use crate::readings::{Feature, Readings};
use crate::trigger::AbnormalTrigger;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tracing::{debug, warn};

pub const NORMAL_REMARK: &str = "Simulated real-time sensor log.";

/// Category of unhealthy pond condition injected into an abnormal reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stressor {
    LowOxygen,
    HighAmmonia,
    PhImbalance,
    HighNitrite,
    TemperatureStress,
}

impl Stressor {
    pub const ALL: [Stressor; 5] = [
        Stressor::LowOxygen,
        Stressor::HighAmmonia,
        Stressor::PhImbalance,
        Stressor::HighNitrite,
        Stressor::TemperatureStress,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Stressor::LowOxygen => "Low Dissolved Oxygen",
            Stressor::HighAmmonia => "High Ammonia",
            Stressor::PhImbalance => "pH Imbalance",
            Stressor::HighNitrite => "High Nitrite",
            Stressor::TemperatureStress => "Temperature Stress",
        }
    }

    pub fn remark(self) -> String {
        format!("Unhealthy State: {} Detected.", self.label())
    }

    /// Parse a log remark back into the stressor that produced it.
    pub fn from_remark(remark: &str) -> Option<Stressor> {
        Stressor::ALL.into_iter().find(|s| s.remark() == remark)
    }

    pub fn feature(self) -> Feature {
        match self {
            Stressor::LowOxygen => Feature::DissolvedOxygen,
            Stressor::HighAmmonia => Feature::Ammonia,
            Stressor::PhImbalance => Feature::Ph,
            Stressor::HighNitrite => Feature::Nitrite,
            Stressor::TemperatureStress => Feature::Temperature,
        }
    }

    /// Unhealthy ranges for the targeted feature. Two-sided stressors have two.
    pub fn ranges(self) -> &'static [(f64, f64)] {
        match self {
            Stressor::LowOxygen => &[(2.5, 4.0)],
            Stressor::HighAmmonia => &[(0.6, 1.2)],
            Stressor::PhImbalance => &[(6.5, 7.2), (9.0, 9.8)],
            Stressor::HighNitrite => &[(0.5, 1.5)],
            Stressor::TemperatureStress => &[(24.0, 26.0), (34.0, 36.0)],
        }
    }

    /// Override the targeted feature with a value from one of its unhealthy ranges.
    pub fn apply<R: Rng + ?Sized>(self, rng: &mut R, readings: &mut Readings) {
        let ranges = self.ranges();
        let (low, high) = ranges[rng.gen_range(0..ranges.len())];
        let feature = self.feature();
        readings.set(feature, sample(rng, feature, low, high));
    }
}

fn decimals(feature: Feature) -> i32 {
    match feature {
        Feature::Ammonia | Feature::Nitrite => 3,
        Feature::Salinity => 0,
        _ => 2,
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn sample<R: Rng + ?Sized>(rng: &mut R, feature: Feature, low: f64, high: f64) -> f64 {
    if feature == Feature::Salinity {
        return rng.gen_range(low as i64..=high as i64) as f64;
    }
    round_to(rng.gen_range(low..=high), decimals(feature))
}

/// Draw every feature from its healthy range.
pub fn normal_readings<R: Rng + ?Sized>(rng: &mut R) -> Readings {
    let mut readings = Readings {
        dissolved_oxygen_mg_l: 0.0,
        ph: 0.0,
        temperature_c: 0.0,
        ammonia_ppm: 0.0,
        nitrite_ppm: 0.0,
        salinity_ppt: 0.0,
    };
    for feature in Feature::ALL {
        let (low, high) = feature.normal_range();
        readings.set(feature, sample(rng, feature, low, high));
    }
    readings
}

/// Healthy readings with one uniformly chosen stressor applied.
pub fn stressed_readings<R: Rng + ?Sized>(rng: &mut R) -> (Readings, Stressor) {
    let mut readings = normal_readings(rng);
    let stressor = *Stressor::ALL
        .choose(rng)
        .unwrap_or(&Stressor::LowOxygen);
    stressor.apply(rng, &mut readings);
    (readings, stressor)
}

pub fn log_id(log_counter: u64) -> String {
    format!("WQ_LOG{:06}", log_counter)
}

pub struct LogGenerator {
    rng: StdRng,
    abnormal_probability: f64,
    trigger: Arc<dyn AbnormalTrigger>,
}

impl LogGenerator {
    pub fn new(config: &SimulationConfig, trigger: Arc<dyn AbnormalTrigger>) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let abnormal_probability = if config.abnormal_probability.is_finite() {
            config.abnormal_probability.clamp(0.0, 1.0)
        } else {
            let fallback = SimulationConfig::default().abnormal_probability;
            warn!(
                "Invalid abnormal_probability {}, using {}",
                config.abnormal_probability, fallback
            );
            fallback
        };

        Self {
            rng,
            abnormal_probability,
            trigger,
        }
    }

    /// Produce one log for `crop_id`. Consumes a pending trigger signal, if any.
    pub fn generate(
        &mut self,
        crop_id: &str,
        log_counter: u64,
        timestamp: DateTime<Utc>,
    ) -> NewWaterQualityLog {
        let forced = self.trigger.take();
        if forced {
            warn!("Forcing abnormal reading for {}", crop_id);
        }

        let is_abnormal = forced || self.rng.gen_bool(self.abnormal_probability);

        let (readings, remarks) = if is_abnormal {
            let (readings, stressor) = stressed_readings(&mut self.rng);
            warn!(
                "Generated ABNORMAL reading for {}: {}",
                crop_id,
                stressor.label()
            );
            (readings, stressor.remark())
        } else {
            (normal_readings(&mut self.rng), NORMAL_REMARK.to_string())
        };

        debug!("Generated log {} for {}", log_id(log_counter), crop_id);

        NewWaterQualityLog {
            log_id: log_id(log_counter),
            crop_id: crop_id.to_string(),
            recorded_at: timestamp,
            readings,
            remarks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::{FlagTrigger, NoTrigger};

    fn config(probability: f64) -> SimulationConfig {
        SimulationConfig {
            abnormal_probability: probability,
            trigger_file: None,
            seed: Some(7),
        }
    }

    fn in_range(value: f64, (low, high): (f64, f64)) -> bool {
        value >= low && value <= high
    }

    #[test]
    fn test_normal_logs_stay_within_normal_ranges() {
        let mut generator = LogGenerator::new(&config(0.0), Arc::new(NoTrigger));
        for n in 0..500 {
            let log = generator.generate("CROP0001", n, Utc::now());
            assert_eq!(log.remarks, NORMAL_REMARK);
            for feature in Feature::ALL {
                assert!(
                    in_range(log.readings.get(feature), feature.normal_range()),
                    "{} out of range: {}",
                    feature,
                    log.readings.get(feature)
                );
            }
        }
    }

    #[test]
    fn test_abnormal_logs_only_touch_the_stressed_feature() {
        let mut generator = LogGenerator::new(&config(1.0), Arc::new(NoTrigger));
        let mut seen = std::collections::HashSet::new();

        for n in 0..500 {
            let log = generator.generate("CROP0001", n, Utc::now());
            let stressor = Stressor::from_remark(&log.remarks).expect("stressor remark");
            seen.insert(stressor);

            for feature in Feature::ALL {
                let value = log.readings.get(feature);
                if feature == stressor.feature() {
                    assert!(stressor.ranges().iter().any(|r| in_range(value, *r)));
                } else {
                    assert!(in_range(value, feature.normal_range()));
                }
            }
        }

        assert_eq!(seen.len(), Stressor::ALL.len());
    }

    #[test]
    fn test_trigger_forces_exactly_one_abnormal_log() {
        let trigger = Arc::new(FlagTrigger::new());
        let mut generator = LogGenerator::new(&config(0.0), trigger.clone());

        trigger.arm();
        let forced = generator.generate("CROP0001", 1, Utc::now());
        assert!(Stressor::from_remark(&forced.remarks).is_some());
        assert!(!trigger.is_armed());

        let next = generator.generate("CROP0001", 2, Utc::now());
        assert_eq!(next.remarks, NORMAL_REMARK);
    }

    #[test]
    fn test_non_finite_probability_falls_back_to_default() {
        for probability in [f64::NAN, f64::INFINITY] {
            let mut generator = LogGenerator::new(&config(probability), Arc::new(NoTrigger));
            assert!((generator.abnormal_probability - 0.2).abs() < f64::EPSILON);
            generator.generate("CROP0001", 1, Utc::now());
        }

        let generator = LogGenerator::new(&config(3.0), Arc::new(NoTrigger));
        assert!((generator.abnormal_probability - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_log_id_format() {
        assert_eq!(log_id(42), "WQ_LOG000042");
        assert_eq!(log_id(1_700_000_000), "WQ_LOG1700000000");
    }

    #[test]
    fn test_seeded_generators_are_reproducible() {
        let timestamp = Utc::now();
        let mut a = LogGenerator::new(&config(0.5), Arc::new(NoTrigger));
        let mut b = LogGenerator::new(&config(0.5), Arc::new(NoTrigger));
        for n in 0..20 {
            let left = a.generate("CROP0001", n, timestamp);
            let right = b.generate("CROP0001", n, timestamp);
            assert_eq!(left.readings, right.readings);
            assert_eq!(left.remarks, right.remarks);
        }
    }
}
