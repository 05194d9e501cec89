use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    DissolvedOxygen,
    Ph,
    Temperature,
    Ammonia,
    Nitrite,
    Salinity,
}

impl Feature {
    pub const ALL: [Feature; 6] = [
        Feature::DissolvedOxygen,
        Feature::Ph,
        Feature::Temperature,
        Feature::Ammonia,
        Feature::Nitrite,
        Feature::Salinity,
    ];

    /// Column / artifact name of the feature.
    pub fn name(self) -> &'static str {
        match self {
            Feature::DissolvedOxygen => "dissolved_oxygen_mg_l",
            Feature::Ph => "ph",
            Feature::Temperature => "temperature_c",
            Feature::Ammonia => "ammonia_ppm",
            Feature::Nitrite => "nitrite_ppm",
            Feature::Salinity => "salinity_ppt",
        }
    }

    /// Inclusive range a healthy pond reads within.
    pub fn normal_range(self) -> (f64, f64) {
        match self {
            Feature::DissolvedOxygen => (5.0, 7.0),
            Feature::Ph => (7.8, 8.5),
            Feature::Temperature => (28.0, 32.0),
            Feature::Ammonia => (0.01, 0.25),
            Feature::Nitrite => (0.01, 0.15),
            Feature::Salinity => (15.0, 25.0),
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Feature {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        Feature::ALL
            .into_iter()
            .find(|feature| feature.name() == s)
            .ok_or_else(|| AppError::InvalidData(format!("Unknown feature: '{}'", s)))
    }
}

/// One sensor sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Readings {
    pub dissolved_oxygen_mg_l: f64,
    pub ph: f64,
    pub temperature_c: f64,
    pub ammonia_ppm: f64,
    pub nitrite_ppm: f64,
    pub salinity_ppt: f64,
}

impl Readings {
    pub fn get(&self, feature: Feature) -> f64 {
        match feature {
            Feature::DissolvedOxygen => self.dissolved_oxygen_mg_l,
            Feature::Ph => self.ph,
            Feature::Temperature => self.temperature_c,
            Feature::Ammonia => self.ammonia_ppm,
            Feature::Nitrite => self.nitrite_ppm,
            Feature::Salinity => self.salinity_ppt,
        }
    }

    pub fn set(&mut self, feature: Feature, value: f64) {
        match feature {
            Feature::DissolvedOxygen => self.dissolved_oxygen_mg_l = value,
            Feature::Ph => self.ph = value,
            Feature::Temperature => self.temperature_c = value,
            Feature::Ammonia => self.ammonia_ppm = value,
            Feature::Nitrite => self.nitrite_ppm = value,
            Feature::Salinity => self.salinity_ppt = value,
        }
    }
}

/// Feature values keyed by name, independent of the order they were supplied in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    values: [f64; 6],
}

impl FeatureVector {
    /// Build from `(name, value)` pairs. Every feature must appear exactly once.
    pub fn from_named<'a, I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut values = [None; 6];

        for (name, value) in pairs {
            let feature: Feature = name.parse()?;
            if values[feature.index()].replace(value).is_some() {
                return Err(AppError::InvalidData(format!(
                    "Feature '{}' supplied more than once",
                    name
                )));
            }
        }

        let mut resolved = [0.0; 6];
        for feature in Feature::ALL {
            resolved[feature.index()] = values[feature.index()].ok_or_else(|| {
                AppError::InvalidData(format!("Missing feature: '{}'", feature))
            })?;
        }

        Ok(Self { values: resolved })
    }

    pub fn get(&self, feature: Feature) -> f64 {
        self.values[feature.index()]
    }
}

impl From<&Readings> for FeatureVector {
    fn from(readings: &Readings) -> Self {
        let mut values = [0.0; 6];
        for feature in Feature::ALL {
            values[feature.index()] = readings.get(feature);
        }
        Self { values }
    }
}
