// src/weather.rs
//
// Weather presets used by the benchmark batteries. Suites carry lists of
// preset ids (see the WEATHER_* sets in suites.rs); the driver resolves an
// id to a concrete preset at episode init and fails the run if the id is
// outside the table.

use serde::{Deserialize, Serialize};

/// The closed table of weather presets, ids 1 through 14.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherPreset {
    ClearNoon,
    CloudyNoon,
    WetNoon,
    WetCloudyNoon,
    MidRainyNoon,
    HardRainNoon,
    SoftRainNoon,
    ClearSunset,
    CloudySunset,
    WetSunset,
    WetCloudySunset,
    MidRainSunset,
    HardRainSunset,
    SoftRainSunset,
}

impl WeatherPreset {
    /// Resolve a preset id from a suite's weather list. Ids start at 1.
    pub fn from_id(id: u32) -> Option<Self> {
        use WeatherPreset::*;
        match id {
            1 => Some(ClearNoon),
            2 => Some(CloudyNoon),
            3 => Some(WetNoon),
            4 => Some(WetCloudyNoon),
            5 => Some(MidRainyNoon),
            6 => Some(HardRainNoon),
            7 => Some(SoftRainNoon),
            8 => Some(ClearSunset),
            9 => Some(CloudySunset),
            10 => Some(WetSunset),
            11 => Some(WetCloudySunset),
            12 => Some(MidRainSunset),
            13 => Some(HardRainSunset),
            14 => Some(SoftRainSunset),
            _ => None,
        }
    }

    /// The preset's id in the weather table.
    pub fn id(&self) -> u32 {
        use WeatherPreset::*;
        match self {
            ClearNoon => 1,
            CloudyNoon => 2,
            WetNoon => 3,
            WetCloudyNoon => 4,
            MidRainyNoon => 5,
            HardRainNoon => 6,
            SoftRainNoon => 7,
            ClearSunset => 8,
            CloudySunset => 9,
            WetSunset => 10,
            WetCloudySunset => 11,
            MidRainSunset => 12,
            HardRainSunset => 13,
            SoftRainSunset => 14,
        }
    }
}

impl std::fmt::Display for WeatherPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}
