use serde::{Deserialize, Serialize};
use std::fmt;

/// Rainfall below this is reported as clear.
pub const CLEAR_BELOW_MM: f64 = 0.1;
/// Rainfall below this (and not clear) is light rain.
pub const LIGHT_RAIN_BELOW_MM: f64 = 2.0;

/// Coarse description of a rainfall amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeatherOutlook {
    Clear,
    LightRain,
    HeavyRain,
}

impl WeatherOutlook {
    pub fn from_rainfall(mm: f64) -> Self {
        if mm < CLEAR_BELOW_MM {
            WeatherOutlook::Clear
        } else if mm < LIGHT_RAIN_BELOW_MM {
            WeatherOutlook::LightRain
        } else {
            WeatherOutlook::HeavyRain
        }
    }
}

impl fmt::Display for WeatherOutlook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WeatherOutlook::Clear => "Clear",
            WeatherOutlook::LightRain => "Light Rain",
            WeatherOutlook::HeavyRain => "Heavy Rain/Storm",
        };
        write!(f, "{}", label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds() {
        assert_eq!(WeatherOutlook::from_rainfall(0.0), WeatherOutlook::Clear);
        assert_eq!(WeatherOutlook::from_rainfall(0.05), WeatherOutlook::Clear);
        assert_eq!(WeatherOutlook::from_rainfall(0.1), WeatherOutlook::LightRain);
        assert_eq!(WeatherOutlook::from_rainfall(1.99), WeatherOutlook::LightRain);
        assert_eq!(WeatherOutlook::from_rainfall(2.0), WeatherOutlook::HeavyRain);
        // Models can undershoot zero.
        assert_eq!(WeatherOutlook::from_rainfall(-0.3), WeatherOutlook::Clear);
    }

    #[test]
    fn test_display() {
        assert_eq!(WeatherOutlook::HeavyRain.to_string(), "Heavy Rain/Storm");
        assert_eq!(WeatherOutlook::LightRain.to_string(), "Light Rain");
        assert_eq!(WeatherOutlook::Clear.to_string(), "Clear");
    }
}
