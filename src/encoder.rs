//! Free-text trip attributes -> `EncodedFeatureVector`.
//!
//! Callers (people or an agent) say "rain", "RAINING" or "heavy traffic"
//! rather than the canonical labels, so every categorical field is resolved
//! with a loose match before encoding. Prediction and explanation both go
//! through [`encode_trip`], so the estimator only ever sees in-domain codes.

use crate::types::{EncodedFeatureVector, Experience, Traffic, Vehicle, Weather};

pub const DEFAULT_WEATHER: Weather = Weather::Cloudy;
pub const DEFAULT_TRAFFIC: Traffic = Traffic::Medium;
pub const DEFAULT_EXPERIENCE: Experience = Experience::Senior;
pub const DEFAULT_VEHICLE: Vehicle = Vehicle::Bike;

/// Shortest input allowed to match by being contained in an option.
const MIN_FRAGMENT_LEN: usize = 3;
/// Shared leading characters that count as the same word stem ("raining"/"rainy").
const MIN_STEM_LEN: usize = 4;

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count()
}

/// Case-insensitive match of `input` against the canonical `options`.
///
/// An option matches when the input contains it, when the input (at least
/// three characters) is contained in it, or when both share a four-letter
/// stem. Options are tried in order; blank input never matches.
pub fn fuzzy_match<T: Copy>(input: &str, options: &[(&str, T)]) -> Option<T> {
    let needle = input.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    options.iter().find_map(|(label, value)| {
        let label = label.to_lowercase();
        let hit = needle.contains(&label)
            || (needle.chars().count() >= MIN_FRAGMENT_LEN && label.contains(&needle))
            || common_prefix_len(&needle, &label) >= MIN_STEM_LEN;
        hit.then_some(*value)
    })
}

fn labelled<T: Copy>(all: &[T], name: fn(T) -> &'static str) -> Vec<(&'static str, T)> {
    all.iter().map(|v| (name(*v), *v)).collect()
}

pub fn normalize_weather(input: &str) -> Weather {
    fuzzy_match(input, &labelled(&Weather::ALL, Weather::name)).unwrap_or(DEFAULT_WEATHER)
}

pub fn normalize_traffic(input: &str) -> Traffic {
    fuzzy_match(input, &labelled(&Traffic::ALL, Traffic::name)).unwrap_or(DEFAULT_TRAFFIC)
}

pub fn normalize_experience(input: &str) -> Experience {
    fuzzy_match(input, &labelled(&Experience::ALL, Experience::name)).unwrap_or(DEFAULT_EXPERIENCE)
}

/// Vehicles only match when the input contains the canonical name, so a
/// short token like "an" cannot select Van. Anything else is the Bike reference.
pub fn normalize_vehicle(input: &str) -> Vehicle {
    let needle = input.trim().to_lowercase();
    Vehicle::ALL
        .into_iter()
        .find(|v| needle.contains(&v.name().to_lowercase()))
        .unwrap_or(DEFAULT_VEHICLE)
}

/// Encode caller-supplied trip attributes.
pub fn encode_trip(
    vehicle: &str,
    weather: &str,
    distance_km: f64,
    traffic: &str,
    experience: &str,
) -> EncodedFeatureVector {
    let enc = EncodedFeatureVector::new(
        distance_km,
        normalize_vehicle(vehicle),
        normalize_weather(weather),
        normalize_traffic(traffic),
        normalize_experience(experience),
    );
    tracing::debug!(?enc, vehicle, weather, traffic, experience, "encoded trip");
    enc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weather_synonyms() {
        for s in ["Rainy", "rain", "RAIN", "raining", "  Rainy day "] {
            assert_eq!(normalize_weather(s), Weather::Rainy, "input {s:?}");
        }
        assert_eq!(normalize_weather("snowing"), Weather::Snow);
        assert_eq!(normalize_weather("sun"), Weather::Sunny);
        assert_eq!(normalize_weather("cloudy skies"), Weather::Cloudy);
    }

    #[test]
    fn test_fallback_defaults() {
        assert_eq!(normalize_weather("Foggy"), Weather::Cloudy);
        assert_eq!(normalize_traffic("gridlock"), Traffic::Medium);
        assert_eq!(normalize_experience("intern"), Experience::Senior);
        assert_eq!(normalize_vehicle("truck"), Vehicle::Bike);
    }

    #[test]
    fn test_blank_input_uses_default() {
        assert_eq!(normalize_weather(""), Weather::Cloudy);
        assert_eq!(normalize_traffic("   "), Traffic::Medium);
        assert_eq!(normalize_experience(""), Experience::Senior);
    }

    #[test]
    fn test_short_tokens_do_not_overmatch() {
        assert_eq!(normalize_vehicle("an"), Vehicle::Bike);
        assert_eq!(normalize_weather("n"), Weather::Cloudy);
    }

    #[test]
    fn test_traffic_and_experience() {
        assert_eq!(normalize_traffic("high traffic"), Traffic::High);
        assert_eq!(normalize_traffic("low"), Traffic::Low);
        assert_eq!(normalize_experience("junior driver"), Experience::Junior);
        assert_eq!(normalize_experience("EXPERT"), Experience::Expert);
    }

    #[test]
    fn test_van_in_rain_encoding() {
        let enc = encode_trip("Van", "Rain", 5.0, "High", "Junior");
        assert_eq!(enc.distance_km, 5.0);
        assert_eq!(enc.weather_code, 2);
        assert_eq!(enc.traffic_code, 2);
        assert_eq!(enc.exp_code, 0);
        assert_eq!(enc.van, 1);
        assert_eq!(enc.scooter, 0);
    }

    #[test]
    fn test_vehicle_indicators_exclusive() {
        let scooter = encode_trip("e-Scooter", "Sunny", 1.0, "Low", "Expert");
        assert_eq!((scooter.scooter, scooter.van), (1, 0));
        let bike = encode_trip("Bike", "Sunny", 1.0, "Low", "Expert");
        assert_eq!((bike.scooter, bike.van), (0, 0));
    }
}
