//! Synthetic Berlin delivery trips.
//!
//! The duration model below is the ground truth the estimator learns:
//! distance over a vehicle speed, scaled by weather, traffic and driver
//! penalties, plus a little noise. Traffic is drawn from a rush-hour
//! weighted distribution so it correlates with the hour of day.

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDateTime, Timelike};
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand::rngs::StdRng;
use std::path::Path;

use crate::geo::haversine_km;
use crate::types::{Experience, Traffic, TripRecord, Vehicle, Weather};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct District {
    pub name: &'static str,
    pub lat: f64,
    pub lon: f64,
}

pub const BERLIN_DISTRICTS: [District; 12] = [
    District { name: "Mitte", lat: 52.5200, lon: 13.4050 },
    District { name: "Kreuzberg", lat: 52.4981, lon: 13.3918 },
    District { name: "Prenzlauer Berg", lat: 52.5423, lon: 13.4140 },
    District { name: "Charlottenburg", lat: 52.5167, lon: 13.3000 },
    District { name: "Schoneberg", lat: 52.4822, lon: 13.3571 },
    District { name: "Friedrichshain", lat: 52.5117, lon: 13.4333 },
    District { name: "Neukölln", lat: 52.4800, lon: 13.4333 },
    District { name: "Pankow", lat: 52.5667, lon: 13.4000 },
    District { name: "Lichtenberg", lat: 52.5333, lon: 13.5000 },
    District { name: "Spandau", lat: 52.5333, lon: 13.1975 },
    District { name: "Tempelhof", lat: 52.4667, lon: 13.3833 },
    District { name: "Steglitz", lat: 52.4492, lon: 13.3217 },
];

/// GPS noise window in degrees, applied to both axes.
pub const JITTER_DEG: f64 = 0.03;
pub const MIN_DURATION_MINS: f64 = 5.0;
const HOURS: std::ops::RangeInclusive<u32> = 8..=22;
const NOISE_MINS: std::ops::Range<f64> = -2.0..10.0;
const LOOKBACK_DAYS: i64 = 30;

pub fn is_rush_hour(hour: u32) -> bool {
    (8..=9).contains(&hour) || (17..=19).contains(&hour)
}

pub fn weather_multiplier(w: Weather) -> f64 {
    match w {
        Weather::Rainy => 1.2,
        Weather::Snow => 1.5,
        Weather::Sunny | Weather::Cloudy => 1.0,
    }
}

pub fn traffic_multiplier(t: Traffic) -> f64 {
    match t {
        Traffic::Low => 1.0,
        Traffic::Medium => 1.2,
        Traffic::High => 1.5,
    }
}

pub fn experience_multiplier(e: Experience) -> f64 {
    match e {
        Experience::Junior => 1.1,
        Experience::Senior => 1.0,
        Experience::Expert => 0.9,
    }
}

/// Noise-free duration in minutes before the floor is applied.
pub fn expected_duration_mins(
    distance_km: f64,
    vehicle: Vehicle,
    weather: Weather,
    traffic: Traffic,
    exp: Experience,
) -> f64 {
    let base = distance_km / vehicle.speed_kph() * 60.0;
    base * weather_multiplier(weather) * traffic_multiplier(traffic) * experience_multiplier(exp)
}

fn round_to(x: f64, places: i32) -> f64 {
    let f = 10f64.powi(places);
    (x * f).round() / f
}

/// Produces labelled trips over a fixed district map.
pub struct TripGenerator {
    rng: StdRng,
    districts: Vec<District>,
    /// Timestamps fall within `LOOKBACK_DAYS` before this instant.
    anchor: NaiveDateTime,
    rush_traffic: WeightedIndex<f64>,
    offpeak_traffic: WeightedIndex<f64>,
}

impl TripGenerator {
    /// Create a generator over `districts`. Passing a seed makes the corpus reproducible.
    pub fn new(districts: &[District], anchor: NaiveDateTime, seed: Option<u64>) -> Result<Self> {
        anyhow::ensure!(!districts.is_empty(), "at least one district is required");
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            rng,
            districts: districts.to_vec(),
            anchor,
            // weights over [Low, Medium, High]
            rush_traffic: WeightedIndex::new([0.0, 0.3, 0.7])?,
            offpeak_traffic: WeightedIndex::new([0.5, 0.4, 0.1])?,
        })
    }

    pub fn berlin(seed: Option<u64>) -> Result<Self> {
        Self::new(&BERLIN_DISTRICTS, chrono::Local::now().naive_local(), seed)
    }

    fn jitter(&mut self) -> f64 {
        self.rng.gen_range(-JITTER_DEG..=JITTER_DEG)
    }

    fn sample_traffic(&mut self, hour: u32) -> Traffic {
        let idx = if is_rush_hour(hour) {
            self.rush_traffic.sample(&mut self.rng)
        } else {
            self.offpeak_traffic.sample(&mut self.rng)
        };
        Traffic::ALL[idx]
    }

    /// Generate the `index`-th trip.
    pub fn next_trip(&mut self, index: usize) -> TripRecord {
        let pickup = self.districts[self.rng.gen_range(0..self.districts.len())];
        let dropoff = self.districts[self.rng.gen_range(0..self.districts.len())];

        let pickup_lat = pickup.lat + self.jitter();
        let pickup_lon = pickup.lon + self.jitter();
        let dropoff_lat = dropoff.lat + self.jitter();
        let dropoff_lon = dropoff.lon + self.jitter();
        let distance_km = haversine_km(pickup_lat, pickup_lon, dropoff_lat, dropoff_lon);

        let weather = *Weather::ALL.choose(&mut self.rng).unwrap_or(&Weather::Cloudy);
        let vehicle = *Vehicle::ALL.choose(&mut self.rng).unwrap_or(&Vehicle::Bike);

        let hour = self.rng.gen_range(HOURS);
        let traffic = self.sample_traffic(hour);
        let exp = *Experience::ALL.choose(&mut self.rng).unwrap_or(&Experience::Senior);

        let mut duration = expected_duration_mins(distance_km, vehicle, weather, traffic, exp);
        duration += self.rng.gen_range(NOISE_MINS);
        let duration = duration.max(MIN_DURATION_MINS);

        let days_back = self.rng.gen_range(0..=LOOKBACK_DAYS);
        let minute = self.rng.gen_range(0..60);
        let day = self.anchor - Duration::days(days_back);
        let ts = day
            .with_hour(hour)
            .and_then(|t| t.with_minute(minute))
            .and_then(|t| t.with_second(0))
            .unwrap_or(day);

        TripRecord {
            order_id: format!("ORD-{}", 1000 + index),
            pickup_district: pickup.name.to_string(),
            pickup_lat: round_to(pickup_lat, 4),
            pickup_lon: round_to(pickup_lon, 4),
            dropoff_district: dropoff.name.to_string(),
            dropoff_lat: round_to(dropoff_lat, 4),
            dropoff_lon: round_to(dropoff_lon, 4),
            distance_km: round_to(distance_km, 2),
            vehicle_type: vehicle,
            weather,
            traffic_level: traffic,
            driver_experience: exp,
            timestamp: ts.format("%Y-%m-%d %H:%M:%S").to_string(),
            delivery_duration_mins: duration as u32,
        }
    }

    pub fn generate(&mut self, n: usize) -> Vec<TripRecord> {
        (0..n).map(|i| self.next_trip(i)).collect()
    }
}

/// Write trips as CSV with a header row.
pub fn write_corpus(path: &Path, trips: &[TripRecord]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }
    let mut w = csv::Writer::from_path(path).with_context(|| format!("failed to open {}", path.display()))?;
    for t in trips {
        w.serialize(t)?;
    }
    w.flush()?;
    Ok(())
}

pub fn read_corpus(path: &Path) -> Result<Vec<TripRecord>> {
    let mut r = csv::Reader::from_path(path).with_context(|| format!("failed to read corpus at {}", path.display()))?;
    let mut out = Vec::new();
    for (i, row) in r.deserialize().enumerate() {
        let rec: TripRecord = row.with_context(|| format!("bad corpus row {}", i + 1))?;
        out.push(rec);
    }
    Ok(out)
}
