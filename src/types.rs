use serde::{Deserialize, Serialize};

// ---------- Categorical trip attributes ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Vehicle {
    Bike,
    Scooter,
    Van,
}

impl Vehicle {
    pub const ALL: [Vehicle; 3] = [Vehicle::Bike, Vehicle::Scooter, Vehicle::Van];

    pub fn name(self) -> &'static str {
        match self {
            Vehicle::Bike => "Bike",
            Vehicle::Scooter => "Scooter",
            Vehicle::Van => "Van",
        }
    }

    /// Reference speed in km/h used by the trip generator.
    pub fn speed_kph(self) -> f64 {
        match self {
            Vehicle::Bike => 15.0,
            Vehicle::Scooter => 25.0,
            Vehicle::Van => 30.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Weather {
    Sunny,
    Cloudy,
    Rainy,
    Snow,
}

impl Weather {
    pub const ALL: [Weather; 4] = [Weather::Sunny, Weather::Cloudy, Weather::Rainy, Weather::Snow];

    pub fn name(self) -> &'static str {
        match self {
            Weather::Sunny => "Sunny",
            Weather::Cloudy => "Cloudy",
            Weather::Rainy => "Rainy",
            Weather::Snow => "Snow",
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Weather::Sunny => 0,
            Weather::Cloudy => 1,
            Weather::Rainy => 2,
            Weather::Snow => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Traffic {
    Low,
    Medium,
    High,
}

impl Traffic {
    pub const ALL: [Traffic; 3] = [Traffic::Low, Traffic::Medium, Traffic::High];

    pub fn name(self) -> &'static str {
        match self {
            Traffic::Low => "Low",
            Traffic::Medium => "Medium",
            Traffic::High => "High",
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Traffic::Low => 0,
            Traffic::Medium => 1,
            Traffic::High => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Experience {
    Junior,
    Senior,
    Expert,
}

impl Experience {
    pub const ALL: [Experience; 3] = [Experience::Junior, Experience::Senior, Experience::Expert];

    pub fn name(self) -> &'static str {
        match self {
            Experience::Junior => "Junior",
            Experience::Senior => "Senior",
            Experience::Expert => "Expert",
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Experience::Junior => 0,
            Experience::Senior => 1,
            Experience::Expert => 2,
        }
    }
}

// ---------- Records ----------

/// One row of the training corpus. Field names are the CSV column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    pub order_id: String,
    pub pickup_district: String,
    pub pickup_lat: f64,
    pub pickup_lon: f64,
    pub dropoff_district: String,
    pub dropoff_lat: f64,
    pub dropoff_lon: f64,
    pub distance_km: f64,
    pub vehicle_type: Vehicle,
    pub weather: Weather,
    pub traffic_level: Traffic,
    pub driver_experience: Experience,
    pub timestamp: String,
    pub delivery_duration_mins: u32,
}

/// Column order the estimator was trained on. Artifacts are checked against it.
pub const FEATURE_NAMES: [&str; 6] = [
    "distance_km",
    "weather_code",
    "traffic_code",
    "exp_code",
    "vehicle_type_Scooter",
    "vehicle_type_Van",
];

pub const N_FEATURES: usize = FEATURE_NAMES.len();

/// Fixed-order numeric input of the estimator. Bike is the reference
/// category, so at most one of the two vehicle indicators is set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EncodedFeatureVector {
    pub distance_km: f64,
    pub weather_code: u8,
    pub traffic_code: u8,
    pub exp_code: u8,
    pub scooter: u8,
    pub van: u8,
}

impl EncodedFeatureVector {
    pub fn new(distance_km: f64, vehicle: Vehicle, weather: Weather, traffic: Traffic, exp: Experience) -> Self {
        Self {
            distance_km,
            weather_code: weather.code(),
            traffic_code: traffic.code(),
            exp_code: exp.code(),
            scooter: u8::from(vehicle == Vehicle::Scooter),
            van: u8::from(vehicle == Vehicle::Van),
        }
    }

    pub fn to_array(&self) -> [f64; N_FEATURES] {
        [
            self.distance_km,
            f64::from(self.weather_code),
            f64::from(self.traffic_code),
            f64::from(self.exp_code),
            f64::from(self.scooter),
            f64::from(self.van),
        ]
    }
}

/// Training-time label summary used by the drift check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineStatistics {
    pub mean_duration: f64,
    pub std_duration: f64,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contribution {
    pub feature: String,
    pub minutes: f64,
}

/// Base value plus one signed contribution per feature, in `FEATURE_NAMES` order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributionReport {
    pub base_value: f64,
    pub prediction: f64,
    pub contributions: Vec<Contribution>,
}

impl AttributionReport {
    /// Base value plus every contribution, including ones too small to display.
    pub fn reconstructed(&self) -> f64 {
        self.base_value + self.contributions.iter().map(|c| c.minutes).sum::<f64>()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriftReport {
    pub baseline_mean: f64,
    pub current_mean: f64,
    pub z_score: f64,
    pub drift_detected: bool,
}
