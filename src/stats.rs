//! Presentation-ready trip metrics.
//!
//! [`StatsEngine::compute`] is a pure function of the latest sample, the
//! next stop, the trace and the wall-clock time. The snapshot is always
//! rebuilt as a whole so readers never see a half-updated set of labels.

use crate::geo_utils::{haversine_distance, round_to, CompassOctant};
use crate::trace::Trace;
use crate::{Coordinate, LocationSample, TrackerConfig};
use chrono::{Local, NaiveTime};
use serde::{Deserialize, Serialize};

/// Label used when a metric cannot be computed.
pub const PLACEHOLDER_LABEL: &str = "--";

/// ETA label for arrivals within two minutes.
pub const SOON_LABEL: &str = "Soon";

/// Metrics shown next to the live map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub eta_label: String,
    pub distance_label: String,
    pub speed_kmh: u32,
    pub accuracy_m: u32,
    pub direction: CompassOctant,
    pub last_update_label: String,
    pub total_distance_km: f64,
}

impl Default for StatsSnapshot {
    fn default() -> Self {
        Self {
            eta_label: PLACEHOLDER_LABEL.to_string(),
            distance_label: PLACEHOLDER_LABEL.to_string(),
            speed_kmh: 0,
            accuracy_m: 25,
            direction: CompassOctant::N,
            last_update_label: PLACEHOLDER_LABEL.to_string(),
            total_distance_km: 0.0,
        }
    }
}

/// Builds [`StatsSnapshot`]s.
#[derive(Debug, Clone)]
pub struct StatsEngine {
    default_accuracy_m: f64,
}

impl StatsEngine {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            default_accuracy_m: config.default_accuracy_m,
        }
    }

    /// Snapshot stamped with the local wall-clock time.
    pub fn compute_now(
        &self,
        sample: &LocationSample,
        target: Option<Coordinate>,
        trace: &Trace,
    ) -> StatsSnapshot {
        self.compute(sample, target, trace, Local::now().time())
    }

    pub fn compute(
        &self,
        sample: &LocationSample,
        target: Option<Coordinate>,
        trace: &Trace,
        now: NaiveTime,
    ) -> StatsSnapshot {
        let speed_kmh = non_negative_round(sample.speed_kmh.unwrap_or(0.0));
        let accuracy_m = non_negative_round(sample.accuracy_m.unwrap_or(self.default_accuracy_m));
        let direction = CompassOctant::from_bearing(sample.bearing_deg.unwrap_or(0.0));

        let (distance_label, eta_label) = match target {
            Some(target) => {
                let distance_km = round_to(haversine_distance(&sample.coordinate, &target) / 1000.0, 1);
                let minutes = eta_minutes(distance_km, speed_kmh);
                (format!("{:.1}km", distance_km), eta_label(minutes))
            }
            None => (PLACEHOLDER_LABEL.to_string(), PLACEHOLDER_LABEL.to_string()),
        };

        StatsSnapshot {
            eta_label,
            distance_label,
            speed_kmh,
            accuracy_m,
            direction,
            last_update_label: now.format("%H:%M").to_string(),
            total_distance_km: trace.total_distance_km(),
        }
    }
}

impl Default for StatsEngine {
    fn default() -> Self {
        Self::new(&TrackerConfig::default())
    }
}

/// Minutes to cover `distance_km` at `speed_kmh`, never below one while
/// moving. A stationary vehicle reports 0.
pub fn eta_minutes(distance_km: f64, speed_kmh: u32) -> u32 {
    if speed_kmh == 0 {
        return 0;
    }
    let minutes = (distance_km * 60.0 / speed_kmh as f64).round();
    (minutes as u32).max(1)
}

/// `"Soon"` up to two minutes out, `"{n}min"` beyond.
///
/// A stationary vehicle (0 minutes) also reads `"Soon"`.
pub fn eta_label(minutes: u32) -> String {
    if minutes <= 2 {
        SOON_LABEL.to_string()
    } else {
        format!("{}min", minutes)
    }
}

fn non_negative_round(value: f64) -> u32 {
    // NaN saturates to 0
    value.max(0.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nine_oh_five() -> NaiveTime {
        NaiveTime::from_hms_opt(9, 5, 42).unwrap()
    }

    fn driver() -> Coordinate {
        Coordinate::new(12.9716, 77.5946)
    }

    fn office() -> Coordinate {
        Coordinate::new(12.9352, 77.6245)
    }

    #[test]
    fn test_no_target_gives_placeholders() {
        let engine = StatsEngine::default();
        let sample = LocationSample::at(driver()).with_speed(30.0);
        let stats = engine.compute(&sample, None, &Trace::default(), nine_oh_five());

        assert_eq!(stats.distance_label, "--");
        assert_eq!(stats.eta_label, "--");
        assert_eq!(stats.speed_kmh, 30);
    }

    #[test]
    fn test_moving_towards_target() {
        let engine = StatsEngine::default();
        let sample = LocationSample::at(driver()).with_speed(30.0);
        let stats = engine.compute(&sample, Some(office()), &Trace::default(), nine_oh_five());

        // 5.18 km great-circle
        assert_eq!(stats.distance_label, "5.2km");
        // round(5.2 * 60 / 30) = 10
        assert_eq!(stats.eta_label, "10min");
        assert_eq!(stats.last_update_label, "09:05");
    }

    #[test]
    fn test_stationary_vehicle_reads_soon() {
        let engine = StatsEngine::default();
        let sample = LocationSample::at(driver()).with_speed(0.0);
        let stats = engine.compute(&sample, Some(office()), &Trace::default(), nine_oh_five());

        assert_eq!(stats.distance_label, "5.2km");
        assert_eq!(eta_minutes(5.2, 0), 0);
        assert_eq!(stats.eta_label, "Soon");
    }

    #[test]
    fn test_eta_minutes_floor_of_one() {
        assert_eq!(eta_minutes(0.0, 40), 1);
        assert_eq!(eta_minutes(0.1, 60), 1);
        assert_eq!(eta_minutes(5.1, 30), 10);
        assert_eq!(eta_label(1), "Soon");
        assert_eq!(eta_label(2), "Soon");
        assert_eq!(eta_label(3), "3min");
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let engine = StatsEngine::default();
        let sample = LocationSample::at(driver());
        let stats = engine.compute(&sample, None, &Trace::default(), nine_oh_five());

        assert_eq!(stats.speed_kmh, 0);
        assert_eq!(stats.accuracy_m, 25);
        assert_eq!(stats.direction, CompassOctant::N);
    }

    #[test]
    fn test_rounding_and_direction() {
        let engine = StatsEngine::default();
        let sample = LocationSample::at(driver())
            .with_speed(42.6)
            .with_accuracy(7.4)
            .with_bearing(100.0);
        let stats = engine.compute(&sample, None, &Trace::default(), nine_oh_five());

        assert_eq!(stats.speed_kmh, 43);
        assert_eq!(stats.accuracy_m, 7);
        assert_eq!(stats.direction, CompassOctant::E);
    }

    #[test]
    fn test_negative_speed_floors_at_zero() {
        let engine = StatsEngine::default();
        let sample = LocationSample::at(driver()).with_speed(-3.0);
        let stats = engine.compute(&sample, Some(office()), &Trace::default(), nine_oh_five());

        assert_eq!(stats.speed_kmh, 0);
        assert_eq!(stats.eta_label, "Soon");
    }

    #[test]
    fn test_total_distance_comes_from_trace() {
        let engine = StatsEngine::default();
        let mut trace = Trace::default();
        for i in 0..10 {
            trace.append(Coordinate::new(12.9700 + i as f64 * 0.001, 77.59));
        }
        let sample = LocationSample::at(driver());
        let stats = engine.compute(&sample, None, &trace, nine_oh_five());
        assert_eq!(stats.total_distance_km, 1.0);
    }

    #[test]
    fn test_custom_default_accuracy() {
        let config = TrackerConfig {
            default_accuracy_m: 50.0,
            ..TrackerConfig::default()
        };
        let stats = StatsEngine::new(&config).compute(
            &LocationSample::at(driver()),
            None,
            &Trace::default(),
            nine_oh_five(),
        );
        assert_eq!(stats.accuracy_m, 50);
    }
}
