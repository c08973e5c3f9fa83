//! Replay a short drive through a tracking session.
//!
//! Run with: cargo run --example replay_trip

use futures::future::BoxFuture;
use live_tracker::{
    AddressCache, Coordinate, GeocodeError, GeocodeResponse, LocationSample, ReverseGeocoder, Slot,
    TrackerConfig, TrackingSession, TripDefinition, TripType,
};
use std::sync::Arc;

/// Geocoder that names every coordinate after its grid cell.
struct GridGeocoder;

impl ReverseGeocoder for GridGeocoder {
    fn reverse_geocode(&self, c: Coordinate) -> BoxFuture<'_, Result<GeocodeResponse, GeocodeError>> {
        Box::pin(async move {
            tokio::time::sleep(std::time::Duration::from_millis(30)).await;
            Ok(GeocodeResponse::ok(format!(
                "Block {:.0}-{:.0}, Bengaluru",
                c.lat * 100.0,
                c.lng * 100.0
            )))
        })
    }
}

#[tokio::main]
async fn main() {
    let cache = AddressCache::new();
    let config = TrackerConfig {
        refresh_current_address: true,
        ..TrackerConfig::default()
    };

    let mut session = TrackingSession::start("trip-42", config, cache.clone(), Arc::new(GridGeocoder));
    let view = session.view();

    session.on_trip_changed(TripDefinition {
        trip_id: "trip-42".to_string(),
        trip_type: TripType::Login,
        pickup: Some(Coordinate::new(12.9352, 77.6245)),
        drop: None,
        office: Some(Coordinate::new(12.9784, 77.6408)),
        picked_up: false,
    });

    println!("Live Tracking Replay\n");

    // Driving north-east towards the pickup
    for i in 0..6 {
        let fix = Coordinate::new(12.9200 + i as f64 * 0.002, 77.6100 + i as f64 * 0.002);
        session.on_sample(
            LocationSample::at(fix)
                .with_speed(24.0 + i as f64 * 2.0)
                .with_bearing(45.0)
                .with_accuracy(9.0),
        );
        session.resolver().wait_idle().await;

        let model = view.snapshot();
        let stats = &model.position.stats;
        println!(
            "{}. {} | {} to {} | ETA {} | {} km/h {} | travelled {:.1}km",
            i + 1,
            model.addresses.label(Slot::Current),
            stats.distance_label,
            model.next_stop_address,
            stats.eta_label,
            stats.speed_kmh,
            stats.direction,
            stats.total_distance_km
        );
    }

    let cache = session.end();
    println!("\nCache: {:?}", cache.stats());
}
