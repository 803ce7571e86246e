use chrono::{Duration, Utc};
use skylink_catalog::{CabinClass, Flight};
use skylink_core::models::User;
use skylink_core::repository::{Change, ChangeSet};

/// Demo users and flights for a fresh development store.
pub fn demo_data() -> ChangeSet {
    let tomorrow = Utc::now() + Duration::days(1);
    let mut changes = ChangeSet::new();

    for user in [
        User::new("traveler", "traveler@skylink.test"),
        User::new("reservations", "reservations@skylink.test"),
    ] {
        changes.push(Change::SaveUser(user));
    }

    let flights = [
        Flight::new("SK101", "CMB", "DXB", tomorrow, tomorrow + Duration::hours(5), 32_000, 180)
            .with_aircraft_type("A320"),
        Flight::new("SK205", "CMB", "SIN", tomorrow + Duration::hours(6), tomorrow + Duration::hours(10), 27_500, 160)
            .with_aircraft_type("A321"),
        Flight::new("SK310", "CMB", "LHR", tomorrow + Duration::days(2), tomorrow + Duration::days(2) + Duration::hours(12), 185_000, 24)
            .with_cabin_class(CabinClass::Business)
            .with_aircraft_type("A330"),
    ];
    for flight in flights {
        changes.push(Change::SaveFlight(flight));
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use skylink_core::repository::{FlightRepository, ReservationStore};

    #[tokio::test]
    async fn test_demo_data_commits() {
        let store = InMemoryStore::new();
        store.commit(demo_data()).await.unwrap();

        let flights = store.list_flights().await.unwrap();
        assert_eq!(flights.len(), 3);
        assert!(flights.iter().all(|f| f.seats_available == f.capacity));
    }
}
