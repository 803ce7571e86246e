use chrono::Utc;
use skylink_core::error::{ReservationError, ReservationResult};
use skylink_core::models::{Passenger, PassengerDetails, User};
use uuid::Uuid;

use crate::methods::is_valid_email;

/// Validates the submitted passenger list for a booking of `expected` seats
/// and returns normalised records owned by `booking_id`.
pub fn validate_passengers(
    booking_id: Uuid,
    details: &[PassengerDetails],
    expected: u32,
    user: &User,
) -> ReservationResult<Vec<Passenger>> {
    if details.is_empty() {
        return Err(ReservationError::validation("At least one passenger is required"));
    }
    if details.len() != expected as usize {
        return Err(ReservationError::validation(format!(
            "Passenger details count ({}) does not match number of passengers ({})",
            details.len(),
            expected
        )));
    }

    let today = Utc::now().date_naive();
    let mut passengers = Vec::with_capacity(details.len());

    for (index, passenger) in details.iter().enumerate() {
        let n = index + 1;
        require(&passenger.first_name, || format!("Passenger {} first name is required", n))?;
        require(&passenger.last_name, || format!("Passenger {} last name is required", n))?;
        require(&passenger.email, || format!("Passenger {} email is required", n))?;
        require(&passenger.country, || format!("Passenger {} country is required", n))?;

        if !is_valid_email(passenger.email.trim()) {
            return Err(ReservationError::validation(format!(
                "Passenger {} email format is invalid",
                n
            )));
        }

        let date_of_birth = passenger.date_of_birth.ok_or_else(|| {
            ReservationError::validation(format!("Passenger {} date of birth is required", n))
        })?;
        if date_of_birth > today {
            return Err(ReservationError::validation(format!(
                "Passenger {} date of birth cannot be in the future",
                n
            )));
        }

        passengers.push(Passenger::new(booking_id, passenger, date_of_birth));
    }

    // The lead passenger must be the account holder.
    if !passengers[0].email.eq_ignore_ascii_case(user.email.trim()) {
        return Err(ReservationError::validation(
            "First passenger email must match the booking user's email",
        ));
    }

    Ok(passengers)
}

fn require(value: &str, message: impl FnOnce() -> String) -> ReservationResult<()> {
    if value.trim().is_empty() {
        return Err(ReservationError::Validation(message()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn details(email: &str) -> PassengerDetails {
        PassengerDetails {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: email.to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 12, 10),
            country: "UK".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_list() {
        let user = User::new("ada", "ada@example.com");
        let booking_id = Uuid::new_v4();

        let passengers = validate_passengers(
            booking_id,
            &[details("ADA@example.com"), details("charles@example.com")],
            2,
            &user,
        )
        .unwrap();

        assert_eq!(passengers.len(), 2);
        assert!(passengers.iter().all(|p| p.booking_id == booking_id));
        assert_eq!(passengers[0].email, "ada@example.com");
    }

    #[test]
    fn test_count_mismatch() {
        let user = User::new("ada", "ada@example.com");

        let err = validate_passengers(Uuid::new_v4(), &[details("ada@example.com")], 2, &user).unwrap_err();
        assert!(err.to_string().contains("does not match"));

        let err = validate_passengers(Uuid::new_v4(), &[], 1, &user).unwrap_err();
        assert_eq!(err.to_string(), "At least one passenger is required");
    }

    #[test]
    fn test_lead_passenger_must_be_user() {
        let user = User::new("ada", "ada@example.com");

        let err = validate_passengers(Uuid::new_v4(), &[details("grace@example.com")], 1, &user).unwrap_err();
        assert_eq!(err.to_string(), "First passenger email must match the booking user's email");
    }

    #[test]
    fn test_missing_and_future_fields() {
        let user = User::new("ada", "ada@example.com");

        let mut second = details("charles@example.com");
        second.country = " ".to_string();
        let err = validate_passengers(Uuid::new_v4(), &[details("ada@example.com"), second], 2, &user).unwrap_err();
        assert_eq!(err.to_string(), "Passenger 2 country is required");

        let mut lead = details("ada@example.com");
        lead.date_of_birth = Some(Utc::now().date_naive() + Duration::days(3));
        let err = validate_passengers(Uuid::new_v4(), &[lead], 1, &user).unwrap_err();
        assert_eq!(err.to_string(), "Passenger 1 date of birth cannot be in the future");

        let mut lead = details("ada@example.com");
        lead.date_of_birth = None;
        let err = validate_passengers(Uuid::new_v4(), &[lead], 1, &user).unwrap_err();
        assert_eq!(err.to_string(), "Passenger 1 date of birth is required");
    }
}
