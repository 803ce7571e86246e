use skylink_core::error::{ReservationError, ReservationResult};
use skylink_core::models::PaymentMethod;
use skylink_core::payment::{CardDetails, PaymentFields, PaymentInstrument};
use skylink_shared::Masked;
use validator::ValidateEmail;

/// Checks the fields a payment method requires and returns the validated instrument.
///
/// Only formats are checked here. Whether the card number passes its checksum is
/// the gateway's call, so a well-formed but invalid number is declined rather
/// than rejected.
pub fn validate_method(method: PaymentMethod, fields: &PaymentFields) -> ReservationResult<PaymentInstrument> {
    match method {
        PaymentMethod::Card => validate_card(fields).map(PaymentInstrument::Card),
        PaymentMethod::EzCash => {
            let mobile_number = required(fields.mobile_number.as_deref(), "Mobile number is required for eZ Cash payment")?;
            if !is_valid_mobile(&mobile_number) {
                return Err(ReservationError::validation(
                    "Invalid mobile number format. Must be 7XXXXXXXX (9 digits starting with 7)",
                ));
            }
            Ok(PaymentInstrument::EzCash { mobile_number })
        }
        PaymentMethod::BankTransfer => Err(ReservationError::validation(
            "Invalid payment method. Must be CARD or EZ_CASH",
        )),
    }
}

fn validate_card(fields: &PaymentFields) -> ReservationResult<CardDetails> {
    let number = required(fields.card_number.as_ref().map(|n| n.expose().as_str()), "Card number is required")?;
    let cardholder_name = required(fields.cardholder_name.as_deref(), "Cardholder name is required")?;
    let expiry = required(fields.card_expiry.as_deref(), "Card expiry date is required")?;
    let cvv = required(fields.cvv.as_ref().map(|c| c.expose().as_str()), "CVV is required")?;
    let email = required(fields.email.as_deref(), "Email is required for card payment")?;

    if !is_valid_email(&email) {
        return Err(ReservationError::validation("Invalid email format"));
    }
    if !is_valid_expiry(&expiry) {
        return Err(ReservationError::validation("Invalid expiry format. Use MM/YY"));
    }
    if !(3..=4).contains(&cvv.len()) || !cvv.chars().all(|c| c.is_ascii_digit()) {
        return Err(ReservationError::validation("CVV must be 3 or 4 digits"));
    }

    let digits: String = number.chars().filter(|c| !c.is_whitespace()).collect();
    if !(13..=19).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ReservationError::validation(
            "Invalid card number format. Must be 13-19 digits",
        ));
    }

    Ok(CardDetails {
        number: Masked::new(digits),
        cardholder_name,
        expiry,
        cvv: Masked::new(cvv),
        email,
    })
}

fn required(value: Option<&str>, message: &str) -> ReservationResult<String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ReservationError::validation(message)),
    }
}

/// Luhn checksum over an all-digit string.
pub fn luhn_valid(digits: &str) -> bool {
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }

    let sum: u32 = digits
        .chars()
        .rev()
        .filter_map(|c| c.to_digit(10))
        .enumerate()
        .map(|(i, d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();

    sum % 10 == 0
}

/// RFC-style address with a dotted domain, e.g. `a@b.co`.
pub fn is_valid_email(email: &str) -> bool {
    let domain_has_dot = email
        .rsplit_once('@')
        .map(|(_, domain)| domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.'))
        .unwrap_or(false);

    domain_has_dot && email.to_string().validate_email()
}

/// `MM/YY` with a month between 01 and 12.
fn is_valid_expiry(expiry: &str) -> bool {
    let Some((month, year)) = expiry.split_once('/') else {
        return false;
    };
    let two_digits = |s: &str| s.len() == 2 && s.chars().all(|c| c.is_ascii_digit());

    two_digits(month)
        && two_digits(year)
        && month.parse::<u8>().map(|m| (1..=12).contains(&m)).unwrap_or(false)
}

/// Local mobile number: 9 digits starting with 7.
pub fn is_valid_mobile(mobile: &str) -> bool {
    mobile.len() == 9 && mobile.starts_with('7') && mobile.chars().all(|c| c.is_ascii_digit())
}
