use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

const MASK: &str = "********";

/// Wrapper for payment secrets (card numbers, CVVs). Debug, Display and
/// Serialize all render a mask, so the value cannot leak through
/// `tracing` fields or JSON responses. Read it with [`Masked::expose`].
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Masked<T>(T);

impl<T> Masked<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn expose(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl Masked<String> {
    /// Last four characters, for receipts. Shorter values are fully masked.
    pub fn last_four(&self) -> String {
        let chars: Vec<char> = self.0.chars().filter(|c| !c.is_whitespace()).collect();
        if chars.len() <= 4 {
            return MASK.to_string();
        }
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("****{}", tail)
    }
}

impl<T> From<T> for Masked<T> {
    fn from(value: T) -> Self {
        Self(value)
    }
}

impl<T> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", MASK)
    }
}

impl<T> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", MASK)
    }
}

impl<T> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(MASK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_never_prints_value() {
        let card = Masked::new("4111 1111 1111 1111".to_string());

        assert_eq!(format!("{:?}", card), MASK);
        assert_eq!(card.to_string(), MASK);
        assert_eq!(serde_json::to_string(&card).unwrap(), "\"********\"");
        assert_eq!(card.expose(), "4111 1111 1111 1111");
    }

    #[test]
    fn test_last_four() {
        let card = Masked::new("4111 1111 1111 1234".to_string());
        assert_eq!(card.last_four(), "****1234");

        let short = Masked::new("123".to_string());
        assert_eq!(short.last_four(), MASK);
    }

    #[test]
    fn test_deserializes_transparently() {
        let cvv: Masked<String> = serde_json::from_str("\"123\"").unwrap();
        assert_eq!(cvv.expose(), "123");
    }
}
