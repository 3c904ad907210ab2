use std::fmt;

use chrono::{DateTime, Duration, Utc};

/// Seconds before the literal expiry at which a token stops being used.
/// Keeps a request from going out with a token that expires mid-flight.
const EXPIRY_MARGIN_SECS: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Never acquired, or cleared after the service rejected it
    Unset,
    /// Declared lifetime of zero
    Never,
    At(DateTime<Utc>),
}

/// One link of the credential chain.
#[derive(Clone)]
pub struct Token {
    value: String,
    expiry: Expiry,
}

impl Token {
    pub fn empty() -> Self {
        Self {
            value: String::new(),
            expiry: Expiry::Unset,
        }
    }

    /// Replace the value and expiry. A lifetime of zero never expires.
    pub fn update(&mut self, value: String, lifetime_secs: u64) {
        self.update_at(value, lifetime_secs, Utc::now());
    }

    pub fn update_at(&mut self, value: String, lifetime_secs: u64, now: DateTime<Utc>) {
        self.value = value;
        self.expiry = if lifetime_secs == 0 {
            Expiry::Never
        } else {
            let lifetime = i64::try_from(lifetime_secs).unwrap_or(i64::MAX);
            now.checked_add_signed(Duration::seconds(lifetime.min(i64::MAX / 1000)))
                .map(Expiry::At)
                .unwrap_or(Expiry::Never)
        };
    }

    pub fn clear(&mut self) {
        self.value.clear();
        self.expiry = Expiry::Unset;
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn expiry(&self) -> Expiry {
        self.expiry
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Valid strictly before `expiry - 10s`, or always for a never-expiring token.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Expiry::Unset => false,
            Expiry::Never => true,
            Expiry::At(expires_at) => now + Duration::seconds(EXPIRY_MARGIN_SECS) < expires_at,
        }
    }
}

impl Default for Token {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("value", &if self.value.is_empty() { "" } else { "<redacted>" })
            .field("expiry", &self.expiry)
            .finish()
    }
}
