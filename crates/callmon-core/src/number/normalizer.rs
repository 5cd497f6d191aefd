//! Raw caller strings to canonical digit-only numbers

use std::sync::OnceLock;

use regex::Regex;

/// Result of normalizing one number
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedNumber {
    /// Starts with `00`; never searched
    International(String),
    National {
        /// Digits as received
        original: String,
        /// Digits after removing a carrier pre-select prefix
        number: String,
        /// Full national number, area code included
        full: String,
    },
}

impl NormalizedNumber {
    /// Every distinct form of the number, original first
    pub fn variants(&self) -> Vec<&str> {
        match self {
            Self::International(number) => vec![number.as_str()],
            Self::National {
                original,
                number,
                full,
            } => {
                let mut variants = vec![original.as_str()];
                for v in [number.as_str(), full.as_str()] {
                    if !variants.contains(&v) {
                        variants.push(v);
                    }
                }
                variants
            }
        }
    }

    pub fn original(&self) -> &str {
        match self {
            Self::International(number) => number,
            Self::National { original, .. } => original,
        }
    }
}

/// Applies the dialing rules of the line's own area code
#[derive(Debug, Clone)]
pub struct NumberNormalizer {
    area_code: String,
}

impl NumberNormalizer {
    pub fn new(area_code: impl Into<String>) -> Self {
        let area_code: String = area_code.into();
        Self {
            area_code: only_digits(&area_code),
        }
    }

    pub fn area_code(&self) -> &str {
        &self.area_code
    }

    /// Normalize a raw number. Returns `None` when it contains no digits.
    pub fn normalize(&self, raw: &str) -> Option<NormalizedNumber> {
        let original = only_digits(raw);
        if original.is_empty() {
            return None;
        }

        if original.starts_with("00") {
            return Some(NormalizedNumber::International(original));
        }

        let (number, full) = if original.starts_with("010") {
            let number = mobile_pattern()
                .captures(&original)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| original.clone());
            (number.clone(), number)
        } else if local_pattern().is_match(&original) {
            (original.clone(), format!("{}{}", self.area_code, original))
        } else {
            (original.clone(), original.clone())
        };

        Some(NormalizedNumber::National {
            original,
            number,
            full,
        })
    }
}

/// Split `digits (alternate)` into the caller digits and the alternate digits.
///
/// The gateway shows a partially matching phonebook entry in parentheses
/// after the caller. Either part is `None` when it has no digits.
pub fn split_alternate(raw: &str) -> (Option<String>, Option<String>) {
    let (primary, alternate) = match raw.find('(') {
        Some(open) => {
            let inner = &raw[open + 1..];
            let inner = inner.find(')').map_or(inner, |close| &inner[..close]);
            (&raw[..open], Some(inner))
        }
        None => (raw, None),
    };
    (non_empty(only_digits(primary)), alternate.map(only_digits).and_then(non_empty))
}

pub fn only_digits(s: &str) -> String {
    s.chars().filter(char::is_ascii_digit).collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn mobile_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^010\d*?(01[567]\d+)").expect("valid mobile pattern"))
}

fn local_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[1-9][0-9]+").expect("valid local pattern"))
}
