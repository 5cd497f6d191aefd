//! Progressive generalization of a number for the reverse lookup
//!
//! Fixed-line numbers are often dialed with extension digits appended. When a
//! number is unknown, its last two digits are replaced by a single `0`, which
//! walks it towards the block number a business is registered under:
//!
//! ```text
//! 061313456789 → 06131345670 → 0613134560 → 061313450 → 06131340
//! ```
//!
//! The walk stops as soon as the number is no longer longer than the area
//! code prefix plus three digits. Mobile (`015`, `016`, `017`) and toll-free
//! (`0800`) numbers are probed once and never generalized.

/// Numbers that must never be generalized
pub fn is_fixed_range(number: &str) -> bool {
    ["015", "016", "017", "0800"]
        .iter()
        .any(|prefix| number.starts_with(prefix))
}

/// Replace the last two digits with a single `0`
pub fn generalize(number: &str) -> String {
    let keep = number.len().saturating_sub(2);
    format!("{}0", &number[..keep])
}

/// The numbers to probe for one full national number, most specific first
#[derive(Debug, Clone)]
pub struct ProbeSequence {
    next: Option<String>,
    min_len: usize,
}

impl ProbeSequence {
    /// `prefix_len` is the length of the number's area code prefix
    pub fn new(full_number: &str, prefix_len: usize) -> Self {
        let min_len = prefix_len + 3;
        let next = if full_number.len() > min_len {
            Some(full_number.to_string())
        } else {
            None
        };
        Self { next, min_len }
    }

    /// Upper bound on the number of probes this sequence yields
    pub fn max_probes(full_number: &str, prefix_len: usize) -> usize {
        if is_fixed_range(full_number) {
            usize::from(full_number.len() > prefix_len + 3)
        } else {
            full_number.len().saturating_sub(prefix_len + 3)
        }
    }
}

impl Iterator for ProbeSequence {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let current = self.next.take()?;
        if !is_fixed_range(&current) {
            let candidate = generalize(&current);
            if candidate.len() > self.min_len {
                self.next = Some(candidate);
            }
        }
        Some(current)
    }
}
