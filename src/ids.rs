//! Random 8-character identifier generation shared by lease ids and task ids.

use rand::Rng;
use std::collections::HashSet;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const ID_LEN: usize = 8;

fn sample_id() -> String {
    let mut rng = rand::thread_rng();
    (0..ID_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..ALPHABET.len());
            ALPHABET[idx] as char
        })
        .collect()
}

/// Draw an 8-character `[A-Z0-9]` id that does not already appear in `taken`, retrying on
/// collision. The expected number of retries is negligible at realistic population sizes.
pub fn random_unique_id(taken: &HashSet<String>) -> String {
    loop {
        let candidate = sample_id();
        if !taken.contains(&candidate) {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_eight_uppercase_alphanumeric_chars() {
        let taken = HashSet::new();
        let id = random_unique_id(&taken);
        assert_eq!(id.len(), ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn retries_on_collision() {
        let mut taken = HashSet::new();
        let first = random_unique_id(&taken);
        taken.insert(first.clone());
        let second = random_unique_id(&taken);
        assert_ne!(first, second);
    }
}
