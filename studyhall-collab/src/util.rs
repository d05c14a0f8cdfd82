use crossbeam::atomic::AtomicCell;
use rand::{distributions::Alphanumeric, thread_rng, Rng};

/// The length of human-shareable join codes.
pub const ROOM_CODE_LENGTH: usize = 6;

static ROOM_ID_COUNTER: AtomicCell<u64> = AtomicCell::new(1);

/// Returns the next process-unique room id.
pub fn next_room_id() -> u64 {
    ROOM_ID_COUNTER.fetch_add(1)
}

/// Generates a short code users can share to find a room. Collisions are
/// possible but tolerable for the lifetime of a single process.
pub fn random_room_code() -> String {
    let mut rng = thread_rng();

    std::iter::repeat(())
        .map(|_| rng.sample(Alphanumeric) as char)
        .map(|c| c.to_ascii_uppercase())
        .take(ROOM_CODE_LENGTH)
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn room_codes_are_short_and_uppercase() {
        let code = random_room_code();

        assert_eq!(code.len(), ROOM_CODE_LENGTH);
        assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn room_ids_are_unique() {
        let first = next_room_id();
        let second = next_room_id();

        assert_ne!(first, second);
    }
}
