use blake3::Hasher;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use uuid::Uuid;

/// 결정적 RNG: (fleet seed, namespace) 를 해시해서 32바이트 시드를 만든다.
/// 봇마다 namespace 를 달리 주면 봇 간 난수열이 서로 독립이 된다.
pub fn rng_for(fleet_seed: u64, namespace: &str) -> ChaCha20Rng {
    let mut h = Hasher::new();
    h.update(&fleet_seed.to_le_bytes());
    h.update(namespace.as_bytes());
    ChaCha20Rng::from_seed(*h.finalize().as_bytes())
}

/// n 번째로 스폰되는 봇의 id. 같은 seed 로 다시 돌리면 같은 id 열이 나온다.
pub fn bot_id_for(fleet_seed: u64, index: u64) -> String {
    let mut h = Hasher::new();
    h.update(&fleet_seed.to_le_bytes());
    h.update(b"bot");
    h.update(&index.to_le_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&h.finalize().as_bytes()[0..16]);
    Uuid::from_bytes(bytes).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_bot_ids_are_deterministic_and_unique() {
        assert_eq!(bot_id_for(7, 0), bot_id_for(7, 0));
        assert_ne!(bot_id_for(7, 0), bot_id_for(7, 1));
        assert_ne!(bot_id_for(7, 0), bot_id_for(8, 0));
    }

    #[test]
    fn test_rng_streams_are_isolated_by_namespace() {
        let a: u64 = rng_for(1, "bot/a").gen();
        let a_again: u64 = rng_for(1, "bot/a").gen();
        let b: u64 = rng_for(1, "bot/b").gen();
        assert_eq!(a, a_again);
        assert_ne!(a, b);
    }
}
