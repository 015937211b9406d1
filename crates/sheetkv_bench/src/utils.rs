//! Benchmark utilities.

use rand::Rng;
use sheetkv_core::{Cache, Key, Record};

const NAMES: [&str; 6] = ["Ann", "Ben", "Cleo", "Dan", "Eve", "Finn"];
const CITIES: [&str; 4] = ["Oslo", "Lima", "Pune", "Kyiv"];

/// Generate a random record at `key` with name, age, score, city and active
/// columns.
pub fn random_record(key: Key) -> Record {
    let mut rng = rand::thread_rng();
    Record::new(key)
        .with_value("name", NAMES[rng.gen_range(0..NAMES.len())])
        .with_value("age", rng.gen_range(0..100i64))
        .with_value("score", rng.gen_range(0.0..1000.0f64))
        .with_value("city", CITIES[rng.gen_range(0..CITIES.len())])
        .with_value("active", rng.gen_bool(0.5))
}

/// Generate `count` random records at keys 2.. in order.
pub fn generate_records(count: usize) -> Vec<Record> {
    (0..count).map(|i| random_record(i as Key + 2)).collect()
}

/// Column order of generated records.
pub fn schema() -> Vec<String> {
    ["name", "age", "score", "city", "active"]
        .iter()
        .map(|c| c.to_string())
        .collect()
}

/// Create a clean cache holding `count` random records.
pub fn populated_cache(count: usize) -> Cache {
    let cache = Cache::new();
    cache.load(generate_records(count), schema());
    cache
}
