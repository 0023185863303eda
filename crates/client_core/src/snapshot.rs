use shared::domain::Car;

/// Holds the latest authoritative snapshot in full. Applying a push replaces
/// the whole vector, so staleness is bounded by one round trip and no mix of
/// old and new cars can ever be observed.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    cars: Vec<Car>,
    generation: u64,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot wholesale and return the new generation number.
    pub fn replace(&mut self, cars: Vec<Car>) -> u64 {
        self.cars = cars;
        self.generation += 1;
        self.generation
    }

    pub fn cars(&self) -> &[Car] {
        &self.cars
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}
