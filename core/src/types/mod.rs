//! Entity model: athletes, events and the results that link them.

mod athlete;
mod event;
mod race_result;

pub use athlete::Athlete;
pub use event::Event;
pub use race_result::RaceResult;

use uuid::Uuid;

/// Identity and cloning shared by every entity the benchmark stores.
pub trait Entity: Clone {
    /// Label written to the metric log and used to name tables/collections.
    const TYPE_NAME: &'static str;

    fn id(&self) -> Uuid;

    fn set_id(&mut self, id: Uuid);

    /// Copy of `self` that differs only in a freshly generated id.
    fn clone_with_fresh_id(&self) -> Self {
        let mut copy = self.clone();
        copy.set_id(Uuid::new_v4());
        copy
    }
}
