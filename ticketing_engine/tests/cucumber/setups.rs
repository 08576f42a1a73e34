use cucumber::given;
use tkt_common::Paise;

use crate::cucumber::{world::TicketingSystem, TicketingWorld};

#[given("a fresh install")]
async fn fresh_database(world: &mut TicketingWorld) {
    let system = TicketingSystem::new().await;
    world.system = Some(system);
}

#[given(expr = "an event with capacity {int} selling passes at {int} paise that admit {int}")]
async fn seed_event(world: &mut TicketingWorld, capacity: i64, price: i64, attendees: i64) {
    world.system_mut().seed(capacity, Paise::from(price), attendees).await;
}
