use std::time::Duration;

use cucumber::World;
use log::*;
use ticketing_engine::{
    db_types::OrderId,
    events::EventProducers,
    sessions::CartSessionStore,
    test_utils::{
        fixtures::{seed_catalogue, Catalogue},
        prepare_env::{prepare_test_env, random_db_path},
        scripted_gateway::ScriptedGateway,
    },
    ReconcileOutcome,
    ReconcilerApi,
    SqliteDatabase,
};
use tkt_common::Paise;

#[derive(Default, Debug, World)]
pub struct TicketingWorld {
    pub system: Option<TicketingSystem>,
}

#[derive(Debug)]
pub struct TicketingSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub gateway: ScriptedGateway,
    pub reconciler: ReconcilerApi<SqliteDatabase, ScriptedGateway>,
    pub catalogue: Option<Catalogue>,
    pub last_outcome: Option<(OrderId, ReconcileOutcome)>,
}

impl TicketingWorld {
    pub fn system(&self) -> &TicketingSystem {
        self.system.as_ref().expect("Ticketing system not initialised")
    }

    pub fn system_mut(&mut self) -> &mut TicketingSystem {
        self.system.as_mut().expect("Ticketing system not initialised")
    }
}

impl TicketingSystem {
    pub async fn new() -> Self {
        let db_path = random_db_path();
        let db = prepare_test_env(&db_path).await;
        debug!("Created database: {db_path}");
        let gateway = ScriptedGateway::new("Cashfree");
        let reconciler =
            ReconcilerApi::new(db.clone(), gateway.clone(), CartSessionStore::new(), EventProducers::default())
                .with_gateway_timeout(Duration::from_millis(100));
        Self { db_path, db, gateway, reconciler, catalogue: None, last_outcome: None }
    }

    pub async fn seed(&mut self, capacity: i64, price: Paise, attendees_per_ticket: i64) {
        let catalogue = seed_catalogue(&self.db, capacity, price, attendees_per_ticket).await;
        self.catalogue = Some(catalogue);
    }

    pub fn catalogue(&self) -> &Catalogue {
        self.catalogue.as_ref().expect("No event has been set up")
    }
}
