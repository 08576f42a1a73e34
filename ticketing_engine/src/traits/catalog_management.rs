use crate::{
    db_types::{Customer, Event, EventCommission, NewCustomer, NewEvent, NewTicketType, TicketType},
    traits::TicketingDatabaseError,
};

/// Customers, events and what they sell.
#[allow(async_fn_in_trait)]
pub trait CatalogManagement {
    async fn insert_customer(&self, customer: NewCustomer) -> Result<Customer, TicketingDatabaseError>;

    async fn fetch_customer(&self, customer_id: i64) -> Result<Option<Customer>, TicketingDatabaseError>;

    async fn insert_event(&self, event: NewEvent) -> Result<Event, TicketingDatabaseError>;

    async fn fetch_event(&self, event_id: i64) -> Result<Option<Event>, TicketingDatabaseError>;

    async fn insert_ticket_type(&self, ticket_type: NewTicketType) -> Result<TicketType, TicketingDatabaseError>;

    async fn fetch_ticket_type(&self, ticket_type_id: i64) -> Result<Option<TicketType>, TicketingDatabaseError>;

    async fn fetch_ticket_types_for_event(&self, event_id: i64) -> Result<Vec<TicketType>, TicketingDatabaseError>;

    /// Inserts or replaces the commission terms for an event.
    async fn set_event_commission(&self, commission: EventCommission) -> Result<(), TicketingDatabaseError>;

    async fn fetch_event_commission(&self, event_id: i64) -> Result<Option<EventCommission>, TicketingDatabaseError>;
}
