use mockall::mock;
use serde_json::Value;
use ticketing_engine::{
    db_types::{
        Customer,
        Event,
        EventCommission,
        NewCustomer,
        NewEvent,
        NewPaymentOrder,
        NewPromoCode,
        NewTicketType,
        OrderId,
        PaymentOrder,
        PaymentOrderStatus,
        PromoCode,
        PromoCodeUsage,
        Ticket,
        TicketType,
    },
    order_objects::OrderQueryFilter,
    traits::{
        CatalogManagement,
        GatewayError,
        GatewayOrderStatus,
        GatewaySession,
        GatewaySessionRequest,
        IssuanceError,
        IssuedTickets,
        PaymentGateway,
        PaymentOrderManagement,
        PaymentReference,
        PromoLedgerError,
        PromoManagement,
        PromoResync,
        PromoUsageStats,
        SuccessTransition,
        TicketManagement,
        TicketingDatabaseError,
        ValidationError,
    },
};

mock! {
    pub TicketingBackend {}
    impl PaymentOrderManagement for TicketingBackend {
        async fn insert_payment_order(&self, order: NewPaymentOrder) -> Result<(PaymentOrder, bool), TicketingDatabaseError>;
        async fn fetch_payment_order(&self, order_id: &OrderId) -> Result<Option<PaymentOrder>, TicketingDatabaseError>;
        async fn search_payment_orders(&self, query: OrderQueryFilter) -> Result<Vec<PaymentOrder>, TicketingDatabaseError>;
        async fn append_audit_entry(&self, order_id: &OrderId, key: &str, entry: Value) -> Result<PaymentOrder, TicketingDatabaseError>;
        async fn set_audit_field(&self, order_id: &OrderId, key: &str, value: Value) -> Result<PaymentOrder, TicketingDatabaseError>;
        async fn mark_order_pending(&self, order_id: &OrderId) -> Result<PaymentOrder, TicketingDatabaseError>;
        async fn close_order(&self, order_id: &OrderId, status: PaymentOrderStatus, payment: PaymentReference) -> Result<(PaymentOrder, bool), TicketingDatabaseError>;
        async fn complete_order(&self, order_id: &OrderId, payment: PaymentReference) -> Result<SuccessTransition, TicketingDatabaseError>;
    }
    impl TicketManagement for TicketingBackend {
        async fn fetch_tickets_for_order(&self, order_id: &OrderId) -> Result<Vec<Ticket>, TicketingDatabaseError>;
        async fn fetch_ticket(&self, ticket_id: i64) -> Result<Option<Ticket>, TicketingDatabaseError>;
        async fn issue_tickets_for_order(&self, order_id: &OrderId) -> Result<IssuedTickets, IssuanceError>;
        async fn remaining_capacity(&self, event_id: i64) -> Result<i64, TicketingDatabaseError>;
        async fn validate_ticket(&self, ticket_id: i64, secure_token: &str, volunteer_id: i64) -> Result<Ticket, ValidationError>;
    }
    impl PromoManagement for TicketingBackend {
        async fn insert_promo_code(&self, promo: NewPromoCode) -> Result<PromoCode, PromoLedgerError>;
        async fn fetch_promo_code(&self, code: &str, event_id: Option<i64>) -> Result<Option<PromoCode>, PromoLedgerError>;
        async fn fetch_promo_code_by_id(&self, promo_id: i64) -> Result<Option<PromoCode>, PromoLedgerError>;
        async fn fetch_usages_for_promo(&self, promo_id: i64) -> Result<Vec<PromoCodeUsage>, PromoLedgerError>;
        async fn recompute_current_uses(&self, promo_id: Option<i64>) -> Result<Vec<PromoResync>, PromoLedgerError>;
        async fn promo_usage_stats(&self, promo_id: i64) -> Result<PromoUsageStats, PromoLedgerError>;
    }
    impl CatalogManagement for TicketingBackend {
        async fn insert_customer(&self, customer: NewCustomer) -> Result<Customer, TicketingDatabaseError>;
        async fn fetch_customer(&self, customer_id: i64) -> Result<Option<Customer>, TicketingDatabaseError>;
        async fn insert_event(&self, event: NewEvent) -> Result<Event, TicketingDatabaseError>;
        async fn fetch_event(&self, event_id: i64) -> Result<Option<Event>, TicketingDatabaseError>;
        async fn insert_ticket_type(&self, ticket_type: NewTicketType) -> Result<TicketType, TicketingDatabaseError>;
        async fn fetch_ticket_type(&self, ticket_type_id: i64) -> Result<Option<TicketType>, TicketingDatabaseError>;
        async fn fetch_ticket_types_for_event(&self, event_id: i64) -> Result<Vec<TicketType>, TicketingDatabaseError>;
        async fn set_event_commission(&self, commission: EventCommission) -> Result<(), TicketingDatabaseError>;
        async fn fetch_event_commission(&self, event_id: i64) -> Result<Option<EventCommission>, TicketingDatabaseError>;
    }
}

mock! {
    pub Gateway {}
    impl PaymentGateway for Gateway {
        fn channel(&self) -> String;
        async fn create_order(&self, request: GatewaySessionRequest) -> Result<GatewaySession, GatewayError>;
        async fn fetch_order_status(&self, order_id: &OrderId) -> Result<GatewayOrderStatus, GatewayError>;
    }
}
