use std::{future::Future, pin::Pin, sync::Arc};

use log::*;

use crate::events::{EventHandler, EventProducer, Handler, OrderNeedsAttentionEvent, TicketsIssuedEvent};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub tickets_issued_producer: Vec<EventProducer<TicketsIssuedEvent>>,
    pub needs_attention_producer: Vec<EventProducer<OrderNeedsAttentionEvent>>,
}

impl EventProducers {
    pub async fn publish_tickets_issued(&self, event: TicketsIssuedEvent) {
        for emitter in &self.tickets_issued_producer {
            debug!("📬️ Notifying tickets issued hook subscribers");
            emitter.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_needs_attention(&self, event: OrderNeedsAttentionEvent) {
        for emitter in &self.needs_attention_producer {
            debug!("📬️ Notifying order attention hook subscribers");
            emitter.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_tickets_issued: Option<EventHandler<TicketsIssuedEvent>>,
    pub on_order_needs_attention: Option<EventHandler<OrderNeedsAttentionEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_tickets_issued = hooks.on_tickets_issued.map(|f| EventHandler::new(buffer_size, f));
        let on_order_needs_attention = hooks.on_order_needs_attention.map(|f| EventHandler::new(buffer_size, f));
        Self { on_tickets_issued, on_order_needs_attention }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_tickets_issued {
            result.tickets_issued_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_needs_attention {
            result.needs_attention_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_tickets_issued {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_order_needs_attention {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_tickets_issued: Option<Handler<TicketsIssuedEvent>>,
    pub on_order_needs_attention: Option<Handler<OrderNeedsAttentionEvent>>,
}

impl EventHooks {
    pub fn on_tickets_issued<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(TicketsIssuedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_tickets_issued = Some(Arc::new(f));
        self
    }

    pub fn on_order_needs_attention<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderNeedsAttentionEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_needs_attention = Some(Arc::new(f));
        self
    }
}
