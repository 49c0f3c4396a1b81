use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{ConfirmationEvent, EventHandler, EventProducer, Handler};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub confirmation_producer: Vec<EventProducer<ConfirmationEvent>>,
}

impl EventProducers {
    pub fn has_confirmation_subscribers(&self) -> bool {
        !self.confirmation_producer.is_empty()
    }
}

pub struct EventHandlers {
    pub on_confirmation: Option<EventHandler<ConfirmationEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_confirmation = hooks.on_confirmation.map(|f| EventHandler::new(buffer_size, f));
        Self { on_confirmation }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_confirmation {
            result.confirmation_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_confirmation {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_confirmation: Option<Handler<ConfirmationEvent>>,
}

impl EventHooks {
    /// Registers the subscriber that delivers confirmations to the machine.
    pub fn on_confirmation<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(ConfirmationEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_confirmation = Some(Arc::new(f));
        self
    }
}
