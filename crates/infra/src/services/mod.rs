mod delivery;

pub use delivery::{DeliveryResult, IDeliveryService, WebhookDeliveryService};
