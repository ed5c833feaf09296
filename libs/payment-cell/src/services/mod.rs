pub mod gateway;
pub mod payments;

pub use gateway::{verify_order_signature, verify_webhook_signature, PaymentGatewayClient};
pub use payments::PaymentService;
