pub mod queue;

pub use queue::{build_doctor_queue, queue_order, QueueService};
