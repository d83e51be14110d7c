pub mod availability;
pub mod notification;
pub mod scraping;

pub use availability::{AvailabilityEvent, EventError};
pub use notification::NotificationPayload;
pub use scraping::{ScrapeResultDocument, ScrapingTask, SlotObservation, TaskPriority};
