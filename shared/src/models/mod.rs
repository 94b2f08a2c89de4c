//! Domain models shared across crates

pub mod api_key;
pub mod customer;
pub mod extraction;
pub mod invoice;
pub mod job;
pub mod order;
pub mod organization;
pub mod product;
pub mod role;
pub mod user;

pub use api_key::ApiKey;
pub use customer::Customer;
pub use extraction::{ExtractedItem, ExtractedOrder};
pub use invoice::{Invoice, InvoiceLine};
pub use job::{ExtractionJobPayload, JobState, WebhookJobPayload};
pub use order::{ChatMessage, Confidence, ConfidenceLevel, ExtractionType, Order, OrderItem, OrderStatus};
pub use organization::{BusinessProfile, OrgTier, Organization};
pub use product::Product;
pub use role::{Permission, Role};
pub use user::User;
