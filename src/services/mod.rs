//! Services layer - Business logic
//!
//! This module contains the business logic of the post service.
//! Services are responsible for:
//! - Implementing business rules
//! - Coordinating between repositories, the content store and the mailer
//! - Handling validation and error cases

pub mod flash;
pub mod image;
pub mod mail;
pub mod notification;
pub mod post;
pub mod sanitizer;
pub mod storage;
pub mod validation;

pub use flash::FlashStore;
pub use image::{ImageError, ImageStore, StoredImage};
pub use mail::{mailer_from_config, LogMailer, MailError, Mailer, OutgoingMail, SmtpMailer};
pub use notification::{
    spawn_listener, DeliveryState, MailRenderer, NotificationDispatcher, PostCreatedEvent,
    PostCreatedListener,
};
pub use post::{EditForm, FormOptions, PostDetails, PostService, PostServiceError, POSTS_PER_PAGE};
pub use sanitizer::HtmlSanitizer;
pub use storage::{ContentStore, DynContentStore, LocalContentStore, StorageError};
pub use validation::{
    compute_validation_rules, parse_rules, store_rules, Rule, RuleSet, ValidationErrors, Validator,
};
