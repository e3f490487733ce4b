//! Discord integration for the support bot, built on serenity
//!
//! - **Handler** (`handler`) - serenity `EventHandler` feeding the six entry points
//! - **Events** (`events`) - serenity-free event types and routing
//! - **Commands** (`commands`) - `/register`, `/button`, `/resend_register_invite`
//! - **Components** (`components`) - register button, registration modal, messages
//! - **Platform** (`platform`) - `SupportPlatform` and outbound messaging over serenity's `Http`
//! - **Bot** (`bot`) - the `SupportEventService` wired to the registration workflow
//!
//! # Architecture
//!
//! ```text
//! serenity Client → SupportHandler → SupportBot → RegistrationWorkflow → SupportPlatform (Http)
//!                                        ↓                                   ↓
//!                                InteractionResponder                RegistrationStore (db)
//! ```

pub mod bot;
pub mod commands;
pub mod components;
pub mod events;
pub mod handler;
pub mod platform;
pub mod responder;

pub use bot::{BotSettings, SupportBot};
pub use events::{route, InboundEvent, SupportEventService};
pub use handler::{intents, SupportHandler};
pub use platform::DiscordPlatform;
