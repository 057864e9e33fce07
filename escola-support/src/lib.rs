//! Customer-facing helpers that never leave the process: the keyword FAQ
//! behind the support chat and the WhatsApp/USSD payment hand-off.
//!
//! Both read their phone numbers, USSD code and mailbox from
//! [`escola_config::SupportSettings`]; nothing here talks to the network.
pub mod faq;
pub mod handoff;

pub use faq::{FaqEntry, FaqMatcher};
pub use handoff::{HandoffError, Order, quick_whatsapp_link, ussd_instructions, whatsapp_link};
