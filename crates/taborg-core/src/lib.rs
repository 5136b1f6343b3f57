//! The tab organizer engine.
//!
//! Data flows one way through a run: [`snapshot`] reads the window,
//! [`prompts`] turns it into a model prompt, [`normalize`] turns the answer
//! into [`ModelAction`]s and [`reconcile`] applies them to the live window.
//! [`Organizer`] ties the steps together and owns the run lifecycle.

pub mod error;
pub mod normalize;
pub mod notify;
pub mod organizer;
pub mod prompts;
pub mod reconcile;
pub mod snapshot;
pub mod trigger;

pub use error::OrganizeError;
pub use normalize::{normalize, InvalidAction, ModelAction, NormalizedResponse};
pub use notify::{Notification, Notifier, NullNotifier};
pub use organizer::{
    fixed_provider, gemini_factory, Organizer, Outcome, ProviderFactory, DEFAULT_MODEL_TIMEOUT,
};
pub use prompts::build_prompt;
pub use reconcile::{
    filter_tab_ids, ActionOutcome, ActionStatus, ColorCursor, FilterPolicy, Reconciler, RunReport,
    SkipReason,
};
pub use snapshot::{read_snapshot, OrganizeMode, Snapshot};
pub use trigger::Trigger;
