//! Run lifecycle: one organize run from trigger to notification.
//!
//! A run reads preferences, snapshots the window, asks the model, normalizes
//! its answer and reconciles it against the live window. Only one run may be
//! in flight per [`Organizer`]; a second request while one is running is
//! turned away without touching anything.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use taborg_browser::TabHost;
use taborg_config::{Config, ModelConfig, PreferenceStore};
use taborg_providers::{CompletionRequest, GeminiProvider, LLMProvider};
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::error::OrganizeError;
use crate::normalize::normalize;
use crate::notify::{Notification, Notifier, NullNotifier};
use crate::prompts::build_prompt;
use crate::reconcile::{Reconciler, RunReport};
use crate::snapshot::{read_snapshot, OrganizeMode};
use crate::trigger::Trigger;

/// Default upper bound on one model call
pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds a provider for the API key read at run start
pub type ProviderFactory =
    Box<dyn Fn(&str) -> anyhow::Result<Box<dyn LLMProvider>> + Send + Sync>;

/// Gemini providers configured from `[model]`
pub fn gemini_factory(model: &ModelConfig) -> ProviderFactory {
    let model = model.clone();
    Box::new(move |api_key: &str| {
        let provider = GeminiProvider::new(
            api_key.to_string(),
            Some(model.model.clone()),
            model.max_tokens,
            model.temperature,
        )?
        .with_base_url(model.base_url.clone());
        Ok(Box::new(provider) as Box<dyn LLMProvider>)
    })
}

/// Hand out clones of one provider regardless of the key
pub fn fixed_provider<P>(provider: P) -> ProviderFactory
where
    P: LLMProvider + Clone + 'static,
{
    Box::new(move |_api_key: &str| Ok(Box::new(provider.clone()) as Box<dyn LLMProvider>))
}

/// How a run that did not fail ended
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// No eligible tabs; nothing was sent to the model
    NothingToDo,
    Organized(RunReport),
}

pub struct Organizer {
    host: Arc<dyn TabHost>,
    preferences: Arc<dyn PreferenceStore>,
    provider_factory: ProviderFactory,
    notifier: Arc<dyn Notifier>,
    model_timeout: Duration,
    running: AtomicBool,
}

impl Organizer {
    pub fn new(
        host: Arc<dyn TabHost>,
        preferences: Arc<dyn PreferenceStore>,
        provider_factory: ProviderFactory,
    ) -> Self {
        Self {
            host,
            preferences,
            provider_factory,
            notifier: Arc::new(NullNotifier),
            model_timeout: DEFAULT_MODEL_TIMEOUT,
            running: AtomicBool::new(false),
        }
    }

    /// An organizer that talks to Gemini as configured in `config`
    pub fn from_config(
        config: &Config,
        host: Arc<dyn TabHost>,
        preferences: Arc<dyn PreferenceStore>,
    ) -> Self {
        Self::new(host, preferences, gemini_factory(&config.model))
            .with_model_timeout(config.model_timeout())
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Start a run for `trigger`. A shortcut uses the stored organize option.
    pub async fn handle_trigger(&self, trigger: Trigger) -> Result<Outcome, OrganizeError> {
        let mode = match trigger.explicit_mode() {
            Some(mode) => mode,
            None => match self.preferences.load() {
                Ok(preferences) => OrganizeMode::from(preferences.organize_option),
                Err(e) => {
                    let err = OrganizeError::from(e);
                    error!("Error in organizeTabs: {}", err);
                    self.notifier.notify(&Notification::run_failed(&err.to_string()));
                    return Err(err);
                }
            },
        };
        self.run_organize(mode).await
    }

    /// Run one organize pass and notify the user of how it went.
    ///
    /// Returns [`OrganizeError::AlreadyRunning`] at once, and without a
    /// notification, if another run holds the lock.
    pub async fn run_organize(&self, mode: OrganizeMode) -> Result<Outcome, OrganizeError> {
        let _guard = RunGuard::acquire(&self.running).ok_or_else(|| {
            info!("Organize requested while a run is in progress, ignoring");
            OrganizeError::AlreadyRunning
        })?;

        self.run_with_id(mode, Uuid::new_v4()).await
    }

    #[instrument(name = "organize", skip_all, fields(run_id = %run_id, mode = ?mode))]
    async fn run_with_id(&self, mode: OrganizeMode, run_id: Uuid) -> Result<Outcome, OrganizeError> {
        info!("Organize run started");
        let result = self.organize(mode).await;
        if let Err(e) = &result {
            error!("Error in organizeTabs: {}", e);
        }
        self.notify_result(&result);
        result
    }

    async fn organize(&self, mode: OrganizeMode) -> Result<Outcome, OrganizeError> {
        let preferences = self.preferences.load()?;
        let api_key = preferences
            .api_key()
            .ok_or(OrganizeError::ConfigMissing)?
            .to_string();

        let snapshot = read_snapshot(self.host.as_ref(), mode)
            .await
            .map_err(|e| OrganizeError::Browser(e.to_string()))?;
        if !snapshot.has_eligible_tabs() {
            info!("No eligible tabs, nothing to organize");
            return Ok(Outcome::NothingToDo);
        }

        let prompt = build_prompt(&snapshot.eligible_tabs(), &snapshot.existing_groups);
        let text = self.ask_model(&api_key, prompt).await?;
        let response = normalize(&text)?;

        let report = Reconciler::for_mode(mode)
            .run(self.host.as_ref(), &snapshot, response)
            .await;
        Ok(Outcome::Organized(report))
    }

    async fn ask_model(&self, api_key: &str, prompt: String) -> Result<String, OrganizeError> {
        let provider = (self.provider_factory)(api_key)
            .map_err(|e| OrganizeError::ModelUnavailable(e.to_string()))?;
        debug!("Prompt for {}:{}\n{}", provider.name(), provider.model(), prompt);

        let request = CompletionRequest::user_prompt(prompt);
        let response = match tokio::time::timeout(self.model_timeout, provider.complete(request)).await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(OrganizeError::ModelUnavailable(e.to_string())),
            Err(_) => {
                return Err(OrganizeError::ModelUnavailable(format!(
                    "no response within {}s",
                    self.model_timeout.as_secs_f32()
                )))
            }
        };

        debug!("Raw text response: {}", response.content);
        if response.content.trim().is_empty() {
            return Err(OrganizeError::MalformedResponse(
                "Invalid or empty response from Gemini API".to_string(),
            ));
        }
        Ok(response.content)
    }

    fn notify_result(&self, result: &Result<Outcome, OrganizeError>) {
        match result {
            Ok(Outcome::NothingToDo) => self.notifier.notify(&Notification::nothing_to_do()),
            Ok(Outcome::Organized(report)) => {
                for name in report.failed_group_names() {
                    self.notifier.notify(&Notification::group_failed(name));
                }
                self.notifier.notify(&Notification::success());
            }
            Err(OrganizeError::ConfigMissing) => {
                self.notifier.notify(&Notification::missing_api_key())
            }
            Err(OrganizeError::AlreadyRunning) => {}
            Err(e) => self.notifier.notify(&Notification::run_failed(&e.to_string())),
        }
    }
}

/// Holds the run lock; released on drop, including on early return
struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
