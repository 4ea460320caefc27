//! The rebindable model slot.
//!
//! Constructed once at startup and shared by reference with every request
//! handler. When no API key was available at startup the slot is empty; a
//! later [`ModelSlot::rebind`] fills it without restarting the process.

use std::sync::{Arc, RwLock, RwLockReadGuard};
use mailwright_config::AppConfig;
use mailwright_core::provider::{Provider, ProviderRequest};
use tracing::info;
use crate::router::build_provider;

/// A provider together with the sampling settings to call it with.
#[derive(Clone)]
pub struct ModelBinding {
    pub provider: Arc<dyn Provider>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl ModelBinding {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
        }
    }

    /// Build the request for one rendered prompt.
    pub fn request(&self, prompt: impl Into<String>) -> ProviderRequest {
        ProviderRequest {
            model: self.model.clone(),
            prompt: prompt.into(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

impl std::fmt::Debug for ModelBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBinding")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// The configured provider name and its binding, swapped together.
struct SlotState {
    provider_name: String,
    binding: Option<ModelBinding>,
}

/// Holds the current model binding, if any.
pub struct ModelSlot {
    state: RwLock<SlotState>,
}

impl ModelSlot {
    fn with_state(provider_name: String, binding: Option<ModelBinding>) -> Self {
        Self {
            state: RwLock::new(SlotState {
                provider_name,
                binding,
            }),
        }
    }

    /// Resolve a binding from configuration. The slot is empty when no
    /// usable API key is configured.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::with_state(config.provider.clone(), Self::bind(config))
    }

    /// A slot pre-filled with an explicit binding.
    pub fn bound(binding: ModelBinding) -> Self {
        Self::with_state(binding.provider.name().to_string(), Some(binding))
    }

    /// A slot with nothing bound, for the named provider.
    pub fn empty(provider_name: impl Into<String>) -> Self {
        Self::with_state(provider_name.into(), None)
    }

    fn read(&self) -> RwLockReadGuard<'_, SlotState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    /// The current binding.
    pub fn current(&self) -> Option<ModelBinding> {
        self.read().binding.clone()
    }

    /// The provider name and binding as of a single point in time.
    pub fn snapshot(&self) -> (String, Option<ModelBinding>) {
        let state = self.read();
        (state.provider_name.clone(), state.binding.clone())
    }

    pub fn is_bound(&self) -> bool {
        self.read().binding.is_some()
    }

    /// The configured provider name (known even when unbound).
    pub fn provider_name(&self) -> String {
        self.read().provider_name.clone()
    }

    /// Re-resolve the binding from `config`. Returns whether a model is bound
    /// afterwards.
    ///
    /// A configuration without a usable key clears the slot. The provider
    /// name and binding change under one write lock.
    pub fn rebind(&self, config: &AppConfig) -> bool {
        let next = Self::bind(config);
        let bound = next.is_some();
        {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            state.provider_name = config.provider.clone();
            state.binding = next;
        }
        info!(provider = %config.provider, bound, "Model slot rebound");
        bound
    }

    fn bind(config: &AppConfig) -> Option<ModelBinding> {
        build_provider(config).map(|provider| ModelBinding {
            provider,
            model: config.effective_model().to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_without_key() {
        let slot = ModelSlot::from_config(&AppConfig::default());
        assert!(!slot.is_bound());
        assert!(slot.current().is_none());
        assert_eq!(slot.provider_name(), "gemini");
    }

    #[test]
    fn rebind_picks_up_late_key() {
        let slot = ModelSlot::from_config(&AppConfig::default());
        assert!(!slot.is_bound());

        let config = AppConfig {
            api_key: Some("late-key".into()),
            ..AppConfig::default()
        };
        assert!(slot.rebind(&config));

        let binding = slot.current().unwrap();
        assert_eq!(binding.provider.name(), "gemini");
        assert_eq!(binding.model, "gemini-flash-latest");
    }

    #[test]
    fn rebind_without_key_clears_slot() {
        let config = AppConfig {
            api_key: Some("k".into()),
            ..AppConfig::default()
        };
        let slot = ModelSlot::from_config(&config);
        assert!(slot.is_bound());

        assert!(!slot.rebind(&AppConfig::default()));
        assert!(!slot.is_bound());
    }

    #[test]
    fn rebind_swaps_name_and_binding_together() {
        let slot = ModelSlot::from_config(&AppConfig::default());
        let config = AppConfig {
            api_key: Some("sk-test".into()),
            provider: "openrouter".into(),
            ..AppConfig::default()
        };
        assert!(slot.rebind(&config));

        let (name, binding) = slot.snapshot();
        assert_eq!(name, "openrouter");
        assert_eq!(binding.unwrap().provider.name(), "openrouter");

        assert!(!slot.rebind(&AppConfig::default()));
        let (name, binding) = slot.snapshot();
        assert_eq!(name, "gemini");
        assert!(binding.is_none());
    }

    #[test]
    fn snapshot_is_consistent_under_concurrent_rebinds() {
        let slot = Arc::new(ModelSlot::from_config(&AppConfig::default()));
        let keyed = AppConfig {
            api_key: Some("sk-test".into()),
            provider: "openai".into(),
            ..AppConfig::default()
        };

        let writer = {
            let slot = Arc::clone(&slot);
            std::thread::spawn(move || {
                for i in 0..200 {
                    if i % 2 == 0 {
                        slot.rebind(&keyed);
                    } else {
                        slot.rebind(&AppConfig::default());
                    }
                }
            })
        };

        for _ in 0..200 {
            match slot.snapshot() {
                (name, Some(binding)) => assert_eq!(binding.provider.name(), name),
                (name, None) => assert_eq!(name, "gemini"),
            }
        }
        writer.join().unwrap();
    }

    #[test]
    fn binding_builds_requests() {
        let config = AppConfig {
            api_key: Some("k".into()),
            temperature: 0.2,
            max_tokens: Some(512),
            ..AppConfig::default()
        };
        let binding = ModelSlot::from_config(&config).current().unwrap();
        let request = binding.request("prompt text");
        assert_eq!(request.prompt, "prompt text");
        assert_eq!(request.max_tokens, Some(512));
        assert!((request.temperature - 0.2).abs() < f32::EPSILON);
    }
}
