//! Registry mapping provider names to constructor functions.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::{
    ArxivProvider, CrossRefProvider, GoogleScholarProvider, IacrProvider, PreprintProvider,
    PreprintServer, Provider, ProviderError, PubMedProvider, SemanticScholarProvider,
};
use crate::models::ProviderId;

/// Builds one provider instance from run-scoped settings
pub type Constructor =
    Arc<dyn Fn(&ProviderSettings) -> Result<Arc<dyn Provider>, ProviderError> + Send + Sync>;

/// Credentials and switches consulted when constructing providers
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    /// Optional Semantic Scholar API key (raises rate limits)
    pub semantic_scholar_api_key: Option<String>,
    /// Google Scholar is scraped, so it must be switched on explicitly
    pub google_scholar_enabled: bool,
}

impl ProviderSettings {
    /// Read settings from the process environment
    pub fn from_env() -> Self {
        Self {
            semantic_scholar_api_key: std::env::var("SEMANTIC_SCHOLAR_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            google_scholar_enabled: std::env::var(super::GOOGLE_SCHOLAR_ENABLED_ENV)
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false),
        }
    }
}

/// One named provider and how to build it
#[derive(Clone)]
pub struct ProviderSpec {
    pub name: String,
    pub constructor: Constructor,
}

impl ProviderSpec {
    pub fn new<F>(name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&ProviderSettings) -> Result<Arc<dyn Provider>, ProviderError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            constructor: Arc::new(constructor),
        }
    }
}

impl fmt::Debug for ProviderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSpec")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Registry for all known search providers
///
/// Instances are built on demand with [`ProviderRegistry::create`]; nothing
/// is constructed until a run actually asks for a provider.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    specs: BTreeMap<String, ProviderSpec>,
    settings: ProviderSettings,
}

impl ProviderRegistry {
    /// Create a registry with every bundled provider
    pub fn new(settings: ProviderSettings) -> Self {
        let mut registry = Self::empty(settings);

        registry.register(ProviderSpec::new(ProviderId::Arxiv.id(), |_| {
            Ok(Arc::new(ArxivProvider::new()?) as Arc<dyn Provider>)
        }));
        registry.register(ProviderSpec::new(ProviderId::PubMed.id(), |_| {
            Ok(Arc::new(PubMedProvider::new()?) as Arc<dyn Provider>)
        }));
        registry.register(ProviderSpec::new(ProviderId::BioRxiv.id(), |_| {
            Ok(Arc::new(PreprintProvider::new(PreprintServer::BioRxiv)?) as Arc<dyn Provider>)
        }));
        registry.register(ProviderSpec::new(ProviderId::MedRxiv.id(), |_| {
            Ok(Arc::new(PreprintProvider::new(PreprintServer::MedRxiv)?) as Arc<dyn Provider>)
        }));
        registry.register(ProviderSpec::new(ProviderId::GoogleScholar.id(), |settings| {
            Ok(Arc::new(GoogleScholarProvider::new(settings.google_scholar_enabled)?)
                as Arc<dyn Provider>)
        }));
        registry.register(ProviderSpec::new(ProviderId::Iacr.id(), |_| {
            Ok(Arc::new(IacrProvider::new()?) as Arc<dyn Provider>)
        }));
        registry.register(ProviderSpec::new(ProviderId::SemanticScholar.id(), |settings| {
            Ok(Arc::new(SemanticScholarProvider::new(
                settings.semantic_scholar_api_key.clone(),
            )?) as Arc<dyn Provider>)
        }));
        registry.register(ProviderSpec::new(ProviderId::CrossRef.id(), |_| {
            Ok(Arc::new(CrossRefProvider::new()?) as Arc<dyn Provider>)
        }));

        registry
    }

    /// Create a registry with no providers registered
    pub fn empty(settings: ProviderSettings) -> Self {
        Self {
            specs: BTreeMap::new(),
            settings,
        }
    }

    /// Register (or replace) a provider constructor
    pub fn register(&mut self, spec: ProviderSpec) {
        self.specs.insert(spec.name.clone(), spec);
    }

    /// Construct the provider registered under `name`.
    ///
    /// Aliases such as `semantic` resolve to their canonical names.
    pub fn create(&self, name: &str) -> Result<Arc<dyn Provider>, ProviderError> {
        let spec = self.lookup(name).ok_or_else(|| {
            ProviderError::Configuration(format!(
                "Unknown provider '{}'. Available: {}",
                name,
                self.names().join(", ")
            ))
        })?;
        (spec.constructor)(&self.settings)
    }

    fn lookup(&self, name: &str) -> Option<&ProviderSpec> {
        self.specs.get(name).or_else(|| {
            let canonical = ProviderId::from_name(name);
            self.specs.get(canonical.id())
        })
    }

    /// Check if a provider name is known
    pub fn has(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// All registered provider names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.specs.keys().map(|s| s.as_str()).collect()
    }

    /// Names from `requested` that the registry does not know
    pub fn unknown<'a>(&self, requested: &'a [String]) -> Vec<&'a str> {
        requested
            .iter()
            .map(|s| s.as_str())
            .filter(|name| !self.has(name))
            .collect()
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new(ProviderSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::MockProvider;

    #[test]
    fn test_registry_has_all_bundled_providers() {
        let registry = ProviderRegistry::default();
        assert_eq!(registry.len(), ProviderId::SEARCHABLE.len());
        for id in ProviderId::SEARCHABLE.iter() {
            assert!(registry.has(id.id()), "provider '{}' should be registered", id);
        }
    }

    #[test]
    fn test_create_resolves_aliases() {
        let registry = ProviderRegistry::default();
        let provider = registry.create("semantic").unwrap();
        assert_eq!(provider.id(), ProviderId::SemanticScholar);
    }

    #[test]
    fn test_unknown_provider_is_configuration_error() {
        let registry = ProviderRegistry::default();
        let err = registry.create("nonexistent").unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
        assert!(err.to_string().contains("nonexistent"));
    }

    #[test]
    fn test_google_scholar_requires_opt_in() {
        let registry = ProviderRegistry::default();
        assert!(matches!(
            registry.create("google_scholar"),
            Err(ProviderError::Configuration(_))
        ));

        let registry = ProviderRegistry::new(ProviderSettings {
            google_scholar_enabled: true,
            ..Default::default()
        });
        assert!(registry.create("google_scholar").is_ok());
    }

    #[test]
    fn test_register_custom_provider() {
        let mut registry = ProviderRegistry::empty(ProviderSettings::default());
        registry.register(ProviderSpec::new("mock", |_| {
            Ok(Arc::new(MockProvider::new("mock")) as Arc<dyn Provider>)
        }));
        assert_eq!(registry.names(), vec!["mock"]);
        assert!(registry.create("mock").is_ok());

        let requested = vec!["mock".to_string(), "nope".to_string()];
        assert_eq!(registry.unknown(&requested), vec!["nope"]);
    }
}
