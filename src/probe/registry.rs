use std::collections::BTreeMap;
use std::sync::Arc;

use crate::catalog::{LOGIN_TEST, Scene};
use crate::error::RegistryError;

use super::homepage::{AuthFeatures, AuthLogin, AuthMe, MasterCategories};
use super::quotation::{CreateQuotation, ListKind, ListQuotations, QuotationDetail, SubmitQuotation};
use super::{LoginProbe, Probe};

#[derive(Clone)]
pub enum RegisteredProbe {
    Login(Arc<dyn LoginProbe>),
    Api(Arc<dyn Probe>),
}

/// Typed lookup from `(scene, test identifier)` to its probe.
#[derive(Clone, Default)]
pub struct ProbeRegistry {
    probes: BTreeMap<(Scene, String), RegisteredProbe>,
    login: Option<Arc<dyn LoginProbe>>,
}

impl ProbeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let results = [
            registry.register_login(Scene::Homepage, LOGIN_TEST, AuthLogin),
            registry.register(Scene::Homepage, "auth-me", AuthMe),
            registry.register(Scene::Homepage, "auth-features", AuthFeatures),
            registry.register(Scene::Homepage, "master-categories", MasterCategories),
            registry.register(
                Scene::Quotation,
                "list-quotations-mywork",
                ListQuotations {
                    kind: ListKind::MyWork,
                },
            ),
            registry.register(
                Scene::Quotation,
                "list-quotations-myteam",
                ListQuotations {
                    kind: ListKind::MyTeam,
                },
            ),
            registry.register(Scene::Quotation, "get-quotation-detail", QuotationDetail),
            registry.register(Scene::Quotation, "create-quotation", CreateQuotation),
            registry.register(Scene::Quotation, "submit-quotation", SubmitQuotation),
        ];
        for result in results {
            if let Err(err) = result {
                tracing::warn!("Skipping duplicate builtin probe: {}", err);
            }
        }
        registry
    }

    /// Registers an API probe.
    ///
    /// # Errors
    ///
    /// Returns `Duplicate` when the key is already taken.
    pub fn register<P>(&mut self, scene: Scene, test: &str, probe: P) -> Result<(), RegistryError>
    where
        P: Probe + 'static,
    {
        self.insert(scene, test, RegisteredProbe::Api(Arc::new(probe)))
    }

    /// Registers a login probe. The first one registered also becomes the
    /// probe used for lazy authentication in every scene.
    ///
    /// # Errors
    ///
    /// Returns `Duplicate` when the key is already taken.
    pub fn register_login<P>(
        &mut self,
        scene: Scene,
        test: &str,
        probe: P,
    ) -> Result<(), RegistryError>
    where
        P: LoginProbe + 'static,
    {
        let probe: Arc<dyn LoginProbe> = Arc::new(probe);
        self.insert(scene, test, RegisteredProbe::Login(Arc::clone(&probe)))?;
        if self.login.is_none() {
            self.login = Some(probe);
        }
        Ok(())
    }

    fn insert(
        &mut self,
        scene: Scene,
        test: &str,
        probe: RegisteredProbe,
    ) -> Result<(), RegistryError> {
        let key = (scene, test.to_owned());
        if self.probes.contains_key(&key) {
            return Err(RegistryError::Duplicate {
                scene: scene.as_str().to_owned(),
                test: test.to_owned(),
            });
        }
        self.probes.insert(key, probe);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `NotFound` when nothing is registered under the key.
    pub fn get(&self, scene: Scene, test: &str) -> Result<&RegisteredProbe, RegistryError> {
        self.probes
            .get(&(scene, test.to_owned()))
            .ok_or_else(|| RegistryError::NotFound {
                scene: scene.as_str().to_owned(),
                test: test.to_owned(),
            })
    }

    #[must_use]
    pub fn login_probe(&self) -> Option<Arc<dyn LoginProbe>> {
        self.login.clone()
    }
}
