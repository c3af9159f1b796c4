//! Controller factories and the write-once registries that hold them.
//!
//! A registry maps a controller *kind* (e.g. `ip-match`, `maxmind-asn`) to a
//! factory that turns a declaration's settings into a live controller
//! instance. Registration happens once at process startup; registering the
//! same kind twice is a programming error and panics immediately rather than
//! silently shadowing the first registration.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::controller::{AnalysisController, MatchController};
use crate::error::BuildError;

/// A single controller's declaration as it appears in configuration: the
/// name it's addressed by, the factory kind that builds it, and its
/// controller-specific settings re-serialized as JSON so the core crate
/// never needs to know concrete settings types.
#[derive(Debug, Clone)]
pub struct ControllerDeclaration {
    pub name: String,
    pub kind: String,
    pub enabled: bool,
    pub settings: serde_json::Value,
}

impl ControllerDeclaration {
    pub fn new(name: impl Into<String>, kind: impl Into<String>, settings: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            enabled: true,
            settings,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

#[async_trait]
pub trait AnalysisControllerFactory: Send + Sync {
    async fn build(
        &self,
        name: &str,
        settings: serde_json::Value,
    ) -> Result<Arc<dyn AnalysisController>, BuildError>;
}

#[async_trait]
pub trait MatchControllerFactory: Send + Sync {
    async fn build(
        &self,
        name: &str,
        settings: serde_json::Value,
    ) -> Result<Arc<dyn MatchController>, BuildError>;
}

/// Blanket impl so a plain async closure can be registered directly,
/// without hand-writing a factory struct for every controller kind.
#[async_trait]
impl<F, Fut> AnalysisControllerFactory for F
where
    F: Fn(String, serde_json::Value) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Arc<dyn AnalysisController>, BuildError>> + Send,
{
    async fn build(
        &self,
        name: &str,
        settings: serde_json::Value,
    ) -> Result<Arc<dyn AnalysisController>, BuildError> {
        (self)(name.to_string(), settings).await
    }
}

#[async_trait]
impl<F, Fut> MatchControllerFactory for F
where
    F: Fn(String, serde_json::Value) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Arc<dyn MatchController>, BuildError>> + Send,
{
    async fn build(
        &self,
        name: &str,
        settings: serde_json::Value,
    ) -> Result<Arc<dyn MatchController>, BuildError> {
        (self)(name.to_string(), settings).await
    }
}

macro_rules! registry {
    ($registry:ident, $factory:ident, $controller:ident) => {
        #[derive(Default)]
        pub struct $registry {
            factories: HashMap<String, Arc<dyn $factory>>,
        }

        impl $registry {
            pub fn new() -> Self {
                Self::default()
            }

            /// Register a factory for `kind`. Panics if `kind` is already
            /// registered — a duplicate registration is a startup bug, not
            /// a runtime condition to recover from.
            pub fn register(&mut self, kind: impl Into<String>, factory: Arc<dyn $factory>) {
                let kind = kind.into();
                if self.factories.insert(kind.clone(), factory).is_some() {
                    panic!("duplicate controller factory registered for kind {kind:?}");
                }
            }

            pub fn has(&self, kind: &str) -> bool {
                self.factories.contains_key(kind)
            }

            async fn build_one(
                &self,
                declaration: &ControllerDeclaration,
            ) -> Result<Arc<dyn $controller>, BuildError> {
                let factory = self.factories.get(&declaration.kind).ok_or_else(|| {
                    BuildError::UnknownKind {
                        kind: declaration.kind.clone(),
                    }
                })?;
                factory
                    .build(&declaration.name, declaration.settings.clone())
                    .await
            }

            /// Build every enabled declaration, in order, failing fast on
            /// the first unknown kind, duplicate name, or factory error.
            pub async fn build_all(
                &self,
                declarations: &[ControllerDeclaration],
            ) -> Result<Vec<Arc<dyn $controller>>, BuildError> {
                let mut seen = std::collections::HashSet::new();
                let mut built = Vec::with_capacity(declarations.len());
                for declaration in declarations {
                    if !declaration.enabled {
                        continue;
                    }
                    if !seen.insert(declaration.name.clone()) {
                        return Err(BuildError::DuplicateName {
                            name: declaration.name.clone(),
                        });
                    }
                    let span = tracing::info_span!(
                        "build_controller",
                        controller.name = %declaration.name,
                        controller.kind = %declaration.kind,
                    );
                    let _enter = span.enter();
                    built.push(self.build_one(declaration).await?);
                }
                Ok(built)
            }
        }
    };
}

registry!(AnalysisControllerRegistry, AnalysisControllerFactory, AnalysisController);
registry!(MatchControllerRegistry, MatchControllerFactory, MatchController);
