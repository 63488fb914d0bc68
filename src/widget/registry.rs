//! Named vector backends available to a widget
//!
//! Each entry pairs a constructor with the per-frame render hook of the
//! widget that registered it. Support probes run once, at registration;
//! unsupported backends never enter the registry.

use crate::config::WidgetSettings;
use crate::error::{CrateResult, RenderError};
use crate::widget::backend::VectorBackend;

pub type BackendConstructor = Box<dyn Fn(&WidgetSettings) -> CrateResult<Box<dyn VectorBackend>>>;

/// Draws the widget's content between `render_start` and `render_end`
pub type RenderHook = Box<dyn FnMut(&mut dyn VectorBackend) -> CrateResult<()>>;

struct BackendFactory {
    id: String,
    constructor: BackendConstructor,
    render: RenderHook,
}

#[derive(Default)]
pub struct BackendRegistry {
    // Registration order decides the fallback default
    factories: Vec<BackendFactory>,
    default_id: Option<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `id` when `is_supported` returns true.
    ///
    /// Re-registering an id replaces the earlier entry. Returns whether the
    /// backend was registered.
    pub fn register_if_supported(
        &mut self,
        id: impl Into<String>,
        is_supported: impl FnOnce() -> bool,
        constructor: BackendConstructor,
        render: RenderHook,
    ) -> bool {
        let id = id.into();
        if !is_supported() {
            log::debug!("vector backend {id} is not supported here");
            return false;
        }

        let factory = BackendFactory {
            id,
            constructor,
            render,
        };
        match self.factories.iter_mut().find(|f| f.id == factory.id) {
            Some(existing) => *existing = factory,
            None => self.factories.push(factory),
        }
        true
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.factories.iter().any(|f| f.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.factories.iter().map(|f| f.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    pub fn set_default_id(&mut self, id: impl Into<String>) {
        self.default_id = Some(id.into());
    }

    /// The preferred id when it is registered, else the first registered one
    pub fn default_id(&self) -> Option<&str> {
        self.default_id
            .as_deref()
            .filter(|id| self.is_registered(id))
            .or_else(|| self.factories.first().map(|f| f.id.as_str()))
    }

    pub fn create(&self, id: &str, settings: &WidgetSettings) -> CrateResult<Box<dyn VectorBackend>> {
        let factory = self
            .factories
            .iter()
            .find(|f| f.id == id)
            .ok_or_else(|| RenderError::InvalidArgument(format!("no vector backend named {id}")))?;
        (factory.constructor)(settings)
    }

    /// Run the render hook registered under `id` against `backend`
    pub fn render(&mut self, id: &str, backend: &mut dyn VectorBackend) -> CrateResult<()> {
        let factory = self
            .factories
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| RenderError::InvalidArgument(format!("no vector backend named {id}")))?;
        (factory.render)(backend)
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("ids", &self.ids().collect::<Vec<_>>())
            .field("default_id", &self.default_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widget::backend::{FrameInfo, SurfaceLayout};
    use std::any::Any;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Dummy(&'static str);

    impl VectorBackend for Dummy {
        fn id(&self) -> &'static str {
            self.0
        }
        fn initialize(&mut self, _: &SurfaceLayout) -> CrateResult<()> {
            Ok(())
        }
        fn on_resize(&mut self, _: &SurfaceLayout) -> CrateResult<()> {
            Ok(())
        }
        fn render_start(&mut self, _: &FrameInfo) -> CrateResult<()> {
            Ok(())
        }
        fn render_end(&mut self) -> CrateResult<()> {
            Ok(())
        }
        fn destroy(&mut self) {}
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn constructor(id: &'static str) -> BackendConstructor {
        Box::new(move |_| Ok(Box::new(Dummy(id)) as Box<dyn VectorBackend>))
    }

    fn no_hook() -> RenderHook {
        Box::new(|_| Ok(()))
    }

    #[test]
    fn probe_runs_once_and_filters() {
        let probes = Rc::new(Cell::new(0));
        let mut registry = BackendRegistry::new();

        let counter = probes.clone();
        let registered = registry.register_if_supported(
            "gl",
            move || {
                counter.set(counter.get() + 1);
                false
            },
            constructor("gl"),
            no_hook(),
        );
        assert!(!registered);
        assert!(registry.register_if_supported("canvas", || true, constructor("canvas"), no_hook()));

        assert_eq!(probes.get(), 1);
        assert!(!registry.is_registered("gl"));
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec!["canvas"]);
        assert!(registry.create("gl", &WidgetSettings::default()).is_err());
    }

    #[test]
    fn default_falls_back_to_first_registered() {
        let mut registry = BackendRegistry::new();
        registry.register_if_supported("a", || true, constructor("a"), no_hook());
        registry.register_if_supported("b", || true, constructor("b"), no_hook());
        assert_eq!(registry.default_id(), Some("a"));

        registry.set_default_id("b");
        assert_eq!(registry.default_id(), Some("b"));

        registry.set_default_id("missing");
        assert_eq!(registry.default_id(), Some("a"));
    }

    #[test]
    fn render_calls_the_matching_hook() {
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        let mut registry = BackendRegistry::new();
        registry.register_if_supported(
            "a",
            || true,
            constructor("a"),
            Box::new(move |backend| {
                assert_eq!(backend.id(), "a");
                seen.set(seen.get() + 1);
                Ok(())
            }),
        );

        let mut backend = registry.create("a", &WidgetSettings::default()).unwrap();
        registry.render("a", backend.as_mut()).unwrap();
        assert_eq!(calls.get(), 1);
    }
}
