//! Per-type registry cache with single-flight construction.
//!
//! Each negotiated resource type declares its renderers statically through
//! [`Negotiated`]. The cache maps every type to a once-cell: the first lookup
//! inserts the cell under the write lock, releases it, and builds the
//! [`RendererRegistry`] inside the cell, so concurrent first requests never
//! build twice and a build may itself look up other types. Every later
//! lookup only takes the read lock and clones an `Arc`.

use super::{Renderer, RendererRegistry};
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};

/// A resource type that can be rendered in several formats.
///
/// # Examples
///
/// ```
/// use conneg_axum_http::{Negotiated, Renderer};
/// use axum::response::IntoResponse;
///
/// struct Article {
///     title: String,
/// }
///
/// impl Negotiated for Article {
///     fn renderers() -> Vec<Renderer<Self>> {
///         vec![
///             Renderer::new("txt", |article: &Article, _, _, _| {
///                 Some(article.title.clone().into_response())
///             })
///             .with_media_types(["text/plain"]),
///         ]
///     }
///
///     fn default_format() -> Option<&'static str> {
///         Some("txt")
///     }
/// }
/// ```
pub trait Negotiated: Sized + Send + Sync + 'static {
    /// Renderers in declaration order. Declaration order breaks priority
    /// ties, so it must be deterministic.
    ///
    /// Called once per cache. It may look up the registries of other types,
    /// but never its own: that would wait on the build in progress forever.
    fn renderers() -> Vec<Renderer<Self>>;

    /// Format used when the request carries neither a format override nor
    /// an `Accept` header.
    fn default_format() -> Option<&'static str> {
        None
    }

    /// Formats always appended to the candidate list, in order.
    fn fallback_formats() -> &'static [&'static str] {
        &[]
    }

    /// Format tag -> priority for this type. When set, replaces the
    /// process-level overrides of the cache entirely.
    fn priority_overrides() -> Option<BTreeMap<String, i32>> {
        None
    }
}

type AnyRegistry = Arc<dyn Any + Send + Sync>;
type RegistryCell = Arc<OnceLock<AnyRegistry>>;

/// Thread-safe map from resource type to its built registry.
///
/// Cloning shares the same underlying map.
///
/// # Examples
///
/// ```
/// use conneg_axum_http::{Negotiated, RegistryCache, Renderer};
/// use std::sync::Arc;
///
/// struct Status;
///
/// impl Negotiated for Status {
///     fn renderers() -> Vec<Renderer<Self>> {
///         vec![Renderer::new("json", |_: &Status, _, _, _| None)
///             .with_media_types(["application/json"])]
///     }
/// }
///
/// let cache = RegistryCache::new();
/// let first = cache.get_or_build::<Status>();
/// let second = cache.get_or_build::<Status>();
/// assert!(Arc::ptr_eq(&first, &second));
/// ```
#[derive(Clone, Default)]
pub struct RegistryCache {
    registries: Arc<RwLock<HashMap<TypeId, RegistryCell>>>,
    priority_overrides: Arc<BTreeMap<String, i32>>,
}

impl RegistryCache {
    /// Create an empty cache without priority overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty cache applying process-level priority overrides to
    /// every type that does not declare its own.
    pub fn with_priority_overrides(overrides: BTreeMap<String, i32>) -> Self {
        Self {
            registries: Arc::new(RwLock::new(HashMap::new())),
            priority_overrides: Arc::new(overrides),
        }
    }

    /// The process-wide cache.
    pub fn global() -> &'static RegistryCache {
        static GLOBAL: OnceLock<RegistryCache> = OnceLock::new();
        GLOBAL.get_or_init(RegistryCache::new)
    }

    /// Get the registry for `V`, building it on first access.
    pub fn get_or_build<V: Negotiated>(&self) -> Arc<RendererRegistry<V>> {
        let key = TypeId::of::<V>();

        let existing = self.registries.read().get(&key).cloned();
        let cell = match existing {
            Some(cell) => cell,
            None => Arc::clone(self.registries.write().entry(key).or_default()),
        };

        let entry = cell
            .get_or_init(|| {
                let overrides = V::priority_overrides();
                let overrides = overrides.as_ref().unwrap_or(&*self.priority_overrides);
                tracing::debug!("Building renderer registry for {}", std::any::type_name::<V>());
                let registry: AnyRegistry = Arc::new(RendererRegistry::<V>::build_with_overrides(
                    V::renderers(),
                    overrides,
                ));
                registry
            })
            .clone();

        Self::downcast(entry)
    }

    /// Get the registry for `V` only if it was already built.
    pub fn get<V: Negotiated>(&self) -> Option<Arc<RendererRegistry<V>>> {
        let registries = self.registries.read();
        registries
            .get(&TypeId::of::<V>())
            .and_then(|cell| cell.get().cloned())
            .map(Self::downcast)
    }

    /// Number of registries built so far.
    pub fn len(&self) -> usize {
        self.registries
            .read()
            .values()
            .filter(|cell| cell.get().is_some())
            .count()
    }

    /// Whether no registry was built yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn downcast<V: Negotiated>(entry: AnyRegistry) -> Arc<RendererRegistry<V>> {
        match entry.downcast::<RendererRegistry<V>>() {
            Ok(registry) => registry,
            // entries are keyed by TypeId::of::<V>(), so the types always agree
            Err(_) => unreachable!("registry cache entry has the wrong type"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;

    struct Plain;

    impl Negotiated for Plain {
        fn renderers() -> Vec<Renderer<Self>> {
            vec![
                Renderer::new("html", |_: &Plain, _, _, _| None)
                    .with_media_types(["text/html"])
                    .with_priority(1),
                Renderer::new("json", |_: &Plain, _, _, _| None)
                    .with_media_types(["application/json"])
                    .with_priority(2),
            ]
        }
    }

    struct Overridden;

    impl Negotiated for Overridden {
        fn renderers() -> Vec<Renderer<Self>> {
            vec![
                Renderer::new("html", |_: &Overridden, _, _, _| None).with_media_types(["text/html"]),
                Renderer::new("txt", |_: &Overridden, _, _, _| None).with_media_types(["text/plain"]),
            ]
        }

        fn priority_overrides() -> Option<BTreeMap<String, i32>> {
            Some(BTreeMap::from([("txt".to_string(), 4)]))
        }
    }

    static BUILDS: AtomicUsize = AtomicUsize::new(0);

    struct Counted;

    impl Negotiated for Counted {
        fn renderers() -> Vec<Renderer<Self>> {
            BUILDS.fetch_add(1, Ordering::SeqCst);
            vec![Renderer::new("txt", |_: &Counted, _, _, _| None).with_media_types(["text/plain"])]
        }
    }

    /// Builds its renderers from another type's registry in the same cache.
    struct Composite;

    impl Negotiated for Composite {
        fn renderers() -> Vec<Renderer<Self>> {
            let plain = RegistryCache::global().get_or_build::<Plain>();
            plain
                .all()
                .iter()
                .map(|renderer| {
                    Renderer::new(renderer.format(), |_: &Composite, _, _, _| None)
                        .with_media_types(renderer.media_types().iter().map(|m| m.as_str()))
                        .with_priority(renderer.priority())
                })
                .collect()
        }
    }

    #[test]
    fn test_build_may_use_other_registries() {
        let registry = RegistryCache::global().get_or_build::<Composite>();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.all()[0].format(), "json");
        assert!(RegistryCache::global().get::<Plain>().is_some());
    }

    #[test]
    fn test_builds_once() {
        let cache = RegistryCache::new();
        assert!(cache.get::<Plain>().is_none());

        let first = cache.get_or_build::<Plain>();
        let second = cache.get_or_build::<Plain>();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.all()[0].format(), "json");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_process_overrides() {
        let cache = RegistryCache::with_priority_overrides(BTreeMap::from([
            ("html".to_string(), 9),
        ]));
        let registry = cache.get_or_build::<Plain>();
        assert_eq!(registry.all()[0].format(), "html");
    }

    #[test]
    fn test_type_overrides_win() {
        let cache = RegistryCache::with_priority_overrides(BTreeMap::from([
            ("html".to_string(), 9),
        ]));
        let registry = cache.get_or_build::<Overridden>();
        assert_eq!(registry.all()[0].format(), "txt");
        assert_eq!(registry.all()[1].priority(), 0);
    }

    #[test]
    fn test_single_flight_under_contention() {
        let cache = RegistryCache::new();
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.get_or_build::<Counted>()
                })
            })
            .collect();

        let registries: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(BUILDS.load(Ordering::SeqCst), 1);
        assert!(registries.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn test_clone_shares_state() {
        let cache = RegistryCache::new();
        let registry = cache.get_or_build::<Plain>();
        let other = cache.clone();
        assert!(Arc::ptr_eq(&registry, &other.get::<Plain>().unwrap()));
    }

    #[test]
    fn test_global() {
        let registry = RegistryCache::global().get_or_build::<Plain>();
        assert!(Arc::ptr_eq(
            &registry,
            &RegistryCache::global().get_or_build::<Plain>()
        ));
    }
}
