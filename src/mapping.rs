//! Output mappings: how a pattern's value turns into something useful.
//!
//! A pattern keeps at most one [`Mapping`] per [`MappingKind`]. The
//! registry itself is an ordinary map; the pattern stores it in a
//! copy-on-write cell so a live edit can swap a mapping in while a clock
//! thread keeps sampling the previous snapshot.

use parking_lot::Mutex;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::color::Color;
use crate::error::{CallbackError, LoomError, Result};
use crate::pattern::Pattern;

/// A user action fired by a pattern.
pub type Callback = Arc<dyn Fn() -> std::result::Result<(), CallbackError> + Send + Sync>;

/// An arbitrary value picked by an object mapping.
pub type Object = Arc<dyn Any + Send + Sync>;

/// Wrap an infallible closure as a [`Callback`].
pub fn callback<F>(f: F) -> Callback
where
    F: Fn() + Send + Sync + 'static,
{
    Arc::new(move || {
        f();
        Ok(())
    })
}

/// Wrap a fallible closure as a [`Callback`].
pub fn try_callback<F>(f: F) -> Callback
where
    F: Fn() -> std::result::Result<(), CallbackError> + Send + Sync + 'static,
{
    Arc::new(f)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MappingKind {
    Integer,
    Color,
    ColorBlend,
    Object,
    Callable,
    StatefulCallable,
    OscMessage,
    OscBundle,
}

impl MappingKind {
    /// Kinds the loom drives on every tick rather than waiting to be asked.
    pub fn is_external(self) -> bool {
        matches!(self, MappingKind::Callable | MappingKind::StatefulCallable)
    }
}

#[derive(Clone)]
pub enum Mapping {
    /// `lo + trunc((hi - lo) * v)`.
    Integer { lo: i64, hi: i64 },
    Color(Vec<Color>),
    ColorBlend(Vec<Color>),
    Object(Vec<Object>),
    Callable(Vec<Callback>),
    StatefulCallable(Arc<OnChange>),
    /// A one-argument message whose argument comes from the pattern's
    /// `source` mapping.
    OscMessage { address: String, source: MappingKind },
    /// The OSC messages of several patterns sent together.
    OscBundle(Vec<Pattern>),
}

impl Mapping {
    pub fn kind(&self) -> MappingKind {
        match self {
            Mapping::Integer { .. } => MappingKind::Integer,
            Mapping::Color(_) => MappingKind::Color,
            Mapping::ColorBlend(_) => MappingKind::ColorBlend,
            Mapping::Object(_) => MappingKind::Object,
            Mapping::Callable(_) => MappingKind::Callable,
            Mapping::StatefulCallable(_) => MappingKind::StatefulCallable,
            Mapping::OscMessage { .. } => MappingKind::OscMessage,
            Mapping::OscBundle(_) => MappingKind::OscBundle,
        }
    }

    /// Reject configurations that could never produce a value.
    pub fn validate(&self) -> Result<()> {
        let empty = match self {
            Mapping::Integer { .. } => false,
            Mapping::Color(list) | Mapping::ColorBlend(list) => list.is_empty(),
            Mapping::Object(list) => list.is_empty(),
            Mapping::Callable(list) => list.is_empty(),
            Mapping::StatefulCallable(on_change) => on_change.is_empty(),
            Mapping::OscMessage { source, .. } => {
                return match source {
                    MappingKind::Integer | MappingKind::Color | MappingKind::ColorBlend => Ok(()),
                    other => Err(LoomError::composition(format!(
                        "an OSC message argument cannot come from a {:?} mapping",
                        other
                    ))),
                };
            }
            Mapping::OscBundle(patterns) => {
                return if patterns.iter().any(|p| p.has_mapping(MappingKind::OscMessage)) {
                    Ok(())
                } else {
                    Err(LoomError::composition(
                        "none of the bundled patterns has an OSC message mapping",
                    ))
                };
            }
        };
        if empty {
            Err(LoomError::composition(format!(
                "{:?} mapping needs at least one entry",
                self.kind()
            )))
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for Mapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mapping::Integer { lo, hi } => write!(f, "Integer({}..{})", lo, hi),
            Mapping::Color(list) => write!(f, "Color({:?})", list),
            Mapping::ColorBlend(list) => write!(f, "ColorBlend({:?})", list),
            Mapping::Object(list) => write!(f, "Object(len = {})", list.len()),
            Mapping::Callable(list) => write!(f, "Callable(len = {})", list.len()),
            Mapping::StatefulCallable(on_change) => {
                write!(f, "StatefulCallable(len = {})", on_change.len())
            }
            Mapping::OscMessage { address, source } => {
                write!(f, "OscMessage({}, {:?})", address, source)
            }
            Mapping::OscBundle(patterns) => write!(f, "OscBundle(len = {})", patterns.len()),
        }
    }
}

/// Index of the entry a value selects from a list of `len`.
pub fn pick_index(v: f64, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let last = len - 1;
    let scaled = (v.clamp(0.0, 1.0) * last as f64).trunc() as usize;
    scaled.min(last)
}

/// Pick from `list` by value, `None` when empty.
pub fn pick<T>(list: &[T], v: f64) -> Option<&T> {
    list.get(pick_index(v, list.len()))
}

pub fn integer_in_range(lo: i64, hi: i64, v: f64) -> i64 {
    lo + ((hi - lo) as f64 * v).trunc() as i64
}

/// Fires the picked callback only when the picked index differs from the
/// previous dispatch.
///
/// Like every edge-style state in the crate this expects one driver
/// dispatching in chronological order.
pub struct OnChange {
    callbacks: Vec<Callback>,
    last: Mutex<Option<usize>>,
}

impl OnChange {
    pub fn new(callbacks: Vec<Callback>) -> Self {
        OnChange {
            callbacks,
            last: Mutex::new(None),
        }
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// The callback `v` currently selects.
    pub fn current(&self, v: f64) -> Option<Callback> {
        pick(&self.callbacks, v).cloned()
    }

    /// Fire the selected callback if the selection changed. Returns whether
    /// anything fired.
    pub fn dispatch(&self, v: f64) -> std::result::Result<bool, CallbackError> {
        let index = pick_index(v, self.callbacks.len());
        let changed = {
            let mut last = self.last.lock();
            let changed = *last != Some(index);
            *last = Some(index);
            changed
        };
        match self.callbacks.get(index) {
            Some(cb) if changed => cb().map(|_| true),
            _ => Ok(false),
        }
    }
}

/// One mapping per kind.
#[derive(Clone, Default)]
pub struct MappingRegistry {
    entries: BTreeMap<MappingKind, Mapping>,
}

impl MappingRegistry {
    pub fn new() -> Self {
        MappingRegistry::default()
    }

    /// Store `mapping`, returning the one it replaces.
    pub fn insert(&mut self, mapping: Mapping) -> Option<Mapping> {
        self.entries.insert(mapping.kind(), mapping)
    }

    pub fn get(&self, kind: MappingKind) -> Option<&Mapping> {
        self.entries.get(&kind)
    }

    pub fn require(&self, kind: MappingKind) -> Result<&Mapping> {
        self.get(kind).ok_or(LoomError::MissingMapping(kind))
    }

    pub fn contains(&self, kind: MappingKind) -> bool {
        self.entries.contains_key(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = MappingKind> + '_ {
        self.entries.keys().copied()
    }

    pub fn has_external(&self) -> bool {
        self.kinds().any(MappingKind::is_external)
    }
}

impl std::fmt::Debug for MappingRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, Callback) {
        let count = Arc::new(AtomicUsize::new(0));
        let handle = Arc::clone(&count);
        (
            count,
            callback(move || {
                handle.fetch_add(1, Ordering::SeqCst);
            }),
        )
    }

    #[test]
    fn test_pick_index() {
        assert_eq!(pick_index(0.0, 4), 0);
        assert_eq!(pick_index(0.5, 4), 1);
        assert_eq!(pick_index(1.0, 4), 3);
        assert_eq!(pick_index(1.5, 4), 3);
        assert_eq!(pick_index(0.7, 1), 0);
        for k in 1..=100 {
            assert_eq!(pick_index(k as f64 / 100.0, 100), k - 1);
        }
    }

    #[test]
    fn test_integer_in_range() {
        assert_eq!(integer_in_range(0, 10, 0.55), 5);
        assert_eq!(integer_in_range(-4, 4, 0.0), -4);
        assert_eq!(integer_in_range(-4, 4, 1.0), 4);
    }

    #[test]
    fn test_on_change_fires_on_new_index_only() {
        let (low_count, low) = counter();
        let (high_count, high) = counter();
        let on_change = OnChange::new(vec![low, high]);

        assert!(on_change.dispatch(0.0).unwrap());
        assert!(!on_change.dispatch(0.2).unwrap());
        assert!(on_change.dispatch(1.0).unwrap());
        assert!(!on_change.dispatch(1.0).unwrap());
        assert!(on_change.dispatch(0.0).unwrap());

        assert_eq!(low_count.load(Ordering::SeqCst), 2);
        assert_eq!(high_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_on_change_reports_callback_errors() {
        let failing = try_callback(|| Err("boom".into()));
        let on_change = OnChange::new(vec![failing]);
        assert!(on_change.dispatch(0.0).is_err());
    }

    #[test]
    fn test_registry_replaces_by_kind() {
        let mut registry = MappingRegistry::new();
        assert!(registry.insert(Mapping::Integer { lo: 0, hi: 10 }).is_none());
        let previous = registry.insert(Mapping::Integer { lo: 0, hi: 20 });
        assert!(matches!(previous, Some(Mapping::Integer { hi: 10, .. })));
        assert!(matches!(
            registry.require(MappingKind::Color),
            Err(LoomError::MissingMapping(MappingKind::Color))
        ));
        assert!(!registry.has_external());

        let (_, cb) = counter();
        registry.insert(Mapping::Callable(vec![cb]));
        assert!(registry.has_external());
    }

    #[test]
    fn test_validate_rejects_empty_lists_and_bad_sources() {
        assert!(Mapping::Color(vec![]).validate().is_err());
        assert!(Mapping::Callable(vec![]).validate().is_err());
        assert!(Mapping::Color(vec![Color::RED]).validate().is_ok());
        let bad = Mapping::OscMessage {
            address: "/x".into(),
            source: MappingKind::Object,
        };
        assert!(matches!(bad.validate(), Err(LoomError::InvalidComposition(_))));
        assert!(Mapping::OscBundle(vec![]).validate().is_err());
    }
}
