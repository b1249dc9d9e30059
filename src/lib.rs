#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

/// A concurrent sequence sorted by cached hash ranks.
///
/// This module provides `RankList`, the storage layer: binary-search
/// membership over a rank array, lock-free snapshot iteration, and
/// structural mutation serialized through a single lock.
pub mod rank_list;

/// An event-sourcing map built on the ranked list.
///
/// This module provides `WatchMap`, which layers map semantics, synchronous
/// change sinks, and lazy default-value materialization over a `RankList`
/// of entries.
pub mod watch_map;

pub use rank_list::RankList;
pub use rank_list::Ranked;
pub use rank_list::VacantElement;
pub use watch_map::DefaultHashBuilder;
pub use watch_map::Entry;
pub use watch_map::WatchMap;
