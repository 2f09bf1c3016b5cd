//! `listscrub-recon`: suppression registry builder and outreach list cleaner.
//!
//! Pure engine crate: storage and the disposition database are reached through
//! the [`ObjectStore`] and [`DispositionSource`] seams. No CLI dependencies.

pub mod cleaner;
pub mod config;
pub mod disposition;
pub mod error;
pub mod locator;
pub mod lookup;
pub mod model;
pub mod normalize;
pub mod phone;
pub mod pipeline;
pub mod registry;
pub mod store;
pub mod tagging;

pub use cleaner::{clean, CandidateList, CandidateRecord, CleanOutcome, CleanReport};
pub use config::EngineConfig;
pub use disposition::{DispositionSets, DispositionSource, SqliteDispositionSource};
pub use error::{ScrubError, StorageError, ToolFailure};
pub use locator::{LocatedFile, SourceLocator};
pub use model::{ChannelKind, ChannelOutput, InclusionPolicy, RunClock, Section};
pub use normalize::{normalizer_for, NormalizeContext, Normalizer};
pub use registry::{BuildReport, RegistryBuilder, SuppressionRegistry};
pub use store::{Entry, ListPage, LocalStore, ObjectStore};
