//! Particle-flow cluster-refinement engine.
//!
//! Reconstructs a refined set of calorimeter clusters from a preliminary
//! clustering and a set of extrapolated tracks, by running a configured,
//! ordered sequence of merge/split/recluster/re-associate operators over
//! the shared mutable population held by [`manager::ClusterManager`].
//!
//! The crate is organised around a shared geometric/fitting toolkit
//! (`geometry`, `hit_properties`,
//! `fragment_geometry`, `fitting`, `compatibility`, `contact`), the data
//! model (`model`), the single mutator (`manager`), the operator
//! library (`merging`, `reclustering`, `photon`, `track_recovery`), and
//! the driver that composes them (`pipeline`).

pub mod compatibility;
pub mod contact;
pub mod error;
pub mod fitting;
pub mod fragment_geometry;
pub mod geometry;
pub mod hit_properties;
pub mod manager;
pub mod merging;
pub mod model;
pub mod photon;
pub mod pipeline;
pub mod plugins;
pub mod reclustering;
pub mod track_recovery;
