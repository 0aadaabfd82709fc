//! The data model: calo hits, clusters, tracks, helices, detector gaps,
//! ordered hit lists, and shower peaks.

pub mod cluster;
pub mod fit;
pub mod gap;
pub mod helix;
pub mod hit;
pub mod ids;
pub mod ordered_hit_list;
pub mod shower_peak;
pub mod track;
pub mod vec3;

pub use cluster::Cluster;
pub use fit::{FitFailure, FitResult};
pub use gap::DetectorGap;
pub use helix::Helix;
pub use hit::{CaloHit, CellGeometry, HitType, Region};
pub use ids::{ClusterId, HitId, TrackId};
pub use ordered_hit_list::OrderedCaloHitList;
pub use shower_peak::{ShowerPeak, ShowerPeakList};
pub use track::{Track, TrackState};
pub use vec3::Vec3;
