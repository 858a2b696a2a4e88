//! Event data model and external seams for the Poseidon hypocenter locator.
//!
//! This crate holds the types shared by every search strategy:
//!
//! - [`Point3`] / [`SearchRegion`] — geometry of the search volume (km,
//!   z positive down).
//! - [`Station`] / [`Arrival`] — one phase reading at one station, with the
//!   per-evaluation scratch fields (predicted time, residual, weight) that
//!   the misfit evaluator mutates on every candidate.
//! - [`TravelTimeModel`] — the seam to the external travel-time grids. A
//!   lookup returning `None` excludes that arrival from the current
//!   evaluation only, never from the whole run.
//! - [`HomogeneousModel`] — a provided constant-velocity straight-ray
//!   implementation, used by the test suites and the demo CLI.
//! - [`CancelFlag`] — cooperative cancellation handle, checked once per
//!   sampler or octree iteration.
//!
//! # Quick start
//!
//! ```
//! use poseidon_event::{Arrival, HomogeneousModel, Point3, Station, TravelTimeModel};
//!
//! let sta = Station::new("ALPS", 10.0, 0.0, 0.0);
//! let model = HomogeneousModel::new(5.0, 5.0 / 1.73);
//! let tt = model.travel_time(&sta, "P", Point3::new(0.0, 0.0, 5.0)).unwrap();
//! let arrival = Arrival::new("ALPS", "P", 100.0 + tt, 0.05).unwrap();
//! assert!(arrival.is_usable());
//! ```

pub mod arrival;
pub mod cancel;
pub mod error;
pub mod geometry;
pub mod travel_time;

pub use arrival::{Arrival, Station};
pub use cancel::CancelFlag;
pub use error::EventError;
pub use geometry::{Point3, SearchRegion};
pub use travel_time::{HomogeneousModel, TravelTimeModel};
