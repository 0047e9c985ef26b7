pub mod calibration;
pub mod centroid;
pub mod consts;
pub mod error;
pub mod frame;
pub mod io;
pub mod lightcurve;
pub mod noise;
pub mod photometry;
pub mod pipeline;
pub mod reduce;
pub mod stack;
pub mod stats;
