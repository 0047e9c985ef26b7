pub mod discover;
pub mod fits;
pub mod lightcurve;
pub mod preview;
