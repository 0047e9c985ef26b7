pub mod sigma_clip;

pub use sigma_clip::{
    sigma_clip_combine, sigma_clip_stack, ClipCenter, CombineMethod, CombinedFrame,
    SigmaClipParams,
};
