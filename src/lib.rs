#![forbid(unsafe_code)]

pub mod ambient;
pub mod composite;
pub mod error;
pub mod export;
pub mod model;
pub mod plan;
pub mod preview;
pub mod raster;
pub mod share;
pub mod store;
pub mod template;
pub mod view3d;

pub use error::{KosmaError, KosmaResult};
pub use model::{Card, CardStyle, Platform, SocialLink};
pub use plan::{BackVariant, FacePlan, PlanOptions, compile_face};
pub use raster::{FaceRasterizer, FrameRgba};
pub use share::{
    ShareSnapshot, ViewerRequest, decode_snapshot, encode_snapshot, new_share_id, viewer_url,
};
pub use template::{CardLayout, FaceSide, resolve_layout};
