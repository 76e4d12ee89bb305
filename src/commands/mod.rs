pub mod serve;

pub use serve::{master_server, region_server, MasterParams, RegionParams};
