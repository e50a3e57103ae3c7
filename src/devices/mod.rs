//! Device protocol implementations

pub mod arnavi;
pub mod reportsys;

use crate::config::AppConfig;
use crate::core::protocol::DeviceProtocol;
use crate::error::{Error, Result};
use arnavi::ArnaviProtocol;
use reportsys::ReportSysProtocol;
use std::sync::Arc;

/// Create the protocol served on a listener, by name
pub fn create_protocol(name: &str, config: &AppConfig) -> Result<Arc<dyn DeviceProtocol>> {
    match name {
        "arnavi" => Ok(Arc::new(ArnaviProtocol::new())),
        "reportsys" => Ok(Arc::new(ReportSysProtocol::new(
            config.decoder.reportsys_time_offset_secs,
        )?)),
        _ => Err(Error::UnknownProtocol(name.to_string())),
    }
}
