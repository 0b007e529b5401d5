//! Render application.

use crate::document::Document;
use crate::error::Result;
use crate::protocol::RenderUpdate;

/// Replace the content of every region whose identifier equals `update.id`.
///
/// Regions are looked up at call time. Returns the number of regions
/// replaced; an update matching nothing is `Ok(0)`.
pub fn apply<D: Document>(doc: &mut D, update: &RenderUpdate, region_attr: &str) -> Result<usize> {
    let regions = doc.find_by_attribute(region_attr, &update.id);
    for region in &regions {
        doc.replace_content(region, &update.render)?;
    }
    Ok(regions.len())
}
