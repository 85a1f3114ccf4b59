//! Tags of the word-processing vocabulary the engine cares about.

pub(crate) const T_TAG: &str = "w:t";
pub(crate) const R_TAG: &str = "w:r";
pub(crate) const P_TAG: &str = "w:p";
pub(crate) const TBL_TAG: &str = "w:tbl";
pub(crate) const TR_TAG: &str = "w:tr";
pub(crate) const TC_TAG: &str = "w:tc";
pub(crate) const RPR_TAG: &str = "w:rPr";
pub(crate) const ALTCHUNK_TAG: &str = "w:altChunk";
pub(crate) const DOCPR_TAG: &str = "wp:docPr";
pub(crate) const VSHAPE_TAG: &str = "v:shape";
