//! Area selection: which field to filter on and which field to join by.

use crate::error::{ReportError, Result};
use crate::filter::Filter;
use crate::types::{AreaKind, AreaSelector};

/// Base dataset id field.
pub const ID_FIELD: &str = "id";

/// Related dataset fields.
pub const PARCEL_LOT_ID_RELATED_FIELD: &str = "kavelid";
pub const PARCEL_ID_RELATED_FIELD: &str = "terreinid";
pub const ISSUE_DATE_RELATED_FIELD: &str = "datumuitgifte";
pub const SURFACE_RELATED_FIELD: &str = "opp_geometrie";

impl AreaKind {
    /// Name field of this area kind in the base dataset.
    pub fn base_field(self) -> &'static str {
        match self {
            AreaKind::Region => "vvr_naam",
            AreaKind::Municipality => "naam",
            AreaKind::Parcel => "a_plannaam",
        }
    }

    /// Name field of this area kind in the related dataset.
    pub fn related_field(self) -> &'static str {
        match self {
            AreaKind::Region => "regionaam",
            AreaKind::Municipality => "gemeentenaam",
            AreaKind::Parcel => "terreinnaam",
        }
    }

    pub const ALL: [AreaKind; 3] = [AreaKind::Parcel, AreaKind::Municipality, AreaKind::Region];
}

/// The single area a report is scoped to.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedArea {
    pub kind: AreaKind,
    pub name: String,
    pub filter: Filter,
}

impl ResolvedArea {
    pub fn base_field(&self) -> &'static str {
        self.kind.base_field()
    }

    pub fn related_field(&self) -> &'static str {
        self.kind.related_field()
    }
}

pub fn resolve(selector: &AreaSelector) -> Result<ResolvedArea> {
    let given: Vec<(AreaKind, &str)> = [
        (AreaKind::Parcel, selector.parcel.as_deref()),
        (AreaKind::Municipality, selector.municipality.as_deref()),
        (AreaKind::Region, selector.region.as_deref()),
    ]
    .into_iter()
    .filter_map(|(kind, name)| name.map(|n| (kind, n)))
    .collect();

    match given.as_slice() {
        [] => Err(ReportError::invalid("No area given for report.")),
        [(kind, name)] => Ok(ResolvedArea {
            kind: *kind,
            name: name.to_string(),
            filter: Filter::eq(kind.base_field(), *name),
        }),
        _ => Err(ReportError::invalid("More than one area given for report.")),
    }
}
