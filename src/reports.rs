//! Report orchestration.
//!
//! `run_report` validates the request, resolves the area, queries the base
//! (and for issue reports the related) dataset, folds rows into buckets and
//! serializes the result. Any failure ends in an error envelope.

use std::collections::BTreeSet;
use std::fmt;

use log::{debug, error, info};

use crate::aggregate::{self, Aggregation};
use crate::area::{
    self, ResolvedArea, ID_FIELD, ISSUE_DATE_RELATED_FIELD, PARCEL_ID_RELATED_FIELD,
    PARCEL_LOT_ID_RELATED_FIELD, SURFACE_RELATED_FIELD,
};
use crate::buckets::{
    field_bucket, issue_bucket, BucketSpace, AREA_FIELD, MONTH_FIELD, SURFACE_FIELD,
};
use crate::config::ReportConfig;
use crate::error::{ReportError, Result};
use crate::filter::Filter;
use crate::output::Envelope;
use crate::schema;
use crate::store::{FeatureStore, Query};
use crate::types::{
    AreaKind, AttributeDescriptor, AttributeType, DateGranularity, DateRange, FeatureCollection,
    FeatureRecord, ReportKind, ReportRequest, Value,
};

const INDIVIDUAL_HANDLE: &str = "individueel-rapport";
const AGGREGATE_HANDLE: &str = "aggregatie-rapport";
const ISSUE_HANDLE: &str = "uitgifte-rapport";
const ISSUE_RELATED_HANDLE: &str = "uitgifte-rapport-related";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    Validating,
    ResolvingArea,
    QueryingBase,
    QueryingRelated,
    Aggregating,
    DerivingSchema,
    Serializing,
    Done,
    Error,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Validating => "validating",
            Stage::ResolvingArea => "resolving area",
            Stage::QueryingBase => "querying base dataset",
            Stage::QueryingRelated => "querying related dataset",
            Stage::Aggregating => "aggregating",
            Stage::DerivingSchema => "deriving schema",
            Stage::Serializing => "serializing",
            Stage::Done => "done",
            Stage::Error => "error",
        };
        f.write_str(s)
    }
}

/// Tracks where a report run is, for logging and error context.
#[derive(Debug)]
struct Progress {
    stage: Stage,
}

impl Progress {
    fn enter(&mut self, next: Stage) {
        debug!("report stage: {} -> {}", self.stage, next);
        self.stage = next;
    }
}

/// Report shape of a validated request, with what only that shape needs.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Shape {
    Individual,
    Aggregated,
    Issue(DateRange),
}

impl Shape {
    fn kind(self) -> ReportKind {
        match self {
            Shape::Individual => ReportKind::Individual,
            Shape::Aggregated => ReportKind::Aggregated,
            Shape::Issue(_) => ReportKind::Issue,
        }
    }
}

/// A request that passed validation.
struct Plan<'r> {
    dataset: &'r str,
    shape: Shape,
    level: Option<AreaKind>,
    granularity: DateGranularity,
    /// Requested attributes, first occurrence kept
    attr_names: Vec<String>,
}

/// What a report shape hands to schema derivation and serialization.
struct ReportTable {
    descriptors: Vec<AttributeDescriptor>,
    projection: Vec<String>,
    rows: FeatureCollection,
    warnings: Vec<String>,
}

impl ReportTable {
    fn from_aggregation(
        descriptors: Vec<AttributeDescriptor>,
        projection: Vec<String>,
        aggregation: Aggregation,
    ) -> Self {
        let warnings = aggregation.warnings();
        Self {
            descriptors,
            projection,
            rows: aggregation.rows,
            warnings,
        }
    }
}

/// Run one report. Never fails: errors come back as an unsuccessful
/// envelope carrying the error message.
pub fn run_report<S>(store: &S, request: &ReportRequest, config: &ReportConfig) -> Envelope
where
    S: FeatureStore + ?Sized,
{
    let mut progress = Progress {
        stage: Stage::Validating,
    };
    match execute(store, request, config, &mut progress) {
        Ok(envelope) => {
            progress.enter(Stage::Done);
            envelope
        }
        Err(e) => {
            error!("Error while generating report data ({}): {}", progress.stage, e);
            progress.enter(Stage::Error);
            Envelope::failure(e.to_string())
        }
    }
}

fn execute<S>(
    store: &S,
    request: &ReportRequest,
    config: &ReportConfig,
    progress: &mut Progress,
) -> Result<Envelope>
where
    S: FeatureStore + ?Sized,
{
    let plan = validate(request)?;
    let kind = plan.shape.kind();

    progress.enter(Stage::ResolvingArea);
    let area = area::resolve(&request.area)?;
    let level = plan.level.unwrap_or(area.kind);
    debug!(
        "{:?} report on {} by {}: {}",
        kind, plan.dataset, level, area.filter
    );

    let table = match plan.shape {
        Shape::Individual => individual(store, &plan, &area, config, progress)?,
        Shape::Aggregated => aggregated(store, &plan, &area, level, config, progress)?,
        Shape::Issue(range) => issue(store, &plan, range, &area, level, config, progress)?,
    };

    progress.enter(Stage::DerivingSchema);
    let grid = schema::derive(
        kind,
        &table.descriptors,
        &table.projection,
        table.rows.first(),
        config,
    );

    progress.enter(Stage::Serializing);
    info!(
        "{:?} report for {} '{}': {} rows, {} warnings",
        kind,
        area.kind,
        area.name,
        table.rows.len(),
        table.warnings.len()
    );
    Ok(Envelope::success(
        grid,
        &table.descriptors,
        &table.rows,
        &config.success_message,
        table.warnings,
    ))
}

fn validate(request: &ReportRequest) -> Result<Plan<'_>> {
    let dataset = request
        .dataset
        .as_deref()
        .ok_or_else(|| ReportError::invalid("Invalid parameters."))?;
    if !request.authorized {
        return Err(ReportError::Unauthorized);
    }
    let kind = request
        .kind
        .ok_or_else(|| ReportError::invalid("Report type is required."))?;
    let shape = match kind {
        ReportKind::Issue => match request.range {
            None => {
                return Err(ReportError::invalid(
                    "From date and to date are required for the issue report.",
                ))
            }
            Some(range) if range.from >= range.to => {
                return Err(ReportError::invalid("From date must be before to date."))
            }
            Some(range) => Shape::Issue(range),
        },
        ReportKind::Individual | ReportKind::Aggregated => {
            if request.attr_names.is_empty() {
                return Err(ReportError::invalid(
                    "Attribute names are required for this report.",
                ));
            }
            if kind == ReportKind::Individual {
                Shape::Individual
            } else {
                Shape::Aggregated
            }
        }
    };
    let mut attr_names: Vec<String> = Vec::with_capacity(request.attr_names.len());
    for name in &request.attr_names {
        if !attr_names.contains(name) {
            attr_names.push(name.clone());
        }
    }
    Ok(Plan {
        dataset,
        shape,
        level: request.level,
        granularity: request.granularity,
        attr_names,
    })
}

/// Run `query` on a handle that is released before this returns.
fn fetch<S>(store: &S, query: &Query) -> Result<FeatureCollection>
where
    S: FeatureStore + ?Sized,
{
    let handle = store.open(&query.dataset)?;
    let rows = handle.query(query)?;
    debug!("{} returned {} rows", query.handle, rows.len());
    Ok(rows)
}

fn check_attributes(schema: &[AttributeDescriptor], names: &[String]) -> Result<()> {
    let missing: Vec<&str> = names
        .iter()
        .filter(|n| !schema.iter().any(|a| &a.name == *n))
        .map(String::as_str)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ReportError::SchemaMismatch(format!(
            "unknown attributes: {}",
            missing.join(", ")
        )))
    }
}

/// Area names of `level` among `rows`, sorted and distinct.
fn area_names<'r>(rows: &'r [FeatureRecord], level: AreaKind) -> BTreeSet<&'r str> {
    rows.iter()
        .filter_map(|r| r.get(level.base_field()).and_then(Value::as_str))
        .collect()
}

fn individual<S>(
    store: &S,
    plan: &Plan<'_>,
    area: &ResolvedArea,
    config: &ReportConfig,
    progress: &mut Progress,
) -> Result<ReportTable>
where
    S: FeatureStore + ?Sized,
{
    progress.enter(Stage::QueryingBase);
    let descriptors = store.schema(plan.dataset)?;
    check_attributes(&descriptors, &plan.attr_names)?;
    let query = Query::new(plan.dataset, INDIVIDUAL_HANDLE)
        .fields(plan.attr_names.iter().cloned())
        .filter(area.filter.clone())
        .max_rows(config.max_rows);
    let rows = fetch(store, &query)?;

    progress.enter(Stage::Aggregating);
    Ok(ReportTable {
        descriptors,
        projection: plan.attr_names.to_vec(),
        rows,
        warnings: Vec::new(),
    })
}

fn aggregated<S>(
    store: &S,
    plan: &Plan<'_>,
    area: &ResolvedArea,
    level: AreaKind,
    config: &ReportConfig,
    progress: &mut Progress,
) -> Result<ReportTable>
where
    S: FeatureStore + ?Sized,
{
    progress.enter(Stage::QueryingBase);
    let schema = store.schema(plan.dataset)?;
    check_attributes(&schema, &plan.attr_names)?;
    if let Some(text) = schema
        .iter()
        .find(|a| plan.attr_names.contains(&a.name) && a.kind != AttributeType::Double)
    {
        return Err(ReportError::SchemaMismatch(format!(
            "attribute '{}' is not numeric and cannot be summed",
            text.name
        )));
    }

    let mut fields = plan.attr_names.to_vec();
    for kind in AreaKind::ALL {
        let f = kind.base_field().to_string();
        if !fields.contains(&f) {
            fields.push(f);
        }
    }
    let query = Query::new(plan.dataset, AGGREGATE_HANDLE)
        .fields(fields)
        .filter(area.filter.clone())
        .max_rows(config.max_rows);
    let rows = fetch(store, &query)?;

    progress.enter(Stage::Aggregating);
    let names = area_names(&rows, level);
    let space = BucketSpace::by_area(names.iter().copied(), |_, name| {
        field_bucket(name, &plan.attr_names)
    });
    let aggregation = aggregate::by_fields(
        space,
        &rows,
        level.base_field(),
        &plan.attr_names,
        config.strict_integrity,
    )?;

    let mut descriptors =
        vec![AttributeDescriptor::new(AREA_FIELD, AttributeType::String).with_alias("gebiedsnaam")];
    descriptors.extend(
        schema
            .into_iter()
            .filter(|a| plan.attr_names.contains(&a.name)),
    );
    Ok(ReportTable::from_aggregation(
        descriptors,
        plan.attr_names.to_vec(),
        aggregation,
    ))
}

/// Descriptors of the issue report's aggregate rows.
fn issue_descriptors() -> Vec<AttributeDescriptor> {
    vec![
        AttributeDescriptor::new(MONTH_FIELD, AttributeType::Date)
            .with_alias(MONTH_FIELD)
            .with_id(1),
        AttributeDescriptor::new(SURFACE_FIELD, AttributeType::Double)
            .with_alias(SURFACE_FIELD)
            .with_id(2),
        AttributeDescriptor::new(AREA_FIELD, AttributeType::String)
            .with_alias("gebiedsnaam")
            .with_id(3),
    ]
}

fn issue<S>(
    store: &S,
    plan: &Plan<'_>,
    range: DateRange,
    area: &ResolvedArea,
    level: AreaKind,
    config: &ReportConfig,
    progress: &mut Progress,
) -> Result<ReportTable>
where
    S: FeatureStore + ?Sized,
{
    let related = store.related_dataset(plan.dataset).ok_or_else(|| {
        ReportError::invalid(format!("Dataset '{}' has no related dataset.", plan.dataset))
    })?;

    progress.enter(Stage::QueryingBase);
    let query = Query::new(plan.dataset, ISSUE_HANDLE)
        .fields([
            ID_FIELD,
            AreaKind::Parcel.base_field(),
            AreaKind::Municipality.base_field(),
            AreaKind::Region.base_field(),
        ])
        .filter(area.filter.clone())
        .max_rows(config.max_rows);
    let base_rows = fetch(store, &query)?;
    let ids: Vec<Value> = base_rows
        .iter()
        .filter_map(|r| r.get(ID_FIELD))
        .filter(|v| !v.is_null())
        .cloned()
        .collect();
    let names = area_names(&base_rows, level);

    progress.enter(Stage::QueryingRelated);
    let related_rows = if ids.is_empty() {
        debug!("no base rows for {}, skipping related query", area.filter);
        Vec::new()
    } else {
        let query = Query::new(&related, ISSUE_RELATED_HANDLE)
            .fields([
                PARCEL_LOT_ID_RELATED_FIELD,
                SURFACE_RELATED_FIELD,
                ISSUE_DATE_RELATED_FIELD,
                AreaKind::Parcel.related_field(),
                AreaKind::Region.related_field(),
                AreaKind::Municipality.related_field(),
            ])
            .filter(
                Filter::is_in(PARCEL_ID_RELATED_FIELD, ids).and(Filter::during(
                    ISSUE_DATE_RELATED_FIELD,
                    range.from,
                    range.to,
                )),
            )
            .max_rows(config.max_rows);
        fetch(store, &query)?
    };

    progress.enter(Stage::Aggregating);
    let strict = config.strict_integrity;
    let (aggregation, projection) = match plan.granularity {
        DateGranularity::Month => {
            let space = BucketSpace::by_area_and_month(names.iter().copied(), &range, |k, a, m| {
                issue_bucket(k, a, Some(m))
            });
            let aggregation = aggregate::by_area_and_month(
                space,
                &related_rows,
                level.related_field(),
                ISSUE_DATE_RELATED_FIELD,
                SURFACE_RELATED_FIELD,
                strict,
            )?;
            (aggregation, vec![MONTH_FIELD, SURFACE_FIELD, AREA_FIELD])
        }
        DateGranularity::None => {
            let space =
                BucketSpace::by_area(names.iter().copied(), |k, a| issue_bucket(k, a, None));
            let aggregation = aggregate::by_area(
                space,
                &related_rows,
                level.related_field(),
                SURFACE_RELATED_FIELD,
                strict,
            )?;
            (aggregation, vec![SURFACE_FIELD, AREA_FIELD])
        }
    };

    Ok(ReportTable::from_aggregation(
        issue_descriptors(),
        projection.into_iter().map(String::from).collect(),
        aggregation,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AreaSelector;
    use chrono::NaiveDate;

    #[test]
    fn validation_order_and_messages() {
        let mut req = ReportRequest::new("base", ReportKind::Issue, AreaSelector::parcel("T1"));
        req.dataset = None;
        assert_eq!(validate(&req).err().unwrap().to_string(), "Invalid parameters.");

        let mut req = ReportRequest::new("base", ReportKind::Issue, AreaSelector::parcel("T1"));
        req.authorized = false;
        assert!(matches!(validate(&req), Err(ReportError::Unauthorized)));

        let mut req = ReportRequest::new("base", ReportKind::Issue, AreaSelector::parcel("T1"));
        req.kind = None;
        assert_eq!(
            validate(&req).err().unwrap().to_string(),
            "Report type is required."
        );

        let req = ReportRequest::new("base", ReportKind::Issue, AreaSelector::parcel("T1"));
        assert!(matches!(validate(&req), Err(ReportError::InvalidRequest(_))));

        let d = NaiveDate::from_ymd_opt(2023, 3, 1).unwrap();
        let req = req.with_range(d, d);
        assert!(matches!(validate(&req), Err(ReportError::InvalidRequest(_))));

        let req = ReportRequest::new("base", ReportKind::Aggregated, AreaSelector::parcel("T1"));
        assert!(matches!(validate(&req), Err(ReportError::InvalidRequest(_))));
        assert!(validate(&req.with_attr_names(["opp"])).is_ok());
    }

    #[test]
    fn validated_plan_carries_range_and_distinct_attributes() {
        let from = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2023, 3, 1).unwrap();
        let req = ReportRequest::new("base", ReportKind::Issue, AreaSelector::parcel("T1"))
            .with_range(from, to);
        let plan = validate(&req).unwrap();
        assert_eq!(plan.shape, Shape::Issue(DateRange::new(from, to)));
        assert_eq!(plan.shape.kind(), ReportKind::Issue);

        let req = ReportRequest::new("base", ReportKind::Aggregated, AreaSelector::parcel("T1"))
            .with_attr_names(["opp", "kavels", "opp"]);
        let plan = validate(&req).unwrap();
        assert_eq!(plan.shape, Shape::Aggregated);
        assert_eq!(plan.attr_names, vec!["opp".to_string(), "kavels".to_string()]);
    }

    #[test]
    fn attribute_check_lists_every_missing_name() {
        let schema = vec![AttributeDescriptor::new("naam", AttributeType::String)];
        let err = check_attributes(&schema, &["naam".into(), "x".into(), "y".into()]).unwrap_err();
        assert_eq!(err.to_string(), "Schema mismatch: unknown attributes: x, y");
    }

    #[test]
    fn stage_names_read_as_sentences() {
        assert_eq!(Stage::QueryingRelated.to_string(), "querying related dataset");
    }
}
