//! `signalfx_dashboard`

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{Attributes, Resource};
use crate::client::{
    Dashboard, DashboardChart, DashboardFilters, DashboardSource, DashboardTime, DashboardVariable,
};
use crate::error::ProviderError;
use crate::provider::ProviderContext;
use crate::schema::{Attribute, Block, Diagnostic, NestedBlock, Schema};
use crate::validation::Checks;

/// Grid width of a dashboard.
pub const GRID_COLUMNS: i64 = 12;

const RESOLUTIONS: &[&str] = &["default", "low", "high", "highest"];

/// Dashboards with charts laid out on a 12 column grid.
#[derive(Debug, Clone, Copy, Default)]
pub struct DashboardResource;

fn chart_block() -> Block {
    Block::new()
        .with_attribute("chart_id", Attribute::required_string())
        .with_attribute("row", Attribute::optional_int64().with_description("Grid row, 0-based"))
        .with_attribute(
            "column",
            Attribute::optional_int64()
                .with_default(json!(0))
                .with_description("Grid column, 0-11"),
        )
        .with_attribute(
            "width",
            Attribute::optional_int64()
                .with_default(json!(GRID_COLUMNS))
                .with_description("Width in columns, 1-12"),
        )
        .with_attribute("height", Attribute::optional_int64().with_default(json!(1)))
}

fn variable_block() -> Block {
    Block::new()
        .with_attribute("property", Attribute::required_string())
        .with_attribute("alias", Attribute::required_string())
        .with_attribute("description", Attribute::optional_string())
        .with_attribute("values", Attribute::optional_string_set())
        .with_attribute("value_required", Attribute::optional_bool())
        .with_attribute("values_suggested", Attribute::optional_string_list())
        .with_attribute("restricted_suggestions", Attribute::optional_bool())
        .with_attribute("replace_only", Attribute::optional_bool())
        .with_attribute("apply_if_exist", Attribute::optional_bool())
}

fn filter_block() -> Block {
    Block::new()
        .with_attribute("property", Attribute::required_string())
        .with_attribute("values", Attribute::required_string_list())
        .with_attribute("negated", Attribute::optional_bool())
        .with_attribute("apply_if_exist", Attribute::optional_bool())
}

fn check_chart(checks: &mut Checks, index: usize, chart: &Attributes<'_>) {
    let path = |field: &str| format!("chart[{}].{}", index, field);
    let column = chart.int("column").unwrap_or(0);
    let width = chart.int("width").unwrap_or(GRID_COLUMNS);
    // Out-of-range values are reported by the range checks alone.
    let in_grid = (0..GRID_COLUMNS).contains(&column) && (1..=GRID_COLUMNS).contains(&width);

    checks
        .int_range(&path("row"), chart.int("row"), 0, i64::MAX)
        .int_range(&path("column"), chart.int("column"), 0, GRID_COLUMNS - 1)
        .int_range(&path("width"), chart.int("width"), 1, GRID_COLUMNS)
        .int_range(&path("height"), chart.int("height"), 1, i64::MAX)
        .ensure(!in_grid || column + width <= GRID_COLUMNS, || {
            Diagnostic::error(format!("Chart {} does not fit the grid", index))
                .with_detail(format!(
                    "column {} + width {} exceeds {} columns",
                    column, width, GRID_COLUMNS
                ))
                .with_attribute(path("width"))
        });
}

fn dashboard_body(attrs: &Attributes<'_>) -> Result<Dashboard, ProviderError> {
    let charts = attrs
        .blocks("chart")
        .iter()
        .enumerate()
        .map(|(i, c)| {
            Ok(DashboardChart {
                chart_id: c.required_string("chart_id")?,
                row: c.int("row").unwrap_or(i as i64),
                column: c.int("column").unwrap_or(0),
                width: c.int("width").unwrap_or(GRID_COLUMNS),
                height: c.int("height").unwrap_or(1),
            })
        })
        .collect::<Result<Vec<_>, ProviderError>>()?;

    let variables = attrs
        .blocks("variable")
        .iter()
        .map(|v| {
            Ok(DashboardVariable {
                property: v.required_string("property")?,
                alias: v.required_string("alias")?,
                description: v.string("description"),
                value: v.strings("values"),
                required: v.bool("value_required"),
                restricted: v.bool("restricted_suggestions"),
                preferred_suggestions: v.strings("values_suggested"),
                replace_only: v.bool("replace_only"),
                apply_if_exist: v.bool("apply_if_exist"),
            })
        })
        .collect::<Result<Vec<_>, ProviderError>>()?;

    let sources = attrs
        .blocks("filter")
        .iter()
        .map(|f| {
            Ok(DashboardSource {
                property: f.required_string("property")?,
                value: f.strings("values"),
                negated: f.bool("negated"),
                apply_if_exist: f.bool("apply_if_exist"),
            })
        })
        .collect::<Result<Vec<_>, ProviderError>>()?;

    let time = match (attrs.string("time_range"), attrs.int("start_time"), attrs.int("end_time")) {
        (Some(range), _, _) => Some(DashboardTime {
            start: Some(json!(range)),
            end: Some(json!("Now")),
        }),
        (None, None, None) => None,
        (None, start, end) => Some(DashboardTime {
            start: start.map(|s| json!(s)),
            end: end.map(|e| json!(e)),
        }),
    };

    let filters = (!variables.is_empty() || !sources.is_empty() || time.is_some()).then(|| {
        DashboardFilters {
            variables,
            sources,
            time,
        }
    });

    Ok(Dashboard {
        id: None,
        name: attrs.required_string("name")?,
        description: attrs.string("description"),
        group_id: Some(attrs.required_string("dashboard_group")?),
        charts,
        chart_density: attrs.string("charts_resolution").map(|r| r.to_uppercase()),
        filters,
    })
}

fn dashboard_state(ctx: &ProviderContext, dashboard: &Dashboard) -> Value {
    let id = dashboard.id.clone().unwrap_or_default();
    let filters = dashboard.filters.clone().unwrap_or_default();

    let (time_range, start_time, end_time) = match &filters.time {
        Some(DashboardTime {
            start: Some(Value::String(range)),
            ..
        }) => (Some(range.clone()), None, None),
        Some(time) => (
            None,
            time.start.as_ref().and_then(Value::as_i64),
            time.end.as_ref().and_then(Value::as_i64),
        ),
        None => (None, None, None),
    };

    let charts: Vec<Value> = dashboard
        .charts
        .iter()
        .map(|c| {
            json!({
                "chart_id": c.chart_id,
                "row": c.row,
                "column": c.column,
                "width": c.width,
                "height": c.height,
            })
        })
        .collect();

    let variables: Vec<Value> = filters
        .variables
        .iter()
        .map(|v| {
            json!({
                "property": v.property,
                "alias": v.alias,
                "description": v.description,
                "values": v.value,
                "value_required": v.required,
                "values_suggested": v.preferred_suggestions,
                "restricted_suggestions": v.restricted,
                "replace_only": v.replace_only,
                "apply_if_exist": v.apply_if_exist,
            })
        })
        .collect();

    let sources: Vec<Value> = filters
        .sources
        .iter()
        .map(|s| {
            json!({
                "property": s.property,
                "values": s.value,
                "negated": s.negated,
                "apply_if_exist": s.apply_if_exist,
            })
        })
        .collect();

    json!({
        "id": id,
        "url": ctx.app_link("dashboard", &id),
        "name": dashboard.name,
        "description": dashboard.description,
        "dashboard_group": dashboard.group_id,
        "charts_resolution": dashboard
            .chart_density
            .as_deref()
            .map(str::to_lowercase)
            .unwrap_or_else(|| "default".to_string()),
        "time_range": time_range,
        "start_time": start_time,
        "end_time": end_time,
        "chart": charts,
        "variable": variables,
        "filter": sources,
    })
}

#[async_trait]
impl Resource for DashboardResource {
    fn type_name(&self) -> &'static str {
        "signalfx_dashboard"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("A dashboard")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("url", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("description", Attribute::optional_string())
            .with_attribute(
                "dashboard_group",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Id of the owning dashboard group"),
            )
            .with_attribute(
                "charts_resolution",
                Attribute::optional_string()
                    .with_default(json!("default"))
                    .with_description("One of default, low, high, highest"),
            )
            .with_attribute(
                "time_range",
                Attribute::optional_string().with_description("Relative range such as -1h"),
            )
            .with_attribute(
                "start_time",
                Attribute::optional_int64().with_description("Absolute start, ms since epoch"),
            )
            .with_attribute(
                "end_time",
                Attribute::optional_int64().with_description("Absolute end, ms since epoch"),
            )
            .with_block("chart", NestedBlock::list(chart_block()))
            .with_block("variable", NestedBlock::list(variable_block()))
            .with_block("filter", NestedBlock::list(filter_block()))
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let attrs = Attributes::new(config);
        let mut checks = Checks::new();
        checks
            .non_empty("name", attrs.raw("name").and_then(Value::as_str))
            .one_of(
                "charts_resolution",
                attrs.raw("charts_resolution").and_then(Value::as_str),
                RESOLUTIONS,
            )
            .ensure(
                attrs.string("time_range").is_none()
                    || (attrs.int("start_time").is_none() && attrs.int("end_time").is_none()),
                || {
                    Diagnostic::error("time_range conflicts with start_time and end_time")
                        .with_attribute("time_range")
                },
            );
        if let (Some(start), Some(end)) = (attrs.int("start_time"), attrs.int("end_time")) {
            checks.ensure(start < end, || {
                Diagnostic::error("start_time must be before end_time").with_attribute("start_time")
            });
        }
        for (i, chart) in attrs.blocks("chart").iter().enumerate() {
            check_chart(&mut checks, i, chart);
        }
        checks.into_diagnostics()
    }

    async fn create(&self, ctx: &ProviderContext, planned: &Value) -> Result<Value, ProviderError> {
        let body = dashboard_body(&Attributes::new(planned))?;
        let dashboard = ctx.client.create_dashboard(&body).await?;
        Ok(dashboard_state(ctx, &dashboard))
    }

    async fn read(&self, ctx: &ProviderContext, state: &Value) -> Result<Value, ProviderError> {
        let id = Attributes::new(state).id()?;
        let dashboard = ctx.client.get_dashboard(&id).await?;
        Ok(dashboard_state(ctx, &dashboard))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        prior: &Value,
        planned: &Value,
    ) -> Result<Value, ProviderError> {
        let id = Attributes::new(prior).id()?;
        let body = dashboard_body(&Attributes::new(planned))?;
        let dashboard = ctx.client.update_dashboard(&id, &body).await?;
        Ok(dashboard_state(ctx, &dashboard))
    }

    async fn delete(&self, ctx: &ProviderContext, state: &Value) -> Result<(), ProviderError> {
        let id = Attributes::new(state).id()?;
        ctx.client.delete_dashboard(&id).await
    }
}
