//! `signalfx_time_chart`, `signalfx_text_chart`, `signalfx_single_value_chart`
//!
//! The three kinds share `/v2/chart` and differ only in `options`.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::{Attributes, Resource};
use crate::client::Chart;
use crate::error::ProviderError;
use crate::provider::ProviderContext;
use crate::schema::{Attribute, Block, Diagnostic, NestedBlock, Schema};
use crate::validation::Checks;

/// Named chart colors, indexed by their palette position.
pub const CHART_PALETTE: &[&str] = &[
    "gray",
    "blue",
    "light_blue",
    "navy",
    "dark_orange",
    "orange",
    "dark_yellow",
    "magenta",
    "cerise",
    "pink",
    "violet",
    "purple",
    "gray_blue",
    "dark_green",
    "green",
    "aquamarine",
    "red",
    "yellow",
    "vivid_yellow",
    "light_green",
    "lime_green",
];

/// Palette index of a named color.
pub fn palette_index(name: &str) -> Option<usize> {
    CHART_PALETTE.iter().position(|c| *c == name)
}

/// Color name at a palette index.
pub fn palette_name(index: u64) -> Option<&'static str> {
    usize::try_from(index).ok().and_then(|i| CHART_PALETTE.get(i)).copied()
}

const PLOT_TYPES: &[&str] = &["LineChart", "AreaChart", "ColumnChart", "Histogram"];
const UNIT_PREFIXES: &[&str] = &["Metric", "Binary"];
const SECONDARY_VISUALIZATIONS: &[&str] = &["None", "Radial", "Linear", "Sparkline"];

/// Which chart a [`ChartResource`] manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    /// Time series line/area/column chart.
    TimeSeries,
    /// Markdown text.
    Text,
    /// A single big number.
    SingleValue,
}

impl ChartKind {
    /// The `options.type` value the API uses.
    pub fn api_type(self) -> &'static str {
        match self {
            Self::TimeSeries => "TimeSeriesChart",
            Self::Text => "Text",
            Self::SingleValue => "SingleValue",
        }
    }

    fn type_name(self) -> &'static str {
        match self {
            Self::TimeSeries => "signalfx_time_chart",
            Self::Text => "signalfx_text_chart",
            Self::SingleValue => "signalfx_single_value_chart",
        }
    }
}

/// A chart resource of one [`ChartKind`].
#[derive(Debug, Clone, Copy)]
pub struct ChartResource {
    kind: ChartKind,
}

impl ChartResource {
    /// A resource for `kind`.
    pub fn new(kind: ChartKind) -> Self {
        Self { kind }
    }

    fn kind_schema(&self, schema: Schema) -> Schema {
        match self.kind {
            ChartKind::Text => schema.with_attribute(
                "markdown",
                Attribute::required_string().with_description("Markdown shown in the chart"),
            ),
            ChartKind::TimeSeries => schema
                .with_attribute("program_text", Attribute::required_string())
                .with_attribute("plot_type", Attribute::optional_string().with_default(json!("LineChart")))
                .with_attribute(
                    "time_range",
                    Attribute::optional_int64().with_description("Relative range in seconds"),
                )
                .with_attribute("unit_prefix", Attribute::optional_string().with_default(json!("Metric")))
                .with_attribute("color_by", Attribute::optional_string().with_default(json!("Dimension")))
                .with_attribute("stacked", Attribute::optional_bool())
                .with_attribute("show_event_lines", Attribute::optional_bool())
                .with_block(
                    "viz_options",
                    NestedBlock::set(
                        Block::new()
                            .with_attribute("label", Attribute::required_string())
                            .with_attribute("color", Attribute::optional_string())
                            .with_attribute("display_name", Attribute::optional_string())
                            .with_attribute("value_unit", Attribute::optional_string()),
                    ),
                ),
            ChartKind::SingleValue => schema
                .with_attribute("program_text", Attribute::required_string())
                .with_attribute("color_by", Attribute::optional_string().with_default(json!("Dimension")))
                .with_attribute("max_precision", Attribute::optional_int64())
                .with_attribute("unit_prefix", Attribute::optional_string().with_default(json!("Metric")))
                .with_attribute(
                    "secondary_visualization",
                    Attribute::optional_string().with_default(json!("None")),
                )
                .with_attribute("show_spark_line", Attribute::optional_bool())
                .with_block(
                    "color_scale",
                    NestedBlock::set(
                        Block::new()
                            .with_attribute("gt", Attribute::optional_float64())
                            .with_attribute("gte", Attribute::optional_float64())
                            .with_attribute("lt", Attribute::optional_float64())
                            .with_attribute("lte", Attribute::optional_float64())
                            .with_attribute("color", Attribute::required_string()),
                    ),
                ),
        }
    }

    fn options(&self, attrs: &Attributes<'_>) -> Result<Map<String, Value>, ProviderError> {
        let mut options = Map::new();
        options.insert("type".to_string(), json!(self.kind.api_type()));
        match self.kind {
            ChartKind::Text => {
                options.insert("markdown".to_string(), json!(attrs.required_string("markdown")?));
            },
            ChartKind::TimeSeries => {
                let plot_type = attrs.string("plot_type").unwrap_or_else(|| "LineChart".to_string());
                options.insert("defaultPlotType".to_string(), json!(plot_type));
                options.insert("unitPrefix".to_string(), json!(attrs.string("unit_prefix").unwrap_or_else(|| "Metric".to_string())));
                options.insert("colorBy".to_string(), json!(attrs.string("color_by").unwrap_or_else(|| "Dimension".to_string())));
                options.insert("stacked".to_string(), json!(attrs.bool("stacked")));
                options.insert("showEventLines".to_string(), json!(attrs.bool("show_event_lines")));
                if let Some(seconds) = attrs.int("time_range") {
                    options.insert(
                        "time".to_string(),
                        json!({"type": "relative", "range": seconds * 1000}),
                    );
                }
                let labels = attrs
                    .blocks("viz_options")
                    .iter()
                    .map(|v| {
                        Ok(json!({
                            "label": v.required_string("label")?,
                            "displayName": v.string("display_name"),
                            "paletteIndex": color_index(v.string("color"))?,
                            "valueUnit": v.string("value_unit"),
                        }))
                    })
                    .collect::<Result<Vec<_>, ProviderError>>()?;
                options.insert("publishLabelOptions".to_string(), Value::Array(labels));
            },
            ChartKind::SingleValue => {
                options.insert("colorBy".to_string(), json!(attrs.string("color_by").unwrap_or_else(|| "Dimension".to_string())));
                options.insert("unitPrefix".to_string(), json!(attrs.string("unit_prefix").unwrap_or_else(|| "Metric".to_string())));
                options.insert(
                    "secondaryVisualization".to_string(),
                    json!(attrs.string("secondary_visualization").unwrap_or_else(|| "None".to_string())),
                );
                options.insert("showSparkLine".to_string(), json!(attrs.bool("show_spark_line")));
                if let Some(precision) = attrs.int("max_precision") {
                    options.insert("maximumPrecision".to_string(), json!(precision));
                }
                let scale = attrs
                    .blocks("color_scale")
                    .iter()
                    .map(|s| {
                        Ok(json!({
                            "gt": s.float("gt"),
                            "gte": s.float("gte"),
                            "lt": s.float("lt"),
                            "lte": s.float("lte"),
                            "paletteIndex": color_index(s.string("color"))?,
                        }))
                    })
                    .collect::<Result<Vec<_>, ProviderError>>()?;
                options.insert("colorScale2".to_string(), Value::Array(scale));
            },
        }
        Ok(options)
    }

    fn body(&self, attrs: &Attributes<'_>) -> Result<Chart, ProviderError> {
        Ok(Chart {
            id: None,
            name: attrs.required_string("name")?,
            description: attrs.string("description"),
            program_text: attrs.string("program_text").unwrap_or_default(),
            options: self.options(attrs)?,
        })
    }

    fn state(&self, ctx: &ProviderContext, chart: &Chart) -> Result<Value, ProviderError> {
        if let Some(kind) = chart.kind() {
            if kind != self.kind.api_type() {
                return Err(ProviderError::FailedPrecondition(format!(
                    "chart {} is a {}, not a {}",
                    chart.id.as_deref().unwrap_or_default(),
                    kind,
                    self.kind.api_type()
                )));
            }
        }

        let id = chart.id.clone().unwrap_or_default();
        let option = |key: &str| chart.options.get(key).cloned().unwrap_or(Value::Null);
        let mut state = json!({
            "id": id,
            "url": ctx.app_link("chart", &id),
            "name": chart.name,
            "description": chart.description,
        });
        let Value::Object(obj) = &mut state else {
            return Ok(state);
        };

        match self.kind {
            ChartKind::Text => {
                obj.insert("markdown".to_string(), option("markdown"));
            },
            ChartKind::TimeSeries => {
                obj.insert("program_text".to_string(), json!(chart.program_text));
                obj.insert("plot_type".to_string(), option("defaultPlotType"));
                obj.insert("unit_prefix".to_string(), option("unitPrefix"));
                obj.insert("color_by".to_string(), option("colorBy"));
                obj.insert("stacked".to_string(), json!(option("stacked").as_bool().unwrap_or(false)));
                obj.insert(
                    "show_event_lines".to_string(),
                    json!(option("showEventLines").as_bool().unwrap_or(false)),
                );
                let range = chart
                    .options
                    .get("time")
                    .and_then(|t| t.get("range"))
                    .and_then(Value::as_i64)
                    .map(|ms| ms / 1000);
                obj.insert("time_range".to_string(), json!(range));
                let viz: Vec<Value> = option("publishLabelOptions")
                    .as_array()
                    .map(Vec::as_slice)
                    .unwrap_or_default()
                    .iter()
                    .map(|l| {
                        json!({
                            "label": l.get("label"),
                            "display_name": l.get("displayName"),
                            "color": l.get("paletteIndex").and_then(Value::as_u64).and_then(palette_name),
                            "value_unit": l.get("valueUnit"),
                        })
                    })
                    .collect();
                obj.insert("viz_options".to_string(), Value::Array(viz));
            },
            ChartKind::SingleValue => {
                obj.insert("program_text".to_string(), json!(chart.program_text));
                obj.insert("color_by".to_string(), option("colorBy"));
                obj.insert("unit_prefix".to_string(), option("unitPrefix"));
                obj.insert("secondary_visualization".to_string(), option("secondaryVisualization"));
                obj.insert("max_precision".to_string(), option("maximumPrecision"));
                obj.insert(
                    "show_spark_line".to_string(),
                    json!(option("showSparkLine").as_bool().unwrap_or(false)),
                );
                let scale: Vec<Value> = option("colorScale2")
                    .as_array()
                    .map(Vec::as_slice)
                    .unwrap_or_default()
                    .iter()
                    .map(|s| {
                        json!({
                            "gt": s.get("gt"),
                            "gte": s.get("gte"),
                            "lt": s.get("lt"),
                            "lte": s.get("lte"),
                            "color": s.get("paletteIndex").and_then(Value::as_u64).and_then(palette_name),
                        })
                    })
                    .collect();
                obj.insert("color_scale".to_string(), Value::Array(scale));
            },
        }
        Ok(state)
    }
}

fn color_index(color: Option<String>) -> Result<Option<usize>, ProviderError> {
    color
        .map(|c| {
            palette_index(&c)
                .ok_or_else(|| ProviderError::Validation(format!("unknown chart color {:?}", c)))
        })
        .transpose()
}

fn check_colors(checks: &mut Checks, block: &str, attrs: &Attributes<'_>) {
    for (i, item) in attrs.blocks(block).iter().enumerate() {
        if let Some(color) = item.string("color") {
            checks.one_of(&format!("{}[{}].color", block, i), Some(color.as_str()), CHART_PALETTE);
        }
    }
}

#[async_trait]
impl Resource for ChartResource {
    fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    fn schema(&self) -> Schema {
        let base = Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("url", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("description", Attribute::optional_string());
        self.kind_schema(base)
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let attrs = Attributes::new(config);
        let text = |key: &str| attrs.raw(key).and_then(Value::as_str);
        let mut checks = Checks::new();
        checks.non_empty("name", text("name"));
        match self.kind {
            ChartKind::Text => {
                checks.non_empty("markdown", text("markdown"));
            },
            ChartKind::TimeSeries => {
                checks
                    .non_empty("program_text", text("program_text"))
                    .one_of("plot_type", text("plot_type"), PLOT_TYPES)
                    .one_of("unit_prefix", text("unit_prefix"), UNIT_PREFIXES)
                    .one_of("color_by", text("color_by"), &["Dimension", "Metric"])
                    .int_range("time_range", attrs.int("time_range"), 1, i64::MAX / 1000);
                check_colors(&mut checks, "viz_options", &attrs);
            },
            ChartKind::SingleValue => {
                checks
                    .non_empty("program_text", text("program_text"))
                    .one_of("color_by", text("color_by"), &["Dimension", "Metric", "Scale"])
                    .one_of("unit_prefix", text("unit_prefix"), UNIT_PREFIXES)
                    .one_of(
                        "secondary_visualization",
                        text("secondary_visualization"),
                        SECONDARY_VISUALIZATIONS,
                    )
                    .int_range("max_precision", attrs.int("max_precision"), 1, 16);
                check_colors(&mut checks, "color_scale", &attrs);
                checks.ensure(
                    attrs.blocks("color_scale").is_empty() || text("color_by") == Some("Scale"),
                    || {
                        Diagnostic::error("color_scale requires color_by = \"Scale\"")
                            .with_attribute("color_scale")
                    },
                );
            },
        }
        checks.into_diagnostics()
    }

    async fn create(&self, ctx: &ProviderContext, planned: &Value) -> Result<Value, ProviderError> {
        let body = self.body(&Attributes::new(planned))?;
        let chart = ctx.client.create_chart(&body).await?;
        self.state(ctx, &chart)
    }

    async fn read(&self, ctx: &ProviderContext, state: &Value) -> Result<Value, ProviderError> {
        let id = Attributes::new(state).id()?;
        let chart = ctx.client.get_chart(&id).await?;
        self.state(ctx, &chart)
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        prior: &Value,
        planned: &Value,
    ) -> Result<Value, ProviderError> {
        let id = Attributes::new(prior).id()?;
        let body = self.body(&Attributes::new(planned))?;
        let chart = ctx.client.update_chart(&id, &body).await?;
        self.state(ctx, &chart)
    }

    async fn delete(&self, ctx: &ProviderContext, state: &Value) -> Result<(), ProviderError> {
        let id = Attributes::new(state).id()?;
        ctx.client.delete_chart(&id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_lookup() {
        assert_eq!(palette_index("gray"), Some(0));
        assert_eq!(palette_index("lime_green"), Some(20));
        assert_eq!(palette_index("chartreuse"), None);
        assert_eq!(palette_name(14), Some("green"));
        assert_eq!(palette_name(99), None);
    }

    #[test]
    fn text_chart_options() {
        let resource = ChartResource::new(ChartKind::Text);
        let value = json!({"name": "Notes", "markdown": "# Runbook"});
        let chart = resource.body(&Attributes::new(&value)).unwrap();

        assert_eq!(chart.kind(), Some("Text"));
        assert_eq!(chart.options["markdown"], "# Runbook");
        assert!(chart.program_text.is_empty());
    }

    #[test]
    fn time_chart_options() {
        let resource = ChartResource::new(ChartKind::TimeSeries);
        let value = json!({
            "name": "CPU",
            "program_text": "data('cpu.utilization').publish(label='A')",
            "time_range": 3600,
            "viz_options": [{"label": "A", "color": "orange", "display_name": "CPU"}]
        });
        let chart = resource.body(&Attributes::new(&value)).unwrap();

        assert_eq!(chart.options["defaultPlotType"], "LineChart");
        assert_eq!(chart.options["time"]["range"], 3_600_000);
        assert_eq!(chart.options["publishLabelOptions"][0]["paletteIndex"], 5);
    }

    #[test]
    fn single_value_color_scale_needs_scale_coloring() {
        let resource = ChartResource::new(ChartKind::SingleValue);
        let config = json!({
            "name": "Errors",
            "program_text": "data('errors').publish()",
            "color_by": "Dimension",
            "color_scale": [{"gt": 10.0, "color": "red"}, {"lte": 10.0, "color": "neon"}]
        });

        let diagnostics = resource.validate(&config);
        let paths: Vec<_> = diagnostics.iter().filter_map(|d| d.attribute.as_deref()).collect();
        assert_eq!(paths, vec!["color_scale[1].color", "color_scale"]);
    }

    #[test]
    fn unknown_color_is_rejected_in_body() {
        let resource = ChartResource::new(ChartKind::SingleValue);
        let value = json!({
            "name": "Errors",
            "program_text": "A",
            "color_scale": [{"gt": 1.0, "color": "neon"}]
        });
        assert!(matches!(
            resource.body(&Attributes::new(&value)),
            Err(ProviderError::Validation(_))
        ));
    }
}
