//! `signalfx_dimension_values` data source.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{Attributes, DataSource};
use crate::error::ProviderError;
use crate::provider::ProviderContext;
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::validation::Checks;

const DEFAULT_LIMIT: i64 = 1000;

/// Looks up dimension values matching a search query.
#[derive(Debug, Clone, Copy, Default)]
pub struct DimensionValuesDataSource;

#[async_trait]
impl DataSource for DimensionValuesDataSource {
    fn type_name(&self) -> &'static str {
        "signalfx_dimension_values"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Values of dimensions matching a query")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "query",
                Attribute::required_string().with_description("e.g. key:host AND value:web*"),
            )
            .with_attribute("limit", Attribute::optional_int64().with_default(json!(DEFAULT_LIMIT)))
            .with_attribute("values", Attribute::computed_string_list())
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let attrs = Attributes::new(config);
        let mut checks = Checks::new();
        checks
            .non_empty("query", attrs.raw("query").and_then(Value::as_str))
            .int_range("limit", attrs.int("limit"), 1, 10_000);
        checks.into_diagnostics()
    }

    async fn read(&self, ctx: &ProviderContext, config: &Value) -> Result<Value, ProviderError> {
        let attrs = Attributes::new(config);
        let query = attrs.required_string("query")?;
        let limit = attrs.int("limit").unwrap_or(DEFAULT_LIMIT);
        let limit = u32::try_from(limit)
            .map_err(|_| ProviderError::Validation(format!("invalid limit {}", limit)))?;

        let found = ctx.client.search_dimensions(&query, limit).await?;
        debug!(query = %query, total = found.count, returned = found.results.len(), "Dimension search");
        let values: Vec<String> = found.results.into_iter().map(|d| d.value).collect();

        Ok(json!({
            "id": query,
            "query": query,
            "limit": limit,
            "values": values,
        }))
    }
}
