use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::{DataSourceMode, Endpoint, MockRecord, Project};
use crate::store::DocumentStore;

use super::matcher::MatchStrategy;
use super::{aggregate, conditions};

/// Pagination knobs from the query string.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReadQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

/// The endpoint whose persisted records back this endpoint's responses.
/// CRUD endpoints are their own source; the legacy mount ignores the flag.
pub fn effective_data_source(endpoint: &Endpoint, strategy: MatchStrategy) -> Option<Uuid> {
    if endpoint.is_crud && strategy.supports_crud() {
        Some(endpoint.id)
    } else {
        endpoint.data_source
    }
}

fn source_endpoint<'a>(project: &'a Project, source_id: Uuid) -> Result<&'a Endpoint, EngineError> {
    project
        .endpoints
        .iter()
        .find(|e| e.id == source_id)
        .ok_or_else(|| EngineError::NotFound("Data source endpoint not found".to_string()))
}

fn parse_record_id(resource_id: &str) -> Result<Uuid, EngineError> {
    Uuid::parse_str(resource_id)
        .map_err(|_| EngineError::NotFound("Item not found".to_string()))
}

/// Resolve a data-backed read: load, filter, aggregate/project, paginate.
pub async fn resolve_read(
    store: &dyn DocumentStore,
    project: &Project,
    endpoint: &Endpoint,
    strategy: MatchStrategy,
    resource_id: Option<&str>,
    query: ReadQuery,
) -> Result<Value, EngineError> {
    let source_id = effective_data_source(endpoint, strategy)
        .ok_or_else(|| EngineError::Internal("resolve_read without data source".to_string()))?;
    let source = source_endpoint(project, source_id)?;

    // ID-scoped read: a single record or a 404, no pagination.
    if let Some(raw_id) = resource_id {
        let id = parse_record_id(raw_id)?;
        let record = store
            .find_record(source_id, project.id, id)
            .await?
            .ok_or_else(|| EngineError::NotFound("Item not found".to_string()))?;

        let expanded = record.expanded();
        if !conditions::matches_all(&expanded, &endpoint.conditions) {
            return Err(EngineError::NotFound("Item not found".to_string()));
        }
        if endpoint.data_source_mode == DataSourceMode::Field
            && !endpoint.data_source_fields.is_empty()
        {
            return Ok(aggregate::project(&expanded, &endpoint.data_source_fields));
        }
        return Ok(expanded);
    }

    let records = store.list_records(source_id, project.id).await?;

    if records.is_empty() && !endpoint.is_crud {
        // No data yet: surface the source endpoint's static seed body.
        // CRUD collections deliberately return an empty array instead.
        return Ok(seed_body(source));
    }

    let rows: Vec<Value> = records
        .iter()
        .map(MockRecord::expanded)
        .filter(|row| conditions::matches_all(row, &endpoint.conditions))
        .collect();

    // Aggregator results are terminal: no pagination, no projection.
    if endpoint.data_source_mode == DataSourceMode::Aggregator {
        if let Some(agg) = endpoint.aggregator.as_deref() {
            if !endpoint.data_source_fields.is_empty() {
                return aggregate::aggregate(&rows, &endpoint.data_source_fields, agg);
            }
        }
    }

    let project_fields = endpoint.data_source_mode == DataSourceMode::Field
        && !endpoint.data_source_fields.is_empty();

    if let Some(pagination) = endpoint.pagination.as_ref().filter(|p| p.enabled) {
        let page = query.page.unwrap_or(1).max(1);
        // User-authored configs can carry maxLimit 0; floor it so the
        // clamp stays well-formed instead of panicking.
        let max_limit = pagination.max_limit.max(1);
        let limit = query
            .limit
            .unwrap_or(pagination.default_limit)
            .clamp(1, max_limit);

        let total = rows.len();
        let total_pages = total.div_ceil(limit);
        let start = (page - 1).saturating_mul(limit);
        let page_rows: Vec<Value> = rows.into_iter().skip(start).take(limit).collect();
        let page_rows = if project_fields {
            aggregate::project_all(page_rows, &endpoint.data_source_fields)
        } else {
            page_rows
        };

        return Ok(json!({
            "data": page_rows,
            "pagination": {
                "page": page,
                "limit": limit,
                "total": total,
                "totalPages": total_pages,
                "hasNext": page < total_pages,
                "hasPrev": page > 1 && total_pages > 0,
            },
        }));
    }

    if project_fields {
        return Ok(Value::Array(aggregate::project_all(
            rows,
            &endpoint.data_source_fields,
        )));
    }
    Ok(Value::Array(rows))
}

/// Resolve the records a PUT/PATCH/DELETE operates on: by trailing ID when
/// present, otherwise every record passing the endpoint's conditions.
pub async fn resolve_targets(
    store: &dyn DocumentStore,
    project: &Project,
    endpoint: &Endpoint,
    source_id: Uuid,
    resource_id: Option<&str>,
) -> Result<Vec<MockRecord>, EngineError> {
    let records = match resource_id {
        Some(raw_id) => {
            let id = parse_record_id(raw_id)?;
            match store.find_record(source_id, project.id, id).await? {
                Some(record) => vec![record],
                None => vec![],
            }
        }
        None => store.list_records(source_id, project.id).await?,
    };

    let targets: Vec<MockRecord> = records
        .into_iter()
        .filter(|r| conditions::matches_all(&r.expanded(), &endpoint.conditions))
        .collect();

    if targets.is_empty() {
        return Err(EngineError::NotFound("Item not found".to_string()));
    }
    Ok(targets)
}

fn seed_body(source: &Endpoint) -> Value {
    serde_json::from_str(&source.response_body)
        .unwrap_or_else(|_| Value::String(source.response_body.clone()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use serde_json::json;

    use crate::models::{AuthSettings, PaginationSettings};
    use crate::store::MemoryStore;

    use super::*;

    fn endpoint(path: &str, method: &str) -> Endpoint {
        Endpoint {
            id: Uuid::now_v7(),
            path: path.to_string(),
            method: method.to_string(),
            response_body: String::new(),
            status_code: 200,
            requires_auth: None,
            fields: vec![],
            data_source: None,
            data_source_mode: DataSourceMode::Full,
            data_source_fields: vec![],
            aggregator: None,
            conditions: vec![],
            pagination: None,
            is_crud: false,
        }
    }

    fn project_with(endpoints: Vec<Endpoint>) -> Project {
        Project {
            id: Uuid::now_v7(),
            name: "p".to_string(),
            base_url: String::new(),
            authentication: AuthSettings::default(),
            endpoints,
            owner_user_id: Uuid::now_v7(),
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    fn seed(store: &MemoryStore, project: &Project, endpoint_id: Uuid, data: Value) -> Uuid {
        let record = MockRecord::new(endpoint_id, project.id, data, vec![]);
        let id = record.id;
        store.seed_record(record);
        id
    }

    #[tokio::test]
    async fn empty_collection_falls_back_to_seed_except_for_crud() {
        let store = Arc::new(MemoryStore::new());

        let mut source = endpoint("/items", "POST");
        source.response_body = "[{\"id\":\"seed\"}]".to_string();
        let mut reader = endpoint("/items", "GET");
        reader.data_source = Some(source.id);
        let project = project_with(vec![source.clone(), reader.clone()]);

        let out = resolve_read(store.as_ref(), &project, &reader, MatchStrategy::Extended, None, ReadQuery::default())
            .await
            .unwrap();
        assert_eq!(out, json!([{"id": "seed"}]));

        // A CRUD endpoint suppresses the stale seed.
        let mut crud = endpoint("/things", "GET");
        crud.is_crud = true;
        crud.response_body = "[{\"id\":\"seed\"}]".to_string();
        let project = project_with(vec![crud.clone()]);
        let out = resolve_read(store.as_ref(), &project, &crud, MatchStrategy::Extended, None, ReadQuery::default())
            .await
            .unwrap();
        assert_eq!(out, json!([]));
    }

    #[tokio::test]
    async fn missing_id_is_item_not_found() {
        let store = Arc::new(MemoryStore::new());
        let mut crud = endpoint("/things", "GET");
        crud.is_crud = true;
        let project = project_with(vec![crud.clone()]);

        let err = resolve_read(
            store.as_ref(),
            &project,
            &crud,
            MatchStrategy::Extended,
            Some(&Uuid::now_v7().to_string()),
            ReadQuery::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(msg) if msg == "Item not found"));
    }

    #[tokio::test]
    async fn pagination_law_reassembles_the_collection() {
        let store = Arc::new(MemoryStore::new());
        let mut crud = endpoint("/nums", "GET");
        crud.is_crud = true;
        crud.pagination = Some(PaginationSettings {
            enabled: true,
            default_limit: 2,
            max_limit: 10,
        });
        let project = project_with(vec![crud.clone()]);

        for i in 0..5 {
            seed(&store, &project, crud.id, json!({ "n": i }));
        }

        let mut seen = Vec::new();
        for page in 1..=3usize {
            let out = resolve_read(
                store.as_ref(),
                &project,
                &crud,
                MatchStrategy::Extended,
                None,
                ReadQuery { page: Some(page), limit: Some(2) },
            )
            .await
            .unwrap();

            let meta = &out["pagination"];
            assert_eq!(meta["total"], 5);
            assert_eq!(meta["totalPages"], 3);
            assert_eq!(meta["hasPrev"], page > 1);
            assert_eq!(meta["hasNext"], page < 3);

            for row in out["data"].as_array().unwrap() {
                seen.push(row["n"].as_i64().unwrap());
            }
        }
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn limit_is_clamped_to_max() {
        let store = Arc::new(MemoryStore::new());
        let mut crud = endpoint("/nums", "GET");
        crud.is_crud = true;
        crud.pagination = Some(PaginationSettings {
            enabled: true,
            default_limit: 2,
            max_limit: 3,
        });
        let project = project_with(vec![crud.clone()]);
        for i in 0..5 {
            seed(&store, &project, crud.id, json!({ "n": i }));
        }

        let out = resolve_read(
            store.as_ref(),
            &project,
            &crud,
            MatchStrategy::Extended,
            None,
            ReadQuery { page: Some(1), limit: Some(50) },
        )
        .await
        .unwrap();
        assert_eq!(out["pagination"]["limit"], 3);
        assert_eq!(out["data"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn zero_max_limit_still_serves_one_row_per_page() {
        let store = Arc::new(MemoryStore::new());
        let mut crud = endpoint("/nums", "GET");
        crud.is_crud = true;
        crud.pagination = Some(PaginationSettings {
            enabled: true,
            default_limit: 2,
            max_limit: 0,
        });
        let project = project_with(vec![crud.clone()]);
        seed(&store, &project, crud.id, json!({ "n": 1 }));

        let out = resolve_read(store.as_ref(), &project, &crud, MatchStrategy::Extended, None, ReadQuery::default())
            .await
            .unwrap();
        assert_eq!(out["pagination"]["limit"], 1);
        assert_eq!(out["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn aggregator_short_circuits_pagination() {
        let store = Arc::new(MemoryStore::new());
        let mut crud = endpoint("/sales", "GET");
        crud.is_crud = true;
        crud.data_source_mode = DataSourceMode::Aggregator;
        crud.aggregator = Some("avg".to_string());
        crud.data_source_fields = vec!["price".to_string()];
        crud.pagination = Some(PaginationSettings {
            enabled: true,
            default_limit: 1,
            max_limit: 1,
        });
        let project = project_with(vec![crud.clone()]);
        for price in [10, 20, 30] {
            seed(&store, &project, crud.id, json!({ "price": price }));
        }

        let out = resolve_read(store.as_ref(), &project, &crud, MatchStrategy::Extended, None, ReadQuery::default())
            .await
            .unwrap();
        assert_eq!(
            out,
            json!({
                "field": "price",
                "aggregator": "avg",
                "value": 20.0,
                "totalRecords": 3,
                "processedValues": 3,
            })
        );
    }

    #[tokio::test]
    async fn field_mode_projects_after_filtering() {
        let store = Arc::new(MemoryStore::new());
        let mut crud = endpoint("/books", "GET");
        crud.is_crud = true;
        crud.data_source_mode = DataSourceMode::Field;
        crud.data_source_fields = vec!["title".to_string()];
        crud.conditions = vec![crate::models::Condition {
            field: "stocked".to_string(),
            operator: crate::models::ConditionOp::Eq,
            value: json!(true),
        }];
        let project = project_with(vec![crud.clone()]);
        seed(&store, &project, crud.id, json!({ "title": "A", "stocked": true }));
        seed(&store, &project, crud.id, json!({ "title": "B", "stocked": false }));

        let out = resolve_read(store.as_ref(), &project, &crud, MatchStrategy::Extended, None, ReadQuery::default())
            .await
            .unwrap();
        // Single-field projection unwraps to bare values.
        assert_eq!(out, json!(["A"]));
    }
}
