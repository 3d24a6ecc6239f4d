use std::fmt::Write;

use serde_json::Value;
use tenantload_core::{ResponseError, SearchRequest, SearchResponse};

/// Renders the GraphQL `Get` query for a tenant-scoped `nearVector` search.
///
/// Only `_additional { id }` is requested; hits are counted, never read.
pub fn near_vector_query(request: &SearchRequest) -> String {
    let mut vector = String::with_capacity(request.vector.len() * 12);
    for (i, component) in request.vector.iter().enumerate() {
        if i > 0 {
            vector.push(',');
        }
        let _ = write!(vector, "{component}");
    }

    // JSON string escaping is valid GraphQL string escaping
    let tenant = serde_json::to_string(&request.tenant).unwrap_or_else(|_| "\"\"".to_string());

    format!(
        "{{ Get {{ {collection}(tenant: {tenant}, limit: {limit}, nearVector: {{vector: [{vector}]}}) {{ _additional {{ id }} }} }} }}",
        collection = request.collection,
        limit = request.limit,
    )
}

/// Extracts the hit count and embedded errors from a GraphQL response body.
pub fn parse_search_response(collection: &str, payload: &Value) -> SearchResponse {
    let errors = payload
        .get("errors")
        .and_then(Value::as_array)
        .map(|errors| {
            errors
                .iter()
                .map(|e| ResponseError {
                    message: e
                        .get("message")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| e.to_string()),
                })
                .collect()
        })
        .unwrap_or_default();

    let hits = payload
        .pointer(&format!("/data/Get/{collection}"))
        .and_then(Value::as_array)
        .map_or(0, Vec::len);

    SearchResponse { hits, errors }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(tenant: &str) -> SearchRequest {
        SearchRequest {
            collection: "MultiTenancyTest".to_string(),
            tenant: tenant.to_string(),
            limit: 10,
            vector: vec![0.5, -0.25, 1.0],
        }
    }

    #[test]
    fn test_near_vector_query_shape() {
        let query = near_vector_query(&request("tenant-1"));
        assert_eq!(
            query,
            r#"{ Get { MultiTenancyTest(tenant: "tenant-1", limit: 10, nearVector: {vector: [0.5,-0.25,1]}) { _additional { id } } } }"#
        );
    }

    #[test]
    fn test_tenant_name_is_escaped() {
        let query = near_vector_query(&request(r#"we"ird"#));
        assert!(query.contains(r#"tenant: "we\"ird""#));
    }

    #[test]
    fn test_parse_hits() {
        let payload = json!({
            "data": {"Get": {"MultiTenancyTest": [
                {"_additional": {"id": "a"}},
                {"_additional": {"id": "b"}}
            ]}}
        });
        let response = parse_search_response("MultiTenancyTest", &payload);
        assert_eq!(response, SearchResponse::with_hits(2));
    }

    #[test]
    fn test_parse_embedded_errors_keeps_order() {
        let payload = json!({
            "data": {"Get": {"MultiTenancyTest": null}},
            "errors": [
                {"message": "tenant not found: \"t9\""},
                {"message": "second"}
            ]
        });
        let response = parse_search_response("MultiTenancyTest", &payload);
        assert_eq!(response.hits, 0);
        assert_eq!(
            response.first_error().map(|e| e.message.as_str()),
            Some("tenant not found: \"t9\"")
        );
        assert_eq!(response.errors.len(), 2);
    }
}
