use anyhow::Result;
use serde_json::{json, Map, Value};

use super::document::{OpenApiDocument, OperationRef};
use crate::models::tool::Tool;
use crate::providers::utils::{tools_to_openai_spec, tools_to_responses_spec};

/// Shape of the tool definitions sent to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolFormat {
    /// `name`, `description` and `parameters` at the top level (responses API)
    #[default]
    Flat,
    /// Wrapped under a `function` key (chat completions API)
    Nested,
}

impl ToolFormat {
    /// Serialise `tools` in this shape, rejecting duplicate names
    pub fn render(self, tools: &[Tool]) -> Result<Vec<Value>> {
        match self {
            ToolFormat::Flat => tools_to_responses_spec(tools),
            ToolFormat::Nested => tools_to_openai_spec(tools),
        }
    }
}

/// JSON schema of the arguments of one operation.
///
/// Every parameter becomes a property named after it; a request body becomes a
/// single `body` property.
pub fn build_schema(operation: &OperationRef<'_>) -> Value {
    let mut properties = Map::new();
    let mut required: Vec<String> = Vec::new();

    for parameter in operation.parameters() {
        let mut schema = parameter
            .schema
            .clone()
            .unwrap_or_else(|| json!({ "type": "string" }));
        if let (Some(description), Some(object)) =
            (&parameter.description, schema.as_object_mut())
        {
            object
                .entry("description")
                .or_insert_with(|| json!(description));
        }
        properties.insert(parameter.name.clone(), schema);

        if parameter.required && !required.contains(&parameter.name) {
            required.push(parameter.name.clone());
        }
    }

    if let Some(body) = &operation.operation.request_body {
        match body.json_schema() {
            Some(schema) => {
                properties.insert("body".to_string(), schema.clone());
                if body.required && !required.iter().any(|name| name == "body") {
                    required.push("body".to_string());
                }
            }
            None => {
                properties
                    .entry("body")
                    .or_insert_with(|| json!({ "type": "object" }));
            }
        }
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// summary, then description, then `"<VERB> <path>"`
pub fn tool_description(operation: &OperationRef<'_>) -> String {
    [&operation.operation.summary, &operation.operation.description]
        .into_iter()
        .flatten()
        .find(|text| !text.trim().is_empty())
        .cloned()
        .unwrap_or_else(|| format!("{} {}", operation.method, operation.path))
}

/// One tool per operation that declares an operationId, in document order.
pub fn build_tools(document: &OpenApiDocument) -> Vec<Tool> {
    document
        .operations()
        .filter_map(|operation| {
            let Some(name) = operation.operation_id() else {
                tracing::debug!(
                    "Skipping {} {}: no operationId",
                    operation.method,
                    operation.path
                );
                return None;
            };
            Some(Tool::new(
                name,
                tool_description(&operation),
                build_schema(&operation),
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use std::collections::HashSet;

    const MOVIES: &str = indoc! {r#"
        openapi: 3.0.0
        servers:
          - url: https://api.movies.test/3
        paths:
          /search/movie:
            get:
              operationId: search-movie
              summary: Search for movies by their title
              parameters:
                - name: query
                  in: query
                  required: true
                  description: Title to look for
                  schema:
                    type: string
                - name: year
                  in: query
                  schema:
                    type: integer
          /movie/{movie_id}/rating:
            parameters:
              - name: movie_id
                in: path
                required: true
                schema:
                  type: integer
            post:
              operationId: movie-add-rating
              description: Rate a movie
              parameters:
                - name: guest_session_id
                  in: query
                  required: true
                - name: session_id
                  in: query
                  required: true
                - name: movie_id
                  in: path
                  required: true
                  schema:
                    type: integer
              requestBody:
                required: true
                content:
                  application/json:
                    schema:
                      type: object
                      properties:
                        value:
                          type: number
            delete:
              operationId: movie-delete-rating
              requestBody:
                content:
                  text/plain: {}
          /health:
            get:
              summary: ""
              responses: {}
    "#};

    fn document() -> OpenApiDocument {
        MOVIES.parse().unwrap()
    }

    fn tool<'a>(tools: &'a [Tool], name: &str) -> &'a Tool {
        tools.iter().find(|tool| tool.name == name).unwrap()
    }

    #[test]
    fn test_one_tool_per_operation_with_id() {
        let tools = build_tools(&document());
        let names: Vec<_> = tools.iter().map(|tool| tool.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["search-movie", "movie-add-rating", "movie-delete-rating"]
        );
    }

    #[test]
    fn test_required_contains_query_parameters_and_body() {
        let tools = build_tools(&document());
        let rating = tool(&tools, "movie-add-rating");

        let required: HashSet<_> = rating.parameters["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|name| name.as_str().unwrap())
            .collect();
        assert_eq!(
            required,
            HashSet::from(["movie_id", "guest_session_id", "session_id", "body"])
        );
        assert_eq!(rating.parameters["required"].as_array().unwrap().len(), 4);
        assert_eq!(
            rating.parameters["properties"]["body"]["properties"]["value"]["type"],
            "number"
        );
    }

    #[test]
    fn test_two_required_query_parameters_and_body() {
        let text = indoc! {r#"
            paths:
              /lists:
                post:
                  operationId: create-list
                  parameters:
                    - name: session_id
                      in: query
                      required: true
                    - name: language
                      in: query
                      required: true
                  requestBody:
                    required: true
                    content:
                      application/json:
                        schema:
                          type: object
        "#};
        let document: OpenApiDocument = text.parse().unwrap();
        let tools = build_tools(&document);

        let mut required: Vec<_> = tools[0].parameters["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|name| name.as_str().unwrap().to_string())
            .collect();
        required.sort();
        assert_eq!(required, vec!["body", "language", "session_id"]);
    }

    #[test]
    fn test_parameter_defaults_and_descriptions() {
        let tools = build_tools(&document());
        let search = tool(&tools, "search-movie");
        let properties = &search.parameters["properties"];

        assert_eq!(properties["query"]["type"], "string");
        assert_eq!(properties["query"]["description"], "Title to look for");
        assert_eq!(properties["year"]["type"], "integer");
        assert_eq!(search.parameters["required"], json!(["query"]));

        let rating = tool(&tools, "movie-add-rating");
        assert_eq!(
            rating.parameters["properties"]["guest_session_id"],
            json!({"type": "string"})
        );
    }

    #[test]
    fn test_body_without_json_schema_is_open_object() {
        let tools = build_tools(&document());
        let delete = tool(&tools, "movie-delete-rating");

        assert_eq!(
            delete.parameters["properties"]["body"],
            json!({"type": "object"})
        );
        assert_eq!(delete.parameters["required"], json!(["movie_id"]));
    }

    #[test]
    fn test_description_fallbacks() {
        let tools = build_tools(&document());
        assert_eq!(
            tool(&tools, "search-movie").description,
            "Search for movies by their title"
        );
        assert_eq!(tool(&tools, "movie-add-rating").description, "Rate a movie");
        assert_eq!(
            tool(&tools, "movie-delete-rating").description,
            "DELETE /movie/{movie_id}/rating"
        );
    }

    #[test]
    fn test_tool_spec_shapes() {
        let tools = build_tools(&document());
        let flat = ToolFormat::Flat.render(&tools).unwrap();
        assert_eq!(flat[0]["type"], "function");
        assert_eq!(flat[0]["name"], "search-movie");
        assert!(flat[0].get("function").is_none());

        let nested = ToolFormat::Nested.render(&tools).unwrap();
        assert_eq!(nested[0]["type"], "function");
        assert_eq!(nested[0]["function"]["name"], "search-movie");
        assert_eq!(
            nested[0]["function"]["parameters"],
            flat[0]["parameters"]
        );
    }
}
