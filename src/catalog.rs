use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::StrainError;
use crate::models::{Catalog, Question, DEFAULT_DOMAIN};

const REQUIRED_KEYS: [&str; 5] = ["id", "type", "prompt", "choices", "weights"];

pub fn load_questions(path: &Path) -> Result<Catalog, StrainError> {
    if !path.exists() {
        return Err(StrainError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let raw = std::fs::read_to_string(path)?;
    let document: Value = serde_json::from_str(&raw).map_err(|err| {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        StrainError::malformed(name, format!("invalid JSON: {err}"))
    })?;

    let catalog = parse_catalog(document)?;
    tracing::debug!(
        path = %path.display(),
        items = catalog.items.len(),
        "loaded question catalog"
    );
    Ok(catalog)
}

/// Validates a question document and converts it into a typed [`Catalog`].
pub fn parse_catalog(document: Value) -> Result<Catalog, StrainError> {
    let mut top = match document {
        Value::Object(map) => map,
        _ => {
            return Err(StrainError::malformed(
                "document",
                "top level must be an object",
            ))
        }
    };

    let items = match top.remove("items") {
        Some(Value::Array(items)) if !items.is_empty() => items,
        _ => {
            return Err(StrainError::malformed(
                "items",
                "document must contain a non-empty 'items' list",
            ))
        }
    };

    let mut seen = HashSet::new();
    let mut questions = Vec::with_capacity(items.len());

    for (index, item) in items.iter().enumerate() {
        let locator = format!("items[{}]", index + 1);
        let question = parse_question(&locator, item)?;
        if !seen.insert(question.id.clone()) {
            return Err(StrainError::malformed(
                locator,
                format!("duplicate id '{}'", question.id),
            ));
        }
        questions.push(question);
    }

    Ok(Catalog {
        items: questions,
        extra: top,
    })
}

fn parse_question(locator: &str, item: &Value) -> Result<Question, StrainError> {
    let fields = item
        .as_object()
        .ok_or_else(|| StrainError::malformed(locator, "item must be an object"))?;

    for key in REQUIRED_KEYS {
        if !fields.contains_key(key) {
            return Err(StrainError::malformed(locator, format!("missing '{key}'")));
        }
    }

    let id = required_str(locator, fields, "id")?;
    if required_str(locator, fields, "type")? != "choice" {
        return Err(StrainError::malformed(
            locator,
            "only supports type='choice' right now",
        ));
    }
    let prompt = required_str(locator, fields, "prompt")?;

    let choices = match &fields["choices"] {
        Value::Array(values) if !values.is_empty() => values
            .iter()
            .map(|value| {
                value.as_str().map(str::to_string).ok_or_else(|| {
                    StrainError::malformed(locator, "'choices' must contain only strings")
                })
            })
            .collect::<Result<Vec<_>, _>>()?,
        _ => {
            return Err(StrainError::malformed(
                locator,
                "'choices' must be a non-empty list",
            ))
        }
    };

    let weights = match &fields["weights"] {
        Value::Object(map) if !map.is_empty() => {
            let mut weights = BTreeMap::new();
            for (choice, weight) in map {
                let weight = weight.as_i64().ok_or_else(|| {
                    StrainError::malformed(
                        locator,
                        format!("weight for choice '{choice}' must be an integer"),
                    )
                })?;
                weights.insert(choice.clone(), weight);
            }
            weights
        }
        _ => {
            return Err(StrainError::malformed(
                locator,
                "'weights' must be a non-empty object",
            ))
        }
    };

    if let Some(choice) = choices.iter().find(|c| !weights.contains_key(*c)) {
        return Err(StrainError::malformed(
            locator,
            format!("missing weight for choice: {choice}"),
        ));
    }

    let domain =
        optional_str(locator, fields, "domain")?.unwrap_or_else(|| DEFAULT_DOMAIN.to_string());
    let construct = optional_str(locator, fields, "construct")?;

    Ok(Question {
        id,
        prompt,
        choices,
        weights,
        domain,
        construct,
    })
}

fn required_str(
    locator: &str,
    fields: &Map<String, Value>,
    key: &str,
) -> Result<String, StrainError> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| StrainError::malformed(locator, format!("'{key}' must be a string")))
}

fn optional_str(
    locator: &str,
    fields: &Map<String, Value>,
    key: &str,
) -> Result<Option<String>, StrainError> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(StrainError::malformed(
            locator,
            format!("'{key}' must be a string when present"),
        )),
    }
}
