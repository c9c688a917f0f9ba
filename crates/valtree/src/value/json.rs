//! JSON conversion for detached trees

use serde_json::{Map, Number, Value as Json};

use super::{DetachedDictionary, DetachedList, DetachedValue};
use crate::context::ValueContext;
use crate::error::{Result, ValueError};

impl DetachedValue {
    /// Convert to JSON. Binaries and non-finite doubles have no JSON form.
    pub fn to_json(&self, ctx: &ValueContext) -> Result<Json> {
        to_json(self, ctx, 0)
    }

    /// Convert from JSON. Integers that fit in `i32` become ints; every
    /// other number becomes a double.
    pub fn from_json(json: &Json, ctx: &ValueContext) -> Result<Self> {
        from_json(json, ctx, 0)
    }
}

fn enter(depth: usize, ctx: &ValueContext) -> Result<usize> {
    let depth = depth + 1;
    if depth > ctx.max_depth {
        return Err(ValueError::DepthExceeded { max: ctx.max_depth });
    }
    Ok(depth)
}

fn to_json(value: &DetachedValue, ctx: &ValueContext, depth: usize) -> Result<Json> {
    Ok(match value {
        DetachedValue::Null => Json::Null,
        DetachedValue::Bool(b) => Json::Bool(*b),
        DetachedValue::Int(n) => Json::from(*n),
        DetachedValue::Double(n) => Number::from_f64(*n)
            .map(Json::Number)
            .ok_or_else(|| ValueError::Unsupported(format!("non-finite double {n}")))?,
        DetachedValue::String(s) => Json::String(s.clone()),
        DetachedValue::Binary(_) => {
            return Err(ValueError::Unsupported(
                "binary values have no JSON form".to_string(),
            ))
        }
        DetachedValue::Dictionary(dict) => {
            let depth = enter(depth, ctx)?;
            let mut map = Map::with_capacity(dict.len());
            for (key, child) in dict.iter() {
                map.insert(key.to_string(), to_json(child, ctx, depth)?);
            }
            Json::Object(map)
        }
        DetachedValue::List(list) => {
            let depth = enter(depth, ctx)?;
            Json::Array(
                list.iter()
                    .map(|child| to_json(child, ctx, depth))
                    .collect::<Result<Vec<_>>>()?,
            )
        }
    })
}

fn from_json(json: &Json, ctx: &ValueContext, depth: usize) -> Result<DetachedValue> {
    Ok(match json {
        Json::Null => DetachedValue::Null,
        Json::Bool(b) => DetachedValue::Bool(*b),
        Json::Number(n) => number(n),
        Json::String(s) => DetachedValue::String(s.clone()),
        Json::Array(items) => {
            let depth = enter(depth, ctx)?;
            let mut list = DetachedList::new();
            for item in items {
                list.push(from_json(item, ctx, depth)?);
            }
            DetachedValue::List(list)
        }
        Json::Object(map) => {
            let depth = enter(depth, ctx)?;
            let mut dict = DetachedDictionary::new();
            for (key, item) in map {
                if key.is_empty() {
                    return Err(ValueError::invalid("dictionary key must not be empty"));
                }
                dict.insert(key.clone(), from_json(item, ctx, depth)?);
            }
            DetachedValue::Dictionary(dict)
        }
    })
}

fn number(n: &Number) -> DetachedValue {
    if let Some(int) = n.as_i64().and_then(|i| i32::try_from(i).ok()) {
        return DetachedValue::Int(int);
    }
    // Every serde_json number has an f64 reading unless arbitrary
    // precision is enabled, which this crate does not do.
    DetachedValue::Double(n.as_f64().unwrap_or(f64::NAN))
}
