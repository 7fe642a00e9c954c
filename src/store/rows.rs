use serde_json::Value;

use crate::{
    foundation::core::{EntityId, FrameIndex, TypeId},
    foundation::error::{AnnotrackError, AnnotrackResult},
    model::{
        entity::{Entity, EntityKind, Marker, TrackInfo},
        geometry::Geometry,
        marker_type::MarkerType,
    },
    store::persistence::{Fields, Table},
};

pub(crate) fn table_for(entity: &Entity) -> Table {
    match &entity.kind {
        EntityKind::Track(_) => Table::Track,
        EntityKind::Marker(m) => match m.geometry {
            Geometry::Point(_) => Table::Point,
            Geometry::Line(_) => Table::Line,
            Geometry::Rect(_) => Table::Rect,
            Geometry::Ellipse(_) => Table::Ellipse,
            Geometry::Polygon(_) => Table::Polygon,
        },
    }
}

pub(crate) fn encode_type(t: &MarkerType) -> Fields {
    let mut f = Fields::new();
    f.insert("name".into(), Value::from(t.name.clone()));
    f.insert("mode".into(), Value::from(t.mode.as_str()));
    f.insert("color".into(), Value::from(t.color.clone()));
    f.insert("style".into(), opt_string(&t.style));
    f.insert("text".into(), opt_string(&t.text));
    f.insert("hidden".into(), Value::from(t.hidden));
    f
}

pub(crate) fn decode_type(id: u64, fields: &Fields) -> AnnotrackResult<MarkerType> {
    let mut obj = fields.clone();
    obj.insert("id".into(), Value::from(id));
    serde_json::from_value(Value::Object(obj))
        .map_err(|e| AnnotrackError::serde(format!("type row {id}: {e}")))
}

pub(crate) fn encode_entity(e: &Entity) -> AnnotrackResult<Fields> {
    let mut f = match &e.kind {
        EntityKind::Track(info) => {
            let mut f = Fields::new();
            f.insert("hidden".into(), Value::from(info.hidden));
            f
        }
        EntityKind::Marker(m) => {
            let geometry = match &m.geometry {
                Geometry::Point(g) => serde_json::to_value(g)?,
                Geometry::Line(g) => serde_json::to_value(g)?,
                Geometry::Rect(g) => serde_json::to_value(g)?,
                Geometry::Ellipse(g) => serde_json::to_value(g)?,
                Geometry::Polygon(g) => serde_json::to_value(g)?,
            };
            let Value::Object(mut f) = geometry else {
                return Err(AnnotrackError::serde("geometry must encode as an object"));
            };
            f.insert("frame".into(), Value::from(m.frame.0));
            if matches!(m.geometry, Geometry::Point(_)) {
                f.insert("track".into(), m.track.map_or(Value::Null, |t| Value::from(t.0)));
            }
            f
        }
    };
    f.insert("type".into(), Value::from(e.type_id.0));
    f.insert("style".into(), opt_string(&e.style));
    f.insert("text".into(), opt_string(&e.text));
    Ok(f)
}

pub(crate) fn decode_entity(table: Table, id: u64, fields: &Fields) -> AnnotrackResult<Entity> {
    let type_id = TypeId(required_u64(fields, "type", table, id)?);
    let style = optional_string(fields, "style", table, id)?;
    let text = optional_string(fields, "text", table, id)?;

    let kind = if table == Table::Track {
        EntityKind::Track(TrackInfo {
            hidden: fields.get("hidden").and_then(Value::as_bool).unwrap_or(false),
        })
    } else {
        let frame = FrameIndex(required_u64(fields, "frame", table, id)?);
        let obj = Value::Object(fields.clone());
        let geometry = match table {
            Table::Point => Geometry::Point(from_row(obj, table, id)?),
            Table::Line => Geometry::Line(from_row(obj, table, id)?),
            Table::Rect => Geometry::Rect(from_row(obj, table, id)?),
            Table::Ellipse => Geometry::Ellipse(from_row(obj, table, id)?),
            Table::Polygon => Geometry::Polygon(from_row(obj, table, id)?),
            Table::Type | Table::Track => {
                return Err(AnnotrackError::serde(format!(
                    "{table:?} rows do not hold markers"
                )));
            }
        };
        let track = match table {
            Table::Point => fields.get("track").and_then(Value::as_u64).map(EntityId),
            _ => None,
        };
        EntityKind::Marker(Marker {
            frame,
            geometry,
            track,
        })
    };

    Ok(Entity {
        id: EntityId(id),
        type_id,
        style,
        text,
        kind,
    })
}

/// Columns of `new` whose value differs from `old`; columns dropped from `new` become null.
pub(crate) fn changed_fields(old: &Fields, new: &Fields) -> Fields {
    let mut out = Fields::new();
    for (k, v) in new {
        if old.get(k) != Some(v) {
            out.insert(k.clone(), v.clone());
        }
    }
    for (k, v) in old {
        if !new.contains_key(k) && !v.is_null() {
            out.insert(k.clone(), Value::Null);
        }
    }
    out
}

fn opt_string(s: &Option<String>) -> Value {
    s.as_ref().map_or(Value::Null, |s| Value::from(s.clone()))
}

fn required_u64(fields: &Fields, key: &str, table: Table, id: u64) -> AnnotrackResult<u64> {
    fields.get(key).and_then(Value::as_u64).ok_or_else(|| {
        AnnotrackError::serde(format!("{table:?} row {id}: missing integer column '{key}'"))
    })
}

fn optional_string(
    fields: &Fields,
    key: &str,
    table: Table,
    id: u64,
) -> AnnotrackResult<Option<String>> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(AnnotrackError::serde(format!(
            "{table:?} row {id}: column '{key}' must be a string"
        ))),
    }
}

fn from_row<T: serde::de::DeserializeOwned>(obj: Value, table: Table, id: u64) -> AnnotrackResult<T> {
    serde_json::from_value(obj).map_err(|e| AnnotrackError::serde(format!("{table:?} row {id}: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/store/rows.rs"]
mod tests;
