use crate::model::{entity::Entity, marker_type::MarkerType};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// Values a label template can reference that do not live on the entity.
pub struct TextContext {
    /// Current count of the entity's type.
    pub count: usize,
}

const PLACEHOLDERS: [&str; 7] = ["%track_id", "%frame", "%count", "%type", "%id", "%x", "%y"];

/// Label of an entity: its own text, else its type's template, with placeholders filled.
///
/// Placeholders: `%id`, `%track_id`, `%frame`, `%x`, `%y`, `%count`, `%type`. Anything else
/// after a `%` is kept verbatim.
pub fn resolve_text(entity: &Entity, ty: &MarkerType, ctx: TextContext) -> Option<String> {
    let template = entity.text.as_deref().or(ty.text.as_deref())?;
    let anchor = entity.marker().map(|m| m.geometry.anchor());

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        let Some(token) = PLACEHOLDERS.iter().find(|p| tail.starts_with(**p)) else {
            out.push('%');
            rest = &tail[1..];
            continue;
        };
        match *token {
            "%id" => out.push_str(&entity.id.0.to_string()),
            "%track_id" => {
                let track = if entity.is_track() {
                    Some(entity.id)
                } else {
                    entity.track()
                };
                if let Some(t) = track {
                    out.push_str(&t.0.to_string());
                }
            }
            "%frame" => {
                if let Some(f) = entity.frame() {
                    out.push_str(&f.to_string());
                }
            }
            "%x" => {
                if let Some(p) = anchor {
                    out.push_str(&p.x.to_string());
                }
            }
            "%y" => {
                if let Some(p) = anchor {
                    out.push_str(&p.y.to_string());
                }
            }
            "%count" => out.push_str(&ctx.count.to_string()),
            _ => out.push_str(&ty.name),
        }
        rest = &tail[token.len()..];
    }
    out.push_str(rest);
    Some(out)
}

#[cfg(test)]
#[path = "../../tests/unit/style/text.rs"]
mod tests;
