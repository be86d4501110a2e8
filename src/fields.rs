//! Field enumeration and name resolution.

use std::collections::HashMap;

use facet_core::{Field, FieldAttribute, FieldFlags, Shape, Type, UserType};

use crate::resolve::{element_shape, is_record};

/// A named field of a record, with flattened sub-records already inlined.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// The field's declared name.
    pub name: &'static str,
    /// Field indices leading from the enumerated record to this field. Fields
    /// promoted out of a flattened record have more than one entry.
    pub path: Vec<usize>,
    /// The facet field definition.
    pub field: &'static Field,
}

impl FieldDescriptor {
    /// Shape of the field's declared type.
    pub fn shape(&self) -> &'static Shape {
        self.field.shape
    }

    /// How many records deep the field sits; direct fields have depth 1.
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// Value of the `key` metadata tag on this field.
    pub fn tag(&self, key: &str) -> Option<&'static str> {
        tag_value(self.field, key)
    }

    /// Name used to pair this field with a field on the other side.
    pub fn match_name(&self, tag: &str) -> &'static str {
        resolve_tag_name(self.field, tag)
    }
}

/// Lists the fields of the record underneath `shape`.
///
/// `Option`, pointer and sequence layers are stripped first. Fields marked
/// `#[facet(flatten)]` are replaced by the fields of the record they hold, in
/// place, so outer fields keep their declaration order around them. Anything
/// that is not a record yields no fields.
pub fn fields_of(shape: &'static Shape) -> Vec<FieldDescriptor> {
    let mut fields = Vec::new();
    collect_fields(element_shape(shape), &mut Vec::new(), &mut fields);
    fields
}

fn collect_fields(shape: &'static Shape, prefix: &mut Vec<usize>, out: &mut Vec<FieldDescriptor>) {
    if !is_record(shape) {
        return;
    }
    let Type::User(UserType::Struct(struct_type)) = shape.ty else {
        return;
    };

    for (index, field) in struct_type.fields.iter().enumerate() {
        prefix.push(index);
        let field_shape = field.shape;
        if field.flags.contains(FieldFlags::FLATTEN) && is_record(field_shape) {
            collect_fields(field_shape, prefix, out);
        } else {
            out.push(FieldDescriptor {
                name: field.name,
                path: prefix.clone(),
                field,
            });
        }
        prefix.pop();
    }
}

/// Returns the value of the `tag` attribute on `field`, or the field's own
/// name when it has none. An empty `tag` always yields the field name.
///
/// Tags are written as `#[facet(api = "user_name")]`.
pub fn resolve_tag_name(field: &'static Field, tag: &str) -> &'static str {
    if tag.is_empty() {
        return field.name;
    }
    tag_value(field, tag).unwrap_or(field.name)
}

fn tag_value(field: &'static Field, key: &str) -> Option<&'static str> {
    field.attributes.iter().find_map(|attribute| {
        let FieldAttribute::Arbitrary(raw) = attribute;
        parse_tag(raw, key)
    })
}

fn parse_tag<'a>(raw: &'a str, key: &str) -> Option<&'a str> {
    let (name, value) = raw.split_once('=')?;
    if name.trim() != key {
        return None;
    }
    let value = value.trim();
    Some(
        value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value),
    )
}

/// Indexes fields by name, keeping the shallowest field when a flattened
/// record shadows an outer one.
pub(crate) fn by_name(fields: &[FieldDescriptor]) -> HashMap<&'static str, &FieldDescriptor> {
    let mut index: HashMap<&'static str, &FieldDescriptor> = HashMap::with_capacity(fields.len());
    for field in fields {
        index
            .entry(field.name)
            .and_modify(|seen| {
                if field.depth() < seen.depth() {
                    *seen = field;
                }
            })
            .or_insert(field);
    }
    index
}

/// Maps match-names to destination field names. On tag collisions the field
/// declared last wins.
#[derive(Debug, Default)]
pub(crate) struct NameTable {
    names: HashMap<&'static str, &'static str>,
}

impl NameTable {
    pub(crate) fn build(fields: &[FieldDescriptor], tag: &str) -> Self {
        let names = fields
            .iter()
            .map(|field| (field.match_name(tag), field.name))
            .collect();
        Self { names }
    }

    pub(crate) fn lookup(&self, match_name: &str) -> Option<&'static str> {
        self.names.get(match_name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quoted_tag_values() {
        assert_eq!(parse_tag(r#"api = "user_name""#, "api"), Some("user_name"));
        assert_eq!(parse_tag(r#"api="id""#, "api"), Some("id"));
        assert_eq!(parse_tag(r#"db = "login""#, "api"), None);
        assert_eq!(parse_tag("flatten", "api"), None);
    }
}
